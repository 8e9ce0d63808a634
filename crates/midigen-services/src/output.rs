//! Output file naming

use std::fs;
use std::path::{Path, PathBuf};

use midigen_core::{GenerationType, MidiGenConfig};

use crate::error::Result;

pub const DEFAULT_OUTPUT_DIR: &str = "generated";

/// Descriptive file name built from the generation settings
pub fn output_file_name(config: &MidiGenConfig) -> String {
    let common = &config.common;
    let roots = common
        .root_notes
        .iter()
        .map(|n| n.replace('#', "s"))
        .collect::<Vec<_>>()
        .join("-");
    let octaves = format!("oct{}-{}", common.min_octave, common.max_octave);

    match (common.generation_type, &config.arpeggio) {
        (GenerationType::Arpeggio, Some(arp)) => {
            let tiled = if arp.repeat_pattern && arp.steps != 16 { "_16th" } else { "" };
            format!("arpeggio_{roots}_{}_{octaves}_steps{}{tiled}.mid", common.mode, arp.steps)
        }
        (generation_type, _) => format!("{}_{roots}_{}_{octaves}.mid", generation_type.name(), common.mode),
    }
}

/// Create `dir` if needed and join the generated file name
pub fn output_path(dir: &Path, config: &MidiGenConfig) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.join(output_file_name(config)))
}
