//! midigen-services: MIDI file output and output paths

pub mod error;
pub mod midi_file;
pub mod output;

pub use error::{Result, ServiceError};
pub use midi_file::{smf_bytes, write_midi_file};
pub use output::{output_file_name, output_path, DEFAULT_OUTPUT_DIR};
