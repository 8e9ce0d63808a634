//! midigen: generate arpeggio and drone MIDI files

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fastrand::Rng;
use midigen_core::legacy::parse_legacy_events;
use midigen_core::pipeline::{self, GeneratedEvents};
use midigen_core::{GenerationType, MidiFxChain, MidiGenConfig, Mode, SequenceInfo, TICKS_PER_BAR};
use midigen_services::{output_path, write_midi_file, DEFAULT_OUTPUT_DIR};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "midigen", version, about = "Procedural arpeggio and drone MIDI generator")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new MIDI file from a config
    Generate(GenerateArgs),
    /// Run a JSON event list through the effect chain and write it as MIDI
    Render(RenderArgs),
    /// Print the default config as TOML
    ExampleConfig,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// TOML config file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// arpeggio or drone
    #[arg(long = "type", value_parser = parse_generation_type)]
    generation_type: Option<GenerationType>,

    /// Root notes, e.g. `--roots E4 A4 D4`
    #[arg(long, num_args = 1..)]
    roots: Option<Vec<String>>,

    #[arg(long)]
    mode: Option<Mode>,

    #[arg(long)]
    bpm: Option<u16>,

    #[arg(long)]
    bars: Option<u32>,

    /// RNG seed (same seed and config => same file)
    #[arg(long)]
    seed: Option<u64>,

    /// Skip every effect
    #[arg(long)]
    no_effects: bool,

    /// Output file; a descriptive name under --output-dir when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// JSON array of legacy events
    events: PathBuf,

    #[arg(long, default_value_t = 120)]
    bpm: u16,

    #[arg(long, default_value_t = 0)]
    channel: u8,

    /// TOML config whose `[[effects]]` are applied
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long)]
    output: PathBuf,
}

fn parse_generation_type(s: &str) -> Result<GenerationType, String> {
    match s {
        "arpeggio" => Ok(GenerationType::Arpeggio),
        "drone" => Ok(GenerationType::Drone),
        other => Err(format!("expected arpeggio or drone, got {other}")),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "midigen=debug" } else { "midigen=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();
    Ok(())
}

/// Seeded RNG; the seed is logged so any run can be repeated
fn make_rng(seed: Option<u64>) -> Rng {
    let seed = seed.unwrap_or_else(|| fastrand::u64(..));
    info!(seed, "Random seed");
    Rng::with_seed(seed)
}

fn apply_overrides(config: &mut MidiGenConfig, args: &GenerateArgs) {
    let common = &mut config.common;
    if let Some(generation_type) = args.generation_type {
        common.generation_type = generation_type;
    }
    if let Some(roots) = &args.roots {
        common.root_notes = roots.clone();
    }
    if let Some(mode) = args.mode {
        common.mode = mode;
    }
    if let Some(bpm) = args.bpm {
        common.bpm = bpm;
    }
    if let Some(bars) = args.bars {
        common.bars = bars;
    }
    if args.seed.is_some() {
        common.seed = args.seed;
    }
    if args.no_effects {
        config.effects.clear();
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = config::load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().context("invalid configuration")?;

    let mut rng = make_rng(config.common.seed);
    let events = pipeline::generate(&config, &mut rng)?;
    if let GeneratedEvents::Arpeggio(seq) = &events {
        debug!(slots = seq.slots.len(), slots_per_note = seq.slots_per_note, "Arpeggio");
    }

    let mut chain = MidiFxChain::from_specs(&config.effects);
    info!(effects = ?chain.effects().iter().map(|e| e.name()).collect::<Vec<_>>(), "Effect chain");
    let info = pipeline::sequence_info(&config);
    let instructions = pipeline::render(&events, &mut chain, &info, &mut rng);

    let path = match args.output {
        Some(path) => path,
        None => output_path(&args.output_dir, &config)?,
    };
    write_midi_file(&path, instructions, config.common.bpm)?;
    println!("{}", path.display());
    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    if args.channel > 15 {
        bail!("channel must be between 0 and 15");
    }
    let config = config::load_config(args.config.as_deref())?;
    let instructions = read_events(&args.events, args.channel)?;
    info!(events = instructions.len(), "Loaded legacy events");

    let end = midigen_core::scheduler::end_tick(&instructions);
    let bars = end.div_ceil(TICKS_PER_BAR).max(1);
    let info = SequenceInfo::new(f64::from(args.bpm), bars.saturating_mul(TICKS_PER_BAR), args.channel);

    let mut rng = make_rng(args.seed.or(config.common.seed));
    let mut chain = MidiFxChain::from_specs(&config.effects);
    let rendered = pipeline::render_instructions(instructions, &mut chain, &info, &mut rng);
    write_midi_file(&args.output, rendered, args.bpm)?;
    println!("{}", args.output.display());
    Ok(())
}

fn read_events(path: &Path, channel: u8) -> Result<Vec<midigen_core::MidiInstruction>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read events file: {}", path.display()))?;
    parse_legacy_events(&text, channel)
        .with_context(|| format!("failed to parse events file: {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::Generate(args) => generate(args),
        Command::Render(args) => render(args),
        Command::ExampleConfig => {
            print!("{}", config::example_config()?);
            Ok(())
        }
    }
}
