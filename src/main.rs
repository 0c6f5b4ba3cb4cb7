//! gesture-edit - Command-line front end for the melodic engine.
//!
//! Reads melodies as JSON note lists or MIDI files, runs named operations,
//! builds gesture layers and exports to MIDI, decoupled timing documents or
//! a live sound engine.
//!
//! # Usage
//!
//! ```bash
//! gesture-edit transform transpose --param semitones=3 --input melody.json
//! gesture-edit gesture --input layers.json --output gesture.mid
//! gesture-edit live --input melody.json --layer layer2
//! ```
//!
//! Set `RUST_LOG=debug` for diagnostic output on stderr.

use anyhow::{bail, Context, Result};
use gesture_edit::gesture::{encode_layers, GestureLayerSpec, SimpleRhythm};
use gesture_edit::live::{push_layer, LayerName, UdpLiveSender, DEFAULT_LIVE_TARGET};
use gesture_edit::midi::{
    encode_tracks, export_to_midi, import_from_midi, name_to_note, EventSequence, ExportOptions,
    WireNote, DEFAULT_VELOCITY,
};
use gesture_edit::settings::deserialize_midi_data;
use gesture_edit::theory::{scale_run, ScaleModel};
use gesture_edit::timing::{to_decoupled, DurationType};
use gesture_edit::transform::{OperationRegistry, Outcome, ParamValue, Params};
use gesture_edit::{Session, Settings};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_PATH: &str = "gesture-edit.json";

/// Subcommands understood by the binary.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Transform(String),
    Gesture,
    Rhythm,
    Generate,
    ExportMidi,
    ImportMidi,
    Decouple,
    Session,
    Live,
    ListOps,
}

/// Command-line options for the application.
#[derive(Debug)]
struct CliOptions {
    command: Command,
    /// Settings file supplying the default key.
    settings: PathBuf,
    key: Option<String>,
    scale: Option<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    params: Params,
    layer: LayerName,
    fractional: bool,
    target: String,
}

fn print_help(program: &str) {
    eprintln!("gesture-edit - Melodic transformation and gesture timing engine");
    eprintln!();
    eprintln!("Usage: {} <COMMAND> [OPTIONS]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  transform <OP>   Apply a named operation (see list-ops)");
    eprintln!("  gesture          Encode gesture layers from a JSON list of layer specs");
    eprintln!("  rhythm           Generate a simple rhythm (params: note, noteDuration, interval, gestureDuration)");
    eprintln!("  generate         Generate a scale run (params: start as 60 or C4, count, length)");
    eprintln!("  export-midi      Write the input melody to a .mid file");
    eprintln!("  import-midi      Read a .mid file as a JSON note list");
    eprintln!("  decouple         Convert the input melody to decoupled timing");
    eprintln!("  session          Export a saved session to .mid or decoupled JSON");
    eprintln!("  live             Send the input melody (or session) to the live engine");
    eprintln!("  list-ops         List registered operations and their parameters");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --settings PATH   Settings file (default {})", DEFAULT_SETTINGS_PATH);
    eprintln!("  --key NOTE        Key root, e.g. C or F#");
    eprintln!("  --scale MODE      Mode name, e.g. major or harmonic minor");
    eprintln!("  -i, --input PATH  Input melody (.json or .mid) or session");
    eprintln!("  -o, --output PATH Output file (stdout when omitted)");
    eprintln!("  -p, --param K=V   Operation parameter, repeatable");
    eprintln!("  --layer NAME      Live layer: layer1, layer2 or layer3");
    eprintln!("  --fractional      Store decoupled durations as fractions");
    eprintln!("  --target ADDR     Live engine address (default {})", DEFAULT_LIVE_TARGET);
    eprintln!("  -h, --help        Print this help message");
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_from(&args)
    }

    fn parse_from(args: &[String]) -> Result<Self> {
        let program = args.first().map(String::as_str).unwrap_or("gesture-edit");
        let mut command: Option<Command> = None;
        let mut settings = PathBuf::from(DEFAULT_SETTINGS_PATH);
        let mut key = None;
        let mut scale = None;
        let mut input = None;
        let mut output = None;
        let mut params = Params::new();
        let mut layer = LayerName::Layer1;
        let mut fractional = false;
        let mut target = DEFAULT_LIVE_TARGET.to_string();
        let mut i = 1;

        let value = |i: usize, flag: &str| -> Result<String> {
            args.get(i)
                .cloned()
                .with_context(|| format!("{} requires a value", flag))
        };

        while i < args.len() {
            let arg = args[i].as_str();
            match arg {
                "--settings" => {
                    i += 1;
                    settings = PathBuf::from(value(i, arg)?);
                }
                "--key" => {
                    i += 1;
                    key = Some(value(i, arg)?);
                }
                "--scale" => {
                    i += 1;
                    scale = Some(value(i, arg)?);
                }
                "--input" | "-i" => {
                    i += 1;
                    input = Some(PathBuf::from(value(i, arg)?));
                }
                "--output" | "-o" => {
                    i += 1;
                    output = Some(PathBuf::from(value(i, arg)?));
                }
                "--param" | "-p" => {
                    i += 1;
                    let raw = value(i, arg)?;
                    let (name, val) = raw
                        .split_once('=')
                        .with_context(|| format!("--param expects NAME=VALUE, got '{}'", raw))?;
                    params.insert(name.trim().to_string(), ParamValue::parse(val));
                }
                "--layer" => {
                    i += 1;
                    layer = value(i, arg)?.parse()?;
                }
                "--fractional" => fractional = true,
                "--target" => {
                    i += 1;
                    target = value(i, arg)?;
                }
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    bail!("Unknown option: {} (use --help for usage information)", other)
                }
                other if command.is_none() => {
                    command = Some(match other {
                        "transform" => {
                            i += 1;
                            Command::Transform(value(i, "transform")?)
                        }
                        "gesture" => Command::Gesture,
                        "rhythm" => Command::Rhythm,
                        "generate" => Command::Generate,
                        "export-midi" => Command::ExportMidi,
                        "import-midi" => Command::ImportMidi,
                        "decouple" => Command::Decouple,
                        "session" => Command::Session,
                        "live" => Command::Live,
                        "list-ops" => Command::ListOps,
                        unknown => bail!("Unknown command: {} (use --help for usage information)", unknown),
                    });
                }
                other => bail!("Unexpected argument: {}", other),
            }
            i += 1;
        }

        let Some(command) = command else {
            print_help(program);
            bail!("No command given");
        };

        Ok(Self {
            command,
            settings,
            key,
            scale,
            input,
            output,
            params,
            layer,
            fractional,
            target,
        })
    }

    fn duration_type(&self) -> DurationType {
        if self.fractional {
            DurationType::Fractional
        } else {
            DurationType::Absolute
        }
    }

    fn require_input(&self) -> Result<&Path> {
        self.input
            .as_deref()
            .context("this command requires --input")
    }
}

/// Note lists accepted on input: a bare array or `{"notes": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NotesDocument {
    List(Vec<WireNote>),
    Object { notes: Vec<WireNote> },
}

fn is_midi_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("mid" | "midi")
    )
}

fn is_binary_session(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("bin" | "gsn"))
}

fn read_notes(path: &Path) -> Result<EventSequence> {
    if is_midi_file(path) {
        return import_from_midi(path)
            .with_context(|| format!("Failed to import {}", path.display()));
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let notes = match serde_json::from_str(&json)
        .with_context(|| format!("{} is not a note list", path.display()))?
    {
        NotesDocument::List(notes) | NotesDocument::Object { notes } => notes,
    };
    Ok(EventSequence::from_wire(&notes)?)
}

/// The melody to work on: `--input`, else the last melody stored in the
/// settings, else the demo scale run.
fn load_melody(cli: &CliOptions, settings: &Settings, scale: &ScaleModel) -> Result<EventSequence> {
    if let Some(path) = &cli.input {
        return read_notes(path);
    }
    if let Some(data) = &settings.last_midi_data {
        return deserialize_midi_data(data).context("Stored lastMidiData is invalid");
    }
    tracing::info!("No input given, using the demo scale run");
    Ok(scale_run(scale, 60, 8, 0.25, DEFAULT_VELOCITY)?)
}

fn load_session(path: &Path) -> Result<Session> {
    let session = if is_binary_session(path) {
        Session::load_from_binary(path)
    } else {
        Session::load_from_file(path)
    };
    session.with_context(|| format!("Failed to load session {}", path.display()))
}

fn write_text(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn write_notes(output: Option<&Path>, sequence: &EventSequence) -> Result<()> {
    write_text(output, &serde_json::to_string_pretty(&sequence.to_wire())?)
}

fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(ParamValue::Int(i)) => Ok(*i as f64),
        Some(ParamValue::Float(x)) => Ok(*x),
        Some(ParamValue::Text(t)) => bail!("--param {} expects a number, got '{}'", name, t),
    }
}

fn param_i64(params: &Params, name: &str, default: i64) -> Result<i64> {
    match params.get(name) {
        None => Ok(default),
        Some(ParamValue::Int(i)) => Ok(*i),
        Some(other) => bail!("--param {} expects an integer, got '{}'", name, other),
    }
}

fn run(cli: &CliOptions) -> Result<()> {
    let settings = Settings::load_or_default(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    let scale = settings
        .resolve_scale(cli.key.as_deref(), cli.scale.as_deref())?
        .model;
    let output = cli.output.as_deref();

    match &cli.command {
        Command::ListOps => {
            let registry = OperationRegistry::new();
            for name in registry.names() {
                if let Some(spec) = registry.get(name) {
                    println!(
                        "{:<20} {:<50} {}",
                        name,
                        spec.summary,
                        serde_json::to_string(&spec.params)?
                    );
                }
            }
        }
        Command::Transform(name) => {
            let melody = load_melody(cli, &settings, &scale)?;
            let registry = OperationRegistry::new();
            let outcome = registry
                .apply(name, &melody, &scale, &cli.params)
                .with_context(|| format!("Operation '{}' failed", name))?;
            match outcome {
                Outcome::Sequence(seq) => write_notes(output, &seq)?,
                Outcome::Analysis(analysis) => {
                    write_text(output, &serde_json::to_string_pretty(&analysis)?)?
                }
            }
        }
        Command::Gesture => {
            let path = cli.require_input()?;
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let specs: Vec<GestureLayerSpec> =
                serde_json::from_str(&json).context("Expected a JSON list of gesture layers")?;
            let layers = encode_layers(&specs)?;
            match output {
                Some(path) if is_midi_file(path) => {
                    let tracks: Vec<(&str, &EventSequence)> =
                        layers.iter().map(|l| (l.name.as_str(), &l.notes)).collect();
                    fs::write(path, encode_tracks(&tracks, &ExportOptions::default()))
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                _ => write_text(output, &serde_json::to_string_pretty(&layers)?)?,
            }
        }
        Command::Rhythm => {
            let defaults = SimpleRhythm::default();
            let rhythm = SimpleRhythm {
                note: param_i64(&cli.params, "note", defaults.note)?,
                note_duration: param_f64(&cli.params, "noteDuration", defaults.note_duration)?,
                interval: param_f64(&cli.params, "interval", defaults.interval)?,
                gesture_duration: param_f64(
                    &cli.params,
                    "gestureDuration",
                    defaults.gesture_duration,
                )?,
            };
            write_notes(output, &rhythm.generate()?)?;
        }
        Command::Generate => {
            let start = match cli.params.get("start") {
                Some(ParamValue::Text(name)) => name_to_note(name)
                    .with_context(|| format!("start '{}' is not a note name like C4", name))?,
                _ => {
                    let start = param_i64(&cli.params, "start", 60)?;
                    u8::try_from(start)
                        .ok()
                        .filter(|p| *p <= 127)
                        .with_context(|| format!("start must be between 0 and 127, got {}", start))?
                }
            };
            let count = param_i64(&cli.params, "count", 8)?.max(0) as usize;
            let length = param_f64(&cli.params, "length", 0.25)?;
            write_notes(output, &scale_run(&scale, start, count, length, DEFAULT_VELOCITY)?)?;
        }
        Command::ExportMidi => {
            let melody = load_melody(cli, &settings, &scale)?;
            let path = output.context("export-midi requires --output")?;
            export_to_midi(&melody, &ExportOptions::default(), path)
                .with_context(|| format!("Failed to export {}", path.display()))?;
        }
        Command::ImportMidi => {
            let path = cli.require_input()?;
            let melody = import_from_midi(path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            write_notes(output, &melody)?;
        }
        Command::Decouple => {
            let melody = load_melody(cli, &settings, &scale)?;
            let decoupled = to_decoupled(&melody, cli.duration_type(), &scale);
            write_text(output, &serde_json::to_string_pretty(&decoupled)?)?;
        }
        Command::Session => {
            let session = load_session(cli.require_input()?)?;
            match output {
                Some(path) if is_midi_file(path) => session.export_to_midi(path)?,
                _ => {
                    let export = session.export_decoupled(cli.duration_type(), &scale)?;
                    write_text(output, &serde_json::to_string_pretty(&export)?)?;
                }
            }
        }
        Command::Live => {
            let sender = UdpLiveSender::connect(&cli.target)
                .with_context(|| format!("Failed to open live connection to {}", cli.target))?;
            let session = cli
                .input
                .as_deref()
                .filter(|path| !is_midi_file(path))
                .and_then(|path| load_session(path).ok());
            if let Some(session) = session {
                let sent = session.push_live(&sender);
                eprintln!("Sent {} layers to {}", sent, sender.target());
            } else {
                let melody = load_melody(cli, &settings, &scale)?;
                push_layer(&sender, cli.layer, &melody);
                eprintln!("Sent {} notes to {} as {}", melody.len(), sender.target(), cli.layer);
            }
        }
    }
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    run(&cli)
}
