//! zmusic CLI - compile MML to ZMUSIC blobs and render them through the relay.

use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use zmusic::config::Config;
use zmusic::engine::{EngineHandle, EnginePayload};
use zmusic::format::MAGIC;
use zmusic::relay::{relay, AudioFrameBlock};
use zmusic::rt::{interleave_into, quantum_period, render_offline, RenderCallback, RenderThread};
use zmusic::tone::ToneEngine;
use zmusic::{compile_text, sanitize, BinaryBlob, Result};

#[derive(Parser)]
#[command(name = "zmusic")]
#[command(about = "ZMUSIC MML compiler and relay renderer", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an MML text file into a binary blob
    Compile {
        /// Input MML text file
        input: PathBuf,

        /// Output blob path
        output: PathBuf,
    },

    /// Print the sanitized form of an MML text file
    Sanitize {
        /// Input MML text file
        input: PathBuf,
    },

    /// Decode a blob and print its tempo and notes
    Inspect {
        /// Blob file
        input: PathBuf,
    },

    /// Play MML text or a blob through the reference engine into a WAV file
    Render {
        /// Input MML text file or blob. A file that starts with the blob
        /// magic but does not decode is read as MML text.
        input: PathBuf,

        /// Output WAV file path
        output: PathBuf,

        /// Drive the render callback from a timed thread instead of offline
        #[arg(long)]
        realtime: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Usage mistakes exit 1; help and version are not failures.
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Compile { input, output } => {
            let text = read_text(&input)?;
            let compiled = compile_text(&text, &config.compiler)?;
            for warning in &compiled.warnings {
                warn!(%warning, "sanitizer diagnostic");
            }
            std::fs::write(&output, compiled.blob.as_bytes())?;
            println!(
                "Compiled {} -> {} ({} bytes, tempo {}, {} notes)",
                input.display(),
                output.display(),
                compiled.blob.len(),
                compiled.tempo,
                compiled.notes.len()
            );
        }
        Commands::Sanitize { input } => {
            let text = read_text(&input)?;
            let sanitized = sanitize(&text);
            for warning in sanitized.warnings() {
                warn!(%warning, "sanitizer diagnostic");
            }
            println!("{}", sanitized.text());
        }
        Commands::Inspect { input } => {
            let bytes = read_bytes(&input)?;
            let decoded = BinaryBlob::decode(&bytes)?;
            println!("version:     {}", decoded.version);
            println!("tempo width: {} bits", decoded.tempo_width.bits());
            println!("tempo:       {}", decoded.tempo);
            println!("notes ({}):  {}", decoded.notes.len(), decoded.note_string());
        }
        Commands::Render {
            input,
            output,
            realtime,
        } => render(&config, &input, &output, realtime)?,
    }
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input file does not exist: {}", path.display()),
        )
        .into());
    }
    Ok(std::fs::read(path)?)
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = read_bytes(path)?;
    // Invalid UTF-8 is untrusted input like any other; the sanitizer drops it.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render(config: &Config, input: &Path, output: &Path, realtime: bool) -> Result<()> {
    let opts = &config.render;
    let bytes = read_bytes(input)?;

    let engine = ToneEngine::new(opts.sample_rate, opts.quantum)
        .with_amplitude(opts.amplitude)
        .with_compiler(config.compiler.clone());
    let mut handle = EngineHandle::new(engine);
    handle.install()?;

    let blocks = match read_blob(&bytes) {
        Some(blob) => handle.play(EnginePayload::Blob(&blob))?,
        None => {
            let text = sanitize(&String::from_utf8_lossy(&bytes)).into_text();
            handle.play(EnginePayload::Text(&text))?
        }
    };
    info!(blocks = blocks.len(), realtime, "streaming through relay");

    let samples = if realtime {
        stream_realtime(config, blocks)?
    } else {
        let (mut publisher, consumer) = relay();
        let mut callback = RenderCallback::new(consumer);
        render_offline(
            &mut publisher,
            &mut callback,
            blocks,
            opts.quantum,
            opts.channels,
        )
    };

    let spec = WavSpec {
        channels: opts.channels as u16,
        sample_rate: opts.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, spec)?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    let seconds = samples.len() as f64 / (opts.channels as f64 * f64::from(opts.sample_rate));
    println!("Rendered {} -> {} ({:.2}s)", input.display(), output.display(), seconds);
    Ok(())
}

/// The input as a blob, if it is one.
fn read_blob(bytes: &[u8]) -> Option<BinaryBlob> {
    if !bytes.starts_with(MAGIC) {
        return None;
    }
    match BinaryBlob::from_bytes(bytes.to_vec()) {
        Ok(blob) => Some(blob),
        Err(err) => {
            warn!(%err, "input starts with the blob magic but does not decode; reading it as MML text");
            None
        }
    }
}

/// Publish blocks at the render thread's pace and collect what it renders.
fn stream_realtime(config: &Config, blocks: Vec<AudioFrameBlock>) -> Result<Vec<f32>> {
    let opts = &config.render;
    let period = quantum_period(opts.quantum, opts.sample_rate);
    let capacity = opts.sample_rate as usize * opts.channels;
    let (mut sample_tx, mut sample_rx) = rtrb::RingBuffer::<f32>::new(capacity);

    let (mut publisher, consumer) = relay();
    let mut scratch = Vec::with_capacity(opts.quantum * opts.channels);
    let render_thread = RenderThread::spawn(
        RenderCallback::new(consumer),
        opts.quantum,
        opts.channels,
        period,
        move |outputs: &[Vec<f32>]| {
            scratch.clear();
            interleave_into(outputs, &mut scratch);
            for &sample in &scratch {
                // A full ring means the control thread fell behind; drop.
                let _ = sample_tx.push(sample);
            }
        },
    )?;

    let mut collected = Vec::new();
    let poll = period / 4;
    for block in blocks {
        while publisher.is_pending() {
            drain(&mut sample_rx, &mut collected);
            thread::sleep(poll);
        }
        publisher.publish(block);
    }
    while publisher.is_pending() {
        thread::sleep(poll);
    }
    thread::sleep(period * 2 + Duration::from_millis(1));

    if let Some(callback) = render_thread.stop() {
        info!(
            quanta = callback.quanta(),
            delivered = callback.delivered(),
            "render thread stopped"
        );
    }
    drain(&mut sample_rx, &mut collected);
    Ok(collected)
}

fn drain(rx: &mut rtrb::Consumer<f32>, into: &mut Vec<f32>) {
    while let Ok(sample) = rx.pop() {
        into.push(sample);
    }
}
