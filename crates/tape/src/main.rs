//! tape - inputtape CLI
//!
//! Record keyboard/mouse macros with global hotkeys and replay them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inputtape::prelude::*;
use inputtape::recorder::config::CONFIG_FILE;
use inputtape::recorder::{storage, LogSummary};

#[derive(Parser)]
#[command(name = "tape")]
#[command(about = "inputtape - record and replay keyboard/mouse macros")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.inputtape/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print structured JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hotkey mode: toggle recording, playback and loop with F5/F6/F7
    Run {
        /// Recording name
        #[arg(short, long)]
        name: Option<String>,

        /// Save every finished recording to the storage dir
        #[arg(long)]
        save: bool,

        /// Start with loop mode on
        #[arg(long = "loop")]
        looping: bool,
    },

    /// Replay a saved recording
    Play {
        /// Recording file
        file: String,

        /// Repeat until Ctrl+C
        #[arg(long = "loop")]
        looping: bool,

        /// Playback speed (1.0 = realtime, 2.0 = 2x)
        #[arg(short, long)]
        speed: Option<f64>,

        /// Delay before the first event, in milliseconds
        #[arg(long, default_value = "2000")]
        delay_ms: u64,
    },

    /// List saved recordings
    List,

    /// Show recording info
    Show {
        /// Recording file
        file: String,

        /// Show all events
        #[arg(long)]
        all: bool,
    },

    /// Delete a recording
    Delete {
        /// Recording file
        file: String,
    },

    /// Show tracked keys and hotkeys
    Keys,

    /// Print the effective configuration
    Config {
        /// Write it to the default config file if none exists
        #[arg(long)]
        write: bool,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    fn err(e: Error) -> Output<()> {
        Output {
            success: false,
            data: None,
            error: Some(e),
        }
    }
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Run { name, save, looping } => run(config, name, save, looping),
        Commands::Play {
            file,
            looping,
            speed,
            delay_ms,
        } => play(&config, &file, looping, speed, delay_ms),
        Commands::List => list(&config, json),
        Commands::Show { file, all } => show(&config, &file, all, json),
        Commands::Delete { file } => delete(&config, &file),
        Commands::Keys => keys(&config),
        Commands::Config { write } => show_config(&config, write),
    });

    if let Err(e) = result {
        if json {
            let err = e
                .downcast_ref::<Error>()
                .cloned()
                .unwrap_or_else(|| Error::new(ErrorCode::Unknown, e.to_string()));
            let _ = print_json(&Output::<()>::err(err));
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    }
}

fn key_name(config: &Config, code: u16) -> String {
    match code {
        0x70..=0x87 => format!("F{}", code - 0x6F),
        _ => config
            .tracked_keys()
            .label(KeyId(code))
            .map(str::to_string)
            .unwrap_or_else(|| KeyId(code).to_string()),
    }
}

/// Print status lines until every sender is gone
fn spawn_printer(rx: inputtape::recorder::Receiver<StatusEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for status in rx.iter() {
            println!("{}", status);
        }
    })
}

// ── Hotkey mode ─────────────────────────────────────────────────────────────

fn run(config: Config, name: Option<String>, save: bool, looping: bool) -> Result<()> {
    let probe = inputtape::system_probe()?;
    let mut controller_config = config.controller_config();
    if let Some(name) = name {
        controller_config.recording_name = name;
    }

    let (sink, rx) = StatusSink::channel();
    let printer = spawn_printer(rx);

    let mut controller = ModeController::new(probe, controller_config, sink).looping(looping);
    if save {
        let storage = config.storage()?;
        controller = controller.on_recorded(move |recording| {
            if recording.is_empty() {
                return;
            }
            match storage.save(recording) {
                Ok(path) => println!("Saved: {}", path.display()),
                Err(e) => tracing::error!(error = %e, "failed to save recording"),
            }
        });
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let s = shutdown.clone();
    ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    })?;

    println!("inputtape started! (Ctrl+C to quit)");
    println!("{}: Toggle Recording Start/Stop", key_name(&config, config.hotkeys.record));
    println!("{}: Toggle Playback Start/Stop", key_name(&config, config.hotkeys.playback));
    println!("{}: Toggle Loop Mode ON/OFF", key_name(&config, config.hotkeys.toggle_loop));
    println!("Loop mode: {}", if looping { "ON" } else { "OFF" });
    println!("Recording these keys: {}", config.tracked_keys().labels().join(", "));

    controller.run(&shutdown)?;
    drop(controller);
    let _ = printer.join();
    Ok(())
}

// ── Recording files ─────────────────────────────────────────────────────────

fn play(
    config: &Config,
    file: &str,
    looping: bool,
    speed: Option<f64>,
    delay_ms: u64,
) -> Result<()> {
    let storage = config.storage()?;
    let recording = storage.load(file)?;
    let probe = inputtape::system_probe()?;

    let mut player_config = config.player_config();
    if let Some(speed) = speed {
        player_config = player_config.with_speed(speed);
    }
    let speed = player_config.speed;

    let (sink, rx) = StatusSink::channel();
    let printer = spawn_printer(rx);
    let player = Player::with_config(probe, player_config).status(sink);

    let control = PlaybackControl::new(looping);
    let c = control.clone();
    ctrlc::set_handler(move || c.cancel())?;

    println!(
        "Replaying {} ({} events, {:.1}s) at {}x speed...",
        recording.name,
        recording.events.len(),
        recording.events.duration().as_secs_f64(),
        speed
    );
    if delay_ms > 0 {
        println!("Starting in {:.1} seconds...", delay_ms as f64 / 1000.0);
        thread::sleep(Duration::from_millis(delay_ms));
    }

    let result = player.play(&recording, &control);
    drop(player);
    let _ = printer.join();
    let report = result?;
    println!(
        "Done! {} passes, {} events, {} keys force-released",
        report.passes, report.events_dispatched, report.keys_released
    );
    Ok(())
}

fn list(config: &Config, json: bool) -> Result<()> {
    let storage = config.storage()?;
    let files = storage.list()?;
    if json {
        return print_json(&Output::ok(files));
    }
    if files.is_empty() {
        println!("No recordings saved.");
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RecordingInfo<'a> {
    name: &'a str,
    started_at: String,
    events: usize,
    duration_ms: u128,
    summary: LogSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<&'a EventLog>,
}

fn show(config: &Config, file: &str, all: bool, json: bool) -> Result<()> {
    let storage = config.storage()?;
    let recording = storage.load(file)?;
    let summary = recording.events.summary();

    if json {
        return print_json(&Output::ok(RecordingInfo {
            name: &recording.name,
            started_at: recording.started_at.to_rfc3339(),
            events: recording.events.len(),
            duration_ms: recording.events.duration().as_millis(),
            summary,
            log: all.then_some(&recording.events),
        }));
    }

    println!("Name: {}", recording.name);
    println!("Recorded: {}", recording.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Events: {}", recording.events.len());
    println!("Duration: {:.2}s", recording.events.duration().as_secs_f64());
    println!(
        "\nSummary: {} key downs, {} key ups, {} moves, {} clicks",
        summary.key_downs, summary.key_ups, summary.moves, summary.clicks
    );
    if all {
        for (i, e) in recording.events.iter().enumerate() {
            match recording.wall_time(e) {
                Some(at) => println!(
                    "{}: {} {:>7}ms {:?}",
                    i,
                    at.format("%H:%M:%S%.3f"),
                    e.t,
                    e.action
                ),
                None => println!("{}: {:>7}ms {:?}", i, e.t, e.action),
            }
        }
    }
    Ok(())
}

fn delete(config: &Config, file: &str) -> Result<()> {
    let storage = config.storage()?;
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}

fn keys(config: &Config) -> Result<()> {
    println!("Tracked keys:");
    for (key, label) in config.tracked_keys().iter() {
        println!("  {}  {}", key, label);
    }
    println!("\nHotkeys:");
    println!("  record      {}", key_name(config, config.hotkeys.record));
    println!("  playback    {}", key_name(config, config.hotkeys.playback));
    println!("  toggle loop {}", key_name(config, config.hotkeys.toggle_loop));
    Ok(())
}

fn show_config(config: &Config, write: bool) -> Result<()> {
    let text = config.to_toml()?;
    if write {
        let path = storage::default_dir()?.join(CONFIG_FILE);
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&path, &text)?;
            println!("Wrote: {}", path.display());
        }
        return Ok(());
    }
    print!("{}", text);
    Ok(())
}
