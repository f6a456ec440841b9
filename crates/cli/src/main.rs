mod bridge;
mod commands;
mod host;
mod timers;

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use cachedump_engine::{DumpMode, Engine, Settings};
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "cachedump",
    version,
    about = "Save mpv's demuxer cache to disk from outside the player"
)]
struct Cli {
    /// Socket passed to mpv with --input-ipc-server.
    #[arg(long)]
    socket: PathBuf,
    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_parser = parse_mode)]
    mode: Option<DumpMode>,
    #[arg(long)]
    autostart: bool,
    /// Extra option as key=value; may be repeated.
    #[arg(long = "set", value_parser = parse_assignment)]
    options: Vec<(String, String)>,
}

fn parse_mode(value: &str) -> Result<DumpMode, String> {
    DumpMode::parse(value).ok_or_else(|| format!("unknown dump mode `{value}`"))
}

fn parse_assignment(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got `{value}`"))
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "cachedump failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };
    if let Some(mode) = cli.mode {
        settings.dump_mode = mode;
    }
    if cli.autostart {
        settings.autostart = true;
    }
    for (key, value) in &cli.options {
        settings.apply(key, value)?;
    }
    Ok(settings)
}

#[cfg(unix)]
fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(&cli)?;
    info!(socket = %cli.socket.display(), mode = settings.dump_mode.as_str(), "connecting");

    let (client, reader) = mpv_ipc::connect(&cli.socket)?;
    let mut host = host::MpvHost::new(client);
    host.start()?;
    let messages = bridge::spawn_reader(reader);

    let mut engine = Engine::new(host, settings);
    bridge::run(&mut engine, &messages)?;
    Ok(())
}

#[cfg(not(unix))]
fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    load_settings(&cli)?;
    Err("mpv IPC sockets are only supported on unix".into())
}
