use animsurface::media::ImageDecoder;
use animsurface::protocol::{IpcCommand, IpcResponse, default_socket_path};
use animsurface::sequence::{Manifest, SequenceId, SequenceSource};
use animsurface::surface::SoftwareSurface;
use animsurface::{AnimSurfaceView, PlaybackCallback, ViewConfig};
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod ipc;

use ipc::{IpcServer, Request};

#[derive(Parser, Debug)]
#[command(
    name = "animsurface-daemon",
    version = "0.1.0",
    about = "Plays frame sequences onto a software surface, controlled over a Unix socket"
)]
struct Args {
    /// JSON manifest listing the frame sequences
    #[arg(short, long)]
    manifest: String,

    #[arg(short, long)]
    sequence: Option<String>,

    /// Milliseconds between frames
    #[arg(short, long)]
    interval: Option<u64>,

    #[arg(short, long)]
    auto_start: bool,

    #[arg(long, default_value = "320x240", value_parser = parse_size)]
    size: (u32, u32),

    /// Write every presented frame into this directory as PNG
    #[arg(short = 'D', long)]
    dump: Option<String>,

    #[arg(long)]
    socket: Option<String>,
}

fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("Expected WIDTHxHEIGHT, got {}", raw))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

struct LogCallback;

impl PlaybackCallback for LogCallback {
    fn on_started(&self) {
        info!(event = "animation_started", "Animation started");
    }

    fn on_stopped(&self) {
        info!(event = "animation_stopped", "Animation stopped");
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn view_config(args: &Args, manifest: &Manifest) -> ViewConfig {
    let defaults = &manifest.view;
    ViewConfig {
        sequence: args.sequence.clone().or_else(|| defaults.sequence.clone()),
        interval_ms: args.interval.unwrap_or(defaults.interval_ms),
        auto_start: args.auto_start || defaults.auto_start,
    }
}

/// Next manifest sequence after the current one, wrapping around.
fn next_sequence(source: &dyn SequenceSource, current: Option<&SequenceId>) -> Option<SequenceId> {
    let ids = source.sequence_ids();
    let position = current.and_then(|c| ids.iter().position(|id| id == c));
    match position {
        Some(i) => ids.get((i + 1) % ids.len()).cloned(),
        None => ids.first().cloned(),
    }
}

fn handle(
    command: IpcCommand,
    view: &mut AnimSurfaceView,
    source: &dyn SequenceSource,
    surface: &SoftwareSurface,
) -> Result<IpcResponse> {
    match command {
        IpcCommand::Start => view.start()?,
        IpcCommand::Pause => view.pause(),
        IpcCommand::Resume => view.resume(),
        IpcCommand::Switch { sequence } => {
            let id = match sequence {
                Some(name) => SequenceId(name),
                None => next_sequence(source, view.sequence_id())
                    .ok_or_else(|| anyhow!("Manifest has no sequences"))?,
            };
            view.set_sequence(id)?;
        }
        IpcCommand::Resize { width, height } => {
            surface.resize(width, height);
            view.surface_changed(width, height)?;
        }
        IpcCommand::Status => {
            let state = view.state();
            return Ok(IpcResponse::Status {
                enabled: state.enabled,
                paused: state.paused,
                current_index: state.current_index,
                interval_ms: state.interval_ms,
                frames: state.frames,
                sequence: view.sequence_id().map(|id| id.0.clone()),
                presented: surface.stats().presented,
            });
        }
        IpcCommand::Quit => {}
    }
    Ok(IpcResponse::Success)
}

fn main() -> Result<()> {
    init_logging()?;

    let args = Args::parse();

    let manifest = Arc::new(Manifest::load(&args.manifest)?);
    let config = view_config(&args, &manifest);

    let (width, height) = args.size;
    let mut surface = SoftwareSurface::new(width, height);
    if let Some(dir) = &args.dump {
        surface = surface.with_dump_dir(shellexpand::tilde(dir).into_owned())?;
    }
    let surface = Arc::new(surface);

    let source: Arc<dyn SequenceSource> = manifest.clone();
    let mut view = AnimSurfaceView::bind(config, source, Arc::new(ImageDecoder::new()), surface.clone())?;
    let callback: Arc<dyn PlaybackCallback> = Arc::new(LogCallback);
    view.set_callback(Some(callback));

    let socket_path = args
        .socket
        .as_deref()
        .map(|s| PathBuf::from(shellexpand::tilde(s).into_owned()))
        .unwrap_or_else(default_socket_path);

    let server = IpcServer::bind(&socket_path)?;
    let (tx, rx) = mpsc::channel::<Request>();
    thread::Builder::new()
        .name("animsurface-ipc".to_string())
        .spawn(move || server.serve(tx))?;

    info!(event = "daemon_start", width, height, "Starting animsurface daemon");
    view.surface_created()?;
    view.surface_changed(width, height)?;

    for request in rx {
        let quit = request.command == IpcCommand::Quit;
        let response = handle(request.command, &mut view, manifest.as_ref(), &surface)
            .unwrap_or_else(|e| IpcResponse::Error {
                message: e.to_string(),
            });
        let _ = request.reply.send(response);
        if quit {
            break;
        }
    }

    view.surface_destroyed()?;
    let _ = std::fs::remove_file(&socket_path);
    info!(event = "daemon_exit", presented = surface.stats().presented, "Daemon finished");
    Ok(())
}
