use animsurface::protocol::{IpcCommand, IpcResponse, default_socket_path};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "animsurface")]
#[command(about = "A small cli for animsurface-daemon")]
struct Args {
    #[arg(long)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Start,
    Pause,
    Resume,
    /// Switch to a sequence, or to the next one in the manifest
    Switch { sequence: Option<String> },
    Resize { width: u32, height: u32 },
    Status,
    Quit,
}

impl From<Commands> for IpcCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Start => IpcCommand::Start,
            Commands::Pause => IpcCommand::Pause,
            Commands::Resume => IpcCommand::Resume,
            Commands::Switch { sequence } => IpcCommand::Switch { sequence },
            Commands::Resize { width, height } => IpcCommand::Resize { width, height },
            Commands::Status => IpcCommand::Status,
            Commands::Quit => IpcCommand::Quit,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let socket_path = args
        .socket
        .map(|s| PathBuf::from(shellexpand::tilde(&s).into_owned()))
        .unwrap_or_else(default_socket_path);
    let mut stream = UnixStream::connect(&socket_path)
        .map_err(|e| anyhow!("Failed to connect to {}: {}", socket_path.display(), e))?;

    let command = IpcCommand::from(args.command);
    writeln!(stream, "{}", serde_json::to_string(&command)?)?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response)?;

    match serde_json::from_str::<IpcResponse>(response.trim())? {
        IpcResponse::Error { message } => Err(anyhow!(message)),
        other => {
            println!("{}", serde_json::to_string_pretty(&other)?);
            Ok(())
        }
    }
}
