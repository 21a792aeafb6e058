use animsurface::protocol::{IpcCommand, IpcResponse};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;

/// A command waiting for the main loop, plus where to send its answer.
pub struct Request {
    pub command: IpcCommand,
    pub reply: Sender<IpcResponse>,
}

impl Request {
    /// Hands `command` to the main loop and blocks until it answers.
    fn round_trip(commands: &Sender<Request>, command: IpcCommand) -> IpcResponse {
        let (reply, answer) = mpsc::channel();
        if commands.send(Request { command, reply }).is_err() {
            return IpcResponse::Error {
                message: "Daemon is shutting down".to_string(),
            };
        }
        answer.recv().unwrap_or_else(|_| IpcResponse::Error {
            message: "Daemon dropped the command".to_string(),
        })
    }
}

/// Control socket of the daemon. Each connection gets its own thread and may
/// send any number of JSON lines; every line is answered with one line.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Binds `path`, replacing a stale socket left by an earlier run.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }
        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind IPC socket {}", path.display()))?;
        tracing::info!(event = "ipc_listen", path = %path.display(), "IPC server listening");
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts clients until the listener fails for good.
    pub fn serve(self, commands: Sender<Request>) {
        for (id, incoming) in self.listener.incoming().enumerate() {
            let stream = match incoming {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(event = "ipc_accept_error", error = %e, "IPC accept failed");
                    continue;
                }
            };
            let commands = commands.clone();
            let spawned = thread::Builder::new()
                .name(format!("animsurface-ipc-{id}"))
                .spawn(move || {
                    if let Err(e) = Session::new(id, stream).run(&commands) {
                        tracing::warn!(event = "ipc_client_error", client = id, error = %e, "Client session failed");
                    }
                });
            if let Err(e) = spawned {
                tracing::warn!(event = "ipc_spawn_error", client = id, error = %e, "Could not serve client");
            }
        }
    }
}

struct Session {
    id: usize,
    stream: UnixStream,
}

impl Session {
    fn new(id: usize, stream: UnixStream) -> Self {
        Self { id, stream }
    }

    fn run(self, commands: &Sender<Request>) -> Result<()> {
        tracing::debug!(event = "ipc_client_begin", client = self.id, "Client connected");
        let mut writer = self.stream.try_clone()?;

        for line in BufReader::new(self.stream).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let response = Self::answer(self.id, commands, &line);
            serde_json::to_writer(&mut writer, &response)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        tracing::debug!(event = "ipc_client_end", client = self.id, "Client disconnected");
        Ok(())
    }

    fn answer(id: usize, commands: &Sender<Request>, line: &str) -> IpcResponse {
        match serde_json::from_str::<IpcCommand>(line.trim()) {
            Ok(command) => {
                tracing::info!(event = "ipc_command", client = id, ?command, "Received command");
                Request::round_trip(commands, command)
            }
            Err(e) => IpcResponse::Error {
                message: format!("Invalid JSON command: {}", e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(stream: &mut UnixStream, line: &str) -> IpcResponse {
        writeln!(stream, "{}", line).unwrap();
        let mut reply = String::new();
        BufReader::new(stream.try_clone().unwrap()).read_line(&mut reply).unwrap();
        serde_json::from_str(reply.trim()).unwrap()
    }

    #[test]
    fn commands_reach_main_loop_and_replies_return() {
        let dir = tempfile::tempdir().unwrap();
        let server = IpcServer::bind(&dir.path().join("test.sock")).unwrap();
        let path = server.path().to_path_buf();

        let (tx, rx) = mpsc::channel::<Request>();
        thread::spawn(move || server.serve(tx));
        thread::spawn(move || {
            for request in rx {
                let response = match request.command {
                    IpcCommand::Pause => IpcResponse::Success,
                    other => IpcResponse::Error {
                        message: format!("{:?}", other),
                    },
                };
                let _ = request.reply.send(response);
            }
        });

        let mut stream = UnixStream::connect(&path).unwrap();
        assert_eq!(exchange(&mut stream, r#""Pause""#), IpcResponse::Success);
        assert!(matches!(
            exchange(&mut stream, "not json"),
            IpcResponse::Error { message } if message.starts_with("Invalid JSON")
        ));
    }

    #[test]
    fn bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        drop(UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        assert!(IpcServer::bind(&path).is_ok());
    }

    #[test]
    fn closed_main_loop_is_reported() {
        let (tx, rx) = mpsc::channel::<Request>();
        drop(rx);
        assert!(matches!(
            Request::round_trip(&tx, IpcCommand::Status),
            IpcResponse::Error { .. }
        ));
    }
}
