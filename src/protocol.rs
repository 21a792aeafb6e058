//! JSON-lines control protocol between the host daemon and its CLI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcCommand {
    Start,
    Pause,
    Resume,
    /// `None` steps to the next sequence of the manifest.
    Switch {
        #[serde(default)]
        sequence: Option<String>,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcResponse {
    Success,
    Error {
        message: String,
    },
    Status {
        enabled: bool,
        paused: bool,
        current_index: usize,
        interval_ms: u64,
        frames: usize,
        sequence: Option<String>,
        presented: u64,
    },
}

pub fn default_socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .or_else(|_| std::env::var("TMPDIR"))
        .unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("animsurface.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_externally_tagged_json() {
        let json = serde_json::to_string(&IpcCommand::Resize { width: 4, height: 2 }).unwrap();
        assert_eq!(json, r#"{"Resize":{"width":4,"height":2}}"#);
        assert_eq!(serde_json::to_string(&IpcCommand::Start).unwrap(), r#""Start""#);
    }

    #[test]
    fn switch_sequence_may_be_omitted() {
        let command: IpcCommand = serde_json::from_str(r#"{"Switch":{}}"#).unwrap();
        assert_eq!(command, IpcCommand::Switch { sequence: None });
    }
}
