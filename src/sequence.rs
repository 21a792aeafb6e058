use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ViewConfig;

/// Opaque handle of a single frame. The bundled decoder treats it as a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl FrameId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(s: &str) -> Self {
        FrameId(s.to_string())
    }
}

/// Name of a frame array inside a [`SequenceSource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub String);

impl SequenceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceId {
    fn from(s: &str) -> Self {
        SequenceId(s.to_string())
    }
}

/// Ordered frames of one animation. Frames may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<FrameId>,
}

impl FrameSequence {
    pub fn new(frames: Vec<FrameId>) -> Self {
        Self { frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameId> {
        self.frames.get(index)
    }

    /// Frame for a free-running counter, wrapped to the sequence length.
    pub fn frame_at(&self, counter: usize) -> Option<(usize, &FrameId)> {
        if self.frames.is_empty() {
            return None;
        }
        let index = counter % self.frames.len();
        Some((index, &self.frames[index]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameId> {
        self.frames.iter()
    }
}

impl FromIterator<FrameId> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = FrameId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

pub trait SequenceSource: Send + Sync {
    fn resolve(&self, id: &SequenceId) -> Result<FrameSequence>;

    /// Known sequence names in a stable order.
    fn sequence_ids(&self) -> Vec<SequenceId> {
        Vec::new()
    }
}

/// JSON manifest mapping sequence names to frame paths.
///
/// ```json
/// {
///   "base_dir": "~/frames",
///   "view": { "sequence": "fr", "interval_ms": 80 },
///   "sequences": { "fr": ["fr/001.png", "fr/002.png"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub base_dir: Option<String>,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub sequences: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    root: PathBuf,
}

impl Manifest {
    pub fn load(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).into_owned();
        let raw = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read manifest {}", expanded))?;
        let parent = Path::new(&expanded)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let manifest = Self::from_json(&raw, parent)
            .with_context(|| format!("Invalid manifest {}", expanded))?;

        tracing::info!(
            event = "manifest_loaded",
            path = %expanded,
            sequences = manifest.sequences.len(),
            "Loaded frame manifest"
        );
        Ok(manifest)
    }

    /// Parses a manifest whose relative paths are anchored at `dir`
    /// unless it carries its own `base_dir`.
    pub fn from_json(raw: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        let mut manifest: Manifest = serde_json::from_str(raw)?;
        manifest.root = match &manifest.base_dir {
            Some(base) => PathBuf::from(shellexpand::tilde(base).into_owned()),
            None => dir.into(),
        };
        Ok(manifest)
    }

    fn frame_path(&self, entry: &str) -> String {
        let expanded = shellexpand::tilde(entry).into_owned();
        let path = Path::new(&expanded);
        if path.is_absolute() {
            expanded
        } else {
            self.root.join(path).to_string_lossy().into_owned()
        }
    }
}

impl SequenceSource for Manifest {
    fn resolve(&self, id: &SequenceId) -> Result<FrameSequence> {
        let entries = self
            .sequences
            .get(id.as_str())
            .ok_or_else(|| anyhow!("Unknown sequence {}", id))?;

        let sequence: FrameSequence = entries
            .iter()
            .map(|entry| FrameId(self.frame_path(entry)))
            .collect();

        tracing::debug!(
            event = "sequence_resolved",
            sequence = %id,
            frames = sequence.len(),
            "Resolved frame sequence"
        );
        Ok(sequence)
    }

    fn sequence_ids(&self) -> Vec<SequenceId> {
        self.sequences.keys().map(|k| SequenceId(k.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_at_wraps_counter() {
        let seq: FrameSequence = ["a", "b", "c"].into_iter().map(FrameId::from).collect();
        assert_eq!(seq.frame_at(0).map(|(i, _)| i), Some(0));
        assert_eq!(seq.frame_at(4).map(|(_, f)| f.as_str()), Some("b"));
        assert!(FrameSequence::empty().frame_at(3).is_none());
    }

    #[test]
    fn manifest_resolves_relative_to_its_directory() {
        let raw = r#"{ "sequences": { "fr": ["fr/1.png", "/abs/2.png", "fr/1.png"] } }"#;
        let manifest = Manifest::from_json(raw, "/data/anim").unwrap();
        let seq = manifest.resolve(&SequenceId::from("fr")).unwrap();

        let frames: Vec<_> = seq.iter().map(|f| f.as_str().to_string()).collect();
        assert_eq!(frames, vec!["/data/anim/fr/1.png", "/abs/2.png", "/data/anim/fr/1.png"]);
    }

    #[test]
    fn manifest_base_dir_overrides_location() {
        let raw = r#"{ "base_dir": "/srv/frames", "sequences": { "wr": ["1.png"] } }"#;
        let manifest = Manifest::from_json(raw, "/ignored").unwrap();
        let seq = manifest.resolve(&SequenceId::from("wr")).unwrap();
        assert_eq!(seq.get(0).unwrap().as_str(), "/srv/frames/1.png");
    }

    #[test]
    fn unknown_sequence_is_an_error() {
        let manifest = Manifest::from_json(r#"{ "sequences": {} }"#, "/").unwrap();
        assert!(manifest.resolve(&SequenceId::from("missing")).is_err());
    }

    #[test]
    fn manifest_carries_view_defaults() {
        let raw = r#"{ "view": { "sequence": "fr", "auto_start": true }, "sequences": { "fr": [], "wr": [] } }"#;
        let manifest = Manifest::from_json(raw, "/").unwrap();
        assert_eq!(manifest.view.sequence.as_deref(), Some("fr"));
        assert_eq!(manifest.view.interval_ms, 100);
        assert!(manifest.view.auto_start);
        assert_eq!(
            manifest.sequence_ids(),
            vec![SequenceId::from("fr"), SequenceId::from("wr")]
        );
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.json");
        std::fs::write(&path, r#"{ "sequences": { "fr": ["a.png"] } }"#).unwrap();

        let manifest = Manifest::load(path.to_str().unwrap()).unwrap();
        let seq = manifest.resolve(&SequenceId::from("fr")).unwrap();
        assert_eq!(
            seq.get(0).unwrap().as_str(),
            dir.path().join("a.png").to_string_lossy()
        );
    }
}
