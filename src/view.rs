use anyhow::{Result, anyhow};
use std::sync::Arc;

use crate::config::ViewConfig;
use crate::lifecycle::{SurfaceLifecycle, SurfaceState, Transition};
use crate::media::FrameDecoder;
use crate::player::{PlaybackCallback, PlaybackLoop, PlaybackState};
use crate::sequence::{FrameSequence, SequenceId, SequenceSource};
use crate::surface::Surface;

/// Frame-by-frame animation bound to one drawing surface.
///
/// The host drives it with `start`/`pause`/`resume`/`set_sequence` and
/// forwards the surface's created/changed/destroyed events.
pub struct AnimSurfaceView {
    config: ViewConfig,
    source: Arc<dyn SequenceSource>,
    player: PlaybackLoop,
    lifecycle: SurfaceLifecycle,
    sequence_id: Option<SequenceId>,
}

impl AnimSurfaceView {
    pub fn bind(
        config: ViewConfig,
        source: Arc<dyn SequenceSource>,
        decoder: Arc<dyn FrameDecoder>,
        surface: Arc<dyn Surface>,
    ) -> Result<Self> {
        config.validate()?;

        let player = PlaybackLoop::new(decoder, surface);
        player.set_interval(config.interval_ms);

        let sequence_id = config.sequence_id();
        let sequence = match &sequence_id {
            Some(id) => source.resolve(id)?,
            None => FrameSequence::empty(),
        };
        player.configure_sequence(sequence);

        tracing::info!(
            event = "view_bind",
            sequence = sequence_id.as_ref().map(SequenceId::as_str),
            interval_ms = config.interval_ms,
            auto_start = config.auto_start,
            "View bound"
        );

        Ok(Self {
            lifecycle: SurfaceLifecycle::new(config.auto_start),
            config,
            source,
            player,
            sequence_id,
        })
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn set_callback(&self, callback: Option<Arc<dyn PlaybackCallback>>) {
        self.player.set_callback(callback);
    }

    /// Starts playback, or arms it for when the surface is created.
    pub fn start(&mut self) -> Result<()> {
        if self.lifecycle.state() == SurfaceState::Destroyed {
            return Err(anyhow!("Cannot start playback on a destroyed surface"));
        }
        let transition = self.lifecycle.on_start_requested();
        self.apply(transition)
    }

    pub fn pause(&self) {
        self.player.pause();
    }

    pub fn resume(&self) {
        self.player.resume();
    }

    /// Switches to another frame array. Re-selecting the current one keeps
    /// the playback position.
    pub fn set_sequence(&mut self, id: SequenceId) -> Result<()> {
        if self.sequence_id.as_ref() == Some(&id) {
            return Ok(());
        }
        let sequence = self.source.resolve(&id)?;
        tracing::info!(event = "sequence_switch", sequence = %id, frames = sequence.len(), "Switching sequence");

        self.player.configure_sequence(sequence);
        self.config.sequence = Some(id.0.clone());
        self.sequence_id = Some(id);
        Ok(())
    }

    pub fn set_interval(&mut self, interval_ms: u64) -> Result<()> {
        let config = ViewConfig {
            interval_ms,
            ..self.config.clone()
        };
        config.validate()?;
        self.player.set_interval(interval_ms);
        self.config = config;
        Ok(())
    }

    pub fn sequence_id(&self) -> Option<&SequenceId> {
        self.sequence_id.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.player.snapshot()
    }

    pub fn surface_state(&self) -> SurfaceState {
        self.lifecycle.state()
    }

    pub fn surface_created(&mut self) -> Result<()> {
        let transition = self.lifecycle.on_created();
        self.apply(transition)
    }

    pub fn surface_changed(&mut self, width: u32, height: u32) -> Result<()> {
        let transition = self.lifecycle.on_changed(width, height);
        self.apply(transition)
    }

    /// Returns once the draw thread can no longer touch the surface.
    pub fn surface_destroyed(&mut self) -> Result<()> {
        let transition = self.lifecycle.on_destroyed();
        self.apply(transition)
    }

    fn apply(&mut self, transition: Transition) -> Result<()> {
        match transition {
            Transition::None => Ok(()),
            Transition::AutoStart => self.player.start(),
            Transition::Stop => {
                self.player.stop_and_join();
                Ok(())
            }
        }
    }
}
