//! Frame-by-frame animation playback onto a drawing surface.
//!
//! [`view::AnimSurfaceView`] ties a [`sequence::SequenceSource`], a
//! [`media::FrameDecoder`] and a [`surface::Surface`] to a single background
//! draw thread ([`player::PlaybackLoop`]) whose lifetime follows the surface.

pub mod config;
pub mod lifecycle;
pub mod media;
pub mod player;
pub mod protocol;
pub mod sequence;
pub mod surface;
pub mod view;

#[cfg(test)]
mod testing;

pub use config::ViewConfig;
pub use player::{PlaybackCallback, PlaybackState};
pub use view::AnimSurfaceView;
