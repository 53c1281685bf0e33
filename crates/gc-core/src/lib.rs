/// Configuration, types, and shared structures for glyphcast.
///
/// This crate contains the frame/cell data model, the color lookup
/// utilities, the bounded closable queue and the playback clock used
/// across the glyphcast workspace.

pub mod clock;
pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod queue;

pub use clock::PlaybackClock;
pub use config::{DitherMode, RenderMode, RendererConfig};
pub use error::CoreError;
pub use frame::{AsciiCell, AsciiFrame, AudioFrame, VideoFrame};
pub use queue::BoundedQueue;
