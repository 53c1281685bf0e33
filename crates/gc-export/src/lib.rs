/// Export pipeline for glyphcast.
///
/// Rasterizes `AsciiFrame`s into RGB24 images through an 8×16 bitmap glyph
/// atlas (nearest-neighbor scaled to the configured cell size) and feeds
/// them to an H.264 encoder.

pub mod encoder;
pub mod font;
pub mod rasterizer;

pub use encoder::{ExportConfig, ExportError, Exporter};
pub use rasterizer::Rasterizer;
