/// Image-to-glyph conversion for glyphcast.
///
/// Turns decoded RGB24 frames into `AsciiFrame`s: luminance mapping on a
/// fixed ramp, gamma/contrast, ordered dithering, palette quantization and
/// the pre-baked SGR byte stream the presenter writes verbatim.

pub mod dither;
pub mod renderer;
pub mod sgr;

pub use renderer::{AsciiRenderer, RAMP};
