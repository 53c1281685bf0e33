/// Audio playback for glyphcast.
///
/// Pull-model stereo PCM sink: the pump thread feeds a lock-free ring, the
/// device callback drains it, scales by the volume factor, zero-fills on
/// underrun and advances the shared playback clock. The clock is the A/V
/// master whenever audio is enabled.

pub mod output;

pub use output::{AudioError, AudioHandle, AudioOutput};
