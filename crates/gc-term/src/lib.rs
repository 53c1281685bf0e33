/// Terminal sink for glyphcast.
///
/// Owns the raw-mode lifecycle and the stdout hot path: `present` copies a
/// frame's pre-baked SGR bytes verbatim and flushes; no formatting happens
/// here. Only the presenter thread writes to stdout.

pub mod sink;

pub use sink::TerminalSink;
