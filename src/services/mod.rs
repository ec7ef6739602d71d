//! Collaborator services
//!
//! I/O-facing pieces the processing pipeline depends on through traits:
//! - `codec`: decoding sources and encoding results
//! - `format`: per-format conversion and naming
//! - `sink`: persisting finished results
//! - `clipboard`: reading and writing clipboard bitmaps
//! - `vector`: SVG rasterization (`svg` feature)

pub mod clipboard;
pub mod codec;
pub mod format;
pub mod sink;
#[cfg(feature = "svg")]
pub mod vector;

#[cfg(feature = "clipboard")]
pub use clipboard::SystemClipboard;
pub use clipboard::{ClipboardProvider, MemoryClipboard};
pub use codec::{is_supported, ImageCodec, ImageCrateCodec, SUPPORTED_EXTENSIONS};
pub use format::OutputFormatHandler;
pub use sink::{suggested_file_name, ExportUnit, FileResultSink, ResultSink, SaveOutcome};
