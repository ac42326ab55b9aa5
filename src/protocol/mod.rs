//! Protocol primitives: buffer streams, integer codecs, and string types.
//!
//! Everything on the wire reduces to the types in this module. Fixed-width
//! integers and floats travel big-endian; lengths and identifiers travel as
//! variable-length integers (7 payload bits per byte, high bit set while
//! more bytes follow); text travels as UTF-8 with either a variable-length
//! or a 16-bit byte-count prefix, and is held in memory as UTF-16 code
//! units, the way the game's original runtime represents strings.

mod buffer;
pub mod text;
mod wire;

pub use buffer::{ByteReader, ByteWriter, Mark};
pub use text::JavaString;
pub use wire::WireError;

/// The code-unit bound applied to protocol strings by default.
pub const DEFAULT_STRING_BOUND: usize = 32767;
