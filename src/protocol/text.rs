//! String codecs.
//!
//! The game runtime represents text as UTF-16 code units while the wire
//! carries UTF-8, so the string types here transcode at the boundary.
//! [`JavaString`] deliberately permits unpaired surrogates: tag names and
//! scoreboard text produced by the original runtime can contain them, and
//! rejecting such data at decode time would drop otherwise valid packets.
//!
//! Two wire forms exist:
//!
//! - the protocol string: var32 byte count + UTF-8, bounded in code units
//!   (32767 by default, 0 disables the bound)
//! - the tag-tree string (`JString`): big-endian u16 byte count + UTF-8

use super::buffer::{ByteReader, ByteWriter};
use super::wire::WireError;

/// An owned sequence of UTF-16 code units.
///
/// Unlike [`String`], this type can hold unpaired surrogates; encoding one
/// back to UTF-8 fails with [`WireError::MalformedUtf16`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct JavaString(Vec<u16>);

impl JavaString {
    /// An empty string.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of UTF-16 code units.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the string holds no code units.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw code units.
    pub fn code_units(&self) -> &[u16] {
        &self.0
    }

    /// Build from raw code units.
    pub fn from_code_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    /// Lossy conversion to a Rust string; unpaired surrogates become
    /// U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }

    /// Encode to UTF-8 wire bytes.
    ///
    /// Fails with [`WireError::MalformedUtf16`] on any surrogate code unit
    /// that does not form a high/low pair.
    pub fn encode_utf8(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::with_capacity(self.0.len());
        let mut units = self.0.iter().copied().peekable();
        while let Some(unit) = units.next() {
            let cp = match unit {
                0xd800..=0xdbff => {
                    let low = match units.peek() {
                        Some(&low @ 0xdc00..=0xdfff) => {
                            units.next();
                            low
                        }
                        _ => return Err(WireError::MalformedUtf16),
                    };
                    0x10000 + ((u32::from(unit) & 0x3ff) << 10 | (u32::from(low) & 0x3ff))
                }
                0xdc00..=0xdfff => return Err(WireError::MalformedUtf16),
                _ => u32::from(unit),
            };
            match cp {
                0..=0x7f => out.push(cp as u8),
                0x80..=0x7ff => {
                    out.push(0xc0 | (cp >> 6) as u8);
                    out.push(0x80 | (cp & 0x3f) as u8);
                }
                0x800..=0xffff => {
                    out.push(0xe0 | (cp >> 12) as u8);
                    out.push(0x80 | ((cp >> 6) & 0x3f) as u8);
                    out.push(0x80 | (cp & 0x3f) as u8);
                }
                _ => {
                    out.push(0xf0 | (cp >> 18) as u8);
                    out.push(0x80 | ((cp >> 12) & 0x3f) as u8);
                    out.push(0x80 | ((cp >> 6) & 0x3f) as u8);
                    out.push(0x80 | (cp & 0x3f) as u8);
                }
            }
        }
        Ok(out)
    }
}

impl From<&str> for JavaString {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

impl From<&String> for JavaString {
    fn from(s: &String) -> Self {
        Self::from(s.as_str())
    }
}

impl PartialEq<str> for JavaString {
    fn eq(&self, other: &str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for JavaString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl std::fmt::Display for JavaString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// Decode exactly `byte_len` bytes of UTF-8 into UTF-16 code units.
///
/// A multi-byte sequence straddling the requested count consumes its
/// continuation bytes from the stream and then fails the exact-count
/// check, so a caller never observes a half-decoded string. Three-byte
/// encodings of the surrogate range are accepted for compatibility with
/// strings produced by the original runtime.
pub fn decode_utf8(reader: &mut ByteReader<'_>, byte_len: usize) -> Result<JavaString, WireError> {
    let mut units: Vec<u16> = Vec::with_capacity(byte_len / 2);
    let mut consumed = 0usize;
    while consumed < byte_len {
        let lead = reader.read_u8()?;
        consumed += 1;
        let (followed, mask, offset) = match lead {
            0x00..=0x7f => (0usize, 0x7fu32, 18u32),
            0xc0..=0xdf => (1, 0x1f, 12),
            0xe0..=0xef => (2, 0x0f, 6),
            0xf0..=0xf7 => (3, 0x07, 0),
            _ => return Err(WireError::MalformedUtf8),
        };
        let mut tail = [0x80u8; 3];
        if followed > 0 {
            reader.read_exact(&mut tail[..followed])?;
            consumed += followed;
        }
        if tail.iter().any(|b| b & 0xc0 != 0x80) {
            return Err(WireError::MalformedUtf8);
        }
        let cp = ((u32::from(lead) & mask) << 18
            | (u32::from(tail[0]) & 0x3f) << 12
            | (u32::from(tail[1]) & 0x3f) << 6
            | (u32::from(tail[2]) & 0x3f))
            >> offset;
        if cp < 0x10000 {
            units.push(cp as u16);
        } else {
            let cp = cp - 0x10000;
            units.push(0xd800 | ((cp >> 10) & 0x3ff) as u16);
            units.push(0xdc00 | (cp & 0x3ff) as u16);
        }
    }
    if consumed != byte_len {
        return Err(WireError::MalformedUtf8);
    }
    Ok(JavaString(units))
}

/// Read a protocol string: var32 byte count, then UTF-8.
///
/// `max_units` bounds the decoded length in code units; 0 disables the
/// bound. The byte count itself is rejected beyond `4 * max_units`, which
/// caps the allocation before any decoding happens.
pub fn read_string(
    reader: &mut ByteReader<'_>,
    max_units: usize,
) -> Result<JavaString, WireError> {
    let byte_len = reader.read_var32()?;
    if byte_len < 0 {
        return Err(WireError::StringTooLong);
    }
    let byte_len = byte_len as usize;
    if max_units > 0 && byte_len > max_units * 4 {
        return Err(WireError::StringTooLong);
    }
    let value = decode_utf8(reader, byte_len)?;
    if max_units > 0 && value.len() > max_units {
        return Err(WireError::StringTooLong);
    }
    Ok(value)
}

/// Write a protocol string: var32 byte count, then UTF-8.
pub fn write_string(writer: &mut ByteWriter, value: &JavaString) -> Result<(), WireError> {
    let bytes = value.encode_utf8()?;
    writer.put_var32(bytes.len() as i32)?;
    writer.put(&bytes)
}

/// Read a tag-tree string: big-endian u16 byte count, then UTF-8.
pub fn read_jstring(reader: &mut ByteReader<'_>) -> Result<JavaString, WireError> {
    let byte_len = reader.read_u16()?;
    decode_utf8(reader, usize::from(byte_len))
}

/// Write a tag-tree string: big-endian u16 byte count, then UTF-8.
///
/// Fails with [`WireError::StringTooLong`] when the UTF-8 form exceeds
/// 65535 bytes.
pub fn write_jstring(writer: &mut ByteWriter, value: &JavaString) -> Result<(), WireError> {
    let bytes = value.encode_utf8()?;
    if bytes.len() > usize::from(u16::MAX) {
        return Err(WireError::StringTooLong);
    }
    writer.put_u16(bytes.len() as u16)?;
    writer.put(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_decode() {
        let bytes = [0x05, b'H', b'e', b'l', b'l', b'o'];
        let mut r = ByteReader::new(&bytes);
        let s = read_string(&mut r, 32767).unwrap();
        assert_eq!(s, "Hello");
        assert_eq!(s.len(), 5);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_empty_string() {
        let mut r = ByteReader::new(&[0x00]);
        let s = read_string(&mut r, 32767).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn test_multibyte_roundtrip() {
        // One 2-byte, one 3-byte and one 4-byte sequence.
        let original = JavaString::from("é\u{4e16}\u{1f600}");
        let bytes = original.encode_utf8().unwrap();
        let mut r = ByteReader::new(&bytes);
        let decoded = decode_utf8(&mut r, bytes.len()).unwrap();
        assert_eq!(decoded, original);
        // The astral character decodes to a surrogate pair.
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn test_bad_continuation() {
        let mut r = ByteReader::new(&[0xc3, 0x29]);
        assert!(matches!(
            decode_utf8(&mut r, 2),
            Err(WireError::MalformedUtf8)
        ));
    }

    #[test]
    fn test_bad_leading_byte() {
        let mut r = ByteReader::new(&[0x80]);
        assert!(matches!(
            decode_utf8(&mut r, 1),
            Err(WireError::MalformedUtf8)
        ));
        let mut r = ByteReader::new(&[0xf8, 0x80, 0x80, 0x80, 0x80]);
        assert!(matches!(
            decode_utf8(&mut r, 5),
            Err(WireError::MalformedUtf8)
        ));
    }

    #[test]
    fn test_sequence_crossing_requested_count() {
        // The 2-byte sequence starts at the last requested byte.
        let mut r = ByteReader::new(&[b'a', 0xc3, 0xa9]);
        assert!(matches!(
            decode_utf8(&mut r, 2),
            Err(WireError::MalformedUtf8)
        ));
    }

    #[test]
    fn test_lone_surrogate_encode_fails() {
        let high = JavaString::from_code_units(vec![0xd800]);
        assert!(matches!(
            high.encode_utf8(),
            Err(WireError::MalformedUtf16)
        ));
        let low = JavaString::from_code_units(vec![0xdc00]);
        assert!(matches!(low.encode_utf8(), Err(WireError::MalformedUtf16)));
        let reversed = JavaString::from_code_units(vec![0xdc00, 0xd800]);
        assert!(matches!(
            reversed.encode_utf8(),
            Err(WireError::MalformedUtf16)
        ));
    }

    #[test]
    fn test_surrogate_pair_encode() {
        // U+1F600 as a pair.
        let s = JavaString::from_code_units(vec![0xd83d, 0xde00]);
        assert_eq!(s.encode_utf8().unwrap(), "\u{1f600}".as_bytes());
    }

    #[test]
    fn test_cesu8_surrogate_accepted_on_decode() {
        // A 3-byte encoding of U+D800, as the original runtime may emit.
        let bytes = [0xed, 0xa0, 0x80];
        let mut r = ByteReader::new(&bytes);
        let s = decode_utf8(&mut r, 3).unwrap();
        assert_eq!(s.code_units(), &[0xd800]);
    }

    #[test]
    fn test_string_bound() {
        let mut w = ByteWriter::new();
        write_string(&mut w, &JavaString::from("abcdef")).unwrap();
        let bytes = w.payload().to_vec();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            read_string(&mut r, 5),
            Err(WireError::StringTooLong)
        ));
    }

    #[test]
    fn test_jstring_roundtrip() {
        let original = JavaString::from("scoreboard");
        let mut w = ByteWriter::new();
        write_jstring(&mut w, &original).unwrap();
        let bytes = w.payload().to_vec();
        assert_eq!(&bytes[..2], &[0, 10]);
        let mut r = ByteReader::new(&bytes);
        assert_eq!(read_jstring(&mut r).unwrap(), original);
    }
}
