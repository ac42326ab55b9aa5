//! Integer and floating-point wire codecs.
//!
//! # Wire Format
//!
//! - Fixed-width integers: big-endian two's complement
//! - Floats: the big-endian bit pattern of the IEEE-754 value
//! - var32: 1-5 bytes, 7 payload bits per byte LSB-first, high bit set
//!   while more bytes follow; the fifth byte may not exceed `0x0F`
//! - var64: 1-10 bytes, same scheme; the tenth byte may not exceed `0x01`
//!
//! Negative variable-length values encode from their two's-complement bit
//! pattern, so `-1i32` is always the full five bytes `FF FF FF FF 0F`.
//! Encoding works on the unsigned reinterpretation, which makes over-long
//! output impossible and keeps every encoding canonically minimal.

use super::buffer::{ByteReader, ByteWriter};

/// Errors produced by the wire and text codecs.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of buffer: needed {needed} bytes, {remaining} available")]
    Underflow { needed: usize, remaining: usize },

    #[error("malformed variable-length integer")]
    MalformedVarInt,

    #[error("malformed UTF-8 sequence")]
    MalformedUtf8,

    #[error("malformed UTF-16 sequence")]
    MalformedUtf16,

    #[error("payload too large for a length prefix: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("string exceeds the allowed length")]
    StringTooLong,
}

macro_rules! fixed_codec {
    ($read:ident, $put:ident, $ty:ty) => {
        impl ByteReader<'_> {
            #[doc = concat!("Read a big-endian `", stringify!($ty), "`.")]
            pub fn $read(&mut self) -> Result<$ty, WireError> {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                self.read_exact(&mut raw)?;
                Ok(<$ty>::from_be_bytes(raw))
            }
        }

        impl ByteWriter {
            #[doc = concat!("Append a big-endian `", stringify!($ty), "`.")]
            pub fn $put(&mut self, value: $ty) -> Result<(), WireError> {
                self.put(&value.to_be_bytes())
            }
        }
    };
}

fixed_codec!(read_u8, put_u8, u8);
fixed_codec!(read_i8, put_i8, i8);
fixed_codec!(read_u16, put_u16, u16);
fixed_codec!(read_i16, put_i16, i16);
fixed_codec!(read_u32, put_u32, u32);
fixed_codec!(read_i32, put_i32, i32);
fixed_codec!(read_u64, put_u64, u64);
fixed_codec!(read_i64, put_i64, i64);

impl ByteReader<'_> {
    /// Read a big-endian IEEE-754 single.
    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a big-endian IEEE-754 double.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a variable-length 32-bit integer.
    pub fn read_var32(&mut self) -> Result<i32, WireError> {
        let mut value = 0u32;
        for i in 0..5 {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7f) << (i * 7);
            if i == 4 {
                // Only four value bits remain for the fifth byte; anything
                // above 0x0F (including a continuation bit) is malformed.
                if byte > 0x0f {
                    return Err(WireError::MalformedVarInt);
                }
            } else if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value as i32)
    }

    /// Read a variable-length 64-bit integer.
    pub fn read_var64(&mut self) -> Result<i64, WireError> {
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << (i * 7);
            if i == 9 {
                if byte > 0x01 {
                    return Err(WireError::MalformedVarInt);
                }
            } else if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value as i64)
    }
}

impl ByteWriter {
    /// Append a big-endian IEEE-754 single.
    pub fn put_f32(&mut self, value: f32) -> Result<(), WireError> {
        self.put_u32(value.to_bits())
    }

    /// Append a big-endian IEEE-754 double.
    pub fn put_f64(&mut self, value: f64) -> Result<(), WireError> {
        self.put_u64(value.to_bits())
    }

    /// Append a variable-length 32-bit integer.
    pub fn put_var32(&mut self, value: i32) -> Result<(), WireError> {
        let mut value = value as u32;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.put_u8(byte)?;
            if value == 0 {
                return Ok(());
            }
        }
    }

    /// Append a variable-length 64-bit integer.
    pub fn put_var64(&mut self, value: i64) -> Result<(), WireError> {
        let mut value = value as u64;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.put_u8(byte)?;
            if value == 0 {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip32(value: i32) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_var32(value).unwrap();
        let bytes = w.payload().to_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_var32().unwrap(), value);
        assert_eq!(r.remaining(), 0);
        bytes
    }

    #[test]
    fn test_var32_known_vectors() {
        assert_eq!(roundtrip32(0), [0x00]);
        assert_eq!(roundtrip32(1), [0x01]);
        assert_eq!(roundtrip32(127), [0x7f]);
        assert_eq!(roundtrip32(128), [0x80, 0x01]);
        assert_eq!(roundtrip32(300), [0xac, 0x02]);
        assert_eq!(roundtrip32(2097151), [0xff, 0xff, 0x7f]);
        assert_eq!(roundtrip32(i32::MAX), [0xff, 0xff, 0xff, 0xff, 0x07]);
        assert_eq!(roundtrip32(-1), [0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(roundtrip32(i32::MIN), [0x80, 0x80, 0x80, 0x80, 0x08]);
    }

    #[test]
    fn test_var32_consumes_exactly() {
        let bytes = [0xac, 0x02, 0x55];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_var32().unwrap(), 300);
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_var32_fifth_byte_bound() {
        // 0x10 exceeds the four value bits left in the fifth byte.
        let mut r = ByteReader::new(&[0x80, 0x80, 0x80, 0x80, 0x10]);
        assert!(matches!(r.read_var32(), Err(WireError::MalformedVarInt)));
        // A continuation bit on the fifth byte is rejected by the same bound.
        let mut r = ByteReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert!(matches!(r.read_var32(), Err(WireError::MalformedVarInt)));
    }

    #[test]
    fn test_var32_truncated() {
        let mut r = ByteReader::new(&[0x80]);
        assert!(matches!(r.read_var32(), Err(WireError::Underflow { .. })));
    }

    #[test]
    fn test_var64_roundtrip() {
        for value in [0i64, 1, -1, 300, i64::MAX, i64::MIN, 1 << 35] {
            let mut w = ByteWriter::new();
            w.put_var64(value).unwrap();
            let bytes = w.payload().to_vec();
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.read_var64().unwrap(), value);
        }
        let mut w = ByteWriter::new();
        w.put_var64(-1).unwrap();
        assert_eq!(w.payload().len(), 10);
        assert_eq!(w.payload()[9], 0x01);
    }

    #[test]
    fn test_var64_tenth_byte_bound() {
        let mut bytes = [0x80u8; 10];
        bytes[9] = 0x02;
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(r.read_var64(), Err(WireError::MalformedVarInt)));
    }

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut w = ByteWriter::new();
        w.put_u8(0xfe).unwrap();
        w.put_i16(-2).unwrap();
        w.put_i32(0x01020304).unwrap();
        w.put_i64(-5_000_000_000).unwrap();
        w.put_f32(1.5).unwrap();
        w.put_f64(-0.25).unwrap();
        let bytes = w.payload().to_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xfe);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_i32().unwrap(), 0x01020304);
        assert_eq!(r.read_i64().unwrap(), -5_000_000_000);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -0.25);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut w = ByteWriter::new();
        w.put_u32(0x01020304).unwrap();
        assert_eq!(w.payload(), &[1, 2, 3, 4]);
    }
}
