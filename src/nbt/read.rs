//! Generic recursive tag readers.
//!
//! These materialize a full [`Tag`] tree from the wire. For large or
//! selectively interesting compounds, prefer the streaming reader in
//! [`sax`](super::sax), which skips what the caller does not bind.

use crate::protocol::text;
use crate::protocol::ByteReader;

use super::{NbtError, Tag, TagCompound, TagKind, TagList};

fn read_count(reader: &mut ByteReader<'_>) -> Result<usize, NbtError> {
    let count = reader.read_i32()?;
    if count < 0 {
        return Err(NbtError::MalformedTag);
    }
    Ok(count as usize)
}

fn read_i8_array(reader: &mut ByteReader<'_>) -> Result<Vec<i8>, NbtError> {
    let count = read_count(reader)?;
    let raw = reader.read_slice(count)?;
    Ok(raw.iter().map(|&b| b as i8).collect())
}

fn read_i32_array(reader: &mut ByteReader<'_>) -> Result<Vec<i32>, NbtError> {
    let count = read_count(reader)?;
    let mut out = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        out.push(reader.read_i32()?);
    }
    Ok(out)
}

fn read_i64_array(reader: &mut ByteReader<'_>) -> Result<Vec<i64>, NbtError> {
    let count = read_count(reader)?;
    let mut out = Vec::with_capacity(count.min(1 << 15));
    for _ in 0..count {
        out.push(reader.read_i64()?);
    }
    Ok(out)
}

/// Read one payload of a known kind.
pub fn read_payload(reader: &mut ByteReader<'_>, kind: TagKind) -> Result<Tag, NbtError> {
    Ok(match kind {
        TagKind::Byte => Tag::Byte(reader.read_i8()?),
        TagKind::Short => Tag::Short(reader.read_i16()?),
        TagKind::Int => Tag::Int(reader.read_i32()?),
        TagKind::Long => Tag::Long(reader.read_i64()?),
        TagKind::Float => Tag::Float(reader.read_f32()?),
        TagKind::Double => Tag::Double(reader.read_f64()?),
        TagKind::ByteArray => Tag::ByteArray(read_i8_array(reader)?),
        TagKind::String => Tag::String(text::read_jstring(reader)?),
        TagKind::List => Tag::List(read_list(reader)?),
        TagKind::Compound => Tag::Compound(read_compound(reader)?),
        TagKind::IntArray => Tag::IntArray(read_i32_array(reader)?),
        TagKind::LongArray => Tag::LongArray(read_i64_array(reader)?),
    })
}

/// Read one named item.
///
/// Returns `None` for the terminator (a single 0 byte, carrying neither
/// name nor payload). Any type code above 12 is [`NbtError::InvalidTagType`].
pub fn read_item(
    reader: &mut ByteReader<'_>,
) -> Result<Option<(crate::protocol::JavaString, Tag)>, NbtError> {
    let code = reader.read_u8()?;
    if code == 0 {
        return Ok(None);
    }
    let kind = TagKind::from_wire(code).ok_or(NbtError::InvalidTagType(code))?;
    let name = text::read_jstring(reader)?;
    let payload = read_payload(reader, kind)?;
    Ok(Some((name, payload)))
}

/// Read a compound body: items until the terminator, duplicates replacing.
pub fn read_compound(reader: &mut ByteReader<'_>) -> Result<TagCompound, NbtError> {
    let mut compound = TagCompound::new();
    while let Some((name, payload)) = read_item(reader)? {
        compound.insert(name, payload);
    }
    Ok(compound)
}

/// Read a list body: element type, signed count, then the elements.
///
/// Element type 0 is only legal with count 0 and yields [`TagList::Empty`].
pub fn read_list(reader: &mut ByteReader<'_>) -> Result<TagList, NbtError> {
    let elem_code = reader.read_i8()?;
    let count = reader.read_i32()?;
    if !(0..=12).contains(&elem_code) {
        return Err(NbtError::InvalidTagType(elem_code as u8));
    }
    if elem_code == 0 {
        if count != 0 {
            return Err(NbtError::InvalidTagType(0));
        }
        return Ok(TagList::Empty);
    }
    if count < 0 {
        return Err(NbtError::MalformedTag);
    }
    let count = count as usize;
    let kind = TagKind::from_wire(elem_code as u8).ok_or(NbtError::InvalidTagType(elem_code as u8))?;

    macro_rules! read_elems {
        ($variant:ident, $read:expr) => {{
            let mut items = Vec::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                items.push($read);
            }
            TagList::$variant(items)
        }};
    }

    Ok(match kind {
        TagKind::Byte => read_elems!(Byte, reader.read_i8()?),
        TagKind::Short => read_elems!(Short, reader.read_i16()?),
        TagKind::Int => read_elems!(Int, reader.read_i32()?),
        TagKind::Long => read_elems!(Long, reader.read_i64()?),
        TagKind::Float => read_elems!(Float, reader.read_f32()?),
        TagKind::Double => read_elems!(Double, reader.read_f64()?),
        TagKind::ByteArray => read_elems!(ByteArray, read_i8_array(reader)?),
        TagKind::String => read_elems!(String, text::read_jstring(reader)?),
        TagKind::List => read_elems!(List, read_list(reader)?),
        TagKind::Compound => read_elems!(Compound, read_compound(reader)?),
        TagKind::IntArray => read_elems!(IntArray, read_i32_array(reader)?),
        TagKind::LongArray => read_elems!(LongArray, read_i64_array(reader)?),
    })
}

/// Advance past exactly one payload of a known kind without materializing.
///
/// Fixed-width leaves skip their width; arrays skip `count * element`;
/// lists of fixed-width elements skip in one step, other lists recurse per
/// element; compounds skip item by item until their terminator.
pub fn skip_payload(reader: &mut ByteReader<'_>, kind: TagKind) -> Result<(), NbtError> {
    if let Some(width) = kind.fixed_width() {
        reader.skip(width)?;
        return Ok(());
    }
    match kind {
        TagKind::ByteArray => {
            let count = read_count(reader)?;
            reader.skip(count)?;
        }
        TagKind::IntArray => {
            let count = read_count(reader)?;
            reader.skip(count * 4)?;
        }
        TagKind::LongArray => {
            let count = read_count(reader)?;
            reader.skip(count * 8)?;
        }
        TagKind::String => {
            let byte_len = reader.read_u16()?;
            reader.skip(usize::from(byte_len))?;
        }
        TagKind::List => {
            let elem_code = reader.read_i8()?;
            let count = reader.read_i32()?;
            if !(0..=12).contains(&elem_code) {
                return Err(NbtError::InvalidTagType(elem_code as u8));
            }
            if elem_code == 0 {
                if count != 0 {
                    return Err(NbtError::InvalidTagType(0));
                }
                return Ok(());
            }
            if count < 0 {
                return Err(NbtError::MalformedTag);
            }
            let kind = TagKind::from_wire(elem_code as u8)
                .ok_or(NbtError::InvalidTagType(elem_code as u8))?;
            if let Some(width) = kind.fixed_width() {
                reader.skip(count as usize * width)?;
            } else {
                for _ in 0..count {
                    skip_payload(reader, kind)?;
                }
            }
        }
        TagKind::Compound => loop {
            let code = reader.read_u8()?;
            if code == 0 {
                break;
            }
            let kind = TagKind::from_wire(code).ok_or(NbtError::InvalidTagType(code))?;
            let name_len = reader.read_u16()?;
            reader.skip(usize::from(name_len))?;
            skip_payload(reader, kind)?;
        },
        // Fixed-width kinds were handled above.
        _ => unreachable!(),
    }
    Ok(())
}
