//! Streaming compound reader with prerequisite resolution.
//!
//! Instead of materializing a whole compound, the SAX reader walks the
//! item stream once, looks each tag name up in a caller-supplied
//! dictionary, and invokes the bound [`SaxAction`] with the stream
//! positioned at the payload. Unknown names, names above the 64-byte
//! bound, and type mismatches either land in an optional `ignored` bucket
//! compound or are skipped outright.
//!
//! An action may name other actions as prerequisites. When a tag arrives
//! before its prerequisites have run, the reader saves a stream mark and
//! moves on; after the terminator it makes at most one resolution pass per
//! deferred action, rewinding to each saved mark once the dependencies are
//! satisfied. Whatever remains unsatisfied gets `on_failed_resolve`, or
//! fails the read if the action does not provide one. Actions whose tag
//! never appeared get `on_absent`. On return the stream sits exactly past
//! the compound terminator, wherever resolution wandered in between.

use crate::protocol::{ByteReader, Mark};

use super::read::{read_payload, skip_payload};
use super::{NbtError, TagCompound, TagKind};

/// Tag names at or above this byte length are never looked up.
pub const MAX_SAX_NAME_LEN: usize = 64;

/// What a [`SaxAction`] expects to find under its tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaxType {
    /// Exactly this tag kind.
    Value(TagKind),
    /// A list whose elements are this kind. The handler runs with the
    /// stream at the list count, after the element-type byte.
    ListOf(TagKind),
}

/// One field binding for [`sax_read_compound`].
pub struct SaxAction<T> {
    /// Expected shape of the payload.
    pub expected: SaxType,

    /// Indices of actions that must have run before this one.
    pub prerequisites: &'static [usize],

    /// Invoked with the stream at the payload (or at the list count for
    /// [`SaxType::ListOf`]).
    pub on_present: fn(&mut ByteReader<'_>, &mut T) -> Result<(), NbtError>,

    /// Invoked after the compound when the tag never appeared.
    pub on_absent: Option<fn(&mut T) -> Result<(), NbtError>>,

    /// Invoked in place of `on_present` when the prerequisites could not
    /// be satisfied by any resolution pass.
    pub on_failed_resolve: Option<fn(&mut ByteReader<'_>, &mut T) -> Result<(), NbtError>>,
}

impl<T> SaxAction<T> {
    /// An action for a plain field of the given kind.
    pub const fn value(
        kind: TagKind,
        on_present: fn(&mut ByteReader<'_>, &mut T) -> Result<(), NbtError>,
    ) -> Self {
        Self {
            expected: SaxType::Value(kind),
            prerequisites: &[],
            on_present,
            on_absent: None,
            on_failed_resolve: None,
        }
    }

    /// An action for a list field with a fixed element kind.
    pub const fn typed_list(
        element: TagKind,
        on_present: fn(&mut ByteReader<'_>, &mut T) -> Result<(), NbtError>,
    ) -> Self {
        Self {
            expected: SaxType::ListOf(element),
            prerequisites: &[],
            on_present,
            on_absent: None,
            on_failed_resolve: None,
        }
    }

    /// Add prerequisite action indices.
    pub const fn after(mut self, prerequisites: &'static [usize]) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Set the absent handler.
    pub const fn or_absent(mut self, on_absent: fn(&mut T) -> Result<(), NbtError>) -> Self {
        self.on_absent = Some(on_absent);
        self
    }

    /// Set the failed-resolve handler.
    pub const fn or_unresolved(
        mut self,
        on_failed_resolve: fn(&mut ByteReader<'_>, &mut T) -> Result<(), NbtError>,
    ) -> Self {
        self.on_failed_resolve = Some(on_failed_resolve);
        self
    }
}

/// Read a byte-flag payload (0 or 1) and apply it to `mask` within `field`.
///
/// Intended for use inside an `on_present` bound to [`TagKind::Byte`]:
/// value 1 sets the mask, 0 clears it, anything else is
/// [`NbtError::MalformedTag`].
pub fn read_flag(
    reader: &mut ByteReader<'_>,
    field: &mut u32,
    mask: u32,
) -> Result<(), NbtError> {
    match reader.read_i8()? {
        0 => *field &= !mask,
        1 => *field |= mask,
        _ => return Err(NbtError::MalformedTag),
    }
    Ok(())
}

/// Read the elements of a typed list into a vector.
///
/// Intended for use inside an `on_present` bound to [`SaxType::ListOf`]:
/// the stream sits at the signed count, each element is read with
/// `read_elem`.
pub fn read_typed_list<E>(
    reader: &mut ByteReader<'_>,
    read_elem: fn(&mut ByteReader<'_>) -> Result<E, NbtError>,
) -> Result<Vec<E>, NbtError> {
    let count = reader.read_i32()?;
    if count < 0 {
        return Err(NbtError::MalformedTag);
    }
    let count = count as usize;
    let mut out = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        out.push(read_elem(reader)?);
    }
    Ok(out)
}

struct Deferred {
    action: usize,
    /// Stream position honoring the action's `expected` contract.
    payload: Mark,
}

fn prereqs_met<T>(action: &SaxAction<T>, ran: &[bool]) -> bool {
    action.prerequisites.iter().all(|&p| ran.get(p).copied().unwrap_or(false))
}

/// Divert one ignored item: into the bucket when present, else skip it.
fn ignore_item(
    reader: &mut ByteReader<'_>,
    kind: TagKind,
    name_bytes: &[u8],
    ignored: &mut Option<&mut TagCompound>,
) -> Result<(), NbtError> {
    match ignored {
        Some(bucket) => {
            let mut name_reader = ByteReader::new(name_bytes);
            let name = crate::protocol::text::decode_utf8(&mut name_reader, name_bytes.len())?;
            let payload = read_payload(reader, kind)?;
            bucket.insert(name, payload);
            Ok(())
        }
        None => skip_payload(reader, kind),
    }
}

/// Stream a compound, dispatching known tags to `actions`.
///
/// `dictionary` maps a raw tag name (UTF-8 bytes, shorter than
/// [`MAX_SAX_NAME_LEN`]) to an action index; `None` or an out-of-range
/// index ignores the tag. `ignored` optionally collects everything the
/// dictionary or type checks rejected.
pub fn sax_read_compound<T>(
    reader: &mut ByteReader<'_>,
    data: &mut T,
    dictionary: impl Fn(&[u8]) -> Option<usize>,
    actions: &[SaxAction<T>],
    mut ignored: Option<&mut TagCompound>,
) -> Result<(), NbtError> {
    let mut ran = vec![false; actions.len()];
    let mut seen = vec![false; actions.len()];
    let mut deferred: Vec<Deferred> = Vec::new();

    loop {
        let code = reader.read_u8()?;
        if code == 0 {
            break;
        }
        let kind = TagKind::from_wire(code).ok_or(NbtError::InvalidTagType(code))?;
        let name_len = usize::from(reader.read_u16()?);
        if name_len >= MAX_SAX_NAME_LEN {
            let name_bytes = reader.read_slice(name_len)?;
            ignore_item(reader, kind, name_bytes, &mut ignored)?;
            continue;
        }
        let name_bytes = reader.read_slice(name_len)?;

        let index = match dictionary(name_bytes) {
            Some(index) if index < actions.len() => index,
            _ => {
                ignore_item(reader, kind, name_bytes, &mut ignored)?;
                continue;
            }
        };
        let action = &actions[index];

        // Type checking; mismatches are ignored, not fatal.
        let payload_start = reader.mark();
        let dispatch_at = match action.expected {
            SaxType::Value(expected) => {
                if kind != expected {
                    ignore_item(reader, kind, name_bytes, &mut ignored)?;
                    continue;
                }
                payload_start
            }
            SaxType::ListOf(expected) => {
                if kind != TagKind::List {
                    ignore_item(reader, kind, name_bytes, &mut ignored)?;
                    continue;
                }
                let elem_code = reader.read_i8()?;
                if elem_code == 0 {
                    // An untyped list is acceptable only when empty.
                    let count_at = reader.mark();
                    if reader.read_i32()? != 0 {
                        return Err(NbtError::InvalidTagType(0));
                    }
                    reader.reset(count_at);
                    count_at
                } else if elem_code == expected.to_wire() as i8 {
                    reader.mark()
                } else {
                    reader.reset(payload_start);
                    ignore_item(reader, TagKind::List, name_bytes, &mut ignored)?;
                    continue;
                }
            }
        };

        seen[index] = true;
        if prereqs_met(action, &ran) {
            reader.reset(dispatch_at);
            (action.on_present)(reader, data)?;
            ran[index] = true;
        } else {
            deferred.push(Deferred {
                action: index,
                payload: dispatch_at,
            });
            // Leave the stream past this item and keep walking.
            reader.reset(payload_start);
            skip_payload(reader, kind)?;
        }
    }

    let end = reader.mark();

    // Dependency resolution: each pass can unlock at most the actions
    // whose prerequisites completed in the previous one, so the deferred
    // count bounds the number of useful passes.
    let mut done = vec![false; deferred.len()];
    for _ in 0..deferred.len() {
        let mut progressed = false;
        for (slot, entry) in deferred.iter().enumerate() {
            if done[slot] || !prereqs_met(&actions[entry.action], &ran) {
                continue;
            }
            reader.reset(entry.payload);
            (actions[entry.action].on_present)(reader, data)?;
            ran[entry.action] = true;
            done[slot] = true;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    for (slot, entry) in deferred.iter().enumerate() {
        if done[slot] {
            continue;
        }
        match actions[entry.action].on_failed_resolve {
            Some(fallback) => {
                reader.reset(entry.payload);
                fallback(reader, data)?;
                ran[entry.action] = true;
            }
            None => return Err(NbtError::PrerequisiteUnresolved(entry.action)),
        }
    }

    for (index, action) in actions.iter().enumerate() {
        if !seen[index] {
            if let Some(absent) = action.on_absent {
                absent(data)?;
            }
        }
    }

    // Resolution may have rewound the stream; the caller observes exactly
    // one consumed compound.
    reader.reset(end);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ByteReader, ByteWriter};

    #[derive(Default)]
    struct Target {
        health: i16,
        names: Vec<crate::protocol::JavaString>,
        flags: u32,
        derived: i32,
        base: i32,
        unresolved: bool,
    }

    fn item_header(w: &mut ByteWriter, kind: TagKind, name: &str) {
        w.put_u8(kind.to_wire()).unwrap();
        w.put_u16(name.len() as u16).unwrap();
        w.put(name.as_bytes()).unwrap();
    }

    fn dictionary(name: &[u8]) -> Option<usize> {
        match name {
            b"health" => Some(0),
            b"names" => Some(1),
            b"invuln" => Some(2),
            b"base" => Some(3),
            b"derived" => Some(4),
            _ => None,
        }
    }

    const INVULN: u32 = 0x4;

    fn actions() -> Vec<SaxAction<Target>> {
        vec![
            SaxAction::value(TagKind::Short, |r, t: &mut Target| {
                t.health = r.read_i16()?;
                Ok(())
            }),
            SaxAction::typed_list(TagKind::String, |r, t: &mut Target| {
                t.names = read_typed_list(r, |r| Ok(crate::protocol::text::read_jstring(r)?))?;
                Ok(())
            }),
            SaxAction::value(TagKind::Byte, |r, t: &mut Target| {
                read_flag(r, &mut t.flags, INVULN)
            })
            .or_absent(|t| {
                t.flags &= !INVULN;
                Ok(())
            }),
            SaxAction::value(TagKind::Int, |r, t: &mut Target| {
                t.base = r.read_i32()?;
                Ok(())
            }),
            SaxAction::value(TagKind::Int, |r, t: &mut Target| {
                t.derived = t.base + r.read_i32()?;
                Ok(())
            })
            .after(&[3]),
        ]
    }

    #[test]
    fn test_plain_fields_dispatch_inline() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Short, "health");
        w.put_i16(20).unwrap();
        item_header(&mut w, TagKind::Byte, "invuln");
        w.put_u8(1).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), None).unwrap();
        assert_eq!(target.health, 20);
        assert_eq!(target.flags & INVULN, INVULN);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_flag_rejects_other_values() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Byte, "invuln");
        w.put_u8(2).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        let err = sax_read_compound(&mut r, &mut target, dictionary, &actions(), None);
        assert!(matches!(err, Err(NbtError::MalformedTag)));
    }

    #[test]
    fn test_absent_handler_runs() {
        let mut w = ByteWriter::new();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        target.flags = INVULN;
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), None).unwrap();
        assert_eq!(target.flags & INVULN, 0);
    }

    #[test]
    fn test_typed_list() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::List, "names");
        w.put_i8(TagKind::String.to_wire() as i8).unwrap();
        w.put_i32(2).unwrap();
        for name in ["alpha", "beta"] {
            w.put_u16(name.len() as u16).unwrap();
            w.put(name.as_bytes()).unwrap();
        }
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), None).unwrap();
        assert_eq!(target.names.len(), 2);
        assert_eq!(target.names[0], "alpha");
    }

    #[test]
    fn test_typed_list_untyped_empty_accepted() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::List, "names");
        w.put_i8(0).unwrap();
        w.put_i32(0).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), None).unwrap();
        assert!(target.names.is_empty());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_typed_list_element_mismatch_ignored() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::List, "names");
        w.put_i8(TagKind::Int.to_wire() as i8).unwrap();
        w.put_i32(1).unwrap();
        w.put_i32(9).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut bucket = TagCompound::new();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), Some(&mut bucket)).unwrap();
        assert!(target.names.is_empty());
        assert_eq!(
            bucket.get("names").unwrap().as_list().unwrap().len(),
            1
        );
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_prerequisite_out_of_order() {
        // "derived" arrives before "base" and must wait for it.
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Int, "derived");
        w.put_i32(5).unwrap();
        item_header(&mut w, TagKind::Int, "base");
        w.put_i32(100).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), None).unwrap();
        assert_eq!(target.base, 100);
        assert_eq!(target.derived, 105);
        // The stream ends up just past the compound despite the rewind.
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_unsatisfied_prerequisite_without_fallback() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Int, "derived");
        w.put_i32(5).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        let err = sax_read_compound(&mut r, &mut target, dictionary, &actions(), None);
        assert!(matches!(err, Err(NbtError::PrerequisiteUnresolved(4))));
    }

    #[test]
    fn test_unsatisfied_prerequisite_with_fallback() {
        let mut acts = actions();
        acts[4] = SaxAction::value(TagKind::Int, |r, t: &mut Target| {
            t.derived = t.base + r.read_i32()?;
            Ok(())
        })
        .after(&[3])
        .or_unresolved(|r, t| {
            r.skip(4)?;
            t.unresolved = true;
            Ok(())
        });

        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Int, "derived");
        w.put_i32(5).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &acts, None).unwrap();
        assert!(target.unresolved);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_unknown_names_into_bucket() {
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Short, "health");
        w.put_i16(7).unwrap();
        item_header(&mut w, TagKind::Int, "mystery");
        w.put_i32(42).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut bucket = TagCompound::new();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), Some(&mut bucket)).unwrap();
        assert_eq!(target.health, 7);
        assert_eq!(bucket.get("mystery").unwrap().as_int(), Some(42));
    }

    #[test]
    fn test_type_mismatch_ignored() {
        let mut w = ByteWriter::new();
        // "health" bound as Short arrives as Int.
        item_header(&mut w, TagKind::Int, "health");
        w.put_i32(9).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), None).unwrap();
        assert_eq!(target.health, 0);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_long_names_ignored() {
        let long_name = "n".repeat(MAX_SAX_NAME_LEN);
        let mut w = ByteWriter::new();
        item_header(&mut w, TagKind::Int, &long_name);
        w.put_i32(1).unwrap();
        w.put_u8(0).unwrap();
        let bytes = w.payload().to_vec();

        let mut target = Target::default();
        let mut bucket = TagCompound::new();
        let mut r = ByteReader::new(&bytes);
        sax_read_compound(&mut r, &mut target, dictionary, &actions(), Some(&mut bucket)).unwrap();
        assert_eq!(bucket.len(), 1);
        assert_eq!(r.remaining(), 0);
    }
}
