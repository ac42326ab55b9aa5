//! Shared test scaffolding.
//!
//! The library only ships tag readers; round-trip properties need a
//! writer, so a minimal one lives here with the tests.

#![allow(dead_code)]

use craftwire::protocol::text;
use craftwire::{ByteWriter, JavaString, Tag, TagCompound, TagKind, TagList};

/// Write one named item: type code, name, payload.
pub fn write_item(w: &mut ByteWriter, name: &JavaString, tag: &Tag) {
    w.put_u8(tag.kind().to_wire()).unwrap();
    text::write_jstring(w, name).unwrap();
    write_payload(w, tag);
}

/// Write a compound body including its terminator.
pub fn write_compound(w: &mut ByteWriter, compound: &TagCompound) {
    for (name, tag) in compound {
        write_item(w, name, tag);
    }
    w.put_u8(0).unwrap();
}

/// Write a list body: element type, count, elements.
pub fn write_list(w: &mut ByteWriter, list: &TagList) {
    let elem = list.element_kind().map_or(0, TagKind::to_wire);
    w.put_i8(elem as i8).unwrap();
    w.put_i32(list.len() as i32).unwrap();
    match list {
        TagList::Empty => {}
        TagList::Byte(v) => v.iter().for_each(|&x| w.put_i8(x).unwrap()),
        TagList::Short(v) => v.iter().for_each(|&x| w.put_i16(x).unwrap()),
        TagList::Int(v) => v.iter().for_each(|&x| w.put_i32(x).unwrap()),
        TagList::Long(v) => v.iter().for_each(|&x| w.put_i64(x).unwrap()),
        TagList::Float(v) => v.iter().for_each(|&x| w.put_f32(x).unwrap()),
        TagList::Double(v) => v.iter().for_each(|&x| w.put_f64(x).unwrap()),
        TagList::ByteArray(v) => v.iter().for_each(|x| write_i8_array(w, x)),
        TagList::String(v) => v.iter().for_each(|x| text::write_jstring(w, x).unwrap()),
        TagList::List(v) => v.iter().for_each(|x| write_list(w, x)),
        TagList::Compound(v) => v.iter().for_each(|x| write_compound(w, x)),
        TagList::IntArray(v) => v.iter().for_each(|x| write_i32_array(w, x)),
        TagList::LongArray(v) => v.iter().for_each(|x| write_i64_array(w, x)),
    }
}

fn write_i8_array(w: &mut ByteWriter, values: &[i8]) {
    w.put_i32(values.len() as i32).unwrap();
    for &value in values {
        w.put_i8(value).unwrap();
    }
}

fn write_i32_array(w: &mut ByteWriter, values: &[i32]) {
    w.put_i32(values.len() as i32).unwrap();
    for &value in values {
        w.put_i32(value).unwrap();
    }
}

fn write_i64_array(w: &mut ByteWriter, values: &[i64]) {
    w.put_i32(values.len() as i32).unwrap();
    for &value in values {
        w.put_i64(value).unwrap();
    }
}

/// Write one payload without name or type code.
pub fn write_payload(w: &mut ByteWriter, tag: &Tag) {
    match tag {
        Tag::Byte(v) => w.put_i8(*v).unwrap(),
        Tag::Short(v) => w.put_i16(*v).unwrap(),
        Tag::Int(v) => w.put_i32(*v).unwrap(),
        Tag::Long(v) => w.put_i64(*v).unwrap(),
        Tag::Float(v) => w.put_f32(*v).unwrap(),
        Tag::Double(v) => w.put_f64(*v).unwrap(),
        Tag::ByteArray(v) => write_i8_array(w, v),
        Tag::String(v) => text::write_jstring(w, v).unwrap(),
        Tag::List(v) => write_list(w, v),
        Tag::Compound(v) => write_compound(w, v),
        Tag::IntArray(v) => write_i32_array(w, v),
        Tag::LongArray(v) => write_i64_array(w, v),
    }
}
