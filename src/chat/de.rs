//! The streaming chat JSON reader.
//!
//! The reader drives `serde_json`'s streaming deserializer through
//! hand-written [`DeserializeSeed`] visitors, one per parse context
//! (component, hover/click event, score, `with` array, `extra` array).
//! The visitor recursion is the context stack: each nested object or
//! array pushes a new seed carrying whatever the child needs from its
//! parent, which is how `extra` children receive the parent's decorations
//! and color before any of their own fields parse.
//!
//! Typed failures cannot travel through serde's error channel, so the
//! seeds share an [`ErrorSink`]: the first structural violation is parked
//! there and the parse aborted with an opaque serde error; the entry
//! point then reports the parked error, falling back to a positioned
//! syntax error for genuine JSON failures.

use std::cell::RefCell;
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use crate::protocol::JavaString;

use super::token::{self, ctx, Key};
use super::{color, keybind, ChatComponent, ChatError, ClickEvent, Content, HoverEvent, Style};

/// Parse a complete document.
pub(super) fn parse(bytes: &[u8], tolerant: bool) -> Result<ChatComponent, ChatError> {
    let sink = ErrorSink::default();
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let seed = ComponentSeed {
        sink: &sink,
        inherit: None,
        tolerant,
    };
    let outcome = seed.deserialize(&mut de).and_then(|component| {
        de.end()?;
        Ok(component)
    });
    match outcome {
        Ok(component) => Ok(component),
        Err(err) => Err(sink.take().unwrap_or_else(|| ChatError::Syntax {
            line: err.line(),
            column: err.column(),
            reason: err.to_string(),
        })),
    }
}

/// Side channel carrying the first typed failure out of the visitors.
#[derive(Default)]
struct ErrorSink(RefCell<Option<ChatError>>);

impl ErrorSink {
    /// Park `err` (first one wins) and produce the serde abort error.
    fn fail<E: de::Error>(&self, err: ChatError) -> E {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
        E::custom("chat component rejected")
    }

    fn take(&self) -> Option<ChatError> {
        self.0.borrow_mut().take()
    }
}

/// Consume one already-started map without keeping anything.
fn drain_map<'de, M: MapAccess<'de>>(mut map: M) -> Result<(), M::Error> {
    while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
    Ok(())
}

/// Consume one already-started sequence without keeping anything.
fn drain_seq<'de, S: SeqAccess<'de>>(mut seq: S) -> Result<(), S::Error> {
    while seq.next_element::<IgnoredAny>()?.is_some() {}
    Ok(())
}

// ---------------------------------------------------------------------------
// Scalar value seeds
// ---------------------------------------------------------------------------

/// Accepts a string; anything else is a value-type violation for `key`.
struct StringSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    key: &'s str,
}

impl<'s> StringSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<String>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self.sink.fail(ChatError::UnexpectedValueType(self.key.to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for StringSeed<'_> {
    type Value = Option<String>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for StringSeed<'_> {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a string value for {:?}", self.key)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let out = self.mismatch()?;
        drain_map(map)?;
        Ok(out)
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

/// Accepts a string, producing the UTF-16 [`JavaString`] for
/// player-visible content; anything else is a value-type violation.
struct TextSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    key: &'s str,
}

impl<'s> TextSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<JavaString>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self.sink.fail(ChatError::UnexpectedValueType(self.key.to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for TextSeed<'_> {
    type Value = Option<JavaString>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for TextSeed<'_> {
    type Value = Option<JavaString>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a string value for {:?}", self.key)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(JavaString::from(v)))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let out = self.mismatch()?;
        drain_map(map)?;
        Ok(out)
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

/// Accepts a boolean, or the literal strings `"true"`/`"false"`.
///
/// Other strings are rejected outright (the boolean keyword table has no
/// entry for them); other value types follow the tolerant/strict rule.
struct DecorationSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    key: &'s str,
}

impl<'s> DecorationSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<bool>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self.sink.fail(ChatError::UnexpectedValueType(self.key.to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for DecorationSeed<'_> {
    type Value = Option<bool>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for DecorationSeed<'_> {
    type Value = Option<bool>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a boolean for {:?}", self.key)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        match token::lookup_in(v, ctx::BOOLEAN).map(|t| t.key) {
            Some(Key::True) => Ok(Some(true)),
            Some(Key::False) => Ok(Some(false)),
            _ => Err(self
                .sink
                .fail(ChatError::UnexpectedValueType(self.key.to_string()))),
        }
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let out = self.mismatch()?;
        drain_map(map)?;
        Ok(out)
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Hover / click events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Hover,
    Click,
}

/// A buffered event value awaiting its action.
enum Pending {
    Str(JavaString),
    Int(u64),
}

/// Result of one event object.
enum ParsedEvent {
    Hover(HoverEvent),
    Click(ClickEvent),
}

/// The value under an event's `value` key: string, or integer where the
/// context allows one.
struct EventValueSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    kind: EventKind,
}

impl<'s> EventValueSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<Pending>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self
                .sink
                .fail(ChatError::UnexpectedValueType("value".to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for EventValueSeed<'_> {
    type Value = Option<Pending>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for EventValueSeed<'_> {
    type Value = Option<Pending>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an event value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(Pending::Str(JavaString::from(v))))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        if self.kind == EventKind::Hover {
            return Err(self.sink.fail(ChatError::InvalidValueType));
        }
        Ok(Some(Pending::Int(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        if self.kind == EventKind::Hover || v < 0 {
            return Err(self.sink.fail(ChatError::InvalidValueType));
        }
        Ok(Some(Pending::Int(v as u64)))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let out = self.mismatch()?;
        drain_map(map)?;
        Ok(out)
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

/// Bind an action keyword and a value into the concrete event.
fn materialize<E: de::Error>(
    sink: &ErrorSink,
    action: Key,
    value: Pending,
) -> Result<ParsedEvent, E> {
    let event = match (action, value) {
        (Key::ActShowText, Pending::Str(s)) => ParsedEvent::Hover(HoverEvent::ShowText(s)),
        (Key::ActShowItem, Pending::Str(s)) => ParsedEvent::Hover(HoverEvent::ShowItem(s)),
        (Key::ActShowEntity, Pending::Str(s)) => ParsedEvent::Hover(HoverEvent::ShowEntity(s)),
        (Key::ActShowAchievement, Pending::Str(s)) => {
            ParsedEvent::Hover(HoverEvent::ShowAchievement(s))
        }
        (Key::ActOpenUrl, Pending::Str(s)) => ParsedEvent::Click(ClickEvent::OpenUrl(s)),
        (Key::ActRunCommand, Pending::Str(s)) => ParsedEvent::Click(ClickEvent::RunCommand(s)),
        (Key::ActSuggestCommand, Pending::Str(s)) => {
            ParsedEvent::Click(ClickEvent::SuggestCommand(s))
        }
        (Key::ActChangePage, Pending::Int(page)) => {
            ParsedEvent::Click(ClickEvent::ChangePage(page))
        }
        _ => return Err(sink.fail(ChatError::InvalidValueType)),
    };
    Ok(event)
}

/// One hover or click event object.
///
/// `action` and `value` may arrive in either order: whichever comes second
/// completes the event. An object that never completes leaves the event
/// unset on the component.
struct EventSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    kind: EventKind,
}

impl<'s> EventSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<ParsedEvent>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            let key = match self.kind {
                EventKind::Hover => "hoverEvent",
                EventKind::Click => "clickEvent",
            };
            Err(self.sink.fail(ChatError::UnexpectedValueType(key.to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for EventSeed<'_> {
    type Value = Option<ParsedEvent>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for EventSeed<'_> {
    type Value = Option<ParsedEvent>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an event object")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let context = match self.kind {
            EventKind::Hover => ctx::HOVER,
            EventKind::Click => ctx::CLICK,
        };
        let action_context = match self.kind {
            EventKind::Hover => ctx::HOVER_ACT,
            EventKind::Click => ctx::CLICK_ACT,
        };

        let mut action: Option<Key> = None;
        let mut buffered: Option<Pending> = None;
        let mut action_seen = false;
        let mut value_seen = false;
        let mut result: Option<ParsedEvent> = None;

        while let Some(key) = map.next_key::<String>()? {
            let Some(tok) = token::lookup_in(&key, context) else {
                if self.tolerant {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
                return Err(self.sink.fail(ChatError::UnexpectedKey(key)));
            };
            match tok.key {
                Key::Action => {
                    if action_seen {
                        return Err(self.sink.fail(ChatError::DuplicateAction));
                    }
                    let name = map.next_value_seed(StringSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "action",
                    })?;
                    let Some(name) = name else { continue };
                    action_seen = true;
                    let Some(act) = token::lookup_in(&name, action_context) else {
                        return Err(self.sink.fail(ChatError::UnexpectedValueType(name)));
                    };
                    action = Some(act.key);
                    if let Some(value) = buffered.take() {
                        result = Some(materialize(self.sink, act.key, value)?);
                    }
                }
                Key::Value => {
                    if value_seen {
                        return Err(self.sink.fail(ChatError::DuplicateValue));
                    }
                    let value = map.next_value_seed(EventValueSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        kind: self.kind,
                    })?;
                    let Some(value) = value else { continue };
                    value_seen = true;
                    match action {
                        Some(act) => result = Some(materialize(self.sink, act, value)?),
                        None => buffered = Some(value),
                    }
                }
                _ => {
                    if !self.tolerant {
                        return Err(self.sink.fail(ChatError::UnexpectedKey(key)));
                    }
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(result)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// The object under `score`.
struct ScoreSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
}

impl<'s> ScoreSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<Content>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self
                .sink
                .fail(ChatError::UnexpectedValueType("score".to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for ScoreSeed<'_> {
    type Value = Option<Content>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ScoreSeed<'_> {
    type Value = Option<Content>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a score object")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let mut name = JavaString::new();
        let mut objective = JavaString::new();
        let mut value: Option<JavaString> = None;

        while let Some(key) = map.next_key::<String>()? {
            let Some(tok) = token::lookup_in(&key, ctx::SCORE) else {
                if self.tolerant {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
                return Err(self.sink.fail(ChatError::UnexpectedKey(key)));
            };
            match tok.key {
                Key::ScoreName => {
                    if let Some(v) = map.next_value_seed(TextSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "name",
                    })? {
                        name = v;
                    }
                }
                Key::ScoreObjective => {
                    if let Some(v) = map.next_value_seed(TextSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "objective",
                    })? {
                        objective = v;
                    }
                }
                Key::Value => {
                    let parsed = map.next_value_seed(EventValueSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        kind: EventKind::Click,
                    })?;
                    value = match parsed {
                        Some(Pending::Str(s)) => Some(s),
                        Some(Pending::Int(i)) => Some(JavaString::from(i.to_string().as_str())),
                        None => value,
                    };
                }
                _ => {
                    if !self.tolerant {
                        return Err(self.sink.fail(ChatError::UnexpectedKey(key)));
                    }
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(Some(Content::Score {
            name,
            objective,
            value,
        }))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

/// The array under `with`: translation substitutions.
struct WithSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
}

impl<'s> WithSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<Vec<JavaString>>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self
                .sink
                .fail(ChatError::UnexpectedValueType("with".to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for WithSeed<'_> {
    type Value = Option<Vec<JavaString>>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for WithSeed<'_> {
    type Value = Option<Vec<JavaString>>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of substitution strings")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Self::Value, S::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(TextSeed {
            sink: self.sink,
            tolerant: self.tolerant,
            key: "with",
        })? {
            if let Some(item) = item {
                items.push(item);
            }
        }
        Ok(Some(items))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let out = self.mismatch()?;
        drain_map(map)?;
        Ok(out)
    }
}

/// One element of the `extra` array; a child component inheriting style.
struct ExtraElementSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    inherit: Style,
}

impl<'s> ExtraElementSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Option<ChatComponent>, E> {
        if self.tolerant {
            Ok(None)
        } else {
            Err(self
                .sink
                .fail(ChatError::UnexpectedValueType("extra".to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for ExtraElementSeed<'_> {
    type Value = Option<ChatComponent>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ExtraElementSeed<'_> {
    type Value = Option<ChatComponent>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a child component object")
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let component = ComponentSeed {
            sink: self.sink,
            inherit: Some(self.inherit),
            tolerant: self.tolerant,
        }
        .visit_map(map)?;
        Ok(Some(component))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_seq<S: SeqAccess<'de>>(self, seq: S) -> Result<Self::Value, S::Error> {
        let out = self.mismatch()?;
        drain_seq(seq)?;
        Ok(out)
    }
}

/// The array under `extra`.
struct ExtraSeed<'s> {
    sink: &'s ErrorSink,
    tolerant: bool,
    inherit: Style,
}

impl<'s> ExtraSeed<'s> {
    fn mismatch<E: de::Error>(&self) -> Result<Vec<ChatComponent>, E> {
        if self.tolerant {
            Ok(Vec::new())
        } else {
            Err(self
                .sink
                .fail(ChatError::UnexpectedValueType("extra".to_string())))
        }
    }
}

impl<'de> DeserializeSeed<'de> for ExtraSeed<'_> {
    type Value = Vec<ChatComponent>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ExtraSeed<'_> {
    type Value = Vec<ChatComponent>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of child components")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Self::Value, S::Error> {
        let mut children = Vec::new();
        while let Some(child) = seq.next_element_seed(ExtraElementSeed {
            sink: self.sink,
            tolerant: self.tolerant,
            inherit: self.inherit,
        })? {
            if let Some(child) = child {
                children.push(child);
            }
        }
        Ok(children)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.mismatch()
    }

    fn visit_map<M: MapAccess<'de>>(self, map: M) -> Result<Self::Value, M::Error> {
        let out = self.mismatch()?;
        drain_map(map)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// The component itself
// ---------------------------------------------------------------------------

/// One component object, optionally seeded with inherited style.
struct ComponentSeed<'s> {
    sink: &'s ErrorSink,
    inherit: Option<Style>,
    tolerant: bool,
}

impl<'de> DeserializeSeed<'de> for ComponentSeed<'_> {
    type Value = ChatComponent;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ComponentSeed<'_> {
    type Value = ChatComponent;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a chat component object")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let mut component = ChatComponent::new();
        if let Some(style) = self.inherit {
            component.style = style;
        }

        while let Some(key) = map.next_key::<String>()? {
            let Some(tok) = token::lookup_in(&key, ctx::COMPOUND) else {
                if self.tolerant {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
                return Err(self.sink.fail(ChatError::UnexpectedKey(key)));
            };
            match tok.key {
                Key::Bold
                | Key::Italic
                | Key::Underlined
                | Key::Strikethrough
                | Key::Obfuscated => {
                    let parsed = map.next_value_seed(DecorationSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: &key,
                    })?;
                    if let Some(enabled) = parsed {
                        let slot = match tok.key {
                            Key::Bold => &mut component.style.bold,
                            Key::Italic => &mut component.style.italic,
                            Key::Underlined => &mut component.style.underlined,
                            Key::Strikethrough => &mut component.style.strikethrough,
                            _ => &mut component.style.obfuscated,
                        };
                        *slot = Some(enabled);
                    }
                }
                Key::Color => {
                    let Some(name) = map.next_value_seed(StringSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "color",
                    })?
                    else {
                        continue;
                    };
                    let Some(resolved) = color::lookup(&name) else {
                        return Err(self.sink.fail(ChatError::InvalidColor(name)));
                    };
                    component.style.color = Some(resolved);
                }
                Key::Insertion => {
                    if let Some(text) = map.next_value_seed(TextSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "insertion",
                    })? {
                        component.insertion = Some(text);
                    }
                }
                Key::Text => {
                    let Some(text) = map.next_value_seed(TextSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "text",
                    })?
                    else {
                        continue;
                    };
                    if component.content.is_some() {
                        return Err(self.sink.fail(ChatError::AmbiguousTrait));
                    }
                    component.content = Some(Content::Text { text });
                }
                Key::Translate => {
                    let Some(new_key) = map.next_value_seed(StringSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "translate",
                    })?
                    else {
                        continue;
                    };
                    match &mut component.content {
                        None => {
                            component.content = Some(Content::Translate {
                                key: new_key,
                                with: Vec::new(),
                            });
                        }
                        Some(Content::Translate { key, .. }) => *key = new_key,
                        Some(_) => {
                            return Err(self.sink.fail(ChatError::AmbiguousTrait));
                        }
                    }
                }
                Key::With => {
                    let Some(items) = map.next_value_seed(WithSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                    })?
                    else {
                        continue;
                    };
                    match &mut component.content {
                        None => {
                            component.content = Some(Content::Translate {
                                key: String::new(),
                                with: items,
                            });
                        }
                        Some(Content::Translate { with, .. }) => with.extend(items),
                        Some(_) => {
                            return Err(self.sink.fail(ChatError::AmbiguousTrait));
                        }
                    }
                }
                Key::Keybind => {
                    let Some(name) = map.next_value_seed(StringSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        key: "keybind",
                    })?
                    else {
                        continue;
                    };
                    if component.content.is_some() {
                        return Err(self.sink.fail(ChatError::AmbiguousTrait));
                    }
                    let Some(resolved) = keybind::lookup(&name) else {
                        return Err(self.sink.fail(ChatError::InvalidKeybind(name)));
                    };
                    component.content = Some(Content::Keybind { key: resolved });
                }
                Key::Score => {
                    if component.content.is_some() {
                        return Err(self.sink.fail(ChatError::AmbiguousTrait));
                    }
                    if let Some(score) = map.next_value_seed(ScoreSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                    })? {
                        component.content = Some(score);
                    }
                }
                Key::HoverEvent => {
                    let parsed = map.next_value_seed(EventSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        kind: EventKind::Hover,
                    })?;
                    if let Some(ParsedEvent::Hover(event)) = parsed {
                        component.hover = Some(event);
                    }
                }
                Key::ClickEvent => {
                    let parsed = map.next_value_seed(EventSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        kind: EventKind::Click,
                    })?;
                    if let Some(ParsedEvent::Click(event)) = parsed {
                        component.click = Some(event);
                    }
                }
                Key::Extra => {
                    let children = map.next_value_seed(ExtraSeed {
                        sink: self.sink,
                        tolerant: self.tolerant,
                        inherit: component.style,
                    })?;
                    component.extra.extend(children);
                }
                // Remaining keys carry other contexts and cannot reach here.
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(component)
    }
}
