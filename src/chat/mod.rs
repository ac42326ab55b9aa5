//! The JSON rich-text ("chat component") format.
//!
//! A chat message is a tree of components. Each node carries tri-state
//! decorations (inherit, on, off), an optional color from the closed
//! sixteen-plus-reset set, an optional insertion, at most one content
//! variant, optional hover and click events, and ordered `extra` children
//! that inherit the parent's decorations and color at the moment they are
//! created.
//!
//! Only the reader is provided; the original runtime never shipped a
//! writer. [`ChatComponent::from_json`] parses a complete JSON document;
//! [`ChatComponent::read_prefixed`] reads the protocol envelope (var32
//! byte length, capped at 32767) around such a document.

pub mod color;
pub mod keybind;
pub mod token;

mod de;

use crate::protocol::{ByteReader, JavaString, WireError};

pub use color::ChatColor;

/// Errors produced by the chat reader.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unexpected key {0:?}")]
    UnexpectedKey(String),

    #[error("unexpected value type for key {0:?}")]
    UnexpectedValueType(String),

    #[error("ambiguous chat trait: content already set")]
    AmbiguousTrait,

    #[error("invalid chat color {0:?}")]
    InvalidColor(String),

    #[error("invalid keybind {0:?}")]
    InvalidKeybind(String),

    #[error("duplicate action in event object")]
    DuplicateAction,

    #[error("duplicate value in event object")]
    DuplicateValue,

    #[error("value type not valid for this event action")]
    InvalidValueType,

    #[error("chat JSON syntax error at line {line}, column {column}: {reason}")]
    Syntax {
        line: usize,
        column: usize,
        reason: String,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A tri-state decoration set plus color; the inheritable part of a
/// component's appearance.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Style {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underlined: Option<bool>,
    pub strikethrough: Option<bool>,
    pub obfuscated: Option<bool>,
    pub color: Option<&'static ChatColor>,
}

/// The content variant of a component.
///
/// Player-visible text is held as [`JavaString`], the crate's UTF-16
/// string, like every other protocol string; the translation key is a
/// plain identifier and stays UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Literal text.
    Text { text: JavaString },
    /// A client-side translation with substitutions.
    Translate { key: String, with: Vec<JavaString> },
    /// One of the closed keybind names.
    Keybind { key: &'static str },
    /// A scoreboard entry.
    Score {
        name: JavaString,
        objective: JavaString,
        value: Option<JavaString>,
    },
}

/// A hover event attached to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum HoverEvent {
    ShowText(JavaString),
    ShowItem(JavaString),
    ShowEntity(JavaString),
    ShowAchievement(JavaString),
}

/// A click event attached to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickEvent {
    OpenUrl(JavaString),
    RunCommand(JavaString),
    SuggestCommand(JavaString),
    ChangePage(u64),
}

/// One node of a chat message tree.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChatComponent {
    pub style: Style,
    pub insertion: Option<JavaString>,
    /// At most one content variant; absent renders as empty text.
    pub content: Option<Content>,
    pub hover: Option<HoverEvent>,
    pub click: Option<ClickEvent>,
    pub extra: Vec<ChatComponent>,
}

impl ChatComponent {
    /// A blank component inheriting everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child seeded with this component's decorations and color.
    pub fn inheriting(&self) -> Self {
        Self {
            style: self.style,
            ..Self::default()
        }
    }

    /// Parse a complete chat JSON document.
    ///
    /// In tolerant mode unknown keys and out-of-context or wrongly typed
    /// values are skipped; otherwise they fail the parse. Structural
    /// violations (ambiguous traits, bad colors, event state machine
    /// errors) fail in either mode.
    pub fn from_json(bytes: &[u8], tolerant: bool) -> Result<ChatComponent, ChatError> {
        de::parse(bytes, tolerant)
    }

    /// Read the protocol envelope: var32 byte length then the document.
    ///
    /// Lengths outside 1..=32767 are rejected.
    pub fn read_prefixed(
        reader: &mut ByteReader<'_>,
        tolerant: bool,
    ) -> Result<ChatComponent, ChatError> {
        let length = reader.read_var32()?;
        if length <= 0 || length > crate::protocol::DEFAULT_STRING_BOUND as i32 {
            return Err(ChatError::Wire(WireError::PayloadTooLarge(
                length.max(0) as usize,
            )));
        }
        let body = reader.read_slice(length as usize)?;
        Self::from_json(body, tolerant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ByteWriter;

    #[test]
    fn test_minimal_text() {
        let c = ChatComponent::from_json(br#"{"text":"hi"}"#, false).unwrap();
        assert_eq!(
            c.content,
            Some(Content::Text {
                text: JavaString::from("hi")
            })
        );
        assert_eq!(c.style, Style::default());
        assert!(c.extra.is_empty());
    }

    #[test]
    fn test_extra_inherits_style() {
        let c = ChatComponent::from_json(
            br#"{"text":"a","bold":true,"extra":[{"text":"b"}]}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.style.bold, Some(true));
        assert_eq!(c.extra.len(), 1);
        assert_eq!(c.extra[0].style.bold, Some(true));
        assert_eq!(
            c.extra[0].content,
            Some(Content::Text {
                text: JavaString::from("b")
            })
        );
    }

    #[test]
    fn test_style_set_after_extra_not_inherited() {
        let c = ChatComponent::from_json(
            br#"{"text":"a","extra":[{"text":"b"}],"bold":true}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.style.bold, Some(true));
        assert_eq!(c.extra[0].style.bold, None);
    }

    #[test]
    fn test_color_and_decorations() {
        let c = ChatComponent::from_json(
            br#"{"text":"x","color":"gold","italic":false,"obfuscated":"true"}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.style.color.unwrap().name, "gold");
        assert_eq!(c.style.italic, Some(false));
        assert_eq!(c.style.obfuscated, Some(true));
    }

    #[test]
    fn test_invalid_color() {
        let err = ChatComponent::from_json(br#"{"text":"x","color":"mauve"}"#, false).unwrap_err();
        assert!(matches!(err, ChatError::InvalidColor(name) if name == "mauve"));
    }

    #[test]
    fn test_bad_decoration_literal() {
        let err =
            ChatComponent::from_json(br#"{"text":"x","bold":"yes"}"#, false).unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedValueType(_)));
    }

    #[test]
    fn test_ambiguous_content() {
        let err =
            ChatComponent::from_json(br#"{"text":"a","keybind":"key.jump"}"#, false).unwrap_err();
        assert!(matches!(err, ChatError::AmbiguousTrait));
    }

    #[test]
    fn test_translate_updates_key_only() {
        let c = ChatComponent::from_json(
            br#"{"translate":"chat.type.text","with":["Steve","hello"],"extra":[]}"#,
            false,
        )
        .unwrap();
        assert_eq!(
            c.content,
            Some(Content::Translate {
                key: "chat.type.text".to_string(),
                with: vec![JavaString::from("Steve"), JavaString::from("hello")],
            })
        );

        // A second translate key replaces the key, keeping the list.
        let c = ChatComponent::from_json(
            br#"{"with":["a"],"translate":"first","translate":"second"}"#,
            false,
        )
        .unwrap();
        assert_eq!(
            c.content,
            Some(Content::Translate {
                key: "second".to_string(),
                with: vec![JavaString::from("a")],
            })
        );
    }

    #[test]
    fn test_keybind_resolves() {
        let c = ChatComponent::from_json(br#"{"keybind":"key.sneak"}"#, false).unwrap();
        assert_eq!(c.content, Some(Content::Keybind { key: "key.sneak" }));

        let err = ChatComponent::from_json(br#"{"keybind":"key.warp"}"#, false).unwrap_err();
        assert!(matches!(err, ChatError::InvalidKeybind(_)));
    }

    #[test]
    fn test_score_content() {
        let c = ChatComponent::from_json(
            br#"{"score":{"name":"Steve","objective":"deaths","value":"3"}}"#,
            false,
        )
        .unwrap();
        assert_eq!(
            c.content,
            Some(Content::Score {
                name: JavaString::from("Steve"),
                objective: JavaString::from("deaths"),
                value: Some(JavaString::from("3")),
            })
        );
    }

    #[test]
    fn test_insertion() {
        let c = ChatComponent::from_json(br#"{"text":"x","insertion":"/w Steve "}"#, false)
            .unwrap();
        assert_eq!(c.insertion, Some(JavaString::from("/w Steve ")));
    }

    #[test]
    fn test_click_event_orders() {
        // action before value
        let c = ChatComponent::from_json(
            br#"{"text":"x","clickEvent":{"action":"run_command","value":"/help"}}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.click, Some(ClickEvent::RunCommand(JavaString::from("/help"))));

        // value before action
        let c = ChatComponent::from_json(
            br#"{"text":"x","clickEvent":{"value":"https://example.net","action":"open_url"}}"#,
            false,
        )
        .unwrap();
        assert_eq!(
            c.click,
            Some(ClickEvent::OpenUrl(JavaString::from("https://example.net")))
        );
    }

    #[test]
    fn test_change_page_integer() {
        let c = ChatComponent::from_json(
            br#"{"text":"x","clickEvent":{"action":"change_page","value":4}}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.click, Some(ClickEvent::ChangePage(4)));

        let err = ChatComponent::from_json(
            br#"{"text":"x","clickEvent":{"action":"run_command","value":4}}"#,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::InvalidValueType));
    }

    #[test]
    fn test_hover_rejects_integers() {
        let err = ChatComponent::from_json(
            br#"{"text":"x","hoverEvent":{"action":"show_text","value":9}}"#,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::InvalidValueType));
    }

    #[test]
    fn test_hover_show_text() {
        let c = ChatComponent::from_json(
            br#"{"text":"x","hoverEvent":{"value":"tip","action":"show_text"}}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.hover, Some(HoverEvent::ShowText(JavaString::from("tip"))));
    }

    #[test]
    fn test_duplicate_action_and_value() {
        let err = ChatComponent::from_json(
            br#"{"hoverEvent":{"action":"show_text","action":"show_item"}}"#,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::DuplicateAction));

        let err = ChatComponent::from_json(
            br#"{"clickEvent":{"value":"a","value":"b","action":"run_command"}}"#,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::DuplicateValue));
    }

    #[test]
    fn test_unknown_key_modes() {
        let err = ChatComponent::from_json(br#"{"text":"x","sparkle":1}"#, false).unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedKey(key) if key == "sparkle"));

        let c = ChatComponent::from_json(
            br#"{"text":"x","sparkle":{"deep":[1,2,{"three":3}]}}"#,
            true,
        )
        .unwrap();
        assert_eq!(
            c.content,
            Some(Content::Text {
                text: JavaString::from("x")
            })
        );
    }

    #[test]
    fn test_wrong_context_key() {
        // "action" only lives inside event objects.
        let err = ChatComponent::from_json(br#"{"action":"open_url"}"#, false).unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedKey(_)));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = ChatComponent::from_json(br#"{"text": }"#, false).unwrap_err();
        match err {
            ChatError::Syntax { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column > 0);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_prefixed_envelope() {
        let body = br#"{"text":"hi"}"#;
        let mut w = ByteWriter::new();
        w.put(body).unwrap();
        let framed = w.length_prefixed().unwrap().to_vec();
        let mut r = ByteReader::new(&framed);
        let c = ChatComponent::read_prefixed(&mut r, false).unwrap();
        assert_eq!(
            c.content,
            Some(Content::Text {
                text: JavaString::from("hi")
            })
        );
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_prefixed_rejects_zero_length() {
        let mut r = ByteReader::new(&[0x00]);
        assert!(ChatComponent::read_prefixed(&mut r, false).is_err());
    }

    #[test]
    fn test_nested_extra_chain() {
        let c = ChatComponent::from_json(
            br#"{"text":"a","color":"red","extra":[{"text":"b","extra":[{"text":"c"}]}]}"#,
            false,
        )
        .unwrap();
        assert_eq!(c.extra[0].style.color.unwrap().name, "red");
        assert_eq!(c.extra[0].extra[0].style.color.unwrap().name, "red");
    }
}
