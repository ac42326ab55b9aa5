//! The chat keyword table.
//!
//! Every JSON key the reader understands maps to a token carrying the
//! contexts it may appear in and the value types it accepts. Keys missing
//! from the table, or looked up from the wrong context, are unknown to
//! the reader: ignored in tolerant mode, an error otherwise.

/// Parse contexts, as a bit set.
pub mod ctx {
    pub const GENESIS: u16 = 1;
    pub const COMPOUND: u16 = 2;
    pub const HOVER: u16 = 4;
    pub const CLICK: u16 = 8;
    pub const EXTRA: u16 = 16;
    pub const WITH: u16 = 32;
    pub const SCORE: u16 = 64;
    pub const HOVER_ACT: u16 = 128;
    pub const CLICK_ACT: u16 = 256;
    pub const BOOLEAN: u16 = 512;
}

/// Accepted JSON value types, as a bit set.
pub mod ty {
    pub const BOOL: u16 = 2;
    pub const INTEGER: u16 = 4;
    pub const STRING: u16 = 16;
    pub const OBJECT: u16 = 32;
    pub const ARRAY: u16 = 64;
}

/// Token keys, one per recognized keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    // Boolean literals, valid where a decoration value is parsed as text.
    True,
    False,

    // Child population.
    Extra,

    // Decorations and style.
    Bold,
    Italic,
    Underlined,
    Strikethrough,
    Obfuscated,
    Insertion,
    Color,

    // Content traits.
    Text,
    Translate,
    With,
    Keybind,
    Score,
    ScoreName,
    ScoreObjective,

    // Events.
    HoverEvent,
    ClickEvent,
    Action,
    Value,

    // Click actions.
    ActOpenUrl,
    ActRunCommand,
    ActSuggestCommand,
    ActChangePage,

    // Hover actions.
    ActShowText,
    ActShowItem,
    ActShowEntity,
    ActShowAchievement,
}

/// One keyword table entry.
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub key: Key,
    /// Contexts the keyword is permitted in.
    pub contexts: u16,
    /// Value types the keyword accepts.
    pub types: u16,
}

const fn token(key: Key, contexts: u16, types: u16) -> Token {
    Token {
        key,
        contexts,
        types,
    }
}

/// Resolve a keyword. The caller still checks the token's context mask.
pub fn lookup(name: &str) -> Option<Token> {
    use self::{ctx::*, ty::*};
    Some(match name {
        "true" => token(Key::True, BOOLEAN, STRING),
        "false" => token(Key::False, BOOLEAN, STRING),

        "extra" => token(Key::Extra, COMPOUND, ARRAY),

        "bold" => token(Key::Bold, COMPOUND, BOOL | STRING),
        "italic" => token(Key::Italic, COMPOUND, BOOL | STRING),
        "underlined" => token(Key::Underlined, COMPOUND, BOOL | STRING),
        "strikethrough" => token(Key::Strikethrough, COMPOUND, BOOL | STRING),
        "obfuscated" => token(Key::Obfuscated, COMPOUND, BOOL | STRING),
        "insertion" => token(Key::Insertion, COMPOUND, STRING),
        "color" => token(Key::Color, COMPOUND, STRING),

        "text" => token(Key::Text, COMPOUND, STRING),
        "translate" => token(Key::Translate, COMPOUND, STRING),
        "with" => token(Key::With, COMPOUND, ARRAY),
        "keybind" => token(Key::Keybind, COMPOUND, STRING),
        "score" => token(Key::Score, COMPOUND, OBJECT),
        "name" => token(Key::ScoreName, SCORE, STRING),
        "objective" => token(Key::ScoreObjective, SCORE, STRING),

        "hoverEvent" => token(Key::HoverEvent, COMPOUND, OBJECT),
        "clickEvent" => token(Key::ClickEvent, COMPOUND, OBJECT),
        "action" => token(Key::Action, HOVER | CLICK, STRING),
        "value" => token(Key::Value, HOVER | CLICK | SCORE, STRING | INTEGER),

        "open_url" => token(Key::ActOpenUrl, CLICK_ACT, STRING),
        "run_command" => token(Key::ActRunCommand, CLICK_ACT, STRING),
        "suggest_command" => token(Key::ActSuggestCommand, CLICK_ACT, STRING),
        "change_page" => token(Key::ActChangePage, CLICK_ACT, INTEGER),

        "show_text" => token(Key::ActShowText, HOVER_ACT, STRING),
        "show_item" => token(Key::ActShowItem, HOVER_ACT, STRING),
        "show_entity" => token(Key::ActShowEntity, HOVER_ACT, STRING),
        "show_achievement" => token(Key::ActShowAchievement, HOVER_ACT, STRING),

        _ => return None,
    })
}

/// Resolve a keyword and require it to be valid in `context`.
pub fn lookup_in(name: &str, context: u16) -> Option<Token> {
    lookup(name).filter(|t| t.contexts & context != 0)
}
