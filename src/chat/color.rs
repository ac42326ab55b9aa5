//! The closed chat color set.
//!
//! Sixteen named colors plus `reset`. Each carries the legacy control
//! character and the foreground/background RGB triples the client renders
//! with; `reset` forces the surrounding context's color.

/// One chat color.
#[derive(Debug, PartialEq, Eq)]
pub struct ChatColor {
    /// The JSON name of the color.
    pub name: &'static str,
    /// The legacy formatting control character.
    pub control: char,
    /// Foreground RGB.
    pub fg: [u8; 3],
    /// Background RGB.
    pub bg: [u8; 3],
}

/// The sixteen concrete colors, in control-character order.
pub static COLORS: [ChatColor; 16] = [
    ChatColor { name: "black", control: '0', fg: [0x00, 0x00, 0x00], bg: [0x00, 0x00, 0x00] },
    ChatColor { name: "dark_blue", control: '1', fg: [0x00, 0x00, 0xaa], bg: [0x00, 0x00, 0x2a] },
    ChatColor { name: "dark_green", control: '2', fg: [0x00, 0xaa, 0x00], bg: [0x00, 0x2a, 0x00] },
    ChatColor { name: "dark_aqua", control: '3', fg: [0x00, 0xaa, 0xaa], bg: [0x00, 0x2a, 0x2a] },
    ChatColor { name: "dark_red", control: '4', fg: [0xaa, 0x00, 0x00], bg: [0x2a, 0x00, 0x00] },
    ChatColor { name: "dark_purple", control: '5', fg: [0xaa, 0x00, 0xaa], bg: [0x2a, 0x00, 0x2a] },
    ChatColor { name: "gold", control: '6', fg: [0xff, 0xaa, 0x00], bg: [0x2a, 0x2a, 0x00] },
    ChatColor { name: "gray", control: '7', fg: [0xaa, 0xaa, 0xaa], bg: [0x2a, 0x2a, 0x2a] },
    ChatColor { name: "dark_gray", control: '8', fg: [0x55, 0x55, 0x55], bg: [0x15, 0x15, 0x15] },
    ChatColor { name: "blue", control: '9', fg: [0x55, 0x55, 0xff], bg: [0x15, 0x15, 0x3f] },
    ChatColor { name: "green", control: 'a', fg: [0x55, 0xff, 0x55], bg: [0x15, 0x3f, 0x15] },
    ChatColor { name: "aqua", control: 'b', fg: [0x55, 0xff, 0xff], bg: [0x15, 0x3f, 0x3f] },
    ChatColor { name: "red", control: 'c', fg: [0xff, 0x55, 0x55], bg: [0x3f, 0x15, 0x15] },
    ChatColor { name: "light_purple", control: 'd', fg: [0xff, 0x55, 0xff], bg: [0x3f, 0x15, 0x3f] },
    ChatColor { name: "yellow", control: 'e', fg: [0xff, 0xff, 0x55], bg: [0x3f, 0x3f, 0x15] },
    ChatColor { name: "white", control: 'f', fg: [0xff, 0xff, 0xff], bg: [0x3f, 0x3f, 0x3f] },
];

/// The reset pseudo-color.
pub static RESET: ChatColor = ChatColor {
    name: "reset",
    control: 'r',
    fg: [0xff, 0xff, 0xff],
    bg: [0x3f, 0x3f, 0x3f],
};

/// Resolve a color by its JSON name.
pub fn lookup(name: &str) -> Option<&'static ChatColor> {
    if name == "reset" {
        return Some(&RESET);
    }
    COLORS.iter().find(|c| c.name == name)
}
