//! The closed keybind name set.
//!
//! A `keybind` chat component names one of the client's configurable
//! bindings; the client substitutes whatever key the player has bound.

/// All recognized binding names.
pub static KEYBINDS: [&str; 33] = [
    "key.attack",
    "key.use",
    "key.forward",
    "key.left",
    "key.back",
    "key.right",
    "key.jump",
    "key.sneak",
    "key.sprint",
    "key.drop",
    "key.inventory",
    "key.chat",
    "key.playerlist",
    "key.pickItem",
    "key.command",
    "key.screenshot",
    "key.togglePerspective",
    "key.smoothCamera",
    "key.fullscreen",
    "key.spectatorOutlines",
    "key.swapHands",
    "key.saveToolbarActivator",
    "key.loadToolbarActivator",
    "key.advancements",
    "key.hotbar.1",
    "key.hotbar.2",
    "key.hotbar.3",
    "key.hotbar.4",
    "key.hotbar.5",
    "key.hotbar.6",
    "key.hotbar.7",
    "key.hotbar.8",
    "key.hotbar.9",
];

/// Resolve a binding name to its interned form.
pub fn lookup(name: &str) -> Option<&'static str> {
    KEYBINDS.iter().find(|&&k| k == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("key.jump"), Some("key.jump"));
        assert_eq!(lookup("key.hotbar.9"), Some("key.hotbar.9"));
        assert!(lookup("key.hotbar.10").is_none());
        assert!(lookup("jump").is_none());
    }

    #[test]
    fn test_closed_set_size() {
        assert_eq!(KEYBINDS.len(), 33);
    }
}
