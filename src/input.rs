// input.rs - 键盘快捷键映射

use winit::event::VirtualKeyCode;

use crate::config::KeyConfig;
use crate::viewer::ViewAction;

pub fn parse_key(name: &str) -> Option<VirtualKeyCode> {
    use VirtualKeyCode::*;

    let name = name.trim();
    let key = match name.to_ascii_uppercase().as_str() {
        "A" => A, "B" => B, "C" => C, "D" => D, "E" => E, "F" => F, "G" => G,
        "H" => H, "I" => I, "J" => J, "K" => K, "L" => L, "M" => M, "N" => N,
        "O" => O, "P" => P, "Q" => Q, "R" => R, "S" => S, "T" => T, "U" => U,
        "V" => V, "W" => W, "X" => X, "Y" => Y, "Z" => Z,
        "0" => Key0, "1" => Key1, "2" => Key2, "3" => Key3, "4" => Key4,
        "5" => Key5, "6" => Key6, "7" => Key7, "8" => Key8, "9" => Key9,
        "SPACE" => Space,
        "TAB" => Tab,
        "F1" => F1, "F2" => F2, "F3" => F3, "F4" => F4, "F5" => F5, "F6" => F6,
        "F7" => F7, "F8" => F8, "F9" => F9, "F10" => F10, "F11" => F11, "F12" => F12,
        _ => return None,
    };
    Some(key)
}

#[derive(Debug, Clone, Default)]
pub struct Shortcuts {
    toggle_rotation: Option<VirtualKeyCode>,
    toggle_background: Option<VirtualKeyCode>,
}

impl Shortcuts {
    /// Unknown key names are logged and leave that shortcut unbound.
    pub fn from_config(keys: &KeyConfig) -> Self {
        Self {
            toggle_rotation: bind("toggle_rotation", &keys.toggle_rotation),
            toggle_background: bind("toggle_background", &keys.toggle_background),
        }
    }

    pub fn action_for(&self, key: VirtualKeyCode) -> Option<ViewAction> {
        if self.toggle_rotation == Some(key) {
            Some(ViewAction::ToggleRotation)
        } else if self.toggle_background == Some(key) {
            Some(ViewAction::ToggleBackground)
        } else {
            None
        }
    }
}

fn bind(action: &str, name: &str) -> Option<VirtualKeyCode> {
    let key = parse_key(name);
    if key.is_none() {
        log::error!("unknown key {name:?} for {action}, shortcut disabled");
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_letters_digits_and_names() {
        assert_eq!(parse_key("r"), Some(VirtualKeyCode::R));
        assert_eq!(parse_key(" B "), Some(VirtualKeyCode::B));
        assert_eq!(parse_key("7"), Some(VirtualKeyCode::Key7));
        assert_eq!(parse_key("space"), Some(VirtualKeyCode::Space));
        assert_eq!(parse_key("F11"), Some(VirtualKeyCode::F11));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("Hyper"), None);
    }

    #[test]
    fn default_bindings_map_to_actions() {
        let shortcuts = Shortcuts::from_config(&KeyConfig::default());
        assert_eq!(shortcuts.action_for(VirtualKeyCode::R), Some(ViewAction::ToggleRotation));
        assert_eq!(shortcuts.action_for(VirtualKeyCode::B), Some(ViewAction::ToggleBackground));
        assert_eq!(shortcuts.action_for(VirtualKeyCode::Q), None);
    }

    #[test]
    fn bad_binding_disables_only_that_shortcut() {
        let keys = KeyConfig {
            toggle_rotation: "NotAKey".to_string(),
            toggle_background: "B".to_string(),
        };
        let shortcuts = Shortcuts::from_config(&keys);
        assert_eq!(shortcuts.action_for(VirtualKeyCode::R), None);
        assert_eq!(shortcuts.action_for(VirtualKeyCode::B), Some(ViewAction::ToggleBackground));
    }
}
