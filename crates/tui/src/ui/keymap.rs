use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    Cancel,
    Enter,
    ForceEnter,
    NextField,
    PrevField,
    Up,
    Down,
    Split,
    AddSplit,
    SwitchMode,
    Delete,
    ToggleCleared,
    Refresh,
    Backspace,
    Input(char),
    None,
}

pub fn map_key(key: KeyEvent) -> AppAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    if ctrl {
        match key.code {
            KeyCode::Char('c') => return AppAction::Quit,
            KeyCode::Char('s') => return AppAction::Split,
            KeyCode::Char('a') => return AppAction::AddSplit,
            KeyCode::Char('e') => return AppAction::SwitchMode,
            KeyCode::Char('d') => return AppAction::Delete,
            KeyCode::Char('r') => return AppAction::Refresh,
            KeyCode::Char(' ') => return AppAction::ToggleCleared,
            _ => {}
        }
    }

    match key.code {
        KeyCode::Enter if ctrl || alt => AppAction::ForceEnter,
        KeyCode::Enter => AppAction::Enter,
        KeyCode::Esc => AppAction::Cancel,
        KeyCode::Tab => AppAction::NextField,
        KeyCode::BackTab => AppAction::PrevField,
        KeyCode::Backspace => AppAction::Backspace,
        KeyCode::Up => AppAction::Up,
        KeyCode::Down => AppAction::Down,
        KeyCode::Char(ch) if !ctrl && !alt => AppAction::Input(ch),
        _ => AppAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn enter_variants() {
        assert_eq!(
            map_key(key(KeyCode::Enter, KeyModifiers::NONE)),
            AppAction::Enter
        );
        assert_eq!(
            map_key(key(KeyCode::Enter, KeyModifiers::CONTROL)),
            AppAction::ForceEnter
        );
        assert_eq!(
            map_key(key(KeyCode::Enter, KeyModifiers::ALT)),
            AppAction::ForceEnter
        );
    }

    #[test]
    fn control_shortcuts() {
        assert_eq!(
            map_key(key(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            AppAction::Split
        );
        assert_eq!(
            map_key(key(KeyCode::Char(' '), KeyModifiers::CONTROL)),
            AppAction::ToggleCleared
        );
        assert_eq!(
            map_key(key(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            AppAction::None
        );
    }

    #[test]
    fn plain_characters_are_input() {
        assert_eq!(
            map_key(key(KeyCode::Char('q'), KeyModifiers::NONE)),
            AppAction::Input('q')
        );
        assert_eq!(
            map_key(key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            AppAction::Input('A')
        );
        assert_eq!(
            map_key(key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            AppAction::PrevField
        );
    }
}
