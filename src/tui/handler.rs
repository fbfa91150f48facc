use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::View;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    OpenPost,
    Back,
    ScrollUp,
    ScrollDown,
    Refresh,
    Retry,
    OpenInBrowser,
    ShowHelp,
    HideHelp,
}

pub fn handle_key_event(key: KeyEvent, view: View, show_help: bool) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) => return Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Some(AppAction::Quit),
        (KeyCode::Char('o'), _) => return Some(AppAction::OpenInBrowser),
        (KeyCode::Char('?'), _) => return Some(AppAction::ShowHelp),
        _ => {}
    }

    match view {
        View::List => match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            KeyCode::Char('g') | KeyCode::Home => Some(AppAction::MoveToTop),
            KeyCode::Char('G') | KeyCode::End => Some(AppAction::MoveToBottom),
            KeyCode::Enter => Some(AppAction::OpenPost),
            KeyCode::Char('r') => Some(AppAction::Refresh),
            KeyCode::Char('R') => Some(AppAction::Retry),
            _ => None,
        },
        View::Detail => match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::ScrollDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::ScrollUp),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') => Some(AppAction::Back),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn help_swallows_every_key() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('q')), View::List, true),
            Some(AppAction::HideHelp)
        );
    }

    #[test]
    fn keys_depend_on_the_view() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('j')), View::List, false),
            Some(AppAction::MoveDown)
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Char('j')), View::Detail, false),
            Some(AppAction::ScrollDown)
        );
        assert_eq!(handle_key_event(key(KeyCode::Char('r')), View::Detail, false), None);
        assert_eq!(
            handle_key_event(key(KeyCode::Esc), View::Detail, false),
            Some(AppAction::Back)
        );
    }

    #[test]
    fn ctrl_c_quits_anywhere() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(ctrl_c, View::Detail, false), Some(AppAction::Quit));
    }
}
