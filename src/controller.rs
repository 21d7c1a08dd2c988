use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::config::AdminConfig;
use crate::domain::{AdminError, Message};
use crate::layout::HitMap;
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AdminConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model, hits: &HitMap) -> Result<Option<Message>, AdminError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Mouse(mouse) if !model.raw_keyevents() => self.handle_mouse(mouse, hits),
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    pub fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(Message::MoveLeft),
            (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Tab, _) => Some(Message::NextResource),
            (KeyCode::BackTab, _) => Some(Message::PrevResource),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('D'), _) => Some(Message::FilterDate),
            (KeyCode::Char('s'), _) => Some(Message::CycleStatusFilter),
            (KeyCode::Char('t'), _) => Some(Message::CycleCategoryFilter),
            (KeyCode::Char('o'), _) => Some(Message::CycleLocationFilter),
            (KeyCode::Char('x'), _) => Some(Message::ClearFilters),
            (KeyCode::Char(' '), _) => Some(Message::ToggleSelectCurrent),
            (KeyCode::Char('a'), _) => Some(Message::SelectAll),
            (KeyCode::Char('b'), _) => Some(Message::ChooseBulkAction),
            (KeyCode::Char('A'), _) => Some(Message::ApplyBulk),
            (KeyCode::Char('+'), _) => Some(Message::SortAscending),
            (KeyCode::Char('-'), _) => Some(Message::SortDescending),
            (KeyCode::Char('n'), _) => Some(Message::NewRecord),
            (KeyCode::Char('e'), _) => Some(Message::EditRecord),
            (KeyCode::Char('c'), _) => Some(Message::CompleteRecord),
            (KeyCode::Char('d'), _) => Some(Message::DeleteRecord),
            (KeyCode::Char('y'), _) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('r'), _) => Some(Message::Reload),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    pub fn handle_mouse(&self, mouse: MouseEvent, hits: &HitMap) -> Option<Message> {
        let message = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => hits.click(mouse.column, mouse.row),
            MouseEventKind::ScrollDown => Some(Message::MoveDown),
            MouseEventKind::ScrollUp => Some(Message::MoveUp),
            _ => None,
        };
        if message.is_some() {
            trace!("Mapped: {mouse:?} => {message:?}");
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;

    use crate::layout::Control;

    fn controller() -> Controller {
        Controller::new(&AdminConfig::default())
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn keys_map_to_messages() {
        let c = controller();
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(c.handle_key(key(KeyCode::Char('j'))), Some(Message::MoveDown));
        assert_eq!(c.handle_key(key(KeyCode::Char(' '))), Some(Message::ToggleSelectCurrent));
        assert_eq!(c.handle_key(key(KeyCode::Char('A'))), Some(Message::ApplyBulk));
        assert_eq!(c.handle_key(key(KeyCode::Char('Z'))), None);
        assert_eq!(
            c.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        );
    }

    #[test]
    fn clicks_go_through_the_hit_map() {
        let mut hits = HitMap::default();
        hits.add_row("m1", Rect::new(0, 3, 80, 1));
        hits.add_control(Control::Checkbox, Rect::new(0, 3, 4, 1));

        let c = controller();
        assert_eq!(
            c.handle_mouse(click(2, 3), &hits),
            Some(Message::ToggleSelect("m1".into()))
        );
        assert_eq!(
            c.handle_mouse(click(40, 3), &hits),
            Some(Message::OpenRecord("m1".into()))
        );
        assert_eq!(c.handle_mouse(click(40, 9), &hits), None);
    }
}
