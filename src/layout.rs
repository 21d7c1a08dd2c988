use ratatui::layout::{Position, Rect};

use crate::column::{CellValue, ColumnDescriptor};
use crate::domain::Message;
use crate::record::Record;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListLayout {
    Table,
    Cards,
}

impl ListLayout {
    /// Dense table on wide terminals, stacked cards below the breakpoint.
    pub fn choose(width: usize, breakpoint: usize) -> Self {
        if width >= breakpoint {
            ListLayout::Table
        } else {
            ListLayout::Cards
        }
    }
}

/// Renders one record as a card in the narrow layout.
pub trait CardComponent: Send {
    fn title(&self, record: &Record) -> CellValue;

    fn lines(&self, record: &Record) -> Vec<(String, CellValue)>;

    /// Number of body lines every card reserves.
    fn body_height(&self) -> usize;
}

/// Card built from the page's columns: the first one is the title.
pub struct ColumnCard {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnCard {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        ColumnCard { columns }
    }
}

impl CardComponent for ColumnCard {
    fn title(&self, record: &Record) -> CellValue {
        self.columns
            .first()
            .map(|c| c.render(record))
            .unwrap_or(CellValue::Empty)
    }

    fn lines(&self, record: &Record) -> Vec<(String, CellValue)> {
        self.columns
            .iter()
            .skip(1)
            .map(|c| (c.header.clone(), c.render(record)))
            .collect()
    }

    fn body_height(&self) -> usize {
        self.columns.len().saturating_sub(1).max(1)
    }
}

/// Card for free text messages such as contact forms and prayer requests.
pub struct MessageCard {
    title_field: &'static str,
    body_field: &'static str,
    meta_fields: &'static [&'static str],
}

impl CardComponent for MessageCard {
    fn title(&self, record: &Record) -> CellValue {
        CellValue::text(record.text(self.title_field))
    }

    fn lines(&self, record: &Record) -> Vec<(String, CellValue)> {
        let mut lines = vec![(String::new(), CellValue::text(record.text(self.body_field)))];
        for field in self.meta_fields {
            lines.push((field.to_string(), CellValue::text(record.text(field))));
        }
        lines
    }

    fn body_height(&self) -> usize {
        1 + self.meta_fields.len()
    }
}

/// Card component of a resource, if it has a dedicated one.
pub fn card_for(resource: Resource) -> Option<Box<dyn CardComponent>> {
    match resource {
        Resource::Contacts => Some(Box::new(MessageCard {
            title_field: "name",
            body_field: "message",
            meta_fields: &["date", "status"],
        })),
        Resource::PrayerRequests => Some(Box::new(MessageCard {
            title_field: "name",
            body_field: "request",
            meta_fields: &["status"],
        })),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    Checkbox,
    Actions,
}

#[derive(Debug, Clone)]
struct RowHit {
    id: String,
    area: Rect,
    controls: Vec<(Control, Rect)>,
}

/// Screen areas of the rendered rows and of the controls inside them.
///
/// Filled by the renderer on every draw and queried for mouse clicks.
#[derive(Debug, Default, Clone)]
pub struct HitMap {
    rows: Vec<RowHit>,
}

impl HitMap {
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn add_row(&mut self, id: &str, area: Rect) {
        self.rows.push(RowHit {
            id: id.to_string(),
            area,
            controls: Vec::new(),
        });
    }

    /// Register a control inside the last added row.
    pub fn add_control(&mut self, control: Control, area: Rect) {
        if let Some(row) = self.rows.last_mut() {
            row.controls.push((control, area));
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Message for a click at `(x, y)`.
    ///
    /// Clicks landing on a control never navigate to the record.
    pub fn click(&self, x: u16, y: u16) -> Option<Message> {
        let position = Position::new(x, y);
        let row = self.rows.iter().find(|r| r.area.contains(position))?;
        let control = row
            .controls
            .iter()
            .find(|(_, area)| area.contains(position))
            .map(|(control, _)| *control);
        Some(match control {
            Some(Control::Checkbox) => Message::ToggleSelect(row.id.clone()),
            Some(Control::Actions) => Message::RowAction(row.id.clone()),
            None => Message::OpenRecord(row.id.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_row() -> HitMap {
        let mut hits = HitMap::default();
        hits.add_row("r1", Rect::new(0, 2, 60, 1));
        hits.add_control(Control::Checkbox, Rect::new(0, 2, 3, 1));
        hits.add_control(Control::Actions, Rect::new(58, 2, 2, 1));
        hits
    }

    #[test]
    fn checkbox_click_does_not_open_the_record() {
        let hits = one_row();
        assert_eq!(hits.click(1, 2), Some(Message::ToggleSelect("r1".into())));
        assert_eq!(hits.click(20, 2), Some(Message::OpenRecord("r1".into())));
        assert_eq!(hits.click(59, 2), Some(Message::RowAction("r1".into())));
    }

    #[test]
    fn clicks_outside_rows_are_ignored() {
        let hits = one_row();
        assert_eq!(hits.click(20, 3), None);
        assert_eq!(hits.click(61, 2), None);
    }

    #[test]
    fn breakpoint_picks_layout() {
        assert_eq!(ListLayout::choose(120, 80), ListLayout::Table);
        assert_eq!(ListLayout::choose(80, 80), ListLayout::Table);
        assert_eq!(ListLayout::choose(79, 80), ListLayout::Cards);
    }

    #[test]
    fn column_card_uses_first_column_as_title() {
        let card = ColumnCard::new(Resource::Books.schema().columns());
        let record = Record::new("b").with("title", "Psalms").with("author", "David");
        assert_eq!(card.title(&record).plain(), "Psalms");
        let lines = card.lines(&record);
        assert_eq!(lines[0], ("Author".to_string(), CellValue::Text("David".into())));
        assert_eq!(card.body_height(), lines.len());
    }

    #[test]
    fn message_card_shows_the_body() {
        let card = card_for(Resource::PrayerRequests).expect("card");
        let record = Record::new("p").with("name", "Joanna").with("request", "Healing");
        assert_eq!(card.title(&record).plain(), "Joanna");
        assert_eq!(card.lines(&record)[0].1.plain(), "Healing");
    }
}
