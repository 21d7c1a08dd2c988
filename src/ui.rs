use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::column::{CellValue, ColumnDescriptor, Tone};
use crate::config::AdminConfig;
use crate::detail::DetailView;
use crate::form::RecordForm;
use crate::layout::{Control, HitMap, ListLayout};
use crate::model::{Modus, Model, PageRow, UIData};
use crate::resource::FieldKind;
use crate::toast::ToastLevel;

pub const TOP_BAR_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 1;
pub const CARD_BORDER_HEIGHT: usize = 2;

const CHECKBOX_WIDTH: u16 = 4; // "[x] "
const ACTION_WIDTH: u16 = 3; // " ⋯ "
const COLUMN_WIDTH_MARGIN: usize = 1;

pub struct TableUI {
    max_column_width: usize,
    hit_map: HitMap,
}

impl TableUI {
    pub fn new(cfg: &AdminConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
            hit_map: HitMap::default(),
        }
    }

    /// Clickable areas of the last drawn frame.
    pub fn hit_map(&self) -> &HitMap {
        &self.hit_map
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();
        self.hit_map.clear();

        let [top, list, status] = Layout::vertical([
            Constraint::Length(TOP_BAR_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());

        self.draw_top_bar(&data, frame, top);
        if data.rows.is_empty() {
            let text = if data.loading {
                "Loading ..."
            } else if data.total_records > 0 {
                "No records match the current filters"
            } else {
                "No records yet, press n to create one"
            };
            frame.render_widget(Paragraph::new(text).centered().dim(), list);
        } else {
            match data.layout.list_layout() {
                ListLayout::Table => self.draw_table(&data, frame, list),
                ListLayout::Cards => self.draw_cards(&data, frame, list),
            }
        }
        self.draw_status_line(&data, frame, status);
        // Rows under an overlay are not clickable.
        if data.modus != Modus::List {
            self.hit_map.clear();
        }

        match data.modus {
            Modus::Detail => {
                if let Some(detail) = data.detail {
                    self.draw_detail(detail, frame);
                }
            }
            Modus::Form => {
                if let Some(form) = data.form {
                    self.draw_form(form, frame);
                }
            }
            Modus::Popup => {
                if let Some(message) = data.popup_message {
                    self.draw_popup(message, frame);
                }
            }
            Modus::List | Modus::CmdInput | Modus::Confirm => {}
        }
    }

    fn draw_top_bar(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::from(format!(" {} ", data.resource)).bold().reversed(),
            Span::from(format!(" {}/{} ", data.nrows, data.total_records)),
        ];
        if data.pages > 1 {
            spans.push(Span::from(format!("page {}/{} ", data.page + 1, data.pages)).dim());
        }
        if !data.filter.is_empty() {
            spans.push(Span::from(format!("[{}] ", data.filter)).yellow());
        }
        if let Some((header, ascending)) = data.sort {
            let arrow = if ascending { "↑" } else { "↓" };
            spans.push(Span::from(format!("{header}{arrow} ")).cyan());
        }
        if let Some(total) = data.amount_total {
            spans.push(Span::from(format!("total {total:.2} ")).green());
        }
        if data.selected_count > 0 {
            spans.push(Span::from(format!("{} selected ", data.selected_count)).magenta());
        }
        if let Some(action) = &data.bulk_action {
            let text = if data.bulk_running {
                format!("{action} running ... ")
            } else {
                format!("bulk: {action} (A to apply) ")
            };
            spans.push(Span::from(text).magenta().bold());
        }
        if data.loading {
            spans.push(Span::from("loading ...").dim());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn column_widths(&self, data: &UIData, available: usize) -> Vec<usize> {
        let mut widths = Vec::new();
        let mut used = 0;
        for column in data.columns.iter() {
            let width = column.width.unwrap_or_else(|| {
                data.rows
                    .iter()
                    .map(|row| column.render(row.record).plain().chars().count())
                    .chain(std::iter::once(column.header.chars().count()))
                    .max()
                    .unwrap_or(0)
            });
            let width = width.clamp(1, self.max_column_width);
            if used + width > available {
                if available > used {
                    widths.push(available - used);
                }
                break;
            }
            used += width + COLUMN_WIDTH_MARGIN;
            widths.push(width);
        }
        widths
    }

    fn draw_table(&mut self, data: &UIData, frame: &mut Frame, area: Rect) {
        let available = area.width.saturating_sub(CHECKBOX_WIDTH + ACTION_WIDTH) as usize;
        let widths = self.column_widths(data, available);

        let mut header = vec![Span::from(" ".repeat(CHECKBOX_WIDTH as usize))];
        for (idx, (column, width)) in data.columns.iter().zip(widths.iter()).enumerate() {
            let mut span = Span::from(pad(&column.header, *width + COLUMN_WIDTH_MARGIN)).bold();
            if idx == data.selected_column {
                span = span.underlined();
            }
            header.push(span);
        }
        let header_area = Rect::new(area.x, area.y, area.width, TABLE_HEADER_HEIGHT as u16);
        frame.render_widget(Paragraph::new(Line::from(header)), header_area);

        for (idx, row) in data.rows.iter().enumerate() {
            let y = area.y + TABLE_HEADER_HEIGHT as u16 + idx as u16;
            if y >= area.bottom() {
                break;
            }
            let row_area = Rect::new(area.x, y, area.width, 1);
            let line = self.table_row(data.columns, &widths, row, data.selected_column);
            frame.render_widget(Paragraph::new(line).style(row_style(row)), row_area);

            self.hit_map.add_row(&row.record.id, row_area);
            self.hit_map
                .add_control(Control::Checkbox, Rect::new(area.x, y, CHECKBOX_WIDTH - 1, 1));
            let action = Rect::new(area.right().saturating_sub(ACTION_WIDTH), y, ACTION_WIDTH, 1);
            self.hit_map.add_control(Control::Actions, action);
            frame.render_widget(Paragraph::new(" ⋯ ").dim(), action);
        }
    }

    fn table_row(
        &self,
        columns: &[ColumnDescriptor],
        widths: &[usize],
        row: &PageRow,
        selected_column: usize,
    ) -> Line<'static> {
        let mut spans = vec![Span::from(checkbox(row.selected))];
        for (idx, (column, width)) in columns.iter().zip(widths.iter()).enumerate() {
            let value = column.render(row.record);
            let mut span = cell_span(&value, *width + COLUMN_WIDTH_MARGIN);
            if row.current && idx == selected_column {
                span = span.bold();
            }
            spans.push(span);
        }
        Line::from(spans)
    }

    fn draw_cards(&mut self, data: &UIData, frame: &mut Frame, area: Rect) {
        let card_height = (data.card.body_height() + CARD_BORDER_HEIGHT) as u16;
        for (idx, row) in data.rows.iter().enumerate() {
            let y = area.y + idx as u16 * card_height;
            if y + card_height > area.bottom() {
                break;
            }
            let card_area = Rect::new(area.x, y, area.width, card_height);
            let title = data.card.title(row.record);
            let mut block = Block::bordered()
                .title(Line::from(vec![
                    Span::from(checkbox(row.selected)),
                    cell_span(&title, (area.width as usize).saturating_sub(10)),
                ]))
                .title_top(Line::from(" ⋯ ").right_aligned());
            if row.current {
                block = block.border_style(Style::new().yellow());
            }

            let lines: Vec<Line> = data
                .card
                .lines(row.record)
                .into_iter()
                .map(|(label, value)| {
                    let width = (area.width as usize).saturating_sub(label.chars().count() + 4);
                    if label.is_empty() {
                        Line::from(cell_span(&value, width))
                    } else {
                        Line::from(vec![Span::from(format!("{label}: ")).dim(), cell_span(&value, width)])
                    }
                })
                .collect();
            frame.render_widget(Paragraph::new(lines).block(block).style(row_style(row)), card_area);

            self.hit_map.add_row(&row.record.id, card_area);
            self.hit_map
                .add_control(Control::Checkbox, Rect::new(area.x + 1, y, CHECKBOX_WIDTH - 1, 1));
            self.hit_map.add_control(
                Control::Actions,
                Rect::new(card_area.right().saturating_sub(ACTION_WIDTH + 1), y, ACTION_WIDTH, 1),
            );
        }
    }

    fn draw_status_line(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        if let Some(mode) = data.cmd_mode {
            let prompt = mode.prompt();
            let line = Line::from(vec![Span::from(prompt).bold(), Span::from(data.cmdinput.input.clone())]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + data.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }
        if let Some(message) = &data.confirm_message {
            frame.render_widget(Paragraph::new(message.as_str()).red().bold(), area);
            return;
        }
        if let Some(toast) = data.toast {
            let style = match toast.level {
                ToastLevel::Info => Style::new(),
                ToastLevel::Success => Style::new().green(),
                ToastLevel::Warning => Style::new().yellow(),
                ToastLevel::Error => Style::new().red().bold(),
            };
            frame.render_widget(Paragraph::new(toast.message.as_str()).style(style), area);
            return;
        }
        let hints = match data.modus {
            Modus::Detail => "←/→ prev/next  c complete  e edit  d delete  y copy  Esc close",
            _ => "? help  / search  s/t/o filter  Space select  b bulk  n new  Tab resource  q quit",
        };
        frame.render_widget(Paragraph::new(hints).dim(), area);
    }

    fn draw_detail(&self, detail: &DetailView, frame: &mut Frame) {
        let area = centered(frame.area(), 80, detail.fields.len() as u16 + 2);
        let mut bottom = vec![Span::from(" e edit  d delete  y copy ")];
        if let Some(completion) = detail.completion() {
            bottom.push(Span::from(format!(" c {} ", completion.label)).green().bold());
        }
        let block = Block::bordered()
            .title(format!(" {} {} ", detail.resource, detail.record.id).bold())
            .title_bottom(Line::from(bottom));

        let label_width = detail
            .fields
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let lines: Vec<Line> = detail
            .fields
            .iter()
            .enumerate()
            .map(|(idx, (label, value))| {
                let line = Line::from(vec![
                    Span::from(pad(label, label_width + 2)).dim(),
                    Span::from(value.clone()),
                ]);
                if idx == detail.curser_row {
                    line.reversed()
                } else {
                    line
                }
            })
            .collect();

        let inner_height = area.height.saturating_sub(2) as usize;
        let offset = detail.curser_row.saturating_sub(inner_height.saturating_sub(1));
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(lines).block(block).scroll((offset as u16, 0)),
            area,
        );
    }

    fn draw_form(&self, form: &RecordForm, frame: &mut Frame) {
        let errors = form.fields.iter().filter(|f| f.error.is_some()).count();
        let area = centered(frame.area(), 70, (form.fields.len() + errors) as u16 + 2);
        let hints = if form.submitting {
            " Saving ... "
        } else {
            " Enter save  Tab next  ←/→ choose  Esc cancel "
        };
        let block = Block::bordered()
            .title(format!(" {} ", form.title()).bold())
            .title_bottom(Line::from(hints).dim());
        let inner = block.inner(area);

        let label_width = form
            .fields
            .iter()
            .map(|f| f.spec.label.chars().count() + 1)
            .max()
            .unwrap_or(0);
        let mut lines = Vec::new();
        let mut cursor = None;
        for (idx, field) in form.fields.iter().enumerate() {
            let marker = if field.spec.required { "*" } else { "" };
            let label = pad(&format!("{}{marker}", field.spec.label), label_width + 2);
            let value = match field.spec.kind {
                FieldKind::Choice(_) => format!("‹ {} ›", field.input.value()),
                _ => field.input.value().to_string(),
            };
            let focused = idx == form.focus;
            if focused && !matches!(field.spec.kind, FieldKind::Choice(_)) {
                let pos = field.input.get().curser_pos;
                cursor = Some((
                    inner.x + (label_width + 2 + pos) as u16,
                    inner.y + lines.len() as u16,
                ));
            }
            let mut label_span = Span::from(label);
            if focused {
                label_span = label_span.bold().yellow();
            }
            lines.push(Line::from(vec![label_span, Span::from(value)]));
            if let Some(error) = &field.error {
                lines.push(Line::from(format!("{}{error}", " ".repeat(label_width + 2))).red());
            }
        }

        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(lines).block(block), area);
        if let Some((x, y)) = cursor
            && !form.submitting
        {
            frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), y));
        }
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let text = Text::from(message);
        let area = centered(frame.area(), 80, text.height() as u16 + 2);
        let block = Block::bordered()
            .title(" Help ".bold())
            .title_bottom(Line::from(" Esc close ").dim());
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), area);
    }
}

fn row_style(row: &PageRow) -> Style {
    let mut style = Style::new();
    if row.current {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if row.pending {
        style = style.add_modifier(Modifier::DIM | Modifier::ITALIC);
    }
    style
}

fn checkbox(selected: bool) -> &'static str {
    if selected { "[x] " } else { "[ ] " }
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Neutral => Style::new().fg(Color::Gray),
        Tone::Info => Style::new().fg(Color::Cyan),
        Tone::Success => Style::new().fg(Color::Green),
        Tone::Warning => Style::new().fg(Color::Yellow),
        Tone::Danger => Style::new().fg(Color::Red),
    }
}

fn cell_tone(value: &CellValue) -> Option<Tone> {
    match value {
        CellValue::Badge { tone, .. } => Some(*tone),
        CellValue::Composite(parts) => parts.iter().find_map(cell_tone),
        CellValue::Empty | CellValue::Text(_) => None,
    }
}

fn cell_span(value: &CellValue, width: usize) -> Span<'static> {
    let text = pad(&value.plain(), width);
    match cell_tone(value) {
        Some(tone) => Span::styled(text, tone_style(tone)),
        None => Span::from(text),
    }
}

/// Cut or pad `s` to exactly `width` characters.
fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        if width == 0 {
            return String::new();
        }
        let mut out: String = s.chars().take(width.saturating_sub(2)).collect();
        out.push('…');
        out.push(' ');
        out.chars().take(width).collect()
    } else {
        format!("{s}{}", " ".repeat(width - len))
    }
}

fn centered(area: Rect, width_percent: u16, height: u16) -> Rect {
    let width = ((area.width as u32 * width_percent as u32) / 100) as u16;
    let width = width.max(40).min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::domain::Message;
    use crate::record::Record;
    use crate::repository::MemoryRepository;
    use crate::resource::Resource;

    #[test]
    fn overlays_hide_the_rows_from_clicks() {
        let repo = Arc::new(MemoryRepository::with_records(
            Resource::Members,
            vec![
                Record::new("m1").with("name", "Priscilla"),
                Record::new("m2").with("name", "Apollos"),
            ],
        ));
        let config = AdminConfig::default();
        let mut model = Model::init(&config, repo, Resource::Members, 120, 40).unwrap();
        assert!(model.wait_for_jobs(Duration::from_secs(5)));
        let mut ui = TableUI::new(&config);
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        terminal.draw(|f| ui.draw(&model, f)).unwrap();
        assert_eq!(ui.hit_map().len(), 2);

        model.update(Some(Message::OpenRecord("m1".into()))).unwrap();
        assert_eq!(model.modus(), Modus::Detail);
        terminal.draw(|f| ui.draw(&model, f)).unwrap();
        assert!(ui.hit_map().is_empty());
    }

    #[test]
    fn pad_cuts_long_values() {
        assert_eq!(pad("abc", 5), "abc  ");
        assert_eq!(pad("abcdefgh", 5), "abc… ");
        assert_eq!(pad("abc", 0), "");
        assert_eq!(pad("abcdefgh", 5).chars().count(), 5);
    }

    #[test]
    fn centered_stays_inside() {
        let area = Rect::new(0, 0, 30, 10);
        let inner = centered(area, 80, 50);
        assert!(area.contains(inner.as_position()));
        assert_eq!(inner.width, 30);
        assert_eq!(inner.height, 10);
    }
}
