use arboard::Clipboard;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::bulk::BulkDispatcher;
use crate::column::ColumnDescriptor;
use crate::config::AdminConfig;
use crate::detail::DetailView;
use crate::domain::{AdminError, CMDMode, HELP_TEXT, Message};
use crate::filter::{
    DateFilter, FilterState, apply_filters, cycle_option, distinct_values, page_count, paginate,
    sort_rows, total,
};
use crate::form::{FormEvent, FormMode, RecordForm};
use crate::inputter::{InputResult, Inputter};
use crate::jobs::{Job, JobOutcome, JobResult, JobRunner};
use crate::layout::{CardComponent, ColumnCard, ListLayout, card_for};
use crate::record::Record;
use crate::repository::Repository;
use crate::resource::Resource;
use crate::selection::Selection;
use crate::toast::{Toast, ToastLevel};
use crate::ui::{CARD_BORDER_HEIGHT, CMDLINE_HEIGH, TABLE_HEADER_HEIGHT, TOP_BAR_HEIGHT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Ready,
    Loading,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    List,
    Detail,
    Form,
    Popup,
    CmdInput,
    Confirm,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub list_layout: Option<ListLayout>,
    /// Rows or cards that fit on one page.
    pub per_page: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize, breakpoint: usize, card_height: usize) -> Self {
        let list_layout = ListLayout::choose(ui_width, breakpoint);
        let list_height = ui_height.saturating_sub(TOP_BAR_HEIGHT + CMDLINE_HEIGH);
        let per_page = match list_layout {
            ListLayout::Table => list_height.saturating_sub(TABLE_HEADER_HEIGHT),
            ListLayout::Cards => list_height / (card_height + CARD_BORDER_HEIGHT).max(1),
        };
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            list_layout: Some(list_layout),
            per_page: per_page.max(1),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }

    pub fn list_layout(&self) -> ListLayout {
        self.list_layout.unwrap_or(ListLayout::Table)
    }
}

/// One record of the visible page.
pub struct PageRow<'a> {
    pub record: &'a Record,
    pub selected: bool,
    /// A mutation for this record is running.
    pub pending: bool,
    pub current: bool,
}

/// Everything the renderer needs for one frame.
pub struct UIData<'a> {
    pub resource: Resource,
    pub modus: Modus,
    pub layout: &'a UILayout,
    pub columns: &'a [ColumnDescriptor],
    pub card: &'a dyn CardComponent,
    pub rows: Vec<PageRow<'a>>,
    pub selected_column: usize,
    pub nrows: usize,
    pub total_records: usize,
    pub page: usize,
    pub pages: usize,
    pub loading: bool,
    pub filter: String,
    pub sort: Option<(&'a str, bool)>,
    pub amount_total: Option<f64>,
    pub selected_count: usize,
    pub bulk_action: Option<String>,
    pub bulk_running: bool,
    pub detail: Option<&'a DetailView>,
    pub form: Option<&'a RecordForm>,
    pub popup_message: Option<&'a str>,
    pub confirm_message: Option<String>,
    pub cmd_mode: Option<CMDMode>,
    pub cmdinput: &'a InputResult,
    pub toast: Option<&'a Toast>,
}

pub struct Model {
    config: AdminConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    resource: Resource,
    columns: Vec<ColumnDescriptor>,
    card: Box<dyn CardComponent>,
    records: Vec<Record>,
    rows: Arc<Vec<usize>>, // Mapping of list row index to index in records
    curser_row: usize,     // Index into rows
    curser_column: usize,
    sort: Option<(usize, bool)>,
    filter: FilterState,
    selection: Selection,
    dispatcher: BulkDispatcher,
    detail: Option<DetailView>,
    form: Option<RecordForm>,
    confirm_delete: Option<String>,
    popup_message: String,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    jobs: JobRunner,
    generation: u64,
    toast: Option<Toast>,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
}

impl Model {
    pub fn init(
        config: &AdminConfig,
        repo: Arc<dyn Repository>,
        resource: Resource,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, AdminError> {
        info!("Starting with {} on {}", resource, repo.describe());
        let columns = resource.schema().columns();
        let card = Self::card(resource, &columns);
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::List,
            previous_modus: Modus::List,
            resource,
            uilayout: UILayout::from_values(
                ui_width,
                ui_height,
                config.card_breakpoint,
                card.body_height(),
            ),
            columns,
            card,
            records: Vec::new(),
            rows: Arc::new(Vec::new()),
            curser_row: 0,
            curser_column: 0,
            sort: None,
            filter: FilterState::default(),
            selection: Selection::default(),
            dispatcher: BulkDispatcher::default(),
            detail: None,
            form: None,
            confirm_delete: None,
            popup_message: String::new(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            jobs: JobRunner::new(repo)?,
            generation: 0,
            toast: None,
            clipboard: None,
        };
        model.load()?;
        Ok(model)
    }

    fn card(resource: Resource, columns: &[ColumnDescriptor]) -> Box<dyn CardComponent> {
        card_for(resource).unwrap_or_else(|| Box::new(ColumnCard::new(columns.to_vec())))
    }

    // -------------------- Accessors ---------------------- //

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn dispatcher(&self) -> &BulkDispatcher {
        &self.dispatcher
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn form(&self) -> Option<&RecordForm> {
        self.form.as_ref()
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    pub fn layout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.running()
    }

    /// Ids of the filtered records, in display order.
    pub fn visible_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|&idx| self.records[idx].id.as_str()).collect()
    }

    pub fn current_record(&self) -> Option<&Record> {
        self.rows.get(self.curser_row).map(|&idx| &self.records[idx])
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::CmdInput | Modus::Form | Modus::Confirm)
    }

    pub fn get_uidata(&self) -> UIData<'_> {
        let per_page = self.uilayout.per_page;
        let page = self.curser_row / per_page.max(1);
        let range = paginate(self.rows.len(), page, per_page);
        let rows = self.rows[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, &idx)| {
                let record = &self.records[idx];
                PageRow {
                    record,
                    selected: self.selection.is_selected(&record.id),
                    pending: self.jobs.is_pending(self.resource, &record.id),
                    current: range.start + offset == self.curser_row,
                }
            })
            .collect();
        let schema = self.resource.schema();
        let toast_lifetime = Duration::from_secs(self.config.toast_seconds);

        UIData {
            resource: self.resource,
            modus: self.modus,
            layout: &self.uilayout,
            columns: &self.columns,
            card: self.card.as_ref(),
            rows,
            selected_column: self.curser_column,
            nrows: self.rows.len(),
            total_records: self.records.len(),
            page,
            pages: page_count(self.rows.len(), per_page),
            loading: self.status == Status::Loading,
            filter: self.filter.describe(),
            sort: self
                .sort
                .map(|(column, ascending)| (self.columns[column].header.as_str(), ascending)),
            amount_total: schema
                .amount_field
                .map(|field| total(&self.records, &self.rows, field)),
            selected_count: self.selection.len(),
            bulk_action: self.dispatcher.chosen().map(|a| a.label(schema)),
            bulk_running: self.dispatcher.is_executing(),
            detail: self.detail.as_ref(),
            form: self.form.as_ref(),
            popup_message: (self.modus == Modus::Popup).then_some(self.popup_message.as_str()),
            confirm_message: self.confirm_delete.as_ref().map(|id| {
                format!("Delete {} {id}? (y/n)", schema.title.to_lowercase())
            }),
            cmd_mode: self.cmd_mode,
            cmdinput: &self.last_input,
            toast: self.toast.as_ref().filter(|t| t.is_visible(toast_lifetime)),
        }
    }

    // -------------------- Jobs ---------------------- //

    fn load(&mut self) -> Result<(), AdminError> {
        self.status = Status::Loading;
        self.jobs.submit(self.generation, Job::Load(self.resource))
    }

    fn submit(&mut self, job: Job) -> bool {
        match self.jobs.submit(self.generation, job) {
            Ok(()) => true,
            Err(e) => {
                self.notify(ToastLevel::Warning, e.user_message());
                false
            }
        }
    }

    /// Apply finished background jobs. Called once per frame.
    pub fn poll_jobs(&mut self) {
        while let Some(result) = self.jobs.try_next() {
            self.apply_job_result(result);
        }
    }

    /// Block until all running jobs finished or `timeout` passed.
    pub fn wait_for_jobs(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.jobs.running() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(result) = self.jobs.wait_next(remaining) {
                self.apply_job_result(result);
            }
        }
        self.jobs.running() == 0
    }

    /// Give pending mutations a bounded time to land before exiting.
    pub fn shutdown(&mut self, timeout: Duration) {
        if self.jobs.running() == 0 {
            return;
        }
        info!("Waiting for {} pending jobs ...", self.jobs.running());
        if !self.wait_for_jobs(timeout) {
            warn!(
                "Exiting with {} jobs still running after {}ms",
                self.jobs.running(),
                timeout.as_millis()
            );
        }
    }

    fn apply_job_result(&mut self, result: JobResult) {
        if result.generation != self.generation {
            debug!(
                "Ignoring result of generation {} (current {})",
                result.generation, self.generation
            );
            return;
        }

        match result.outcome {
            JobOutcome::Loaded(resource, Ok(records)) if resource == self.resource => {
                info!("Loaded {} {}", records.len(), resource.key());
                self.status = Status::Ready;
                self.records = records;
                self.refresh_rows();
                self.set_status_message(format!("Loaded {} {}", self.records.len(), self.resource));
            }
            JobOutcome::Loaded(_, Ok(_)) => {}
            JobOutcome::Loaded(_, Err(e)) => {
                self.status = Status::Ready;
                self.notify(ToastLevel::Error, e.user_message());
            }
            JobOutcome::Saved { created, result } => {
                if let Some(form) = self.form.as_mut() {
                    form.submitting = false;
                }
                match result {
                    Ok(record) => {
                        let message = format!(
                            "{} {}",
                            if created { "Created" } else { "Saved" },
                            record.id
                        );
                        self.upsert(record);
                        if self.modus == Modus::Form {
                            self.close_form();
                        }
                        self.notify(ToastLevel::Success, message);
                    }
                    Err(e) => self.notify(ToastLevel::Error, e.user_message()),
                }
            }
            JobOutcome::StatusChanged { label, result } => match result {
                Ok(record) => {
                    self.upsert(record);
                    self.notify(ToastLevel::Success, past_tense(&label));
                }
                Err(e) => self.fail_record_action(e),
            },
            JobOutcome::Deleted { id, result } => match result {
                Ok(()) => {
                    self.records.retain(|r| r.id != id);
                    if self.detail.as_ref().is_some_and(|d| d.record.id == id) {
                        self.close_detail();
                    }
                    self.refresh_rows();
                    self.notify(ToastLevel::Success, format!("Deleted {id}"));
                }
                Err(e) => self.fail_record_action(e),
            },
            JobOutcome::Bulk(report) => {
                report.apply_to(&mut self.records);
                self.dispatcher.finish(&mut self.selection);
                self.refresh_rows();
                let level = if report.is_success() {
                    ToastLevel::Success
                } else {
                    ToastLevel::Warning
                };
                self.notify(level, report.summary());
            }
        }
    }

    fn fail_record_action(&mut self, e: AdminError) {
        if let AdminError::NotFound { id, .. } = &e {
            let id = id.clone();
            self.records.retain(|r| r.id != id);
            if self.detail.is_some() {
                self.close_detail();
            }
            self.refresh_rows();
        }
        self.notify(ToastLevel::Error, e.user_message());
    }

    fn upsert(&mut self, record: Record) {
        if let Some(detail) = self.detail.as_mut()
            && detail.record.id == record.id
        {
            detail.refresh(record.clone());
        }
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        self.refresh_rows();
    }

    // -------------------- List state ---------------------- //

    /// Recompute the visible rows after records, filter or sort changed.
    fn refresh_rows(&mut self) {
        let start_time = Instant::now();
        let schema = self.resource.schema();
        let mut rows = apply_filters(&self.records, schema, &self.filter);
        if let Some((column, ascending)) = self.sort {
            sort_rows(&self.records, &mut rows, &self.columns[column], ascending);
        }
        self.rows = Arc::new(rows);

        let visible = self.rows.iter().map(|&idx| self.records[idx].id.as_str());
        self.selection.prune(visible);
        if self.selection.is_empty() {
            self.dispatcher.cancel();
        }
        self.curser_row = self.curser_row.min(self.rows.len().saturating_sub(1));
        trace!(
            "Refreshed {} of {} rows in {}us",
            self.rows.len(),
            self.records.len(),
            start_time.elapsed().as_micros()
        );
    }

    fn switch_resource(&mut self, resource: Resource) {
        debug!("Switching from {} to {}", self.resource, resource);
        self.generation += 1;
        self.resource = resource;
        self.columns = resource.schema().columns();
        self.card = Self::card(resource, &self.columns);
        self.records.clear();
        self.rows = Arc::new(Vec::new());
        self.curser_row = 0;
        self.curser_column = 0;
        self.sort = None;
        self.filter.clear();
        self.selection.clear();
        self.dispatcher.reset();
        self.ui_resize(self.uilayout.width, self.uilayout.height);
        if let Err(e) = self.load() {
            self.notify(ToastLevel::Error, e.user_message());
        }
    }

    fn reload(&mut self) {
        self.generation += 1;
        self.dispatcher.reset();
        if let Err(e) = self.load() {
            self.notify(ToastLevel::Error, e.user_message());
        } else {
            self.set_status_message(format!("Reloading {} ...", self.resource));
        }
    }

    fn notify(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast::new(level, message));
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.notify(ToastLevel::Info, message);
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(
            width,
            height,
            self.config.card_breakpoint,
            self.card.body_height(),
        );
    }

    // -------------------- Message handling ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), AdminError> {
        self.poll_jobs();

        if let Some(msg) = message {
            match self.modus {
                Modus::List => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveLeft => self.move_column(false),
                    Message::MoveRight => self.move_column(true),
                    Message::MovePageUp => self.move_selection_up(self.uilayout.per_page),
                    Message::MovePageDown => self.move_selection_down(self.uilayout.per_page),
                    Message::MoveBeginning => self.curser_row = 0,
                    Message::MoveEnd => self.curser_row = self.rows.len().saturating_sub(1),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_help(),
                    Message::Enter => self.open_current(),
                    Message::Exit => self.exit(),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::FilterDate => self.enter_cmd_mode(CMDMode::FilterDate),
                    Message::CycleStatusFilter => self.cycle_filter(FilterKind::Status),
                    Message::CycleCategoryFilter => self.cycle_filter(FilterKind::Category),
                    Message::CycleLocationFilter => self.cycle_filter(FilterKind::Location),
                    Message::ClearFilters => {
                        self.filter.clear();
                        self.refresh_rows();
                    }
                    Message::ToggleSelectCurrent => {
                        if let Some(id) = self.current_record().map(|r| r.id.clone()) {
                            self.toggle_select(&id);
                        }
                    }
                    Message::SelectAll => self.toggle_select_all(),
                    Message::ChooseBulkAction => self.choose_bulk_action(),
                    Message::ApplyBulk => self.apply_bulk(),
                    Message::SortAscending => self.sort_current_column(true),
                    Message::SortDescending => self.sort_current_column(false),
                    Message::NextResource => self.switch_resource(self.resource.next()),
                    Message::PrevResource => self.switch_resource(self.resource.previous()),
                    Message::NewRecord => self.open_form(None),
                    Message::EditRecord => {
                        let record = self.current_record().cloned();
                        if record.is_some() {
                            self.open_form(record);
                        }
                    }
                    Message::CompleteRecord => {
                        if let Some(record) = self.current_record().cloned() {
                            self.complete(&record);
                        }
                    }
                    Message::DeleteRecord => {
                        if let Some(id) = self.current_record().map(|r| r.id.clone()) {
                            self.ask_delete(id);
                        }
                    }
                    Message::CopyCell => self.copy_list_cell(),
                    Message::CopyRow => self.copy_list_row(),
                    Message::Reload => self.reload(),
                    Message::ToggleSelect(id) => self.toggle_select(&id),
                    Message::OpenRecord(id) => {
                        self.move_to(&id);
                        self.open_current();
                    }
                    Message::RowAction(id) => {
                        self.move_to(&id);
                        let record = self.current_record().cloned();
                        if record.is_some() {
                            self.open_form(record);
                        }
                    }
                    Message::RawKey(_) => (),
                },
                Modus::Detail => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.with_detail(|d| d.move_down(1)),
                    Message::MoveUp => self.with_detail(|d| d.move_up(1)),
                    Message::MovePageDown => self.with_detail(|d| d.move_down(10)),
                    Message::MovePageUp => self.with_detail(|d| d.move_up(10)),
                    Message::MoveLeft => self.step_record(false),
                    Message::MoveRight => self.step_record(true),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::CopyCell | Message::CopyRow => self.copy_detail_value(),
                    Message::CompleteRecord => {
                        if let Some(record) = self.detail.as_ref().map(|d| d.record.clone()) {
                            self.complete(&record);
                        }
                    }
                    Message::EditRecord => {
                        let record = self.detail.as_ref().map(|d| d.record.clone());
                        self.open_form(record);
                    }
                    Message::DeleteRecord => {
                        if let Some(id) = self.detail.as_ref().map(|d| d.record.id.clone()) {
                            self.ask_delete(id);
                        }
                    }
                    Message::Help => self.show_help(),
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::Popup => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::Form => match msg {
                    Message::RawKey(key) => self.form_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CmdInput => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::Confirm => match msg {
                    Message::RawKey(key) => self.confirm_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::List => {
                // Nothing to leave, drop a pending bulk choice or the selection instead
                if self.dispatcher.chosen().is_some() && !self.dispatcher.is_executing() {
                    self.dispatcher.cancel();
                } else if !self.dispatcher.is_executing() {
                    self.selection.clear();
                }
            }
            Modus::Detail => self.close_detail(),
            Modus::Popup => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::Popup;
            }
            Modus::Form => self.close_form(),
            Modus::CmdInput | Modus::Confirm => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.input.clear();
        match mode {
            CMDMode::Search => self.input.set(&self.filter.search),
            CMDMode::FilterDate => {
                if let Some(date) = self.filter.date {
                    self.input.set(&date.to_string());
                }
            }
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;
        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            return;
        }

        let cmd_input = self.last_input.input.trim().to_string();
        match mode {
            Some(CMDMode::Search) => {
                self.filter.search = cmd_input;
                self.refresh_rows();
            }
            Some(CMDMode::FilterDate) if cmd_input.is_empty() => {
                self.filter.date = None;
                self.refresh_rows();
            }
            Some(CMDMode::FilterDate) => match cmd_input.parse::<DateFilter>() {
                Ok(date) => {
                    if self.resource.schema().date_field.is_none() {
                        self.notify(
                            ToastLevel::Warning,
                            format!("{} cannot be filtered by date", self.resource),
                        );
                        return;
                    }
                    self.filter.date = Some(date);
                    self.refresh_rows();
                }
                Err(e) => self.notify(ToastLevel::Warning, e.user_message()),
            },
            None => info!("Cmd mode is none!"),
        }
    }

    fn cycle_filter(&mut self, kind: FilterKind) {
        let schema = self.resource.schema();
        let (field, current) = match kind {
            FilterKind::Status => (schema.status_field, &mut self.filter.status),
            FilterKind::Category => (schema.category_field, &mut self.filter.category),
            FilterKind::Location => (schema.location_field, &mut self.filter.location),
        };
        let Some(field) = field else {
            let message = format!("{} has no {} filter", schema.title, kind.name());
            self.notify(ToastLevel::Info, message);
            return;
        };
        let all: Vec<usize> = (0..self.records.len()).collect();
        let options = distinct_values(&self.records, &all, field);
        *current = cycle_option(current.as_deref(), &options);
        self.refresh_rows();
    }

    fn toggle_select(&mut self, id: &str) {
        if self.dispatcher.is_executing() {
            return;
        }
        self.selection.toggle(id);
        if self.selection.is_empty() {
            self.dispatcher.cancel();
        }
    }

    fn toggle_select_all(&mut self) {
        if self.dispatcher.is_executing() {
            return;
        }
        let all_selected = !self.rows.is_empty() && self.selection.len() == self.rows.len();
        let visible = self.rows.iter().map(|&idx| self.records[idx].id.as_str());
        self.selection.select_all(visible, !all_selected);
        if self.selection.is_empty() {
            self.dispatcher.cancel();
        }
    }

    fn choose_bulk_action(&mut self) {
        let schema = self.resource.schema();
        match self.dispatcher.cycle(schema, &self.selection) {
            Ok(action) => trace!("Chose bulk action {action}"),
            Err(e) => self.notify(ToastLevel::Warning, e.user_message()),
        }
    }

    fn apply_bulk(&mut self) {
        let (action, ids) = match self.dispatcher.begin(&self.selection) {
            Ok(work) => work,
            Err(e) => {
                self.notify(ToastLevel::Warning, e.user_message());
                return;
            }
        };
        let job = Job::Bulk {
            resource: self.resource,
            action,
            ids,
            export_dir: self.config.export_dir.clone(),
        };
        if !self.submit(job) {
            self.dispatcher.reset();
        }
    }

    fn sort_current_column(&mut self, ascending: bool) {
        if self.columns.is_empty() {
            return;
        }
        let current_id = self.current_record().map(|r| r.id.clone());
        self.sort = Some((self.curser_column, ascending));
        self.refresh_rows();
        if let Some(id) = current_id {
            self.move_to(&id);
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
    }

    fn move_selection_down(&mut self, size: usize) {
        self.curser_row = (self.curser_row + size).min(self.rows.len().saturating_sub(1));
    }

    fn move_column(&mut self, right: bool) {
        let last = self.columns.len().saturating_sub(1);
        self.curser_column = if right {
            (self.curser_column + 1).min(last)
        } else {
            self.curser_column.saturating_sub(1)
        };
    }

    fn move_to(&mut self, id: &str) {
        if let Some(pos) = self.rows.iter().position(|&idx| self.records[idx].id == id) {
            self.curser_row = pos;
        }
    }

    fn open_current(&mut self) {
        let Some(record) = self.current_record().cloned() else {
            return;
        };
        trace!("Open record {}", record.id);
        self.detail = Some(DetailView::new(self.resource, record));
        self.previous_modus = Modus::List;
        self.modus = Modus::Detail;
    }

    fn close_detail(&mut self) {
        self.detail = None;
        self.previous_modus = Modus::Detail;
        self.modus = Modus::List;
    }

    fn with_detail(&mut self, f: impl FnOnce(&mut DetailView)) {
        if let Some(detail) = self.detail.as_mut() {
            f(detail);
        }
    }

    fn step_record(&mut self, forward: bool) {
        if forward {
            self.move_selection_down(1);
        } else {
            self.move_selection_up(1);
        }
        if let Some(record) = self.current_record().cloned() {
            self.detail = Some(DetailView::new(self.resource, record));
        }
    }

    fn open_form(&mut self, record: Option<Record>) {
        let form = match record {
            Some(record) => RecordForm::edit(self.resource, record),
            None => RecordForm::create(self.resource),
        };
        trace!("Open form {}", form.title());
        self.form = Some(form);
        self.previous_modus = self.modus;
        self.modus = Modus::Form;
    }

    fn close_form(&mut self) {
        self.form = None;
        self.modus = if self.detail.is_some() {
            Modus::Detail
        } else {
            Modus::List
        };
        self.previous_modus = Modus::Form;
    }

    fn form_input(&mut self, key: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        if form.submitting {
            trace!("Form is submitting, ignoring {key:?}");
            return;
        }
        match form.handle_key(key) {
            FormEvent::None => {}
            FormEvent::Cancel => self.close_form(),
            FormEvent::Submit => self.submit_form(),
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let record = match form.to_record() {
            Ok(record) => record,
            Err(e) => {
                self.notify(ToastLevel::Warning, e.user_message());
                return;
            }
        };
        let create = form.mode == FormMode::Create;
        form.submitting = true;
        let job = Job::Save {
            resource: self.resource,
            record,
            create,
        };
        if !self.submit(job)
            && let Some(form) = self.form.as_mut()
        {
            form.submitting = false;
        }
    }

    fn complete(&mut self, record: &Record) {
        let schema = self.resource.schema();
        let (Some(completion), Some(field)) = (schema.completion, schema.status_field) else {
            let message = format!("{} have no completion step", schema.title);
            self.notify(ToastLevel::Info, message);
            return;
        };
        if record.text(field).eq_ignore_ascii_case(completion.value) {
            self.notify(ToastLevel::Info, format!("{} is already {}", record.id, completion.value));
            return;
        }
        self.submit(Job::SetStatus {
            resource: self.resource,
            id: record.id.clone(),
            status: completion.value.to_string(),
            label: completion.label.to_string(),
        });
    }

    fn ask_delete(&mut self, id: String) {
        self.confirm_delete = Some(id);
        self.previous_modus = self.modus;
        self.modus = Modus::Confirm;
    }

    fn confirm_input(&mut self, key: KeyEvent) {
        let confirmed = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => true,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => false,
            _ => return,
        };
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Confirm;
        let Some(id) = self.confirm_delete.take() else {
            return;
        };
        if confirmed {
            self.submit(Job::Delete {
                resource: self.resource,
                id,
            });
        }
    }

    // -------------------- Clipboard ---------------------- //

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    self.notify(ToastLevel::Warning, format!("Clipboard unavailable: {e}"));
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => trace!("Copied content to clipboard."),
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_list_cell(&mut self) {
        let Some(record) = self.current_record() else {
            return;
        };
        let Some(column) = self.columns.get(self.curser_column) else {
            return;
        };
        let cell = column.render(record).plain();
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell);
    }

    fn copy_list_row(&mut self) {
        let Some(record) = self.current_record() else {
            return;
        };
        let row_content = self
            .columns
            .iter()
            .map(|c| wrap_cell_content(&c.render(record).plain()))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(row_content);
    }

    fn copy_detail_value(&mut self) {
        if let Some(value) = self.detail.as_ref().and_then(|d| d.current_value()) {
            let value = value.to_string();
            self.copy_to_clipboard(value);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FilterKind {
    Status,
    Category,
    Location,
}

impl FilterKind {
    fn name(&self) -> &'static str {
        match self {
            FilterKind::Status => "status",
            FilterKind::Category => "type",
            FilterKind::Location => "location",
        }
    }
}

/// Quote a cell for a comma separated row.
pub fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

/// "Mark as Replied" -> "Marked as Replied".
fn past_tense(label: &str) -> String {
    match label.strip_prefix("Mark ") {
        Some(rest) => format!("Marked {rest}"),
        None => label.to_string(),
    }
}
