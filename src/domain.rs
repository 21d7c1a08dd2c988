use std::io;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tabular data error: {0}")]
    Polars(#[from] PolarsError),
    #[error("request failed: {0}")]
    Http(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("a request for '{0}' is already in progress")]
    InFlight(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("unknown file type")]
    UnknownFileType,
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("could not start the job threads: {0}")]
    JobPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<toml::de::Error> for AdminError {
    fn from(err: toml::de::Error) -> Self {
        AdminError::Config(err.to_string())
    }
}

impl From<ureq::Error> for AdminError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => AdminError::Api {
                status,
                message: format!("server responded with status {status}"),
            },
            other => AdminError::Http(other.to_string()),
        }
    }
}

impl AdminError {
    /// Message shown to the user in a toast.
    pub fn user_message(&self) -> String {
        match self {
            AdminError::Api { message, .. } if !message.is_empty() => message.clone(),
            AdminError::Http(_) => "Could not reach the server, please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    FilterDate,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Search => "/",
            CMDMode::FilterDate => "date: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
    Help,
    Enter,
    Exit,
    Search,
    FilterDate,
    CycleStatusFilter,
    CycleCategoryFilter,
    CycleLocationFilter,
    ClearFilters,
    ToggleSelectCurrent,
    SelectAll,
    ChooseBulkAction,
    ApplyBulk,
    SortAscending,
    SortDescending,
    NextResource,
    PrevResource,
    NewRecord,
    EditRecord,
    CompleteRecord,
    DeleteRecord,
    CopyCell,
    CopyRow,
    Reload,
    RawKey(KeyEvent),
    ToggleSelect(String),
    OpenRecord(String),
    RowAction(String),
}

pub const HELP_TEXT: &str = "\
 Navigation
   j / k, arrows     move cursor          h / l        select column
   PgUp / PgDn       previous/next page   g / G        first / last row
   Tab / BackTab     next/previous resource
 Records
   Enter             open record          n            new record
   e                 edit record          c            mark as completed
   d                 delete record        y / Y        copy cell / row
   r                 reload
 Filters
   /                 search               D            date filter
   s / t / o         cycle status / type / location filter
   x                 clear filters        + / -        sort column
 Selection
   Space             toggle row           a            select all
   b                 choose bulk action   A            apply bulk action
 General
   ?                 help                 Esc          close
   q                 quit
";
