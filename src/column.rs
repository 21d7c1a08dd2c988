use derive_setters::Setters;

use crate::record::{Record, display_value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

/// Something a column produces for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Badge { label: String, tone: Tone },
    Composite(Vec<CellValue>),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    /// Flattened text, used for sorting, copying and plain output.
    pub fn plain(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Badge { label, .. } => label.clone(),
            CellValue::Composite(parts) => parts
                .iter()
                .map(|p| p.plain())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Composite(parts) => parts.iter().all(|p| p.is_empty()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Accessor {
    Field(&'static str),
    Computed(fn(&Record) -> CellValue),
}

#[derive(Debug, Clone, Setters)]
pub struct ColumnDescriptor {
    #[setters(skip)]
    pub header: String,
    #[setters(skip)]
    pub accessor: Accessor,
    #[setters(strip_option, into)]
    pub class_name: Option<String>,
    /// Preferred width in characters, derived from the data when unset.
    #[setters(strip_option)]
    pub width: Option<usize>,
}

impl ColumnDescriptor {
    pub fn field(header: &str, name: &'static str) -> Self {
        ColumnDescriptor {
            header: header.to_string(),
            accessor: Accessor::Field(name),
            class_name: None,
            width: None,
        }
    }

    pub fn computed(header: &str, f: fn(&Record) -> CellValue) -> Self {
        ColumnDescriptor {
            header: header.to_string(),
            accessor: Accessor::Computed(f),
            class_name: None,
            width: None,
        }
    }

    /// Produce the renderable value of this column for `record`.
    ///
    /// A missing field renders as [`CellValue::Empty`].
    pub fn render(&self, record: &Record) -> CellValue {
        match self.accessor {
            Accessor::Field("id") => CellValue::text(record.id.clone()),
            Accessor::Field(name) => record
                .get(name)
                .map(|v| CellValue::text(display_value(v)))
                .unwrap_or(CellValue::Empty),
            Accessor::Computed(f) => f(record),
        }
    }

    /// Field this column reads, if it reads one directly.
    pub fn field_name(&self) -> Option<&'static str> {
        match self.accessor {
            Accessor::Field(name) => Some(name),
            Accessor::Computed(_) => None,
        }
    }
}

pub fn status_tone(status: &str) -> Tone {
    match status.to_ascii_lowercase().as_str() {
        "published" | "paid" | "completed" | "confirmed" | "replied" | "prayed" | "active"
        | "available" => Tone::Success,
        "draft" | "pending" | "new" | "sent" | "upcoming" => Tone::Warning,
        "cancelled" | "inactive" | "out_of_stock" | "overdue" | "unpublished" => Tone::Danger,
        "" => Tone::Neutral,
        _ => Tone::Info,
    }
}

pub fn status_badge(record: &Record) -> CellValue {
    let status = record.status();
    if status.is_empty() {
        return CellValue::Empty;
    }
    CellValue::Badge {
        tone: status_tone(&status),
        label: status,
    }
}

pub fn money(record: &Record, field: &str) -> CellValue {
    match record.get(field).and_then(|v| v.as_f64().or_else(|| v.as_str()?.parse().ok())) {
        Some(amount) => CellValue::text(format!("{amount:.2}")),
        None => CellValue::text(record.text(field)),
    }
}
