use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;

use crate::domain::AdminError;
use crate::filter::parse_day;
use crate::inputter::Inputter;
use crate::record::Record;
use crate::resource::{FieldKind, FormField, Resource};

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create,
    Edit(String),
}

#[derive(Debug, Clone)]
pub struct FieldInput {
    pub spec: FormField,
    pub input: Inputter,
    pub error: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum FormEvent {
    None,
    Submit,
    Cancel,
}

/// Create or edit form for one record of a resource.
#[derive(Debug, Clone)]
pub struct RecordForm {
    pub resource: Resource,
    pub mode: FormMode,
    pub fields: Vec<FieldInput>,
    pub focus: usize,
    pub submitting: bool,
    base: Record,
}

impl RecordForm {
    pub fn create(resource: Resource) -> Self {
        let fields = resource
            .schema()
            .form
            .iter()
            .map(|spec| {
                let mut input = Inputter::default();
                if let FieldKind::Choice(options) = spec.kind {
                    input.set(options[0]);
                }
                FieldInput {
                    spec: *spec,
                    input,
                    error: None,
                }
            })
            .collect();
        RecordForm {
            resource,
            mode: FormMode::Create,
            fields,
            focus: 0,
            submitting: false,
            base: Record::new(""),
        }
    }

    /// Edit form pre-populated with every value the record holds.
    pub fn edit(resource: Resource, record: Record) -> Self {
        let mut form = RecordForm::create(resource);
        for field in form.fields.iter_mut() {
            field.input.set(&record.text(field.spec.name));
        }
        form.mode = FormMode::Edit(record.id.clone());
        form.base = record;
        form
    }

    pub fn title(&self) -> String {
        let schema = self.resource.schema();
        match &self.mode {
            FormMode::Create => format!("New {}", singular(schema.title)),
            FormMode::Edit(id) => format!("Edit {} {id}", singular(schema.title)),
        }
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.spec.name == name)
            .map(|f| f.input.value())
    }

    pub fn set_value(&mut self, name: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.spec.name == name) {
            field.input.set(value);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => return FormEvent::Cancel,
            (KeyCode::Enter, _) => return FormEvent::Submit,
            (KeyCode::Char('s'), KeyModifiers::CONTROL) => return FormEvent::Submit,
            (KeyCode::Tab, _) | (KeyCode::Down, _) => self.focus_next(),
            (KeyCode::BackTab, _) | (KeyCode::Up, _) => self.focus_previous(),
            (KeyCode::Left, _) | (KeyCode::Right, _) if self.focused_choice().is_some() => {
                self.cycle_choice(key.code == KeyCode::Right)
            }
            _ => {
                if let Some(field) = self.fields.get_mut(self.focus) {
                    field.input.read(key);
                    field.error = None;
                }
            }
        }
        FormEvent::None
    }

    fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    fn focus_previous(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    fn focused_choice(&self) -> Option<&'static [&'static str]> {
        match self.fields.get(self.focus)?.spec.kind {
            FieldKind::Choice(options) => Some(options),
            _ => None,
        }
    }

    fn cycle_choice(&mut self, forward: bool) {
        let Some(options) = self.focused_choice() else {
            return;
        };
        let field = &mut self.fields[self.focus];
        let pos = options
            .iter()
            .position(|o| o.eq_ignore_ascii_case(field.input.value()));
        let next = match (pos, forward) {
            (Some(p), true) => (p + 1) % options.len(),
            (Some(p), false) => (p + options.len() - 1) % options.len(),
            (None, _) => 0,
        };
        field.input.set(options[next]);
        field.error = None;
    }

    /// Check every field and keep the messages next to the offending ones.
    pub fn validate(&mut self) -> Result<(), AdminError> {
        let mut problems = Vec::new();
        for field in self.fields.iter_mut() {
            field.error = check_field(&field.spec, field.input.value().trim());
            if let Some(e) = &field.error {
                problems.push(e.clone());
            }
        }
        if let Some(first) = self.fields.iter().position(|f| f.error.is_some()) {
            self.focus = first;
        }
        match problems.len() {
            0 => Ok(()),
            1 => Err(AdminError::Validation(problems.remove(0))),
            n => Err(AdminError::Validation(format!(
                "{n} fields need attention: {}",
                problems.join(", ")
            ))),
        }
    }

    /// Validate and build the record to submit.
    ///
    /// Fields the form does not know are kept from the edited record.
    pub fn to_record(&mut self) -> Result<Record, AdminError> {
        self.validate()?;
        let mut record = self.base.clone();
        if let FormMode::Edit(id) = &self.mode {
            record.id = id.clone();
        }
        for field in self.fields.iter() {
            let text = field.input.value().trim();
            if text.is_empty() {
                record.fields.remove(field.spec.name);
                continue;
            }
            let value = match field.spec.kind {
                FieldKind::Number => number_value(text),
                _ => Value::String(text.to_string()),
            };
            record.set(field.spec.name, value);
        }
        Ok(record)
    }
}

fn check_field(spec: &FormField, text: &str) -> Option<String> {
    if text.is_empty() {
        return spec.required.then(|| format!("{} is required", spec.label));
    }
    match spec.kind {
        FieldKind::Text => None,
        FieldKind::Number => (!text.parse::<f64>().is_ok_and(|x| x.is_finite()))
            .then(|| format!("{} must be a number", spec.label)),
        FieldKind::Date => parse_day(text)
            .is_none()
            .then(|| format!("{} must be a date (YYYY-MM-DD)", spec.label)),
        FieldKind::Choice(options) => (!options.iter().any(|o| o.eq_ignore_ascii_case(text)))
            .then(|| format!("{} must be one of {}", spec.label, options.join(", "))),
    }
}

fn number_value(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

fn singular(title: &str) -> String {
    match title {
        "Prayer Requests" => "Prayer Request".to_string(),
        t => t.strip_suffix('s').unwrap_or(t).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn create_form_defaults_choices() {
        let form = RecordForm::create(Resource::Articles);
        assert_eq!(form.value("status"), Some("draft"));
        assert_eq!(form.value("title"), Some(""));
        assert_eq!(form.title(), "New Article");
    }

    #[test]
    fn required_fields_are_reported_inline() {
        let mut form = RecordForm::create(Resource::Articles);
        form.set_value("author", "Grace");
        let err = form.validate().unwrap_err();
        assert!(err.to_string().contains("Title is required"));
        assert_eq!(form.fields[0].error.as_deref(), Some("Title is required"));
        assert!(form.fields[1].error.is_none());
        assert_eq!(form.focus, 0);
    }

    #[test]
    fn numbers_dates_and_choices_are_checked() {
        let mut form = RecordForm::create(Resource::Invoices);
        form.set_value("number", "INV-1");
        form.set_value("customer", "Acme");
        form.set_value("amount", "ten");
        form.set_value("date", "yesterday");
        form.set_value("status", "void");
        let err = form.validate().unwrap_err();
        assert!(err.to_string().starts_with("3 fields need attention"));
    }

    #[test]
    fn numbers_become_json_numbers() {
        let mut form = RecordForm::create(Resource::Books);
        form.set_value("title", "Psalms");
        form.set_value("author", "David");
        form.set_value("price", "12.5");
        form.set_value("stock", "4");
        let record = form.to_record().unwrap();
        assert_eq!(record.get("price"), Some(&Value::from(12.5)));
        assert_eq!(record.get("stock"), Some(&Value::from(4)));
        assert!(record.get("isbn").is_none());
        assert!(record.id.is_empty());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for price in ["nan", "inf", "-Infinity", "1e400"] {
            let mut form = RecordForm::create(Resource::Books);
            form.set_value("title", "Psalms");
            form.set_value("author", "David");
            form.set_value("price", price);
            let err = form.to_record().unwrap_err();
            assert!(err.to_string().contains("Price must be a number"), "{price}");
        }
    }

    #[test]
    fn keys_move_focus_and_cycle_choices() {
        let mut form = RecordForm::create(Resource::Articles);
        assert_eq!(form.handle_key(key(KeyCode::Char('H'))), FormEvent::None);
        assert_eq!(form.value("title"), Some("H"));
        // title, author, category -> status
        for _ in 0..3 {
            form.handle_key(key(KeyCode::Tab));
        }
        form.handle_key(key(KeyCode::Right));
        assert_eq!(form.value("status"), Some("published"));
        form.handle_key(key(KeyCode::Right));
        assert_eq!(form.value("status"), Some("draft"));
        assert_eq!(form.handle_key(key(KeyCode::Enter)), FormEvent::Submit);
        assert_eq!(form.handle_key(key(KeyCode::Esc)), FormEvent::Cancel);
    }

    #[test]
    fn edit_keeps_unknown_fields() {
        let record = Record::new("a1")
            .with("title", "Old")
            .with("author", "Paul")
            .with("status", "draft")
            .with("views", 10);
        let mut form = RecordForm::edit(Resource::Articles, record);
        form.set_value("title", "New");
        let updated = form.to_record().unwrap();
        assert_eq!(updated.id, "a1");
        assert_eq!(updated.text("title"), "New");
        assert_eq!(updated.get("views"), Some(&Value::from(10)));
    }
}
