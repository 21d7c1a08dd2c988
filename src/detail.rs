use crate::record::{Record, display_value};
use crate::resource::{Completion, Resource};

/// Read-only view of one record.
///
/// Only fields holding a value are listed; there is no fixed schema, fields
/// unknown to the resource form are shown after the known ones.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub resource: Resource,
    pub record: Record,
    pub fields: Vec<(String, String)>,
    pub curser_row: usize,
}

impl DetailView {
    pub fn new(resource: Resource, record: Record) -> Self {
        let fields = Self::visible_fields(resource, &record);
        DetailView {
            resource,
            record,
            fields,
            curser_row: 0,
        }
    }

    fn visible_fields(resource: Resource, record: &Record) -> Vec<(String, String)> {
        let schema = resource.schema();
        let mut fields = vec![("Id".to_string(), record.id.clone())];

        for field in schema.form.iter() {
            let value = record.text(field.name);
            if !value.trim().is_empty() {
                fields.push((field.label.to_string(), value));
            }
        }

        let mut others: Vec<(&String, String)> = record
            .non_empty_fields()
            .filter(|(name, _)| schema.form_field(name).is_none())
            .map(|(name, value)| (name, display_value(value)))
            .collect();
        others.sort_by(|a, b| a.0.cmp(b.0));
        fields.extend(others.into_iter().map(|(n, v)| (n.clone(), v)));
        fields
    }

    /// Replace the shown record, e.g. after its status changed.
    pub fn refresh(&mut self, record: Record) {
        self.fields = Self::visible_fields(self.resource, &record);
        self.record = record;
        self.curser_row = self.curser_row.min(self.fields.len().saturating_sub(1));
    }

    /// The status transition, when the record has not reached it yet.
    pub fn completion(&self) -> Option<Completion> {
        let schema = self.resource.schema();
        let completion = schema.completion?;
        let status = self.record.text(schema.status_field?);
        if status.eq_ignore_ascii_case(completion.value) {
            None
        } else {
            Some(completion)
        }
    }

    pub fn current_value(&self) -> Option<&str> {
        self.fields.get(self.curser_row).map(|(_, v)| v.as_str())
    }

    pub fn move_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
    }

    pub fn move_down(&mut self, size: usize) {
        self.curser_row = (self.curser_row + size).min(self.fields.len().saturating_sub(1));
    }
}
