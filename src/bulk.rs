use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::domain::AdminError;
use crate::record::Record;
use crate::repository::Repository;
use crate::resource::{Resource, ResourceSchema};
use crate::selection::Selection;
use crate::tabular;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkAction {
    Delete,
    Publish,
    Unpublish,
    MarkCompleted,
    Export,
}

impl BulkAction {
    pub fn label(&self, schema: &ResourceSchema) -> String {
        match self {
            BulkAction::Delete => "Delete".to_string(),
            BulkAction::Publish => "Publish".to_string(),
            BulkAction::Unpublish => "Unpublish".to_string(),
            BulkAction::MarkCompleted => schema
                .completion
                .map(|c| c.label.to_string())
                .unwrap_or_else(|| "Mark as completed".to_string()),
            BulkAction::Export => "Export CSV".to_string(),
        }
    }

    /// Status value written by this action, if it is a status change.
    pub fn target_status(&self, schema: &ResourceSchema) -> Option<&'static str> {
        match self {
            BulkAction::Publish => Some("published"),
            BulkAction::Unpublish => Some("draft"),
            BulkAction::MarkCompleted => schema.completion.map(|c| c.value),
            BulkAction::Delete | BulkAction::Export => None,
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BulkAction::Delete => "delete",
            BulkAction::Publish => "publish",
            BulkAction::Unpublish => "unpublish",
            BulkAction::MarkCompleted => "complete",
            BulkAction::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    ActionChosen(BulkAction),
    Executing(BulkAction),
}

/// Drives a bulk action from choice to completion.
///
/// `Idle -> ActionChosen -> Executing -> Idle`. The selection is cleared when
/// the execution finishes, whatever its outcome.
#[derive(Debug, Default)]
pub struct BulkDispatcher {
    state: DispatchState,
}

impl BulkDispatcher {
    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn chosen(&self) -> Option<BulkAction> {
        match self.state {
            DispatchState::ActionChosen(a) | DispatchState::Executing(a) => Some(a),
            DispatchState::Idle => None,
        }
    }

    pub fn is_executing(&self) -> bool {
        matches!(self.state, DispatchState::Executing(_))
    }

    pub fn choose(
        &mut self,
        schema: &ResourceSchema,
        action: BulkAction,
        selection: &Selection,
    ) -> Result<(), AdminError> {
        if self.is_executing() {
            return Err(AdminError::InFlight("bulk action".into()));
        }
        if selection.is_empty() {
            return Err(AdminError::Validation("select at least one record first".into()));
        }
        if !schema.offers(action) {
            return Err(AdminError::Validation(format!(
                "{} does not support {}",
                schema.title,
                action.label(schema)
            )));
        }
        self.state = DispatchState::ActionChosen(action);
        Ok(())
    }

    /// Step to the next action the resource offers, the way a dropdown would.
    pub fn cycle(
        &mut self,
        schema: &ResourceSchema,
        selection: &Selection,
    ) -> Result<BulkAction, AdminError> {
        let actions = schema.bulk_actions;
        let next = match self.state {
            DispatchState::ActionChosen(current) => {
                let pos = actions.iter().position(|a| *a == current).unwrap_or(0);
                actions[(pos + 1) % actions.len()]
            }
            _ => actions[0],
        };
        self.choose(schema, next, selection)?;
        Ok(next)
    }

    pub fn cancel(&mut self) {
        if let DispatchState::ActionChosen(_) = self.state {
            self.state = DispatchState::Idle;
        }
    }

    /// Confirm the chosen action and hand out the ids to work on.
    pub fn begin(&mut self, selection: &Selection) -> Result<(BulkAction, Vec<String>), AdminError> {
        match self.state {
            DispatchState::ActionChosen(action) => {
                if selection.is_empty() {
                    self.state = DispatchState::Idle;
                    return Err(AdminError::Validation("selection is empty".into()));
                }
                self.state = DispatchState::Executing(action);
                Ok((action, selection.ids().to_vec()))
            }
            DispatchState::Idle => Err(AdminError::Validation("choose a bulk action first".into())),
            DispatchState::Executing(_) => Err(AdminError::InFlight("bulk action".into())),
        }
    }

    pub fn finish(&mut self, selection: &mut Selection) {
        selection.clear();
        self.state = DispatchState::Idle;
    }

    /// Forget any chosen or running action, e.g. when the page changes.
    pub fn reset(&mut self) {
        self.state = DispatchState::Idle;
    }

    /// Run the whole cycle synchronously with `run` as the executor.
    pub fn dispatch<F>(&mut self, selection: &mut Selection, run: F) -> Result<BulkReport, AdminError>
    where
        F: FnOnce(BulkAction, Vec<String>) -> BulkReport,
    {
        let (action, ids) = self.begin(selection)?;
        let report = run(action, ids);
        self.finish(selection);
        Ok(report)
    }
}

/// Outcome of a bulk action. Successes are kept even when others failed.
#[derive(Debug)]
pub struct BulkReport {
    pub resource: Resource,
    pub action: BulkAction,
    pub requested: usize,
    pub updated: Vec<Record>,
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub export_path: Option<PathBuf>,
}

impl BulkReport {
    fn new(resource: Resource, action: BulkAction, requested: usize) -> Self {
        BulkReport {
            resource,
            action,
            requested,
            updated: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            export_path: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.requested - self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Reflect the successful part of the action in a page's collection.
    pub fn apply_to(&self, records: &mut Vec<Record>) {
        if !self.deleted.is_empty() {
            records.retain(|r| !self.deleted.contains(&r.id));
        }
        for updated in self.updated.iter() {
            if let Some(existing) = records.iter_mut().find(|r| r.id == updated.id) {
                *existing = updated.clone();
            }
        }
    }

    pub fn summary(&self) -> String {
        let schema = self.resource.schema();
        let mut message = format!(
            "{}: {} of {} {}",
            self.action.label(schema),
            self.succeeded(),
            self.requested,
            schema.title.to_lowercase()
        );
        if let Some(path) = &self.export_path {
            message.push_str(&format!(" written to {}", path.display()));
        }
        if let Some((id, reason)) = self.failed.first() {
            message.push_str(&format!("; {} failed ({id}: {reason})", self.failed.len()));
        }
        message
    }
}

/// Invoke the per-resource handler of `action` for every id.
///
/// Best effort: a failing id is recorded and the remaining ids are still
/// processed. Nothing is rolled back.
pub fn run_bulk(
    repo: &dyn Repository,
    resource: Resource,
    action: BulkAction,
    ids: &[String],
    export_dir: &Path,
) -> BulkReport {
    let schema = resource.schema();
    let mut report = BulkReport::new(resource, action, ids.len());
    info!("Running bulk {action} on {} {}", ids.len(), schema.key);

    match action {
        BulkAction::Delete => {
            for id in ids {
                match repo.delete(resource, id) {
                    Ok(()) => report.deleted.push(id.clone()),
                    Err(e) => report.failed.push((id.clone(), e.user_message())),
                }
            }
        }
        BulkAction::Publish | BulkAction::Unpublish | BulkAction::MarkCompleted => {
            let Some(status) = action.target_status(schema) else {
                for id in ids {
                    report
                        .failed
                        .push((id.clone(), format!("{} has no completed state", schema.title)));
                }
                return report;
            };
            for id in ids {
                match repo.set_status(resource, id, status) {
                    Ok(record) => report.updated.push(record),
                    Err(e) => report.failed.push((id.clone(), e.user_message())),
                }
            }
        }
        BulkAction::Export => {
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                match repo.get(resource, id) {
                    Ok(record) => records.push(record),
                    Err(e) => report.failed.push((id.clone(), e.user_message())),
                }
            }
            let path = export_dir.join(format!(
                "{}-{}.csv",
                schema.key,
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            ));
            let written = std::fs::create_dir_all(export_dir)
                .map_err(AdminError::from)
                .and_then(|_| tabular::export_csv(&records, &path));
            match written {
                Ok(()) => report.export_path = Some(path),
                Err(e) => {
                    error!("Export to {} failed: {e}", path.display());
                    for record in records {
                        report.failed.push((record.id, e.user_message()));
                    }
                }
            }
        }
    }

    debug!(
        "Bulk {action} finished: {} ok, {} failed",
        report.succeeded(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn selection_of(ids: &[&str]) -> Selection {
        let mut selection = Selection::default();
        for id in ids {
            selection.select_item(id, true);
        }
        selection
    }

    #[test]
    fn cannot_choose_without_selection() {
        let mut dispatcher = BulkDispatcher::default();
        let schema = Resource::Articles.schema();
        assert!(
            dispatcher
                .choose(schema, BulkAction::Publish, &Selection::default())
                .is_err()
        );
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn cannot_choose_unoffered_action() {
        let mut dispatcher = BulkDispatcher::default();
        let schema = Resource::Books.schema();
        let selection = selection_of(&["1"]);
        assert!(dispatcher.choose(schema, BulkAction::Publish, &selection).is_err());
    }

    #[test]
    fn cycle_walks_the_offered_actions() {
        let mut dispatcher = BulkDispatcher::default();
        let schema = Resource::Articles.schema();
        let selection = selection_of(&["1"]);
        let mut seen = Vec::new();
        for _ in 0..schema.bulk_actions.len() + 1 {
            seen.push(dispatcher.cycle(schema, &selection).unwrap());
        }
        assert_eq!(&seen[..schema.bulk_actions.len()], schema.bulk_actions);
        assert_eq!(seen.last(), schema.bulk_actions.first());
    }

    #[test]
    fn full_cycle_clears_selection() {
        let mut dispatcher = BulkDispatcher::default();
        let schema = Resource::Articles.schema();
        let mut selection = selection_of(&["1", "2"]);
        dispatcher.choose(schema, BulkAction::Delete, &selection).unwrap();

        let (action, ids) = dispatcher.begin(&selection).unwrap();
        assert_eq!(action, BulkAction::Delete);
        assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
        assert!(dispatcher.is_executing());
        assert!(dispatcher.begin(&selection).is_err());

        dispatcher.finish(&mut selection);
        assert!(selection.is_empty());
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn publish_updates_record_and_clears_selection() {
        let repo = MemoryRepository::with_records(
            Resource::Articles,
            vec![
                Record::new("1").with("status", "draft"),
                Record::new("2").with("status", "published"),
            ],
        );
        let mut records = repo.list(Resource::Articles).unwrap();
        let mut selection = selection_of(&["1"]);
        let mut dispatcher = BulkDispatcher::default();
        dispatcher
            .choose(Resource::Articles.schema(), BulkAction::Publish, &selection)
            .unwrap();

        let report = dispatcher
            .dispatch(&mut selection, |action, ids| {
                run_bulk(&repo, Resource::Articles, action, &ids, Path::new("."))
            })
            .unwrap();
        report.apply_to(&mut records);

        assert!(report.is_success());
        assert!(selection.is_empty());
        assert_eq!(records[0].status(), "published");
        assert_eq!(records[1].status(), "published");
        assert_eq!(
            repo.get(Resource::Articles, "1").unwrap().status(),
            "published"
        );
    }

    #[test]
    fn partial_failures_are_reported_not_rolled_back() {
        let repo = MemoryRepository::with_records(
            Resource::Contacts,
            vec![Record::new("1"), Record::new("3")],
        );
        let ids: Vec<String> = ["1", "2", "3"].iter().map(|s| s.to_string()).collect();
        let report = run_bulk(&repo, Resource::Contacts, BulkAction::Delete, &ids, Path::new("."));

        assert_eq!(report.deleted, vec!["1".to_string(), "3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "2");
        assert_eq!(report.succeeded(), 2);
        assert!(repo.list(Resource::Contacts).unwrap().is_empty());
        assert!(report.summary().contains("1 failed"));
    }

    #[test]
    fn mark_completed_uses_the_resource_state() {
        let repo = MemoryRepository::with_records(
            Resource::PrayerRequests,
            vec![Record::new("p1").with("status", "pending")],
        );
        let report = run_bulk(
            &repo,
            Resource::PrayerRequests,
            BulkAction::MarkCompleted,
            &["p1".to_string()],
            Path::new("."),
        );
        assert_eq!(report.updated[0].status(), "prayed");
    }

    #[test]
    fn export_writes_a_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::with_records(
            Resource::Books,
            vec![
                Record::new("b1").with("title", "Psalms").with("price", 12.5),
                Record::new("b2").with("title", "Acts"),
            ],
        );
        let report = run_bulk(
            &repo,
            Resource::Books,
            BulkAction::Export,
            &["b1".to_string(), "b2".to_string()],
            dir.path(),
        );
        assert!(report.is_success());
        let path = report.export_path.expect("export path");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("id,title,price"));
        assert!(content.contains("Psalms"));
    }
}
