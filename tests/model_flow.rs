use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ministry_admin::config::AdminConfig;
use ministry_admin::domain::{AdminError, Message};
use ministry_admin::model::{Model, Modus};
use ministry_admin::record::Record;
use ministry_admin::repository::{MemoryRepository, Repository};
use ministry_admin::resource::Resource;

const WAIT: Duration = Duration::from_secs(10);

/// Memory store whose first article listing and every status change are slow.
struct SlowRepository {
    inner: MemoryRepository,
    article_loads: AtomicUsize,
    first_load_started: AtomicBool,
}

impl SlowRepository {
    fn new() -> Self {
        let inner = MemoryRepository::default();
        inner.insert_all(
            Resource::Contacts,
            vec![Record::new("c1").with("name", "Martha").with("status", "new")],
        );
        SlowRepository {
            inner,
            article_loads: AtomicUsize::new(0),
            first_load_started: AtomicBool::new(false),
        }
    }
}

impl Repository for SlowRepository {
    fn describe(&self) -> String {
        "slow memory store".to_string()
    }

    fn list(&self, resource: Resource) -> Result<Vec<Record>, AdminError> {
        if resource != Resource::Articles {
            return self.inner.list(resource);
        }
        match self.article_loads.fetch_add(1, Ordering::SeqCst) {
            0 => {
                self.first_load_started.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(400));
                Ok(vec![Record::new("stale")])
            }
            _ => Ok(vec![Record::new("fresh")]),
        }
    }

    fn get(&self, resource: Resource, id: &str) -> Result<Record, AdminError> {
        self.inner.get(resource, id)
    }

    fn create(&self, resource: Resource, record: Record) -> Result<Record, AdminError> {
        self.inner.create(resource, record)
    }

    fn update(&self, resource: Resource, record: Record) -> Result<Record, AdminError> {
        self.inner.update(resource, record)
    }

    fn delete(&self, resource: Resource, id: &str) -> Result<(), AdminError> {
        self.inner.delete(resource, id)
    }

    fn set_status(&self, resource: Resource, id: &str, status: &str) -> Result<Record, AdminError> {
        thread::sleep(Duration::from_millis(300));
        self.inner.set_status(resource, id, status)
    }
}

fn send(model: &mut Model, message: Message) {
    model.update(Some(message)).unwrap();
}

fn type_text(model: &mut Model, text: &str) {
    for c in text.chars() {
        send(
            model,
            Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)),
        );
    }
}

fn press(model: &mut Model, code: KeyCode) {
    send(model, Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)));
}

#[test]
fn results_of_an_old_view_are_ignored() {
    let repo = Arc::new(SlowRepository::new());
    let mut model =
        Model::init(&AdminConfig::default(), repo.clone(), Resource::Articles, 120, 40).unwrap();
    for _ in 0..200 {
        if repo.first_load_started.load(Ordering::SeqCst) {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(repo.first_load_started.load(Ordering::SeqCst));
    send(&mut model, Message::NextResource);
    send(&mut model, Message::PrevResource);
    assert!(model.wait_for_jobs(WAIT));

    assert_eq!(model.resource(), Resource::Articles);
    assert_eq!(model.visible_ids(), vec!["fresh"]);
}

#[test]
fn overlapping_mutations_of_a_record_are_refused() {
    let repo = Arc::new(SlowRepository::new());
    let mut model = Model::init(&AdminConfig::default(), repo, Resource::Contacts, 120, 40).unwrap();
    assert!(model.wait_for_jobs(WAIT));

    send(&mut model, Message::CompleteRecord);
    send(&mut model, Message::DeleteRecord);
    press(&mut model, KeyCode::Char('y'));
    let toast = model.toast().expect("refusal toast");
    assert!(toast.message.contains("already in progress"), "{}", toast.message);

    assert!(model.wait_for_jobs(WAIT));
    assert_eq!(model.records()[0].status(), "replied");
}

#[test]
fn form_creates_a_record_and_reports_validation() {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::default());
    let mut model =
        Model::init(&AdminConfig::default(), Arc::clone(&repo), Resource::Books, 120, 40).unwrap();
    assert!(model.wait_for_jobs(WAIT));

    send(&mut model, Message::NewRecord);
    assert_eq!(model.modus(), Modus::Form);
    press(&mut model, KeyCode::Enter);
    let form = model.form().expect("form stays open");
    assert!(form.fields.iter().any(|f| f.error.is_some()));
    assert!(model.toast().is_some_and(|t| t.message.contains("Title is required")));

    // Title is focused after the failed submit.
    type_text(&mut model, "Acts");
    press(&mut model, KeyCode::Tab);
    type_text(&mut model, "Luke");
    press(&mut model, KeyCode::Enter);
    assert_eq!(model.modus(), Modus::Form);
    assert!(model.toast().is_some_and(|t| t.message.contains("Price is required")));

    // The price field took the focus.
    type_text(&mut model, "15");
    press(&mut model, KeyCode::Enter);
    assert!(model.wait_for_jobs(WAIT));

    assert_eq!(model.modus(), Modus::List);
    assert_eq!(model.records().len(), 1);
    assert_eq!(model.records()[0].text("title"), "Acts");
    assert_eq!(repo.list(Resource::Books).unwrap().len(), 1);
}

#[test]
fn export_bulk_action_writes_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(MemoryRepository::with_records(
        Resource::Members,
        vec![
            Record::new("m1").with("name", "Timothy").with("country", "Greece"),
            Record::new("m2").with("name", "Titus").with("country", "Crete"),
        ],
    ));
    let config = AdminConfig::default().export_dir(dir.path().to_path_buf());
    let mut model = Model::init(&config, repo, Resource::Members, 120, 40).unwrap();
    assert!(model.wait_for_jobs(WAIT));

    send(&mut model, Message::SelectAll);
    // Members offer Delete then Export.
    send(&mut model, Message::ChooseBulkAction);
    send(&mut model, Message::ChooseBulkAction);
    send(&mut model, Message::ApplyBulk);
    assert!(model.wait_for_jobs(WAIT));

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert!(model.selection().is_empty());
    assert_eq!(model.records().len(), 2);
}
