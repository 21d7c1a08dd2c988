use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{Repository, not_found};
use crate::domain::AdminError;
use crate::record::{Record, new_id};
use crate::resource::Resource;

/// Key-value store of JSON tables, one file per resource key.
///
/// Each file holds a JSON array of records, e.g. `books.json` or
/// `prayerRequests.json`. Writes replace the file atomically.
pub struct JsonStoreRepository {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonStoreRepository {
    pub fn open(dir: &Path) -> Result<Self, AdminError> {
        fs::create_dir_all(dir)?;
        debug!("Opened json store in {}", dir.display());
        Ok(JsonStoreRepository {
            dir: dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn table_path(&self, resource: Resource) -> PathBuf {
        self.dir.join(format!("{}.json", resource.key()))
    }

    fn read_table(&self, resource: Resource) -> Result<Table, AdminError> {
        let path = self.table_path(resource);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Table::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Table::default());
        }
        let Value::Array(items) = serde_json::from_str(&content)? else {
            return Err(AdminError::InvalidRecord(format!(
                "{} does not hold a json array",
                path.display()
            )));
        };
        let mut table = Table::default();
        for item in items {
            match Record::from_value(item.clone()) {
                Ok(record) => table.records.push(record),
                Err(e) => {
                    warn!("Keeping unreadable entry in {} as is: {e}", path.display());
                    table.unreadable.push(item);
                }
            }
        }
        trace!("Read {} records from {}", table.records.len(), path.display());
        Ok(table)
    }

    fn write_table(&self, resource: Resource, table: &Table) -> Result<(), AdminError> {
        let path = self.table_path(resource);
        let tmp = path.with_extension("json.tmp");
        let values: Vec<Value> = table
            .records
            .iter()
            .map(Record::to_value)
            .chain(table.unreadable.iter().cloned())
            .collect();
        fs::write(&tmp, serde_json::to_string_pretty(&values)?)?;
        fs::rename(&tmp, &path)?;
        trace!("Wrote {} entries to {}", values.len(), path.display());
        Ok(())
    }

    fn modify<T>(
        &self,
        resource: Resource,
        f: impl FnOnce(&mut Vec<Record>) -> Result<T, AdminError>,
    ) -> Result<T, AdminError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.read_table(resource)?;
        let out = f(&mut table.records)?;
        self.write_table(resource, &table)?;
        Ok(out)
    }
}

/// Contents of one table file. Entries without a usable id are written back untouched.
#[derive(Default)]
struct Table {
    records: Vec<Record>,
    unreadable: Vec<Value>,
}

impl Repository for JsonStoreRepository {
    fn describe(&self) -> String {
        format!("json store at {}", self.dir.display())
    }

    fn list(&self, resource: Resource) -> Result<Vec<Record>, AdminError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_table(resource)?.records)
    }

    fn get(&self, resource: Resource, id: &str) -> Result<Record, AdminError> {
        self.list(resource)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found(resource, id))
    }

    fn create(&self, resource: Resource, mut record: Record) -> Result<Record, AdminError> {
        self.modify(resource, |records| {
            if record.id.is_empty() {
                record.id = new_id();
            } else if records.iter().any(|r| r.id == record.id) {
                return Err(AdminError::Validation(format!(
                    "{} '{}' already exists",
                    resource, record.id
                )));
            }
            records.push(record.clone());
            Ok(record)
        })
    }

    fn update(&self, resource: Resource, record: Record) -> Result<Record, AdminError> {
        self.modify(resource, |records| {
            let existing = records
                .iter_mut()
                .find(|r| r.id == record.id)
                .ok_or_else(|| not_found(resource, &record.id))?;
            *existing = record.clone();
            Ok(record)
        })
    }

    fn delete(&self, resource: Resource, id: &str) -> Result<(), AdminError> {
        self.modify(resource, |records| {
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(not_found(resource, id));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let created = {
            let store = JsonStoreRepository::open(dir.path()).unwrap();
            store
                .create(
                    Resource::PrayerRequests,
                    Record::new("").with("name", "Ruth").with("status", "pending"),
                )
                .unwrap()
        };
        assert!(dir.path().join("prayerRequests.json").exists());

        let store = JsonStoreRepository::open(dir.path()).unwrap();
        let records = store.list(Resource::PrayerRequests).unwrap();
        assert_eq!(records, vec![created]);
    }

    #[test]
    fn missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStoreRepository::open(dir.path()).unwrap();
        assert!(store.list(Resource::Members).unwrap().is_empty());
    }

    #[test]
    fn reads_hand_written_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("books.json"),
            r#"[{"_id": 1, "title": "Genesis"}, {"title": "no id"}, {"id": "b2", "title": "Exodus"}]"#,
        )
        .unwrap();
        let store = JsonStoreRepository::open(dir.path()).unwrap();
        let books = store.list(Resource::Books).unwrap();
        let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "b2"]);
    }

    #[test]
    fn writes_keep_entries_without_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.json");
        fs::write(
            &path,
            r#"[{"title": "Legacy entry without id"}, {"id": "b2", "title": "Exodus"}]"#,
        )
        .unwrap();
        let store = JsonStoreRepository::open(dir.path()).unwrap();
        store
            .create(Resource::Books, Record::new("b3").with("title", "Numbers"))
            .unwrap();
        store.delete(Resource::Books, "b2").unwrap();

        let on_disk: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.iter().any(|v| v["title"] == "Legacy entry without id"));
        assert!(on_disk.iter().any(|v| v["id"] == "b3"));
        let ids: Vec<String> = store.list(Resource::Books).unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["b3"]);
    }

    #[test]
    fn rejects_non_array_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("members.json"), r#"{"id": "m1"}"#).unwrap();
        let store = JsonStoreRepository::open(dir.path()).unwrap();
        assert!(store.list(Resource::Members).is_err());
    }

    #[test]
    fn update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStoreRepository::open(dir.path()).unwrap();
        store
            .create(Resource::Members, Record::new("m1").with("name", "Lydia"))
            .unwrap();
        store
            .update(Resource::Members, Record::new("m1").with("name", "Lydia A."))
            .unwrap();
        assert_eq!(store.get(Resource::Members, "m1").unwrap().text("name"), "Lydia A.");

        store.delete(Resource::Members, "m1").unwrap();
        assert!(store.get(Resource::Members, "m1").is_err());
        assert!(store.delete(Resource::Members, "m1").is_err());
    }
}
