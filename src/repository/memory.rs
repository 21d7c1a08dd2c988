use std::collections::HashMap;
use std::sync::RwLock;

use super::{Repository, not_found};
use crate::domain::AdminError;
use crate::record::{Record, new_id};
use crate::resource::Resource;

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<HashMap<Resource, Vec<Record>>>,
}

impl MemoryRepository {
    pub fn with_records(resource: Resource, records: Vec<Record>) -> Self {
        let repo = MemoryRepository::default();
        repo.insert_all(resource, records);
        repo
    }

    pub fn insert_all(&self, resource: Resource, records: Vec<Record>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(resource).or_default().extend(records);
    }
}

impl Repository for MemoryRepository {
    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    fn list(&self, resource: Resource) -> Result<Vec<Record>, AdminError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(&resource).cloned().unwrap_or_default())
    }

    fn get(&self, resource: Resource, id: &str) -> Result<Record, AdminError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables
            .get(&resource)
            .and_then(|t| t.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| not_found(resource, id))
    }

    fn create(&self, resource: Resource, mut record: Record) -> Result<Record, AdminError> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let table = tables.entry(resource).or_default();
        if record.id.is_empty() {
            record.id = new_id();
        } else if table.iter().any(|r| r.id == record.id) {
            return Err(AdminError::Validation(format!(
                "{} '{}' already exists",
                resource, record.id
            )));
        }
        table.push(record.clone());
        Ok(record)
    }

    fn update(&self, resource: Resource, record: Record) -> Result<Record, AdminError> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let existing = tables
            .get_mut(&resource)
            .and_then(|t| t.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| not_found(resource, &record.id))?;
        *existing = record.clone();
        Ok(record)
    }

    fn delete(&self, resource: Resource, id: &str) -> Result<(), AdminError> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let table = tables.get_mut(&resource).ok_or_else(|| not_found(resource, id))?;
        let before = table.len();
        table.retain(|r| r.id != id);
        if table.len() == before {
            return Err(not_found(resource, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_ids() {
        let repo = MemoryRepository::default();
        let created = repo
            .create(Resource::Books, Record::new("").with("title", "Romans"))
            .unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(repo.get(Resource::Books, &created.id).unwrap(), created);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let repo = MemoryRepository::with_records(Resource::Books, vec![Record::new("1")]);
        assert!(repo.create(Resource::Books, Record::new("1")).is_err());
    }

    #[test]
    fn missing_records_are_not_found() {
        let repo = MemoryRepository::default();
        assert!(matches!(
            repo.get(Resource::Events, "x"),
            Err(AdminError::NotFound { .. })
        ));
        assert!(repo.update(Resource::Events, Record::new("x")).is_err());
        assert!(repo.delete(Resource::Events, "x").is_err());
    }

    #[test]
    fn set_status_goes_through_update() {
        let repo = MemoryRepository::with_records(
            Resource::Contacts,
            vec![Record::new("c1").with("status", "new").with("name", "Ann")],
        );
        let updated = repo.set_status(Resource::Contacts, "c1", "replied").unwrap();
        assert_eq!(updated.status(), "replied");
        assert_eq!(updated.text("name"), "Ann");
        assert_eq!(repo.list(Resource::Contacts).unwrap()[0].status(), "replied");
    }

    #[test]
    fn resources_are_isolated() {
        let repo = MemoryRepository::with_records(Resource::Books, vec![Record::new("1")]);
        assert!(repo.list(Resource::Members).unwrap().is_empty());
    }
}
