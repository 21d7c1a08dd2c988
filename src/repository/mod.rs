//! Persistence behind one interface.
//!
//! Pages never know whether their records live in memory, in JSON files on
//! disk or behind the REST API.

mod http;
mod json_store;
mod memory;

use std::sync::Arc;

pub use http::{HttpRepository, ListEnvelope, PageData};
pub use json_store::JsonStoreRepository;
pub use memory::MemoryRepository;

use crate::config::BackendConfig;
use crate::domain::AdminError;
use crate::record::Record;
use crate::resource::Resource;

pub trait Repository: Send + Sync {
    /// Human readable description, used in logs and the status line.
    fn describe(&self) -> String;

    fn list(&self, resource: Resource) -> Result<Vec<Record>, AdminError>;

    fn get(&self, resource: Resource, id: &str) -> Result<Record, AdminError>;

    /// Store a new record. An empty id is replaced by one the store assigns.
    fn create(&self, resource: Resource, record: Record) -> Result<Record, AdminError>;

    fn update(&self, resource: Resource, record: Record) -> Result<Record, AdminError>;

    fn delete(&self, resource: Resource, id: &str) -> Result<(), AdminError>;

    fn set_status(&self, resource: Resource, id: &str, status: &str) -> Result<Record, AdminError> {
        let mut record = self.get(resource, id)?;
        record.set(resource.schema().status_field.unwrap_or("status"), status);
        self.update(resource, record)
    }
}

pub(crate) fn not_found(resource: Resource, id: &str) -> AdminError {
    AdminError::NotFound {
        resource: resource.schema().title.to_string(),
        id: id.to_string(),
    }
}

pub fn build_repository(backend: &BackendConfig) -> Result<Arc<dyn Repository>, AdminError> {
    let repo: Arc<dyn Repository> = match backend {
        BackendConfig::Memory => Arc::new(MemoryRepository::default()),
        BackendConfig::Local { data_dir } => Arc::new(JsonStoreRepository::open(data_dir)?),
        BackendConfig::Http {
            base_url,
            per_page,
            timeout_secs,
        } => Arc::new(HttpRepository::new(base_url, *per_page, *timeout_secs)),
    };
    tracing::info!("Using repository {}", repo.describe());
    Ok(repo)
}
