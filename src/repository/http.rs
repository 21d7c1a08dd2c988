use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use ureq::Agent;

use super::{Repository, not_found};
use crate::domain::AdminError;
use crate::record::Record;
use crate::resource::Resource;

const MAX_PAGES: usize = 10_000;

/// Everything but the unreserved characters is escaped inside a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Response wrapper used by every endpoint of the API.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

pub type ListEnvelope = Envelope<PageData>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub total_items: usize,
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default)]
    pub per_page: usize,
    #[serde(default = "first_page")]
    pub total_pages: usize,
}

fn first_page() -> usize {
    1
}

/// Unwrap the `data` member of an API response.
///
/// Error statuses and `success: false` both become [`AdminError::Api`]
/// carrying the server's message when there is one.
pub fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<Option<T>, AdminError> {
    let fallback = || format!("server responded with status {status}");
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if status >= 400 => {
            return Err(AdminError::Api {
                status,
                message: fallback(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    if status >= 400 || envelope.success == Some(false) {
        let message = if envelope.message.is_empty() {
            fallback()
        } else {
            envelope.message
        };
        return Err(AdminError::Api { status, message });
    }
    Ok(envelope.data)
}

pub struct HttpRepository {
    base_url: String,
    per_page: usize,
    agent: Agent,
}

impl HttpRepository {
    pub fn new(base_url: &str, per_page: usize, timeout_secs: u64) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))))
            .http_status_as_error(false)
            .build();
        HttpRepository {
            base_url: base_url.trim_end_matches('/').to_string(),
            per_page: per_page.max(1),
            agent: Agent::new_with_config(config),
        }
    }

    fn collection_url(&self, resource: Resource) -> String {
        format!("{}{}", self.base_url, resource.schema().api_path)
    }

    fn record_url(&self, resource: Resource, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(resource),
            utf8_percent_encode(id, PATH_SEGMENT)
        )
    }

    fn read(response: ureq::http::Response<ureq::Body>) -> Result<(u16, String), AdminError> {
        let status = response.status().as_u16();
        let body = response.into_body().read_to_string()?;
        trace!("Response {status}: {} bytes", body.len());
        Ok((status, body))
    }

    fn single(
        resource: Resource,
        id: &str,
        response: ureq::http::Response<ureq::Body>,
    ) -> Result<Record, AdminError> {
        let (status, body) = Self::read(response)?;
        let data: Option<Value> = parse_envelope(status, &body).map_err(|e| match e {
            AdminError::Api { status: 404, .. } => not_found(resource, id),
            other => other,
        })?;
        let value = data.ok_or_else(|| AdminError::InvalidRecord("response carried no record".into()))?;
        Record::from_value(value)
    }
}

impl Repository for HttpRepository {
    fn describe(&self) -> String {
        format!("api at {}", self.base_url)
    }

    fn list(&self, resource: Resource) -> Result<Vec<Record>, AdminError> {
        let url = self.collection_url(resource);
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let response = self
                .agent
                .get(&url)
                .query("page", page.to_string())
                .query("perPage", self.per_page.to_string())
                .call()?;
            let (status, body) = Self::read(response)?;
            let data: PageData = parse_envelope(status, &body)?.unwrap_or_default();
            let count = data.items.len();
            for item in data.items {
                records.push(Record::from_value(item)?);
            }
            debug!(
                "Fetched page {page}/{} of {url}: {count} items, {} total",
                data.total_pages, data.total_items
            );
            if count == 0 || page >= data.total_pages || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    fn get(&self, resource: Resource, id: &str) -> Result<Record, AdminError> {
        let response = self.agent.get(&self.record_url(resource, id)).call()?;
        Self::single(resource, id, response)
    }

    fn create(&self, resource: Resource, record: Record) -> Result<Record, AdminError> {
        let payload = if record.id.is_empty() {
            Value::Object(record.fields.clone())
        } else {
            record.to_value()
        };
        let response = self
            .agent
            .post(&self.collection_url(resource))
            .send_json(&payload)?;
        Self::single(resource, &record.id, response)
    }

    fn update(&self, resource: Resource, record: Record) -> Result<Record, AdminError> {
        let response = self
            .agent
            .put(&self.record_url(resource, &record.id))
            .send_json(record.to_value())?;
        Self::single(resource, &record.id, response)
    }

    fn delete(&self, resource: Resource, id: &str) -> Result<(), AdminError> {
        let response = self.agent.delete(&self.record_url(resource, id)).call()?;
        let (status, body) = Self::read(response)?;
        if status < 400 && body.trim().is_empty() {
            return Ok(());
        }
        parse_envelope::<Value>(status, &body).map_err(|e| match e {
            AdminError::Api { status: 404, .. } => not_found(resource, id),
            other => other,
        })?;
        Ok(())
    }
}
