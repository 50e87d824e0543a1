//! HTTP client for the XML gateway.

use crate::config::ClientConfig;
use crate::envelope::{Function, RequestEnvelope};
use crate::error::{ClientError, ClientResult};
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use intacct_types::{EntityId, Record};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Fields that identify an entity in `readEntityDetails` output, by priority.
const ENTITY_ID_FIELDS: &[&str] = &["ENTITYID", "LOCATIONID", "ID"];

/// Maximum number of body characters kept in HTTP error messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// One page of a query result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Records in the order the gateway returned them.
    pub records: Vec<Record>,
    /// Continuation token for the next page, if any.
    pub result_id: Option<String>,
    /// Records left in the result set after this page.
    pub num_remaining: u64,
}

/// The gateway operations the sync engine relies on.
#[async_trait]
pub trait IntacctApi: Send + Sync {
    /// Lists the entities the user can access, deduplicated and sorted.
    async fn read_entity_details(&self) -> ClientResult<Vec<EntityId>>;

    /// Describes an object's declared fields.
    async fn lookup(&self, object: &str, entity: Option<&EntityId>) -> ClientResult<Record>;

    /// Runs a filtered query and returns its first page.
    async fn read_by_query(
        &self,
        object: &str,
        fields: &[&str],
        query: &str,
        page_size: u32,
        entity: Option<&EntityId>,
    ) -> ClientResult<QueryResult>;

    /// Fetches the next page of a result set.
    async fn read_more(&self, result_id: &str, entity: Option<&EntityId>)
    -> ClientResult<QueryResult>;

    /// Reads full records by key.
    async fn read(
        &self,
        object: &str,
        keys: &[&str],
        fields: &[&str],
        entity: Option<&EntityId>,
    ) -> ClientResult<Vec<Record>>;
}

/// Gateway client holding one HTTP session for its whole lifetime.
pub struct IntacctClient {
    config: ClientConfig,
    http: Client,
}

impl IntacctClient {
    /// Creates a client for the given configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends one function call, retrying transient failures.
    async fn call(
        &self,
        function: Function,
        entity: Option<&EntityId>,
    ) -> ClientResult<ResponseEnvelope> {
        let name = function.name();
        let envelope = RequestEnvelope::new(function, entity.cloned());
        let body = envelope.to_xml(&self.config.credentials)?;
        let retry = &self.config.retry;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(
                function = name,
                control_id = %envelope.control_id,
                entity = ?entity.map(EntityId::as_str),
                attempt,
                "Calling gateway"
            );

            match self.send_once(name, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for_attempt(attempt - 1);
                    warn!(
                        "Transient failure in {} (attempt {}/{}), retrying in {:?}: {}",
                        name, attempt, retry.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, name: &str, body: &str) -> ClientResult<ResponseEnvelope> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header(CONTENT_TYPE, "application/xml")
            .body(body.to_owned())
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ClientError::Transient(format!(
                "HTTP {} for {name}",
                status.as_u16()
            )));
        }

        let text = response.text().await?;
        if status.is_client_error() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                function: name.to_string(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let envelope = ResponseEnvelope::parse(&text)?;
        envelope.check()?;
        Ok(envelope)
    }

    fn page_from(envelope: &ResponseEnvelope) -> QueryResult {
        QueryResult {
            records: envelope.records(),
            result_id: envelope.result_id().map(str::to_string),
            num_remaining: envelope.num_remaining(),
        }
    }
}

#[async_trait]
impl IntacctApi for IntacctClient {
    async fn read_entity_details(&self) -> ClientResult<Vec<EntityId>> {
        let envelope = self.call(Function::ReadEntityDetails, None).await?;
        let ids: BTreeSet<EntityId> = envelope
            .records()
            .iter()
            .filter_map(|record| {
                ENTITY_ID_FIELDS.iter().find_map(|field| match record.get(*field) {
                    Some(Value::String(id)) if !id.is_empty() => Some(EntityId::new(id.as_str())),
                    _ => None,
                })
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn lookup(&self, object: &str, entity: Option<&EntityId>) -> ClientResult<Record> {
        let function = Function::Lookup {
            object: object.to_string(),
        };
        let envelope = self.call(function, entity).await?;
        Ok(envelope.records().into_iter().next().unwrap_or_default())
    }

    async fn read_by_query(
        &self,
        object: &str,
        fields: &[&str],
        query: &str,
        page_size: u32,
        entity: Option<&EntityId>,
    ) -> ClientResult<QueryResult> {
        let function = Function::ReadByQuery {
            object: object.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            query: query.to_string(),
            page_size,
        };
        let envelope = self.call(function, entity).await?;
        Ok(Self::page_from(&envelope))
    }

    async fn read_more(
        &self,
        result_id: &str,
        entity: Option<&EntityId>,
    ) -> ClientResult<QueryResult> {
        let function = Function::ReadMore {
            result_id: result_id.to_string(),
        };
        let envelope = self.call(function, entity).await?;
        let mut page = Self::page_from(&envelope);
        if page.result_id.is_none() {
            page.result_id = Some(result_id.to_string());
        }
        Ok(page)
    }

    async fn read(
        &self,
        object: &str,
        keys: &[&str],
        fields: &[&str],
        entity: Option<&EntityId>,
    ) -> ClientResult<Vec<Record>> {
        let function = Function::Read {
            object: object.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };
        let envelope = self.call(function, entity).await?;
        Ok(envelope.records())
    }
}
