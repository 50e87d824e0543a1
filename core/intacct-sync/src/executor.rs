//! Query executor: turns the query/continuation pair into pages.

use intacct_client::{ClientResult, IntacctApi, QueryResult};
use intacct_types::{EntityId, Record};
use tracing::debug;

/// A page of records plus what is needed to fetch the next one.
pub type Page = QueryResult;

/// The query a pager runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub object: String,
    pub fields: Vec<String>,
    pub query: String,
}

impl QuerySpec {
    /// A query returning every field.
    pub fn all_fields(object: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            fields: vec!["*".to_string()],
            query: query.into(),
        }
    }

    /// Restricts the fields returned.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PagerPhase {
    Pending,
    Continuing { result_id: String },
    Exhausted,
}

/// Walks one result set page by page.
///
/// The first call runs the filtered query; later calls continue with the
/// token from the previous page while records remain. Pages are returned
/// exactly as received.
pub struct Pager<'a> {
    api: &'a dyn IntacctApi,
    spec: QuerySpec,
    entity: Option<EntityId>,
    page_size: u32,
    phase: PagerPhase,
    pages_read: usize,
}

impl<'a> Pager<'a> {
    /// Creates a pager; no call is made until [`Pager::next_page`].
    pub fn new(
        api: &'a dyn IntacctApi,
        spec: QuerySpec,
        entity: Option<EntityId>,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            spec,
            entity,
            page_size,
            phase: PagerPhase::Pending,
            pages_read: 0,
        }
    }

    /// Fetches the next page, or `None` once the result set is drained.
    pub async fn next_page(&mut self) -> ClientResult<Option<Page>> {
        let page = match &self.phase {
            PagerPhase::Exhausted => return Ok(None),
            PagerPhase::Pending => {
                let fields: Vec<&str> = self.spec.fields.iter().map(String::as_str).collect();
                self.api
                    .read_by_query(
                        &self.spec.object,
                        &fields,
                        &self.spec.query,
                        self.page_size,
                        self.entity.as_ref(),
                    )
                    .await?
            }
            PagerPhase::Continuing { result_id } => {
                self.api.read_more(result_id, self.entity.as_ref()).await?
            }
        };

        self.pages_read += 1;
        self.phase = match (&page.result_id, page.num_remaining) {
            (Some(result_id), remaining) if remaining > 0 => PagerPhase::Continuing {
                result_id: result_id.clone(),
            },
            _ => PagerPhase::Exhausted,
        };

        debug!(
            object = %self.spec.object,
            page = self.pages_read,
            records = page.records.len(),
            remaining = page.num_remaining,
            "Fetched page"
        );
        Ok(Some(page))
    }

    /// Number of pages fetched so far.
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Reads every remaining page and concatenates the records in receipt
    /// order.
    pub async fn drain(mut self) -> ClientResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page.records);
        }
        Ok(records)
    }
}

/// Builds pagers bound to one gateway and page size.
#[derive(Clone, Copy)]
pub struct QueryExecutor<'a> {
    api: &'a dyn IntacctApi,
    page_size: u32,
}

impl<'a> QueryExecutor<'a> {
    /// Creates an executor.
    pub fn new(api: &'a dyn IntacctApi, page_size: u32) -> Self {
        Self { api, page_size }
    }

    /// Starts a paged query.
    pub fn query(&self, spec: QuerySpec, entity: Option<&EntityId>) -> Pager<'a> {
        Pager::new(self.api, spec, entity.cloned(), self.page_size)
    }

    /// The gateway this executor talks to.
    pub fn api(&self) -> &'a dyn IntacctApi {
        self.api
    }
}
