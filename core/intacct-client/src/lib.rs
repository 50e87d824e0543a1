//! XML gateway client for Sage Intacct.
//!
//! Every call is one signed XML document POSTed to the gateway and one XML
//! document back. The client:
//! - builds request envelopes with fresh control ids per call
//! - retries transient failures with exponential backoff
//! - classifies gateway failures into a small error taxonomy
//! - turns `result/data` payloads into records
//!
//! The [`IntacctApi`] trait is the seam the sync engine depends on, so the
//! engine can be exercised against a scripted gateway.
//!
//! # Example
//!
//! ```no_run
//! use intacct_client::{ClientConfig, Credentials, IntacctApi, IntacctClient};
//!
//! # async fn run() -> intacct_client::ClientResult<()> {
//! let config = ClientConfig::new(Credentials {
//!     sender_id: "sender".into(),
//!     sender_password: "secret".into(),
//!     user_id: "user".into(),
//!     company_id: "company".into(),
//!     user_password: "secret".into(),
//! });
//! let client = IntacctClient::new(config)?;
//! let page = client.read_by_query("CUSTOMER", &["*"], "RECORDNO > 0", 100, None).await?;
//! println!("{} customers, {} remaining", page.records.len(), page.num_remaining);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod envelope;
mod error;
pub mod response;
pub mod xml;

pub use client::{IntacctApi, IntacctClient, QueryResult};
pub use config::{ClientConfig, Credentials, DEFAULT_API_URL, RetryConfig};
pub use envelope::{DTD_VERSION, Function, RequestEnvelope};
pub use error::{ClientError, ClientResult};
pub use response::{ErrorDetail, ResponseEnvelope, ResultNode};
pub use xml::{XmlElement, parse_document};
