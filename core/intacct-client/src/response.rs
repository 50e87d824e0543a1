//! Response envelope parsing and failure classification.

use crate::error::{ClientError, ClientResult};
use crate::xml::{XmlElement, parse_document};
use intacct_types::Record;
use serde_json::Value;

/// Gateway error numbers that always mean missing permissions.
const PERMISSION_ERROR_CODES: &[&str] = &["WSP001"];

/// Data children that are diagnostics rather than records.
const NON_RECORD_TAGS: &[&str] = &["error", "warnings"];

/// One `errormessage/error` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetail {
    pub errorno: Option<String>,
    pub description: Option<String>,
    pub description2: Option<String>,
}

impl ErrorDetail {
    fn from_element(element: &XmlElement) -> Self {
        Self {
            errorno: element.text_at("errorno").map(str::to_string),
            description: element.text_at("description").map(str::to_string),
            description2: element.text_at("description2").map(str::to_string),
        }
    }

    /// The most specific description available.
    pub fn message(&self) -> Option<&str> {
        self.description2.as_deref().or(self.description.as_deref())
    }
}

/// One `operation/result` node.
#[derive(Debug, Clone, Default)]
pub struct ResultNode {
    pub status: Option<String>,
    pub function: Option<String>,
    pub data: Vec<XmlElement>,
    pub result_id: Option<String>,
    pub num_remaining: Option<u64>,
    pub errors: Vec<ErrorDetail>,
}

impl ResultNode {
    fn from_element(element: &XmlElement) -> Self {
        let data: Vec<XmlElement> = element.children_named("data").cloned().collect();

        // Paged results report these as elements or as `data` attributes.
        let result_id = element
            .text_at("resultId")
            .or_else(|| data.iter().find_map(|d| d.attr("resultId")))
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);
        let num_remaining = element
            .text_at("numremaining")
            .or_else(|| data.iter().find_map(|d| d.attr("numremaining")))
            .and_then(|n| n.trim().parse().ok());

        Self {
            status: element.text_at("status").map(str::to_string),
            function: element.text_at("function").map(str::to_string),
            result_id,
            num_remaining,
            errors: element
                .find_all("errormessage/error")
                .into_iter()
                .map(ErrorDetail::from_element)
                .collect(),
            data,
        }
    }

    /// True unless the node reports a non-success status.
    pub fn is_success(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|s| s.eq_ignore_ascii_case("success"))
    }

    /// Records contained in this node's `data` elements.
    pub fn records(&self) -> Vec<Record> {
        self.data
            .iter()
            .flat_map(|data| data.children.iter())
            .filter(|child| !NON_RECORD_TAGS.contains(&child.tag.as_str()))
            .map(|child| match child.to_value() {
                Value::Object(map) => map,
                scalar => {
                    let mut record = Record::new();
                    record.insert(child.tag.clone(), scalar);
                    record
                }
            })
            .collect()
    }

    fn classify_failure(&self) -> ClientError {
        let first = self.errors.first();
        let message = first
            .and_then(ErrorDetail::message)
            .unwrap_or("Operation failure")
            .to_string();
        let errorno = first.and_then(|e| e.errorno.as_deref()).unwrap_or_default();
        let lowered = message.to_lowercase();

        if lowered.contains("permission") || PERMISSION_ERROR_CODES.contains(&errorno) {
            ClientError::Permission(message)
        } else if lowered.contains("timeout") || lowered.contains("temporarily unavailable") {
            ClientError::Transient(message)
        } else if lowered.contains("login") || lowered.contains("authentication") {
            ClientError::Auth(message)
        } else {
            ClientError::Protocol(message)
        }
    }
}

/// A parsed gateway response.
#[derive(Debug, Clone, Default)]
pub struct ResponseEnvelope {
    pub control_status: Option<String>,
    pub control_message: Option<String>,
    pub auth_status: Option<String>,
    pub auth_errors: Vec<ErrorDetail>,
    pub results: Vec<ResultNode>,
}

impl ResponseEnvelope {
    /// Parses a response document.
    pub fn parse(xml: &str) -> ClientResult<Self> {
        let root = parse_document(xml)?;
        if root.tag != "response" {
            return Err(ClientError::Protocol(format!(
                "unexpected root element <{}>",
                root.tag
            )));
        }
        Ok(Self::from_root(&root))
    }

    fn from_root(root: &XmlElement) -> Self {
        let control_message = root
            .descendant("description2")
            .and_then(XmlElement::trimmed_text)
            .or_else(|| root.descendant("description").and_then(XmlElement::trimmed_text))
            .map(str::to_string);

        Self {
            control_status: root.text_at("control/status").map(str::to_string),
            control_message,
            auth_status: root
                .text_at("operation/authentication/status")
                .map(str::to_string),
            auth_errors: root
                .find_all("operation/authentication/errormessage/error")
                .into_iter()
                .map(ErrorDetail::from_element)
                .collect(),
            results: root
                .find_all("operation/result")
                .into_iter()
                .map(ResultNode::from_element)
                .collect(),
        }
    }

    /// Classifies the response, failing on the first problem found.
    ///
    /// Control failures take precedence over authentication failures, which
    /// take precedence over per-result failures.
    pub fn check(&self) -> ClientResult<()> {
        if is_failure(self.control_status.as_deref()) {
            return Err(ClientError::Config(
                self.control_message
                    .clone()
                    .unwrap_or_else(|| "Control failure".to_string()),
            ));
        }

        if is_failure(self.auth_status.as_deref()) {
            let message = self
                .auth_errors
                .first()
                .and_then(ErrorDetail::message)
                .unwrap_or("Auth failure");
            return Err(ClientError::Auth(message.to_string()));
        }

        match self.results.iter().find(|r| !r.is_success()) {
            Some(failed) => Err(failed.classify_failure()),
            None => Ok(()),
        }
    }

    /// All records across every result node, in document order.
    pub fn records(&self) -> Vec<Record> {
        self.results.iter().flat_map(ResultNode::records).collect()
    }

    /// Continuation token of the first result that reports one.
    pub fn result_id(&self) -> Option<&str> {
        self.results.iter().find_map(|r| r.result_id.as_deref())
    }

    /// Remaining record count of the first result that reports one.
    pub fn num_remaining(&self) -> u64 {
        self.results
            .iter()
            .find_map(|r| r.num_remaining)
            .unwrap_or(0)
    }
}

fn is_failure(status: Option<&str>) -> bool {
    status.is_some_and(|s| !s.eq_ignore_ascii_case("success"))
}
