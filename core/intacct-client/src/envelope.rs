//! Request envelope construction.

use crate::config::Credentials;
use crate::error::{ClientError, ClientResult};
use intacct_types::EntityId;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use uuid::Uuid;

/// Gateway DTD version sent in every control block.
pub const DTD_VERSION: &str = "3.0";

/// One gateway function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    /// Object metadata lookup.
    Lookup { object: String },
    /// Filtered query returning the first page of a result set.
    ReadByQuery {
        object: String,
        fields: Vec<String>,
        query: String,
        page_size: u32,
    },
    /// Next page of a result set.
    ReadMore { result_id: String },
    /// Full records by key.
    Read {
        object: String,
        keys: Vec<String>,
        fields: Vec<String>,
    },
    /// Entities accessible to the user.
    ReadEntityDetails,
}

impl Function {
    /// The gateway function name.
    pub fn name(&self) -> &'static str {
        match self {
            Function::Lookup { .. } => "lookup",
            Function::ReadByQuery { .. } => "readByQuery",
            Function::ReadMore { .. } => "readMore",
            Function::Read { .. } => "read",
            Function::ReadEntityDetails => "readEntityDetails",
        }
    }
}

/// A request ready to be serialized.
///
/// Control ids are minted at construction, so each envelope identifies
/// exactly one logical call (retries resend the same document).
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// Request-level correlation id.
    pub control_id: String,
    /// Function-level correlation id.
    pub function_control_id: String,
    /// Entity override for the session, if scoped.
    pub entity: Option<EntityId>,
    /// The function payload.
    pub function: Function,
}

impl RequestEnvelope {
    /// Creates an envelope with fresh correlation ids.
    pub fn new(function: Function, entity: Option<EntityId>) -> Self {
        Self {
            control_id: Uuid::new_v4().to_string(),
            function_control_id: Uuid::new_v4().to_string(),
            entity,
            function,
        }
    }

    /// Serializes the envelope into the gateway's request document.
    pub fn to_xml(&self, credentials: &Credentials) -> ClientResult<String> {
        let mut w = Writer::new(Vec::new());
        emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        open(&mut w, "request")?;

        open(&mut w, "control")?;
        text_element(&mut w, "senderid", &credentials.sender_id)?;
        text_element(&mut w, "password", &credentials.sender_password)?;
        text_element(&mut w, "controlid", &self.control_id)?;
        text_element(&mut w, "uniqueid", "false")?;
        text_element(&mut w, "dtdversion", DTD_VERSION)?;
        text_element(&mut w, "includewhitespace", "false")?;
        close(&mut w, "control")?;

        open(&mut w, "operation")?;
        open(&mut w, "authentication")?;
        open(&mut w, "login")?;
        text_element(&mut w, "userid", &credentials.user_id)?;
        text_element(&mut w, "companyid", &credentials.company_id)?;
        text_element(&mut w, "password", &credentials.user_password)?;
        if let Some(entity) = &self.entity {
            text_element(&mut w, "locationid", entity.as_str())?;
        }
        close(&mut w, "login")?;
        close(&mut w, "authentication")?;

        open(&mut w, "content")?;
        let mut function = BytesStart::new("function");
        function.push_attribute(("controlid", self.function_control_id.as_str()));
        emit(&mut w, Event::Start(function))?;
        self.write_function_body(&mut w)?;
        close(&mut w, "function")?;
        close(&mut w, "content")?;
        close(&mut w, "operation")?;

        close(&mut w, "request")?;
        String::from_utf8(w.into_inner())
            .map_err(|e| ClientError::Protocol(format!("request encoding failed: {e}")))
    }

    fn write_function_body(&self, w: &mut Writer<Vec<u8>>) -> ClientResult<()> {
        let name = self.function.name();
        open(w, name)?;
        match &self.function {
            Function::Lookup { object } => {
                text_element(w, "object", object)?;
            }
            Function::ReadByQuery {
                object,
                fields,
                query,
                page_size,
            } => {
                text_element(w, "object", object)?;
                text_element(w, "fields", &fields.join(","))?;
                text_element(w, "query", query)?;
                text_element(w, "pagesize", &page_size.to_string())?;
            }
            Function::ReadMore { result_id } => {
                text_element(w, "resultId", result_id)?;
            }
            Function::Read {
                object,
                keys,
                fields,
            } => {
                text_element(w, "object", object)?;
                text_element(w, "keys", &keys.join(","))?;
                text_element(w, "fields", &fields.join(","))?;
            }
            Function::ReadEntityDetails => {}
        }
        close(w, name)
    }
}

fn emit(w: &mut Writer<Vec<u8>>, event: Event<'_>) -> ClientResult<()> {
    w.write_event(event)
        .map_err(|e| ClientError::Protocol(format!("request encoding failed: {e}")))
}

fn open(w: &mut Writer<Vec<u8>>, tag: &str) -> ClientResult<()> {
    emit(w, Event::Start(BytesStart::new(tag)))
}

fn close(w: &mut Writer<Vec<u8>>, tag: &str) -> ClientResult<()> {
    emit(w, Event::End(BytesEnd::new(tag)))
}

fn text_element(w: &mut Writer<Vec<u8>>, tag: &str, value: &str) -> ClientResult<()> {
    open(w, tag)?;
    emit(w, Event::Text(BytesText::new(value)))?;
    close(w, tag)
}
