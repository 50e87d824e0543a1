use intacct_client::{
    ClientConfig, ClientError, Credentials, IntacctApi, IntacctClient, QueryResult, RetryConfig,
    parse_document,
};
use intacct_types::EntityId;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials {
        sender_id: "sender".into(),
        sender_password: "sender-pass".into(),
        user_id: "user".into(),
        company_id: "company".into(),
        user_password: "user-pass".into(),
    }
}

fn mock_client(server: &MockServer) -> IntacctClient {
    let config = ClientConfig::new(credentials())
        .with_api_url(format!("{}/ia/xml/xmlgw.phtml", server.uri()))
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryConfig::new(4).with_initial_delay(Duration::from_millis(1)));
    IntacctClient::new(config).unwrap()
}

fn ok_response(result: &str) -> String {
    format!(
        "<response>\
           <control><status>success</status></control>\
           <operation>\
             <authentication><status>success</status></authentication>\
             {result}\
           </operation>\
         </response>"
    )
}

fn gateway() -> MockBuilder {
    Mock::given(method("POST")).and(path("/ia/xml/xmlgw.phtml"))
}

// ── Config defaults ──────────────────────────────────────────────

#[test]
fn default_retry_budget() {
    let retry = RetryConfig::default();
    assert_eq!(retry.max_attempts, 4);
    assert_eq!(retry.delay_for_attempt(0), Duration::from_secs(1));
    assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(2));
    assert_eq!(retry.delay_for_attempt(3), Duration::from_secs(8));
}

#[test]
fn default_client_config() {
    let config = ClientConfig::new(credentials());
    assert_eq!(config.api_url, intacct_client::DEFAULT_API_URL);
    assert_eq!(config.timeout, Duration::from_secs(60));
}

#[test]
fn no_retry_has_single_attempt() {
    assert_eq!(RetryConfig::no_retry().max_attempts, 1);
}

// ── Queries ──────────────────────────────────────────────────────

#[tokio::test]
async fn read_by_query_parses_result_metadata() {
    let server = MockServer::start().await;
    gateway()
        .and(header("content-type", "application/xml"))
        .and(body_string_contains("<readByQuery>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status>\
               <data><GLACCOUNT><RECORDNO>1</RECORDNO></GLACCOUNT></data>\
               <resultId>abc</resultId><numremaining>5</numremaining>\
             </result>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let result = client
        .read_by_query("GLACCOUNT", &["*"], "RECORDNO > 0", 10, None)
        .await
        .unwrap();

    assert_eq!(
        result,
        QueryResult {
            records: vec![json!({"RECORDNO": "1"}).as_object().cloned().unwrap()],
            result_id: Some("abc".into()),
            num_remaining: 5,
        }
    );
}

#[tokio::test]
async fn entity_override_is_sent() {
    let server = MockServer::start().await;
    gateway()
        .and(body_string_contains("<locationid>E7</locationid>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data/></result>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    client
        .read_by_query("CUSTOMER", &["*"], "RECORDNO > 0", 10, Some(&EntityId::from("E7")))
        .await
        .unwrap();
}

#[tokio::test]
async fn read_more_keeps_token_when_response_omits_it() {
    let server = MockServer::start().await;
    gateway()
        .and(body_string_contains("<resultId>abc</resultId>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status>\
               <data><GLACCOUNT><RECORDNO>2</RECORDNO></GLACCOUNT></data>\
               <numremaining>0</numremaining>\
             </result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let page = client.read_more("abc", None).await.unwrap();
    assert_eq!(page.result_id.as_deref(), Some("abc"));
    assert_eq!(page.num_remaining, 0);
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn read_returns_full_records() {
    let server = MockServer::start().await;
    gateway()
        .and(body_string_contains("<keys>42</keys>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data>\
               <ARINVOICE><RECORDNO>42</RECORDNO>\
                 <ARINVOICEITEMS><arinvoiceitem><LINE_NO>1</LINE_NO></arinvoiceitem></ARINVOICEITEMS>\
               </ARINVOICE>\
             </data></result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let records = client.read("ARINVOICE", &["42"], &["*"], None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("ARINVOICEITEMS"),
        Some(&json!({"arinvoiceitem": {"LINE_NO": "1"}}))
    );
}

#[tokio::test]
async fn lookup_returns_first_record_or_empty() {
    let server = MockServer::start().await;
    gateway()
        .and(body_string_contains("<lookup>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data>\
               <Type Name=\"CUSTOMER\"><Fields>\
                 <Field><ID>RECORDNO</ID><DATATYPE>INTEGER</DATATYPE></Field>\
               </Fields></Type>\
             </data></result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let lookup = client.lookup("CUSTOMER", None).await.unwrap();
    assert!(lookup.contains_key("Fields"));
}

#[tokio::test]
async fn read_entity_details_dedupes_and_sorts() {
    let server = MockServer::start().await;
    gateway()
        .and(body_string_contains("<readEntityDetails>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data>\
               <entity><LOCATIONID>E2</LOCATIONID></entity>\
               <entity><ENTITYID>E1</ENTITYID><LOCATIONID>X</LOCATIONID></entity>\
               <entity><ID>E2</ID></entity>\
               <entity><NAME>no id</NAME></entity>\
             </data></result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let ids = client.read_entity_details().await.unwrap();
    assert_eq!(ids, vec![EntityId::from("E1"), EntityId::from("E2")]);
}

#[tokio::test]
async fn each_call_uses_fresh_control_id() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data/></result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    client.lookup("CUSTOMER", None).await.unwrap();
    client.lookup("CUSTOMER", None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let ids: Vec<String> = requests
        .iter()
        .map(|r| {
            let root = parse_document(std::str::from_utf8(&r.body).unwrap()).unwrap();
            root.text_at("control/controlid").unwrap().to_string()
        })
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

// ── Retry & classification ───────────────────────────────────────

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    gateway()
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data><X><RECORDNO>1</RECORDNO></X></data></result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let page = client
        .read_by_query("X", &["*"], "RECORDNO > 0", 1, None)
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn retry_budget_exhaustion_surfaces_transient_error() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = client.lookup("CUSTOMER", None).await.unwrap_err();
    assert!(matches!(err, ClientError::Transient(ref m) if m == "HTTP 500 for lookup"));
}

#[tokio::test]
async fn business_unavailable_is_retried() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>failure</status><errormessage><error>\
               <description2>Service temporarily unavailable</description2>\
             </error></errormessage></result>",
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    gateway()
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>success</status><data/></result>",
        )))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    assert!(client.lookup("CUSTOMER", None).await.is_ok());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn client_errors_fail_immediately() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = client.lookup("CUSTOMER", None).await.unwrap_err();
    match err {
        ClientError::Http { status, function, body } => {
            assert_eq!(status, 403);
            assert_eq!(function, "lookup");
            assert_eq!(body, "forbidden");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn auth_failure_raises_auth_error_without_retry() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<response>\
               <control><status>success</status></control>\
               <operation>\
                 <authentication>\
                   <status>failure</status>\
                   <errormessage><error><description2>Invalid login</description2></error></errormessage>\
                 </authentication>\
               </operation>\
             </response>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = client
        .read_by_query("GLACCOUNT", &["*"], "RECORDNO > 0", 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Auth(ref m) if m == "Invalid login"));
}

#[tokio::test]
async fn permission_failure_is_not_retried() {
    let server = MockServer::start().await;
    gateway()
        .respond_with(ResponseTemplate::new(200).set_body_string(ok_response(
            "<result><status>failure</status><errormessage><error>\
               <errorno>WSP001</errorno><description2>Access denied</description2>\
             </error></errormessage></result>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let err = client.lookup("GLDETAIL", None).await.unwrap_err();
    assert!(err.is_permission());
}

#[tokio::test]
async fn connection_failure_is_transient() {
    let config = ClientConfig::new(credentials())
        .with_api_url("http://127.0.0.1:9/unreachable")
        .with_timeout(Duration::from_secs(2))
        .with_retry(RetryConfig::new(2).with_initial_delay(Duration::from_millis(1)));
    let client = IntacctClient::new(config).unwrap();
    let err = client.lookup("CUSTOMER", None).await.unwrap_err();
    assert!(err.is_transient());
}

/// Serves `truncated` connections whose body ends before its declared
/// length, then answers every later connection with `full_body`.
async fn truncating_server(truncated: usize, full_body: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/ia/xml/xmlgw.phtml", listener.local_addr().unwrap());
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !String::from_utf8_lossy(&request).contains("</request>") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let index = counter.fetch_add(1, Ordering::SeqCst);
            let reply = if index < truncated {
                "HTTP/1.1 200 OK\r\nContent-Type: application/xml\r\n\
                 Content-Length: 4096\r\n\r\n<response><control>"
                    .to_string()
            } else {
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/xml\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    full_body.len(),
                    full_body
                )
            };
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (url, served)
}

fn client_for(url: String, attempts: u32) -> IntacctClient {
    let config = ClientConfig::new(credentials())
        .with_api_url(url)
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryConfig::new(attempts).with_initial_delay(Duration::from_millis(1)));
    IntacctClient::new(config).unwrap()
}

#[tokio::test]
async fn body_cut_off_after_headers_is_transient() {
    let (url, served) = truncating_server(usize::MAX, String::new()).await;

    let err = client_for(url, 1).lookup("CUSTOMER", None).await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.is_transient());
    assert_eq!(served.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn body_cut_off_after_headers_is_retried() {
    let full = ok_response(
        "<result><status>success</status><data>\
           <Type Name=\"CUSTOMER\"><Fields>\
             <Field><ID>RECORDNO</ID><DATATYPE>INTEGER</DATATYPE></Field>\
           </Fields></Type>\
         </data></result>",
    );
    let (url, served) = truncating_server(1, full).await;

    let lookup = client_for(url, 3).lookup("CUSTOMER", None).await.unwrap();

    assert!(lookup.contains_key("Fields"));
    assert_eq!(served.load(Ordering::SeqCst), 2);
}
