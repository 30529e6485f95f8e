//! REST client and the `SEND` keyword
//!
//! The client owns a pluggable [`Transport`] for the wire and a
//! [`BodySource`] for named request bodies. Each successful send caches
//! two JSON documents describing the exchange; the JSON path engine
//! resolves assertion paths against those documents.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{debug, error};

use crate::context::{Context, VariableKind};
use crate::error::{AttestError, Result};
use crate::keyword::{Keyword, KeywordCategory};
use crate::report::{ReportType, Reporter};
use crate::statement::Statement;

pub const PROPERTY_URL: &str = "http.url";
pub const PROPERTY_PORT: &str = "http.port";
pub const PROPERTY_ROUTE: &str = "http.route";
pub const PROPERTY_VERB: &str = "http.verb";
pub const PROPERTY_BODY_PREFIX: &str = "http.bodyprefix";

/// Request sent to the system under test
#[derive(Debug, Clone)]
pub struct RequestData {
    url: String,
    verb: String,
    body: String,
}

impl RequestData {
    pub fn new(
        url: impl Into<String>,
        verb: impl Into<String>,
        body: impl Into<String>,
    ) -> RequestData {
        RequestData {
            url: url.into(),
            verb: verb.into(),
            body: body.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Response received for the last sent request
#[derive(Debug, Clone)]
pub struct ResponseData {
    status: u16,
    body: String,
    time_ms: u64,
}

impl ResponseData {
    pub fn new(status: u16, body: impl Into<String>, time_ms: u64) -> ResponseData {
        ResponseData {
            status,
            body: body.into(),
            time_ms,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }
}

/// Wire-level sender behind the REST client
pub trait Transport {
    fn send(&mut self, request: &RequestData) -> Result<ResponseData>;
}

/// HTTP transport with fixed connect and read timeouts
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<HttpTransport> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| AttestError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, request: &RequestData) -> Result<ResponseData> {
        let builder = match request.verb().to_uppercase().as_str() {
            "GET" => self.client.get(request.url()),
            "POST" => self.client.post(request.url()),
            "PUT" => self.client.put(request.url()),
            "DELETE" => self.client.delete(request.url()),
            "PATCH" => self.client.patch(request.url()),
            "HEAD" => self.client.head(request.url()),
            verb => {
                return Err(AttestError::Transport(format!(
                    "Unsupported HTTP verb: {verb}"
                )))
            }
        };

        let started = Instant::now();
        let response = builder
            .header("Content-Type", "application/json")
            .body(request.body().to_string())
            .send()
            .map_err(|e| AttestError::Transport(format!("HTTP request failed: {e}")))?;
        let elapsed = started.elapsed();

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| AttestError::Transport(format!("Failed to read response body: {e}")))?;
        Ok(ResponseData::new(status, body, elapsed.as_millis() as u64))
    }
}

/// Source of named request bodies
pub trait BodySource {
    fn load(&self, name: &str) -> Result<String>;
}

/// Loads request bodies from files under a workspace directory
pub struct WorkspaceSource {
    root: PathBuf,
}

impl WorkspaceSource {
    pub fn new(root: impl Into<PathBuf>) -> WorkspaceSource {
        WorkspaceSource { root: root.into() }
    }
}

impl BodySource for WorkspaceSource {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|e| {
            AttestError::Transport(format!("Failed to read {}: {e}", path.display()))
        })
    }
}

/// Client state shared across statements: the transport, the body source
/// and the documents describing the last exchange
pub struct RestClient {
    transport: Box<dyn Transport>,
    bodies: Box<dyn BodySource>,
    last_request: Option<RequestData>,
    last_response: Option<ResponseData>,
    request_document: Option<Value>,
    response_document: Option<Value>,
}

impl RestClient {
    pub fn new(transport: Box<dyn Transport>, bodies: Box<dyn BodySource>) -> RestClient {
        RestClient {
            transport,
            bodies,
            last_request: None,
            last_response: None,
            request_document: None,
            response_document: None,
        }
    }

    pub fn load_body(&self, name: &str) -> Result<String> {
        self.bodies.load(name)
    }

    /// Send a request and cache the exchange documents. A transport
    /// failure leaves the previous exchange in place.
    pub fn send(&mut self, request: RequestData) -> Result<&ResponseData> {
        debug!("Sending {} request to {}", request.verb(), request.url());
        let response = self.transport.send(&request)?;
        debug!(
            "Received status {} after {} ms",
            response.status(),
            response.time_ms()
        );

        self.request_document = Some(json!({
            "url": request.url(),
            "verb": request.verb(),
            "body": parse_or_string(request.body()),
        }));
        self.response_document = Some(json!({
            "status": response.status(),
            "time_ms": response.time_ms(),
            "body": parse_or_string(response.body()),
        }));
        self.last_request = Some(request);
        Ok(self.last_response.insert(response))
    }

    pub fn last_request(&self) -> Option<&RequestData> {
        self.last_request.as_ref()
    }

    pub fn last_response(&self) -> Option<&ResponseData> {
        self.last_response.as_ref()
    }

    pub fn request_document(&self) -> Option<&Value> {
        self.request_document.as_ref()
    }

    pub fn response_document(&self) -> Option<&Value> {
        self.response_document.as_ref()
    }

    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = transport;
    }

    pub fn set_body_source(&mut self, bodies: Box<dyn BodySource>) {
        self.bodies = bodies;
    }
}

/// Bodies are kept as parsed JSON so assertion paths can traverse them;
/// non-JSON content stays a plain string leaf
fn parse_or_string(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Fill in connection properties the script or caller has not set
pub fn seed_default_properties(ctx: &mut Context) {
    ctx.add_variable_if_absent(VariableKind::Property, PROPERTY_URL, "localhost");
    ctx.add_variable_if_absent(VariableKind::Property, PROPERTY_PORT, "8080");
    ctx.add_variable_if_absent(VariableKind::Property, PROPERTY_ROUTE, "/");
    ctx.add_variable_if_absent(VariableKind::Property, PROPERTY_VERB, "GET");
    ctx.add_variable_if_absent(VariableKind::Property, PROPERTY_BODY_PREFIX, "");
}

/// `SEND`: load the named request body, resolve its content tags and send
/// it to the configured endpoint
pub struct Send;

impl Keyword for Send {
    fn code(&self) -> &str {
        "SEND"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Action
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        let route = ctx.property(PROPERTY_ROUTE);
        let url = format!(
            "http://{}:{}{}{}",
            ctx.property(PROPERTY_URL),
            ctx.property(PROPERTY_PORT),
            if route.starts_with('/') { "" } else { "/" },
            route,
        );

        let node = reporter.node_mut();
        node.set_fallback_title(format!("Send {}", statement.value()));
        node.set_step(format!("Send {} to {url}", statement.value()));

        let name = format!("{}{}", ctx.property(PROPERTY_BODY_PREFIX), statement.value());
        let body = match ctx.rest().load_body(&name) {
            Ok(body) => ctx.resolve(&body),
            Err(err) => {
                error!("Failed to load request body {name}: {err}");
                let node = reporter.node_mut();
                node.set_severity(ReportType::Error);
                node.set_detail(format!("Failed to load request body: {err}"));
                return Ok(false);
            }
        };

        let request = RequestData::new(url, ctx.property(PROPERTY_VERB), body);
        if let Err(err) = ctx.rest_mut().send(request) {
            error!("Failed to send request: {err}");
            let node = reporter.node_mut();
            node.set_severity(ReportType::Error);
            node.set_detail(format!("Failed to send request: {err}"));
            return Ok(false);
        }

        let mut attachments = Vec::new();
        if let Some(request) = ctx.rest().last_request() {
            attachments.push(("request.json", request.body().to_string()));
        }
        if let Some(response) = ctx.rest().last_response() {
            attachments.push(("response.json", response.body().to_string()));
            attachments.push(("time_ms", response.time_ms().to_string()));
        }

        let node = reporter.node_mut();
        node.set_severity(ReportType::Info);
        for (name, content) in attachments {
            node.attach(name, content);
        }
        Ok(true)
    }
}

/// All REST client keywords
pub fn keywords() -> Vec<std::rc::Rc<dyn Keyword>> {
    vec![std::rc::Rc::new(Send)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::KeywordSet;
    use crate::report::ReportTree;
    use crate::statement::Script;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CannedTransport {
        status: u16,
        body: String,
        requests: Rc<RefCell<Vec<RequestData>>>,
    }

    impl CannedTransport {
        fn new(status: u16, body: &str) -> (CannedTransport, Rc<RefCell<Vec<RequestData>>>) {
            let requests = Rc::new(RefCell::new(Vec::new()));
            let transport = CannedTransport {
                status,
                body: body.to_string(),
                requests: Rc::clone(&requests),
            };
            (transport, requests)
        }
    }

    impl Transport for CannedTransport {
        fn send(&mut self, request: &RequestData) -> Result<ResponseData> {
            self.requests.borrow_mut().push(request.clone());
            Ok(ResponseData::new(self.status, self.body.clone(), 12))
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&mut self, _request: &RequestData) -> Result<ResponseData> {
            Err(AttestError::Transport("connection refused".to_string()))
        }
    }

    struct MapSource {
        bodies: Vec<(String, String)>,
    }

    impl MapSource {
        fn new(bodies: &[(&str, &str)]) -> MapSource {
            MapSource {
                bodies: bodies
                    .iter()
                    .map(|(name, body)| (name.to_string(), body.to_string()))
                    .collect(),
            }
        }
    }

    impl BodySource for MapSource {
        fn load(&self, name: &str) -> Result<String> {
            self.bodies
                .iter()
                .find(|(known, _)| known == name)
                .map(|(_, body)| body.clone())
                .ok_or_else(|| AttestError::Transport(format!("Failed to read {name}")))
        }
    }

    fn send_statement(ctx: &mut Context, tree: &mut ReportTree, value: &str) -> Result<bool> {
        let mut keywords = KeywordSet::new();
        keywords.extend(super::keywords());
        let mut script = Script::parse(&keywords, &format!("SEND {value}"));
        let statement = script.next().unwrap();

        let node = tree.create_sub_report(tree.root(), ReportType::Info, "", "", "");
        let mut reporter = Reporter::new(tree, node);
        statement.keyword().handle(ctx, &mut reporter, &statement)
    }

    #[test]
    fn test_send_caches_exchange_documents() {
        let (transport, requests) = CannedTransport::new(200, r#"{"user": {"name": "Alice"}}"#);
        let source = MapSource::new(&[("order.json", r#"{"item": "book"}"#)]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);

        let mut tree = ReportTree::new("run");
        let handled = send_statement(&mut ctx, &mut tree, "order.json").unwrap();
        assert!(handled);

        let sent = requests.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url(), "http://localhost:8080/");
        assert_eq!(sent[0].verb(), "GET");
        assert_eq!(sent[0].body(), r#"{"item": "book"}"#);

        let response = ctx.response_document().unwrap();
        assert_eq!(response["status"], json!(200));
        assert_eq!(response["body"]["user"]["name"], json!("Alice"));

        let request = ctx.request_document().unwrap();
        assert_eq!(request["verb"], json!("GET"));
        assert_eq!(request["body"]["item"], json!("book"));
    }

    #[test]
    fn test_send_resolves_tags_in_body() {
        let (transport, requests) = CannedTransport::new(200, "{}");
        let source = MapSource::new(&[("order.json", r#"{"user": "${var.name}"}"#)]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);
        ctx.add_variable(VariableKind::Variable, "name", "Ada");

        let mut tree = ReportTree::new("run");
        send_statement(&mut ctx, &mut tree, "order.json").unwrap();

        assert_eq!(requests.borrow()[0].body(), r#"{"user": "Ada"}"#);
    }

    #[test]
    fn test_send_applies_body_prefix_and_route() {
        let (transport, requests) = CannedTransport::new(200, "{}");
        let source = MapSource::new(&[("requests/order.json", "{}")]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);
        ctx.add_variable(VariableKind::Property, PROPERTY_BODY_PREFIX, "requests/");
        ctx.add_variable(VariableKind::Property, PROPERTY_ROUTE, "order");
        ctx.add_variable(VariableKind::Property, PROPERTY_VERB, "POST");

        let mut tree = ReportTree::new("run");
        let handled = send_statement(&mut ctx, &mut tree, "order.json").unwrap();
        assert!(handled);

        let sent = requests.borrow();
        assert_eq!(sent[0].url(), "http://localhost:8080/order");
        assert_eq!(sent[0].verb(), "POST");
    }

    #[test]
    fn test_send_reports_statement_entry() {
        let (transport, _requests) = CannedTransport::new(200, r#"{"ok": true}"#);
        let source = MapSource::new(&[("order.json", r#"{"item": 1}"#)]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);

        let mut tree = ReportTree::new("run");
        send_statement(&mut ctx, &mut tree, "order.json").unwrap();

        let node = tree.node(tree.node(tree.root()).children()[0]);
        assert_eq!(node.severity(), ReportType::Info);
        assert_eq!(node.display_title(), "Send order.json");
        assert_eq!(node.step(), "Send order.json to http://localhost:8080/");
        assert_eq!(
            node.attachments().get("request.json").map(String::as_str),
            Some(r#"{"item": 1}"#)
        );
        assert_eq!(
            node.attachments().get("response.json").map(String::as_str),
            Some(r#"{"ok": true}"#)
        );
        assert_eq!(
            node.attachments().get("time_ms").map(String::as_str),
            Some("12")
        );
    }

    #[test]
    fn test_missing_body_reports_error_and_continues() {
        let (transport, requests) = CannedTransport::new(200, "{}");
        let source = MapSource::new(&[]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);

        let mut tree = ReportTree::new("run");
        let handled = send_statement(&mut ctx, &mut tree, "missing.json").unwrap();
        assert!(!handled);
        assert!(requests.borrow().is_empty());

        let node = tree.node(tree.node(tree.root()).children()[0]);
        assert_eq!(node.severity(), ReportType::Error);
        assert!(node.detail().starts_with("Failed to load request body"));
    }

    #[test]
    fn test_transport_failure_keeps_previous_exchange() {
        let (transport, _requests) = CannedTransport::new(200, r#"{"round": 1}"#);
        let source = MapSource::new(&[("a.json", "{}")]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);

        let mut tree = ReportTree::new("run");
        send_statement(&mut ctx, &mut tree, "a.json").unwrap();
        assert!(ctx.response_document().is_some());

        ctx.rest_mut().set_transport(Box::new(FailingTransport));
        let handled = send_statement(&mut ctx, &mut tree, "a.json").unwrap();
        assert!(!handled);

        let node = tree.node(tree.node(tree.root()).children()[1]);
        assert_eq!(node.severity(), ReportType::Error);
        assert!(node.detail().starts_with("Failed to send request"));

        let response = ctx.response_document().unwrap();
        assert_eq!(response["body"]["round"], json!(1));
    }

    #[test]
    fn test_non_json_body_kept_as_string_leaf() {
        let (transport, _requests) = CannedTransport::new(503, "Service Unavailable");
        let source = MapSource::new(&[("ping.json", "ping")]);
        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(source)));
        seed_default_properties(&mut ctx);

        let mut tree = ReportTree::new("run");
        send_statement(&mut ctx, &mut tree, "ping.json").unwrap();

        let response = ctx.response_document().unwrap();
        assert_eq!(response["status"], json!(503));
        assert_eq!(response["body"], json!("Service Unavailable"));
    }

    #[test]
    fn test_seed_defaults_do_not_override() {
        let (transport, _requests) = CannedTransport::new(200, "{}");
        let mut ctx = Context::new(RestClient::new(
            Box::new(transport),
            Box::new(MapSource::new(&[])),
        ));
        ctx.add_variable(VariableKind::Property, PROPERTY_PORT, "9000");
        seed_default_properties(&mut ctx);

        assert_eq!(ctx.property(PROPERTY_PORT), "9000");
        assert_eq!(ctx.property(PROPERTY_URL), "localhost");
    }
}
