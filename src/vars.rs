//! Keywords that manage variables and test metadata

use std::rc::Rc;
use std::thread;
use std::time::Duration;

use tracing::{error, trace};

use crate::context::{Context, VariableKind};
use crate::error::Result;
use crate::keyword::{Keyword, KeywordCategory};
use crate::report::{ReportType, Reporter};
use crate::split::split_quote_aware;
use crate::statement::Statement;

/// `DESC`: set the test description property
pub struct Desc;

impl Keyword for Desc {
    fn code(&self) -> &str {
        "DESC"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::NoImpact
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        ctx.add_variable(VariableKind::Property, "desc", statement.value());

        let node = reporter.node_mut();
        node.set_severity(ReportType::Trace);
        node.set_fallback_title(format!("Set test description to: {}", statement.value()));
        node.set_detail(format!(
            "Create property variable \"desc\" with value \"{}\"",
            statement.value()
        ));
        Ok(true)
    }
}

/// `ID`: set the test identifier property
pub struct Id;

impl Keyword for Id {
    fn code(&self) -> &str {
        "ID"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::NoImpact
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        ctx.add_variable(VariableKind::Property, "id", statement.value());

        let node = reporter.node_mut();
        node.set_severity(ReportType::Trace);
        node.set_fallback_title(format!("Set test ID to: {}", statement.value()));
        node.set_detail(format!(
            "Create property variable \"id\" with value \"{}\"",
            statement.value()
        ));
        Ok(true)
    }
}

/// `CUSTOM_VARIABLE`: store literal values as variables, one or more
/// `key=value` entries per statement
pub struct CustomVariable;

impl Keyword for CustomVariable {
    fn code(&self) -> &str {
        "CUSTOM_VARIABLE"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Utility
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        let node = reporter.node_mut();
        node.set_severity(ReportType::Info);
        node.set_fallback_title("Create custom variable");

        let resolved = ctx.resolve(statement.value());
        for entry in split_quote_aware(&resolved, ' ', true) {
            let parts = split_quote_aware(&entry, '=', true);
            if parts.len() != 2 {
                error!(
                    "Invalid number of parameters (should be 2) for custom variable: {}",
                    statement.value()
                );
                continue;
            }

            ctx.add_variable(VariableKind::Variable, &parts[0], &parts[1]);
            trace!(
                "Stored custom variable with key \"{}\" and value \"{}\"",
                parts[0],
                parts[1]
            );
            reporter.sub_report(
                ReportType::Info,
                &entry,
                &format!(
                    "Store variable \"{}\" with custom value \"{}\"",
                    parts[0], parts[1]
                ),
                &format!(
                    "Create custom variable \"{}\" with value \"{}\"",
                    parts[0], parts[1]
                ),
            );
        }
        Ok(true)
    }
}

/// `REQUEST_VARIABLE`: store values from the last request document,
/// `key=jsonPath` entries
pub struct RequestVariable;

impl Keyword for RequestVariable {
    fn code(&self) -> &str {
        "REQUEST_VARIABLE"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Utility
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        let node = reporter.node_mut();
        node.set_severity(ReportType::Info);
        node.set_fallback_title("Create variable from request");

        store_path_variables(ctx, reporter, statement, PathOrigin::Request);
        Ok(true)
    }
}

/// `RESPONSE_VARIABLE`: store values from the last response document,
/// `key=jsonPath` entries
pub struct ResponseVariable;

impl Keyword for ResponseVariable {
    fn code(&self) -> &str {
        "RESPONSE_VARIABLE"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Utility
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        let node = reporter.node_mut();
        node.set_severity(ReportType::Info);
        node.set_fallback_title("Create variable from response");

        store_path_variables(ctx, reporter, statement, PathOrigin::Response);
        Ok(true)
    }
}

#[derive(Clone, Copy)]
enum PathOrigin {
    Request,
    Response,
}

impl PathOrigin {
    fn tag(&self, path: &str) -> String {
        match self {
            PathOrigin::Request => format!("json.request.{path}"),
            PathOrigin::Response => format!("json.{path}"),
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            PathOrigin::Request => "request",
            PathOrigin::Response => "response",
        }
    }
}

fn store_path_variables(
    ctx: &mut Context,
    reporter: &mut Reporter<'_>,
    statement: &Statement,
    origin: PathOrigin,
) {
    let resolved = ctx.resolve(statement.value());
    for entry in split_quote_aware(&resolved, ' ', true) {
        let parts = split_quote_aware(&entry, '=', true);
        if parts.len() != 2 {
            error!(
                "Invalid number of parameters (should be 2) for {} variable: {}",
                origin.noun(),
                statement.value()
            );
            continue;
        }

        let path_value = ctx.content_value(&origin.tag(&parts[1]), false);
        if path_value.is_empty() {
            error!(
                "No JSON value found for {} variable: {}",
                origin.noun(),
                statement.value()
            );
            continue;
        }

        ctx.add_variable(VariableKind::Variable, &parts[0], &path_value);
        trace!(
            "Stored {} variable with key \"{}\" and value \"{}\"",
            origin.noun(),
            parts[0],
            path_value
        );
        reporter.sub_report(
            ReportType::Info,
            &entry,
            &format!(
                "Store variable \"{}\" with {} value at path \"{}\". Value at path is: {}",
                parts[0],
                origin.noun(),
                parts[1],
                path_value
            ),
            &format!(
                "Create variable \"{}\" with {} value from path \"{}\"",
                parts[0],
                origin.noun(),
                parts[1]
            ),
        );
    }
}

/// `SLEEP`: pause the run for the given number of milliseconds
pub struct Sleep;

impl Keyword for Sleep {
    fn code(&self) -> &str {
        "SLEEP"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Utility
    }

    fn handle(
        &self,
        _ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        let node = reporter.node_mut();
        node.set_fallback_title(format!("Wait for {} milliseconds", statement.value()));
        node.set_step(format!("Wait for {} milliseconds", statement.value()));

        let duration: u64 = match statement.value().parse() {
            Ok(duration) => duration,
            Err(_) => {
                node.set_severity(ReportType::Error);
                node.set_detail(format!(
                    "Failed to convert value to duration: {}",
                    statement.value()
                ));
                return Ok(false);
            }
        };

        thread::sleep(Duration::from_millis(duration));
        Ok(true)
    }
}

/// All variable and metadata keywords
pub fn keywords() -> Vec<Rc<dyn Keyword>> {
    vec![
        Rc::new(RequestVariable),
        Rc::new(ResponseVariable),
        Rc::new(CustomVariable),
        Rc::new(Id),
        Rc::new(Desc),
        Rc::new(Sleep),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttestError;
    use crate::http::{BodySource, RequestData, ResponseData, RestClient, Transport};
    use crate::keyword::KeywordSet;
    use crate::report::ReportTree;
    use crate::statement::Script;
    use pretty_assertions::assert_eq;

    struct CannedTransport;

    impl Transport for CannedTransport {
        fn send(&mut self, _request: &RequestData) -> Result<ResponseData> {
            Ok(ResponseData::new(
                201,
                r#"{"order": {"id": "A-17", "total": 42}}"#,
                3,
            ))
        }
    }

    struct NoBodies;

    impl BodySource for NoBodies {
        fn load(&self, name: &str) -> Result<String> {
            Err(AttestError::Transport(format!("no body source for {name}")))
        }
    }

    fn test_context() -> Context {
        Context::new(RestClient::new(Box::new(CannedTransport), Box::new(NoBodies)))
    }

    fn context_with_exchange() -> Context {
        let mut ctx = test_context();
        ctx.rest_mut()
            .send(RequestData::new(
                "http://localhost:8080/order",
                "POST",
                r#"{"item": "book", "count": 2}"#,
            ))
            .unwrap();
        ctx
    }

    fn handle(ctx: &mut Context, tree: &mut ReportTree, text: &str) -> Result<bool> {
        let mut keywords = KeywordSet::new();
        keywords.extend(super::keywords());
        let mut script = Script::parse(&keywords, text);
        let statement = script.next().unwrap();

        let node = tree.create_sub_report(tree.root(), ReportType::Info, "", "", "");
        let mut reporter = Reporter::new(tree, node);
        statement.keyword().handle(ctx, &mut reporter, &statement)
    }

    fn statement_node(tree: &ReportTree, index: usize) -> &crate::report::ReportNode {
        tree.node(tree.node(tree.root()).children()[index])
    }

    #[test]
    fn test_desc_stores_property() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "DESC Check the order flow").unwrap();

        assert_eq!(ctx.property("desc"), "Check the order flow");
        let node = statement_node(&tree, 0);
        assert_eq!(node.severity(), ReportType::Trace);
        assert_eq!(node.display_title(), "Set test description to: Check the order flow");
        assert_eq!(
            node.detail(),
            "Create property variable \"desc\" with value \"Check the order flow\""
        );
    }

    #[test]
    fn test_id_stores_property() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "ID ORDER-001").unwrap();

        assert_eq!(ctx.property("id"), "ORDER-001");
        assert_eq!(
            statement_node(&tree, 0).display_title(),
            "Set test ID to: ORDER-001"
        );
    }

    #[test]
    fn test_custom_variable_stores_entries() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "CUSTOM_VARIABLE name=Ada role=admin").unwrap();

        assert_eq!(ctx.resolve("${var.name}"), "Ada");
        assert_eq!(ctx.resolve("${var.role}"), "admin");

        let node = statement_node(&tree, 0);
        assert_eq!(node.children().len(), 2);
        let first = tree.node(node.children()[0]);
        assert_eq!(first.title(), "name=Ada");
        assert_eq!(first.detail(), "Store variable \"name\" with custom value \"Ada\"");
        assert_eq!(first.step(), "Create custom variable \"name\" with value \"Ada\"");
    }

    #[test]
    fn test_custom_variable_quoted_value_keeps_spaces() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, r#"CUSTOM_VARIABLE greeting="hello world""#).unwrap();

        assert_eq!(ctx.resolve("${var.greeting}"), "hello world");
    }

    #[test]
    fn test_custom_variable_invalid_entry_skipped() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "CUSTOM_VARIABLE loneword name=Ada").unwrap();

        assert_eq!(ctx.resolve("${var.name}"), "Ada");
        assert_eq!(statement_node(&tree, 0).children().len(), 1);
    }

    #[test]
    fn test_response_variable_reads_last_response() {
        let mut ctx = context_with_exchange();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "RESPONSE_VARIABLE orderId=body.order.id").unwrap();

        assert_eq!(ctx.resolve("${var.orderId}"), "A-17");
        let sub = tree.node(statement_node(&tree, 0).children()[0]);
        assert_eq!(
            sub.detail(),
            "Store variable \"orderId\" with response value at path \"body.order.id\". Value at path is: A-17"
        );
        assert_eq!(
            sub.step(),
            "Create variable \"orderId\" with response value from path \"body.order.id\""
        );
    }

    #[test]
    fn test_request_variable_reads_last_request() {
        let mut ctx = context_with_exchange();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "REQUEST_VARIABLE item=body.item").unwrap();

        assert_eq!(ctx.resolve("${var.item}"), "book");
    }

    #[test]
    fn test_response_variable_missing_path_stores_nothing() {
        let mut ctx = context_with_exchange();
        let mut tree = ReportTree::new("run");
        handle(&mut ctx, &mut tree, "RESPONSE_VARIABLE missing=body.nothing").unwrap();

        assert_eq!(ctx.resolve("${var.missing}"), "var.missing");
        assert!(statement_node(&tree, 0).children().is_empty());
    }

    #[test]
    fn test_sleep_rejects_bad_duration() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        let handled = handle(&mut ctx, &mut tree, "SLEEP soon").unwrap();

        assert!(!handled);
        let node = statement_node(&tree, 0);
        assert_eq!(node.severity(), ReportType::Error);
        assert_eq!(node.detail(), "Failed to convert value to duration: soon");
        assert_eq!(node.step(), "Wait for soon milliseconds");
    }

    #[test]
    fn test_sleep_waits_and_reports() {
        let mut ctx = test_context();
        let mut tree = ReportTree::new("run");
        let handled = handle(&mut ctx, &mut tree, "SLEEP 1").unwrap();

        assert!(handled);
        assert_eq!(
            statement_node(&tree, 0).display_title(),
            "Wait for 1 milliseconds"
        );
    }
}
