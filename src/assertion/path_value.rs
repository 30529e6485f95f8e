//! Shared driver for path-to-value comparison keywords
//!
//! Every comparison keyword works on the same statement shape: entries
//! separated by unquoted spaces, each entry an `=`-delimited expression
//! whose first part is a JSON path. The driver owns splitting, path
//! resolution, mode selection and result recording; a [`PathAssertion`]
//! only decides what counts as a match and how to phrase it.

use tracing::error;

use crate::context::Context;
use crate::json_path;
use crate::report::{ReportType, Reporter};
use crate::split::split_quote_aware;

use super::range::value_in_range;
use super::result::AssertionResult;

/// Result phrasings a comparison keyword can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Pass,
    Fail,
    CountPass,
    CountFail,
}

/// Comparison semantics of one assertion keyword
pub trait PathAssertion {
    /// Keyword code, recorded with each result
    fn code(&self) -> &str;

    /// JSON path part of a split expression
    fn path_from_expression<'a>(&self, expression: &'a [String]) -> Option<&'a str>;

    /// Whether one resolved value satisfies the expression. `path` is the
    /// concrete pointer path the value came from.
    fn check(&self, expression: &[String], actual: &str, path: &str) -> bool;

    /// Reproduction step for the expression, independent of its result
    fn step_description(&self, expression: &[String]) -> String;

    /// Result phrasing for one comparison. In count mode `actual` carries
    /// the tallied count instead of a resolved value.
    fn result_description(
        &self,
        kind: ResultKind,
        expression: &[String],
        actual: &str,
        path: &str,
    ) -> String;
}

/// Expression part by index, empty when the expression is too short
pub(super) fn part(expression: &[String], index: usize) -> &str {
    expression.get(index).map(String::as_str).unwrap_or_default()
}

/// Evaluate a comparison statement value: resolve tags, split entries and
/// record one result per comparison into both the engine tally and the
/// report tree.
pub fn evaluate(
    assertion: &dyn PathAssertion,
    ctx: &mut Context,
    reporter: &mut Reporter<'_>,
    value: &str,
) {
    let resolved = ctx.resolve(value);

    for entry in split_quote_aware(&resolved, ' ', false) {
        let expression = split_quote_aware(&entry, '=', true);

        let Some(path) = assertion.path_from_expression(&expression) else {
            error!("Failed to retrieve path from expression parts: {expression:?}");
            record(
                assertion,
                ctx,
                reporter,
                false,
                &format!("Failed to retrieve path for expression: {entry}"),
                &assertion.step_description(&expression),
                &entry,
            );
            continue;
        };
        let path = path.to_string();
        let step = assertion.step_description(&expression);

        let Some(values) = json_path::resolve_values(ctx, &path) else {
            record(
                assertion,
                ctx,
                reporter,
                false,
                &format!("Failed to retrieve values for JSON path: {path}"),
                &step,
                &entry,
            );
            continue;
        };

        match expression.len() {
            // One comparison per resolved value
            2 => {
                if values.is_empty() {
                    record(
                        assertion,
                        ctx,
                        reporter,
                        false,
                        &format!("Failed to retrieve any value for JSON path: {path}"),
                        &step,
                        &entry,
                    );
                }
                for (value_path, actual) in &values {
                    let pass = assertion.check(&expression, actual, value_path);
                    let kind = if pass { ResultKind::Pass } else { ResultKind::Fail };
                    let description =
                        assertion.result_description(kind, &expression, actual, value_path);
                    record(assertion, ctx, reporter, pass, &description, &step, &entry);
                }
            }
            // Count matches, then compare the count against a range spec
            3 => {
                if values.is_empty() {
                    record(
                        assertion,
                        ctx,
                        reporter,
                        false,
                        &format!("Failed to retrieve any value for JSON path: {path}"),
                        &step,
                        &entry,
                    );
                    continue;
                }
                let count = values
                    .iter()
                    .filter(|(value_path, actual)| {
                        assertion.check(&expression, actual, value_path)
                    })
                    .count();
                let pass = value_in_range(part(&expression, 2), count as f64);
                let kind = if pass {
                    ResultKind::CountPass
                } else {
                    ResultKind::CountFail
                };
                let description = assertion.result_description(
                    kind,
                    &expression,
                    &count.to_string(),
                    &path,
                );
                record(assertion, ctx, reporter, pass, &description, &step, &entry);
            }
            _ => record(
                assertion,
                ctx,
                reporter,
                false,
                "Failed to assert expression due to invalid format",
                "Failed to assert expression",
                &entry,
            ),
        }
    }
}

/// Shared handler for comparison keywords: anchor the statement's entry
/// under the open assertion group, then evaluate its expressions. The
/// entry merges with its result when only one comparison ran.
pub(crate) fn run_comparison(
    assertion: &dyn PathAssertion,
    ctx: &mut Context,
    reporter: &mut Reporter<'_>,
    value: &str,
) -> crate::error::Result<bool> {
    ctx.assertion_mut().anchor(reporter);

    let node = reporter.node_mut();
    node.set_fallback_title(assertion.code());
    node.set_step("Perform assertions");
    node.set_auto_merge(true);

    evaluate(assertion, ctx, reporter, value);
    Ok(true)
}

/// Record one outcome: engine tally plus a PASS/FAIL node under the
/// statement. Failures carry the reproduction trail in their detail.
fn record(
    assertion: &dyn PathAssertion,
    ctx: &mut Context,
    reporter: &mut Reporter<'_>,
    pass: bool,
    description: &str,
    step: &str,
    entry: &str,
) {
    ctx.assertion_mut()
        .record(AssertionResult::new(assertion.code(), pass, description));

    let severity = if pass { ReportType::Pass } else { ReportType::Fail };
    let node = reporter.sub_report(severity, entry, description, step);

    if !pass {
        let trail = reporter.tree().reproduction_trail();
        reporter
            .tree_mut()
            .node_mut(node)
            .set_detail(format!("{description}\n\n{trail}"));
    }
}
