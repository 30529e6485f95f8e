//! Comparison keywords built on the path-to-value driver

use regex::Regex;
use tracing::error;

use crate::context::Context;
use crate::error::Result;
use crate::keyword::{Keyword, KeywordCategory};
use crate::report::Reporter;
use crate::statement::Statement;

use super::path_value::{part, run_comparison, PathAssertion, ResultKind};
use super::range::value_in_range;

/// `EQUAL`: value at a JSON path matches the expected text. The expected
/// value `*` accepts anything.
pub struct AssertEqual;

impl PathAssertion for AssertEqual {
    fn code(&self) -> &str {
        "EQUAL"
    }

    fn path_from_expression<'a>(&self, expression: &'a [String]) -> Option<&'a str> {
        expression.first().map(String::as_str)
    }

    fn check(&self, expression: &[String], actual: &str, _path: &str) -> bool {
        let expected = part(expression, 1);
        expected == "*" || expected == actual
    }

    fn step_description(&self, expression: &[String]) -> String {
        format!(
            "Assert that value at \"{}\" is equal to \"{}\"",
            part(expression, 0),
            part(expression, 1)
        )
    }

    fn result_description(
        &self,
        kind: ResultKind,
        expression: &[String],
        actual: &str,
        path: &str,
    ) -> String {
        let base = part(expression, 0);
        match kind {
            ResultKind::Pass => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") is equal to expected"
            ),
            ResultKind::Fail => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") is not equal to expected value \"{}\"",
                part(expression, 1)
            ),
            ResultKind::CountPass => {
                format!("Count of value \"{actual}\" at path \"{base}\" is equal to expected")
            }
            ResultKind::CountFail => format!(
                "Count of value \"{actual}\" at path \"{base}\" is {actual} and is not equal to expected range \"{}\"",
                part(expression, 2)
            ),
        }
    }
}

impl Keyword for AssertEqual {
    fn code(&self) -> &str {
        "EQUAL"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Assertion
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        run_comparison(self, ctx, reporter, statement.value())
    }
}

/// `NOT_EQUAL`: value at a JSON path differs from the given text. The
/// invalid value `*` can never pass.
pub struct AssertNotEqual;

impl PathAssertion for AssertNotEqual {
    fn code(&self) -> &str {
        "NOT_EQUAL"
    }

    fn path_from_expression<'a>(&self, expression: &'a [String]) -> Option<&'a str> {
        expression.first().map(String::as_str)
    }

    fn check(&self, expression: &[String], actual: &str, _path: &str) -> bool {
        let invalid = part(expression, 1);
        invalid != "*" && invalid != actual
    }

    fn step_description(&self, expression: &[String]) -> String {
        format!(
            "Assert that value at \"{}\" is not equal to \"{}\"",
            part(expression, 0),
            part(expression, 1)
        )
    }

    fn result_description(
        &self,
        kind: ResultKind,
        expression: &[String],
        actual: &str,
        path: &str,
    ) -> String {
        let base = part(expression, 0);
        match kind {
            ResultKind::Pass => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") is not equal to invalid value"
            ),
            ResultKind::Fail => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") is equal to invalid value \"{}\"",
                part(expression, 1)
            ),
            ResultKind::CountPass => format!(
                "Count of value not being equal \"{actual}\" at path \"{base}\" is equal to expected"
            ),
            ResultKind::CountFail => format!(
                "Count of value not being equal \"{actual}\" at path \"{base}\" is {actual} and is not equal to expected range \"{}\"",
                part(expression, 2)
            ),
        }
    }
}

impl Keyword for AssertNotEqual {
    fn code(&self) -> &str {
        "NOT_EQUAL"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Assertion
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        run_comparison(self, ctx, reporter, statement.value())
    }
}

/// `REGEX`: value at a JSON path matches a pattern in full, not as a
/// substring. A pattern that fails to compile fails the comparison.
pub struct AssertRegex;

impl PathAssertion for AssertRegex {
    fn code(&self) -> &str {
        "REGEX"
    }

    fn path_from_expression<'a>(&self, expression: &'a [String]) -> Option<&'a str> {
        expression.first().map(String::as_str)
    }

    fn check(&self, expression: &[String], actual: &str, _path: &str) -> bool {
        let pattern = part(expression, 1);
        match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(regex) => regex.is_match(actual),
            Err(err) => {
                error!("Failed to compile regex \"{pattern}\": {err}");
                false
            }
        }
    }

    fn step_description(&self, expression: &[String]) -> String {
        format!(
            "Assert that value at \"{}\" is equal (by regex) to \"{}\"",
            part(expression, 0),
            part(expression, 1)
        )
    }

    fn result_description(
        &self,
        kind: ResultKind,
        expression: &[String],
        actual: &str,
        path: &str,
    ) -> String {
        let base = part(expression, 0);
        match kind {
            ResultKind::Pass => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") follows the expected regex"
            ),
            ResultKind::Fail => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") does not follow the expected regex \"{}\"",
                part(expression, 1)
            ),
            ResultKind::CountPass => format!(
                "Count of value matching regex \"{actual}\" at path \"{base}\" is equal to expected"
            ),
            ResultKind::CountFail => format!(
                "Count of value matching regex \"{actual}\" at path \"{base}\" is {actual} and is not equal to expected range \"{}\"",
                part(expression, 2)
            ),
        }
    }
}

impl Keyword for AssertRegex {
    fn code(&self) -> &str {
        "REGEX"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Assertion
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        run_comparison(self, ctx, reporter, statement.value())
    }
}

/// `RANGE`: numeric value at a JSON path fits a range spec such as
/// `5`, `3+`, `10-`, `1-5` or a comma-separated union of those.
pub struct AssertRange;

impl PathAssertion for AssertRange {
    fn code(&self) -> &str {
        "RANGE"
    }

    fn path_from_expression<'a>(&self, expression: &'a [String]) -> Option<&'a str> {
        expression.first().map(String::as_str)
    }

    fn check(&self, expression: &[String], actual: &str, _path: &str) -> bool {
        let value: f64 = match actual.parse() {
            Ok(value) => value,
            Err(err) => {
                error!("Failed to convert the following value to a number: {actual} ({err})");
                return false;
            }
        };
        value_in_range(part(expression, 1), value)
    }

    fn step_description(&self, expression: &[String]) -> String {
        format!(
            "Assert that value at \"{}\" fits within range \"{}\"",
            part(expression, 0),
            part(expression, 1)
        )
    }

    fn result_description(
        &self,
        kind: ResultKind,
        expression: &[String],
        actual: &str,
        path: &str,
    ) -> String {
        let base = part(expression, 0);
        match kind {
            ResultKind::Pass => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") is equal to expected range"
            ),
            ResultKind::Fail => format!(
                "Actual value \"{actual}\" at path \"{path}\" (based on \"{base}\") is not equal to expected range \"{}\"",
                part(expression, 1)
            ),
            ResultKind::CountPass => format!(
                "Count of value \"{}\" at path \"{base}\" is equal to expected",
                part(expression, 1)
            ),
            ResultKind::CountFail => format!(
                "Count of value \"{}\" at path \"{base}\" is {actual} and is not equal to expected range \"{}\"",
                part(expression, 1),
                part(expression, 2)
            ),
        }
    }
}

impl Keyword for AssertRange {
    fn code(&self) -> &str {
        "RANGE"
    }

    fn category(&self) -> KeywordCategory {
        KeywordCategory::Assertion
    }

    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool> {
        run_comparison(self, ctx, reporter, statement.value())
    }
}
