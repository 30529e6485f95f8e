//! Assertion outcome bookkeeping

use tracing::trace;

/// Outcome of one comparison against one resolved value
#[derive(Debug, Clone)]
pub struct AssertionResult {
    code: String,
    pass: bool,
    description: String,
}

impl AssertionResult {
    pub fn new(code: &str, pass: bool, description: impl Into<String>) -> AssertionResult {
        let description = description.into();
        trace!(
            "Created assertion result: [{}] [{}] {}",
            if pass { "PASS" } else { "FAIL" },
            code,
            description
        );
        AssertionResult {
            code: code.to_string(),
            pass,
            description,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_pass(&self) -> bool {
        self.pass
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Running tally of comparison outcomes, kept while an assertion group is
/// open and summarized when it completes
#[derive(Debug, Default)]
pub struct AssertionReport {
    results: Vec<AssertionResult>,
}

impl AssertionReport {
    pub fn new() -> AssertionReport {
        AssertionReport::default()
    }

    pub fn add(&mut self, result: AssertionResult) {
        self.results.push(result);
    }

    pub fn count_pass(&self) -> usize {
        self.results.iter().filter(|r| r.is_pass()).count()
    }

    pub fn count_fail(&self) -> usize {
        self.results.len() - self.count_pass()
    }

    pub fn is_pass(&self) -> bool {
        self.count_fail() == 0
    }

    pub fn results(&self) -> &[AssertionResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
