//! Assertion keywords and their shared engine
//!
//! `ASSERT` opens a group that gathers the results of subsequent
//! comparison keywords into one report entry. The comparison keywords
//! (`EQUAL`, `NOT_EQUAL`, `REGEX`, `RANGE`) share one evaluation driver
//! and differ only in their match and message functions.

pub mod compare;
pub mod path_value;
pub mod range;
pub mod result;

use std::rc::Rc;

use crate::context::Context;
use crate::error::Result;
use crate::keyword::{Keyword, KeywordCategory};
use crate::report::{NodeId, ReportTree, ReportType, Reporter};
use crate::statement::Statement;

pub use compare::{AssertEqual, AssertNotEqual, AssertRange, AssertRegex};
pub use path_value::PathAssertion;
pub use range::value_in_range;
pub use result::{AssertionReport, AssertionResult};

/// Tallies comparison results and anchors their report entries under the
/// open `ASSERT` group
pub struct AssertionEngine {
    group: Option<NodeId>,
    report: AssertionReport,
    comparator_ran: bool,
}

impl AssertionEngine {
    pub fn new() -> AssertionEngine {
        AssertionEngine {
            group: None,
            report: AssertionReport::new(),
            comparator_ran: false,
        }
    }

    /// Open a group: subsequent comparison entries anchor under `node`
    /// until the group completes
    pub fn open_group(&mut self, node: NodeId) {
        self.group = Some(node);
        self.report = AssertionReport::new();
        self.comparator_ran = false;
    }

    /// Drop state left over from an earlier run. Group handles point into
    /// that run's tree, so they must not leak into the next one.
    pub fn reset(&mut self) {
        self.group = None;
        self.report = AssertionReport::new();
        self.comparator_ran = false;
    }

    pub fn group(&self) -> Option<NodeId> {
        self.group
    }

    /// Move the reporter's node under the open group, if any. Every
    /// comparison keyword calls this before evaluating.
    pub fn anchor(&mut self, reporter: &mut Reporter<'_>) {
        self.comparator_ran = true;
        if let Some(group) = self.group {
            let node = reporter.node_id();
            reporter.tree_mut().reparent(node, group);
        }
    }

    /// Tally one comparison outcome
    pub fn record(&mut self, result: AssertionResult) {
        self.report.add(result);
    }

    pub fn report(&self) -> &AssertionReport {
        &self.report
    }

    /// Complete the open group when the upcoming statement is an action
    /// or the script is done. A group that no comparison has recorded
    /// into yet stays open, so `ASSERT` followed by an action keeps its
    /// group for the comparisons after that action.
    pub fn maybe_complete(&mut self, next_is_action_or_none: bool, tree: &mut ReportTree) {
        if !next_is_action_or_none {
            return;
        }
        if self.group.is_some() && !self.comparator_ran {
            return;
        }
        self.complete(tree);
    }

    /// Write the tally onto the group node and reset for the next group
    pub fn complete(&mut self, tree: &mut ReportTree) {
        if let Some(group) = self.group.take() {
            let node = tree.node_mut(group);
            node.set_detail(format!(
                "{} passed, {} failed",
                self.report.count_pass(),
                self.report.count_fail()
            ));
            node.set_severity(if self.report.is_pass() {
                ReportType::Pass
            } else {
                ReportType::Fail
            });
        }
        self.report = AssertionReport::new();
        self.comparator_ran = false;
    }
}

impl Default for AssertionEngine {
    fn default() -> Self {
        AssertionEngine::new()
    }
}

/// `ASSERT`: groups subsequent comparisons into one report entry
pub struct Assert;

impl Keyword for Assert {
    fn code(&self) -> &str {
        "ASSERT"
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
        let node = reporter.node_mut();
        node.set_severity(ReportType::Info);
        node.set_fallback_title(statement.value());
        node.set_detail(statement.value());
        node.set_step("Perform assertions");
        node.set_auto_merge(true);

        ctx.assertion_mut().open_group(reporter.node_id());
        Ok(true)
    }
}

/// All assertion keywords
pub fn keywords() -> Vec<Rc<dyn Keyword>> {
    vec![
        Rc::new(AssertEqual),
        Rc::new(AssertNotEqual),
        Rc::new(AssertRegex),
        Rc::new(AssertRange),
        Rc::new(Assert),
    ]
}
