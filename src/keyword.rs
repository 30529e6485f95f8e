//! Keyword trait and registry
//!
//! Keywords are the statement types of the script language. Each one
//! carries a unique code, a category that drives report anchoring, and a
//! handler. They are registered into a flat [`KeywordSet`] and looked up
//! by exact code match.

use std::rc::Rc;

use crate::context::Context;
use crate::error::Result;
use crate::report::Reporter;
use crate::statement::Statement;

/// Category of a [`Keyword`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordCategory {
    /// Execution has no impact on the system under test nor on the
    /// assertion process
    NoImpact,
    /// An action done towards the system under test that should impact
    /// its behaviour
    Action,
    /// Assists an action; minimal impact and no assertion results
    Utility,
    /// Assertion based on the output of an action
    Assertion,
    /// General purpose type; usage should be kept to a minimum as it is
    /// not specially handled
    Other,
}

/// A named statement type in the script language
pub trait Keyword {
    /// Unique code matched as a whole token in script text
    fn code(&self) -> &str;

    /// Category used for report anchoring and assertion grouping
    fn category(&self) -> KeywordCategory;

    /// Execute this keyword for one statement.
    ///
    /// Returns `Ok(false)` when handling completed but recorded a failure
    /// on its report node. `Err` is reserved for unexpected failures; the
    /// runner converts those into an ERROR node and continues the run.
    fn handle(
        &self,
        ctx: &mut Context,
        reporter: &mut Reporter<'_>,
        statement: &Statement,
    ) -> Result<bool>;
}

/// Supplier of keywords, used to register extensions at startup
pub trait KeywordProvider {
    fn keywords(&self) -> Vec<Rc<dyn Keyword>>;
}

/// Flat registry of keywords
#[derive(Default)]
pub struct KeywordSet {
    keywords: Vec<Rc<dyn Keyword>>,
}

impl KeywordSet {
    pub fn new() -> Self {
        KeywordSet {
            keywords: Vec::new(),
        }
    }

    /// Register a keyword. A duplicate code replaces nothing; the first
    /// registration wins on lookup.
    pub fn add(&mut self, keyword: Rc<dyn Keyword>) {
        self.keywords.push(keyword);
    }

    pub fn extend(&mut self, keywords: Vec<Rc<dyn Keyword>>) {
        self.keywords.extend(keywords);
    }

    /// Look up a keyword by exact code
    pub fn find(&self, code: &str) -> Option<Rc<dyn Keyword>> {
        self.keywords.iter().find(|k| k.code() == code).cloned()
    }

    /// All registered codes, longest first, for boundary scanning
    pub fn codes_longest_first(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.keywords.iter().map(|k| k.code()).collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        codes
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
