//! Attest scripting engine
//!
//! A keyword-driven language for API testing: scripts parse into keyword
//! statements, statements execute against an HTTP endpoint, and path-based
//! assertions score the exchange into a hierarchical report.

pub mod assertion;
pub mod context;
pub mod error;
pub mod http;
pub mod json_path;
pub mod keyword;
pub mod report;
pub mod runner;
pub mod split;
pub mod statement;
pub mod vars;

pub use error::{AttestError, Result};
