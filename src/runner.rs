//! Script execution
//!
//! The [`Runner`] owns the keyword registry and the run context, and wires
//! both to a fresh [`ReportTree`] for every run. Statements anchor their
//! report entries by category: actions and no-impact statements attach to
//! the root, everything else nests under the most recent action.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::context::{ContentProvider, Context, VariableKind};
use crate::error::{AttestError, Result};
use crate::http::{self, BodySource, HttpTransport, RestClient, Transport, WorkspaceSource};
use crate::keyword::{Keyword, KeywordCategory, KeywordProvider, KeywordSet};
use crate::report::{ReportSource, ReportTree, ReportType, Reporter};
use crate::statement::Script;

/// The built-in keyword registry: variables and metadata, assertions and
/// the REST client
pub fn default_keywords() -> KeywordSet {
    let mut keywords = KeywordSet::new();
    keywords.extend(crate::vars::keywords());
    keywords.extend(crate::assertion::keywords());
    keywords.extend(http::keywords());
    keywords
}

/// Executes scripts against one shared context. Variables and properties
/// persist across runs; each run gets its own report tree.
pub struct Runner {
    keywords: KeywordSet,
    ctx: Context,
}

impl Runner {
    /// Runner with the default HTTP transport, loading request bodies from
    /// files under `workspace`
    pub fn new(workspace: impl Into<PathBuf>) -> Result<Runner> {
        let transport = HttpTransport::new()?;
        let bodies = WorkspaceSource::new(workspace);

        let mut ctx = Context::new(RestClient::new(Box::new(transport), Box::new(bodies)));
        http::seed_default_properties(&mut ctx);

        Ok(Runner {
            keywords: default_keywords(),
            ctx,
        })
    }

    /// Replace the HTTP transport, keeping everything else
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Runner {
        self.ctx.rest_mut().set_transport(transport);
        self
    }

    /// Replace the request body source, keeping everything else
    pub fn with_body_source(mut self, bodies: Box<dyn BodySource>) -> Runner {
        self.ctx.rest_mut().set_body_source(bodies);
        self
    }

    pub fn register_keyword(&mut self, keyword: std::rc::Rc<dyn Keyword>) {
        self.keywords.add(keyword);
    }

    pub fn register_keyword_provider(&mut self, provider: &dyn KeywordProvider) {
        self.keywords.extend(provider.keywords());
    }

    pub fn register_content_provider(&mut self, provider: std::rc::Rc<dyn ContentProvider>) {
        self.ctx.register_content_provider(provider);
    }

    /// Set a configuration property, overriding defaults and earlier values
    pub fn set_property(&mut self, key: &str, value: &str) {
        self.ctx.add_variable(VariableKind::Property, key, value);
    }

    /// Run the script in `path`, titling the report after the file name
    pub fn run_file(&mut self, path: &Path) -> Result<ReportTree> {
        let text = fs::read_to_string(path)
            .map_err(|e| AttestError::Script(format!("Failed to read {}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.run(&name, &text)
    }

    /// Run script text. Fails only when the text parses into zero
    /// statements; every narrower failure lands in the report instead.
    pub fn run(&mut self, name: &str, text: &str) -> Result<ReportTree> {
        info!("Running script: {name}");
        let mut script = Script::parse(&self.keywords, text);
        if script.is_empty() {
            return Err(AttestError::Script(format!(
                "No statements found in script: {name}"
            )));
        }
        if script.has_error() {
            warn!("Dropped unparseable statements while reading script: {name}");
        }

        self.ctx.assertion_mut().reset();
        let mut tree = ReportTree::new(name);
        let mut last_action = tree.root();

        while let Some(statement) = script.next() {
            debug!("Handling statement: [{}] {}", statement.code(), statement.value());
            let category = statement.category();
            let parent = match category {
                KeywordCategory::Action | KeywordCategory::NoImpact => tree.root(),
                _ => last_action,
            };

            let node = tree.create_sub_report(
                parent,
                ReportType::Info,
                statement.property("title").unwrap_or(""),
                "",
                &format!("[{}] {}", statement.code(), statement.value()),
            );
            tree.node_mut(node).set_source(ReportSource::new(
                statement.code(),
                category,
                statement.value(),
            ));
            if category == KeywordCategory::Action {
                last_action = node;
            }

            let mut reporter = Reporter::new(&mut tree, node);
            if let Err(e) = statement
                .keyword()
                .handle(&mut self.ctx, &mut reporter, &statement)
            {
                error!(
                    "Failed to handle statement [{}] {}: {e}",
                    statement.code(),
                    statement.value()
                );
                let node = tree.node_mut(node);
                node.set_severity(ReportType::Error);
                node.set_detail("Error encountered when handling statement. Check logs for details");
            }

            if category == KeywordCategory::Assertion {
                let next_is_action_or_none = script
                    .peek_category(&[KeywordCategory::Action, KeywordCategory::Assertion])
                    .map_or(true, |s| s.category() == KeywordCategory::Action);
                self.ctx
                    .assertion_mut()
                    .maybe_complete(next_is_action_or_none, &mut tree);
            }
        }

        Ok(tree)
    }
}

/// Read a TOML file into dotted property keys. Nested tables flatten by
/// joining their path with `.`; non-string scalars keep their TOML
/// rendering.
pub fn load_properties(path: &Path) -> Result<IndexMap<String, String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| AttestError::Properties(format!("Failed to read {}: {e}", path.display())))?;
    let table: toml::Table = text
        .parse()
        .map_err(|e| AttestError::Properties(format!("Failed to parse {}: {e}", path.display())))?;

    let mut properties = IndexMap::new();
    flatten_table(&table, "", &mut properties);
    Ok(properties)
}

fn flatten_table(table: &toml::Table, prefix: &str, out: &mut IndexMap<String, String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_table(nested, &path, out),
            toml::Value::String(text) => {
                out.insert(path, text.clone());
            }
            other => {
                out.insert(path, other.to_string());
            }
        }
    }
}
