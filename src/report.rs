//! Hierarchical run reports
//!
//! Every executed statement lands somewhere in a [`ReportTree`]: actions
//! anchor new branches, assertions and utilities nest under the action
//! they relate to. Severity flows upward, so the root always carries the
//! worst outcome of the run. Rendering walks the tree through a
//! [`ReportRetriever`], which also powers reproduction trails.

use std::fmt;

use indexmap::IndexMap;
use serde_json::json;

use crate::keyword::KeywordCategory;

/// Severity of a report entry, ordered least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportType {
    Trace,
    Info,
    Pass,
    Warn,
    Error,
    Critical,
    Fail,
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportType::Trace => "TRACE",
            ReportType::Info => "INFO",
            ReportType::Pass => "PASS",
            ReportType::Warn => "WARN",
            ReportType::Error => "ERROR",
            ReportType::Critical => "CRITICAL",
            ReportType::Fail => "FAIL",
        };
        f.write_str(label)
    }
}

/// Statement that produced a report entry
#[derive(Debug, Clone)]
pub struct ReportSource {
    keyword_code: String,
    category: KeywordCategory,
    value: String,
}

impl ReportSource {
    pub fn new(
        keyword_code: impl Into<String>,
        category: KeywordCategory,
        value: impl Into<String>,
    ) -> ReportSource {
        ReportSource {
            keyword_code: keyword_code.into(),
            category,
            value: value.into(),
        }
    }

    pub fn keyword_code(&self) -> &str {
        &self.keyword_code
    }

    pub fn category(&self) -> KeywordCategory {
        self.category
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ReportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.keyword_code, self.value)
    }
}

/// Handle to a node within a [`ReportTree`]. Nodes are never dropped from
/// the arena, so a handle stays valid for the lifetime of its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// One report entry
#[derive(Debug)]
pub struct ReportNode {
    title: String,
    fallback_title: String,
    detail: String,
    step: String,
    severity: ReportType,
    source: Option<ReportSource>,
    attachments: IndexMap<String, String>,
    auto_merge: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ReportNode {
    fn new(severity: ReportType, title: &str, detail: &str, step: &str) -> ReportNode {
        ReportNode {
            title: title.to_string(),
            fallback_title: String::new(),
            detail: detail.to_string(),
            step: step.to_string(),
            severity,
            source: None,
            attachments: IndexMap::new(),
            auto_merge: false,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Title for display, falling back when the user gave none
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.fallback_title
        } else {
            &self.title
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_fallback_title(&mut self, fallback_title: impl Into<String>) {
        self.fallback_title = fallback_title.into();
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.detail = detail.into();
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn set_step(&mut self, step: impl Into<String>) {
        self.step = step.into();
    }

    pub fn severity(&self) -> ReportType {
        self.severity
    }

    pub fn set_severity(&mut self, severity: ReportType) {
        self.severity = severity;
    }

    pub fn source(&self) -> Option<&ReportSource> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: ReportSource) {
        self.source = Some(source);
    }

    pub fn attachments(&self) -> &IndexMap<String, String> {
        &self.attachments
    }

    pub fn attach(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.attachments.insert(name.into(), content.into());
    }

    pub fn auto_merge(&self) -> bool {
        self.auto_merge
    }

    pub fn set_auto_merge(&mut self, auto_merge: bool) {
        self.auto_merge = auto_merge;
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed report tree with a fixed root
pub struct ReportTree {
    nodes: Vec<ReportNode>,
}

impl ReportTree {
    /// Create a tree whose root reports the run itself. The fallback title
    /// is shown when nothing sets an explicit run title.
    pub fn new(fallback_title: impl Into<String>) -> ReportTree {
        let mut root = ReportNode::new(ReportType::Info, "", "", "");
        root.fallback_title = fallback_title.into();
        ReportTree { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &ReportNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ReportNode {
        &mut self.nodes[id.0]
    }

    /// Add a report entry under `parent`. The child inherits the parent's
    /// source so nested results keep pointing at the statement that caused
    /// them.
    pub fn create_sub_report(
        &mut self,
        parent: NodeId,
        severity: ReportType,
        title: &str,
        detail: &str,
        step: &str,
    ) -> NodeId {
        let mut node = ReportNode::new(severity, title, detail, step);
        node.parent = Some(parent);
        node.source = self.nodes[parent.0].source.clone();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Unlink a node from its parent. The root cannot be deleted.
    pub fn delete(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|&child| child != id);
            self.nodes[id.0].parent = None;
        }
    }

    /// Move a node (and its subtree) under a new parent, appended after the
    /// parent's existing children
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        if id == self.root() || id == new_parent {
            return;
        }
        if let Some(old_parent) = self.nodes[id.0].parent {
            self.nodes[old_parent.0].children.retain(|&child| child != id);
        }
        self.nodes[id.0].parent = Some(new_parent);
        self.nodes[new_parent.0].children.push(id);
    }

    /// Worst severity within the subtree rooted at `id`
    pub fn derived_severity(&self, id: NodeId) -> ReportType {
        let node = &self.nodes[id.0];
        node.children
            .iter()
            .map(|&child| self.derived_severity(child))
            .fold(node.severity, ReportType::max)
    }

    /// Resolve auto-merge: a node flagged for merging with exactly one
    /// child is stood in for by that child
    fn merge_target(&self, mut id: NodeId) -> NodeId {
        loop {
            let node = &self.nodes[id.0];
            if node.auto_merge && node.children.len() == 1 {
                id = node.children[0];
            } else {
                return id;
            }
        }
    }

    /// Walk the tree through a retriever, depth first. `layer` starts at 0
    /// on the root and `index` counts only siblings the retriever included.
    pub fn generate<R: ReportRetriever>(&self, retriever: &R) -> R::Output {
        self.generate_node(retriever, self.root(), 0, 0)
    }

    fn generate_node<R: ReportRetriever>(
        &self,
        retriever: &R,
        id: NodeId,
        layer: usize,
        index: usize,
    ) -> R::Output {
        let mut outputs = Vec::new();
        let mut next_index = 0;
        for &child in &self.nodes[id.0].children {
            let target = self.merge_target(child);
            if retriever.include(self.derived_severity(target), self.node(target)) {
                outputs.push(self.generate_node(retriever, target, layer + 1, next_index));
                next_index += 1;
            }
        }
        retriever.retrieve(self, id, outputs, layer, index)
    }

    /// Overview of the whole run, one line per entry
    pub fn render(&self) -> String {
        self.generate(&OverviewRetriever)
    }

    /// Numbered steps that reproduce the run manually, actions and
    /// utilities only
    pub fn reproduction_trail(&self) -> String {
        self.generate(&ReproductionRetriever)
    }

    /// Tree as JSON, for machine-readable output
    pub fn to_json(&self) -> serde_json::Value {
        self.node_json(self.root())
    }

    fn node_json(&self, id: NodeId) -> serde_json::Value {
        let node = &self.nodes[id.0];
        json!({
            "title": node.display_title(),
            "severity": node.severity.to_string(),
            "derivedSeverity": self.derived_severity(id).to_string(),
            "detail": node.detail,
            "step": node.step,
            "source": node.source.as_ref().map(ReportSource::to_string),
            "attachments": node.attachments,
            "subReports": node
                .children
                .iter()
                .map(|&child| self.node_json(child))
                .collect::<Vec<_>>(),
        })
    }
}

/// Visitor for turning a report tree into output. Called bottom-up, so
/// each node receives the rendered output of its included children.
pub trait ReportRetriever {
    type Output;

    /// Produce output for one node from its already-rendered children
    fn retrieve(
        &self,
        tree: &ReportTree,
        id: NodeId,
        children: Vec<Self::Output>,
        layer: usize,
        index: usize,
    ) -> Self::Output;

    /// Whether a node (and its subtree) takes part in generation
    fn include(&self, derived: ReportType, node: &ReportNode) -> bool {
        let _ = (derived, node);
        true
    }
}

struct OverviewRetriever;

impl ReportRetriever for OverviewRetriever {
    type Output = String;

    fn retrieve(
        &self,
        tree: &ReportTree,
        id: NodeId,
        children: Vec<String>,
        layer: usize,
        _index: usize,
    ) -> String {
        let mut result = format!(
            "{}[{}] {}",
            "  ".repeat(layer),
            tree.derived_severity(id),
            tree.node(id).display_title()
        );
        for child in children {
            result.push('\n');
            result.push_str(&child);
        }
        result
    }
}

struct ReproductionRetriever;

impl ReportRetriever for ReproductionRetriever {
    type Output = String;

    fn retrieve(
        &self,
        tree: &ReportTree,
        id: NodeId,
        children: Vec<String>,
        layer: usize,
        index: usize,
    ) -> String {
        let mut lines = Vec::new();
        if layer != 0 {
            lines.push(format!(
                "{}{}. {}",
                "  ".repeat(layer - 1),
                index + 1,
                tree.node(id).step()
            ));
        }
        lines.extend(children);
        lines.join("\n")
    }

    fn include(&self, _derived: ReportType, node: &ReportNode) -> bool {
        matches!(
            node.source().map(ReportSource::category),
            Some(KeywordCategory::Action | KeywordCategory::Utility)
        )
    }
}

/// Mutable view of a report tree scoped to one node. Keyword handlers
/// receive a reporter scoped to their statement's entry.
pub struct Reporter<'t> {
    tree: &'t mut ReportTree,
    node: NodeId,
}

impl<'t> Reporter<'t> {
    pub fn new(tree: &'t mut ReportTree, node: NodeId) -> Reporter<'t> {
        Reporter { tree, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn node(&self) -> &ReportNode {
        self.tree.node(self.node)
    }

    pub fn node_mut(&mut self) -> &mut ReportNode {
        self.tree.node_mut(self.node)
    }

    /// Add an entry under the scoped node
    pub fn sub_report(
        &mut self,
        severity: ReportType,
        title: &str,
        detail: &str,
        step: &str,
    ) -> NodeId {
        self.tree
            .create_sub_report(self.node, severity, title, detail, step)
    }

    /// Point this reporter at a different node
    pub fn rescope(&mut self, node: NodeId) {
        self.node = node;
    }

    pub fn tree(&self) -> &ReportTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ReportTree {
        self.tree
    }
}
