//! Run state shared across statements
//!
//! The [`Context`] carries everything a keyword handler may need while a
//! script runs: variable stores, registered content providers, the
//! assertion engine and the REST client. Text from scripts passes through
//! [`Context::resolve`], which substitutes `${prefix.key}` content tags
//! with values from the providers.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::assertion::AssertionEngine;
use crate::http::RestClient;
use crate::json_path::JsonPathProvider;

const TAG_START: &str = "${";
const TAG_END: char = '}';

/// Store a variable belongs to. Each kind is exposed through its own
/// content tag prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Script-created values, addressed as `${var.key}`
    Variable,
    /// Configuration values, addressed as `${property.key}`
    Property,
}

impl VariableKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            VariableKind::Variable => "var",
            VariableKind::Property => "property",
        }
    }
}

/// Source of values for content tags under one prefix
pub trait ContentProvider {
    /// Tag prefix this provider answers to, without the trailing period
    fn prefix(&self) -> &str;

    /// All values for `key`, mapped by the path that matched. A key that
    /// matches nothing yields an empty map.
    fn content(&self, ctx: &Context, key: &str) -> IndexMap<String, String>;
}

/// Provider backed by a plain key-value store
pub struct StringMapProvider {
    prefix: String,
    values: Rc<RefCell<IndexMap<String, String>>>,
}

impl StringMapProvider {
    fn with_store(
        prefix: impl Into<String>,
        values: Rc<RefCell<IndexMap<String, String>>>,
    ) -> StringMapProvider {
        StringMapProvider {
            prefix: prefix.into(),
            values,
        }
    }
}

impl ContentProvider for StringMapProvider {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn content(&self, _ctx: &Context, key: &str) -> IndexMap<String, String> {
        match self.values.borrow().get(key) {
            Some(value) => IndexMap::from([(key.to_string(), value.clone())]),
            None => IndexMap::new(),
        }
    }
}

/// State for one run
pub struct Context {
    providers: Vec<Rc<dyn ContentProvider>>,
    variables: Rc<RefCell<IndexMap<String, String>>>,
    properties: Rc<RefCell<IndexMap<String, String>>>,
    assertion: AssertionEngine,
    rest: RestClient,
}

impl Context {
    pub fn new(rest: RestClient) -> Context {
        let variables = Rc::new(RefCell::new(IndexMap::new()));
        let properties = Rc::new(RefCell::new(IndexMap::new()));

        let mut ctx = Context {
            providers: Vec::new(),
            variables: Rc::clone(&variables),
            properties: Rc::clone(&properties),
            assertion: AssertionEngine::new(),
            rest,
        };
        ctx.register_content_provider(Rc::new(JsonPathProvider));
        ctx.register_content_provider(Rc::new(StringMapProvider::with_store(
            VariableKind::Variable.prefix(),
            variables,
        )));
        ctx.register_content_provider(Rc::new(StringMapProvider::with_store(
            VariableKind::Property.prefix(),
            properties,
        )));
        ctx
    }

    pub fn register_content_provider(&mut self, provider: Rc<dyn ContentProvider>) {
        self.providers.push(provider);
    }

    /// Store a variable, overriding any existing value for the key
    pub fn add_variable(&mut self, kind: VariableKind, key: &str, value: &str) {
        let store = match kind {
            VariableKind::Variable => &self.variables,
            VariableKind::Property => &self.properties,
        };
        store.borrow_mut().insert(key.to_string(), value.to_string());
    }

    /// Store a variable only when the key has no content yet
    pub fn add_variable_if_absent(&mut self, kind: VariableKind, key: &str, value: &str) {
        if !self.has_content(&format!("{}.{}", kind.prefix(), key)) {
            self.add_variable(kind, key, value);
        }
    }

    /// Configuration value for `key`, empty when unset
    pub fn property(&self, key: &str) -> String {
        self.properties
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Substitute every `${prefix.key}` tag in `text`, right to left. Tags
    /// that resolve to nothing are replaced by their inner text without
    /// the tag markers. A tag missing its closing brace stops resolution.
    pub fn resolve(&self, text: &str) -> String {
        let mut text = text.to_string();
        let mut limit = text.len();
        while let Some(start) = text[..limit].rfind(TAG_START) {
            let Some(end_offset) = text[start + 2..].find(TAG_END) else {
                warn!("Unterminated content tag, resolution stopped: {text}");
                break;
            };
            let end = start + 2 + end_offset;

            let tag = text[start + 2..end].to_string();
            let resolved = self.content_value(&tag, false);
            let replacement = if resolved.is_empty() { tag } else { resolved };

            text.replace_range(start..=end, &replacement);
            limit = start;
        }
        text
    }

    /// All content for a tag. The text before the first period selects the
    /// provider; when no provider carries that prefix, every provider is
    /// searched with the full text as key. Result keys are prefixed with
    /// the providing prefix.
    pub fn content_of(&self, text: &str) -> IndexMap<String, String> {
        trace!("Retrieving content for tag text: {text}");
        let (prefix, key) = match text.find('.') {
            Some(i) => (&text[..i], &text[i + 1..]),
            None => ("", text),
        };

        let matching: Vec<Rc<dyn ContentProvider>> = self
            .providers
            .iter()
            .filter(|provider| provider.prefix() == prefix)
            .cloned()
            .collect();
        let (targets, key) = if matching.is_empty() {
            (self.providers.clone(), text)
        } else {
            (matching, key)
        };

        let mut result = IndexMap::new();
        for provider in &targets {
            for (path, value) in provider.content(self, key) {
                result.insert(format!("{}.{}", provider.prefix(), path), value);
            }
        }

        if result.is_empty() {
            warn!("No result found when resolving content: {text}");
        }
        result
    }

    /// Single content value for a tag. An empty String means retrieval
    /// failed. More than one result is an error unless
    /// `allow_multiple` is set, in which case the first value wins.
    pub fn content_value(&self, text: &str, allow_multiple: bool) -> String {
        let result = self.content_of(text);
        match result.len() {
            0 => String::new(),
            1 => first_value(&result),
            _ if allow_multiple => first_value(&result),
            _ => {
                warn!(
                    "More than one result found when resolving content expected to be single. Content text: {text}"
                );
                String::new()
            }
        }
    }

    pub fn has_content(&self, text: &str) -> bool {
        !self.content_of(text).is_empty()
    }

    pub fn assertion(&self) -> &AssertionEngine {
        &self.assertion
    }

    pub fn assertion_mut(&mut self) -> &mut AssertionEngine {
        &mut self.assertion
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn rest_mut(&mut self) -> &mut RestClient {
        &mut self.rest
    }

    /// Parsed document describing the last sent request, if any
    pub fn request_document(&self) -> Option<&serde_json::Value> {
        self.rest.request_document()
    }

    /// Parsed document describing the last received response, if any
    pub fn response_document(&self) -> Option<&serde_json::Value> {
        self.rest.response_document()
    }
}

fn first_value(map: &IndexMap<String, String>) -> String {
    map.get_index(0)
        .map(|(_, value)| value.clone())
        .unwrap_or_default()
}
