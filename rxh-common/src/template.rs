//! Command templates with named placeholders.
//!
//! A template is plain command text with `{name}` slots. Rendering replaces
//! every slot in one pass and fails when a value is missing, so a command
//! with leftover placeholder text never reaches a machine. Braces that do not
//! enclose an identifier (`{ }`, `{$_}`, JSON bodies) are kept as written.

use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::trace;

use crate::errors::{HelperError, Result};
use crate::types::OsFlavor;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Values for template placeholders, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(BTreeMap<String, String>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Parameters {
    fn from(pairs: [(K, V); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A named command template for one OS flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    name: String,
    flavor: OsFlavor,
    text: String,
    placeholders: BTreeSet<String>,
}

impl CommandTemplate {
    pub fn new(name: impl Into<String>, flavor: OsFlavor, text: impl Into<String>) -> Self {
        let text = text.into();
        let placeholders = PLACEHOLDER_RE
            .captures_iter(&text)
            .map(|caps| caps[1].to_string())
            .collect();
        Self {
            name: name.into(),
            flavor,
            text,
            placeholders,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavor(&self) -> OsFlavor {
        self.flavor
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names appearing in the template.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(String::as_str)
    }

    /// Substitute every placeholder.
    ///
    /// Replacement text is inserted verbatim and is not scanned again.
    pub fn render(&self, params: &Parameters) -> Result<String> {
        if let Some(missing) = self.placeholders.iter().find(|p| !params.contains(p)) {
            return Err(HelperError::MissingParameter {
                operation: self.name.clone(),
                placeholder: missing.clone(),
            });
        }

        let rendered = PLACEHOLDER_RE.replace_all(&self.text, |caps: &Captures<'_>| {
            params.get(&caps[1]).unwrap_or_default().to_string()
        });

        trace!(
            operation = %self.name,
            flavor = %self.flavor,
            unused = params.len().saturating_sub(self.placeholders.len()),
            "Rendered command template"
        );
        Ok(rendered.into_owned())
    }
}

/// All command templates known to a helper, per OS flavor.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<(OsFlavor, String), CommandTemplate>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template for one flavor, replacing any previous one.
    pub fn register(&mut self, name: &str, flavor: OsFlavor, text: &str) {
        self.templates.insert(
            (flavor, name.to_string()),
            CommandTemplate::new(name, flavor, text),
        );
    }

    /// Register the same text for every flavor.
    pub fn register_all(&mut self, name: &str, text: &str) {
        for flavor in [OsFlavor::Unix, OsFlavor::Windows] {
            self.register(name, flavor, text);
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: &str, flavor: OsFlavor, text: &str) -> Self {
        self.register(name, flavor, text);
        self
    }

    pub fn get(&self, name: &str, flavor: OsFlavor) -> Option<&CommandTemplate> {
        self.templates.get(&(flavor, name.to_string()))
    }

    pub fn contains(&self, name: &str, flavor: OsFlavor) -> bool {
        self.get(name, flavor).is_some()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Build the command line for `name` on `flavor`.
    pub fn build(&self, name: &str, params: &Parameters, flavor: OsFlavor) -> Result<String> {
        self.get(name, flavor)
            .ok_or_else(|| HelperError::UnknownOperation {
                operation: name.to_string(),
                flavor,
            })?
            .render(params)
    }

    /// Build using a free-form OS descriptor (e.g. `"Windows Server 2019"`).
    pub fn build_for(&self, name: &str, params: &Parameters, os_descriptor: &str) -> Result<String> {
        let flavor = OsFlavor::detect(os_descriptor)
            .ok_or_else(|| HelperError::UnknownOs(os_descriptor.to_string()))?;
        self.build(name, params, flavor)
    }
}
