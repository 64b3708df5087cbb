//! Vanity redirects: the record type the sheet importer targets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FieldValue;

/// How a redirect treats the incoming request's query string.
///
/// Pure data here — the serving logic that applies it lives elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryStringMode {
    #[default]
    Ignore,
    Preserve,
    Modify,
}

impl QueryStringMode {
    /// Parses a sheet cell value, case-insensitively. Unrecognized labels
    /// yield `None` so the caller can leave the current mode untouched.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ignore" => Some(Self::Ignore),
            "preserve" => Some(Self::Preserve),
            "modify" => Some(Self::Modify),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Preserve => "preserve",
            Self::Modify => "modify",
        }
    }
}

/// A vanity URL redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VanityRedirect {
    pub id: Uuid,

    /// Natural key connecting re-imports of the same logical redirect.
    /// Stable across runs; set once at creation.
    pub import_key: String,

    pub display_name: String,

    /// Site-local paths this redirect claims, e.g. `/mypage`.
    pub local_paths: BTreeSet<String>,

    pub destination: Option<String>,

    /// True for a 302, false for a 301.
    pub temporary: bool,

    pub query_string: QueryStringMode,

    /// Another redirect this one hangs under.
    pub parent: Option<Uuid>,

    pub description: Option<String>,

    /// Owning site. Must be set before the redirect can be published.
    pub site: Option<String>,
}

impl VanityRedirect {
    /// Builds a fresh redirect from an identity value, which seeds both the
    /// display name and the import key.
    pub fn new(identity: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            import_key: identity.to_string(),
            display_name: identity.to_string(),
            local_paths: BTreeSet::new(),
            destination: None,
            temporary: false,
            query_string: QueryStringMode::default(),
            parent: None,
            description: None,
            site: None,
        }
    }

    /// Prefixes a local path with `/` when missing.
    pub fn normalize_path(path: &str) -> String {
        let path = path.trim();
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    /// The `"{first local path} -> {destination}"` fallback used when the
    /// display name is blank.
    pub fn name_placeholder(&self) -> String {
        let mut s = String::new();
        if let Some(path) = self.local_paths.iter().next() {
            s.push_str(path);
            s.push_str(" -> ");
        }
        if let Some(destination) = &self.destination {
            s.push_str(destination);
        }
        s
    }

    /// Normalizes in place before publishing: blank paths are dropped, the
    /// rest get a leading slash, and a blank display name falls back to
    /// the placeholder.
    pub fn normalize(&mut self) {
        self.local_paths = self
            .local_paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| Self::normalize_path(p))
            .collect();

        if self.display_name.trim().is_empty() {
            self.display_name = self.name_placeholder();
        }
    }

    /// Checks the invariants a redirect must satisfy to be published.
    pub fn validate(&self) -> Result<(), String> {
        match &self.destination {
            None => return Err("a destination is required".into()),
            Some(destination) => {
                let rest = destination
                    .strip_prefix("http://")
                    .or_else(|| destination.strip_prefix("https://"));
                if rest.is_none_or(str::is_empty) {
                    return Err(format!("invalid destination URL: {destination}"));
                }
            }
        }

        if self.local_paths.is_empty() {
            return Err("at least one local path is required".into());
        }

        if self.local_paths.iter().any(|p| p.contains('*')) {
            return Err("invalid local path: cannot contain '*'".into());
        }

        if self.site.is_none() {
            return Err("an owner site must be specified".into());
        }

        Ok(())
    }

    /// Simple-value view of this redirect, used for diffing two versions.
    pub fn field_values(&self) -> BTreeMap<String, FieldValue> {
        let mut values = BTreeMap::new();
        values.insert(
            "displayName".to_string(),
            FieldValue::Text(self.display_name.clone()),
        );
        values.insert(
            "localPaths".to_string(),
            FieldValue::Texts(self.local_paths.iter().cloned().collect()),
        );
        if let Some(destination) = &self.destination {
            values.insert(
                "destination".to_string(),
                FieldValue::Text(destination.clone()),
            );
        }
        values.insert("temporary".to_string(), FieldValue::Flag(self.temporary));
        values.insert(
            "queryString".to_string(),
            FieldValue::Text(self.query_string.label().to_string()),
        );
        if let Some(parent) = self.parent {
            values.insert("parent".to_string(), FieldValue::Reference(parent));
        }
        if let Some(description) = &self.description {
            values.insert(
                "description".to_string(),
                FieldValue::Text(description.clone()),
            );
        }
        values
    }
}
