//! Stevedore configuration.
//!
//! Loaded from `~/.stevedore/config.toml`. Every value is optional; a
//! missing file just means defaults.
//!
//! The acting identity for an import is resolved through a chain:
//!
//! 1. `--as <actor>` — explicit per-command override
//! 2. `STEVEDORE_ACTOR` env var — process/session level
//! 3. `default-actor` in the config file
//!
//! Whoever triggers an import is recorded on the import log and owns the
//! drafts it produces, so an actor is required for any command that runs a
//! batch.

use std::{env, fs};

use std::path::PathBuf;

use serde::Deserialize;

/// Error message shown when no actor can be resolved.
pub const ACTOR_REQUIRED: &str = "actor required: pass --as <actor>, \
    set STEVEDORE_ACTOR, or add `default-actor = \"...\"` to ~/.stevedore/config.toml";

/// Stevedore configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Recorded as the submitter of imports when `--as` is not provided.
    pub default_actor: Option<String>,

    /// Owner site applied to published records when `--site` is not
    /// provided.
    pub default_site: Option<String>,
}

impl Config {
    /// Loads config from `~/.stevedore/config.toml`; a missing file yields
    /// the defaults.
    pub fn load() -> Result<Self, String> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.stevedore/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".stevedore").join("config.toml"))
    }

    /// Resolves the acting identity from the tiered resolution chain.
    pub fn resolve_actor(&self, explicit: Option<&str>) -> Result<String, String> {
        if let Some(actor) = explicit {
            return Ok(actor.to_string());
        }

        if let Ok(actor) = env::var("STEVEDORE_ACTOR")
            && !actor.is_empty()
        {
            return Ok(actor);
        }

        self.default_actor
            .clone()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ACTOR_REQUIRED.to_string())
    }

    /// Resolves the owner site: explicit flag first, then the configured
    /// default. Sites stay optional — publish validation decides whether
    /// one is required.
    pub fn resolve_site(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.default_site.clone())
            .filter(|s| !s.is_empty())
    }
}
