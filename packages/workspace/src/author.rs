//! Session author resolution.
//!
//! Precedence: explicit argument, last explicit author of the session,
//! configured default, `USER`/`USERNAME`, configured fallback.

use serde::Serialize;

use crate::config::WorkspaceConfig;

/// Environment lookup, swappable in tests
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAuthor {
    pub name: String,
    /// Nobody chose this name; it came from the environment or the fallback
    pub is_default: bool,
}

#[derive(Clone)]
pub struct AuthorResolver {
    session: Option<String>,
    configured: Option<String>,
    fallback: String,
    env: EnvLookup,
}

impl AuthorResolver {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self::with_env(config, process_env)
    }

    pub fn with_env(config: &WorkspaceConfig, env: EnvLookup) -> Self {
        Self {
            session: None,
            configured: config.default_author.clone().filter(|name| !name.trim().is_empty()),
            fallback: config.fallback_author.clone(),
            env,
        }
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Pick the author for one operation; an explicit name becomes the session author
    pub fn resolve(&mut self, explicit: Option<&str>) -> ResolvedAuthor {
        if let Some(name) = explicit.map(str::trim).filter(|name| !name.is_empty()) {
            self.session = Some(name.to_string());
            return ResolvedAuthor {
                name: name.to_string(),
                is_default: false,
            };
        }
        self.current()
    }

    /// The author an operation would get without an explicit name
    pub fn current(&self) -> ResolvedAuthor {
        if let Some(name) = self.session.as_ref().or(self.configured.as_ref()) {
            return ResolvedAuthor {
                name: name.clone(),
                is_default: false,
            };
        }

        let name = ["USER", "USERNAME"]
            .iter()
            .filter_map(|key| (self.env)(key))
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.fallback.clone());
        ResolvedAuthor { name, is_default: true }
    }
}
