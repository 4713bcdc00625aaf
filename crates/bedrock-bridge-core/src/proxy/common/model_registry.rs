//! Static alias → Bedrock model identifier catalog.
//!
//! The catalog is fixed at compile time and read-only after startup. Unknown
//! aliases resolve to the default Claude 3.7 Sonnet inference profile rather
//! than failing.

/// Backend id used when the requested alias is not in the catalog.
pub const DEFAULT_BACKEND_MODEL_ID: &str = "us.anthropic.claude-3-7-sonnet-20250219-v1:0";

/// One catalog entry. `thinking_capable` is true iff the alias names the
/// extended-reasoning variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelAlias {
    pub alias: &'static str,
    pub backend_id: &'static str,
    pub thinking_capable: bool,
}

const CATALOG: &[ModelAlias] = &[
    ModelAlias {
        alias: "claude-3-7-sonnet",
        backend_id: "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
        thinking_capable: false,
    },
    ModelAlias {
        alias: "claude-3-7-sonnet-thinking",
        backend_id: "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
        thinking_capable: true,
    },
    ModelAlias {
        alias: "claude-3-opus",
        backend_id: "anthropic.claude-3-opus-20240229-v1:0",
        thinking_capable: false,
    },
    ModelAlias {
        alias: "claude-3-5-sonnet",
        backend_id: "anthropic.claude-3-5-sonnet-20240620-v1:0",
        thinking_capable: false,
    },
    ModelAlias {
        alias: "claude-3-sonnet",
        backend_id: "anthropic.claude-3-sonnet-20240229-v1:0",
        thinking_capable: false,
    },
    ModelAlias {
        alias: "claude-3-haiku",
        backend_id: "anthropic.claude-3-haiku-20240307-v1:0",
        thinking_capable: false,
    },
    ModelAlias {
        alias: "claude-2",
        backend_id: "anthropic.claude-v2:1",
        thinking_capable: false,
    },
    ModelAlias {
        alias: "claude-instant",
        backend_id: "anthropic.claude-instant-v1",
        thinking_capable: false,
    },
];

/// Read-only alias catalog, constructed once at process start.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: &'static [ModelAlias],
    default_backend_id: &'static str,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    /// Registry over the built-in Anthropic catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self { entries: CATALOG, default_backend_id: DEFAULT_BACKEND_MODEL_ID }
    }

    /// Full catalog entry for an alias, if present.
    #[must_use]
    pub fn entry(&self, alias: &str) -> Option<&ModelAlias> {
        self.entries.iter().find(|m| m.alias == alias)
    }

    /// Map an alias to its backend model id, falling back to the default.
    #[must_use]
    pub fn resolve(&self, alias: &str) -> &str {
        self.entry(alias).map_or(self.default_backend_id, |m| m.backend_id)
    }

    /// First alias that maps to the given backend id, if any.
    #[must_use]
    pub fn reverse_lookup(&self, backend_id: &str) -> Option<&'static str> {
        self.entries.iter().find(|m| m.backend_id == backend_id).map(|m| m.alias)
    }

    /// Whether the alias denotes the extended-reasoning variant.
    #[must_use]
    pub fn is_thinking_capable(&self, alias: &str) -> bool {
        self.entry(alias).is_some_and(|m| m.thinking_capable)
    }

    /// Whether the alias belongs to the Claude 3.7 family, which is the only
    /// family accepting the extended-output and computer-use beta flags.
    #[must_use]
    pub fn supports_beta_features(&self, alias: &str) -> bool {
        alias.starts_with("claude-3-7")
    }

    /// Catalog entries in declaration order.
    pub fn list(&self) -> impl Iterator<Item = &ModelAlias> {
        self.entries.iter()
    }
}
