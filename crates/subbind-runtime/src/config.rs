#![forbid(unsafe_code)]

//! Host runtime configuration.
//!
//! Every knob has a default and can be overridden from the environment:
//!
//! | Variable                | Field                      | Default |
//! |-------------------------|----------------------------|---------|
//! | `SUBBIND_STRICT`        | `strict`                   | off     |
//! | `SUBBIND_MAX_RERENDERS` | `max_rerenders_per_flush`  | 64      |
//! | `SUBBIND_MAX_TASKS`     | `max_tasks_per_flush`      | 10000   |
//! | `SUBBIND_LOG`           | `log_filter`               | `warn`  |

/// Default bound on forced re-renders processed by one `flush()`.
pub const DEFAULT_MAX_RERENDERS: usize = 64;

/// Default bound on queued tasks run by one `flush()`.
pub const DEFAULT_MAX_TASKS: usize = 10_000;

/// Configuration for a [`Root`](crate::host::Root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Render every update twice before committing, to surface render-phase
    /// side effects.
    pub strict: bool,
    /// Forced re-renders allowed per `flush()` before it gives up.
    pub max_rerenders_per_flush: usize,
    /// Tasks allowed per `flush()` before it gives up.
    pub max_tasks_per_flush: usize,
    /// `EnvFilter` directives used by `logging::init_json_logging`.
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_rerenders_per_flush: DEFAULT_MAX_RERENDERS,
            max_tasks_per_flush: DEFAULT_MAX_TASKS,
            log_filter: "warn".to_string(),
        }
    }
}

impl HostConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration read from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Configuration read through `get_env`; unset or unparsable variables
    /// keep their defaults.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = get_env("SUBBIND_STRICT") {
            config.strict = env_flag(&value);
        }
        if let Some(limit) = get_env("SUBBIND_MAX_RERENDERS").and_then(|v| parse_limit(&v)) {
            config.max_rerenders_per_flush = limit;
        }
        if let Some(limit) = get_env("SUBBIND_MAX_TASKS").and_then(|v| parse_limit(&v)) {
            config.max_tasks_per_flush = limit;
        }
        if let Some(filter) = get_env("SUBBIND_LOG") {
            let filter = filter.trim();
            if !filter.is_empty() {
                config.log_filter = filter.to_string();
            }
        }
        config
    }

    /// Enable or disable strict (double) rendering.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the re-render bound per flush (minimum 1).
    #[must_use]
    pub fn with_max_rerenders(mut self, limit: usize) -> Self {
        self.max_rerenders_per_flush = limit.max(1);
        self
    }

    /// Set the task bound per flush (minimum 1).
    #[must_use]
    pub fn with_max_tasks(mut self, limit: usize) -> Self {
        self.max_tasks_per_flush = limit.max(1);
        self
    }

    /// Set the log filter directives.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Render passes per update.
    #[must_use]
    pub(crate) fn render_passes(&self) -> usize {
        if self.strict { 2 } else { 1 }
    }
}

#[inline]
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[inline]
fn parse_limit(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|&n| n > 0)
}
