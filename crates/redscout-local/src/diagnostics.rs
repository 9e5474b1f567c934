use redscout_core::{Diagnostic, DiagnosticLevel, DiagnosticSink};
use std::sync::Mutex;

const DEBUG_ENV: &str = "REDSCOUT_DEBUG";

fn env_truthy(key: &str) -> bool {
    matches!(
        std::env::var(key)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Routes interpreter diagnostics onto `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    verbose: bool,
}

impl TracingSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Verbose when `REDSCOUT_DEBUG` is set to a truthy value.
    pub fn from_env() -> Self {
        Self::new(env_truthy(DEBUG_ENV))
    }
}

impl DiagnosticSink for TracingSink {
    fn verbose(&self) -> bool {
        self.verbose
    }

    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic.level() {
            DiagnosticLevel::Error => tracing::error!(target: "redscout::interpret", "{diagnostic}"),
            DiagnosticLevel::Warn => tracing::warn!(target: "redscout::interpret", "{diagnostic}"),
            DiagnosticLevel::Debug => tracing::debug!(target: "redscout::interpret", "{diagnostic}"),
        }
    }
}

/// Keeps diagnostics in memory, for callers that report them themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    verbose: bool,
    seen: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new_verbose() -> Self {
        Self {
            verbose: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        match self.seen.lock() {
            Ok(mut seen) => std::mem::take(&mut *seen),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn verbose(&self) -> bool {
        self.verbose
    }

    fn emit(&self, diagnostic: Diagnostic) {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
