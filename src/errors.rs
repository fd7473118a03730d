//! The error taxonomy from the design doc (§7): transient/not-found/conflict/
//! configuration/parse/fatal. Adapters and the arbiter raise these directly;
//! everything above them deals in `anyhow::Result` as usual.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transient error calling {service}: {source}")]
    TransientExternal {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("title already processed")]
    AlreadyProcessed,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to parse tag {0:?}")]
    Parse(String),

    #[error("fatal: {0}")]
    Fatal(#[source] anyhow::Error),
}

impl EngineError {
    /// true for errors that should abort only the current title and let the
    /// stage continue with the next one (§7: TransientExternal, NotFound).
    pub fn is_per_title(&self) -> bool {
        matches!(
            self,
            EngineError::TransientExternal { .. } | EngineError::NotFound { .. }
        )
    }
}
