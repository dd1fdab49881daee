use thiserror::Error;

/// A step of the research state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    Search,
    Decide,
    Plan,
    Curate,
    Synthesize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::Search => write!(f, "search"),
            Stage::Decide => write!(f, "decide"),
            Stage::Plan => write!(f, "plan"),
            Stage::Curate => write!(f, "curate"),
            Stage::Synthesize => write!(f, "synthesize"),
        }
    }
}

/// A fatal research-run failure. No partial report is produced.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("{stage} stage failed: {source}")]
    Generation {
        stage: Stage,
        source: ds_core::Error,
    },

    #[error("precondition violated in {stage} stage: {message}")]
    Precondition { stage: Stage, message: String },

    #[error("{stage} stage received an empty response")]
    EmptyResponse { stage: Stage },

    #[error("failed to render prompt template '{name}': {message}")]
    Template { name: String, message: String },
}

impl ResearchError {
    pub fn generation(stage: Stage, source: ds_core::Error) -> Self {
        Self::Generation { stage, source }
    }

    pub fn precondition(stage: Stage, message: impl Into<String>) -> Self {
        Self::Precondition {
            stage,
            message: message.into(),
        }
    }

    /// The stage the failure occurred in, when known.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Generation { stage, .. }
            | Self::Precondition { stage, .. }
            | Self::EmptyResponse { stage } => Some(*stage),
            Self::Template { .. } => None,
        }
    }

    /// True when the underlying service failure may clear up on a rerun.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generation { source, .. } if source.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage() {
        let err = ResearchError::precondition(Stage::Plan, "no search result");
        assert_eq!(err.to_string(), "precondition violated in plan stage: no search result");
        assert_eq!(err.failed_stage(), Some(Stage::Plan));

        let err = ResearchError::generation(Stage::Synthesize, ds_core::Error::network("reset"));
        assert!(err.to_string().starts_with("synthesize stage failed"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_transient());
        assert!(!ResearchError::EmptyResponse { stage: Stage::Synthesize }.is_transient());
    }
}
