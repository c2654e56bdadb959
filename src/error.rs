use std::path::PathBuf;

/// Bad user input. Reported immediately, never retried.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Prompt cannot be empty.")]
    EmptyPrompt,
    #[error("Prompt too long (>{max} chars).")]
    PromptTooLong { max: usize },
    #[error("Image not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// Everything that can go wrong at a controller boundary.
///
/// The `Display` output is what ends up in the `error` field of a failed
/// result record.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("not loaded")]
    NotLoaded,
    #[error("{0:#}")]
    Pipeline(anyhow::Error),
    #[error("{0:#}")]
    Persist(anyhow::Error),
    #[error("background worker failed: {0}")]
    Worker(String),
}

impl ControllerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ControllerError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn messages_match_user_facing_wording() {
        assert_eq!(ControllerError::NotLoaded.to_string(), "not loaded");
        let e: ControllerError = ValidationError::UnsupportedFormat(".txt".into()).into();
        assert_eq!(e.to_string(), "Unsupported image format: .txt");
        assert!(e.is_validation());
    }

    #[test]
    fn pipeline_errors_keep_their_context_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("out of memory"));
        let err = inner.context("generation failed").unwrap_err();
        let e = ControllerError::Pipeline(err);
        assert_eq!(e.to_string(), "generation failed: out of memory");
    }
}
