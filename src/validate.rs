//! Pure input checks shared by the controllers.

use crate::error::ValidationError;
use std::path::{Path, PathBuf};

pub const SUPPORTED_IMAGE_EXTS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Trim a prompt and enforce non-emptiness and a maximum length in characters.
pub fn validate_prompt(text: &str, max_len: usize) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::PromptTooLong { max: max_len });
    }
    Ok(trimmed.to_string())
}

/// The file must exist and carry a supported image extension (case-insensitive).
pub fn validate_image_path(path: &Path) -> Result<PathBuf, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext {
        Some(ext) if SUPPORTED_IMAGE_EXTS.contains(&ext.as_str()) => Ok(path.to_path_buf()),
        Some(ext) => Err(ValidationError::UnsupportedFormat(format!(".{ext}"))),
        None => Err(ValidationError::UnsupportedFormat(String::new())),
    }
}

/// Prompt validation as a reusable helper owned by text-driven controllers.
#[derive(Debug, Clone, Copy)]
pub struct PromptValidator {
    pub max_len: usize,
}

impl PromptValidator {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn prepare(&self, prompt: &str) -> Result<String, ValidationError> {
        validate_prompt(prompt, self.max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_within_limit_is_trimmed() {
        assert_eq!(validate_prompt("hello", 10).unwrap(), "hello");
        assert_eq!(validate_prompt("  a house \n", 10).unwrap(), "a house");
        assert_eq!(validate_prompt(&"x".repeat(10), 10).unwrap().len(), 10);
    }

    #[test]
    fn empty_or_blank_prompt_is_rejected() {
        for p in ["", "   ", "\n\t "] {
            assert!(matches!(
                validate_prompt(p, 300),
                Err(ValidationError::EmptyPrompt)
            ));
        }
    }

    #[test]
    fn overlong_prompt_is_rejected() {
        let err = validate_prompt(&"y".repeat(301), 300).unwrap_err();
        assert!(matches!(err, ValidationError::PromptTooLong { max: 300 }));
        assert_eq!(err.to_string(), "Prompt too long (>300 chars).");
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let prompt = "é".repeat(5);
        assert!(validate_prompt(&prompt, 5).is_ok());
    }

    #[test]
    fn missing_image_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nope.png");
        assert!(matches!(
            validate_image_path(&p),
            Err(ValidationError::NotFound(_))
        ));
    }

    #[test]
    fn unsupported_or_missing_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["notes.txt", "archive.gif", "noext"] {
            let p = dir.path().join(name);
            std::fs::write(&p, b"x").unwrap();
            let err = validate_image_path(&p).unwrap_err();
            assert!(err.to_string().contains("Unsupported image format"), "{name}");
        }
    }

    #[test]
    fn supported_images_pass_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.jpg", "c.jpeg", "d.PNG"] {
            let p = dir.path().join(name);
            std::fs::write(&p, b"x").unwrap();
            assert_eq!(validate_image_path(&p).unwrap(), p);
        }
    }
}
