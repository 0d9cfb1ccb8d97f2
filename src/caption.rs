use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const NAME_TOKEN: &str = "{name}";

/// Caption template loaded once at startup. The only substitution supported
/// is literal replacement of `{name}` with the contact's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionTemplate {
    template: String,
}

impl CaptionTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let template = fs::read_to_string(path)
            .with_context(|| format!("Failed to read caption template {}", path.display()))?;
        Ok(Self {
            template: template.trim().to_string(),
        })
    }

    /// Used when the template file is missing or empty; the run proceeds
    /// without a caption.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    pub fn render(&self, name: &str) -> String {
        self.template.replace(NAME_TOKEN, name)
    }
}
