use crate::Result;
use std::borrow::Cow;
use std::path::Path;

/// Class names indexed by model output position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    /// One label per line; blank lines are skipped
    pub fn from_lines(text: &str) -> Self {
        Self {
            names: text
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let labels = Self::from_lines(&text);
        tracing::info!("Loaded {} labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    /// Labels file is optional: a missing file falls back to index names.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(
                "Labels file not found: {}, using class indices as labels",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn get(&self, index: usize) -> Cow<'_, str> {
        match self.names.get(index) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(index.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
