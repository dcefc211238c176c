use serde::{Deserialize, Serialize};
use std::fmt;

pub const NO_IMAGE_PLACEHOLDER: &str = "No image available";
pub const NO_PREDICTION_PLACEHOLDER: &str = "No predictions available";

/// What the analysis step hands to the results display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    pub image_uri: String,
    pub prediction: String,
}

/// Renders a result message. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultView {
    image_uri: Option<String>,
    prediction: Option<String>,
}

impl ResultView {
    pub fn new(image_uri: Option<String>, prediction: Option<String>) -> Self {
        Self {
            image_uri: image_uri.filter(|s| !s.trim().is_empty()),
            prediction: prediction.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn from_message(message: ResultMessage) -> Self {
        Self::new(Some(message.image_uri), Some(message.prediction))
    }

    pub fn image_text(&self) -> &str {
        self.image_uri.as_deref().unwrap_or(NO_IMAGE_PLACEHOLDER)
    }

    pub fn prediction_text(&self) -> &str {
        self.prediction.as_deref().unwrap_or(NO_PREDICTION_PLACEHOLDER)
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image:      {}", self.image_text())?;
        write!(f, "Prediction: {}", self.prediction_text())
    }
}
