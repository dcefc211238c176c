use crate::analysis::ResultMessage;
use crate::image::{Classifications, ImageLoader, ResultFormatter};
use crate::models::ClassifierHelper;
use crate::utils::error::ClassifierError;
use crate::Result;
use image::DynamicImage;

/// Drives one selected image through classification
pub struct AnalysisController {
    helper: ClassifierHelper,
    current_image: Option<String>,
    last_classifications: Option<Classifications>,
}

impl AnalysisController {
    pub fn new(helper: ClassifierHelper) -> Self {
        Self {
            helper,
            current_image: None,
            last_classifications: None,
        }
    }

    pub fn select_image(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        tracing::debug!("Selected image: {}", reference);
        self.current_image = Some(reference);
    }

    pub fn clear_selection(&mut self) {
        self.current_image = None;
    }

    pub fn current_image(&self) -> Option<&str> {
        self.current_image.as_deref()
    }

    /// Full ranked result of the most recent successful classification
    pub fn last_classifications(&self) -> Option<&Classifications> {
        self.last_classifications.as_ref()
    }

    /// Classify the selected image and build the message for the results display
    pub fn analyze(&mut self) -> Result<ResultMessage> {
        self.last_classifications = None;
        let reference = self
            .current_image
            .clone()
            .ok_or(ClassifierError::NoImageSelected)?;
        let image = ImageLoader::from_reference(&reference)?;
        self.analyze_image(reference, &image)
    }

    pub fn analyze_image(&mut self, reference: String, image: &DynamicImage) -> Result<ResultMessage> {
        self.last_classifications = None;
        let output = self.helper.classify_static_image(image)?;

        tracing::info!(
            "Classified {}: {} categories in {}ms",
            reference,
            output.classifications.categories.len(),
            output.inference_time.as_millis()
        );

        let message = Self::prediction_message(reference, &output.classifications);
        self.last_classifications = Some(output.classifications);
        message
    }

    /// Picks the top category; an empty result is `NoPredictions`
    pub fn prediction_message(
        image_uri: String,
        classifications: &Classifications,
    ) -> Result<ResultMessage> {
        let top = ResultFormatter::top_category(&classifications.categories)
            .ok_or(ClassifierError::NoPredictions)?;

        Ok(ResultMessage {
            image_uri,
            prediction: ResultFormatter::format_prediction(top),
        })
    }

    /// Short text to show the user for a failed analysis
    pub fn user_message(err: &ClassifierError) -> String {
        match err {
            ClassifierError::NoPredictions | ClassifierError::NoImageSelected => err.to_string(),
            other => format!("Error: {}", other),
        }
    }
}
