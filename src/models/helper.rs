use crate::image::Classifications;
use crate::models::ImageClassifier;
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use image::DynamicImage;
use std::time::{Duration, Instant};

type SetupFn = Box<dyn Fn() -> Result<ImageClassifier> + Send>;

/// Result of one classification request
#[derive(Debug, Clone)]
pub struct ClassificationOutput {
    pub classifications: Classifications,
    pub inference_time: Duration,
}

/// Owns the model handle and retries setup when it is missing.
pub struct ClassifierHelper {
    threshold: f32,
    setup: SetupFn,
    classifier: Option<ImageClassifier>,
    setup_error: Option<String>,
}

impl ClassifierHelper {
    /// Loads the model right away. A load failure is logged and kept in
    /// `setup_error`; it does not fail construction.
    pub fn new(config: &Config) -> Self {
        let config = config.clone();
        Self::with_setup(config.classifier_config.threshold, move || {
            ImageClassifier::new(&config)
        })
    }

    pub fn with_setup<F>(threshold: f32, setup: F) -> Self
    where
        F: Fn() -> Result<ImageClassifier> + Send + 'static,
    {
        let mut helper = Self {
            threshold,
            setup: Box::new(setup),
            classifier: None,
            setup_error: None,
        };
        if let Err(e) = helper.setup_image_classifier() {
            tracing::error!("{}", e);
        }
        helper
    }

    fn setup_image_classifier(&mut self) -> Result<()> {
        match (self.setup)() {
            Ok(classifier) => {
                self.classifier = Some(classifier);
                self.setup_error = None;
                Ok(())
            }
            Err(e) => {
                let message = match e {
                    ClassifierError::ModelSetup(msg) => msg,
                    other => other.to_string(),
                };
                self.classifier = None;
                self.setup_error = Some(message.clone());
                Err(ClassifierError::ModelSetup(message))
            }
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        crate::config::validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_some()
    }

    /// Message from the most recent failed setup, if the model is not loaded
    pub fn setup_error(&self) -> Option<&str> {
        self.setup_error.as_deref()
    }

    /// Reload the model if the last setup failed
    pub fn ensure_ready(&mut self) -> Result<&mut ImageClassifier> {
        if self.classifier.is_none() {
            tracing::info!("Image classifier not loaded, retrying setup");
            self.setup_image_classifier()?;
        }
        self.classifier
            .as_mut()
            .ok_or_else(|| ClassifierError::Internal("Classifier missing after setup".to_string()))
    }

    pub fn classify_static_image(&mut self, image: &DynamicImage) -> Result<ClassificationOutput> {
        let threshold = self.threshold;
        self.classify_with_threshold(image, threshold)
    }

    pub fn classify_with_threshold(
        &mut self,
        image: &DynamicImage,
        threshold: f32,
    ) -> Result<ClassificationOutput> {
        crate::config::validate_threshold(threshold)?;
        let classifier = self.ensure_ready()?;

        let tensor = classifier.processor().process(image)?;

        let start = Instant::now();
        let classifications = classifier.classify(&tensor, threshold)?;
        let inference_time = start.elapsed();

        tracing::debug!(
            "Inference finished: {} categories above {:.2} in {:.1}ms",
            classifications.categories.len(),
            threshold,
            inference_time.as_secs_f64() * 1000.0
        );

        Ok(ClassificationOutput {
            classifications,
            inference_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::image::TensorImage;
    use crate::models::{InferenceBackend, Labels};
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed(Vec<f32>);

    impl InferenceBackend for Fixed {
        fn run(&mut self, _input: &TensorImage) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 48, Rgb([120, 60, 30])))
    }

    fn working(scores: Vec<f32>) -> Result<ImageClassifier> {
        Ok(ImageClassifier::with_backend(
            Box::new(Fixed(scores)),
            Labels::from_lines("benign\nmalignant"),
            &ClassifierConfig::default(),
        ))
    }

    #[test]
    fn classifies_and_reports_timing() {
        let mut helper = ClassifierHelper::with_setup(0.3, || working(vec![0.92, 0.08]));
        assert!(helper.is_ready());

        let output = helper.classify_static_image(&image()).unwrap();
        assert_eq!(output.classifications.categories.len(), 1);
        assert_eq!(output.classifications.categories[0].label, "benign");
        assert!(output.inference_time < Duration::from_secs(5));
    }

    #[test]
    fn setup_failure_is_recorded_and_classify_surfaces_error() {
        let mut helper = ClassifierHelper::with_setup(0.3, || {
            Err(ClassifierError::ModelSetup("model file missing".to_string()))
        });
        assert!(!helper.is_ready());
        assert_eq!(helper.setup_error(), Some("model file missing"));

        for _ in 0..3 {
            let err = helper.classify_static_image(&image()).unwrap_err();
            assert!(matches!(err, ClassifierError::ModelSetup(_)));
        }
    }

    #[test]
    fn classify_retries_setup_after_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut helper = ClassifierHelper::with_setup(0.3, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ClassifierError::ModelSetup("not yet".to_string()))
            } else {
                working(vec![0.1, 0.9])
            }
        });
        assert!(!helper.is_ready());

        let output = helper.classify_static_image(&image()).unwrap();
        assert_eq!(output.classifications.categories[0].label, "malignant");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(helper.setup_error().is_none());
    }

    #[test]
    fn per_call_threshold_overrides_default() {
        let mut helper = ClassifierHelper::with_setup(0.3, || working(vec![0.6, 0.4]));
        let strict = helper.classify_with_threshold(&image(), 0.5).unwrap();
        assert_eq!(strict.classifications.categories.len(), 1);
        let loose = helper.classify_static_image(&image()).unwrap();
        assert_eq!(loose.classifications.categories.len(), 2);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let mut helper = ClassifierHelper::with_setup(0.3, || working(vec![0.6]));
        assert!(helper.set_threshold(2.0).is_err());
        assert!(helper.classify_with_threshold(&image(), -1.0).is_err());
    }
}
