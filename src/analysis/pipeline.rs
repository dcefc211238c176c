use crate::{
    analysis::{ClassifyOptions, ClassifyResponse},
    image::{ImageLoader, ResultFormatter},
    models::ClassifierHelper,
    utils::error::ClassifierError,
    Result,
};
use image::DynamicImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Request path used by the HTTP handlers
#[derive(Clone)]
pub struct AnalysisPipeline {
    classifier: Arc<Mutex<ClassifierHelper>>,
}

impl AnalysisPipeline {
    pub fn new(classifier: Arc<Mutex<ClassifierHelper>>) -> Self {
        Self { classifier }
    }

    pub async fn process_base64(&self, base64_data: &str, options: ClassifyOptions) -> Result<ClassifyResponse> {
        let start_time = Instant::now();
        let image = ImageLoader::from_base64(base64_data)?;
        self.process_image(image, options, start_time).await
    }

    pub async fn process_bytes(&self, bytes: &[u8], options: ClassifyOptions) -> Result<ClassifyResponse> {
        let start_time = Instant::now();
        let image = ImageLoader::from_bytes(bytes)?;
        self.process_image(image, options, start_time).await
    }

    async fn process_image(
        &self,
        image: DynamicImage,
        options: ClassifyOptions,
        start_time: Instant,
    ) -> Result<ClassifyResponse> {
        let classifier = Arc::clone(&self.classifier);
        let requested_threshold = options.threshold;

        // one inference at a time, off the async workers
        let (output, threshold) = tokio::task::spawn_blocking(move || {
            let mut helper = classifier.lock();
            let threshold = requested_threshold.unwrap_or_else(|| helper.threshold());
            helper
                .classify_with_threshold(&image, threshold)
                .map(|output| (output, threshold))
        })
        .await
        .map_err(|e| ClassifierError::Internal(format!("Inference task failed: {}", e)))??;

        let mut categories = output.classifications.categories;
        if let Some(max) = options.max_results.filter(|n| *n > 0) {
            categories.truncate(max);
        }

        let top = ResultFormatter::top_category(&categories)
            .cloned()
            .ok_or(ClassifierError::NoPredictions)?;
        let prediction = ResultFormatter::format_prediction(&top);
        let processing_time = start_time.elapsed();

        tracing::info!(
            "Classification completed: prediction='{}', categories={}, total_time={:.3}s",
            prediction,
            categories.len(),
            processing_time.as_secs_f32()
        );

        Ok(ClassifyResponse {
            prediction,
            top,
            classifications: categories,
            threshold,
            inference_time_ms: output.inference_time.as_secs_f64() * 1000.0,
            processing_time: processing_time.as_secs_f32(),
        })
    }
}
