use crate::config::{ClassifierConfig, OnnxConfig};
use crate::image::{Classifications, ImageProcessor, PixelType, ResultFormatter, TensorImage};
use crate::models::Labels;
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use ndarray::{Array3, Array4, Axis};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    tensor::TensorElementType,
    value::{Tensor, ValueType},
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TensorLayout {
    /// [batch, height, width, channels]
    Nhwc,
    /// [batch, channels, height, width]
    Nchw,
}

/// Turns a preprocessed image into one raw score per class.
pub trait InferenceBackend: Send {
    fn run(&mut self, input: &TensorImage) -> Result<Vec<f32>>;
}

pub struct OnnxBackend {
    session: Session,
    input_name: String,
    output_name: String,
    input_type: PixelType,
    layout: TensorLayout,
    normalize: bool,
}

impl OnnxBackend {
    pub fn new(
        model_path: &Path,
        onnx_config: &OnnxConfig,
        classifier_config: &ClassifierConfig,
    ) -> Result<Self> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelSetup(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(onnx_config.optimization_level))?
            .with_intra_threads(onnx_config.intra_threads)?
            .commit_from_file(model_path)?;

        let input = session.inputs.first().ok_or_else(|| {
            ClassifierError::ModelSetup("Classification model has no inputs".to_string())
        })?;
        let input_name = input.name.clone();
        let input_type = match &input.input_type {
            ValueType::Tensor { ty: TensorElementType::Uint8, .. } => PixelType::Uint8,
            ValueType::Tensor { ty: TensorElementType::Float32, .. } => PixelType::Float32,
            other => {
                return Err(ClassifierError::ModelSetup(format!(
                    "Unsupported model input type: {:?}",
                    other
                )))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(ClassifierError::ModelSetup(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "Classification model input: '{}' ({:?}, {:?}), output: '{}'",
            input_name,
            input_type,
            classifier_config.layout,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session,
            input_name,
            output_name,
            input_type,
            layout: classifier_config.layout,
            normalize: classifier_config.normalize,
        })
    }

    fn batched<T: Clone>(hwc: Array3<T>, layout: TensorLayout) -> Array4<T> {
        let nhwc = hwc.insert_axis(Axis(0));
        match layout {
            TensorLayout::Nhwc => nhwc,
            TensorLayout::Nchw => nhwc
                .permuted_axes([0, 3, 1, 2])
                .as_standard_layout()
                .into_owned(),
        }
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(&mut self, input: &TensorImage) -> Result<Vec<f32>> {
        let outputs = match self.input_type {
            PixelType::Uint8 => {
                let tensor = Tensor::from_array(Self::batched(input.to_u8(), self.layout))?;
                self.session.run(inputs![self.input_name.as_str() => tensor])?
            }
            PixelType::Float32 => {
                let tensor =
                    Tensor::from_array(Self::batched(input.to_f32(self.normalize), self.layout))?;
                self.session.run(inputs![self.input_name.as_str() => tensor])?
            }
        };

        let output = match outputs.get(self.output_name.as_str()) {
            Some(output) => output,
            None => {
                let available_outputs: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                return Err(ClassifierError::Inference(format!(
                    "Classification output '{}' not found. Available outputs: {:?}",
                    self.output_name, available_outputs
                )));
            }
        };

        // quantized heads report u8 scores
        let (shape, scores): (Vec<usize>, Vec<f32>) = match output.try_extract_array::<f32>() {
            Ok(array) => (array.shape().to_vec(), array.iter().copied().collect()),
            Err(_) => {
                let array = output.try_extract_array::<u8>()?;
                (
                    array.shape().to_vec(),
                    array.iter().map(|v| *v as f32 / 255.0).collect(),
                )
            }
        };

        if shape.len() > 1 && shape[0] != 1 {
            return Err(ClassifierError::Inference(format!(
                "Expected batch size 1 for classification, got shape {:?}",
                shape
            )));
        }

        Ok(scores)
    }
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// A loaded model plus the preprocessing and scoring around it
pub struct ImageClassifier {
    backend: Box<dyn InferenceBackend>,
    labels: Labels,
    processor: ImageProcessor,
    max_results: Option<usize>,
    apply_softmax: bool,
}

impl ImageClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let backend = OnnxBackend::new(
            &config.model_path(),
            &config.onnx_config,
            &config.classifier_config,
        )?;
        let labels = Labels::load_or_default(&config.labels_path())?;

        Ok(Self::with_backend(
            Box::new(backend),
            labels,
            &config.classifier_config,
        ))
    }

    pub fn with_backend(
        backend: Box<dyn InferenceBackend>,
        labels: Labels,
        classifier_config: &ClassifierConfig,
    ) -> Self {
        Self {
            backend,
            labels,
            processor: ImageProcessor::for_config(classifier_config),
            max_results: classifier_config.max_results,
            apply_softmax: classifier_config.apply_softmax,
        }
    }

    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }

    /// Run the model on an already preprocessed image
    pub fn classify(&mut self, input: &TensorImage, threshold: f32) -> Result<Classifications> {
        let scores = self.backend.run(input)?;

        if !self.labels.is_empty() && scores.len() != self.labels.len() {
            tracing::warn!(
                "Model returned {} scores but {} labels are loaded",
                scores.len(),
                self.labels.len()
            );
        }

        Ok(ResultFormatter::build_classifications(
            0,
            &scores,
            &self.labels,
            threshold,
            self.max_results,
            self.apply_softmax,
        ))
    }
}
