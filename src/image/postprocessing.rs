use crate::models::Labels;
use serde::{Deserialize, Serialize};

/// Label shown when the model returned a category without a name
pub const MISSING_LABEL: &str = "No label";

/// One scored class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Class index in the model output
    pub index: usize,
    pub label: String,
    /// Confidence score (0.0 - 1.0)
    pub score: f32,
}

/// Categories produced by one output head, sorted by descending score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classifications {
    pub head_index: usize,
    pub categories: Vec<Category>,
}

impl Classifications {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

pub struct ResultFormatter;

impl ResultFormatter {
    /// Turn raw model scores into thresholded, ranked categories
    pub fn build_classifications(
        head_index: usize,
        scores: &[f32],
        labels: &Labels,
        threshold: f32,
        max_results: Option<usize>,
        apply_softmax: bool,
    ) -> Classifications {
        let scores = if apply_softmax {
            Self::softmax(scores)
        } else {
            scores.to_vec()
        };

        let mut categories: Vec<Category> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| !score.is_nan())
            .map(|(index, score)| Category {
                index,
                label: labels.get(index).into_owned(),
                score: score.clamp(0.0, 1.0),
            })
            .filter(|category| category.score >= threshold)
            .collect();

        // stable: equal scores keep model order
        categories.sort_by(|a, b| b.score.total_cmp(&a.score));

        if let Some(max) = max_results {
            categories.truncate(max);
        }

        Classifications {
            head_index,
            categories,
        }
    }

    pub fn softmax(logits: &[f32]) -> Vec<f32> {
        let max = logits
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return logits.to_vec();
        }

        let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
        let sum: f32 = exps.iter().filter(|v| !v.is_nan()).sum();
        if sum <= 0.0 {
            return exps;
        }
        exps.into_iter().map(|v| v / sum).collect()
    }

    /// Highest-scoring category; ties resolve to any maximal entry
    pub fn top_category(categories: &[Category]) -> Option<&Category> {
        categories.iter().max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// `"{label} {percent}%"`, percent truncated toward zero
    pub fn format_prediction(category: &Category) -> String {
        let label = if category.label.trim().is_empty() {
            MISSING_LABEL
        } else {
            category.label.as_str()
        };
        let percent = (category.score * 100.0) as i32;
        format!("{} {}%", label, percent)
    }

    pub fn format_plain_text(classifications: &Classifications) -> String {
        classifications
            .categories
            .iter()
            .map(|c| format!("{:<24} {:>6.2}%", c.label, c.score * 100.0))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
