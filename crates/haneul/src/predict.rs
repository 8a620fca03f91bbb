//! # Prediction
//!
//! Forward pass, softmax, top-k decoding, and the confidence heuristics:
//!
//! * [`ConfidenceLevel`] from the top two probabilities ([`ConfidenceThresholds`]);
//! * [`ConfidenceAssessment`] flags over the full distribution ([`FlagThresholds`]).
//!
//! [`PredictionReport`] attaches catalog text and model metadata for display.

use crate::catalog;
use crate::errors::{self, HaneulError};
use crate::models::CloudClassifier;
use burn::config::Config;
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::softmax;
use serde::Serialize;
use std::fmt;

/// Added inside the entropy logarithm.
pub const ENTROPY_EPSILON: f64 = 1e-12;

/// Slack for threshold comparisons, so decimal boundaries are inclusive.
const THRESHOLD_SLACK: f64 = 1e-9;

fn at_least(
    value: f64,
    threshold: f64,
) -> bool {
    value + THRESHOLD_SLACK >= threshold
}

/// Decision table for [`ConfidenceLevel`].
#[derive(Config, Debug, PartialEq)]
pub struct ConfidenceThresholds {
    /// Minimum top-1 probability for ``high``.
    #[config(default = 0.60)]
    pub high_top1: f64,

    /// Minimum top-1 / top-2 gap for ``high``.
    #[config(default = 0.15)]
    pub high_gap: f64,

    /// Minimum top-1 probability for ``medium``.
    #[config(default = 0.45)]
    pub medium_top1: f64,

    /// Minimum top-1 / top-2 gap for ``medium``.
    #[config(default = 0.08)]
    pub medium_gap: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self::new()
    }
}

/// Thresholds for the [`ConfidenceAssessment`] flags.
#[derive(Config, Debug, PartialEq)]
pub struct FlagThresholds {
    /// ``low_confidence`` when top-1 is below this.
    #[config(default = 0.45)]
    pub low_confidence: f64,

    /// ``possible_mixed_class`` when the top-1 / top-2 gap is below this.
    #[config(default = 0.10)]
    pub mixed_gap: f64,

    /// ``high_entropy`` when the entropy exceeds this.
    #[config(default = 2.0)]
    pub entropy: f64,
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Predictor`] configuration.
#[derive(Config, Debug)]
pub struct PredictorConfig {
    /// Number of ranked predictions to return.
    #[config(default = 3)]
    pub top_k: usize,

    /// Confidence level decision table.
    #[config(default = "ConfidenceThresholds::new()")]
    pub confidence: ConfidenceThresholds,

    /// Flag thresholds.
    #[config(default = "FlagThresholds::new()")]
    pub flags: FlagThresholds,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorConfig {
    /// Build a [`Predictor`].
    pub fn init(&self) -> Predictor {
        Predictor {
            config: self.clone(),
        }
    }
}

/// Coarse confidence in the top prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// Clear winner.
    High,

    /// Likely, with a close runner-up.
    Medium,

    /// Uncertain.
    Low,
}

impl ConfidenceLevel {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Class index in the network output.
    pub index: usize,

    /// Class name.
    pub label: String,

    /// Softmax probability.
    pub probability: f64,
}

/// Distribution-level uncertainty flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceAssessment {
    /// Top-1 below the low-confidence threshold.
    pub low_confidence: bool,

    /// Top-1 / top-2 gap below the mixed-class threshold.
    ///
    /// Always false with a single class.
    pub possible_mixed_class: bool,

    /// Entropy above the entropy threshold.
    pub high_entropy: bool,

    /// Shannon entropy in nats.
    pub entropy: f64,
}

/// The decoded result of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    /// Full softmax distribution, in class order.
    pub probabilities: Vec<f64>,

    /// Top-k, by descending probability.
    pub predictions: Vec<Prediction>,

    /// Confidence level.
    pub level: ConfidenceLevel,

    /// Uncertainty flags.
    pub assessment: ConfidenceAssessment,
}

/// Softmax of ``[1, C]`` logits, as probabilities in class order.
pub fn softmax_probabilities<B: Backend>(logits: Tensor<B, 2>) -> errors::Result<Vec<f64>> {
    let [batch, _classes] = logits.dims();
    if batch != 1 {
        return Err(HaneulError::Inference(format!(
            "expected logits for one image, got a batch of {batch}"
        )));
    }
    let values = softmax(logits, 1)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| HaneulError::Inference(format!("{e:?}")))?;
    Ok(values.into_iter().map(f64::from).collect())
}

/// The `k` most probable classes, with `k` clamped to ``[1, C]``.
///
/// Ties keep class-index order.
pub fn top_k(
    probabilities: &[f64],
    class_names: &[String],
    k: usize,
) -> Vec<Prediction> {
    let k = k.clamp(1, probabilities.len().max(1));
    let mut order = (0..probabilities.len()).collect::<Vec<_>>();
    // Stable sort: equal probabilities stay in index order.
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    order
        .into_iter()
        .take(k)
        .map(|index| Prediction {
            index,
            label: class_names
                .get(index)
                .cloned()
                .unwrap_or_else(|| index.to_string()),
            probability: probabilities[index],
        })
        .collect()
}

/// Shannon entropy ``-sum(p * ln(p + eps))``, never negative.
pub fn entropy(probabilities: &[f64]) -> f64 {
    let h = -probabilities
        .iter()
        .map(|&p| p * (p + ENTROPY_EPSILON).ln())
        .sum::<f64>();
    h.max(0.0)
}

/// The top two probabilities; top-2 is 0 with a single class.
fn top_two(probabilities: &[f64]) -> (f64, f64) {
    let mut sorted = probabilities.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    (
        sorted.first().copied().unwrap_or(0.0),
        sorted.get(1).copied().unwrap_or(0.0),
    )
}

impl ConfidenceThresholds {
    /// Classify from the top two probabilities.
    pub fn level(
        &self,
        top1: f64,
        top2: f64,
    ) -> ConfidenceLevel {
        let gap = top1 - top2;
        if at_least(top1, self.high_top1) && at_least(gap, self.high_gap) {
            ConfidenceLevel::High
        } else if at_least(top1, self.medium_top1) && at_least(gap, self.medium_gap) {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl FlagThresholds {
    /// Flag a full probability distribution.
    pub fn assess(
        &self,
        probabilities: &[f64],
    ) -> ConfidenceAssessment {
        let (top1, top2) = top_two(probabilities);
        let entropy = entropy(probabilities);
        ConfidenceAssessment {
            low_confidence: !at_least(top1, self.low_confidence),
            possible_mixed_class: probabilities.len() > 1
                && !at_least(top1 - top2, self.mixed_gap),
            high_entropy: entropy > self.entropy,
            entropy,
        }
    }
}

/// Runs the network and decodes its output.
#[derive(Debug, Clone)]
pub struct Predictor {
    config: PredictorConfig,
}

impl Default for Predictor {
    fn default() -> Self {
        PredictorConfig::new().init()
    }
}

impl Predictor {
    /// The active configuration.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Decode a probability distribution.
    pub fn decode(
        &self,
        probabilities: Vec<f64>,
        class_names: &[String],
    ) -> PredictionOutcome {
        let predictions = top_k(&probabilities, class_names, self.config.top_k);
        let (top1, top2) = top_two(&probabilities);
        PredictionOutcome {
            level: self.config.confidence.level(top1, top2),
            assessment: self.config.flags.assess(&probabilities),
            predictions,
            probabilities,
        }
    }

    /// Classify one preprocessed ``[1, 3, H, W]`` image.
    ///
    /// # Errors
    ///
    /// [`HaneulError::Inference`] when the output width differs from the class
    /// list or the output cannot be read back.
    pub fn predict<B: Backend>(
        &self,
        network: &CloudClassifier<B>,
        input: Tensor<B, 4>,
        class_names: &[String],
    ) -> errors::Result<PredictionOutcome> {
        let logits = network.forward(input);
        let [_, classes] = logits.dims();
        if classes != class_names.len() {
            return Err(HaneulError::Inference(format!(
                "network produced {classes} scores for {} classes",
                class_names.len()
            )));
        }
        let probabilities = softmax_probabilities(logits)?;
        Ok(self.decode(probabilities, class_names))
    }
}

/// A ranked class with catalog text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    /// Class code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Probability, rounded to 4 decimals.
    pub confidence: f64,

    /// Description.
    pub description: String,
}

/// Flags with the thresholds that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFlags {
    /// Flag values.
    #[serde(flatten)]
    pub assessment: ConfidenceAssessment,

    /// Thresholds in effect.
    pub thresholds: FlagThresholds,
}

/// Model facts echoed into each report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMeta {
    /// Input image size.
    pub image_size: usize,

    /// Compute device.
    pub device: String,

    /// Architecture tag.
    pub architecture: String,

    /// Training run name, if known.
    pub run_name: Option<String>,
}

/// A display-ready prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    /// Ranked classes.
    pub predictions: Vec<ReportEntry>,

    /// Confidence level.
    pub confidence_level: ConfidenceLevel,

    /// Message for the confidence level.
    pub confidence_text: String,

    /// Uncertainty flags.
    pub flags: ReportFlags,

    /// Photography tips; only for ``low`` confidence.
    pub tips: Vec<String>,

    /// Model facts.
    pub meta: ReportMeta,
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

impl PredictionReport {
    /// Attach catalog text and model facts to an outcome.
    pub fn new(
        outcome: &PredictionOutcome,
        thresholds: &FlagThresholds,
        meta: ReportMeta,
    ) -> Self {
        let predictions = outcome
            .predictions
            .iter()
            .map(|p| {
                let (name, description) = catalog::lookup(&p.label);
                ReportEntry {
                    code: p.label.clone(),
                    name,
                    confidence: round4(p.probability),
                    description,
                }
            })
            .collect();

        PredictionReport {
            predictions,
            confidence_level: outcome.level,
            confidence_text: catalog::confidence_text(outcome.level).to_string(),
            flags: ReportFlags {
                assessment: outcome.assessment.clone(),
                thresholds: thresholds.clone(),
            },
            tips: catalog::tips_for(outcome.level),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tiny_resnet;
    use burn::backend::NdArray;
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{i}")).collect()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::from_floats([[2.0, -1.0, 0.5, 8.0, -3.0]], &device);
        let probs = softmax_probabilities(logits).unwrap();
        assert_eq!(probs.len(), 5);
        assert_that!(probs.iter().sum::<f64>(), close_to(1.0, 1e-5));
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_softmax_rejects_batches() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::zeros([2, 3], &device);
        assert!(matches!(
            softmax_probabilities(logits),
            Err(HaneulError::Inference(_))
        ));
    }

    #[test]
    fn test_top_k_clamps_and_orders() {
        let probs = vec![0.1, 0.4, 0.2, 0.3];
        let labels = names(4);

        let top = top_k(&probs, &labels, 3);
        assert_eq!(
            top.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![1, 3, 2]
        );
        assert_eq!(top[0].label, "c1");

        assert_eq!(top_k(&probs, &labels, 0).len(), 1);
        assert_eq!(top_k(&probs, &labels, 10).len(), 4);
    }

    #[test]
    fn test_top_k_ties_keep_index_order() {
        let probs = vec![0.25, 0.25, 0.25, 0.25];
        let top = top_k(&probs, &names(4), 4);
        assert_eq!(
            top.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_entropy_extremes() {
        assert_that!(entropy(&[0.0, 1.0, 0.0]), close_to(0.0, 1e-9));

        for n in [2usize, 3, 11] {
            let uniform = vec![1.0 / n as f64; n];
            assert_that!(entropy(&uniform), close_to((n as f64).ln(), 1e-9));
        }
    }

    #[test]
    fn test_level_boundaries() {
        let thresholds = ConfidenceThresholds::new();
        assert_eq!(thresholds.level(0.60, 0.45), ConfidenceLevel::High);
        assert_eq!(thresholds.level(0.59, 0.30), ConfidenceLevel::Medium);
        assert_eq!(thresholds.level(0.60, 0.46), ConfidenceLevel::Medium);
        assert_eq!(thresholds.level(0.45, 0.37), ConfidenceLevel::Medium);
        assert_eq!(thresholds.level(0.45, 0.38), ConfidenceLevel::Low);
        assert_eq!(thresholds.level(0.44, 0.10), ConfidenceLevel::Low);
        assert_eq!(thresholds.level(1.0, 0.0), ConfidenceLevel::High);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = ConfidenceThresholds::new().with_high_top1(0.9);
        assert_eq!(thresholds.level(0.8, 0.1), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_flags() {
        let flags = FlagThresholds::new();

        let clear = flags.assess(&[0.9, 0.05, 0.05]);
        assert!(!clear.low_confidence);
        assert!(!clear.possible_mixed_class);
        assert!(!clear.high_entropy);

        let mixed = flags.assess(&[0.40, 0.35, 0.25]);
        assert!(mixed.low_confidence);
        assert!(mixed.possible_mixed_class);

        let single = flags.assess(&[1.0]);
        assert!(!single.possible_mixed_class);
        assert!(!single.low_confidence);
        assert_that!(single.entropy, close_to(0.0, 1e-9));

        let spread = flags.assess(&vec![1.0 / 11.0; 11]);
        assert!(spread.high_entropy);
    }

    #[test]
    fn test_uniform_three_class_scenario() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::from_floats([[0.0, 0.0, 0.0]], &device);
        let probs = softmax_probabilities(logits).unwrap();

        let outcome = Predictor::default().decode(probs, &names(3));
        assert_eq!(outcome.level, ConfidenceLevel::Low);
        assert_eq!(outcome.predictions.len(), 3);
        for p in &outcome.predictions {
            assert_that!(p.probability, close_to(1.0 / 3.0, 1e-6));
        }
        assert!(outcome.assessment.low_confidence);
        assert!(outcome.assessment.possible_mixed_class);
        assert_that!(outcome.assessment.entropy, close_to(3f64.ln(), 1e-5));
        assert!(!outcome.assessment.high_entropy);
    }

    #[test]
    fn test_predict_with_network() {
        let device = Default::default();
        let network = tiny_resnet::<B>(3, &device);
        let predictor = PredictorConfig::new().with_top_k(2).init();

        let input = Tensor::<B, 4>::ones([1, 3, 32, 32], &device);
        let outcome = predictor
            .predict(&network, input.clone(), &names(3))
            .unwrap();
        assert_eq!(outcome.predictions.len(), 2);
        assert_that!(outcome.probabilities.iter().sum::<f64>(), close_to(1.0, 1e-5));

        assert!(matches!(
            predictor.predict(&network, input, &names(4)),
            Err(HaneulError::Inference(_))
        ));
    }

    #[test]
    fn test_report_shape() {
        let outcome = Predictor::default().decode(vec![0.5, 0.3, 0.2], &[
            "Cu".to_string(),
            "Xx".to_string(),
            "Sc".to_string(),
        ]);
        let report = PredictionReport::new(&outcome, &FlagThresholds::new(), ReportMeta {
            image_size: 224,
            device: "cpu".to_string(),
            architecture: "resnet18".to_string(),
            run_name: None,
        });

        assert_eq!(report.confidence_level, ConfidenceLevel::Medium);
        assert!(report.tips.is_empty());
        assert_eq!(report.predictions[0].name, "적운");
        assert_eq!(report.predictions[1].description, catalog::UNKNOWN_DESCRIPTION);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["confidence_level"], "medium");
        assert_eq!(json["predictions"][0]["code"], "Cu");
        assert_eq!(json["predictions"][0]["confidence"], 0.5);
        assert_eq!(json["flags"]["possible_mixed_class"], false);
        assert_eq!(json["flags"]["thresholds"]["mixed_gap"], 0.1);
        assert_eq!(json["meta"]["architecture"], "resnet18");
    }
}
