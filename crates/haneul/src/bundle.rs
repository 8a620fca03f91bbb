//! # Model Bundle
//!
//! A [`ModelBundle`] is built once at startup from a [`BundleConfig`]:
//! the checkpoint is resolved, its metadata read, the network built for the
//! recorded (or configured) architecture and class list, and the state
//! loaded. It is immutable afterwards; callers share it by handle.
//!
//! Setting precedence is: explicit config, then checkpoint metadata, then
//! the defaults here ([`DEFAULT_ARCHITECTURE`], [`DEFAULT_IMAGE_SIZE`],
//! [`crate::catalog::CLOUD_CLASSES`]).

use crate::cache::{ArtifactFetcher, ResolverConfig, resolve_checkpoint};
use crate::catalog::default_class_names;
use crate::checkpoint::{CheckpointContainer, load_state};
use crate::errors::{self, HaneulError};
use crate::models::prefabs::lookup_prefab;
use crate::models::{Architecture, CloudClassifier};
use crate::predict::{PredictionOutcome, PredictionReport, Predictor, ReportMeta};
use crate::preprocess::{PreprocessConfig, Preprocessor};
use burn::config::Config;
use burn::prelude::Backend;
use std::path::PathBuf;

/// Architecture used when neither config nor checkpoint names one.
pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::ResNet18;

/// Image size used when neither config nor checkpoint names one.
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// [`ModelBundle`] configuration.
#[derive(Config, Debug)]
pub struct BundleConfig {
    /// Checkpoint source.
    #[config(default = "ResolverConfig::new()")]
    pub resolver: ResolverConfig,

    /// Architecture tag override.
    #[config(default = "None")]
    pub architecture: Option<String>,

    /// Image size override.
    #[config(default = "None")]
    pub image_size: Option<usize>,

    /// Class list override.
    #[config(default = "None")]
    pub classes: Option<Vec<String>>,

    /// Shorter-side resize ratio of the preprocessor.
    #[config(default = 1.15)]
    pub resize_ratio: f64,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The loaded network and everything needed to run it.
#[derive(Debug, Clone)]
pub struct ModelBundle<B: Backend> {
    network: CloudClassifier<B>,
    device: B::Device,
    class_names: Vec<String>,
    image_size: usize,
    run_name: Option<String>,
    checkpoint_path: Option<PathBuf>,
    preprocessor: Preprocessor,
}

impl<B: Backend> ModelBundle<B> {
    /// Resolve, build and load.
    ///
    /// # Errors
    ///
    /// Any load-time [`HaneulError`]; none of them are recoverable.
    pub fn load(
        config: &BundleConfig,
        fetcher: &dyn ArtifactFetcher,
        device: &B::Device,
    ) -> errors::Result<Self> {
        let checkpoint_path = resolve_checkpoint(&config.resolver, fetcher)?;
        let container = CheckpointContainer::read(&checkpoint_path)?;
        let metadata = &container.metadata;

        let tag = config
            .architecture
            .clone()
            .or_else(|| metadata.architecture.clone());
        let architecture = match tag {
            Some(tag) => Architecture::parse(&tag)?,
            None => DEFAULT_ARCHITECTURE,
        };
        let class_names = config
            .classes
            .clone()
            .or_else(|| metadata.classes.clone())
            .unwrap_or_else(default_class_names);
        let image_size = config
            .image_size
            .or(metadata.image_size)
            .unwrap_or(DEFAULT_IMAGE_SIZE);
        let run_name = metadata.run_name.clone();

        if class_names.is_empty() {
            return Err(HaneulError::Configuration(
                "class list is empty".to_string(),
            ));
        }

        let network = lookup_prefab(architecture)
            .new_config(class_names.len())
            .init::<B>(device);
        let (network, _) = load_state(network, container, device)?;

        let bundle = Self::assemble(
            network,
            class_names,
            PreprocessConfig::new()
                .with_image_size(image_size)
                .with_resize_ratio(config.resize_ratio),
            device,
            run_name,
            Some(checkpoint_path),
        )?;

        tracing::info!(
            architecture = %bundle.architecture(),
            num_classes = bundle.num_classes(),
            image_size = bundle.image_size,
            device = %bundle.device_name(),
            run_name = bundle.run_name.as_deref().unwrap_or("unknown"),
            "model loaded"
        );
        Ok(bundle)
    }

    /// Assemble from an already loaded network.
    ///
    /// # Errors
    ///
    /// [`HaneulError::ClassCountMismatch`] when the class list and output
    /// width differ.
    pub fn from_parts(
        network: CloudClassifier<B>,
        class_names: Vec<String>,
        image_size: usize,
        device: &B::Device,
    ) -> errors::Result<Self> {
        Self::assemble(
            network,
            class_names,
            PreprocessConfig::new().with_image_size(image_size),
            device,
            None,
            None,
        )
    }

    fn assemble(
        network: CloudClassifier<B>,
        class_names: Vec<String>,
        preprocess: PreprocessConfig,
        device: &B::Device,
        run_name: Option<String>,
        checkpoint_path: Option<PathBuf>,
    ) -> errors::Result<Self> {
        let outputs = network.num_classes();
        if class_names.len() != outputs {
            return Err(HaneulError::ClassCountMismatch {
                classes: class_names.len(),
                outputs,
            });
        }
        Ok(ModelBundle {
            network,
            device: device.clone(),
            class_names,
            image_size: preprocess.image_size,
            run_name,
            checkpoint_path,
            preprocessor: preprocess.init()?,
        })
    }

    /// Attach a run name.
    pub fn with_run_name(
        mut self,
        run_name: Option<String>,
    ) -> Self {
        self.run_name = run_name;
        self
    }

    /// The network.
    pub fn network(&self) -> &CloudClassifier<B> {
        &self.network
    }

    /// The compute device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Lowercase device name for display.
    pub fn device_name(&self) -> String {
        format!("{:?}", self.device).to_lowercase()
    }

    /// Class names, in output order.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// The network family.
    pub fn architecture(&self) -> Architecture {
        self.network.architecture()
    }

    /// Input image size.
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Training run name, if the checkpoint recorded one.
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Where the checkpoint was read from.
    pub fn checkpoint_path(&self) -> Option<&PathBuf> {
        self.checkpoint_path.as_ref()
    }

    /// The input transform.
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Model facts for reports.
    pub fn report_meta(&self) -> ReportMeta {
        ReportMeta {
            image_size: self.image_size,
            device: self.device_name(),
            architecture: self.architecture().to_string(),
            run_name: self.run_name.clone(),
        }
    }

    /// Decode, preprocess and classify encoded image bytes.
    ///
    /// # Errors
    ///
    /// [`HaneulError::Decode`] for unreadable images,
    /// [`HaneulError::UnsupportedImage`] for extreme aspect ratios,
    /// [`HaneulError::Inference`] for forward-pass failures.
    pub fn classify(
        &self,
        image_bytes: &[u8],
        predictor: &Predictor,
    ) -> errors::Result<PredictionOutcome> {
        let input = self
            .preprocessor
            .apply_bytes::<B>(image_bytes, &self.device)?;
        predictor.predict(&self.network, input, &self.class_names)
    }

    /// [`Self::classify`], with catalog text and model facts attached.
    pub fn report(
        &self,
        image_bytes: &[u8],
        predictor: &Predictor,
    ) -> errors::Result<PredictionReport> {
        let outcome = self.classify(image_bytes, predictor)?;
        Ok(PredictionReport::new(
            &outcome,
            &predictor.config().flags,
            self.report_meta(),
        ))
    }
}
