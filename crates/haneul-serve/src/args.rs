//! Command line and environment settings.

use crate::routes::{DEFAULT_MAX_UPLOAD_BYTES, RouterOptions};
use clap::Parser;
use haneul::bundle::BundleConfig;
use haneul::cache::ResolverConfig;
use haneul::cache::resolver::{DEFAULT_ENDPOINT, DEFAULT_FILENAME};
use haneul::predict::{ConfidenceThresholds, FlagThresholds, PredictorConfig};
use std::path::PathBuf;

/// Serve the cloud classifier over HTTP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ServeArgs {
    /// Local checkpoint; takes precedence over the remote repository.
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Remote repository id, ``owner/name``.
    #[arg(long, env = "HF_REPO_ID")]
    pub repo_id: Option<String>,

    /// Checkpoint file name within the repository.
    #[arg(long, env = "HF_FILENAME", default_value = DEFAULT_FILENAME)]
    pub filename: String,

    /// Repository revision.
    #[arg(long, env = "HF_REVISION")]
    pub revision: Option<String>,

    /// Artifact cache directory.
    #[arg(long, env = "HF_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Remote store base URL.
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Architecture override.
    #[arg(long, env = "MODEL_ARCH")]
    pub arch: Option<String>,

    /// Input size override.
    #[arg(long, env = "MODEL_IMG_SIZE")]
    pub img_size: Option<usize>,

    /// Comma-separated class list override.
    #[arg(long, env = "MODEL_CLASSES", value_delimiter = ',')]
    pub classes: Option<Vec<String>>,

    /// Listen address.
    #[arg(long, env = "HANEUL_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Comma-separated allowed CORS origins; any origin when unset.
    #[arg(long, env = "HANEUL_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Upload size limit in bytes.
    #[arg(long, env = "HANEUL_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Number of ranked predictions per response.
    #[arg(long, env = "HANEUL_TOP_K", default_value_t = 3)]
    pub top_k: usize,

    /// Minimum top-1 probability for ``high`` confidence.
    #[arg(long, default_value_t = 0.60)]
    pub high_top1: f64,

    /// Minimum top-1 / top-2 gap for ``high`` confidence.
    #[arg(long, default_value_t = 0.15)]
    pub high_gap: f64,

    /// Minimum top-1 probability for ``medium`` confidence.
    #[arg(long, default_value_t = 0.45)]
    pub medium_top1: f64,

    /// Minimum top-1 / top-2 gap for ``medium`` confidence.
    #[arg(long, default_value_t = 0.08)]
    pub medium_gap: f64,

    /// ``low_confidence`` flag threshold.
    #[arg(long, default_value_t = 0.45)]
    pub low_conf_threshold: f64,

    /// ``possible_mixed_class`` gap threshold.
    #[arg(long, default_value_t = 0.10)]
    pub mixed_gap_threshold: f64,

    /// ``high_entropy`` threshold.
    #[arg(long, default_value_t = 2.0)]
    pub entropy_threshold: f64,
}

impl ServeArgs {
    /// Bundle settings.
    pub fn bundle_config(&self) -> BundleConfig {
        let resolver = ResolverConfig::new()
            .with_local_path(self.model_path.clone())
            .with_repo_id(self.repo_id.clone())
            .with_filename(self.filename.clone())
            .with_revision(self.revision.clone())
            .with_cache_dir(self.cache_dir.clone())
            .with_endpoint(self.endpoint.clone());
        BundleConfig::new()
            .with_resolver(resolver)
            .with_architecture(self.arch.clone())
            .with_image_size(self.img_size)
            .with_classes(self.classes.clone())
    }

    /// Prediction settings.
    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig::new()
            .with_top_k(self.top_k)
            .with_confidence(
                ConfidenceThresholds::new()
                    .with_high_top1(self.high_top1)
                    .with_high_gap(self.high_gap)
                    .with_medium_top1(self.medium_top1)
                    .with_medium_gap(self.medium_gap),
            )
            .with_flags(
                FlagThresholds::new()
                    .with_low_confidence(self.low_conf_threshold)
                    .with_mixed_gap(self.mixed_gap_threshold)
                    .with_entropy(self.entropy_threshold),
            )
    }

    /// Router settings.
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            cors_origins: self.cors_origins.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_to_configs() {
        let args = ServeArgs::try_parse_from([
            "haneul-serve",
            "--repo-id",
            "sky/ccsn",
            "--arch",
            "convnext_tiny",
            "--classes",
            "Cu,Cb,Sc",
            "--top-k",
            "5",
            "--cors-origins",
            "https://a.example,https://b.example",
            "--entropy-threshold",
            "1.5",
            "--high-top1",
            "0.7",
        ])
        .unwrap();

        let bundle = args.bundle_config();
        assert_eq!(bundle.resolver.repo_id.as_deref(), Some("sky/ccsn"));
        assert_eq!(bundle.architecture.as_deref(), Some("convnext_tiny"));
        assert_eq!(bundle.classes.as_ref().map(Vec::len), Some(3));

        let predictor = args.predictor_config();
        assert_eq!(predictor.top_k, 5);
        assert_eq!(predictor.flags.entropy, 1.5);
        assert_eq!(predictor.flags.low_confidence, 0.45);
        assert_eq!(predictor.confidence.high_top1, 0.7);
        assert_eq!(predictor.confidence.medium_gap, 0.08);

        assert_eq!(args.router_options().cors_origins.len(), 2);
    }
}
