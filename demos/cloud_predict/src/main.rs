use burn::backend::NdArray;
use clap::{Parser, Subcommand, ValueEnum};
use haneul::bundle::{BundleConfig, ModelBundle};
use haneul::cache::{HubFetcher, ResolverConfig};
use haneul::catalog::default_class_names;
use haneul::checkpoint::{
    CheckpointContainer, CheckpointLayout, CheckpointMetadata, StateKey, save_checkpoint,
};
use haneul::models::build_classifier;
use haneul::predict::PredictorConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

type B = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify image files and print the reports as JSON.
    Predict {
        /// Local checkpoint.
        #[arg(long, env = "MODEL_PATH")]
        model_path: Option<PathBuf>,

        /// Remote repository id.
        #[arg(long, env = "HF_REPO_ID")]
        repo_id: Option<String>,

        /// Architecture override.
        #[arg(long)]
        arch: Option<String>,

        /// Input size override.
        #[arg(long)]
        img_size: Option<usize>,

        #[arg(long, default_value = "3")]
        top_k: usize,

        /// Images to classify.
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Write a freshly initialized network as a checkpoint.
    Export {
        #[arg(long, default_value = "resnet18")]
        arch: String,

        /// Comma-separated class list; the CCSN classes when unset.
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,

        #[arg(long, default_value = "224")]
        img_size: usize,

        #[arg(long)]
        run_name: Option<String>,

        #[arg(long, value_enum, default_value_t = LayoutArg::ModelState)]
        layout: LayoutArg,

        /// Output path.
        output: PathBuf,
    },

    /// Print the layout and metadata of a checkpoint.
    Inspect {
        checkpoint: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LayoutArg {
    ModelState,
    StateDict,
    ModelStateDict,
    BareMap,
    BareSequence,
}

impl From<LayoutArg> for CheckpointLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::ModelState => CheckpointLayout::Keyed(StateKey::ModelState),
            LayoutArg::StateDict => CheckpointLayout::Keyed(StateKey::StateDict),
            LayoutArg::ModelStateDict => CheckpointLayout::Keyed(StateKey::ModelStateDict),
            LayoutArg::BareMap => CheckpointLayout::BareMap,
            LayoutArg::BareSequence => CheckpointLayout::BareSequence,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let device = Default::default();

    match args.command {
        Command::Predict {
            model_path,
            repo_id,
            arch,
            img_size,
            top_k,
            images,
        } => {
            let config = BundleConfig::new()
                .with_resolver(
                    ResolverConfig::new()
                        .with_local_path(model_path)
                        .with_repo_id(repo_id),
                )
                .with_architecture(arch)
                .with_image_size(img_size);
            let bundle = ModelBundle::<B>::load(&config, &HubFetcher, &device)?;
            let predictor = PredictorConfig::new().with_top_k(top_k).init();

            for path in images {
                let bytes = std::fs::read(&path)?;
                let report = bundle.report(&bytes, &predictor)?;
                println!("{}: {}", path.display(), serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Export {
            arch,
            classes,
            img_size,
            run_name,
            layout,
            output,
        } => {
            let classes = classes.unwrap_or_else(default_class_names);
            let network = build_classifier::<B>(&arch, classes.len(), &device)?;
            let metadata = CheckpointMetadata {
                classes: Some(classes),
                image_size: Some(img_size),
                architecture: Some(network.architecture().to_string()),
                run_name,
                ..Default::default()
            };
            save_checkpoint(&network, &metadata, layout.into(), &output)?;
            tracing::info!(path = %output.display(), "checkpoint exported");
        }
        Command::Inspect { checkpoint } => {
            let container = CheckpointContainer::read(&checkpoint)?;
            let metadata = &container.metadata;
            println!("layout:       {:?}", container.layout);
            println!("parameters:   {}", container.params.len());
            println!("architecture: {:?}", metadata.architecture);
            println!("image size:   {:?}", metadata.image_size);
            println!("run name:     {:?}", metadata.run_name);
            println!("classes:      {:?}", metadata.classes);
            for key in metadata.extra.keys() {
                println!("extra:        {key}");
            }
        }
    }

    Ok(())
}
