use burn::backend::NdArray;
use clap::Parser;
use haneul::bundle::ModelBundle;
use haneul::cache::HubFetcher;
use haneul_serve::args::ServeArgs;
use haneul_serve::{AppState, build_router};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type B = NdArray<f32>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = ServeArgs::parse();
    let bundle_config = args.bundle_config();
    let device = Default::default();

    // The downloader blocks.
    let bundle = tokio::task::spawn_blocking(move || {
        ModelBundle::<B>::load(&bundle_config, &HubFetcher, &device)
    })
    .await??;

    let state = Arc::new(AppState::new(bundle, args.predictor_config().init()));
    let app = build_router(state, &args.router_options())?;

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(bind = %args.bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
