//! The pipeline worker: wires Postgres, S3, and the generation service
//! into a [`PipelineContext`] and runs the queue dispatch loops until
//! shutdown.

mod config;
mod dispatcher;
mod store_impls;

use std::sync::Arc;

use storyloom_comfyui::{ComfyApi, GenerationClient, GenerationConfig};
use storyloom_pipeline::analyze::StubAnalyzer;
use storyloom_pipeline::compose::PassthroughCompositor;
use storyloom_pipeline::generator::ComfyGenerator;
use storyloom_pipeline::mask::NoFaceDetector;
use storyloom_pipeline::PipelineContext;
use storyloom_store::{ObjectStore, S3Store, TemplateStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::store_impls::PgJobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyloom_worker=info,storyloom_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    let worker_id = format!("worker-{}", Uuid::new_v4());
    tracing::info!(%worker_id, "worker starting");

    let pool = storyloom_db::connect(&config.database_url, config.max_db_connections).await?;
    let objects: Arc<dyn ObjectStore> = Arc::new(S3Store::from_env(config.s3_bucket.clone()).await);
    let api = ComfyApi::new(config.comfy_api_url.clone());
    let generation_config = GenerationConfig {
        intensity: config.intensity,
        ..GenerationConfig::default()
    };
    let generator = ComfyGenerator::new(GenerationClient::new(api, generation_config));

    let cancel = CancellationToken::new();
    let ctx = PipelineContext {
        jobs: Arc::new(PgJobStore::new(pool.clone())),
        objects: objects.clone(),
        templates: Arc::new(TemplateStore::new(objects)),
        generator: Arc::new(generator),
        detector: Arc::new(NoFaceDetector),
        analyzer: Arc::new(StubAnalyzer),
        compositor: Arc::new(PassthroughCompositor),
        cancel: cancel.clone(),
    };

    let handles = dispatcher::spawn_all(&ctx, &pool, &config, &worker_id, &cancel);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("worker stopped");
    Ok(())
}
