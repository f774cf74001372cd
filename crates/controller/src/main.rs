use anyhow::Context;
use common::{TelemetryGuard, setup_logging};
use controller::{FramePipelineController, PipelineConfig, PipelineEvent, Session};
use inference::{InferenceEngine, Labels, OrtBackend};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;

    // The guard installs the subscriber itself; plain logging only without an endpoint.
    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init("controller", endpoint, config.environment)?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    config.validate()?;
    tracing::info!("Controller starting with config: {:?}", config);

    let labels = match &config.labels_path {
        Some(path) => Labels::load(path)
            .with_context(|| format!("Failed to load labels from {}", path.display()))?,
        None => Labels::default(),
    };

    let engine = OrtBackend::load_model(&config.model_path)
        .with_context(|| format!("Failed to load model {}", config.model_path))?;
    let family = config.model_kind.build(&config, labels);
    let controller = FramePipelineController::new(engine, family);
    let mut events = controller.subscribe();

    let camera = capture::open_source(&config.capture)?;
    let mut session = Session::new(camera, controller);
    session.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(PipelineEvent::Published(result)) => match serde_json::to_string(&*result) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize result"),
                },
                Ok(PipelineEvent::Failed(failure)) => {
                    if !failure.transient {
                        tracing::error!(kind = %failure.kind, "Non-transient failure, shutting down");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Result consumer lagging");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await;
    tracing::info!("Controller stopped");
    Ok(())
}
