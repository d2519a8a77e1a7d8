//! Train a model, wait for it, and ask for a prediction
//!
//! Reads `PREDICTION_EMAIL`, `PREDICTION_PASSWORD`, `PREDICTION_BUCKET` and
//! `PREDICTION_OBJECT`; endpoint and timeout overrides come from the usual
//! `PREDICTION_*` client configuration.

use anyhow::{Context, Result};
use google_prediction::{ClientConfig, ClientLogin, PredictionClient, Reply, TrainingStatus};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_POLLS: u32 = 40;

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} is not set", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ClientConfig::from_env()?;
    let email = required_env("PREDICTION_EMAIL")?;
    let password = required_env("PREDICTION_PASSWORD")?;
    let bucket = required_env("PREDICTION_BUCKET")?;
    let object = required_env("PREDICTION_OBJECT")?;

    let token = ClientLogin::from_config(&config)
        .authenticate(&email, &password)
        .await
        .context("ClientLogin failed")?;

    let predictor = PredictionClient::with_config(token, bucket, object, config)?;

    match predictor.train().await? {
        Reply::Success(ack) => info!(dataset = ?ack.dataset(), "Training started"),
        Reply::Remote(err) => anyhow::bail!("training rejected: {}", err),
    }

    let mut finished = None;
    for attempt in 1..=MAX_POLLS {
        match predictor.check_training_status().await?.into_result()? {
            TrainingStatus::NotCompleted => {
                info!(attempt, "Training has not completed yet");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            status => {
                finished = Some(status);
                break;
            }
        }
    }

    let status = finished.context("training did not finish in time")?;
    match status.accuracy() {
        Some(accuracy) => info!(accuracy, "Training finished"),
        None => warn!(status = %status, "Training finished without an accuracy estimate"),
    }

    let label = predictor.predict("awesome company").await?.into_result()?;
    info!(label = %label, "Prediction received");

    Ok(())
}
