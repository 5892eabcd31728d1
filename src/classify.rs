//! Incident text classification via a hosted zero-shot model.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ClassifierConfig;
use crate::error::{DashboardError, Result};
use crate::models::{Classification, LabelScore};

#[async_trait]
pub trait IncidentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification>;
}

/// Trims the description, rejecting blank input.
pub fn validate_incident(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DashboardError::EmptyIncident);
    }
    Ok(text)
}

/// Rejects blank descriptions before the classifier is ever called.
pub async fn analyze_incident(
    classifier: &dyn IncidentClassifier,
    text: &str,
) -> Result<Classification> {
    let text = validate_incident(text)?;
    classifier.classify(text).await
}

/// Client for the Hugging Face Inference API zero-shot pipeline.
///
/// Construct once at startup and share by reference; the underlying HTTP
/// connection pool lives as long as this value.
pub struct HuggingFaceClassifier {
    client: Client,
    config: ClassifierConfig,
}

impl HuggingFaceClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let client = ClientBuilder::new().timeout(config.timeout).build()?;
        info!(model = %config.model, labels = config.candidate_labels.len(), "classifier ready");
        Ok(Self { client, config })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Columns {
        labels: Vec<String>,
        scores: Vec<f64>,
    },
    Pairs(Vec<LabelScore>),
}

impl ZeroShotResponse {
    fn into_classification(self, text: &str) -> Classification {
        let mut labels = match self {
            ZeroShotResponse::Columns { labels, scores } => labels
                .into_iter()
                .zip(scores)
                .map(|(label, score)| LabelScore { label, score })
                .collect::<Vec<_>>(),
            ZeroShotResponse::Pairs(pairs) => pairs,
        };
        labels.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        Classification {
            sequence: text.to_string(),
            labels,
        }
    }
}

#[async_trait]
impl IncidentClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let payload = json!({
            "inputs": text,
            "parameters": { "candidate_labels": self.config.candidate_labels },
        });

        debug!(chars = text.len(), "classifying incident description");

        let response = self
            .client
            .post(self.config.model_url())
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Classifier { status, body });
        }

        let parsed: ZeroShotResponse = response.json().await?;
        Ok(parsed.into_classification(text))
    }
}
