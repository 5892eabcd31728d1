use std::time::Duration;

use crate::error::{DashboardError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "facebook/bart-large-mnli";
pub const DEFAULT_LABELS: &[&str] = &["critical", "high", "medium", "low"];
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOKEN_VARS: &[&str] = &["HF_API_TOKEN", "HUGGINGFACEHUB_API_TOKEN"];

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    pub candidate_labels: Vec<String>,
    pub api_token: String,
    pub timeout: Duration,
}

impl ClassifierConfig {
    /// Builds a config whose token comes from the process environment.
    /// Call `dotenvy::dotenv()` first to pick up a local `.env` file.
    pub fn from_env(
        endpoint: String,
        model: String,
        candidate_labels: Vec<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let api_token = resolve_token(|name| std::env::var(name).ok())?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            candidate_labels: normalize_labels(candidate_labels),
            api_token,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn model_url(&self) -> String {
        format!("{}/models/{}", self.endpoint, self.model)
    }
}

fn resolve_token(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    TOKEN_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or(DashboardError::MissingCredentials)
}

/// Trims labels, drops blanks, and falls back to the defaults when nothing is left.
fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let cleaned: Vec<String> = labels
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();

    if cleaned.is_empty() {
        DEFAULT_LABELS.iter().map(|label| label.to_string()).collect()
    } else {
        cleaned
    }
}
