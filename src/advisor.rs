//! Asks a local language model (Ollama) to explain a recommendation in plain words.
//!
//! The call is a single blocking request. Any failure falls back to a
//! fixed message built from the ranked scores; it never fails the caller.

use std::fmt::Write as _;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AdvisorSettings;
use crate::profile::CustomerProfile;
use crate::recommend::Recommendation;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("could not reach the language model at {url}: {source}")]
    Unreachable { url: String, source: reqwest::Error },
    #[error("language model returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed language model response: {0}")]
    Body(reqwest::Error),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub fn percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Prompt carrying the profile and the ranked products.
pub fn build_prompt(profile: &CustomerProfile, recommendations: &[Recommendation]) -> String {
    let ranked = recommendations
        .iter()
        .map(|r| format!("  - {}: {} confidence", r.insurance, percent(r.confidence)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "You are a friendly and knowledgeable insurance advisor.

A customer has shared the following information:
- Age: {}
- Marital status: {}
- Has children: {}
- Income bracket: {}
- Recent life event: {}

Based on an analysis of their profile, here are the insurance recommendations ranked by suitability:
{ranked}

Please write a warm, clear, 3-4 sentence explanation for why the top recommendation suits this customer.
Mention the second option briefly if it's also relevant. Do not use bullet points.",
        profile.age,
        profile.marital_status,
        if profile.has_kids { "Yes" } else { "No" },
        profile.income_bracket,
        profile.life_event,
    );
    prompt
}

/// Text shown when the language model cannot be used.
pub fn fallback_message(recommendations: &[Recommendation]) -> String {
    let mut msg = String::from(
        "Could not get an explanation from the language model. Make sure Ollama is running (try: ollama serve).",
    );
    if let Some(top) = recommendations.first() {
        let _ = write!(
            msg,
            "\nYour top recommendation is: {} ({} confidence)",
            top.insurance,
            percent(top.confidence)
        );
    }
    msg
}

pub struct AdvisorClient {
    client: Client,
    settings: AdvisorSettings,
}

impl AdvisorClient {
    pub fn new(settings: AdvisorSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        let request = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
        };
        let resp = self
            .client
            .post(&self.settings.url)
            .json(&request)
            .send()
            .map_err(|source| AdvisorError::Unreachable {
                url: self.settings.url.clone(),
                source,
            })?;
        if !resp.status().is_success() {
            return Err(AdvisorError::Status(resp.status()));
        }
        let body: GenerateResponse = resp.json().map_err(AdvisorError::Body)?;
        Ok(body.response)
    }

    /// Explanation from the model, or [`fallback_message`] if anything goes wrong.
    pub fn explain(&self, profile: &CustomerProfile, recommendations: &[Recommendation]) -> String {
        let prompt = build_prompt(profile, recommendations);
        debug!("sending {} byte prompt to {}", prompt.len(), self.settings.url);
        match self.generate(&prompt) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("{e}; falling back to raw scores");
                fallback_message(recommendations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{IncomeBracket, LifeEvent, MaritalStatus};
    use std::time::Duration;

    fn recs() -> Vec<Recommendation> {
        vec![
            Recommendation { insurance: "term_life".into(), confidence: 0.912 },
            Recommendation { insurance: "health".into(), confidence: 0.05 },
        ]
    }

    fn profile() -> CustomerProfile {
        CustomerProfile::new(34, MaritalStatus::Married, true, IncomeBracket::Medium, LifeEvent::NewBaby)
            .unwrap()
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = build_prompt(&profile(), &recs());
        assert!(prompt.contains("- Age: 34"));
        assert!(prompt.contains("- Marital status: married"));
        assert!(prompt.contains("- Has children: Yes"));
        assert!(prompt.contains("- Recent life event: new_baby"));
        assert!(prompt.contains("  - term_life: 91% confidence\n  - health: 5% confidence"));
        assert!(prompt.ends_with("Do not use bullet points."));
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest {
            model: "llama3",
            prompt: "hello",
            stream: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "model": "llama3", "prompt": "hello", "stream": false })
        );
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"model":"llama3","response":"Term life fits.","done":true}"#).unwrap();
        assert_eq!(parsed.response, "Term life fits.");
    }

    #[test]
    fn test_fallback_names_top_product() {
        let msg = fallback_message(&recs());
        assert!(msg.contains("term_life (91% confidence)"));
        assert!(!fallback_message(&[]).contains("top recommendation"));
    }

    #[test]
    fn test_unreachable_service_falls_back() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let client = AdvisorClient::new(AdvisorSettings {
            url: "http://127.0.0.1:9/api/generate".into(),
            model: "llama3".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        assert_eq!(client.explain(&profile(), &recs()), fallback_message(&recs()));
    }
}
