//! Commit-message generation
//!
//! The daemon can ask an Ollama-compatible endpoint for a one-line
//! summary of the changed files. Generation is strictly best-effort:
//! any error, timeout, or unusable response falls back to the default
//! templated message, and the commit itself is never blocked on it.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::LlmSettings;

/// Produces a commit message for a set of changed files
pub trait MessageGenerator: Send {
    /// Return a commit message, or `fallback` when generation is
    /// unavailable or produces nothing usable
    fn generate(&self, changed_files: &[PathBuf], fallback: &str) -> String;
}

/// Generator used when no service is configured; always falls back
#[derive(Debug, Default)]
pub struct DisabledGenerator;

impl MessageGenerator for DisabledGenerator {
    fn generate(&self, _changed_files: &[PathBuf], fallback: &str) -> String {
        fallback.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Generator backed by an Ollama-compatible `/api/generate` endpoint
pub struct LlmMessageGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl LlmMessageGenerator {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Quick reachability check, used to disable generation up front
    pub fn probe(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(Duration::from_secs(2))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn request(&self, prompt: &str) -> Option<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.3,
                "num_predict": 50,
            },
        });
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let parsed: GenerateResponse = response.json().ok()?;
        tidy_response(&parsed.response)
    }
}

impl MessageGenerator for LlmMessageGenerator {
    fn generate(&self, changed_files: &[PathBuf], fallback: &str) -> String {
        let prompt = format!(
            "Write ONLY a git commit message (max 50 chars, no quotes or explanation) for:\n\
             Files: {}\nMessage:",
            file_list_summary(changed_files)
        );
        match self.request(&prompt) {
            Some(message) => message,
            None => {
                tracing::debug!("commit message generation failed, using fallback");
                fallback.to_string()
            }
        }
    }
}

/// Build the generator configured in `settings`
///
/// When generation is enabled but the endpoint does not answer the
/// probe, a disabled generator is returned so the daemon never waits on
/// an unreachable service.
pub fn from_settings(settings: &LlmSettings) -> Box<dyn MessageGenerator> {
    if !settings.enabled {
        return Box::new(DisabledGenerator);
    }
    let generator = LlmMessageGenerator::new(settings);
    if generator.probe() {
        tracing::info!(model = %settings.model, "commit message generation enabled");
        Box::new(generator)
    } else {
        tracing::warn!(
            endpoint = %settings.endpoint,
            "message service unreachable, using default commit messages"
        );
        Box::new(DisabledGenerator)
    }
}

/// Summarize changed paths for the prompt, capped at five entries
fn file_list_summary(changed_files: &[PathBuf]) -> String {
    let mut summary = changed_files
        .iter()
        .take(5)
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if changed_files.len() > 5 {
        summary.push_str(&format!(" and {} more", changed_files.len() - 5));
    }
    summary
}

/// First line only, surrounding quotes and padding stripped together,
/// rejected when empty or over-long
fn tidy_response(raw: &str) -> Option<String> {
    let line = raw
        .lines()
        .next()?
        .trim_matches(['`', '"', '\'', ' ', '\t']);
    if line.is_empty() || line.len() > 72 {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_generator_uses_fallback() {
        let generator = DisabledGenerator;
        let msg = generator.generate(&[PathBuf::from("records/a.txt")], "Auto-commit: now");
        assert_eq!(msg, "Auto-commit: now");
    }

    #[test]
    fn test_tidy_response_takes_first_clean_line() {
        assert_eq!(
            tidy_response("\"Add two records\"\nSecond line"),
            Some("Add two records".to_string())
        );
        assert_eq!(tidy_response("`Update tags`"), Some("Update tags".to_string()));
        // Padding inside the quotes goes too
        assert_eq!(
            tidy_response("\" Add records \""),
            Some("Add records".to_string())
        );
    }

    #[test]
    fn test_tidy_response_rejects_empty_and_overlong() {
        assert_eq!(tidy_response(""), None);
        assert_eq!(tidy_response("   \n"), None);
        assert_eq!(tidy_response(&"x".repeat(80)), None);
    }

    #[test]
    fn test_file_list_summary_caps_at_five() {
        let files: Vec<PathBuf> = (0..8).map(|n| PathBuf::from(format!("f{n}.txt"))).collect();
        let summary = file_list_summary(&files);
        assert!(summary.contains("f4.txt"));
        assert!(!summary.contains("f5.txt"));
        assert!(summary.ends_with("and 3 more"));
    }

    #[test]
    fn test_unreachable_endpoint_falls_back() {
        let generator = LlmMessageGenerator::new(&LlmSettings {
            enabled: true,
            endpoint: "http://127.0.0.1:1".to_string(),
            model: "phi3.5".to_string(),
            timeout_secs: 1,
        });
        let msg = generator.generate(&[PathBuf::from("a.txt")], "fallback message");
        assert_eq!(msg, "fallback message");
        assert!(!generator.probe());
    }
}
