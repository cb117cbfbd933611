//! Reminder and overdue-summary text from the Gemini `generateContent` API.
//!
//! Both operations make a single call and fall back to a fixed sentence on any
//! failure, so callers always get text to show.

use crate::error::AppError;
use crate::model::GatePass;
use crate::store::Store;
use chrono::{Datelike, FixedOffset};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub const NOT_CONFIGURED: &str = "AI Service is not available. Please configure the API Key.";
pub const REMINDER_FALLBACK: &str = "Sorry, the reminder could not be generated at this time.";
pub const SUMMARY_FALLBACK: &str = "Sorry, the summary could not be generated at this time.";

/// Sample rows included in the summary prompt
const SUMMARY_SAMPLES: usize = 3;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("{}", NOT_CONFIGURED)]
    NotConfigured,

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Generative text service answered {0}")]
    Status(StatusCode),

    #[error("Generative text service returned no text")]
    Empty,
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NotConfigured => AppError::Config(err.to_string()),
            other => AppError::Remote(other.to_string()),
        }
    }
}

/// One row of the overdue summary, with display-ready strings
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueSummaryRow {
    pub gate_pass_no: String,
    pub item_name: String,
    pub requester_name: String,
    pub department: String,
    pub due_date: String,
}

/// Summary rows for `passes`: item as `"<name> (<qty> <unit>)"`, due date as
/// `YYYY-MM-DD` in the local offset or `N/A`.
pub fn summary_rows(
    store: &Store,
    passes: &[&GatePass],
    offset: &FixedOffset,
) -> Vec<OverdueSummaryRow> {
    passes
        .iter()
        .map(|pass| {
            let item_name = match pass.primary_item() {
                Some(line) => format!(
                    "{} ({} {})",
                    store.item_name(&line.item_id),
                    line.quantity,
                    line.unit
                ),
                None => store.pass_item_name(pass),
            };
            OverdueSummaryRow {
                gate_pass_no: pass.gate_pass_no.clone(),
                item_name,
                requester_name: pass.requester_name.clone(),
                department: pass.department.clone(),
                due_date: pass
                    .expected_return_date
                    .map(|d| d.with_timezone(offset).format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
            }
        })
        .collect()
}

/// Prompt for a single overdue reminder. The due date is a US short date (`M/D/YYYY`).
pub fn reminder_prompt(pass: &GatePass, item_name: &str, offset: &FixedOffset) -> String {
    let due_date = pass
        .expected_return_date
        .map(|d| {
            let d = d.with_timezone(offset);
            format!("{}/{}/{}", d.month(), d.day(), d.year())
        })
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "Please write a polite but firm reminder message in English for an overdue item for an internal corporate system.\n\
         The message must start by addressing the requester as \"Dear Sir {requester}\".\n\
         \n\
         Incorporate the following details into the message body:\n\
         - Item Name: {item}\n\
         - Gate Pass No: {no}\n\
         - Department: {department}\n\
         - Original Due Date: {due_date}\n\
         \n\
         The tone should be professional and aimed at ensuring the prompt return of company property.\n\
         Do not add any other greetings or sign-offs. The entire output should be just the core message.",
        requester = pass.requester_name,
        item = item_name,
        no = pass.gate_pass_no,
        department = pass.department,
        due_date = due_date,
    )
}

/// Prompt for the management summary: the total count plus up to three sample rows as pretty JSON.
pub fn summary_prompt(count: usize, rows: &[OverdueSummaryRow]) -> String {
    let samples = &rows[..rows.len().min(SUMMARY_SAMPLES)];
    let samples_json = serde_json::to_string_pretty(samples).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Analyze the following situation regarding overdue and pending returnable items for a company.\n\
         There are a total of {count} items pending return. Here are a few examples to provide context:\n\
         {samples_json}\n\
         \n\
         Please generate a professional summary paragraph in English, addressed to management.\n\
         The summary should state the total number of pending items and politely urge for necessary action to ensure company assets are returned promptly.\n\
         The tone should be formal and concise. Do not include any greetings or sign-offs, just the main paragraph."
    )
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Client for the generative-text service
#[derive(Clone, Debug)]
pub struct TextGenerator {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl TextGenerator {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        TextGenerator {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one prompt and return the trimmed text of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AiError::Status(response.status()));
        }
        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .next()
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(text.to_string())
    }

    async fn generate_or(&self, prompt: &str, fallback: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) => text,
            Err(AiError::NotConfigured) => NOT_CONFIGURED.to_string(),
            Err(e) => {
                log::error!("Generating text failed: {}", e);
                fallback.to_string()
            }
        }
    }

    /// Reminder text for one overdue pass.
    pub async fn reminder_message(
        &self,
        pass: &GatePass,
        item_name: &str,
        offset: &FixedOffset,
    ) -> String {
        self.generate_or(&reminder_prompt(pass, item_name, offset), REMINDER_FALLBACK)
            .await
    }

    /// Management summary over all overdue and pending rows.
    pub async fn overdue_summary(&self, rows: &[OverdueSummaryRow]) -> String {
        self.generate_or(&summary_prompt(rows.len(), rows), SUMMARY_FALLBACK)
            .await
    }
}
