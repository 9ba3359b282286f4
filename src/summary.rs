//! Categorized Markdown summary of the email artifact.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider, ResponseSchema};

/// Turns the raw email dump into prose.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, artifact: &str) -> Result<String, LlmError>;
}

/// Shape the model must answer with.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummaryPayload {
    text: String,
}

const SUMMARY_TEMPERATURE: f32 = 0.2;
const SUMMARY_MAX_TOKENS: u32 = 4096;

/// Strict schema for the reply: one object with a single string `text`.
pub fn summary_schema() -> ResponseSchema {
    ResponseSchema {
        name: "email_summary".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"],
            "additionalProperties": false
        }),
    }
}

/// Summarizer backed by an injected LLM provider.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmProvider>,
    today: NaiveDate,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, today: NaiveDate) -> Self {
        Self { llm, today }
    }

    /// Instruction block sent as the system prompt.
    pub fn instructions(&self) -> String {
        let today = self.today.format("%Y-%m-%d");
        format!(
            "#01 You are an administrative assistant whose primary task is to summarize emails.\n\
             #02 You summarize emails provided in a single text from users.\n\
             #03 You never add information not in the emails.\n\
             #04 You pay particular attention to items requiring action by the user such as \
             permission slips, event deadlines, etc.\n\
             #05 You separate your summary into two sections: currently active items or items \
             with deadlines today or in the future from today's date of {today}, and items which \
             occurred in the past or have deadlines in the past from today's date of {today}.\n\
             #06 You are concise and terse, providing the summary in as few words as possible \
             while conveying all necessary information.\n\
             #07 You respond using Markdown formatted text.\n\
             #08 You separate the summaries into category sections: Work, Career, Personal, \
             Financial, Promotions. You may add additional categories if it makes sense.\n\
             #09 You ensure that anything coming directly from a safegraph.com or safegraph.io \
             domain is considered a 'Work' category item.\n\
             #10 You provide a Recommended Actions section that lists, as itemized entries, \
             the action items that need attention.\n\
             #11 You ensure all bills, credit card payments, credit card notices, bank notices, \
             utilities, and similar items are included in the Financial category.\n\
             \n\
             Respond with a single JSON object of the form {{\"text\": \"<markdown summary>\"}} \
             and nothing else. The object must have exactly one property, \"text\", holding a \
             string."
        )
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, artifact: &str) -> Result<String, LlmError> {
        info!(
            model = self.llm.model_name(),
            bytes = artifact.len(),
            "Requesting email summary"
        );

        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.instructions()),
            ChatMessage::user(artifact),
        ])
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS)
        .with_response_schema(summary_schema());

        let response = self.llm.complete(request).await?;
        parse_summary(self.llm.model_name(), &response.content)
    }
}

/// Pull the `text` field out of the model's JSON answer.
pub fn parse_summary(provider: &str, response: &str) -> Result<String, LlmError> {
    let json = extract_json_object(response);
    match serde_json::from_str::<SummaryPayload>(&json) {
        Ok(payload) => Ok(payload.text),
        Err(e) => {
            warn!(error = %e, "Summary response did not match schema");
            Err(LlmError::InvalidResponse {
                provider: provider.to_string(),
                reason: format!("expected {{\"text\": string}}: {e}"),
            })
        }
    }
}

/// Find the JSON object in a response that may be wrapped in a code fence.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
