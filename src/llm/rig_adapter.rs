//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, ResponseSchema};

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Wraps a rig completion model; system messages become the agent preamble.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    strict_schemas: bool,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            strict_schemas: false,
        }
    }

    /// Send response schemas as a strict `json_schema` text format
    /// (OpenAI Responses API). Other backends rely on the prompt alone.
    pub fn with_strict_schemas(mut self) -> Self {
        self.strict_schemas = true;
        self
    }
}

/// Responses API `text.format` parameters for a strict JSON schema.
fn strict_text_format(schema: &ResponseSchema) -> serde_json::Value {
    json!({
        "text": {
            "format": {
                "type": "json_schema",
                "name": schema.name,
                "strict": true,
                "schema": schema.schema,
            }
        }
    })
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Clone + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let preamble = request.system_prompt();
        let prompt = request.user_prompt();

        let mut builder = AgentBuilder::new(self.model.clone())
            .preamble(&preamble)
            .temperature(f64::from(request.temperature.unwrap_or(DEFAULT_TEMPERATURE)))
            .max_tokens(u64::from(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)));
        if self.strict_schemas
            && let Some(schema) = &request.response_schema
        {
            builder = builder.additional_params(strict_text_format(schema));
        }
        let agent = builder.build();

        let content = agent
            .prompt(prompt)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(CompletionResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_format_wraps_schema() {
        let schema = ResponseSchema {
            name: "reply".to_string(),
            schema: json!({"type": "object"}),
        };
        let params = strict_text_format(&schema);
        let format = &params["text"]["format"];
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["name"], "reply");
        assert_eq!(format["strict"], true);
        assert_eq!(format["schema"], json!({"type": "object"}));
    }
}
