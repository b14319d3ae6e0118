//! Chat Assistant Proxy
//!
//! Forwards a chat conversation to an OpenAI-compatible completion endpoint
//! and returns the first choice.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::SharedState;

/// Chat request body
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// Chat response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
}

pub async fn chat(
    State(state): State<SharedState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let messages = body.map(|Json(b)| b.messages).unwrap_or_default();
    if messages.is_empty() {
        return Err(ApiError::BadRequest("No messages provided".to_string()));
    }

    // Copy what the request needs; the upstream call runs without the lock
    let (config, client) = {
        let state = state.read().await;
        (state.assistant.clone(), state.http.clone())
    };
    let Some(api_key) = config.api_key.as_deref() else {
        error!("OpenAI API key not found");
        return Err(ApiError::Internal("API key not configured".to_string()));
    };

    let payload = json!({
        "model": config.model,
        "messages": messages,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    });

    info!("Sending request to OpenAI API with model: {}", config.model);
    let response = client
        .post(&config.api_url)
        .bearer_auth(api_key)
        .json(&payload)
        .timeout(config.timeout())
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                error!("OpenAI API request timed out");
                ApiError::Timeout("Request to OpenAI timed out".to_string())
            } else {
                error!("Error in OpenAI chat: {}", e);
                ApiError::Internal(e.to_string())
            }
        })?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let details = body["error"]["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        error!("OpenAI API error: {} - {}", status.as_u16(), details);
        return Err(ApiError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            error: "OpenAI API error".to_string(),
            details,
        });
    }

    let content = first_choice(&body)
        .ok_or_else(|| ApiError::Internal("Malformed completion response".to_string()))?;

    Ok(Json(ChatResponse {
        response: content.to_string(),
        model: config.model,
    }))
}

fn first_choice(body: &Value) -> Option<&str> {
    body["choices"][0]["message"]["content"].as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_choice() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Hi"}}]});
        assert_eq!(first_choice(&body), Some("Hi"));
        assert_eq!(first_choice(&json!({"choices": []})), None);
    }

    #[test]
    fn test_missing_messages_deserializes_empty() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.messages.is_empty());
    }
}
