//! Backend error bodies: `{ "detail": "..." }`.
use reqwest::{Response, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// Best human-readable message. Validation errors arrive as an array of
    /// objects with a `msg` field; those are joined.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        }
    }
}

/// Extract the `detail` message from a raw body, falling back to `fallback`.
pub fn detail_from_body(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<ErrorDetail>(body)
        .ok()
        .and_then(|e| e.message())
        .unwrap_or_else(|| fallback.to_string())
}

/// Consume a failed response and return its status plus best-effort detail.
pub async fn read_detail(response: Response, fallback: &str) -> (StatusCode, String) {
    let status = response.status();
    let detail = match response.bytes().await {
        Ok(body) => detail_from_body(&body, fallback),
        Err(_) => fallback.to_string(),
    };
    (status, detail)
}
