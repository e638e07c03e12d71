//! Supabase edge functions.

use async_trait::async_trait;

use super::ApiContext;
use crate::backend::FunctionInvoker;
use crate::error::{Error, Result};
use crate::util::compact_text;

#[derive(Clone)]
pub struct EdgeFunctions {
    api: ApiContext,
}

impl EdgeFunctions {
    pub const fn new(api: ApiContext) -> Self {
        Self { api }
    }
}

#[async_trait]
impl FunctionInvoker for EdgeFunctions {
    async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let request = self
            .api
            .client()
            .post(self.api.endpoint(&format!("functions/v1/{name}")))
            .json(&body);
        let response = self.api.authorize(request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|payload| {
                    payload
                        .get("error")
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| compact_text(&text));
            return Err(Error::Generation(format!(
                "{name} returned HTTP {}: {message}",
                status.as_u16()
            )));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
