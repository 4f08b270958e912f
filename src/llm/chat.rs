use super::{api_error, ApiClient, ChatBackend, ChatReply, ChatRequest, LlmError};

impl ChatBackend for ApiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        tracing::debug!(mode = ?request.mode, history = request.history.len(), "chat request");

        let resp = self
            .client
            .post(self.endpoint("chat"))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let body = resp.text().await?;
        let reply: ChatReply = serde_json::from_str(&body)
            .map_err(|e| LlmError::Shape(format!("Invalid response format from server: {}", e)))?;
        reply.into_text()
    }
}
