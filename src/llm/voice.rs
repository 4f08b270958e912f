use super::{api_error, ApiClient, LlmError, SpeechBackend};
use base64::Engine;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

impl SpeechBackend for ApiClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, LlmError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);

        let resp = self
            .client
            .post(self.endpoint("whisper"))
            .header("Content-Type", "application/json")
            .json(&encoded)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let data: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Shape(e.to_string()))?;
        data.text
            .ok_or_else(|| LlmError::Shape("Transcription response has no text".to_string()))
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        let resp = self
            .client
            .post(self.endpoint("tts"))
            .header("Content-Type", "application/json")
            .json(&SpeechRequest { text: text.trim() })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let mut audio = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
        }
        tracing::debug!(bytes = audio.len(), "received synthesized speech");
        Ok(audio)
    }
}
