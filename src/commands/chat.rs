use super::AppState;
use crate::config::AppConfig;
use crate::db::Database;
use crate::llm::ApiClient;
use crate::workflow::{self, RequestKind, Stage, StageOutcome};
use tauri::State;

/// Builds a client from the current settings; they may change between calls.
fn resolve_client(db: &Database) -> Result<ApiClient, String> {
    let config = AppConfig::load(db).map_err(|e| e.to_string())?;
    Ok(ApiClient::new(config.api_base_url))
}

#[tauri::command]
pub async fn run_stage(
    db: State<'_, Database>,
    state: State<'_, AppState>,
    stage: Stage,
) -> Result<StageOutcome, String> {
    let client = resolve_client(&db)?;
    workflow::run_stage(&state.bench, &client, stage)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn cancel_request(state: State<'_, AppState>, kind: RequestKind) -> bool {
    state.bench.lock().unwrap().requests.cancel(kind)
}

#[tauri::command]
pub async fn transcribe_audio(
    db: State<'_, Database>,
    state: State<'_, AppState>,
    audio: Vec<u8>,
) -> Result<Option<String>, String> {
    let client = resolve_client(&db)?;
    workflow::transcribe(&state.bench, &client, &audio)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn synthesize_speech(
    db: State<'_, Database>,
    state: State<'_, AppState>,
    text: String,
) -> Result<Option<Vec<u8>>, String> {
    let client = resolve_client(&db)?;
    workflow::speak(&state.bench, &client, &text)
        .await
        .map_err(|e| e.to_string())
}
