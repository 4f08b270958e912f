use super::AppState;
use crate::db::models::{SavedSession, SavedSessionInfo};
use crate::db::Database;
use crate::session::biases::{Bias, BiasDecision};
use crate::session::snapshot::SessionSnapshot;
use tauri::State;

#[tauri::command]
pub fn get_session(state: State<'_, AppState>) -> SessionSnapshot {
    state.bench.lock().unwrap().session.export()
}

#[tauri::command]
pub fn set_experience(state: State<'_, AppState>, experience: String) {
    state.bench.lock().unwrap().session.set_experience(experience);
}

#[tauri::command]
pub fn reset_session(state: State<'_, AppState>) {
    state.bench.lock().unwrap().reset();
}

// ── Ideas ──

#[tauri::command]
pub fn add_idea(state: State<'_, AppState>, idea: String) -> bool {
    state.bench.lock().unwrap().session.add_idea(&idea)
}

#[tauri::command]
pub fn remove_idea(state: State<'_, AppState>, idea: String) -> bool {
    state.bench.lock().unwrap().session.remove_idea(&idea)
}

#[tauri::command]
pub fn toggle_challenging_idea(state: State<'_, AppState>, idea: String) -> bool {
    state.bench.lock().unwrap().session.toggle_challenging_idea(&idea)
}

#[tauri::command]
pub fn set_idea_comment(state: State<'_, AppState>, idea: String, text: String) -> bool {
    state.bench.lock().unwrap().session.set_idea_comment(&idea, &text)
}

// ── Biases ──

#[tauri::command]
pub fn select_analysis(state: State<'_, AppState>, position: usize) -> Result<Vec<Bias>, String> {
    let mut bench = state.bench.lock().unwrap();
    bench
        .session
        .select_analysis(position)
        .map(<[Bias]>::to_vec)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_bias_decision(
    state: State<'_, AppState>,
    bias_id: String,
    decision: Option<BiasDecision>,
) -> Result<(), String> {
    state
        .bench
        .lock()
        .unwrap()
        .session
        .set_bias_decision(&bias_id, decision)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn add_bias_user_idea(state: State<'_, AppState>, bias_id: String, idea: String) -> Result<bool, String> {
    state
        .bench
        .lock()
        .unwrap()
        .session
        .add_bias_user_idea(&bias_id, &idea)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn remove_bias_user_idea(state: State<'_, AppState>, bias_id: String, idea: String) -> bool {
    state
        .bench
        .lock()
        .unwrap()
        .session
        .remove_bias_user_idea(&bias_id, &idea)
}

#[tauri::command]
pub fn set_bias_comment(state: State<'_, AppState>, bias_id: String, text: String) -> Result<bool, String> {
    state
        .bench
        .lock()
        .unwrap()
        .session
        .set_bias_comment(&bias_id, &text)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_bias_idea_comment(
    state: State<'_, AppState>,
    bias_id: String,
    idea: String,
    text: String,
) -> Result<bool, String> {
    state
        .bench
        .lock()
        .unwrap()
        .session
        .set_bias_idea_comment(&bias_id, &idea, &text)
        .map_err(|e| e.to_string())
}

// ── Import / export ──

#[tauri::command]
pub fn export_session(state: State<'_, AppState>) -> Result<String, String> {
    state
        .bench
        .lock()
        .unwrap()
        .session
        .export_json()
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn import_session(state: State<'_, AppState>, json: String) -> Result<SessionSnapshot, String> {
    let mut bench = state.bench.lock().unwrap();
    bench.import_json(&json).map_err(|e| e.to_string())?;
    Ok(bench.session.export())
}

/// Writes the session to a path picked with the dialog plugin.
#[tauri::command]
pub fn export_session_to_file(state: State<'_, AppState>, path: String) -> Result<(), String> {
    let json = export_session(state)?;
    std::fs::write(&path, json).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn import_session_from_file(state: State<'_, AppState>, path: String) -> Result<SessionSnapshot, String> {
    let json = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
    import_session(state, json)
}

// ── Saved sessions ──

#[tauri::command]
pub fn save_session(db: State<'_, Database>, state: State<'_, AppState>, title: String) -> Result<SavedSessionInfo, String> {
    let snapshot = state.bench.lock().unwrap().session.export();
    db.save_session(&title, &snapshot).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn update_saved_session(
    db: State<'_, Database>,
    state: State<'_, AppState>,
    id: String,
    title: Option<String>,
) -> Result<SavedSessionInfo, String> {
    let snapshot = state.bench.lock().unwrap().session.export();
    db.update_saved_session(&id, title.as_deref(), &snapshot)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn list_saved_sessions(db: State<'_, Database>) -> Result<Vec<SavedSessionInfo>, String> {
    db.list_saved_sessions().map_err(|e| e.to_string())
}

/// Loads a saved session into the workbench, replacing the current one.
#[tauri::command]
pub fn load_saved_session(
    db: State<'_, Database>,
    state: State<'_, AppState>,
    id: String,
) -> Result<SavedSession, String> {
    let saved = db.load_saved_session(&id).map_err(|e| e.to_string())?;
    let mut bench = state.bench.lock().unwrap();
    bench
        .session
        .import(saved.snapshot.clone())
        .map_err(|e| e.to_string())?;
    bench.requests.cancel_all();
    Ok(saved)
}

#[tauri::command]
pub fn delete_saved_session(db: State<'_, Database>, id: String) -> Result<(), String> {
    db.delete_saved_session(&id).map_err(|e| e.to_string())
}
