use crate::config::{validate_setting, AppConfig, SETTING_KEYS};
use crate::db::Database;
use std::collections::HashMap;
use tauri::State;

#[tauri::command]
pub fn get_settings(db: State<'_, Database>) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key).map_err(|e| e.to_string())? {
            map.insert(key.to_string(), value);
        }
    }
    Ok(map)
}

/// Effective configuration, defaults and environment included.
#[tauri::command]
pub fn get_config(db: State<'_, Database>) -> Result<AppConfig, String> {
    AppConfig::load(&db).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_setting(db: State<'_, Database>, key: String, value: String) -> Result<(), String> {
    validate_setting(&key, &value)?;
    db.set_setting(&key, value.trim()).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn delete_setting(db: State<'_, Database>, key: String) -> Result<(), String> {
    if !SETTING_KEYS.contains(&key.as_str()) {
        return Err(format!("Unknown setting key: {}", key));
    }
    db.delete_setting(&key).map_err(|e| e.to_string())
}
