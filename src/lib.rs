pub mod config;
pub mod db;
pub mod llm;
pub mod parser;
pub mod session;
pub mod workflow;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::AppState;
    use db::Database;
    use std::sync::Mutex;
    use tauri::{Emitter, Manager};
    use workflow::Workbench;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let database = Database::new(&app_dir)?;
            app.manage(database);

            let mut bench = Workbench::new();
            let handle = app.handle().clone();
            bench.session.subscribe(move |change| {
                if let Err(e) = handle.emit("session-changed", change) {
                    tracing::warn!(error = %e, "failed to emit session change");
                }
            });
            app.manage(AppState {
                bench: Mutex::new(bench),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::session::get_session,
            commands::session::set_experience,
            commands::session::reset_session,
            commands::session::add_idea,
            commands::session::remove_idea,
            commands::session::toggle_challenging_idea,
            commands::session::set_idea_comment,
            commands::session::select_analysis,
            commands::session::set_bias_decision,
            commands::session::add_bias_user_idea,
            commands::session::remove_bias_user_idea,
            commands::session::set_bias_comment,
            commands::session::set_bias_idea_comment,
            commands::session::export_session,
            commands::session::import_session,
            commands::session::export_session_to_file,
            commands::session::import_session_from_file,
            commands::session::save_session,
            commands::session::update_saved_session,
            commands::session::list_saved_sessions,
            commands::session::load_saved_session,
            commands::session::delete_saved_session,
            commands::chat::run_stage,
            commands::chat::cancel_request,
            commands::chat::transcribe_audio,
            commands::chat::synthesize_speech,
            commands::settings::get_settings,
            commands::settings::get_config,
            commands::settings::set_setting,
            commands::settings::delete_setting,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
