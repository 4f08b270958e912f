pub mod chat;
pub mod session;
pub mod settings;

use crate::workflow::Workbench;
use std::sync::Mutex;

pub struct AppState {
    pub bench: Mutex<Workbench>,
}
