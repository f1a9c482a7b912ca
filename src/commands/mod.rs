//! CLI command handlers.

mod config;
mod domains;
mod history;
mod logs;
mod submit;
mod watch;

pub use config::{run_config_set_retention, run_config_set_token, run_config_show};
pub use domains::{run_domains_add, run_domains_list, run_domains_reset, run_domains_set};
pub use history::{run_history_clear, run_history_list, run_history_sweep};
pub use logs::{run_logs_clear, run_logs_show};
pub use submit::run_submit_command;
pub use watch::run_watch_command;

use std::sync::Arc;

use crate::db::Database;
use crate::history::History;
use crate::logbuf::LogStore;
use crate::notify::Notifier;
use crate::settings::Settings;

/// Shared handles every command handler works with.
pub struct AppContext {
    pub db: Database,
    pub settings: Settings,
    pub history: History,
    pub logs: LogStore,
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    #[must_use]
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings: Settings::new(db.clone()),
            history: History::new(db.clone()),
            logs: LogStore::new(db.clone()),
            db,
            notifier,
        }
    }
}
