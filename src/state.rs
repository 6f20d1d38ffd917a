use std::sync::Arc;

use crate::corrections::CorrectionProvider;
use crate::engine::SyncEngine;
use crate::notify::NotificationCenter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub notifications: Arc<NotificationCenter>,
    pub corrections: Option<Corrections>,
}

pub struct Corrections {
    pub provider: Arc<dyn CorrectionProvider>,
    pub form_name: String,
}
