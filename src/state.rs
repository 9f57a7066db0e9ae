/*
 * Responsibility
 * - Shared client context (config, session, coordinator)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use crate::config::Config;
use crate::services::auth::{AuthCoordinator, Session};

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub session: Session,
}

impl AppState {
    pub fn new(config: Config, session: Session) -> Self {
        Self { config, session }
    }

    pub fn coordinator(&self) -> &AuthCoordinator {
        self.session.coordinator()
    }
}
