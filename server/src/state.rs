use crate::{
    config::Config,
    db::connection::DbPool,
    events::EventBus,
    services::{PauseCoordinator, PauseScheduler},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub coordinator: Arc<PauseCoordinator>,
    pub scheduler: Arc<PauseScheduler>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: Config,
        coordinator: Arc<PauseCoordinator>,
        scheduler: Arc<PauseScheduler>,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            config,
            coordinator,
            scheduler,
            events,
        }
    }
}
