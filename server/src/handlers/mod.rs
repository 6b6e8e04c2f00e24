use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub mod pause;

/// All pause subsystem routes. Layers and state are applied by the caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/pause/reasons",
            get(pause::list_pause_reasons).post(pause::create_pause_reason),
        )
        .route(
            "/api/pause/reasons/{id}",
            put(pause::update_pause_reason).delete(pause::delete_pause_reason),
        )
        .route("/api/pause/agent", post(pause::pause_agent))
        .route("/api/pause/agent/unpause", post(pause::unpause_agent))
        .route(
            "/api/pause/agent/{extension}/status",
            get(pause::get_agent_pause_status),
        )
        .route(
            "/api/pause/agent/{extension}/history",
            get(pause::get_agent_pause_history),
        )
        .route("/api/pause/agents/paused", get(pause::get_paused_agents))
        .route("/api/pause/logs", get(pause::get_all_pause_logs))
        .route("/api/pause/timers", get(pause::get_unpause_timers))
}
