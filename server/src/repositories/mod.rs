pub mod agent;
pub mod pause_reason;
pub mod pause_session;
pub mod queue_member;
pub mod store;

pub use agent::AgentRepository;
pub use pause_reason::PauseReasonRepository;
pub use pause_session::{PauseSessionFilter, PauseSessionRepository};
pub use queue_member::QueueMemberRepository;
pub use store::{PauseStore, PgPauseStore};
