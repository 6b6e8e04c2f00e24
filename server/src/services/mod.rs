pub mod pause;
pub mod pause_scheduler;

pub use pause::{PauseCoordinator, PauseOutcome, UnpauseKind, UnpauseOutcome};
pub use pause_scheduler::{PauseScheduler, RestoreSummary, TimerSnapshot, UnpauseExecutor};
