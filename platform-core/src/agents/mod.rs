//! Actor-based background task management, built on [`acton_reactive`].
//!
//! The [`background_worker::BackgroundWorker`] is the substrate the
//! Retention Engine's daily scheduler is built on: named,
//! cancellable tasks with graceful shutdown, instead of bare `tokio::spawn`.

pub mod background_worker;
mod messages;

pub mod prelude {
    pub use acton_reactive::prelude::*;

    pub use super::messages::{CancelTask, GetAllTaskStatuses, GetTaskStatus, TaskStatusResponse};
    pub use super::background_worker::{BackgroundWorker, BackgroundWorkerState, TaskStatus};
}

pub use background_worker::{BackgroundWorker, BackgroundWorkerState, TaskStatus};
pub use messages::*;
