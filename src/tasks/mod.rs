//! Tasks — the manager actor, its messages and per-task progress tracking.

pub mod manager;
pub mod messages;
pub mod progress;
pub mod state;

pub use manager::{TaskManager, TaskManagerHandle};
pub use messages::TaskMessage;
pub use progress::{AdminTask, ExpectedSteps, StepCounter};
pub use state::{TaskState, TaskType};
