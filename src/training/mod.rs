mod progress;
mod result;
mod supplier;
mod task;
mod termination;
mod trainer;

pub use progress::{
    EmptyProgressTracker, LogProgressTracker, ProgressTracker, Subtask, Task, progress_tasks,
};
pub use result::{EpochResult, TrainMetrics, TrainResult, TrainResultBuilder};
pub use supplier::{BatchTaskSupplier, EagerSupplier, LazySupplier};
pub use task::{BatchOutcome, BatchTask, average_gradients, mean_loss};
pub use termination::TerminationFlag;
pub use trainer::GraphSageTrainer;
