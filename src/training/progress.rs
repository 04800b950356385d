use std::collections::HashMap;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::config::TrainConfig;

/// Receives the progress of a training run.
///
/// Subtasks nest, every `end_subtask` closes the most recently begun one.
pub trait ProgressTracker: Send + Sync {
    fn begin_subtask(&self, description: &str);

    fn end_subtask(&self, description: &str);

    /// Reports `amount` more units of work done on the current subtask.
    fn log_progress(&self, amount: usize);

    fn log_message(&self, message: &str);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProgressTracker;

impl ProgressTracker for EmptyProgressTracker {
    fn begin_subtask(&self, _description: &str) {}

    fn end_subtask(&self, _description: &str) {}

    fn log_progress(&self, _amount: usize) {}

    fn log_message(&self, _message: &str) {}
}

/// An open subtask, ended when dropped.
///
/// Early returns close every subtask they leave, innermost first.
pub struct Subtask<'a> {
    progress: &'a dyn ProgressTracker,
    description: &'static str,
}

impl<'a> Subtask<'a> {
    pub fn begin(progress: &'a dyn ProgressTracker, description: &'static str) -> Self {
        progress.begin_subtask(description);
        Self {
            progress,
            description,
        }
    }
}

impl Drop for Subtask<'_> {
    fn drop(&mut self) {
        self.progress.end_subtask(self.description);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskKind {
    Leaf { volume: usize },
    Iterative { iterations: usize, subtasks: Vec<Task> },
}

/// A node of the expected task tree of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    description: String,
    kind: TaskKind,
}

impl Task {
    /// A task made of `volume` units of work.
    pub fn leaf(description: impl Into<String>, volume: usize) -> Self {
        Self {
            description: description.into(),
            kind: TaskKind::Leaf { volume },
        }
    }

    /// A task that runs its subtasks up to `iterations` times.
    pub fn iterative(
        description: impl Into<String>,
        iterations: usize,
        subtasks: Vec<Task>,
    ) -> Self {
        Self {
            description: description.into(),
            kind: TaskKind::Iterative {
                iterations,
                subtasks,
            },
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the units of work of a leaf, `None` for iterative tasks.
    pub fn volume(&self) -> Option<usize> {
        match self.kind {
            TaskKind::Leaf { volume } => Some(volume),
            TaskKind::Iterative { .. } => None,
        }
    }

    pub fn iterations(&self) -> Option<usize> {
        match self.kind {
            TaskKind::Leaf { .. } => None,
            TaskKind::Iterative { iterations, .. } => Some(iterations),
        }
    }

    pub fn subtasks(&self) -> &[Task] {
        match &self.kind {
            TaskKind::Leaf { .. } => &[],
            TaskKind::Iterative { subtasks, .. } => subtasks,
        }
    }

    fn subtask(&self, description: &str) -> Option<&Task> {
        self.subtasks()
            .iter()
            .find(|task| task.description == description)
    }
}

/// Returns the task tree of a training run over `node_count` nodes.
pub fn progress_tasks(node_count: u64, config: &TrainConfig) -> Vec<Task> {
    let iteration = Task::leaf("Iteration", config.batches_per_iteration(node_count));
    let epoch = Task::iterative("Epoch", config.max_iterations.get(), vec![iteration]);

    vec![
        Task::leaf("Prepare batches", config.batch_count(node_count)),
        Task::iterative("Train model", config.epochs.get(), vec![epoch]),
    ]
}

const LOG_PERCENT_STEP: usize = 10;

#[derive(Debug)]
struct Frame {
    task: Task,
    path: String,
    progress: usize,
    logged_percent: usize,
    started: HashMap<String, usize>,
}

/// Renders progress through the `log` facade.
///
/// Every line is prefixed with the path of the running subtask, iterative subtasks show
/// which iteration is running, e.g. `GraphSage :: Train model :: Epoch 2 of 3`.
#[derive(Debug)]
pub struct LogProgressTracker {
    name: String,
    tasks: Vec<Task>,
    stack: Mutex<Vec<Frame>>,
}

impl LogProgressTracker {
    /// Creates a new `LogProgressTracker`.
    ///
    /// # Arguments
    /// * `name` - The root of every logged path.
    /// * `tasks` - The expected task tree, subtasks missing from it are logged without
    ///   volumes.
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            tasks,
            stack: Mutex::new(Vec::new()),
        }
    }

    fn current_path(&self, stack: &[Frame]) -> String {
        stack
            .last()
            .map_or_else(|| self.name.clone(), |frame| frame.path.clone())
    }
}

impl ProgressTracker for LogProgressTracker {
    fn begin_subtask(&self, description: &str) {
        let mut stack = self.stack.lock();

        let (task, label) = match stack.last_mut() {
            Some(parent) => {
                let task = parent.task.subtask(description).cloned();
                let label = match parent.task.iterations() {
                    Some(iterations) => {
                        let started =
                            parent.started.entry(description.to_string()).or_default();
                        *started += 1;
                        format!("{description} {started} of {iterations}")
                    }
                    None => description.to_string(),
                };
                (task, label)
            }
            None => {
                let task = self
                    .tasks
                    .iter()
                    .find(|task| task.description == description)
                    .cloned();
                (task, description.to_string())
            }
        };

        let path = format!("{} :: {label}", self.current_path(&stack));
        info!(task = path.as_str(); "{path} :: Start");

        stack.push(Frame {
            task: task.unwrap_or_else(|| Task::leaf(description, 0)),
            path,
            progress: 0,
            logged_percent: 0,
            started: HashMap::new(),
        });
    }

    fn end_subtask(&self, description: &str) {
        let mut stack = self.stack.lock();

        let Some(frame) = stack.pop() else {
            warn!("ended subtask {description} while no subtask was running");
            return;
        };

        if frame.task.description != description {
            warn!(
                "ended subtask {description} while {} was running",
                frame.task.description
            );
        }

        info!(task = frame.path.as_str(); "{} :: Finished", frame.path);
    }

    fn log_progress(&self, amount: usize) {
        let mut stack = self.stack.lock();
        let Some(frame) = stack.last_mut() else {
            return;
        };

        frame.progress += amount;

        let Some(volume) = frame.task.volume().filter(|&volume| volume > 0) else {
            return;
        };

        let percent = (frame.progress * 100 / volume).min(100);
        let finished = percent == 100 && frame.logged_percent < 100;
        if finished || percent >= frame.logged_percent + LOG_PERCENT_STEP {
            frame.logged_percent = percent;
            debug!(task = frame.path.as_str(); "{} {percent}%", frame.path);
        }
    }

    fn log_message(&self, message: &str) {
        let stack = self.stack.lock();
        info!("{} {message}", self.current_path(&stack));
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn config() -> TrainConfig {
        TrainConfig {
            batch_size: NonZeroUsize::new(10).unwrap(),
            epochs: NonZeroUsize::new(3).unwrap(),
            max_iterations: NonZeroUsize::new(7).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn task_tree_follows_the_config() {
        let config = config();
        let tasks = progress_tasks(95, &config);

        let [prepare, train] = &tasks[..] else {
            panic!("expected two root tasks");
        };
        assert_eq!(prepare.description(), "Prepare batches");
        assert_eq!(prepare.volume(), Some(10));
        assert_eq!(train.iterations(), Some(3));

        let epoch = &train.subtasks()[0];
        assert_eq!(epoch.description(), "Epoch");
        assert_eq!(epoch.iterations(), Some(7));
        assert_eq!(
            epoch.subtasks()[0].volume(),
            Some(config.batches_per_iteration(95))
        );
    }

    #[test]
    fn iterative_subtasks_are_numbered() {
        let tracker = LogProgressTracker::new("GraphSage", progress_tasks(95, &config()));

        tracker.begin_subtask("Train model");
        tracker.begin_subtask("Epoch");
        tracker.end_subtask("Epoch");
        tracker.begin_subtask("Epoch");
        tracker.begin_subtask("Iteration");
        tracker.log_progress(1);

        let stack = tracker.stack.lock();
        let paths: Vec<_> = stack.iter().map(|frame| frame.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "GraphSage :: Train model",
                "GraphSage :: Train model :: Epoch 2 of 3",
                "GraphSage :: Train model :: Epoch 2 of 3 :: Iteration 1 of 7",
            ]
        );
        assert_eq!(stack[2].progress, 1);
    }

    #[test]
    fn dropped_subtasks_close_innermost_first() {
        let tracker = LogProgressTracker::new("GraphSage", progress_tasks(95, &config()));

        let run = || -> Result<(), ()> {
            let _train = Subtask::begin(&tracker, "Train model");
            let _epoch = Subtask::begin(&tracker, "Epoch");
            assert_eq!(tracker.stack.lock().len(), 2);
            Err(())
        };

        assert!(run().is_err());
        assert!(tracker.stack.lock().is_empty());
    }

    #[test]
    fn ending_pops_the_current_subtask() {
        let tracker = LogProgressTracker::new("GraphSage", Vec::new());

        tracker.begin_subtask("Prepare batches");
        tracker.log_progress(4);
        tracker.end_subtask("Prepare batches");
        tracker.end_subtask("Prepare batches");

        assert!(tracker.stack.lock().is_empty());
    }
}
