use machine_learning::arch::layers::Layer;
use serde::{Deserialize, Serialize};

/// The losses of every iteration ran in one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochResult {
    losses: Vec<f64>,
    converged: bool,
}

impl EpochResult {
    pub fn new(losses: Vec<f64>, converged: bool) -> Self {
        Self { losses, converged }
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

#[derive(Debug, Default)]
pub struct TrainResultBuilder {
    epochs: Vec<EpochResult>,
}

impl TrainResultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_epoch(&mut self, epoch: EpochResult) -> &mut Self {
        self.epochs.push(epoch);
        self
    }

    pub fn build(self, layers: Vec<Layer>) -> TrainResult {
        TrainResult {
            epochs: self.epochs,
            layers,
        }
    }
}

/// The outcome of a training run: the trained layers and the loss history.
#[derive(Debug, Clone)]
pub struct TrainResult {
    epochs: Vec<EpochResult>,
    layers: Vec<Layer>,
}

impl TrainResult {
    /// Returns the iteration losses of every epoch ran.
    pub fn epoch_losses(&self) -> Vec<&[f64]> {
        self.epochs.iter().map(EpochResult::losses).collect()
    }

    /// Whether the last epoch ran stopped because the loss converged.
    pub fn did_converge(&self) -> bool {
        self.epochs.last().is_some_and(EpochResult::converged)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    /// Returns the loss of the last iteration of every epoch.
    pub fn last_losses(&self) -> Vec<f64> {
        self.epochs
            .iter()
            .filter_map(|epoch| epoch.losses.last().copied())
            .collect()
    }

    pub fn ran_iterations_per_epoch(&self) -> Vec<usize> {
        self.epochs.iter().map(|epoch| epoch.losses.len()).collect()
    }

    pub fn ran_epochs(&self) -> usize {
        self.epochs.len()
    }

    /// Returns a serializable summary of the run.
    pub fn metrics(&self) -> TrainMetrics {
        TrainMetrics {
            ran_epochs: self.ran_epochs(),
            ran_iterations_per_epoch: self.ran_iterations_per_epoch(),
            epoch_losses: self.epochs.iter().map(|e| e.losses.clone()).collect(),
            did_converge: self.did_converge(),
        }
    }
}

/// A snapshot of the loss history of a run, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainMetrics {
    pub ran_epochs: usize,
    pub ran_iterations_per_epoch: Vec<usize>,
    pub epoch_losses: Vec<Vec<f64>>,
    pub did_converge: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> TrainResult {
        let mut builder = TrainResultBuilder::new();
        builder
            .add_epoch(EpochResult::new(vec![3., 2., 1.5], false))
            .add_epoch(EpochResult::new(vec![1.4, 1.39], true));

        builder.build(Vec::new())
    }

    #[test]
    fn derived_views_follow_the_epochs() {
        let result = result();

        assert_eq!(result.ran_epochs(), 2);
        assert_eq!(result.ran_iterations_per_epoch(), [3, 2]);
        assert_eq!(result.last_losses(), [1.5, 1.39]);
        assert_eq!(result.epoch_losses()[1], [1.4, 1.39]);
        assert!(result.did_converge());
    }

    #[test]
    fn no_epochs_never_converge() {
        let result = TrainResultBuilder::new().build(Vec::new());

        assert!(!result.did_converge());
        assert_eq!(result.metrics().ran_epochs, 0);
    }

    #[test]
    fn metrics_snapshot_the_history() {
        let metrics = result().metrics();

        assert_eq!(metrics.epoch_losses, [vec![3., 2., 1.5], vec![1.4, 1.39]]);
        assert_eq!(metrics.ran_iterations_per_epoch, [3, 2]);
        assert!(metrics.did_converge);
    }
}
