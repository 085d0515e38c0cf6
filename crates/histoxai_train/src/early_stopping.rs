//! Early stopping on validation loss.

/// Outcome of one epoch for the early stopping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochDecision {
    /// Validation loss improved; the current parameters are the new best.
    Improved,
    /// No improvement, patience not yet exhausted.
    Waiting,
    /// No improvement for `patience` epochs; training should stop.
    Stop,
}

/// Tracks the best validation loss and epochs since it last improved.
///
/// A loss counts as an improvement when it is below `best_loss - min_delta`.
/// A patience of zero disables stopping.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    best_loss: f32,
    patience: usize,
    counter: usize,
    min_delta: f32,
}

impl EarlyStopping {
    /// Create a new early stopping state.
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            best_loss: f32::INFINITY,
            patience,
            counter: 0,
            min_delta,
        }
    }

    /// Record one validation loss.
    pub fn observe(&mut self, loss: f32) -> EpochDecision {
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.counter = 0;
            return EpochDecision::Improved;
        }

        self.counter += 1;
        if self.patience > 0 && self.counter >= self.patience {
            tracing::info!(
                "Early stopping triggered after {} epochs without improvement",
                self.counter
            );
            EpochDecision::Stop
        } else {
            EpochDecision::Waiting
        }
    }

    /// Best validation loss seen so far.
    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }

    /// Epochs since the last improvement.
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Configured patience.
    pub fn patience(&self) -> usize {
        self.patience
    }
}
