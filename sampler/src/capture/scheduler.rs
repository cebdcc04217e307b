use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Notification that a scheduled sampling tick is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    generation: u64,
}

/// Keeps at most one sampling tick pending.
///
/// `schedule` spawns a sleep-then-notify task and keeps its handle. `cancel`
/// aborts that task and bumps the generation, so a tick that was already
/// delivered to the channel before the abort is rejected by `accept`.
pub struct TickScheduler {
    interval: Duration,
    tx: mpsc::UnboundedSender<Tick>,
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            interval,
            tx,
            pending: None,
            generation: 0,
        };
        (scheduler, rx)
    }

    /// Schedule the next tick unless one is already pending.
    pub fn schedule(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let tick = Tick {
            generation: self.generation,
        };
        let tx = self.tx.clone();
        let interval = self.interval;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            // Receiver gone means the controller is shutting down.
            let _ = tx.send(tick);
        }));
        trace!(generation = self.generation, "tick scheduled");
    }

    /// Drop the pending tick, including one already sitting in the channel.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
        trace!(generation = self.generation, "ticks canceled");
    }

    /// Claim a delivered tick. Returns false for ticks issued before the last
    /// `cancel`; those must not touch any state.
    pub fn accept(&mut self, tick: Tick) -> bool {
        if tick.generation != self.generation {
            return false;
        }
        self.pending = None;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
