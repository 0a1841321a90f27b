use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Clock source of the periodic services. Tests swap the interval for a
/// manual trigger.
pub enum Ticker {
    Interval(Interval),
    Manual(mpsc::UnboundedReceiver<()>),
}

impl Ticker {
    pub fn every(period: Duration) -> Self {
        let mut interval = time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Ticker::Interval(interval)
    }

    pub fn manual() -> (Self, ManualTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Ticker::Manual(rx), ManualTrigger(tx))
    }

    /// Waits for the next tick. A manual ticker whose trigger was dropped
    /// never ticks again.
    pub async fn tick(&mut self) {
        match self {
            Ticker::Interval(interval) => {
                interval.tick().await;
            }
            Ticker::Manual(rx) => {
                if rx.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ManualTrigger(mpsc::UnboundedSender<()>);

impl ManualTrigger {
    pub fn fire(&self) {
        let _ = self.0.send(());
    }
}
