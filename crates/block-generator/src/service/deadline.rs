//! Slot deadline signal
//!
//! A timer task flips a `watch` flag when the slot ends. Admission polls the
//! flag between items, so an in-flight item is never interrupted.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One-shot "time is up" signal
pub struct Deadline {
    fired: watch::Receiver<bool>,
    trigger: watch::Sender<bool>,
    timer: Option<JoinHandle<()>>,
}

impl Deadline {
    /// Fire after `duration` on the tokio clock
    pub fn after(duration: Duration) -> Self {
        let (trigger, fired) = watch::channel(false);
        let timer_tx = trigger.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = timer_tx.send(true);
        });
        Self {
            fired,
            trigger,
            timer: Some(timer),
        }
    }

    /// Never fires unless triggered by hand
    pub fn never() -> Self {
        let (trigger, fired) = watch::channel(false);
        Self {
            fired,
            trigger,
            timer: None,
        }
    }

    /// Fire now
    pub fn trigger(&self) {
        let _ = self.trigger.send(true);
    }

    /// Whether the deadline has passed
    pub fn is_fired(&self) -> bool {
        *self.fired.borrow()
    }

    /// Handle that can fire this deadline from elsewhere
    pub fn trigger_handle(&self) -> watch::Sender<bool> {
        self.trigger.clone()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let deadline = Deadline::after(Duration::from_millis(500));
        assert!(!deadline.is_fired());

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(!deadline.is_fired());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(deadline.is_fired());
    }

    #[tokio::test]
    async fn test_never_until_triggered() {
        let deadline = Deadline::never();
        assert!(!deadline.is_fired());

        deadline.trigger_handle().send(true).unwrap();
        assert!(deadline.is_fired());
    }
}
