use std::sync::mpsc::Sender;
use std::time::Duration;

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::debug;

use crate::runtime::GameEvent;

pub const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Whole seconds left until `end`, clamped at zero
pub fn remaining_secs(end: f64, now: f64) -> u64 {
    let left = (end - now).floor();
    if left > 0.0 {
        left as u64
    } else {
        0
    }
}

/// Server-defined play window in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn total(&self) -> f64 {
        self.end - self.start
    }

    /// Remaining time at or below which the hint is shown
    pub fn reveal_threshold(&self) -> f64 {
        self.total() / 3.0
    }

    pub fn remaining(&self, now: f64) -> u64 {
        remaining_secs(self.end, now)
    }
}

/// Periodic task posting `GameEvent::Countdown`. Aborted on `cancel` or drop.
#[derive(Debug)]
pub struct CountdownTask {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTask {
    pub fn spawn(runtime: &Handle, events: Sender<GameEvent>, period: Duration) -> Self {
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if events.send(GameEvent::Countdown).is_err() {
                    break;
                }
            }
        });
        debug!(?period, "countdown started");
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("countdown cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CountdownTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_remaining_floors_and_clamps() {
        assert_eq!(remaining_secs(100.0, 0.0), 100);
        assert_eq!(remaining_secs(100.0, 0.4), 99);
        assert_eq!(remaining_secs(100.0, 99.9), 0);
        assert_eq!(remaining_secs(100.0, 100.0), 0);
        assert_eq!(remaining_secs(100.0, 250.0), 0);
    }

    #[test]
    fn test_remaining_is_non_increasing() {
        let window = TimeWindow::new(0.0, 10.0);
        let mut last = window.remaining(0.0);
        let mut now = 0.0;
        while now < 12.0 {
            let r = window.remaining(now);
            assert!(r <= last, "remaining went up at {}", now);
            last = r;
            now += 0.37;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn test_window_threshold() {
        let window = TimeWindow::new(1000.0, 1100.0);
        assert_eq!(window.total(), 100.0);
        assert!((window.reveal_threshold() - 33.333).abs() < 0.001);
    }

    #[test]
    fn test_task_sends_until_cancelled() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut task = CountdownTask::spawn(rt.handle(), tx, Duration::from_millis(5));

        // first interval tick fires immediately
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(GameEvent::Countdown)
        ));
        assert!(task.is_running());

        task.cancel();
        assert!(!task.is_running());

        // drain anything sent before the abort landed
        std::thread::sleep(Duration::from_millis(30));
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_task_aborted_on_drop() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = mpsc::channel();
        {
            let _task = CountdownTask::spawn(rt.handle(), tx, Duration::from_millis(5));
            let _ = rx.recv_timeout(Duration::from_secs(2));
        }
        std::thread::sleep(Duration::from_millis(30));
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }
}
