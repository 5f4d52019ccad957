//! Cooperative cancellation and progress reporting
//!
//! Long computations take a [`Monitor`] and poll it at a fixed iteration
//! granularity. A cancelled run returns [`Error::Cancelled`] and drops its
//! partial output.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Iterations between two cancellation checks in [`Monitor::tick`]
pub const DEFAULT_CHECK_INTERVAL: usize = 4096;

/// Shared flag a caller flips to stop a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

type ProgressFn = dyn Fn(f64) + Send + Sync;

/// Cancellation token plus an optional progress callback.
///
/// The callback receives the completed fraction in `[0, 1]`. A default
/// `Monitor` never cancels and reports nowhere.
#[derive(Clone)]
pub struct Monitor {
    cancel: Option<CancelToken>,
    progress: Option<Arc<ProgressFn>>,
    interval: usize,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            cancel: None,
            progress: None,
            interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .field("interval", &self.interval)
            .finish()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Poll every `interval` iterations (minimum 1)
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Same cancellation token, no progress callback.
    ///
    /// Used for inner loops of a batch whose progress is reported per item.
    pub fn silent(&self) -> Self {
        Self {
            cancel: self.cancel.clone(),
            progress: None,
            interval: self.interval,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// `Err(Cancelled)` once the token has been flipped
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report a completed fraction, clamped to `[0, 1]`
    pub fn report(&self, fraction: f64) {
        if let Some(callback) = &self.progress {
            callback(fraction.clamp(0.0, 1.0));
        }
    }

    /// Thread-safe counter over `total` batch items.
    pub fn counter(&self, total: usize) -> ProgressCounter<'_> {
        ProgressCounter {
            monitor: self,
            done: AtomicUsize::new(0),
            total,
        }
    }

    /// Check and report every `interval` iterations.
    pub fn tick(&self, done: usize, total: usize) -> Result<()> {
        if done % self.interval != 0 {
            return Ok(());
        }
        self.check()?;
        if total > 0 {
            self.report(done as f64 / total as f64);
        }
        Ok(())
    }
}

/// Counts finished items of a (possibly parallel) batch.
///
/// Each [`advance`](ProgressCounter::advance) polls for cancellation and
/// reports the completed fraction.
#[derive(Debug)]
pub struct ProgressCounter<'a> {
    monitor: &'a Monitor,
    done: AtomicUsize,
    total: usize,
}

impl ProgressCounter<'_> {
    pub fn advance(&self) -> Result<()> {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.monitor.check()?;
        if self.total > 0 {
            self.monitor.report(done as f64 / self.total as f64);
        }
        Ok(())
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn default_monitor_never_cancels() {
        let m = Monitor::new();
        assert!(m.check().is_ok());
        for i in 0..10_000 {
            assert!(m.tick(i, 10_000).is_ok());
        }
    }

    #[test]
    fn cancelled_token_stops_ticks() {
        let token = CancelToken::new();
        let m = Monitor::new().with_cancel(token.clone()).with_interval(10);
        assert!(m.tick(10, 100).is_ok());
        token.cancel();
        // Off-interval ticks do not poll
        assert!(m.tick(11, 100).is_ok());
        assert!(matches!(m.tick(20, 100), Err(Error::Cancelled)));
        assert!(matches!(m.silent().check(), Err(Error::Cancelled)));
    }

    #[test]
    fn progress_is_reported_at_interval() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let m = Monitor::new()
            .with_interval(25)
            .with_progress(move |f| sink.lock().unwrap().push(f));

        for i in 1..=100 {
            m.tick(i, 100).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);

        m.silent().report(0.5);
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn counter_reports_fractions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let m = Monitor::new().with_progress(move |f| sink.lock().unwrap().push(f));
        let counter = m.counter(4);
        for _ in 0..4 {
            counter.advance().unwrap();
        }
        assert_eq!(counter.done(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
    }
}
