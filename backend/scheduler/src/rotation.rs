use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use cron::Schedule;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

/// Fires at midnight local time, every day.
pub const DAILY: &str = "0 0 0 * * *";

/// A destination that can be rotated on a schedule.
pub trait Rotatable: Send + Sync + 'static {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Close the current destination and start a fresh one.
    fn rotate(&self) -> Result<()>;
}

/// Invokes `rotate` on every registered target each time the cron schedule fires.
///
/// The scheduler has no stop API; once spawned it lives as long as the process.
pub struct RotationScheduler {
    expression: String,
    schedule: Schedule,
    targets: Vec<Arc<dyn Rotatable>>,
}

impl RotationScheduler {
    /// Scheduler using the fixed [`DAILY`] trigger.
    pub fn daily() -> Result<Self> {
        Self::from_expression(DAILY)
    }

    /// Scheduler for an arbitrary 6-field (seconds first) cron expression.
    pub fn from_expression(expression: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("invalid rotation schedule '{expression}'"))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            targets: Vec::new(),
        })
    }

    pub fn register(&mut self, target: Arc<dyn Rotatable>) {
        debug!(sink = target.name(), "Registered rotation target");
        self.targets.push(target);
    }

    pub fn targets(&self) -> usize {
        self.targets.len()
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(after).next()
    }

    /// Rotate every target in registration order. Returns the number of failures.
    pub fn rotate_all(&self) -> usize {
        let mut failed = 0;
        for target in &self.targets {
            match target.rotate() {
                Ok(()) => debug!(sink = target.name(), "Rotated"),
                Err(e) => {
                    failed += 1;
                    error!(sink = target.name(), error = %e, "Scheduled rotation failed");
                }
            }
        }
        failed
    }

    /// Run the schedule forever on the current tokio runtime.
    pub async fn run(self) {
        info!(
            schedule = %self.expression,
            targets = self.targets.len(),
            "Rotation scheduler started"
        );

        let mut next = match self.next_after(&Local::now()) {
            Some(next) => next,
            None => {
                warn!(schedule = %self.expression, "Schedule has no upcoming fire time");
                return;
            }
        };

        loop {
            let until = (next - Local::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            debug!(next = %next, "Waiting for next rotation");
            time::sleep(until).await;

            let failed = self.rotate_all();
            info!(
                targets = self.targets.len(),
                failed,
                "Scheduled rotation finished"
            );

            // Never fire twice for the same slot, and skip slots missed while asleep.
            let from = next.max(Local::now());
            next = match self.next_after(&from) {
                Some(n) => n,
                None => {
                    warn!(schedule = %self.expression, "Schedule exhausted, stopping");
                    return;
                }
            };
        }
    }

    /// Run the schedule on a dedicated background thread with its own runtime.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("fanlog-rotation".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "Failed to build rotation runtime");
                        return;
                    }
                };
                runtime.block_on(self.run());
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: String,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Rotatable for Counting {
        fn name(&self) -> &str {
            &self.name
        }

        fn rotate(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(())
        }
    }

    #[test]
    fn daily_fires_at_midnight() {
        let scheduler = RotationScheduler::daily().unwrap();
        let next = scheduler.next_after(&Local::now()).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
        assert!(next > Local::now());
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(RotationScheduler::from_expression("every day please").is_err());
    }

    #[test]
    fn failure_does_not_stop_remaining_targets() {
        let broken = Counting::new("broken", true);
        let healthy = Counting::new("healthy", false);

        let mut scheduler = RotationScheduler::daily().unwrap();
        scheduler.register(broken.clone());
        scheduler.register(healthy.clone());

        assert_eq!(scheduler.rotate_all(), 1);
        assert_eq!(broken.calls(), 1);
        assert_eq!(healthy.calls(), 1);
    }

    #[tokio::test]
    async fn run_keeps_firing_after_failures() {
        let broken = Counting::new("broken", true);
        let healthy = Counting::new("healthy", false);

        let mut scheduler = RotationScheduler::from_expression("* * * * * *").unwrap();
        scheduler.register(broken.clone());
        scheduler.register(healthy.clone());

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        handle.abort();

        assert!(healthy.calls() >= 2, "fired {} times", healthy.calls());
        assert_eq!(broken.calls(), healthy.calls());
    }

    #[test]
    fn spawned_thread_rotates_in_background() {
        let target = Counting::new("file", false);
        let mut scheduler = RotationScheduler::from_expression("* * * * * *").unwrap();
        scheduler.register(target.clone());

        let _handle = scheduler.spawn().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2_500));

        assert!(target.calls() >= 1);
    }
}
