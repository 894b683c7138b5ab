use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval_at};

/// Restartable periodic timer for use inside `tokio::select!`
///
/// Starting a running timer or stopping a stopped one does nothing. While
/// stopped, `tick` never completes, so its select branch stays idle.
#[derive(Debug)]
pub struct PeriodicTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl PeriodicTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Begin ticking; the first tick is one period from now
    pub fn start(&mut self) {
        if self.interval.is_none() {
            let mut interval =
                interval_at(tokio::time::Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(100));
        timer.start();
        let started = tokio::time::Instant::now();
        timer.tick().await;
        timer.tick().await;
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(100));
        timer.stop();
        assert!(!timer.is_running());

        timer.start();
        tokio::time::advance(Duration::from_millis(60)).await;
        // Restarting must not push the next tick back
        timer.start();
        let started = tokio::time::Instant::now();
        timer.tick().await;
        assert_eq!(started.elapsed(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_fires() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(100));
        let fired = tokio::time::timeout(Duration::from_secs(10), timer.tick()).await;
        assert!(fired.is_err());
    }
}
