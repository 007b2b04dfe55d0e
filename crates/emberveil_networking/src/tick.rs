//! # Server Tick Loop
//!
//! Fixed-interval scheduler for the update cycle.
//!
//! ## Design
//!
//! - One tick every `interval` (600ms by default)
//! - World commands are applied at the start of a tick, never during one
//! - Ticks that overrun their interval are counted, not skipped

use std::time::{Duration, Instant};

use emberveil_shared::constants::DEFAULT_TICK_INTERVAL_MS;

/// Fixed-interval tick scheduler.
#[derive(Debug)]
pub struct TickLoop {
    /// Target tick interval.
    interval: Duration,
    /// Time of the last poll.
    last_poll: Instant,
    /// Time accumulated towards the next tick.
    accumulator: Duration,
    /// Ticks begun.
    tick_count: u64,
    /// Timing statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Shortest tick observed.
    pub min_tick_us: u64,
    /// Longest tick observed.
    pub max_tick_us: u64,
    /// Rolling average tick duration.
    pub avg_tick_us: u64,
    /// Ticks that took longer than the interval.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn fresh(interval: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: duration_us(interval),
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

impl TickLoop {
    /// Creates a loop ticking every `interval_ms` milliseconds.
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        let interval = Duration::from_millis(interval_ms.max(1));
        Self {
            interval,
            last_poll: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(interval),
        }
    }

    /// Returns true if a tick is due.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_poll);
        self.last_poll = now;
        self.accumulator >= self.interval
    }

    /// Marks the start of a tick and returns its start time.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.interval);
        self.tick_count += 1;
        Instant::now()
    }

    /// Marks the end of the tick started at `start`.
    pub fn end_tick(&mut self, start: Instant) {
        self.record(start.elapsed());
    }

    fn record(&mut self, duration: Duration) {
        let us = duration_us(duration);
        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + us) / 16;
        if duration > self.interval {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.accumulator + self.last_poll.elapsed();
        if let Some(remaining) = self.interval.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }

    /// Ticks begun so far.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick interval.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Resets the statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.interval);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL_MS)
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_loop_creation() {
        let tick_loop = TickLoop::default();
        assert_eq!(tick_loop.tick_count(), 0);
        assert_eq!(tick_loop.interval(), Duration::from_millis(600));
    }

    #[test]
    fn test_tick_execution() {
        let mut tick_loop = TickLoop::new(1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(tick_loop.should_tick());

        let start = tick_loop.begin_tick();
        tick_loop.end_tick(start);
        assert_eq!(tick_loop.tick_count(), 1);
        assert_eq!(tick_loop.stats().total_ticks, 1);
    }

    #[test]
    fn test_stats_tracking() {
        let mut tick_loop = TickLoop::new(10);
        tick_loop.record(Duration::from_millis(4));
        tick_loop.record(Duration::from_millis(12));
        tick_loop.record(Duration::from_millis(6));

        let stats = tick_loop.stats();
        assert_eq!(stats.total_ticks, 3);
        assert_eq!(stats.min_tick_us, 4_000);
        assert_eq!(stats.max_tick_us, 12_000);
        assert_eq!(stats.late_ticks, 1);
        assert!(stats.avg_tick_us < 10_000);

        tick_loop.reset_stats();
        assert_eq!(tick_loop.stats().total_ticks, 0);
    }
}
