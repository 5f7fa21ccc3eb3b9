use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info};

use super::timer::{TimerEntry, TimerQueue};

pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock pinned to one UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Executes fired jobs and returns the follow-up timers they want.
pub trait JobHandler<J> {
    fn handle(&mut self, job: J, now: DateTime<FixedOffset>) -> Vec<(DateTime<FixedOffset>, J)>;
}

/// Single-threaded timer loop. Jobs run one at a time, in deadline order.
pub struct Runner<J, C> {
    queue: TimerQueue<J>,
    clock: C,
}

impl<J: std::fmt::Debug, C: Clock> Runner<J, C> {
    pub fn new(clock: C) -> Self {
        Self {
            queue: TimerQueue::new(),
            clock,
        }
    }

    pub fn schedule(&mut self, fire_at: DateTime<FixedOffset>, job: J) {
        let id = self.queue.schedule(fire_at, job);
        debug!(id, %fire_at, "timer added");
    }

    pub fn next_deadline(&self) -> Option<DateTime<FixedOffset>> {
        self.queue.next_deadline()
    }

    pub fn pending(&self) -> Vec<&TimerEntry<J>> {
        self.queue.pending()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Fires every timer due at `now`, including follow-ups that are
    /// themselves already due. Returns how many jobs ran.
    pub fn drain_due<H: JobHandler<J>>(&mut self, handler: &mut H, now: DateTime<FixedOffset>) -> usize {
        let mut fired = 0;
        while let Some(entry) = self.queue.pop_due(now) {
            debug!(id = entry.id, job = ?entry.job, "firing");
            for (fire_at, job) in handler.handle(entry.job, now) {
                self.schedule(fire_at, job);
            }
            fired += 1;
        }
        fired
    }

    /// Sleeps until each deadline and fires it. Returns once the queue is empty.
    pub async fn run<H: JobHandler<J>>(&mut self, handler: &mut H) {
        while let Some(deadline) = self.queue.next_deadline() {
            let now = self.clock.now();
            if deadline > now {
                let wait = (deadline - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
            }
            let now = self.clock.now();
            self.drain_due(handler, now);
        }
        info!("no pending jobs left");
    }
}
