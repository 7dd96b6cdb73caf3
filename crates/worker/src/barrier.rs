use crate::clock::{Clock, Stopwatch};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    running: usize,
    living: usize,
    next_id: u32,
}

/// Join point shared by every worker of one tile set.
///
/// Tracks how many passes are in flight (`running`) and how many worker
/// threads are alive (`living`). Every change happens under one mutex and is
/// followed by a broadcast; waiters re-check their predicate after each
/// wakeup, since the broadcast may come from a worker other than the one they
/// are waiting on.
pub struct BarrierGroup {
    counters: Mutex<Counters>,
    changed: Condvar,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for BarrierGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = *self.counters.lock();
        f.debug_struct("BarrierGroup")
            .field("running", &c.running)
            .field("living", &c.living)
            .field("next_id", &c.next_id)
            .finish()
    }
}

impl Default for BarrierGroup {
    fn default() -> Self {
        Self::new(Arc::new(Stopwatch::new()))
    }
}

impl BarrierGroup {
    /// Create a group with zeroed counters timing passes with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            changed: Condvar::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Block until no pass is in flight.
    pub fn wait_for_all_threads(&self) {
        let mut c = self.counters.lock();
        while c.running > 0 {
            self.changed.wait(&mut c);
        }
    }

    /// Block until every worker thread has exited its run loop.
    pub fn wait_for_all_threads_to_exit(&self) {
        let mut c = self.counters.lock();
        while c.living > 0 {
            self.changed.wait(&mut c);
        }
    }

    /// Like [`BarrierGroup::wait_for_all_threads`] but gives up after
    /// `timeout`. Returns whether the group drained.
    pub fn wait_for_all_threads_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut c = self.counters.lock();
        while c.running > 0 {
            if self.changed.wait_until(&mut c, deadline).timed_out() {
                return c.running == 0;
            }
        }
        true
    }

    /// Like [`BarrierGroup::wait_for_all_threads_to_exit`] but gives up after
    /// `timeout`. Returns whether every thread exited.
    pub fn wait_for_all_threads_to_exit_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut c = self.counters.lock();
        while c.living > 0 {
            if self.changed.wait_until(&mut c, deadline).timed_out() {
                return c.living == 0;
            }
        }
        true
    }

    /// Restart worker id assignment at 0. The running and living counts are
    /// left alone; they are expected to be zero already.
    pub fn reset_counter(&self) {
        let mut c = self.counters.lock();
        if c.running != 0 || c.living != 0 {
            tracing::warn!(
                running = c.running,
                living = c.living,
                "worker ids reset while workers are still tracked"
            );
        }
        c.next_id = 0;
    }

    pub fn running_count(&self) -> usize {
        self.counters.lock().running
    }

    pub fn living_count(&self) -> usize {
        self.counters.lock().living
    }

    pub(crate) fn next_worker_id(&self) -> u32 {
        let mut c = self.counters.lock();
        let id = c.next_id;
        c.next_id += 1;
        id
    }

    pub(crate) fn begin_pass(&self) {
        self.counters.lock().running += 1;
        self.changed.notify_all();
    }

    pub(crate) fn end_pass(&self) {
        {
            let mut c = self.counters.lock();
            assert!(c.running > 0, "pass finished with no pass in flight");
            c.running -= 1;
        }
        self.changed.notify_all();
    }

    pub(crate) fn thread_started(&self) {
        self.counters.lock().living += 1;
        self.changed.notify_all();
    }

    pub(crate) fn thread_exited(&self) {
        {
            let mut c = self.counters.lock();
            assert!(c.living > 0, "worker exited with no living workers");
            c.living -= 1;
        }
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    #[test]
    fn new_group_is_drained() {
        let group = BarrierGroup::default();
        assert_eq!(group.running_count(), 0);
        assert_eq!(group.living_count(), 0);
        group.wait_for_all_threads();
        group.wait_for_all_threads_to_exit();
    }

    #[test]
    fn ids_increase_until_reset() {
        let group = BarrierGroup::default();
        assert_eq!(group.next_worker_id(), 0);
        assert_eq!(group.next_worker_id(), 1);
        group.reset_counter();
        assert_eq!(group.next_worker_id(), 0);
    }

    #[test]
    fn reset_counter_keeps_running_and_living() {
        let group = BarrierGroup::default();
        group.begin_pass();
        group.thread_started();
        group.reset_counter();
        assert_eq!(group.running_count(), 1);
        assert_eq!(group.living_count(), 1);
        group.end_pass();
        group.thread_exited();
    }

    #[test]
    fn wait_times_out_while_pass_in_flight() {
        let group = BarrierGroup::default();
        group.begin_pass();
        assert!(!group.wait_for_all_threads_timeout(Duration::from_millis(20)));
        group.end_pass();
        assert!(group.wait_for_all_threads_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn waiter_rechecks_predicate_across_workers() {
        let group = Arc::new(BarrierGroup::default());
        for _ in 0..4 {
            group.begin_pass();
        }
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let group = Arc::clone(&group);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * (i + 1)));
                    group.end_pass();
                })
            })
            .collect();
        // Woken by the first three broadcasts with running still > 0.
        group.wait_for_all_threads();
        assert_eq!(group.running_count(), 0);
        for h in handles {
            h.join().expect("helper thread panicked");
        }
    }

    #[test]
    fn exit_wait_blocks_until_last_thread() {
        let group = Arc::new(BarrierGroup::default());
        group.thread_started();
        group.thread_started();
        let g = Arc::clone(&group);
        let h = thread::spawn(move || {
            g.thread_exited();
            thread::sleep(Duration::from_millis(10));
            g.thread_exited();
        });
        group.wait_for_all_threads_to_exit();
        assert_eq!(group.living_count(), 0);
        h.join().expect("helper thread panicked");
    }

    #[test]
    #[should_panic(expected = "no pass in flight")]
    fn unbalanced_end_pass_panics() {
        BarrierGroup::default().end_pass();
    }

    #[test]
    fn injected_clock_is_used() {
        let clock = Arc::new(ManualClock::new());
        let group = BarrierGroup::new(clock.clone());
        clock.advance(Duration::from_secs(3));
        assert_eq!(group.now(), Duration::from_secs(3));
    }
}
