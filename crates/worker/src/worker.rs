use crate::barrier::BarrierGroup;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tilesim_kernel::{SimulationCore, TileFrame};

/// Errors surfaced by worker lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread {id}: {source}")]
    Spawn {
        id: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {0} was already started")]
    AlreadyStarted(u32),
}

/// Lifecycle of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Constructed, no thread yet.
    Created = 0,
    /// Parked waiting for a go signal.
    Idle = 1,
    /// Inside `simulate`.
    Running = 2,
    /// Quit requested; the thread has not left its loop yet.
    Stopping = 3,
    /// The thread has left its loop.
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Idle,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Start and end of the last completed pass, read from the group clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTiming {
    pub start: Duration,
    pub end: Duration,
}

impl PassTiming {
    pub fn exec_time(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Latest complete output of one tile. Swapped whole after every pass.
#[derive(Debug)]
pub struct FrameSlot {
    frame: RwLock<Arc<TileFrame>>,
}

impl FrameSlot {
    pub fn new(initial: TileFrame) -> Self {
        Self {
            frame: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn publish(&self, frame: TileFrame) {
        *self.frame.write() = Arc::new(frame);
    }

    pub fn latest(&self) -> Arc<TileFrame> {
        Arc::clone(&self.frame.read())
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    quit: AtomicBool,
    passes: AtomicU64,
    timing: Mutex<PassTiming>,
}

impl Shared {
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// One thread driving one [`SimulationCore`].
///
/// The core lives behind a mutex that the thread holds for the duration of a
/// pass. Other threads may lock it between passes (to inject disturbances or
/// push parameters) and read the latest published frame at any time.
pub struct SimulationWorker<C: SimulationCore> {
    id: u32,
    core: Arc<Mutex<C>>,
    group: Arc<BarrierGroup>,
    slot: Arc<FrameSlot>,
    shared: Arc<Shared>,
    go: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<C: SimulationCore> std::fmt::Debug for SimulationWorker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationWorker")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("passes", &self.passes())
            .finish_non_exhaustive()
    }
}

impl<C: SimulationCore> SimulationWorker<C> {
    /// Wrap `core`, taking the next id from `group`. The initial state of the
    /// core is published as pass 0. No thread is spawned until
    /// [`SimulationWorker::start`].
    pub fn new(core: C, group: Arc<BarrierGroup>) -> Self {
        let id = group.next_worker_id();
        let slot = Arc::new(FrameSlot::new(core.frame(0)));
        Self {
            id,
            core: Arc::new(Mutex::new(core)),
            group,
            slot,
            shared: Arc::new(Shared {
                state: AtomicU8::new(WorkerState::Created as u8),
                quit: AtomicBool::new(false),
                passes: AtomicU64::new(0),
                timing: Mutex::new(PassTiming::default()),
            }),
            go: None,
            handle: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Number of completed passes.
    pub fn passes(&self) -> u64 {
        self.shared.passes.load(Ordering::Acquire)
    }

    pub fn timing(&self) -> PassTiming {
        *self.shared.timing.lock()
    }

    pub fn exec_time(&self) -> Duration {
        self.timing().exec_time()
    }

    pub fn core(&self) -> &Arc<Mutex<C>> {
        &self.core
    }

    pub fn group(&self) -> &Arc<BarrierGroup> {
        &self.group
    }

    pub fn frame_slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    pub fn latest_frame(&self) -> Arc<TileFrame> {
        self.slot.latest()
    }

    /// Publish the core's current state without running a pass, keeping the
    /// pass count. Meant for use between passes, after the core was edited
    /// from outside; blocks while a pass holds the core.
    pub fn republish(&self) {
        let frame = self.core.lock().frame(self.passes());
        self.slot.publish(frame);
    }

    /// Spawn the worker thread, which parks until the first go signal.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.handle.is_some() {
            return Err(WorkerError::AlreadyStarted(self.id));
        }
        let (tx, rx) = channel::bounded(1);
        let ctx = RunContext {
            id: self.id,
            core: Arc::clone(&self.core),
            group: Arc::clone(&self.group),
            slot: Arc::clone(&self.slot),
            shared: Arc::clone(&self.shared),
        };

        self.shared.set_state(WorkerState::Idle);
        self.group.thread_started();
        let spawned = thread::Builder::new()
            .name(format!("tilesim-worker-{}", self.id))
            .spawn(move || ctx.run(rx));
        match spawned {
            Ok(handle) => {
                tracing::debug!(worker = self.id, "worker started");
                self.go = Some(tx);
                self.handle = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.set_state(WorkerState::Stopped);
                self.group.thread_exited();
                Err(WorkerError::Spawn {
                    id: self.id,
                    source,
                })
            }
        }
    }

    /// Request one pass. Returns `false` if a pass was already pending (the
    /// requests coalesce) or the worker is not accepting work.
    pub fn run_simulation(&self) -> bool {
        let Some(go) = &self.go else {
            return false;
        };
        // Counted before arming so the worker can never finish it first.
        self.group.begin_pass();
        match go.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {
                self.group.end_pass();
                false
            }
        }
    }

    /// Ask the thread to exit. A pass already running finishes; a pass that
    /// was requested but not started is cancelled. Does not block.
    pub fn stop(&mut self) {
        self.shared.quit.store(true, Ordering::Release);
        if self.go.take().is_some() {
            let _ = self.shared.state.compare_exchange(
                WorkerState::Idle as u8,
                WorkerState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            tracing::debug!(worker = self.id, "worker stop requested");
        }
    }

    /// Wait for the thread to finish. A panic raised inside the core is
    /// resumed on the calling thread.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                std::panic::resume_unwind(payload);
            }
        }
    }
}

impl<C: SimulationCore> Drop for SimulationWorker<C> {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(worker = self.id, "worker thread panicked");
            }
        }
    }
}

struct RunContext<C> {
    id: u32,
    core: Arc<Mutex<C>>,
    group: Arc<BarrierGroup>,
    slot: Arc<FrameSlot>,
    shared: Arc<Shared>,
}

/// Decrements `running` even if the pass unwinds.
struct PassGuard<'a>(&'a BarrierGroup);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.end_pass();
    }
}

/// Marks the thread stopped and decrements `living` on the way out. Requests
/// still queued when the thread dies were counted at dispatch and are
/// released here.
struct LivingGuard<'a> {
    group: &'a BarrierGroup,
    shared: &'a Shared,
    go: Receiver<()>,
}

impl Drop for LivingGuard<'_> {
    fn drop(&mut self) {
        while self.go.try_recv().is_ok() {
            self.group.end_pass();
        }
        self.shared.set_state(WorkerState::Stopped);
        self.group.thread_exited();
    }
}

impl<C: SimulationCore> RunContext<C> {
    fn run(self, go: Receiver<()>) {
        let living = LivingGuard {
            group: &self.group,
            shared: &self.shared,
            go,
        };
        while living.go.recv().is_ok() {
            let _pass = PassGuard(&self.group);
            if self.shared.quit.load(Ordering::Acquire) {
                tracing::trace!(worker = self.id, "pending pass cancelled");
                continue;
            }
            self.pass();
        }
        tracing::debug!(worker = self.id, "worker exited");
    }

    fn pass(&self) {
        self.shared.set_state(WorkerState::Running);
        let start = self.group.now();
        let frame = {
            let mut core = self.core.lock();
            core.simulate();
            let pass = self.shared.passes.load(Ordering::Acquire) + 1;
            core.frame(pass)
        };
        let pass = frame.pass;
        self.slot.publish(frame);
        self.shared.passes.store(pass, Ordering::Release);
        let end = self.group.now();
        *self.shared.timing.lock() = PassTiming { start, end };

        let next = if self.shared.quit.load(Ordering::Acquire) {
            WorkerState::Stopping
        } else {
            WorkerState::Idle
        };
        self.shared.set_state(next);
        tracing::trace!(
            worker = self.id,
            pass,
            exec_us = (end.saturating_sub(start)).as_micros() as u64,
            "pass complete"
        );
    }
}
