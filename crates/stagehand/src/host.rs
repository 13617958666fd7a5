//! The scheduling bridge between test code and the application's frame loop.
//!
//! A [`Host`] owns the frame clock. Every call to [`Host::tick`] is one
//! scheduler pass: the clock advances, work queued for the owning thread runs,
//! every active [`Routine`] is stepped once, tick hooks observe the new frame,
//! and tasks suspended in [`Host::next_frame`] wake up. Nothing else advances
//! time, so tests can drive frames by hand or through [`Host::spawn_driver`].

use std::{
    mem,
    sync::Arc,
    thread::{self, ThreadId},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Failure, Outcome};

/// Clock state after a scheduler pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    /// Number of completed passes.
    pub frame: u64,
    /// Scaled seconds advanced by the last pass.
    pub delta: f64,
    /// Real seconds advanced by the last pass.
    pub unscaled_delta: f64,
    /// Accumulated scaled seconds.
    pub time: f64,
    /// Accumulated real seconds.
    pub unscaled_time: f64,
    /// Multiplier applied to real time; 0 freezes the simulation.
    pub time_scale: f64,
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self {
            frame: 0,
            delta: 0.0,
            unscaled_delta: 0.0,
            time: 0.0,
            unscaled_time: 0.0,
            time_scale: 1.0,
        }
    }
}

impl FrameInfo {
    /// Delta used by scaled timing: the scaled delta, or the real delta while
    /// the simulation is frozen so that nothing waits forever.
    pub fn effective_delta(&self) -> f64 {
        if self.time_scale == 0.0 {
            self.unscaled_delta
        } else {
            self.delta
        }
    }

    /// Advance by `dt` real seconds.
    fn advance(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        self.frame += 1;
        self.unscaled_delta = dt;
        self.delta = dt * self.time_scale;
        self.unscaled_time += dt;
        self.time += self.delta;
    }
}

/// What a routine wants after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutineStep {
    /// Step again on the next pass.
    Continue,
    /// Finished.
    Done,
}

/// A short event-based routine stepped once per scheduler pass.
pub trait Routine: Send {
    /// Advance by one pass.
    fn step(&mut self, frame: &FrameInfo) -> RoutineStep;
}

/// Work queued for the owning thread.
type Job = Box<dyn FnOnce() + Send>;

/// Observer called at the end of every pass.
type TickHook = Arc<dyn Fn(&FrameInfo) + Send + Sync>;

/// A routine being driven by the host.
struct ActiveRoutine {
    /// The state machine.
    routine: Box<dyn Routine>,
    /// Cancels the routine.
    token: CancellationToken,
    /// Resolves the caller's future.
    done: Option<oneshot::Sender<Outcome<()>>>,
}

impl ActiveRoutine {
    /// Resolve the caller with `outcome`.
    fn finish(&mut self, outcome: Outcome<()>) {
        if let Some(tx) = self.done.take() {
            tx.send(outcome).ok();
        }
    }
}

/// Shared host state.
struct HostInner {
    /// Thread that created the host and drives its ticks.
    owner: ThreadId,
    /// Frame clock.
    clock: Mutex<FrameInfo>,
    /// Publishes the frame counter to suspended tasks.
    frames: watch::Sender<u64>,
    /// Owning-thread work queue.
    jobs_tx: Sender<Job>,
    /// Receiving end of the work queue, drained by `tick`.
    jobs_rx: Receiver<Job>,
    /// Routines stepped every pass.
    routines: Mutex<Vec<ActiveRoutine>>,
    /// Observers of completed passes.
    hooks: Mutex<Vec<TickHook>>,
}

/// Cloneable handle to the scheduling bridge.
#[derive(Clone)]
pub struct Host {
    /// Shared state.
    inner: Arc<HostInner>,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    /// Create a host owned by the current thread.
    pub fn new() -> Self {
        let (frames, _) = watch::channel(0);
        let (jobs_tx, jobs_rx) = unbounded();
        Self {
            inner: Arc::new(HostInner {
                owner: thread::current().id(),
                clock: Mutex::new(FrameInfo::default()),
                frames,
                jobs_tx,
                jobs_rx,
                routines: Mutex::new(Vec::new()),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current clock state.
    pub fn frame(&self) -> FrameInfo {
        *self.inner.clock.lock()
    }

    /// Current time scale.
    pub fn time_scale(&self) -> f64 {
        self.inner.clock.lock().time_scale
    }

    /// Change the time scale; 0 freezes scaled time.
    pub fn set_time_scale(&self, scale: f64) {
        self.inner.clock.lock().time_scale = scale.max(0.0);
    }

    /// Whether the caller runs on the owning thread.
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    /// Run `f` on the owning thread: immediately when already there, otherwise
    /// during the next pass.
    pub fn run_on_owner<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_owner_thread() {
            f();
        } else if self.inner.jobs_tx.send(Box::new(f)).is_err() {
            debug!("host_job_dropped");
        }
    }

    /// Register an observer called after every pass.
    pub fn add_tick_hook<F>(&self, hook: F)
    where
        F: Fn(&FrameInfo) + Send + Sync + 'static,
    {
        self.inner.hooks.lock().push(Arc::new(hook));
    }

    /// Number of routines currently being stepped.
    pub fn active_routines(&self) -> usize {
        self.inner.routines.lock().len()
    }

    /// Perform one scheduler pass covering `dt` real seconds.
    pub fn tick(&self, dt: f64) -> FrameInfo {
        let frame = {
            let mut clock = self.inner.clock.lock();
            clock.advance(dt);
            *clock
        };
        while let Ok(job) = self.inner.jobs_rx.try_recv() {
            job();
        }
        self.step_routines(&frame);
        let hooks: Vec<TickHook> = self.inner.hooks.lock().clone();
        for hook in hooks {
            hook(&frame);
        }
        trace!(frame = frame.frame, dt, "host_tick");
        self.inner.frames.send_replace(frame.frame);
        frame
    }

    /// Step every routine once, dropping finished and cancelled ones.
    fn step_routines(&self, frame: &FrameInfo) {
        let mut active = mem::take(&mut *self.inner.routines.lock());
        active.retain_mut(|r| {
            if r.token.is_cancelled() {
                r.finish(Err(Failure::Cancelled));
                return false;
            }
            match r.routine.step(frame) {
                RoutineStep::Continue => true,
                RoutineStep::Done => {
                    r.finish(Ok(()));
                    false
                }
            }
        });
        let mut guard = self.inner.routines.lock();
        active.append(&mut guard);
        *guard = active;
    }

    /// Suspend until the next pass completes.
    pub async fn next_frame(&self) {
        let mut rx = self.inner.frames.subscribe();
        rx.changed().await.ok();
    }

    /// Suspend until the next pass or until `token` fires, whichever is first.
    ///
    /// Cancellation wins ties: a pass that completes after the token fired
    /// still reports [`Failure::Cancelled`].
    pub async fn next_frame_or_cancel(&self, token: &CancellationToken) -> Outcome<FrameInfo> {
        if token.is_cancelled() {
            return Err(Failure::Cancelled);
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Failure::Cancelled),
            _ = self.next_frame() => {
                if token.is_cancelled() {
                    Err(Failure::Cancelled)
                } else {
                    Ok(self.frame())
                }
            }
        }
    }

    /// Drive `routine` to completion, one step per pass starting with the next
    /// one. Resolves with [`Failure::Cancelled`] when `token` fires first.
    pub async fn run_routine<R>(&self, routine: R, token: &CancellationToken) -> Outcome<()>
    where
        R: Routine + 'static,
    {
        if token.is_cancelled() {
            return Err(Failure::Cancelled);
        }
        let (tx, rx) = oneshot::channel();
        self.inner.routines.lock().push(ActiveRoutine {
            routine: Box::new(routine),
            token: token.clone(),
            done: Some(tx),
        });
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Failure::Cancelled),
            res = rx => res.unwrap_or(Err(Failure::Cancelled)),
        }
    }

    /// Tick the host every `interval` using measured real deltas until `cancel`
    /// fires.
    pub fn spawn_driver(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let host = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        host.tick(now.duration_since(last).as_secs_f64());
                        last = now;
                    }
                }
            }
            debug!("host_driver_stopped");
        })
    }
}
