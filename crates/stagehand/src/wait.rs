//! Cooperative suspension primitives.
//!
//! Every wait suspends in whole scheduler passes through the [`Host`] and checks
//! the scope's cancellation token before each poll, so a cancelled wait unwinds
//! on the pass it observes the cancellation and never polls again.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    error::{Failure, Outcome},
    host::Host,
};

/// Suspension primitives bound to one cancellation scope.
#[derive(Clone)]
pub struct Waiter {
    /// Frame source.
    host: Host,
    /// Scope token checked at every suspension point.
    token: CancellationToken,
}

impl Waiter {
    /// Bind waits to `host` and `token`.
    pub fn new(host: Host, token: CancellationToken) -> Self {
        Self { host, token }
    }

    /// The host driving these waits.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// The scope token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail with [`Failure::Cancelled`] if the scope was cancelled.
    pub fn check_cancelled(&self) -> Outcome<()> {
        if self.token.is_cancelled() {
            Err(Failure::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Suspend for one scheduler pass.
    pub async fn tick(&self) -> Outcome<()> {
        self.host.next_frame_or_cancel(&self.token).await.map(|_| ())
    }

    /// Suspend until at least `seconds` of scaled time have elapsed.
    ///
    /// While the simulation is frozen the real delta is counted instead.
    /// Returns immediately for `seconds <= 0`.
    pub async fn seconds(&self, seconds: f64) -> Outcome<()> {
        if seconds <= 0.0 {
            return Ok(());
        }
        let mut elapsed = 0.0;
        while elapsed < seconds {
            let frame = self.host.next_frame_or_cancel(&self.token).await?;
            elapsed += frame.effective_delta();
        }
        Ok(())
    }

    /// Suspend until at least `seconds` of real time have elapsed.
    pub async fn seconds_unscaled(&self, seconds: f64) -> Outcome<()> {
        if seconds <= 0.0 {
            return Ok(());
        }
        let start = self.host.frame().unscaled_time;
        loop {
            let frame = self.host.next_frame_or_cancel(&self.token).await?;
            if frame.unscaled_time - start >= seconds {
                return Ok(());
            }
        }
    }

    /// Suspend for `duration` of scaled time.
    pub async fn duration(&self, duration: Duration) -> Outcome<()> {
        self.seconds(duration.as_secs_f64()).await
    }

    /// Suspend for exactly `n` passes; `n == 0` is a no-op.
    pub async fn frames(&self, n: u32) -> Outcome<()> {
        for _ in 0..n {
            self.tick().await?;
        }
        Ok(())
    }

    /// Poll `predicate` once per pass until it holds.
    ///
    /// With a timeout, fails with [`Failure::Timeout`] once that much real time
    /// has passed without the predicate holding.
    pub async fn until<P>(&self, predicate: P, timeout: Option<Duration>) -> Outcome<()>
    where
        P: FnMut() -> bool,
    {
        self.until_named("wait_until", predicate, timeout).await
    }

    /// Poll `predicate` once per pass until it no longer holds.
    pub async fn while_true<P>(&self, mut predicate: P, timeout: Option<Duration>) -> Outcome<()>
    where
        P: FnMut() -> bool,
    {
        self.until_named("wait_while", move || !predicate(), timeout)
            .await
    }

    /// As [`Self::until`] with a mandatory timeout; on timeout an error-level
    /// diagnostic naming the predicate and context is logged first.
    pub async fn until_with_diagnostics<P>(
        &self,
        predicate: P,
        timeout: Duration,
        name: &str,
        context: Option<&str>,
    ) -> Outcome<()>
    where
        P: FnMut() -> bool,
    {
        let res = self.until_named(name, predicate, Some(timeout)).await;
        if let Err(Failure::Timeout { .. }) = &res {
            let ctx = context.unwrap_or("none");
            error!(
                predicate = name,
                context = ctx,
                timeout_secs = timeout.as_secs_f64(),
                "timed out after {:.2}s. Predicate: {}. Context: {}",
                timeout.as_secs_f64(),
                name,
                ctx
            );
        }
        res
    }

    /// Shared polling loop.
    async fn until_named<P>(&self, what: &str, mut predicate: P, timeout: Option<Duration>) -> Outcome<()>
    where
        P: FnMut() -> bool,
    {
        let start = self.host.frame().unscaled_time;
        let limit = timeout.map(|t| t.as_secs_f64());
        loop {
            self.check_cancelled()?;
            if predicate() {
                return Ok(());
            }
            if let Some(limit) = limit
                && self.host.frame().unscaled_time - start >= limit
            {
                debug!(what, limit, "wait_timeout");
                return Err(Failure::Timeout {
                    what: what.to_string(),
                    seconds: limit,
                });
            }
            self.tick().await?;
        }
    }

    /// Log a named step of the test.
    pub fn step(&self, label: &str) {
        info!(step = label, frame = self.host.frame().frame, "test_step");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    };

    use super::*;

    const FRAME: Duration = Duration::from_millis(10);

    fn setup() -> (Host, CancellationToken) {
        let host = Host::new();
        let stop = CancellationToken::new();
        host.spawn_driver(FRAME, stop.clone());
        (host, stop)
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_seconds_return_without_a_pass() {
        let (host, stop) = setup();
        let wait = Waiter::new(host.clone(), CancellationToken::new());
        let before = host.frame().frame;
        wait.seconds(0.0).await.unwrap();
        wait.seconds(-1.0).await.unwrap();
        wait.frames(0).await.unwrap();
        assert_eq!(host.frame().frame, before);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn true_predicate_polls_once() {
        let (host, stop) = setup();
        let wait = Waiter::new(host, CancellationToken::new());
        let polls = Cell::new(0);
        wait.until(
            || {
                polls.set(polls.get() + 1);
                true
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(polls.get(), 1);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_lands_within_one_tick() {
        let (host, stop) = setup();
        let wait = Waiter::new(host.clone(), CancellationToken::new());
        host.next_frame().await;
        let start = host.frame().unscaled_time;
        let res = wait.until(|| false, Some(Duration::from_millis(200))).await;
        let elapsed = host.frame().unscaled_time - start;
        assert!(matches!(res, Err(Failure::Timeout { .. })));
        assert!(elapsed >= 0.2 - 1e-9, "{elapsed}");
        assert!(elapsed <= 0.2 + FRAME.as_secs_f64() + 1e-9, "{elapsed}");
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unwinds_without_another_poll() {
        let (host, stop) = setup();
        let token = CancellationToken::new();
        let wait = Waiter::new(host.clone(), token.clone());
        let flag = Arc::new(AtomicBool::new(false));
        let polls_after_cancel = Arc::new(AtomicBool::new(false));
        let (f, p, t) = (flag.clone(), polls_after_cancel.clone(), token.clone());
        let task = tokio::spawn(async move {
            wait.until(
                move || {
                    if t.is_cancelled() {
                        p.store(true, Ordering::SeqCst);
                    }
                    f.load(Ordering::SeqCst)
                },
                None,
            )
            .await
        });
        host.next_frame().await;
        host.next_frame().await;
        token.cancel();
        let res = task.await.unwrap();
        assert_eq!(res, Err(Failure::Cancelled));
        assert!(!polls_after_cancel.load(Ordering::SeqCst));
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_seconds_never_succeeds() {
        let (host, stop) = setup();
        let token = CancellationToken::new();
        let wait = Waiter::new(host.clone(), token.clone());
        let task = tokio::spawn(async move { wait.seconds(30.0).await });
        host.next_frame().await;
        token.cancel();
        assert_eq!(task.await.unwrap(), Err(Failure::Cancelled));
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn scaled_seconds_keep_running_while_frozen() {
        let (host, stop) = setup();
        host.set_time_scale(0.0);
        let wait = Waiter::new(host.clone(), CancellationToken::new());
        let start = host.frame().unscaled_time;
        wait.seconds(0.1).await.unwrap();
        assert!(host.frame().unscaled_time - start >= 0.1 - 1e-9);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn frames_counts_passes() {
        let (host, stop) = setup();
        let wait = Waiter::new(host.clone(), CancellationToken::new());
        let before = host.frame().frame;
        wait.frames(3).await.unwrap();
        assert_eq!(host.frame().frame, before + 3);
        stop.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn while_true_waits_for_false() {
        let (host, stop) = setup();
        let wait = Waiter::new(host.clone(), CancellationToken::new());
        let start = host.frame().frame;
        let h = host.clone();
        wait.while_true(move || h.frame().frame < start + 2, None)
            .await
            .unwrap();
        assert!(host.frame().frame >= start + 2);
        stop.cancel();
    }
}
