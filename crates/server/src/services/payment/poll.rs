//! Payment confirmation poll.
//!
//! A payment is probed on a fixed interval until it settles or the confirmation
//! window closes. The loop has no backoff and keeps going through probe errors. The
//! deadline is checked between probes: a probe that has started always runs to
//! completion, so a settlement it performs is never cut off halfway.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use barberly_core::PaymentStatus;

/// Something that can report a payment's current status.
pub trait PaymentProbe {
    /// Probe failure. Logged, never fatal.
    type Error: Display;

    /// Check the payment once.
    fn probe(&mut self) -> impl Future<Output = Result<PaymentStatus, Self::Error>> + Send;
}

/// Probe cadence and overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSchedule {
    /// Shortest allowed interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// Create a schedule. Intervals below [`Self::MIN_INTERVAL`] are raised to it.
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(Self::MIN_INTERVAL),
            timeout,
        }
    }
}

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe reported `Paid` or `Failed`.
    Settled(PaymentStatus),
    /// The deadline passed while the payment was still pending.
    TimedOut,
}

/// Probe immediately, then every `schedule.interval`, until the probe reports a
/// settled status or `schedule.timeout` has elapsed.
pub async fn poll_until_settled<P: PaymentProbe>(
    probe: &mut P,
    schedule: PollSchedule,
) -> PollOutcome {
    if schedule.timeout.is_zero() {
        return PollOutcome::TimedOut;
    }

    let deadline = Instant::now() + schedule.timeout;
    let mut ticker = tokio::time::interval(schedule.interval.max(PollSchedule::MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = tokio::time::sleep_until(deadline) => return PollOutcome::TimedOut,
            _ = ticker.tick() => {}
        }

        match probe.probe().await {
            Ok(status) if status.is_settled() => return PollOutcome::Settled(status),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Payment probe failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Replays scripted answers, then keeps answering `Pending`.
    struct Scripted {
        answers: VecDeque<Result<PaymentStatus, String>>,
        calls: u32,
    }

    impl Scripted {
        fn new(answers: impl IntoIterator<Item = Result<PaymentStatus, String>>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                calls: 0,
            }
        }
    }

    impl PaymentProbe for Scripted {
        type Error = String;

        async fn probe(&mut self) -> Result<PaymentStatus, String> {
            self.calls += 1;
            self.answers.pop_front().unwrap_or(Ok(PaymentStatus::Pending))
        }
    }

    fn assert_elapsed(started: Instant, secs: u64) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
            "elapsed {elapsed:?}, expected about {secs}s"
        );
    }

    fn schedule(interval: u64, timeout: u64) -> PollSchedule {
        PollSchedule::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_paid_on_third_probe() {
        let mut probe = Scripted::new([
            Ok(PaymentStatus::Pending),
            Ok(PaymentStatus::Pending),
            Ok(PaymentStatus::Paid),
        ]);
        let started = Instant::now();

        let outcome = poll_until_settled(&mut probe, schedule(5, 300)).await;

        assert_eq!(outcome, PollOutcome::Settled(PaymentStatus::Paid));
        assert_eq!(probe.calls, 3);
        assert_elapsed(started, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_failed_status() {
        let mut probe = Scripted::new([Ok(PaymentStatus::Failed)]);
        let outcome = poll_until_settled(&mut probe, schedule(5, 300)).await;
        assert_eq!(outcome, PollOutcome::Settled(PaymentStatus::Failed));
        assert_eq!(probe.calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_while_pending() {
        let mut probe = Scripted::new([]);
        let started = Instant::now();

        let outcome = poll_until_settled(&mut probe, schedule(5, 12)).await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        // Probes at 0s, 5s and 10s.
        assert_eq!(probe.calls, 3);
        assert_elapsed(started, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins_over_tick_at_same_instant() {
        let mut probe = Scripted::new([]);
        let outcome = poll_until_settled(&mut probe, schedule(5, 10)).await;
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(probe.calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_errors_do_not_stop_the_poll() {
        let mut probe = Scripted::new([
            Err("connection reset".to_owned()),
            Err("HTTP 502".to_owned()),
            Ok(PaymentStatus::Paid),
        ]);
        let outcome = poll_until_settled(&mut probe, schedule(1, 60)).await;
        assert_eq!(outcome, PollOutcome::Settled(PaymentStatus::Paid));
        assert_eq!(probe.calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_probes() {
        let mut probe = Scripted::new([Ok(PaymentStatus::Paid)]);
        let outcome = poll_until_settled(&mut probe, schedule(5, 0)).await;
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(probe.calls, 0);
    }

    /// Takes `delay` to settle the payment, then records the follow-up work.
    struct SlowSettle {
        delay: Duration,
        followed_up: bool,
    }

    impl PaymentProbe for SlowSettle {
        type Error = String;

        async fn probe(&mut self) -> Result<PaymentStatus, String> {
            tokio::time::sleep(self.delay).await;
            self.followed_up = true;
            Ok(PaymentStatus::Paid)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_in_flight_at_deadline_runs_to_completion() {
        let mut probe = SlowSettle {
            delay: Duration::from_millis(500),
            followed_up: false,
        };
        let started = Instant::now();

        let outcome = poll_until_settled(
            &mut probe,
            PollSchedule::new(Duration::from_millis(100), Duration::from_millis(200)),
        )
        .await;

        assert_eq!(outcome, PollOutcome::Settled(PaymentStatus::Paid));
        assert!(probe.followed_up);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn test_schedule_raises_tiny_interval() {
        let s = PollSchedule::new(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(s.interval, PollSchedule::MIN_INTERVAL);
    }
}
