//! Endpoint health state machine.
//!
//! # States
//! - Active: endpoint receives traffic
//! - Timeout: short cool-down after a timed-out attempt
//! - Suspended: excluded after faults, with exponential backoff
//!
//! # State Transitions
//! ```text
//! Active → Timeout:    timeout fault within the retry limit
//! Active → Suspended:  any other fault within the retry limit
//! any → Suspended:     retry limit exceeded (escalation)
//! Timeout|Suspended → Active: next readiness check after the window, or success
//! ```
//!
//! # Design Decisions
//! - One mutex per endpoint; every transition runs under it
//! - No background timer: reactivation happens lazily in `ready_to_send`
//! - Only `on_success` clears the counters

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::health::fault::FaultKind;
use crate::resilience::backoff::next_suspend_duration;

/// Runtime state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointState {
    Active,
    Timeout,
    Suspended,
}

impl EndpointState {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointState::Active => "ACTIVE",
            EndpointState::Timeout => "TIMEOUT",
            EndpointState::Suspended => "SUSPENDED",
        }
    }
}

/// Retry limits a fault is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryLimits {
    pub max_fault_retries: u32,
    pub max_timeout_retries: u32,
}

impl RetryLimits {
    fn for_kind(&self, kind: FaultKind) -> u32 {
        match kind {
            FaultKind::Timeout => self.max_timeout_retries,
            FaultKind::Connection | FaultKind::Generic => self.max_fault_retries,
        }
    }
}

/// Suspension timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub timeout_cooldown: Duration,
}

/// Result of applying a fault to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Timeout fault within the limit; cool-down started.
    TimedOut { count: u32, cooldown: Duration },
    /// Fault within the limit; suspended for `duration`.
    Suspended { count: u32, duration: Duration },
    /// Counter exceeded its limit. The endpoint is suspended and the failure
    /// must be escalated.
    Escalated { count: u32, limit: u32, duration: Duration },
}

impl Transition {
    pub fn is_escalation(&self) -> bool {
        matches!(self, Transition::Escalated { .. })
    }
}

/// Outcome of a readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Active,
    /// The window elapsed and this check moved the endpoint back to `Active`.
    Reactivated,
    Waiting,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        !matches!(self, Readiness::Waiting)
    }
}

/// Point-in-time view of an endpoint's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub state: EndpointState,
    pub fault_count: u32,
    pub timeout_count: u32,
    #[serde(skip)]
    pub suspend_until: Option<Instant>,
    /// Milliseconds left in the current suspension window.
    pub suspend_remaining_ms: Option<u64>,
    /// Length of the last suspension, if one happened since the last success.
    pub current_backoff_ms: Option<u64>,
}

#[derive(Debug)]
struct ContextState {
    state: EndpointState,
    fault_count: u32,
    timeout_count: u32,
    suspend_until: Option<Instant>,
    current_backoff: Option<Duration>,
}

impl ContextState {
    fn suspend(&mut self, policy: &SuspendPolicy, now: Instant) -> Duration {
        let duration = next_suspend_duration(self.current_backoff, policy.initial, policy.max);
        self.state = EndpointState::Suspended;
        self.suspend_until = Some(now + duration);
        self.current_backoff = Some(duration);
        duration
    }

    fn increment(&mut self, kind: FaultKind) -> u32 {
        let counter = match kind {
            FaultKind::Timeout => &mut self.timeout_count,
            FaultKind::Connection | FaultKind::Generic => &mut self.fault_count,
        };
        *counter = counter.saturating_add(1);
        *counter
    }
}

/// Mutable health state of one endpoint, shared by all in-flight dispatches.
#[derive(Debug)]
pub struct EndpointContext {
    name: String,
    inner: Mutex<ContextState>,
}

impl EndpointContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(ContextState {
                state: EndpointState::Active,
                fault_count: 0,
                timeout_count: 0,
                suspend_until: None,
                current_backoff: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset counters and return to `Active`.
    pub fn on_success(&self) {
        let mut s = self.lock();
        let previous = s.state;
        s.state = EndpointState::Active;
        s.fault_count = 0;
        s.timeout_count = 0;
        s.suspend_until = None;
        s.current_backoff = None;
        drop(s);

        if previous != EndpointState::Active {
            tracing::info!(endpoint = %self.name, from = previous.as_str(), "Endpoint recovered");
        }
    }

    pub fn on_fault(&self, kind: FaultKind, limits: RetryLimits, policy: &SuspendPolicy) -> Transition {
        self.on_fault_at(kind, limits, policy, Instant::now())
    }

    /// Count a classified fault and apply the matching transition.
    pub fn on_fault_at(
        &self,
        kind: FaultKind,
        limits: RetryLimits,
        policy: &SuspendPolicy,
        now: Instant,
    ) -> Transition {
        let mut s = self.lock();
        let count = s.increment(kind);
        let limit = limits.for_kind(kind);

        let transition = if count > limit {
            let duration = s.suspend(policy, now);
            Transition::Escalated { count, limit, duration }
        } else if kind == FaultKind::Timeout {
            s.state = EndpointState::Timeout;
            s.suspend_until = Some(now + policy.timeout_cooldown);
            Transition::TimedOut { count, cooldown: policy.timeout_cooldown }
        } else {
            let duration = s.suspend(policy, now);
            Transition::Suspended { count, duration }
        };
        drop(s);

        match transition {
            Transition::TimedOut { count, cooldown } => tracing::info!(
                endpoint = %self.name,
                count,
                cooldown_ms = cooldown.as_millis() as u64,
                "Endpoint timed out"
            ),
            Transition::Suspended { count, duration } => tracing::warn!(
                endpoint = %self.name,
                kind = kind.as_str(),
                count,
                suspend_ms = duration.as_millis() as u64,
                "Endpoint suspended"
            ),
            Transition::Escalated { count, limit, duration } => tracing::warn!(
                endpoint = %self.name,
                kind = kind.as_str(),
                count,
                limit,
                suspend_ms = duration.as_millis() as u64,
                "Endpoint retry limit exceeded"
            ),
        }
        transition
    }

    /// Count a failure escalated from a child without changing state.
    ///
    /// Returns true when the counter exceeds its limit.
    pub fn count_child_failure(&self, kind: FaultKind, limits: RetryLimits) -> bool {
        let mut s = self.lock();
        let count = s.increment(kind);
        let limit = limits.for_kind(kind);
        drop(s);

        tracing::debug!(endpoint = %self.name, kind = kind.as_str(), count, limit, "Child failure escalated");
        count > limit
    }

    pub fn ready_to_send(&self) -> bool {
        self.ready_to_send_at(Instant::now())
    }

    pub fn ready_to_send_at(&self, now: Instant) -> bool {
        self.check_ready_at(now).is_ready()
    }

    /// Ready when active, or when the suspension window has elapsed. In the
    /// latter case the endpoint is moved back to `Active` with its counters
    /// left in place and `Readiness::Reactivated` is returned.
    pub fn check_ready_at(&self, now: Instant) -> Readiness {
        let mut s = self.lock();
        if s.state == EndpointState::Active {
            return Readiness::Active;
        }
        let suspend_until = s.suspend_until;
        match suspend_until {
            Some(until) if now < until => Readiness::Waiting,
            _ => {
                let previous = s.state;
                s.state = EndpointState::Active;
                s.suspend_until = None;
                drop(s);
                tracing::info!(endpoint = %self.name, from = previous.as_str(), "Endpoint reactivated");
                Readiness::Reactivated
            }
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> HealthSnapshot {
        let s = self.lock();
        HealthSnapshot {
            state: s.state,
            fault_count: s.fault_count,
            timeout_count: s.timeout_count,
            suspend_until: s.suspend_until,
            suspend_remaining_ms: s
                .suspend_until
                .map(|until| until.saturating_duration_since(now).as_millis() as u64),
            current_backoff_ms: s.current_backoff.map(|d| d.as_millis() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_fault_retries: u32, max_timeout_retries: u32) -> RetryLimits {
        RetryLimits { max_fault_retries, max_timeout_retries }
    }

    fn policy(initial_secs: u64, max_secs: u64) -> SuspendPolicy {
        SuspendPolicy {
            initial: Duration::from_secs(initial_secs),
            max: Duration::from_secs(max_secs),
            timeout_cooldown: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_generic_faults_suspend_then_escalate() {
        let ctx = EndpointContext::new("orders");
        let limits = limits(2, 2);
        let policy = policy(1, 4);
        let now = Instant::now();

        let t1 = ctx.on_fault_at(FaultKind::Generic, limits, &policy, now);
        assert_eq!(t1, Transition::Suspended { count: 1, duration: Duration::from_secs(1) });
        assert_eq!(ctx.snapshot_at(now).state, EndpointState::Suspended);

        let t2 = ctx.on_fault_at(FaultKind::Generic, limits, &policy, now);
        assert_eq!(t2, Transition::Suspended { count: 2, duration: Duration::from_secs(2) });

        let t3 = ctx.on_fault_at(FaultKind::Generic, limits, &policy, now);
        assert!(t3.is_escalation());
        assert_eq!(t3, Transition::Escalated { count: 3, limit: 2, duration: Duration::from_secs(4) });
    }

    #[test]
    fn test_escalation_fires_exactly_once_past_limit() {
        let ctx = EndpointContext::new("e");
        let limits = limits(3, 3);
        let policy = policy(0, 0);

        let escalations: Vec<bool> = (0..4)
            .map(|_| ctx.on_fault(FaultKind::Connection, limits, &policy).is_escalation())
            .collect();
        assert_eq!(escalations, vec![false, false, false, true]);
    }

    #[test]
    fn test_timeout_uses_own_counter_and_cooldown() {
        let ctx = EndpointContext::new("e");
        let policy = policy(10, 60);
        let now = Instant::now();

        let t = ctx.on_fault_at(FaultKind::Timeout, limits(0, 1), &policy, now);
        assert_eq!(t, Transition::TimedOut { count: 1, cooldown: Duration::from_millis(500) });

        let snap = ctx.snapshot_at(now);
        assert_eq!(snap.state, EndpointState::Timeout);
        assert_eq!(snap.timeout_count, 1);
        assert_eq!(snap.fault_count, 0);
        assert_eq!(snap.current_backoff_ms, None);

        assert!(!ctx.ready_to_send_at(now + Duration::from_millis(499)));
        assert!(ctx.ready_to_send_at(now + Duration::from_millis(500)));
    }

    #[test]
    fn test_timeouts_escalate_exactly_once_past_limit() {
        let ctx = EndpointContext::new("e");
        let policy = policy(1, 4);
        let now = Instant::now();

        for count in 1..=2 {
            let t = ctx.on_fault_at(FaultKind::Timeout, limits(0, 2), &policy, now);
            assert_eq!(t, Transition::TimedOut { count, cooldown: Duration::from_millis(500) });
        }

        let t = ctx.on_fault_at(FaultKind::Timeout, limits(0, 2), &policy, now);
        assert_eq!(t, Transition::Escalated { count: 3, limit: 2, duration: Duration::from_secs(1) });

        let snap = ctx.snapshot_at(now);
        assert_eq!(snap.state, EndpointState::Suspended);
        assert_eq!(snap.timeout_count, 3);
        assert_eq!(snap.fault_count, 0);
    }

    #[test]
    fn test_readiness_reports_reactivation_once() {
        let ctx = EndpointContext::new("e");
        let start = Instant::now();
        ctx.on_fault_at(FaultKind::Generic, limits(5, 5), &policy(1, 4), start);

        assert_eq!(ctx.check_ready_at(start), Readiness::Waiting);
        let later = start + Duration::from_secs(1);
        assert_eq!(ctx.check_ready_at(later), Readiness::Reactivated);
        assert_eq!(ctx.check_ready_at(later), Readiness::Active);
    }

    #[test]
    fn test_ready_window_is_half_open() {
        let ctx = EndpointContext::new("e");
        let start = Instant::now();
        ctx.on_fault_at(FaultKind::Generic, limits(5, 5), &policy(2, 8), start);

        assert!(!ctx.ready_to_send_at(start));
        assert!(!ctx.ready_to_send_at(start + Duration::from_millis(1999)));
        assert!(ctx.ready_to_send_at(start + Duration::from_secs(2)));

        // Lazy reactivation keeps the counters.
        let snap = ctx.snapshot_at(start + Duration::from_secs(2));
        assert_eq!(snap.state, EndpointState::Active);
        assert_eq!(snap.fault_count, 1);

        // The next suspension doubles.
        let again = start + Duration::from_secs(3);
        ctx.on_fault_at(FaultKind::Generic, limits(5, 5), &policy(2, 8), again);
        assert!(!ctx.ready_to_send_at(again + Duration::from_millis(3999)));
        assert!(ctx.ready_to_send_at(again + Duration::from_secs(4)));
    }

    #[test]
    fn test_success_resets_everything() {
        let ctx = EndpointContext::new("e");
        let policy = policy(1, 4);
        ctx.on_fault(FaultKind::Generic, limits(1, 1), &policy);
        ctx.on_fault(FaultKind::Timeout, limits(1, 1), &policy);

        ctx.on_success();

        let snap = ctx.snapshot();
        assert_eq!(snap.state, EndpointState::Active);
        assert_eq!(snap.fault_count, 0);
        assert_eq!(snap.timeout_count, 0);
        assert_eq!(snap.suspend_until, None);
        assert_eq!(snap.current_backoff_ms, None);

        // Backoff restarts from the initial duration.
        let t = ctx.on_fault(FaultKind::Generic, limits(1, 1), &policy);
        assert_eq!(t, Transition::Suspended { count: 1, duration: Duration::from_secs(1) });
    }

    #[test]
    fn test_child_failure_counting_keeps_state() {
        let ctx = EndpointContext::new("group");
        assert!(!ctx.count_child_failure(FaultKind::Generic, limits(1, 1)));
        assert!(ctx.count_child_failure(FaultKind::Generic, limits(1, 1)));

        let snap = ctx.snapshot();
        assert_eq!(snap.state, EndpointState::Active);
        assert_eq!(snap.fault_count, 2);
    }

    #[test]
    fn test_concurrent_faults_are_not_lost() {
        let ctx = std::sync::Arc::new(EndpointContext::new("shared"));
        let policy = policy(0, 0);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        ctx.on_fault(FaultKind::Generic, limits(u32::MAX, u32::MAX), &policy);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ctx.snapshot().fault_count, 2000);
    }
}
