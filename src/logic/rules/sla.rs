use crate::models::{ErrorCode, SlaConfig};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Time source for budget accounting.
///
/// `now` must be monotonic. Implementations are shared by every evaluation
/// running on an engine, so they must be thread-safe.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Wall-clock time used to stamp alerts.
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Outcome of asking the governor whether the next rule may run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Run the rule; carries the instant the rule's own clock starts at.
    Proceed(Instant),
    /// The pass budget is spent; stop after logging the current rule.
    BudgetExhausted { elapsed_ms: f64 },
}

/// Enforces rule-count, pass and per-rule budgets for one evaluation pass.
pub struct SlaGovernor<'a, C: Clock> {
    sla: SlaConfig,
    clock: &'a C,
    started: Instant,
}

impl<'a, C: Clock> SlaGovernor<'a, C> {
    pub fn start(sla: SlaConfig, clock: &'a C) -> Self {
        Self {
            sla,
            clock,
            started: clock.now(),
        }
    }

    pub fn check_rule_count(&self, enabled_rules: usize) -> Result<(), ErrorCode> {
        if enabled_rules > self.sla.max_rules {
            tracing::warn!(
                enabled_rules,
                max_rules = self.sla.max_rules,
                "Enabled rule count exceeds SLA limit"
            );
            return Err(ErrorCode::SlaRuleLimitExceeded);
        }
        Ok(())
    }

    /// Checked before every rule. The same reading starts the rule's timer.
    pub fn admit_rule(&self) -> Admission {
        let now = self.clock.now();
        let elapsed_ms = millis_between(self.started, now);

        if elapsed_ms > self.sla.max_total_evaluation_ms as f64 {
            Admission::BudgetExhausted { elapsed_ms }
        } else {
            Admission::Proceed(now)
        }
    }

    pub fn rule_elapsed_ms(&self, rule_started: Instant) -> f64 {
        millis_between(rule_started, self.clock.now())
    }

    pub fn rule_budget_exceeded(&self, rule_elapsed_ms: f64) -> bool {
        rule_elapsed_ms > self.sla.max_rule_evaluation_ms as f64
    }

    pub fn total_elapsed_ms(&self) -> f64 {
        millis_between(self.started, self.clock.now())
    }
}

fn millis_between(from: Instant, to: Instant) -> f64 {
    to.saturating_duration_since(from).as_secs_f64() * 1000.0
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    /// Advances by a fixed step on every reading.
    pub struct SteppingClock {
        base: Instant,
        step: Duration,
        ticks: AtomicU32,
    }

    impl SteppingClock {
        pub fn new(step: Duration) -> Self {
            Self {
                base: Instant::now(),
                step,
                ticks: AtomicU32::new(0),
            }
        }

        pub fn millis(step_ms: u64) -> Self {
            Self::new(Duration::from_millis(step_ms))
        }

        pub fn readings(&self) -> u32 {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Instant {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            self.base + self.step * tick
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::SteppingClock;
    use super::*;

    fn sla(max_rules: usize, total_ms: u64, rule_ms: u64) -> SlaConfig {
        SlaConfig {
            max_rules,
            max_total_evaluation_ms: total_ms,
            max_rule_evaluation_ms: rule_ms,
        }
    }

    #[test]
    fn rule_count_guard_is_inclusive_limit() {
        let clock = SteppingClock::millis(0);
        let governor = SlaGovernor::start(sla(2, 100, 10), &clock);
        assert!(governor.check_rule_count(2).is_ok());
        assert_eq!(
            governor.check_rule_count(3),
            Err(ErrorCode::SlaRuleLimitExceeded)
        );
    }

    #[test]
    fn admits_until_total_budget_exceeded() {
        // start = 0ms, then readings at 10, 20, 30
        let clock = SteppingClock::millis(10);
        let governor = SlaGovernor::start(sla(10, 20, 100), &clock);

        assert!(matches!(governor.admit_rule(), Admission::Proceed(_)));
        // exactly at the budget still runs
        assert!(matches!(governor.admit_rule(), Admission::Proceed(_)));
        match governor.admit_rule() {
            Admission::BudgetExhausted { elapsed_ms } => assert!((elapsed_ms - 30.0).abs() < 1e-6),
            other => panic!("expected exhausted budget, got {:?}", other),
        }
    }

    #[test]
    fn per_rule_budget_uses_admission_instant() {
        let clock = SteppingClock::millis(7);
        let governor = SlaGovernor::start(sla(10, 1_000, 5), &clock);

        let Admission::Proceed(started) = governor.admit_rule() else {
            panic!("rule should be admitted");
        };
        let elapsed = governor.rule_elapsed_ms(started);
        assert!((elapsed - 7.0).abs() < 1e-6);
        assert!(governor.rule_budget_exceeded(elapsed));
        assert!(!governor.rule_budget_exceeded(5.0));
        assert_eq!(clock.readings(), 3);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let governor = SlaGovernor::start(SlaConfig::default(), &clock);
        let first = governor.total_elapsed_ms();
        let second = governor.total_elapsed_ms();
        assert!(second >= first);
        assert!(first >= 0.0);
    }
}
