//! # Reward Calculator
//!
//! Per-task reward resolution. Precedence is a single ordered match over
//! [`RewardPolicy`]:
//!
//! 1. `Override(amount)`: a positive platform-wide flat amount
//! 2. `PlanDerived(plan)`: a persisted plan with a positive daily earning,
//!    split evenly across `tasks_per_day` and rounded half away from zero
//! 3. `Fallback(amount)`: the configured constant
//!
//! The override is read from its source on every request and nothing here is
//! cached, so plan edits take effect immediately.

use crate::models::MembershipPlan;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// The rule that produced a reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RewardPolicy {
    Override { amount: i64 },
    PlanDerived { plan: MembershipPlan },
    Fallback { amount: i64 },
}

impl RewardPolicy {
    /// Select the policy that applies; first match wins
    pub fn resolve(global_override: Option<i64>, plan: &MembershipPlan, fallback: i64) -> Self {
        match global_override {
            Some(amount) if amount > 0 => Self::Override { amount },
            _ if plan.is_persisted()
                && plan.daily_task_earning > 0
                && plan.tasks_per_day > 0 =>
            {
                Self::PlanDerived { plan: plan.clone() }
            }
            _ => Self::Fallback { amount: fallback },
        }
    }

    pub fn amount(&self) -> i64 {
        match self {
            Self::Override { amount } | Self::Fallback { amount } => *amount,
            Self::PlanDerived { plan } => {
                divide_rounded(plan.daily_task_earning, i64::from(plan.tasks_per_day))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Override { .. } => "override",
            Self::PlanDerived { .. } => "plan_derived",
            Self::Fallback { .. } => "fallback",
        }
    }
}

/// Reward for one task under `plan`
pub fn compute_reward(global_override: Option<i64>, plan: &MembershipPlan, fallback: i64) -> i64 {
    RewardPolicy::resolve(global_override, plan, fallback).amount()
}

/// Integer division rounding half away from zero; `divisor` must be positive
fn divide_rounded(dividend: i64, divisor: i64) -> i64 {
    let quotient = dividend / divisor;
    let remainder = dividend % divisor;
    if remainder.abs() * 2 >= divisor {
        quotient + dividend.signum()
    } else {
        quotient
    }
}

/// Where the global flat reward comes from
pub trait RewardOverrideSource: Send + Sync + std::fmt::Debug {
    /// Current override; `None` when unset or not a positive integer
    fn current(&self) -> Option<i64>;
}

/// Reads the override from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvRewardOverride {
    var: String,
}

impl EnvRewardOverride {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl RewardOverrideSource for EnvRewardOverride {
    fn current(&self) -> Option<i64> {
        let raw = std::env::var(&self.var).ok()?;
        parse_override(&self.var, &raw)
    }
}

fn parse_override(var: &str, raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(amount) if amount > 0 => Some(amount),
        Ok(_) => None,
        Err(e) => {
            warn!(var = %var, value = %raw, error = %e, "Ignoring unparseable reward override");
            None
        }
    }
}

/// Fixed override, for tests and embedding
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRewardOverride(pub Option<i64>);

impl RewardOverrideSource for StaticRewardOverride {
    fn current(&self) -> Option<i64> {
        self.0.filter(|amount| *amount > 0)
    }
}

/// Shared handle used by the engine
pub type SharedRewardOverride = Arc<dyn RewardOverrideSource>;
