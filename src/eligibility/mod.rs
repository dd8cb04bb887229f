//! # Eligibility Resolver
//!
//! Pure decision over a snapshot of (user, plan, referrals, now). Nothing here
//! touches the store or the cache: callers fetch referrals fresh for every
//! evaluation, because referral state changes asynchronously.

use crate::constants::{plan_names, TRIAL_DAYS};
use crate::models::{MembershipPlan, ReferralSnapshot, User};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum referral requirement for a sponsor's plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralRequirement {
    /// At least one direct referral on any plan
    AnyReferral,
    /// At least one referral on STANDARD or PREMIUM
    StandardOrAbove,
    /// At least one referral on PREMIUM
    PremiumOnly,
}

impl ReferralRequirement {
    /// Rule table keyed by the sponsor's plan name
    pub fn for_plan(plan_name: &str) -> Self {
        match plan_name.trim().to_ascii_uppercase().as_str() {
            plan_names::STANDARD => Self::StandardOrAbove,
            plan_names::PREMIUM => Self::PremiumOnly,
            // BASIC and unknown plans
            _ => Self::AnyReferral,
        }
    }

    pub fn is_satisfied_by(&self, referrals: &[ReferralSnapshot]) -> bool {
        match self {
            Self::AnyReferral => !referrals.is_empty(),
            Self::StandardOrAbove => referrals
                .iter()
                .any(|r| plan_is(r, &[plan_names::STANDARD, plan_names::PREMIUM])),
            Self::PremiumOnly => referrals.iter().any(|r| plan_is(r, &[plan_names::PREMIUM])),
        }
    }
}

impl fmt::Display for ReferralRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyReferral => write!(f, "at least one referral"),
            Self::StandardOrAbove => write!(f, "a STANDARD or PREMIUM referral"),
            Self::PremiumOnly => write!(f, "a PREMIUM referral"),
        }
    }
}

fn plan_is(referral: &ReferralSnapshot, accepted: &[&str]) -> bool {
    referral
        .membership_plan
        .as_deref()
        .map(|plan| plan.trim().to_ascii_uppercase())
        .is_some_and(|plan| accepted.contains(&plan.as_str()))
}

/// Why a user is or is not eligible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityReason {
    WithinTrial {
        trial_ends_at: DateTime<Utc>,
    },
    ReferralQualified,
    MembershipInactive,
    TasksDisabled,
    TrialExpiredNoQualifyingReferral {
        trial_ended_at: DateTime<Utc>,
        requirement: ReferralRequirement,
    },
}

impl fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithinTrial { trial_ends_at } => {
                write!(f, "within free trial until {trial_ends_at}")
            }
            Self::ReferralQualified => write!(f, "qualifying referral on record"),
            Self::MembershipInactive => write!(f, "membership is not active"),
            Self::TasksDisabled => write!(f, "tasks are disabled for this account"),
            Self::TrialExpiredNoQualifyingReferral {
                trial_ended_at,
                requirement,
            } => write!(
                f,
                "free trial ended at {trial_ended_at} and {requirement} is required"
            ),
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDecision {
    pub eligible: bool,
    pub within_trial: bool,
    pub referral_qualified: bool,
    pub reason: EligibilityReason,
}

impl EligibilityDecision {
    /// Active member outside the trial who still needs a qualifying referral
    pub fn requires_referral(&self) -> bool {
        matches!(
            self.reason,
            EligibilityReason::TrialExpiredNoQualifyingReferral { .. }
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EligibilityResolver {
    trial_length: Duration,
}

impl Default for EligibilityResolver {
    fn default() -> Self {
        Self::new(TRIAL_DAYS)
    }
}

impl EligibilityResolver {
    pub fn new(trial_days: i64) -> Self {
        Self {
            trial_length: Duration::try_days(trial_days).unwrap_or(Duration::MAX),
        }
    }

    pub fn trial_end(&self, user: &User) -> DateTime<Utc> {
        user.earning_anchor()
            .checked_add_signed(self.trial_length)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn resolve(
        &self,
        user: &User,
        plan: &MembershipPlan,
        referrals: &[ReferralSnapshot],
        now: DateTime<Utc>,
    ) -> EligibilityDecision {
        if !user.is_active_member() {
            return Self::rejected(EligibilityReason::MembershipInactive);
        }
        if !user.tasks_enabled {
            return Self::rejected(EligibilityReason::TasksDisabled);
        }

        let trial_end = self.trial_end(user);
        if now <= trial_end {
            return EligibilityDecision {
                eligible: true,
                within_trial: true,
                referral_qualified: false,
                reason: EligibilityReason::WithinTrial {
                    trial_ends_at: trial_end,
                },
            };
        }

        let requirement = ReferralRequirement::for_plan(&plan.name);
        if requirement.is_satisfied_by(referrals) {
            EligibilityDecision {
                eligible: true,
                within_trial: false,
                referral_qualified: true,
                reason: EligibilityReason::ReferralQualified,
            }
        } else {
            EligibilityDecision {
                eligible: false,
                within_trial: false,
                referral_qualified: false,
                reason: EligibilityReason::TrialExpiredNoQualifyingReferral {
                    trial_ended_at: trial_end,
                    requirement,
                },
            }
        }
    }

    fn rejected(reason: EligibilityReason) -> EligibilityDecision {
        EligibilityDecision {
            eligible: false,
            within_trial: false,
            referral_qualified: false,
            reason,
        }
    }
}
