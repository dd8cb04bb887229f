use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Membership state set by the payment-confirmation collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    #[default]
    Inactive,
    Active,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Active => write!(f, "ACTIVE"),
        }
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INACTIVE" => Ok(Self::Inactive),
            "ACTIVE" => Ok(Self::Active),
            _ => Err(format!("Invalid membership status: {s}")),
        }
    }
}

/// A platform member and their earning counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub membership_status: MembershipStatus,
    pub membership_plan: Option<String>,
    pub membership_start_date: Option<DateTime<Utc>>,
    pub tasks_enabled: bool,
    /// Referring user; a lookup key only, the sponsor is never loaded through it
    pub sponsor_id: Option<Uuid>,
    pub balance: i64,
    pub total_points: i64,
    pub total_earnings: i64,
    pub tasks_completed: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly registered, inactive user
    pub fn new(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            membership_status: MembershipStatus::Inactive,
            membership_plan: None,
            membership_start_date: None,
            tasks_enabled: false,
            sponsor_id: None,
            balance: 0,
            total_points: 0,
            total_earnings: 0,
            tasks_completed: 0,
            created_at,
        }
    }

    pub fn is_active_member(&self) -> bool {
        self.membership_status == MembershipStatus::Active
    }

    /// Start of the earning period: membership start, else account creation
    pub fn earning_anchor(&self) -> DateTime<Utc> {
        self.membership_start_date.unwrap_or(self.created_at)
    }
}

/// The slice of a direct referral the eligibility rules look at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSnapshot {
    pub user_id: Uuid,
    pub membership_plan: Option<String>,
}

impl ReferralSnapshot {
    pub fn new(user_id: Uuid, membership_plan: Option<&str>) -> Self {
        Self {
            user_id,
            membership_plan: membership_plan.map(str::to_string),
        }
    }
}
