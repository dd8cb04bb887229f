use crate::constants::default_plan;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership plan reference data
///
/// `id` is `None` for the built-in default plan, which is what distinguishes a
/// persisted plan from the fallback in reward calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
    pub id: Option<Uuid>,
    pub name: String,
    pub tasks_per_day: i32,
    pub daily_task_earning: i64,
    pub max_earning_days: i32,
}

impl MembershipPlan {
    /// Built-in plan used when no persisted row matches `name`
    pub fn builtin_default(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            tasks_per_day: default_plan::TASKS_PER_DAY,
            daily_task_earning: default_plan::DAILY_TASK_EARNING,
            max_earning_days: default_plan::MAX_EARNING_DAYS,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_default_values() {
        let plan = MembershipPlan::builtin_default("GOLD");
        assert!(!plan.is_persisted());
        assert_eq!(plan.name, "GOLD");
        assert_eq!(plan.tasks_per_day, 5);
        assert_eq!(plan.daily_task_earning, 0);
        assert_eq!(plan.max_earning_days, 365);
    }
}
