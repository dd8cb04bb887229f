//! # System Constants
//!
//! Operational boundaries of the task reward engine: reward fallbacks, the
//! trial window, the built-in membership plan, and the names used to look up
//! rate-limit presets and cache instances.

/// Reward paid per task when neither a global override nor a persisted plan applies
pub const FALLBACK_REWARD: i64 = 30;

/// Length of the free trial after membership start
pub const TRIAL_DAYS: i64 = 30;

/// Environment variable holding the platform-wide flat reward
pub const TASK_AMOUNT_OVERRIDE_VAR: &str = "TASK_AMOUNT_OVERRIDE";

/// Built-in plan used when no persisted plan row matches the user's plan name
pub mod default_plan {
    /// Plan name assumed for users with no plan recorded
    pub const NAME: &str = "DEFAULT";
    pub const TASKS_PER_DAY: i32 = 5;
    pub const DAILY_TASK_EARNING: i64 = 0;
    pub const MAX_EARNING_DAYS: i32 = 365;
}

/// Plan tiers understood by the referral qualification table
pub mod plan_names {
    pub const BASIC: &str = "BASIC";
    pub const STANDARD: &str = "STANDARD";
    pub const PREMIUM: &str = "PREMIUM";
}

/// Rate limiter preset names
pub mod rate_limit_presets {
    pub const LOGIN: &str = "login";
    pub const API: &str = "api";
}

/// Named cache instances, one per data class
pub mod cache_instances {
    pub const USER_AGGREGATES: &str = "user_aggregates";
    pub const TASK_CATALOG: &str = "task_catalog";
    pub const BLOG_LISTS: &str = "blog_lists";
    pub const NOTIFICATION_COUNTS: &str = "notification_counts";
    pub const MLM_ROLLUPS: &str = "mlm_rollups";

    pub const ALL: [&str; 5] = [
        USER_AGGREGATES,
        TASK_CATALOG,
        BLOG_LISTS,
        NOTIFICATION_COUNTS,
        MLM_ROLLUPS,
    ];
}

/// Upper bound on any cache instance's capacity; pattern invalidation is a linear scan
pub const MAX_CACHE_CAPACITY: u64 = 1000;

/// Engine event names handed to the event sink
pub mod events {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_PROGRESSED: &str = "task.progressed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
}
