use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use task_rewards::config::RateLimitsConfig;
use task_rewards::eligibility::ReferralRequirement;
use task_rewards::models::{MembershipPlan, ReferralSnapshot};
use task_rewards::rate_limiter::RateLimiter;
use task_rewards::reward::compute_reward;
use uuid::Uuid;

fn plan_strategy() -> impl Strategy<Value = MembershipPlan> {
    (any::<bool>(), 0i32..50, 0i64..100_000, 1i32..730).prop_map(
        |(persisted, tasks_per_day, daily_task_earning, max_earning_days)| MembershipPlan {
            id: persisted.then(Uuid::new_v4),
            name: "STANDARD".to_string(),
            tasks_per_day,
            daily_task_earning,
            max_earning_days,
        },
    )
}

fn plan_name_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("BASIC".to_string())),
        Just(Some("standard".to_string())),
        Just(Some("STANDARD".to_string())),
        Just(Some("PREMIUM".to_string())),
        Just(Some("GOLD".to_string())),
    ]
}

fn referrals_strategy() -> impl Strategy<Value = Vec<ReferralSnapshot>> {
    prop::collection::vec(
        plan_name_strategy().prop_map(|plan| ReferralSnapshot {
            user_id: Uuid::new_v4(),
            membership_plan: plan,
        }),
        0..6,
    )
}

fn requirement_strategy() -> impl Strategy<Value = ReferralRequirement> {
    prop_oneof![
        Just(ReferralRequirement::AnyReferral),
        Just(ReferralRequirement::StandardOrAbove),
        Just(ReferralRequirement::PremiumOnly),
    ]
}

proptest! {
    /// Reward depends only on its inputs
    #[test]
    fn reward_is_deterministic(plan in plan_strategy(), amount in prop::option::of(-10i64..1000)) {
        let first = compute_reward(amount, &plan, 30);
        let second = compute_reward(amount, &plan.clone(), 30);
        prop_assert_eq!(first, second);
    }

    /// A positive override always wins
    #[test]
    fn positive_override_wins(plan in plan_strategy(), amount in 1i64..10_000) {
        prop_assert_eq!(compute_reward(Some(amount), &plan, 30), amount);
    }

    /// Plan-derived rewards stay within half a unit of the exact share
    #[test]
    fn plan_share_is_rounded(plan in plan_strategy()) {
        let reward = compute_reward(None, &plan, 30);
        if plan.id.is_some() && plan.daily_task_earning > 0 && plan.tasks_per_day > 0 {
            let exact = plan.daily_task_earning as f64 / f64::from(plan.tasks_per_day);
            prop_assert!((reward as f64 - exact).abs() <= 0.5);
        } else {
            prop_assert_eq!(reward, 30);
        }
    }

    /// Adding a referral never revokes qualification
    #[test]
    fn referral_qualification_is_monotonic(
        requirement in requirement_strategy(),
        referrals in referrals_strategy(),
        extra in plan_name_strategy(),
    ) {
        let before = requirement.is_satisfied_by(&referrals);
        let mut more = referrals.clone();
        more.push(ReferralSnapshot { user_id: Uuid::new_v4(), membership_plan: extra });
        if before {
            prop_assert!(requirement.is_satisfied_by(&more));
        }
    }

    /// Stricter tiers are satisfied only by sets the looser tiers accept
    #[test]
    fn referral_tiers_nest(referrals in referrals_strategy()) {
        let premium = ReferralRequirement::PremiumOnly.is_satisfied_by(&referrals);
        let standard = ReferralRequirement::StandardOrAbove.is_satisfied_by(&referrals);
        let any = ReferralRequirement::AnyReferral.is_satisfied_by(&referrals);
        prop_assert!(!premium || standard);
        prop_assert!(!standard || any);
    }

    /// No window of `window_ms` ever admits more than `limit` requests
    #[test]
    fn rate_limiter_admission_bound(
        limit in 1u32..8,
        window_ms in 100u64..2_000,
        gaps in prop::collection::vec(0i64..400, 1..60),
    ) {
        let limiter = RateLimiter::in_memory(RateLimitsConfig::default());
        let window = std::time::Duration::from_millis(window_ms);
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let mut now = start;
        let mut admitted = Vec::new();
        tokio_test::block_on(async {
            for gap in &gaps {
                now += Duration::milliseconds(*gap);
                if limiter.check_limit_at("prop", limit, window, now).await.success {
                    admitted.push(now);
                }
            }
        });

        let window = Duration::milliseconds(window_ms as i64);
        for (i, at) in admitted.iter().enumerate() {
            let in_window = admitted[i..].iter().take_while(|t| **t < *at + window).count();
            prop_assert!(in_window <= limit as usize);
        }
    }
}
