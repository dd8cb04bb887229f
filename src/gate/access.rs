use std::collections::HashSet;
use uuid::Uuid;

/// Caller identity and origin, as established by the upstream gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// `None` when no authenticated session accompanies the request
    pub user_id: Option<Uuid>,
    /// ISO-3166 alpha-2 country of the request origin, when known
    pub country: Option<String>,
}

impl RequestContext {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            country: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Block { reason: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether a request may reach the engine at all
pub trait AccessGate: Send + Sync + std::fmt::Debug {
    fn check(&self, ctx: &RequestContext) -> AccessDecision;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGate;

impl AccessGate for AllowAllGate {
    fn check(&self, _ctx: &RequestContext) -> AccessDecision {
        AccessDecision::Allow
    }
}

/// Blocks requests whose country is on the configured list.
///
/// Requests with no known country are allowed.
#[derive(Debug, Clone, Default)]
pub struct CountryBlocklistGate {
    blocked: HashSet<String>,
}

impl CountryBlocklistGate {
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked = countries
            .into_iter()
            .map(|c| normalize_country(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        Self { blocked }
    }

    pub fn is_blocked(&self, country: &str) -> bool {
        self.blocked.contains(&normalize_country(country))
    }
}

fn normalize_country(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl AccessGate for CountryBlocklistGate {
    fn check(&self, ctx: &RequestContext) -> AccessDecision {
        match ctx.country.as_deref() {
            Some(country) if self.is_blocked(country) => AccessDecision::Block {
                reason: format!(
                    "Service is not available in your region ({})",
                    normalize_country(country)
                ),
            },
            _ => AccessDecision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocklist_is_case_insensitive() {
        let gate = CountryBlocklistGate::new(["kp", " IR "]);
        let blocked = RequestContext::anonymous().with_country("KP");
        assert!(!gate.check(&blocked).is_allowed());
        let blocked = RequestContext::anonymous().with_country("ir");
        assert!(!gate.check(&blocked).is_allowed());
    }

    #[test]
    fn test_unknown_country_allowed() {
        let gate = CountryBlocklistGate::new(["KP"]);
        assert!(gate.check(&RequestContext::anonymous()).is_allowed());
        let ctx = RequestContext::for_user(Uuid::new_v4()).with_country("NG");
        assert!(gate.check(&ctx).is_allowed());
    }

    #[test]
    fn test_allow_all() {
        let ctx = RequestContext::anonymous().with_country("KP");
        assert_eq!(AllowAllGate.check(&ctx), AccessDecision::Allow);
    }
}
