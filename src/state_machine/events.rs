use serde::{Deserialize, Serialize};

/// Events that drive a session transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Start,
    /// Progress percentage, 0..=100
    Progress(i32),
    Complete,
    Fail,
}

impl SessionEvent {
    /// String representation for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress(_) => "progress",
            Self::Complete => "complete",
            Self::Fail => "fail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde() {
        let json = serde_json::to_value(SessionEvent::Progress(40)).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"], 40);
        assert_eq!(SessionEvent::Complete.event_type(), "complete");
    }
}
