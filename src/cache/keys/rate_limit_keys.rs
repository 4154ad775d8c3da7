/// Segment inserted between the deployment prefix and the rate key.
const RATE_LIMIT_SEGMENT: &str = "ratelimit";

/// Actor + operation class a sliding window is kept for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub identifier: String,
    pub action: String,
}

impl RateKey {
    pub fn new(identifier: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            action: action.into(),
        }
    }

    /// Store key for this window, namespaced under `prefix`.
    pub fn store_key(&self, prefix: &str) -> String {
        format!(
            "{}:{}:{}:{}",
            prefix, RATE_LIMIT_SEGMENT, self.action, self.identifier
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key_is_namespaced_by_prefix_and_action() {
        let key = RateKey::new("U123", "message");
        assert_eq!(key.store_key("relay-bot"), "relay-bot:ratelimit:message:U123");
        assert_ne!(
            key.store_key("relay-bot"),
            RateKey::new("U123", "feedback").store_key("relay-bot")
        );
    }
}
