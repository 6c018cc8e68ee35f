use revlite_core::ConflictPolicy;

/// Store configuration. The conflict policy is deliberately explicit here:
/// whether a stale-parent write records a sibling or fails is an application
/// decision, not something the store hard-codes.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub conflict_policy: ConflictPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.conflict_policy, ConflictPolicy::RecordSiblings);
    }

    #[test]
    fn test_builder_setters() {
        let config = StoreConfig::new("sqlite:tasks.db")
            .max_connections(2)
            .conflict_policy(ConflictPolicy::FailOnConflict);
        assert_eq!(config.database_url, "sqlite:tasks.db");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.conflict_policy, ConflictPolicy::FailOnConflict);
    }
}
