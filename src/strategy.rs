//! Retrieval strategies and their budget profiles.

use serde::{Deserialize, Serialize};

/// Named budget profile controlling how much context a query gathers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// Wide net: large per-source caps, large final context
    Comprehensive,
    /// Balanced default
    Focused,
    /// Minimal latency and context
    Rapid,
}

impl RetrievalStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Focused => "focused",
            Self::Rapid => "rapid",
        }
    }
}

impl Default for RetrievalStrategy {
    fn default() -> Self {
        Self::Focused
    }
}

/// Budget for one strategy: per-source result cap and final context size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Maximum results requested from each source
    pub per_source_k: usize,
    /// Size of the merged, ranked context handed to synthesis
    pub final_top_n: usize,
}

/// Profile table resolving a strategy to its budget.
///
/// The numbers are tunable defaults, not a contract; deployments override
/// them through configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrategyProfiles {
    pub comprehensive: StrategyProfile,
    pub focused: StrategyProfile,
    pub rapid: StrategyProfile,
}

impl Default for StrategyProfiles {
    fn default() -> Self {
        Self {
            comprehensive: StrategyProfile {
                per_source_k: 15,
                final_top_n: 20,
            },
            focused: StrategyProfile {
                per_source_k: 10,
                final_top_n: 10,
            },
            rapid: StrategyProfile {
                per_source_k: 5,
                final_top_n: 5,
            },
        }
    }
}

impl StrategyProfiles {
    /// Resolve a strategy to its budget profile
    pub fn profile(&self, strategy: RetrievalStrategy) -> StrategyProfile {
        match strategy {
            RetrievalStrategy::Comprehensive => self.comprehensive,
            RetrievalStrategy::Focused => self.focused,
            RetrievalStrategy::Rapid => self.rapid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let profiles = StrategyProfiles::default();
        assert_eq!(profiles.profile(RetrievalStrategy::Comprehensive).final_top_n, 20);
        assert_eq!(profiles.profile(RetrievalStrategy::Focused).per_source_k, 10);
        assert_eq!(profiles.profile(RetrievalStrategy::Rapid).final_top_n, 5);
    }

    #[test]
    fn test_strategy_serde_lowercase() {
        let json = serde_json::to_string(&RetrievalStrategy::Comprehensive).unwrap();
        assert_eq!(json, "\"comprehensive\"");

        let parsed: RetrievalStrategy = serde_json::from_str("\"rapid\"").unwrap();
        assert_eq!(parsed, RetrievalStrategy::Rapid);
    }

    #[test]
    fn test_strategy_default_is_focused() {
        assert_eq!(RetrievalStrategy::default(), RetrievalStrategy::Focused);
    }
}
