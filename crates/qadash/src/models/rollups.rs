use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::records::normalize_label;

const HIGH_WORKLOAD_PENDING: u64 = 15;
const MEDIUM_WORKLOAD_PENDING: u64 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityRollup {
    pub count: u64,
    pub pending: u64,
    pub resolved: u64,
    pub canceled: u64,
}

/// Module or category bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GroupRollup {
    pub name: String,
    pub count: u64,
    pub pending: u64,
    pub resolved: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    High,
    Medium,
    Low,
}

impl Workload {
    #[must_use]
    pub const fn from_pending(pending: u64) -> Self {
        if pending > HIGH_WORKLOAD_PENDING {
            Self::High
        } else if pending > MEDIUM_WORKLOAD_PENDING {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "high" | "alto" | "alta" => Some(Self::High),
            "medium" | "medio" | "media" => Some(Self::Medium),
            "low" | "bajo" | "baja" => Some(Self::Low),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeveloperRollup {
    pub developer: String,
    pub total: u64,
    pub pending: u64,
    pub resolved: u64,
    pub efficiency_pct: u64,
    pub workload: Workload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Breakdowns {
    pub by_priority: BTreeMap<String, PriorityRollup>,
    pub by_module: Vec<GroupRollup>,
    pub by_category: Vec<GroupRollup>,
    pub developers: Vec<DeveloperRollup>,
}

impl Breakdowns {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_priority.is_empty()
            && self.by_module.is_empty()
            && self.by_category.is_empty()
            && self.developers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Workload;

    #[test]
    fn workload_thresholds_are_strict() {
        assert_eq!(Workload::from_pending(16), Workload::High);
        assert_eq!(Workload::from_pending(15), Workload::Medium);
        assert_eq!(Workload::from_pending(9), Workload::Medium);
        assert_eq!(Workload::from_pending(8), Workload::Low);
    }

    #[test]
    fn workload_labels_accept_spanish() {
        assert_eq!(Workload::parse("Alto"), Some(Workload::High));
        assert_eq!(Workload::parse("medio"), Some(Workload::Medium));
        assert_eq!(Workload::parse("BAJO"), Some(Workload::Low));
        assert_eq!(Workload::parse("n/a"), None);
    }
}
