//! Threshold rules that turn KPI values into suggested actions.
//!
//! Rules are plain data: a metric, an interval and a priority. A rule whose
//! metric has no data for the current view never fires.

use std::ops::{Bound, RangeBounds};

use serde::Serialize;

use crate::kpi::{CycleTimeSource, KpiSet};
use crate::models::Priority;

use self::RecommendationPriority::{High, Low, Medium};
use self::RuleMetric::{
    CriticalBugsRatio, CriticalCycleTimeDays, CriticalPending, CycleTimeDays, DefectDensity,
    General, ResolutionEfficiency, TestCasesPerSprint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    High,
    Medium,
    Low,
}

impl RecommendationPriority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMetric {
    TestCasesPerSprint,
    ResolutionEfficiency,
    CriticalBugsRatio,
    CriticalPending,
    CycleTimeDays,
    CriticalCycleTimeDays,
    DefectDensity,
    General,
}

impl RuleMetric {
    /// `None` when the view holds nothing this metric could describe.
    #[must_use]
    pub fn value(self, kpis: &KpiSet) -> Option<f64> {
        let has_bugs = kpis.total_bugs > 0;
        let has_cycle_time = kpis.cycle_time.source != CycleTimeSource::Unavailable;
        match self {
            Self::TestCasesPerSprint => (kpis.sprint_count > 0 && kpis.test_cases_executed > 0)
                .then_some(kpis.avg_test_cases_per_sprint as f64),
            Self::ResolutionEfficiency => {
                has_bugs.then_some(kpis.resolution_efficiency as f64)
            }
            Self::CriticalBugsRatio => has_bugs.then_some(kpis.critical_bugs_ratio as f64),
            Self::CriticalPending => has_bugs.then_some(kpis.critical_pending as f64),
            Self::CycleTimeDays => has_cycle_time.then_some(kpis.cycle_time.avg_days),
            Self::CriticalCycleTimeDays => kpis
                .cycle_time
                .by_priority
                .get(Priority::Major.as_str())
                .copied(),
            Self::DefectDensity => {
                (kpis.sprint_count > 0).then_some(kpis.defect_density.avg)
            }
            Self::General => Some(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
}

impl Threshold {
    pub const ALWAYS: Self = Self::new(Bound::Unbounded, Bound::Unbounded);

    #[must_use]
    pub const fn new(lower: Bound<f64>, upper: Bound<f64>) -> Self {
        Self { lower, upper }
    }

    #[must_use]
    pub const fn at_least(value: f64) -> Self {
        Self::new(Bound::Included(value), Bound::Unbounded)
    }

    #[must_use]
    pub const fn above(value: f64) -> Self {
        Self::new(Bound::Excluded(value), Bound::Unbounded)
    }

    #[must_use]
    pub const fn below(value: f64) -> Self {
        Self::new(Bound::Unbounded, Bound::Excluded(value))
    }

    #[must_use]
    pub const fn at_most(value: f64) -> Self {
        Self::new(Bound::Unbounded, Bound::Included(value))
    }

    #[must_use]
    pub const fn exactly(value: f64) -> Self {
        Self::new(Bound::Included(value), Bound::Included(value))
    }

    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        (self.lower, self.upper).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationRule {
    pub id: &'static str,
    pub metric: RuleMetric,
    pub threshold: Threshold,
    pub priority: RecommendationPriority,
    pub title: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: &'static str,
    pub metric: RuleMetric,
    pub priority: RecommendationPriority,
    pub value: f64,
    pub title: &'static str,
    pub action: &'static str,
}

const fn rule(
    id: &'static str,
    metric: RuleMetric,
    threshold: Threshold,
    priority: RecommendationPriority,
    title: &'static str,
    action: &'static str,
) -> RecommendationRule {
    RecommendationRule {
        id,
        metric,
        threshold,
        priority,
        title,
        action,
    }
}

const RULES: &[RecommendationRule] = &[
    rule(
        "test-cases-strong",
        TestCasesPerSprint,
        Threshold::at_least(200.0),
        Low,
        "Sustain test throughput",
        "Keep the current execution pace and start automating the most repeated cases.",
    ),
    rule(
        "test-cases-moderate",
        TestCasesPerSprint,
        Threshold::new(Bound::Included(150.0), Bound::Excluded(200.0)),
        Medium,
        "Raise test coverage",
        "Add cases for modules with the most defects and review the sprint test plan.",
    ),
    rule(
        "test-cases-low",
        TestCasesPerSprint,
        Threshold::below(150.0),
        High,
        "Expand test execution capacity",
        "Reserve sprint capacity for execution and prioritize regression suites.",
    ),
    rule(
        "resolution-efficiency-strong",
        ResolutionEfficiency,
        Threshold::at_least(80.0),
        Low,
        "Maintain resolution pace",
        "Document the triage practices that keep the closure rate high.",
    ),
    rule(
        "resolution-efficiency-moderate",
        ResolutionEfficiency,
        Threshold::new(Bound::Included(70.0), Bound::Excluded(80.0)),
        Medium,
        "Tighten defect follow-up",
        "Review bugs older than one sprint in every planning session.",
    ),
    rule(
        "resolution-efficiency-low",
        ResolutionEfficiency,
        Threshold::below(70.0),
        High,
        "Recover resolution efficiency",
        "Dedicate capacity to the pending backlog before taking new scope.",
    ),
    rule(
        "critical-ratio-high",
        CriticalBugsRatio,
        Threshold::above(30.0),
        High,
        "Critical defects dominate the backlog",
        "Escalate open Major bugs and hold releases until they are addressed.",
    ),
    rule(
        "critical-ratio-moderate",
        CriticalBugsRatio,
        Threshold::new(Bound::Included(20.0), Bound::Included(30.0)),
        Medium,
        "Watch the critical share",
        "Review root causes of recent Major bugs with the owning teams.",
    ),
    rule(
        "critical-ratio-low",
        CriticalBugsRatio,
        Threshold::below(20.0),
        Low,
        "Critical share under control",
        "Keep the current severity triage criteria.",
    ),
    rule(
        "critical-pending-high",
        CriticalPending,
        Threshold::above(15.0),
        High,
        "Large critical backlog",
        "Run a focused fix sprint on untouched Major bugs.",
    ),
    rule(
        "critical-pending-moderate",
        CriticalPending,
        Threshold::new(Bound::Included(10.0), Bound::Included(15.0)),
        Medium,
        "Critical backlog growing",
        "Assign an owner to every untouched Major bug this sprint.",
    ),
    rule(
        "critical-pending-low",
        CriticalPending,
        Threshold::new(Bound::Excluded(0.0), Bound::Excluded(10.0)),
        Low,
        "Few critical bugs pending",
        "Track the remaining Major bugs in the daily stand-up.",
    ),
    rule(
        "critical-pending-clear",
        CriticalPending,
        Threshold::exactly(0.0),
        Low,
        "No critical bugs pending",
        "Keep severity reviews in place to preserve a clean critical backlog.",
    ),
    rule(
        "cycle-time-slow",
        CycleTimeDays,
        Threshold::above(10.0),
        High,
        "Slow defect resolution",
        "Break large fixes down and limit work in progress per developer.",
    ),
    rule(
        "cycle-time-moderate",
        CycleTimeDays,
        Threshold::new(Bound::Excluded(7.0), Bound::Included(10.0)),
        Medium,
        "Resolution time above target",
        "Shorten hand-offs between development and verification.",
    ),
    rule(
        "cycle-time-fast",
        CycleTimeDays,
        Threshold::at_most(7.0),
        Low,
        "Resolution time on target",
        "Keep the current review and verification flow.",
    ),
    rule(
        "critical-cycle-time-slow",
        CriticalCycleTimeDays,
        Threshold::above(5.0),
        High,
        "Critical fixes take too long",
        "Fast-track Major bugs with a dedicated on-call developer.",
    ),
    rule(
        "defect-density-high",
        DefectDensity,
        Threshold::above(2.0),
        High,
        "High defect density",
        "Strengthen code review and unit testing in the noisiest modules.",
    ),
    rule(
        "defect-density-moderate",
        DefectDensity,
        Threshold::new(Bound::Excluded(1.0), Bound::Included(2.0)),
        Medium,
        "Defect density above target",
        "Add acceptance checks to stories that produced bugs last sprint.",
    ),
    rule(
        "defect-density-low",
        DefectDensity,
        Threshold::at_most(1.0),
        Low,
        "Defect density on target",
        "Share the practices of the cleanest modules with the other teams.",
    ),
    rule(
        "general-review",
        General,
        Threshold::ALWAYS,
        Low,
        "Review QA metrics weekly",
        "Walk through these indicators with the team at every sprint review.",
    ),
];

#[must_use]
pub fn rules() -> &'static [RecommendationRule] {
    RULES
}

/// Matching rules, in table order.
#[must_use]
pub fn recommend(kpis: &KpiSet) -> Vec<Recommendation> {
    recommend_with(RULES, kpis)
}

#[must_use]
pub fn recommend_with(rules: &[RecommendationRule], kpis: &KpiSet) -> Vec<Recommendation> {
    rules
        .iter()
        .filter_map(|rule| {
            let value = rule.metric.value(kpis)?;
            rule.threshold.matches(value).then_some(Recommendation {
                id: rule.id,
                metric: rule.metric,
                priority: rule.priority,
                value,
                title: rule.title,
                action: rule.action,
            })
        })
        .collect()
}
