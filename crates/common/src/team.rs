//! Team labels and their static descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CrewError;

/// The closed set of crews a task can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamLabel {
    Small,
    Standard,
    Fullstack,
    Security,
    Refactoring,
    Performance,
}

impl TeamLabel {
    /// All labels, in listing order. This is also the priority order used
    /// when sniffing a label out of free text.
    pub const ALL: [TeamLabel; 6] = [
        TeamLabel::Small,
        TeamLabel::Standard,
        TeamLabel::Fullstack,
        TeamLabel::Security,
        TeamLabel::Refactoring,
        TeamLabel::Performance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamLabel::Small => "small",
            TeamLabel::Standard => "standard",
            TeamLabel::Fullstack => "fullstack",
            TeamLabel::Security => "security",
            TeamLabel::Refactoring => "refactoring",
            TeamLabel::Performance => "performance",
        }
    }

    pub fn descriptor(&self) -> &'static CrewDescriptor {
        match self {
            TeamLabel::Small => &DESCRIPTORS[0],
            TeamLabel::Standard => &DESCRIPTORS[1],
            TeamLabel::Fullstack => &DESCRIPTORS[2],
            TeamLabel::Security => &DESCRIPTORS[3],
            TeamLabel::Refactoring => &DESCRIPTORS[4],
            TeamLabel::Performance => &DESCRIPTORS[5],
        }
    }
}

impl Default for TeamLabel {
    fn default() -> Self {
        Self::Standard
    }
}

impl fmt::Display for TeamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamLabel {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        TeamLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == needle)
            .ok_or_else(|| CrewError::Config(format!("Unknown team: {}", s.trim())))
    }
}

/// Relative cost of running a crew once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Low,
    Balanced,
    Focused,
    Specialized,
    Premium,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Low => "low",
            CostTier::Balanced => "balanced",
            CostTier::Focused => "focused",
            CostTier::Specialized => "specialized",
            CostTier::Premium => "premium",
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata describing one crew.
#[derive(Debug, Clone, Serialize)]
pub struct CrewDescriptor {
    pub label: TeamLabel,
    pub title: &'static str,
    pub role_count: usize,
    /// Roles making up the crew, for display.
    pub roles: &'static str,
    /// What kind of task the crew is meant for.
    pub use_for: &'static str,
    pub cost_tier: CostTier,
    /// Approximate cost of one run in USD.
    pub approx_cost: &'static str,
}

impl CrewDescriptor {
    /// One-line description used by the CLI.
    pub fn summary_line(&self) -> String {
        format!(
            "{} ({} agents: {}) - {}",
            self.title, self.role_count, self.roles, self.use_for
        )
    }
}

static DESCRIPTORS: [CrewDescriptor; 6] = [
    CrewDescriptor {
        label: TeamLabel::Small,
        title: "Small Task Crew",
        role_count: 2,
        roles: "Developer + Tester",
        use_for: "bug fixes, simple scripts, small changes, quick fixes",
        cost_tier: CostTier::Low,
        approx_cost: "~$0.03",
    },
    CrewDescriptor {
        label: TeamLabel::Standard,
        title: "Standard Crew",
        role_count: 4,
        roles: "Orchestrator + Developer + Tester + Documenter",
        use_for: "regular projects, new features, modules, everyday development",
        cost_tier: CostTier::Balanced,
        approx_cost: "~$0.10",
    },
    CrewDescriptor {
        label: TeamLabel::Fullstack,
        title: "Full-Stack Crew",
        role_count: 8,
        roles: "Orchestrator + Architect + Backend + Frontend + Database + Tester + DevOps + Documenter",
        use_for: "complete web applications, APIs with frontend, microservices",
        cost_tier: CostTier::Premium,
        approx_cost: "~$0.50",
    },
    CrewDescriptor {
        label: TeamLabel::Security,
        title: "Security Crew",
        role_count: 5,
        roles: "Security Expert + Code Reviewer + Pentester + Developer + Documenter",
        use_for: "security audits, penetration testing, vulnerability scans, security fixes",
        cost_tier: CostTier::Specialized,
        approx_cost: "~$0.30",
    },
    CrewDescriptor {
        label: TeamLabel::Refactoring,
        title: "Refactoring Crew",
        role_count: 4,
        roles: "Code Reviewer + Refactoring Expert + Tester + Documenter",
        use_for: "code quality, legacy modernization, clean code, technical debt",
        cost_tier: CostTier::Focused,
        approx_cost: "~$0.20",
    },
    CrewDescriptor {
        label: TeamLabel::Performance,
        title: "Performance Crew",
        role_count: 3,
        roles: "Performance Expert + Developer + Tester",
        use_for: "performance optimization, bottlenecks, speed-ups, benchmarks",
        cost_tier: CostTier::Focused,
        approx_cost: "~$0.15",
    },
];
