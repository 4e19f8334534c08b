//! Keyword routing and routing decision types.

use crewroute_common::TeamLabel;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Where a routing decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    /// Keyword scoring.
    Keyword,
    /// The LLM router produced a usable label.
    Llm,
    /// The LLM router failed or answered nonsense; `standard` was used.
    Fallback,
    /// The team was chosen by the user.
    Manual,
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteSource::Keyword => "keyword",
            RouteSource::Llm => "llm",
            RouteSource::Fallback => "fallback",
            RouteSource::Manual => "manual",
        })
    }
}

/// The result of routing a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub team: TeamLabel,
    pub source: RouteSource,
}

impl RouteDecision {
    pub fn new(team: TeamLabel, source: RouteSource) -> Self {
        Self { team, source }
    }

    pub fn fallback() -> Self {
        Self::new(TeamLabel::Standard, RouteSource::Fallback)
    }
}

const SECURITY_KEYWORDS: &[&str] = &[
    "security",
    "vulnerability",
    "penetration",
    "audit",
    "exploit",
    "xss",
    "sql injection",
    "csrf",
    "authentication",
    "authorization",
    "secure",
    "hack",
    "breach",
    "owasp",
];

const REFACTORING_KEYWORDS: &[&str] = &[
    "refactor",
    "clean up",
    "improve code",
    "legacy",
    "modernize",
    "optimize code",
    "code smell",
    "technical debt",
    "restructure",
    "clean code",
    "dry",
    "solid",
];

const PERFORMANCE_KEYWORDS: &[&str] = &[
    "performance",
    "optimize",
    "speed up",
    "slow",
    "faster",
    "bottleneck",
    "profiling",
    "benchmark",
    "efficiency",
    "memory",
    "cpu",
    "latency",
    "throughput",
];

const FULLSTACK_KEYWORDS: &[&str] = &[
    "web app",
    "fullstack",
    "full stack",
    "frontend",
    "backend",
    "database",
    "react",
    "vue",
    "api",
    "rest api",
    "graphql",
    "microservice",
    "web application",
    "spa",
    "ssr",
];

const SMALL_KEYWORDS: &[&str] = &[
    "fix bug",
    "small",
    "quick",
    "simple",
    "script",
    "utility",
    "helper",
    "one function",
    "bug fix",
    "hotfix",
    "patch",
];

/// Keyword tables for the five non-default teams.
const KEYWORD_TABLE: [(TeamLabel, &[&str]); 5] = [
    (TeamLabel::Security, SECURITY_KEYWORDS),
    (TeamLabel::Refactoring, REFACTORING_KEYWORDS),
    (TeamLabel::Performance, PERFORMANCE_KEYWORDS),
    (TeamLabel::Fullstack, FULLSTACK_KEYWORDS),
    (TeamLabel::Small, SMALL_KEYWORDS),
];

/// Offline router that scores phrase matches per team.
///
/// Matching is plain substring search on the lowercased text, so short
/// phrases also hit inside longer words ("api" in "capital").
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn new() -> Self {
        Self
    }

    /// Number of distinct phrases of each team found in `task`.
    pub fn scores(&self, task: &str) -> Vec<(TeamLabel, usize)> {
        let lower = task.to_lowercase();
        KEYWORD_TABLE
            .iter()
            .map(|(team, phrases)| {
                let hits = phrases.iter().filter(|p| lower.contains(*p)).count();
                (*team, hits)
            })
            .collect()
    }

    /// The unique best-scoring team, or `standard` on zero matches or a tie.
    pub fn classify(&self, task: &str) -> TeamLabel {
        let scores = self.scores(task);
        let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let leaders: Vec<TeamLabel> = scores
            .iter()
            .filter(|(_, s)| *s == max)
            .map(|(team, _)| *team)
            .collect();

        let team = match leaders.as_slice() {
            [only] if max > 0 => *only,
            _ => TeamLabel::Standard,
        };

        debug!(?scores, team = %team, "Keyword routing");
        team
    }
}
