//! Content priority supplied by the caller.

use serde::Serialize;

/// Importance of a content unit.
///
/// Ordered by importance: `Low < Medium < High < Critical`. Less
/// important content may be condensed more aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityLevel {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl PriorityLevel {
    /// All priorities, least important first.
    pub const ALL: [PriorityLevel; 4] = [
        PriorityLevel::Low,
        PriorityLevel::Medium,
        PriorityLevel::High,
        PriorityLevel::Critical,
    ];

    /// Critical or high: content whose docs and structure are worth keeping.
    pub fn is_important(self) -> bool {
        self >= PriorityLevel::High
    }

    /// The next less important priority, if any.
    pub fn lower(self) -> Option<PriorityLevel> {
        match self {
            PriorityLevel::Critical => Some(PriorityLevel::High),
            PriorityLevel::High => Some(PriorityLevel::Medium),
            PriorityLevel::Medium => Some(PriorityLevel::Low),
            PriorityLevel::Low => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLevel::Low => "LOW",
            PriorityLevel::Medium => "MEDIUM",
            PriorityLevel::High => "HIGH",
            PriorityLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriorityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(PriorityLevel::Critical),
            "high" => Ok(PriorityLevel::High),
            "medium" => Ok(PriorityLevel::Medium),
            "low" => Ok(PriorityLevel::Low),
            _ => Err(format!("unknown priority: {}", s)),
        }
    }
}
