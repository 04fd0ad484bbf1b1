//! Progressive, budget-aware condensing of a single content unit.
//!
//! The condenser compares a unit's estimated token count with the tokens
//! available to it, picks one of five [`CondensingLevel`]s from that ratio
//! and the unit's [`PriorityLevel`], and hands the content to the strategy
//! for its language family.
//!
//! ```
//! use tokenfit::condenser::{CondensingLevel, ProgressiveCondenser};
//! use tokenfit::priority::PriorityLevel;
//!
//! let mut condenser = ProgressiveCondenser::new();
//! let source = "def f(x):\n    return x + 1\n";
//! let result = condenser.condense_with_budget(source, "f.py", 1_000, PriorityLevel::Critical, None);
//! assert_eq!(result.level, CondensingLevel::None);
//! assert_eq!(result.content, source);
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::lang::strategy_for;
use crate::language::{detect_language, Language};
use crate::priority::PriorityLevel;
use crate::tokens::{TokenCounter, TokenEstimator};

/// Degree of lossy size reduction, least to most aggressive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CondensingLevel {
    /// Content passes through unchanged.
    None,
    /// Comments and redundant blank lines removed.
    Light,
    /// Signatures plus docstrings.
    Moderate,
    /// Signatures only.
    Heavy,
    /// Skeletal structure listing.
    Maximum,
}

impl CondensingLevel {
    /// All levels, least aggressive first.
    pub const ALL: [CondensingLevel; 5] = [
        CondensingLevel::None,
        CondensingLevel::Light,
        CondensingLevel::Moderate,
        CondensingLevel::Heavy,
        CondensingLevel::Maximum,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// One step more aggressive, clamped at `Maximum`.
    pub fn increase(self) -> Self {
        Self::ALL[(self.index() + 1).min(Self::ALL.len() - 1)]
    }

    /// One step less aggressive, clamped at `None`.
    pub fn decrease(self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CondensingLevel::None => "none",
            CondensingLevel::Light => "light",
            CondensingLevel::Moderate => "moderate",
            CondensingLevel::Heavy => "heavy",
            CondensingLevel::Maximum => "maximum",
        }
    }
}

impl std::fmt::Display for CondensingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CondensingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == lower)
            .ok_or_else(|| format!("unknown condensing level: {}", s))
    }
}

/// Outcome of one condensing call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondensingResult {
    pub content: String,
    pub level: CondensingLevel,
    pub original_tokens: usize,
    /// Measured on `content`.
    pub final_tokens: usize,
    /// `original_tokens - final_tokens`; negative when condensing added
    /// annotations that outweigh what it removed.
    pub tokens_saved: i64,
    /// `final_tokens / original_tokens`, or 1.0 when the original is empty.
    pub compression_ratio: f64,
    pub priority: PriorityLevel,
}

impl CondensingResult {
    fn new(
        content: String,
        level: CondensingLevel,
        original_tokens: usize,
        final_tokens: usize,
        priority: PriorityLevel,
    ) -> Self {
        let compression_ratio = if original_tokens > 0 {
            final_tokens as f64 / original_tokens as f64
        } else {
            1.0
        };
        Self {
            content,
            level,
            original_tokens,
            final_tokens,
            tokens_saved: original_tokens as i64 - final_tokens as i64,
            compression_ratio,
            priority,
        }
    }
}

/// Counters accumulated by one condenser instance.
///
/// Instances are not shared between workers; each worker keeps its own
/// and the host combines them with [`CondenserStats::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CondenserStats {
    pub files_processed: usize,
    pub tokens_saved: i64,
    pub levels_used: BTreeMap<CondensingLevel, usize>,
}

impl CondenserStats {
    fn record(&mut self, level: CondensingLevel, tokens_saved: i64) {
        self.files_processed += 1;
        self.tokens_saved += tokens_saved;
        *self.levels_used.entry(level).or_insert(0) += 1;
    }

    /// Fold another instance's counters into this one.
    pub fn merge(&mut self, other: &CondenserStats) {
        self.files_processed += other.files_processed;
        self.tokens_saved += other.tokens_saved;
        for (level, count) in &other.levels_used {
            *self.levels_used.entry(*level).or_insert(0) += count;
        }
    }
}

// (ratio upper bound, level) tiers per priority; anything above the last
// bound is `Maximum`.
const CRITICAL_TIERS: &[(f64, CondensingLevel)] = &[
    (1.3, CondensingLevel::Light),
    (2.0, CondensingLevel::Moderate),
    (3.0, CondensingLevel::Heavy),
];
const HIGH_TIERS: &[(f64, CondensingLevel)] = &[
    (1.5, CondensingLevel::Light),
    (2.5, CondensingLevel::Moderate),
    (4.0, CondensingLevel::Heavy),
];
const DEFAULT_TIERS: &[(f64, CondensingLevel)] = &[
    (2.0, CondensingLevel::Moderate),
    (3.0, CondensingLevel::Heavy),
];

fn tier_level(compression_needed: f64, priority: PriorityLevel) -> CondensingLevel {
    let tiers = match priority {
        PriorityLevel::Critical => CRITICAL_TIERS,
        PriorityLevel::High => HIGH_TIERS,
        PriorityLevel::Medium | PriorityLevel::Low => DEFAULT_TIERS,
    };
    tiers
        .iter()
        .find(|(bound, _)| compression_needed <= *bound)
        .map(|(_, level)| *level)
        .unwrap_or(CondensingLevel::Maximum)
}

/// Tier level, never more aggressive than for any less important priority.
fn level_for_ratio(compression_needed: f64, priority: PriorityLevel) -> CondensingLevel {
    let own = tier_level(compression_needed, priority);
    match priority.lower() {
        Some(lower) => own.min(level_for_ratio(compression_needed, lower)),
        None => own,
    }
}

/// Pick a condensing level for content of `estimated_tokens` that must fit
/// into `available_tokens`.
///
/// Content that fits gets [`CondensingLevel::None`]. Otherwise the level
/// grows with `estimated / available` and, at a fixed ratio, never
/// decreases as priority decreases. A zero budget selects the most
/// aggressive level for the priority.
pub fn select_condensing_level(
    estimated_tokens: usize,
    available_tokens: usize,
    priority: PriorityLevel,
) -> CondensingLevel {
    if available_tokens >= estimated_tokens {
        return CondensingLevel::None;
    }
    let compression_needed = if available_tokens == 0 {
        f64::INFINITY
    } else {
        estimated_tokens as f64 / available_tokens as f64
    };
    level_for_ratio(compression_needed, priority)
}

/// Recommend the next level from how much of a budget is used.
///
/// Above 80% usage escalates one step, below 50% de-escalates one step.
/// A zero budget counts as 0% used.
pub fn adjust_condensing_level(
    current_level: CondensingLevel,
    tokens_used: usize,
    total_budget: usize,
) -> CondensingLevel {
    let usage = if total_budget > 0 {
        tokens_used as f64 / total_budget as f64
    } else {
        0.0
    };

    if usage > 0.8 {
        current_level.increase()
    } else if usage < 0.5 {
        current_level.decrease()
    } else {
        current_level
    }
}

/// Condenses content units to fit their token budgets.
pub struct ProgressiveCondenser<E = TokenCounter> {
    estimator: E,
    stats: CondenserStats,
}

impl ProgressiveCondenser<TokenCounter> {
    /// Condenser measuring tokens with the default tiktoken encoding.
    pub fn new() -> Self {
        Self::with_estimator(TokenCounter::default())
    }
}

impl Default for ProgressiveCondenser<TokenCounter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TokenEstimator> ProgressiveCondenser<E> {
    pub fn with_estimator(estimator: E) -> Self {
        Self {
            estimator,
            stats: CondenserStats::default(),
        }
    }

    /// Condense `content` so it approaches `available_tokens`.
    ///
    /// `locator` names the unit (typically a path); only its extension is
    /// used, to select the language strategy. `estimated_tokens` skips
    /// re-estimating the original when the caller already has a count.
    ///
    /// Never fails. Whitespace-only content is returned unchanged with
    /// nothing saved and is not counted in the stats.
    pub fn condense_with_budget(
        &mut self,
        content: &str,
        locator: &str,
        available_tokens: usize,
        priority: PriorityLevel,
        estimated_tokens: Option<usize>,
    ) -> CondensingResult {
        if content.trim().is_empty() {
            let tokens = estimated_tokens.unwrap_or_else(|| self.estimator.estimate(content));
            return CondensingResult::new(
                content.to_string(),
                CondensingLevel::None,
                tokens,
                tokens,
                priority,
            );
        }

        let original_tokens = estimated_tokens.unwrap_or_else(|| self.estimator.estimate(content));
        let level = select_condensing_level(original_tokens, available_tokens, priority);
        let language = detect_language(locator);

        let condensed = self.condense_at_level(content, language, level, priority);
        let final_tokens = self.estimator.estimate(&condensed);
        let result = CondensingResult::new(condensed, level, original_tokens, final_tokens, priority);

        self.stats.record(level, result.tokens_saved);
        debug!(
            locator,
            %language,
            %level,
            %priority,
            original_tokens,
            final_tokens,
            available_tokens,
            "condensed"
        );

        result
    }

    /// Apply `level` directly, bypassing level selection. Does not touch
    /// the stats.
    pub fn condense_at_level(
        &self,
        content: &str,
        language: Language,
        level: CondensingLevel,
        priority: PriorityLevel,
    ) -> String {
        if level == CondensingLevel::None {
            return content.to_string();
        }
        strategy_for(language).condense(content, level, priority)
    }

    /// Shrink a single function that exceeds `available_tokens`.
    ///
    /// Critical and high priority functions keep their structure
    /// (signature, docstring, control flow, terminal statements) up to the
    /// first ordinary statement, which becomes a placeholder. Lower
    /// priorities collapse to the signature and a placeholder.
    pub fn condense_function_selectively(
        &self,
        function_text: &str,
        priority: PriorityLevel,
        available_tokens: usize,
        language: Language,
    ) -> String {
        if self.estimator.estimate(function_text) <= available_tokens {
            return function_text.to_string();
        }

        let strategy = strategy_for(language);
        if priority.is_important() {
            strategy.preserve_function_structure(function_text)
        } else {
            strategy.minimal_function(function_text)
        }
    }

    pub fn stats(&self) -> &CondenserStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CondenserStats::default();
    }

    /// Consume the condenser, keeping its counters.
    pub fn into_stats(self) -> CondenserStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::heuristic_count;

    fn heuristic_condenser() -> ProgressiveCondenser<fn(&str) -> usize> {
        ProgressiveCondenser::with_estimator(heuristic_count as fn(&str) -> usize)
    }

    const PY: &str = r#"import os


def f(x):
    """Add one."""
    # increment
    return x + 1


class Greeter:
    def __init__(self, name):
        self.name = name

    def greet(self):
        return "hi " + self.name
"#;

    #[test]
    fn test_under_budget_is_passthrough() {
        let mut condenser = ProgressiveCondenser::new();
        let src = "def f(x): return x+1";
        let result = condenser.condense_with_budget(src, "f.py", 10_000, PriorityLevel::Critical, None);
        assert_eq!(result.level, CondensingLevel::None);
        assert_eq!(result.content, src);
        assert_eq!(result.tokens_saved, 0);
        assert_eq!(result.compression_ratio, 1.0);
    }

    #[test]
    fn test_tiny_budget_low_priority_gives_structure_listing() {
        let mut condenser = ProgressiveCondenser::new();
        let result = condenser.condense_with_budget(
            "def f(x): return x+1",
            "f.py",
            1,
            PriorityLevel::Low,
            None,
        );
        assert_eq!(result.level, CondensingLevel::Maximum);
        assert_eq!(result.content, "# Functions:\ndef f(...)");
        assert_eq!(result.priority, PriorityLevel::Low);
    }

    #[test]
    fn test_whitespace_content_unchanged() {
        let mut condenser = heuristic_condenser();
        let result = condenser.condense_with_budget("  \n\t\n", "a.py", 0, PriorityLevel::Low, None);
        assert_eq!(result.content, "  \n\t\n");
        assert_eq!(result.level, CondensingLevel::None);
        assert_eq!(result.tokens_saved, 0);
        assert_eq!(condenser.stats().files_processed, 0);
    }

    #[test]
    fn test_level_table() {
        use CondensingLevel::*;
        use PriorityLevel::*;

        let cases = [
            (High, 14, 10, Light),
            (High, 25, 10, Moderate),
            (High, 40, 10, Heavy),
            (High, 41, 10, Maximum),
            (Medium, 11, 10, Moderate),
            (Medium, 20, 10, Moderate),
            (Medium, 30, 10, Heavy),
            (Low, 31, 10, Maximum),
            (Critical, 13, 10, Light),
            (Critical, 18, 10, Moderate),
            (Critical, 28, 10, Heavy),
            (Critical, 50, 10, Maximum),
        ];
        for (priority, estimated, available, expected) in cases {
            assert_eq!(
                select_condensing_level(estimated, available, priority),
                expected,
                "{priority} at {estimated}/{available}"
            );
        }
    }

    #[test]
    fn test_critical_never_more_aggressive_than_high() {
        // Ratios where the critical tiers alone would out-condense high.
        assert_eq!(select_condensing_level(14, 10, PriorityLevel::Critical), CondensingLevel::Light);
        assert_eq!(select_condensing_level(22, 10, PriorityLevel::Critical), CondensingLevel::Moderate);
        assert_eq!(select_condensing_level(35, 10, PriorityLevel::Critical), CondensingLevel::Heavy);
    }

    #[test]
    fn test_level_monotonic_in_priority_and_ratio() {
        for estimated in (100..=600).step_by(7) {
            let mut previous_by_priority = Vec::new();
            for priority in PriorityLevel::ALL {
                previous_by_priority.push(select_condensing_level(estimated, 100, priority));
            }
            // ALL is least important first: levels must not increase.
            assert!(
                previous_by_priority.windows(2).all(|w| w[0] >= w[1]),
                "estimated {estimated}: {previous_by_priority:?}"
            );
        }
        for priority in PriorityLevel::ALL {
            let levels: Vec<_> = (100..=600)
                .map(|estimated| select_condensing_level(estimated, 100, priority))
                .collect();
            assert!(levels.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_zero_budget_is_most_aggressive() {
        assert_eq!(select_condensing_level(5, 0, PriorityLevel::Critical), CondensingLevel::Maximum);
        assert_eq!(select_condensing_level(0, 0, PriorityLevel::Low), CondensingLevel::None);
    }

    #[test]
    fn test_zero_original_tokens_ratio_defaults() {
        let mut condenser = ProgressiveCondenser::with_estimator(|_: &str| 0usize);
        let result = condenser.condense_with_budget("x = 1", "a.py", 0, PriorityLevel::Low, None);
        assert_eq!(result.original_tokens, 0);
        assert_eq!(result.compression_ratio, 1.0);
    }

    #[test]
    fn test_tokens_saved_can_be_negative() {
        let mut condenser = heuristic_condenser();
        let result = condenser.condense_with_budget("a", "notes.txt", 0, PriorityLevel::Low, Some(1));
        assert_eq!(result.level, CondensingLevel::Maximum);
        assert!(result.content.ends_with("# ... heavily truncated ..."));
        assert!(result.tokens_saved < 0);
        assert_eq!(condenser.stats().tokens_saved, result.tokens_saved);
    }

    #[test]
    fn test_dispatch_by_locator() {
        let condenser = heuristic_condenser();
        let moderate = condenser.condense_at_level(PY, Language::Python, CondensingLevel::Moderate, PriorityLevel::High);
        assert!(moderate.contains("def f(x):"));
        assert!(moderate.contains("\"\"\"Add one.\"\"\""));
        assert!(!moderate.contains("return x + 1"));

        // Same text as an unknown type goes through the generic strategy.
        let generic = condenser.condense_at_level(PY, Language::Other, CondensingLevel::Moderate, PriorityLevel::High);
        assert_eq!(generic, PY);
    }

    #[test]
    fn test_condensing_reduces_tokens() {
        let mut condenser = heuristic_condenser();
        let estimated = heuristic_count(PY);
        let result = condenser.condense_with_budget(PY, "greeter.py", estimated / 4, PriorityLevel::Medium, None);
        assert_eq!(result.level, CondensingLevel::Maximum);
        assert!(result.final_tokens < result.original_tokens);
        assert!(result.compression_ratio < 1.0);
        assert!(result.content.contains("class Greeter: # Methods: __init__, greet"));
    }

    #[test]
    fn test_malformed_python_falls_back() {
        let mut condenser = heuristic_condenser();
        let broken = "def broken(:\n    pass\n# c\n\nx = (";
        let result = condenser.condense_with_budget(broken, "bad.py", 1, PriorityLevel::High, None);
        assert_eq!(result.level, CondensingLevel::Maximum);
        assert!(result.content.ends_with("# ... heavily truncated ..."));
    }

    #[test]
    fn test_idempotent_when_under_budget() {
        let mut condenser = heuristic_condenser();
        let first = condenser.condense_with_budget(PY, "g.py", 10_000, PriorityLevel::Medium, None);
        let second = condenser.condense_with_budget(&first.content, "g.py", 10_000, PriorityLevel::Medium, None);
        assert_eq!(first.content, second.content);
        assert_eq!(second.level, CondensingLevel::None);
    }

    #[test]
    fn test_stats_histogram_merge_and_reset() {
        let mut a = heuristic_condenser();
        a.condense_with_budget(PY, "g.py", 10_000, PriorityLevel::Medium, None);
        a.condense_with_budget(PY, "g.py", 1, PriorityLevel::Medium, None);
        let mut b = heuristic_condenser();
        b.condense_with_budget(PY, "g.py", 1, PriorityLevel::Low, None);

        assert_eq!(a.stats().files_processed, 2);
        assert_eq!(a.stats().levels_used[&CondensingLevel::None], 1);
        assert_eq!(a.stats().levels_used[&CondensingLevel::Maximum], 1);

        let mut total = a.stats().clone();
        total.merge(b.stats());
        assert_eq!(total.files_processed, 3);
        assert_eq!(total.levels_used[&CondensingLevel::Maximum], 2);
        assert_eq!(total.tokens_saved, a.stats().tokens_saved + b.stats().tokens_saved);

        a.reset_stats();
        assert_eq!(a.stats(), &CondenserStats::default());
        assert_eq!(b.into_stats().files_processed, 1);
    }

    #[test]
    fn test_adjust_condensing_level() {
        use CondensingLevel::*;
        assert_eq!(adjust_condensing_level(Light, 90, 100), Moderate);
        assert_eq!(adjust_condensing_level(Moderate, 30, 100), Light);
        assert_eq!(adjust_condensing_level(Moderate, 60, 100), Moderate);
        assert_eq!(adjust_condensing_level(Maximum, 99, 100), Maximum);
        assert_eq!(adjust_condensing_level(None, 10, 100), None);
        // Zero budget counts as unused.
        assert_eq!(adjust_condensing_level(Heavy, 50, 0), Moderate);
    }

    #[test]
    fn test_level_steps_and_parse() {
        assert_eq!(CondensingLevel::Maximum.increase(), CondensingLevel::Maximum);
        assert_eq!(CondensingLevel::None.decrease(), CondensingLevel::None);
        assert_eq!(CondensingLevel::Light.increase(), CondensingLevel::Moderate);
        assert_eq!("HEAVY".parse::<CondensingLevel>().unwrap(), CondensingLevel::Heavy);
        assert!("extreme".parse::<CondensingLevel>().is_err());
    }

    #[test]
    fn test_condense_function_selectively() {
        let condenser = heuristic_condenser();
        let func = "def load(path):\n    \"\"\"Load.\"\"\"\n    data = read(path)\n    return data";

        assert_eq!(
            condenser.condense_function_selectively(func, PriorityLevel::Low, 10_000, Language::Python),
            func
        );
        assert_eq!(
            condenser.condense_function_selectively(func, PriorityLevel::High, 1, Language::Python),
            "def load(path):\n    \"\"\"Load.\"\"\"\n    # ... implementation details ..."
        );
        assert_eq!(
            condenser.condense_function_selectively(func, PriorityLevel::Medium, 1, Language::Python),
            "def load(path):\n    # ... implementation ..."
        );
    }

    #[test]
    fn test_condense_function_selectively_decorated() {
        let condenser = heuristic_condenser();
        let func = "@cached\ndef load(path):\n    \"\"\"Load.\"\"\"\n    data = read(path)\n    return data";

        assert_eq!(
            condenser.condense_function_selectively(func, PriorityLevel::Critical, 1, Language::Python),
            "@cached\ndef load(path):\n    \"\"\"Load.\"\"\"\n    # ... implementation details ..."
        );
        assert_eq!(
            condenser.condense_function_selectively(func, PriorityLevel::Low, 1, Language::Python),
            "def load(path):\n    # ... implementation ..."
        );
    }

    #[test]
    fn test_condense_function_selectively_other_languages() {
        let condenser = heuristic_condenser();
        let body: Vec<String> = (1..=12).map(|i| format!("    step{}();", i)).collect();
        let func = format!("public void run() {{\n{}\n}}", body.join("\n"));

        let kept = condenser.condense_function_selectively(&func, PriorityLevel::Critical, 1, Language::Java);
        let lines: Vec<&str> = kept.split('\n').collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "public void run() {");
        assert_eq!(lines[5], "    // ... implementation ...");
        assert_eq!(lines[7], "}");

        let minimal = condenser.condense_function_selectively(&func, PriorityLevel::Low, 1, Language::Java);
        assert_eq!(minimal, "public void run() {\n    // ... implementation ...");
    }
}
