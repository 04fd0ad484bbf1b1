//! Fallback for unknown languages and failed parses. Always succeeds.

use super::{split_lines, Boundary, LanguageStrategy};
use crate::condenser::CondensingLevel;
use crate::priority::PriorityLevel;

pub(crate) struct GenericStrategy;

impl LanguageStrategy for GenericStrategy {
    fn condense(&self, content: &str, level: CondensingLevel, _priority: PriorityLevel) -> String {
        let lines = split_lines(content);

        match level {
            CondensingLevel::None => content.to_string(),
            CondensingLevel::Light => lines
                .into_iter()
                .filter(|line| {
                    let trimmed = line.trim();
                    !trimmed.is_empty() && !trimmed.starts_with('#')
                })
                .collect::<Vec<_>>()
                .join("\n"),
            CondensingLevel::Moderate => {
                if lines.len() <= 30 {
                    return content.to_string();
                }
                let mut kept = lines[..20].to_vec();
                kept.push("# ... content truncated ...");
                kept.extend_from_slice(&lines[lines.len() - 10..]);
                kept.join("\n")
            }
            CondensingLevel::Heavy | CondensingLevel::Maximum => {
                let mut kept: Vec<&str> = lines.into_iter().take(10).collect();
                kept.push("# ... heavily truncated ...");
                kept.join("\n")
            }
        }
    }

    fn boundaries(&self, _content: &str) -> Option<Vec<Boundary>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_light_drops_blank_and_comment_lines() {
        let out = GenericStrategy.condense("a\n\n# note\n  b", CondensingLevel::Light, PriorityLevel::Low);
        assert_eq!(out, "a\n  b");
    }

    #[test]
    fn test_moderate_keeps_head_and_tail() {
        let short = numbered(30);
        assert_eq!(GenericStrategy.condense(&short, CondensingLevel::Moderate, PriorityLevel::Low), short);

        let long = numbered(50);
        let out = GenericStrategy.condense(&long, CondensingLevel::Moderate, PriorityLevel::Low);
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 31);
        assert_eq!(lines[19], "line 20");
        assert_eq!(lines[20], "# ... content truncated ...");
        assert_eq!(lines[21], "line 41");
        assert_eq!(lines[30], "line 50");
    }

    #[test]
    fn test_heavy_keeps_first_ten() {
        let out = GenericStrategy.condense(&numbered(40), CondensingLevel::Heavy, PriorityLevel::Low);
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[9], "line 10");
        assert_eq!(lines[10], "# ... heavily truncated ...");
    }

    #[test]
    fn test_no_boundaries() {
        assert!(GenericStrategy.boundaries("anything").is_none());
    }
}
