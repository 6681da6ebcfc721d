// File: src/core/report.rs
use crate::core::vocabulary::ReferenceIndex;
use std::collections::HashSet;
use std::fmt;

/// How much of a decode reads as known words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub total: usize,
    pub matched: usize,
    pub unique_total: usize,
    pub unique_matched: usize,
}

impl CoverageReport {
    /// Checks each rendered word against every vocabulary in `index`.
    /// Surrounding punctuation is ignored; words left empty are not counted.
    pub fn measure<S: AsRef<str>>(rendered: &[S], index: &ReferenceIndex) -> Self {
        let mut report = Self::default();
        let mut seen = HashSet::new();
        for word in rendered {
            let word = word
                .as_ref()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let known = index.contains(&word);
            report.total += 1;
            if known {
                report.matched += 1;
            }
            if seen.insert(word) {
                report.unique_total += 1;
                if known {
                    report.unique_matched += 1;
                }
            }
        }
        report
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} words known ({:.2}%), {}/{} unique",
            self.matched,
            self.total,
            self.percent(),
            self.unique_matched,
            self.unique_total
        )
    }
}
