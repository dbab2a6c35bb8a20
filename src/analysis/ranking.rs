//! Frequency ranking with deterministic tie-breaks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A name and how many times it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    pub name: String,
    pub count: usize,
}

/// Counts names while remembering the order each was first seen.
///
/// Ranking sorts by count descending with a stable sort, so equal counts
/// keep first-encountered order.
#[derive(Debug, Default)]
pub struct Tally {
    positions: HashMap<String, usize>,
    items: Vec<RankedItem>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `name`. Blank names are ignored.
    pub fn add(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        match self.positions.get(name) {
            Some(&pos) => self.items[pos].count += 1,
            None => {
                self.positions.insert(name.to_string(), self.items.len());
                self.items.push(RankedItem {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// All names, most frequent first.
    pub fn ranked(self) -> Vec<RankedItem> {
        let mut items = self.items;
        items.sort_by_key(|item| std::cmp::Reverse(item.count));
        items
    }

    /// The `n` most frequent names.
    pub fn top(self, n: usize) -> Vec<RankedItem> {
        let mut items = self.ranked();
        items.truncate(n);
        items
    }

    /// The single most frequent name, if any were counted.
    pub fn leader(self) -> Option<RankedItem> {
        self.ranked().into_iter().next()
    }
}

impl<'a> FromIterator<&'a str> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for name in iter {
            tally.add(name);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_by_count() {
        let tally: Tally = ["CBC", "LFT", "CBC", "TSH", "LFT", "CBC"].into_iter().collect();
        let ranked = tally.ranked();

        let names: Vec<_> = ranked.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["CBC", "LFT", "TSH"]);
        assert_eq!(ranked[0].count, 3);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let tally: Tally = ["Urine R/E", "HbA1c", "Lipid", "HbA1c", "Urine R/E"]
            .into_iter()
            .collect();
        let ranked = tally.ranked();

        assert_eq!(ranked[0].name, "Urine R/E");
        assert_eq!(ranked[1].name, "HbA1c");
        assert_eq!(ranked[2].name, "Lipid");
    }

    #[test]
    fn test_blank_names_ignored() {
        let tally: Tally = ["", "  ", "CBC"].into_iter().collect();
        assert_eq!(tally.leader().map(|i| i.name), Some("CBC".to_string()));

        let empty: Tally = ["   "].into_iter().collect();
        assert!(empty.ranked().is_empty());
    }

    #[test]
    fn test_top_truncates() {
        let tally: Tally = ["a", "b", "c", "d"].into_iter().collect();
        assert_eq!(tally.top(2).len(), 2);
    }
}
