//! Page-range parsing and the normalised [`PageSelection`] set.
//!
//! Expressions are comma-separated tokens, each either a single 1-based page
//! number or an inclusive `start-end` range: `"1-3, 5, 7-10"`. Parsing
//! clamps ranges to the document, drops out-of-range single pages silently,
//! unions everything into a set, and emits a sorted, deduplicated sequence
//! of 0-based indices. An expression that selects nothing is an error, not
//! an empty result.
//!
//! The silent-drop of out-of-range single pages is long-standing tolerant
//! behaviour that downstream callers depend on; only malformed tokens and
//! empty selections fail.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A validated, ordered set of 0-based page indices.
///
/// Invariants: strictly ascending, duplicate-free, non-empty, every index
/// within `[0, total_pages)` of the document it was parsed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelection {
    indices: Vec<usize>,
}

impl PageSelection {
    /// Parse a page-range expression against a document of `total_pages`.
    pub fn parse(expression: &str, total_pages: usize) -> Result<Self, ConvertError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid(expression, "expression is empty"));
        }

        let mut pages: BTreeSet<usize> = BTreeSet::new();

        for token in trimmed.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(invalid(expression, "empty token between commas"));
            }

            if let Some((start_s, end_s)) = token.split_once('-') {
                let start: usize = parse_number(start_s, expression)?;
                let end: usize = parse_number(end_s, expression)?;
                if start > end {
                    return Err(invalid(
                        expression,
                        &format!("range {start}-{end} runs backwards"),
                    ));
                }
                // Ranges are clamped, not rejected: "0-3" floors to page 1,
                // "8-99" caps at the last page.
                let start = start.max(1);
                let end = end.min(total_pages);
                for page in start..=end {
                    // start > total_pages leaves the loop body unreached
                    if page >= 1 && page <= total_pages {
                        pages.insert(page - 1);
                    }
                }
            } else {
                let page: usize = parse_number(token, expression)?;
                // Out-of-range single pages are dropped silently.
                if page >= 1 && page <= total_pages {
                    pages.insert(page - 1);
                }
            }
        }

        if pages.is_empty() {
            return Err(invalid(
                expression,
                &format!("no pages selected (document has {total_pages} pages)"),
            ));
        }

        Ok(Self {
            indices: pages.into_iter().collect(),
        })
    }

    /// Construct from pre-validated 0-based indices (sorted + deduplicated
    /// here). Fails on an empty set, matching [`PageSelection::parse`].
    pub fn from_indices(
        mut indices: Vec<usize>,
        total_pages: usize,
    ) -> Result<Self, ConvertError> {
        indices.sort_unstable();
        indices.dedup();
        indices.retain(|&i| i < total_pages);
        if indices.is_empty() {
            return Err(invalid("<indices>", "no pages selected"));
        }
        Ok(Self { indices })
    }

    /// The selected 0-based indices, ascending.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The selected pages as 1-based numbers, ascending.
    pub fn page_numbers(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().map(|i| i + 1)
    }
}

fn parse_number(s: &str, expression: &str) -> Result<usize, ConvertError> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| invalid(expression, &format!("'{}' is not a page number", s.trim())))
}

fn invalid(expression: &str, detail: &str) -> ConvertError {
    ConvertError::InvalidPageRange {
        expression: expression.to_string(),
        detail: detail.to_string(),
    }
}
