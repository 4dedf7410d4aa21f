//! Manual corrections for papers whose published presenter data is wrong.

use std::collections::HashMap;

use confpapers_common::normalize_ws;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::PaperRecord;

/// Authoritative authors and affiliations for one paper title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperCorrection {
    pub title: String,
    pub authors: Vec<String>,
    pub affiliations: Vec<Vec<String>>,
}

/// Corrections keyed by whitespace-normalized title.
#[derive(Debug, Clone, Default)]
pub struct CorrectionTable {
    entries: HashMap<String, PaperCorrection>,
}

impl CorrectionTable {
    pub fn new(corrections: impl IntoIterator<Item = PaperCorrection>) -> Self {
        let entries = corrections
            .into_iter()
            .map(|c| (normalize_ws(&c.title), c))
            .collect();
        Self { entries }
    }

    /// Corrections known for the SIGGRAPH Asia 2025 program.
    pub fn builtin() -> Self {
        let tsinghua = || vec!["Tsinghua University".to_string()];
        let names = |ns: &[&str]| ns.iter().map(|n| n.to_string()).collect::<Vec<_>>();

        Self::new([
            PaperCorrection {
                title: "Implicit Bonded Discrete Element Method with Manifold Optimization".to_string(),
                authors: names(&["Jia-Ming Lu", "Geng-Chen Cao", "Chenfeng Li", "Shi-Min Hu"]),
                affiliations: vec![
                    tsinghua(),
                    tsinghua(),
                    vec!["Swansea University Bay Campus".to_string()],
                    tsinghua(),
                ],
            },
            PaperCorrection {
                title: "Reliable Iterative Dynamics: A Versatile Method for Fast and Robust Simulation"
                    .to_string(),
                authors: names(&["Jia-Ming Lu", "Shi-Min Hu"]),
                affiliations: vec![tsinghua(), tsinghua()],
            },
        ])
    }

    /// Add or replace entries, keeping the rest.
    pub fn extend(&mut self, corrections: impl IntoIterator<Item = PaperCorrection>) {
        self.entries
            .extend(corrections.into_iter().map(|c| (normalize_ws(&c.title), c)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&PaperCorrection> {
        self.entries.get(&normalize_ws(title))
    }

    /// Overwrite authors and affiliations of every matching record.
    /// Returns the number of records changed.
    pub fn apply(&self, papers: &mut [PaperRecord]) -> usize {
        let mut applied = 0;
        for paper in papers.iter_mut() {
            if let Some(fix) = self.get(&paper.title) {
                debug!(title = %paper.title, "Applying correction");
                paper.authors = fix.authors.clone();
                paper.affiliations = Some(fix.affiliations.clone());
                applied += 1;
            }
        }
        applied
    }
}
