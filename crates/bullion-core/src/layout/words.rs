//! Adaptive word-boundary reconstruction.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::trace;

use super::{PositionedFragment, ReconstructedLine};
use crate::error::ConfigError;
use crate::models::config::LayoutConfig;

/// Groups fragments into lines and splits lines into words.
///
/// The word-boundary threshold is computed per line from the median gap
/// between neighbouring fragments, so tightly kerned glyph runs and loosely
/// spaced word runs are both handled without a global constant.
#[derive(Debug, Clone)]
pub struct WordReconstructor {
    line_band: f32,
    gap_multiplier: f32,
    min_gap: f32,
}

impl WordReconstructor {
    /// Create a reconstructor with default tuning (band 2.0, 1.5x median, floor 2.0).
    pub fn new() -> Self {
        Self {
            line_band: 2.0,
            gap_multiplier: 1.5,
            min_gap: 2.0,
        }
    }

    /// Build from layout configuration, rejecting non-positive values.
    pub fn from_config(config: &LayoutConfig) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("line_band", config.line_band),
            ("gap_multiplier", config.gap_multiplier),
            ("min_gap", config.min_gap),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Layout { name, value });
            }
        }

        Ok(Self {
            line_band: config.line_band,
            gap_multiplier: config.gap_multiplier,
            min_gap: config.min_gap,
        })
    }

    /// Rebuild the lines of one page.
    pub fn reconstruct(&self, fragments: &[PositionedFragment]) -> Vec<ReconstructedLine> {
        let mut rows: BTreeMap<i64, Vec<&PositionedFragment>> = BTreeMap::new();
        for fragment in fragments {
            rows.entry(self.band_key(fragment.top)).or_default().push(fragment);
        }

        rows.into_iter()
            .map(|(key, mut row)| {
                // Stable sort: ties keep input order.
                row.sort_by(|a, b| a.x0.partial_cmp(&b.x0).unwrap_or(Ordering::Equal));
                ReconstructedLine {
                    top: key as f32 * self.line_band,
                    tokens: self.split_row(&row),
                }
            })
            .collect()
    }

    /// Rebuild a page as text, one line per visual row.
    pub fn page_text(&self, fragments: &[PositionedFragment]) -> String {
        self.reconstruct(fragments)
            .iter()
            .map(ReconstructedLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    // Half-band ties go to the even band.
    fn band_key(&self, top: f32) -> i64 {
        (top / self.line_band).round_ties_even() as i64
    }

    fn split_row(&self, row: &[&PositionedFragment]) -> Vec<String> {
        let Some(first) = row.first() else {
            return Vec::new();
        };

        // Pass 1: gaps and threshold.
        let gaps: Vec<f32> = row.windows(2).map(|w| w[1].x0 - w[0].x1).collect();
        let threshold = self.threshold(&gaps);
        trace!("row of {} fragments, threshold {:.2}", row.len(), threshold);

        // Pass 2: split.
        let mut tokens = Vec::new();
        let mut current = first.text.clone();
        for (fragment, gap) in row[1..].iter().zip(&gaps) {
            if *gap > threshold {
                tokens.push(std::mem::take(&mut current));
            }
            current.push_str(&fragment.text);
        }
        tokens.push(current);

        tokens
    }

    fn threshold(&self, gaps: &[f32]) -> f32 {
        if gaps.is_empty() {
            return self.min_gap;
        }

        let mut sorted = gaps.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let median = sorted[sorted.len() / 2];

        (median * self.gap_multiplier).max(self.min_gap)
    }
}

impl Default for WordReconstructor {
    fn default() -> Self {
        Self::new()
    }
}
