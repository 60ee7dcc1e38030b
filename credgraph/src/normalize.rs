//! Distribution normalizer
//!
//! Turns the solver's per-interval probability distributions into cred. For
//! each interval the scoring mass is the probability held by nodes under any
//! scoring prefix. Every node's cred is its probability scaled so the scoring
//! nodes together receive the interval's weight:
//!
//! ```text
//! cred[j] = interval_weight * p[j] / scoring_mass
//! ```
//!
//! Non-scoring nodes are scaled by the same factor. When the scoring mass is
//! zero the interval mints no cred at all.

use credgraph_common::compat::CompatInfo;
use credgraph_common::{Error, NodeAddress, Result};
use serde::{Deserialize, Serialize};

pub const CRED_COMPAT: CompatInfo = CompatInfo {
    type_name: "sourcecred/cred",
    version: "0.1.0",
};

/// Half-open time window, milliseconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start_time_ms: i64,
    pub end_time_ms: i64,
}

/// Stationary distribution of one interval, over a fixed node order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalDistribution {
    pub interval: Interval,
    pub interval_weight: f64,
    pub distribution: Vec<f64>,
}

/// Cred per interval, each vector in the same node order as the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredScores {
    pub intervals: Vec<Interval>,
    pub interval_cred_scores: Vec<Vec<f64>>,
}

impl CredScores {
    /// Cred of each node summed over every interval
    pub fn total_cred_per_node(&self) -> Vec<f64> {
        let width = self
            .interval_cred_scores
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let mut totals = vec![0.0; width];
        for scores in &self.interval_cred_scores {
            for (total, cred) in totals.iter_mut().zip(scores) {
                *total += cred;
            }
        }
        totals
    }
}

fn is_scoring(address: &NodeAddress, scoring_prefixes: &[NodeAddress]) -> bool {
    scoring_prefixes.iter().any(|prefix| address.has_prefix(prefix))
}

/// Convert distributions to cred.
///
/// Missing distribution entries count as zero probability; extra entries
/// beyond `node_order` are ignored.
pub fn distribution_to_cred(
    distributions: &[IntervalDistribution],
    node_order: &[NodeAddress],
    scoring_prefixes: &[NodeAddress],
) -> CredScores {
    let scoring: Vec<bool> = node_order
        .iter()
        .map(|address| is_scoring(address, scoring_prefixes))
        .collect();

    let mut intervals = Vec::with_capacity(distributions.len());
    let mut interval_cred_scores = Vec::with_capacity(distributions.len());
    for d in distributions {
        let probability = |j: usize| d.distribution.get(j).copied().unwrap_or(0.0);
        let scoring_mass: f64 = (0..node_order.len())
            .filter(|&j| scoring[j])
            .map(probability)
            .sum();

        let cred = if scoring_mass == 0.0 {
            vec![0.0; node_order.len()]
        } else {
            (0..node_order.len())
                .map(|j| d.interval_weight * probability(j) / scoring_mass)
                .collect()
        };
        intervals.push(d.interval);
        interval_cred_scores.push(cred);
    }

    CredScores {
        intervals,
        interval_cred_scores,
    }
}

/// [`distribution_to_cred`] that rejects distributions whose length differs
/// from `node_order`
pub fn try_distribution_to_cred(
    distributions: &[IntervalDistribution],
    node_order: &[NodeAddress],
    scoring_prefixes: &[NodeAddress],
) -> Result<CredScores> {
    if let Some((i, d)) = distributions
        .iter()
        .enumerate()
        .find(|(_, d)| d.distribution.len() != node_order.len())
    {
        return Err(Error::InvalidInput(format!(
            "distribution {} has {} entries but there are {} nodes",
            i,
            d.distribution.len(),
            node_order.len()
        )));
    }
    Ok(distribution_to_cred(distributions, node_order, scoring_prefixes))
}
