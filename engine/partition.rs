//! Flattening of every `(block kind, spectrum pair)` into one job-id sequence.
//!
//! The plan is built once from the tomographic bins by chaining one enumerator per
//! block kind. Counting and resolving both read the same list, so a job id means
//! the same unit of work in every process that builds the plan from the same
//! configuration.

use crate::bins::TomographicBins;
use crate::blocks::BlockKind;
use itertools::iproduct;
use std::fmt;

/// One independently computable block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockUnit {
    /// 1-based position in the plan.
    pub job_id: usize,
    pub kind: BlockKind,
    pub first: usize,
    pub second: usize,
}

impl fmt::Display for BlockUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {}: {} spectra ({}, {})",
            self.job_id, self.kind, self.first, self.second
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    units: Vec<BlockUnit>,
}

impl BlockPlan {
    pub fn new(bins: &TomographicBins) -> Self {
        let units = BlockKind::ALL
            .into_iter()
            .flat_map(|kind| {
                kind_pairs(bins, kind).map(move |(first, second)| (kind, first, second))
            })
            .enumerate()
            .map(|(i, (kind, first, second))| BlockUnit {
                job_id: i + 1,
                kind,
                first,
                second,
            })
            .collect();
        Self { units }
    }

    /// Total number of block units; the largest valid job id.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The unit with 1-based `job_id`, or `None` outside `1..=len()`.
    pub fn resolve(&self, job_id: usize) -> Option<BlockUnit> {
        job_id
            .checked_sub(1)
            .and_then(|i| self.units.get(i))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockUnit> {
        self.units.iter()
    }

    /// Number of units of one kind.
    pub fn count_kind(&self, kind: BlockKind) -> usize {
        self.units.iter().filter(|u| u.kind == kind).count()
    }
}

/// The spectrum pairs a kind covers: `second >= first` for symmetric kinds,
/// the full cross-product otherwise, lexicographic in `(first, second)`.
fn kind_pairs(
    bins: &TomographicBins,
    kind: BlockKind,
) -> Box<dyn Iterator<Item = (usize, usize)>> {
    let (row, col) = kind.families();
    let (rows, cols) = (bins.count(row), bins.count(col));
    if kind.is_symmetric() {
        Box::new(iproduct!(0..rows, 0..cols).filter(|(l, m)| m >= l))
    } else {
        Box::new(iproduct!(0..rows, 0..cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::RedshiftBins;
    use crate::types::ProbeFamily;
    use std::collections::HashSet;

    fn bins() -> TomographicBins {
        TomographicBins::new(
            RedshiftBins::from_edges(vec![0.0, 0.45, 0.65, 0.9, 1.25, 3.5]),
            RedshiftBins::from_edges(vec![0.2, 0.4, 0.6, 0.8, 1.0, 1.2]),
            RedshiftBins::from_edges(vec![0.2, 0.4, 0.6, 0.8, 1.0]),
            4,
        )
    }

    #[test]
    fn job_one_is_the_first_shear_auto_block() {
        let plan = BlockPlan::new(&bins());
        let unit = plan.resolve(1).unwrap();
        assert_eq!(unit.kind, BlockKind::ShearShear);
        assert_eq!((unit.first, unit.second), (0, 0));
        assert_eq!(plan.resolve(2).unwrap().second, 1);
        assert_eq!(plan.resolve(0), None);
        assert_eq!(plan.resolve(plan.len() + 1), None);
    }

    #[test]
    fn job_ids_resolve_to_distinct_units() {
        let plan = BlockPlan::new(&bins());
        let mut seen = HashSet::new();
        for k in 1..=plan.len() {
            let unit = plan.resolve(k).unwrap();
            assert_eq!(unit.job_id, k);
            assert!(seen.insert((unit.kind, unit.first, unit.second)));
        }
        assert_eq!(seen.len(), plan.len());
    }

    #[test]
    fn counts_per_kind() {
        let b = bins();
        let plan = BlockPlan::new(&b);
        let shear = b.count(ProbeFamily::Shear);
        let ggl = b.count(ProbeFamily::Ggl);
        let clustering = b.count(ProbeFamily::Clustering);
        let zc = b.count(ProbeFamily::ClusterCounts);
        let cl = b.count(ProbeFamily::ClusterLensing);
        assert_eq!((shear, ggl, clustering, zc, cl), (15, 11, 5, 4, 10));

        let tri = |n: usize| n * (n + 1) / 2;
        assert_eq!(plan.count_kind(BlockKind::ShearShear), tri(shear));
        assert_eq!(plan.count_kind(BlockKind::GglGgl), tri(ggl));
        assert_eq!(plan.count_kind(BlockKind::ClusteringClustering), tri(clustering));
        assert_eq!(plan.count_kind(BlockKind::CountsCounts), zc * zc);
        assert_eq!(plan.count_kind(BlockKind::LensingLensing), cl * cl);
        assert_eq!(plan.count_kind(BlockKind::ShearLensing), shear * cl);
        assert_eq!(plan.count_kind(BlockKind::ClusteringCounts), clustering * zc);

        let total: usize = BlockKind::ALL.iter().map(|&k| plan.count_kind(k)).sum();
        assert_eq!(total, plan.len());
    }

    #[test]
    fn kinds_appear_in_enumeration_order() {
        let plan = BlockPlan::new(&bins());
        let order: Vec<BlockKind> = plan
            .iter()
            .map(|u| u.kind)
            .fold(Vec::new(), |mut acc, k| {
                if acc.last() != Some(&k) {
                    acc.push(k);
                }
                acc
            });
        assert_eq!(order, BlockKind::ALL.to_vec());
    }
}
