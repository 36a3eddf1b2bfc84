//! Basin labelling by traversal of the forest's children lists.

use super::DensityForest;
use crate::error::{BasinError, ForestViolation, Result};

/// Summary of a labelling, used for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelStats {
    /// Points that received a label.
    pub assigned: usize,
    /// Points unreachable from every center.
    pub unassigned: usize,
}

impl LabelStats {
    /// Counts assigned and unassigned entries of `labels`.
    #[must_use]
    pub fn of(labels: &[Option<usize>]) -> Self {
        let assigned = labels.iter().filter(|label| label.is_some()).count();
        Self {
            assigned,
            unassigned: labels.len() - assigned,
        }
    }
}

/// Labels every point with the position of the center whose basin holds it.
///
/// Center `centers[l]` receives label `l` and every point reachable from it
/// through children edges inherits that label. Points outside every basin
/// stay `None`. Traversal uses an explicit stack, so deep basins do not grow
/// the call stack.
///
/// # Errors
/// Returns [`BasinError::ForestInvariant`] with
/// [`ForestViolation::LabelCollision`] when a point is reached twice, which
/// happens only if two centers share a basin or the forest contains a cycle.
///
/// # Examples
/// ```
/// use basin_core::{DensityForest, NeighbourTable, propagate_labels};
///
/// let rho = [1.0, 2.0, 1.5, 0.5];
/// let neighbours = NeighbourTable::try_from_rows(
///     vec![vec![0, 1], vec![1, 2], vec![2, 1], vec![3, 2]],
///     vec![vec![0.0, 1.0], vec![0.0, 1.0], vec![0.0, 1.0], vec![0.0, 1.0]],
/// )?;
/// let forest = DensityForest::build(&rho, &neighbours, 2, 1e-8, 10.0)?;
/// assert_eq!(forest.candidates(), &[1]);
///
/// let labels = propagate_labels(forest.candidates(), &forest)?;
/// assert_eq!(labels, vec![Some(0); 4]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn propagate_labels(centers: &[usize], forest: &DensityForest) -> Result<Vec<Option<usize>>> {
    let mut labels = vec![None; forest.len()];
    let mut stack = Vec::new();
    for (label, &center) in centers.iter().enumerate() {
        stack.push(center);
        while let Some(point) = stack.pop() {
            let slot = labels
                .get_mut(point)
                .ok_or(BasinError::ForestInvariant {
                    point,
                    violation: ForestViolation::Unassigned,
                })?;
            if slot.is_some() {
                return Err(BasinError::ForestInvariant {
                    point,
                    violation: ForestViolation::LabelCollision,
                });
            }
            *slot = Some(label);
            stack.extend_from_slice(forest.children(point));
        }
    }
    Ok(labels)
}

/// Unwraps a labelling that must cover every point.
pub(crate) fn require_complete(labels: Vec<Option<usize>>) -> Result<Vec<usize>> {
    labels
        .into_iter()
        .enumerate()
        .map(|(point, label)| {
            label.ok_or(BasinError::ForestInvariant {
                point,
                violation: ForestViolation::Unassigned,
            })
        })
        .collect()
}
