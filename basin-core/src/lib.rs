//! Basin core library.
//!
//! Density-peak clustering: every point climbs its density gradient to a
//! peak, peaks that are not stable under a noise threshold are merged into
//! denser neighbours, and a sweep over thresholds yields a cluster hierarchy.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod clustering;
mod datasource;
mod density;
mod distance;
mod error;
mod forest;
mod hierarchy;
mod model;
mod neighbours;
mod result;
#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::{
    builder::{ClusteringBuilder, NeighbourhoodSize},
    clustering::DensityClustering,
    datasource::{DataSource, Subset},
    density::{
        Bandwidth, BandwidthSearch, DensityOracle, GaussianKde, KdeModel, holdout_split,
        select_bandwidth,
    },
    distance::euclidean_distance,
    error::{
        BasinError, BasinErrorCode, ConfigError, ConfigErrorCode, DataSourceError,
        DataSourceErrorCode, DensityError, DensityErrorCode, ForestViolation, NeighbourError,
        NeighbourErrorCode, Result,
    },
    forest::{
        DensityForest, LabelStats, MINIMAL_NOISE, MergeOutcome, MergeSettings, PassOutcome,
        StabilityMerger, propagate_labels,
    },
    hierarchy::{CoarseGrain, Hierarchy, HierarchyLevel},
    model::{ClusterInfo, FittedModel},
    neighbours::{BruteForceNeighbours, NeighbourOracle, NeighbourTable},
    result::{ClusterId, ClusteringResult, NonContiguousClusterIds},
};
