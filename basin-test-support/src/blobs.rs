//! Seeded isotropic Gaussian blobs.
//!
//! Fixtures are plain coordinate rows so any crate can wrap them in its own
//! data source without a dependency cycle on the clustering core.

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Points drawn from a mixture of isotropic Gaussians, with the component
/// each point was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct Blobs {
    /// Coordinates, one row per point.
    pub points: Vec<Vec<f32>>,
    /// Index of the generating blob for every point.
    pub truth: Vec<usize>,
}

impl Blobs {
    /// Returns the number of generated points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns whether no point was generated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Description of one blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobSpec {
    /// Blob mean.
    pub center: Vec<f32>,
    /// Per-coordinate standard deviation.
    pub sigma: f32,
    /// Number of points to draw.
    pub count: usize,
}

/// Draws every blob in `specs` in order with a generator seeded by `seed`.
///
/// # Examples
/// ```
/// use basin_test_support::blobs::{BlobSpec, gaussian_blobs};
///
/// let specs = [
///     BlobSpec { center: vec![0.0, 0.0], sigma: 1.0, count: 4 },
///     BlobSpec { center: vec![9.0, 9.0], sigma: 1.0, count: 2 },
/// ];
/// let blobs = gaussian_blobs(&specs, 7);
/// assert_eq!(blobs.len(), 6);
/// assert_eq!(blobs.truth, [0, 0, 0, 0, 1, 1]);
/// assert_eq!(blobs, gaussian_blobs(&specs, 7));
/// ```
#[must_use]
pub fn gaussian_blobs(specs: &[BlobSpec], seed: u64) -> Blobs {
    let mut rng = SmallRng::seed_from_u64(seed);
    let total = specs.iter().map(|spec| spec.count).sum();
    let mut points = Vec::with_capacity(total);
    let mut truth = Vec::with_capacity(total);
    for (blob, spec) in specs.iter().enumerate() {
        for _ in 0..spec.count {
            points.push(
                spec.center
                    .iter()
                    .map(|&mean| mean + spec.sigma * standard_normal(&mut rng))
                    .collect(),
            );
            truth.push(blob);
        }
    }
    Blobs { points, truth }
}

/// Draws `count` points around each of `centers` in the plane, all with
/// standard deviation `sigma`.
#[must_use]
pub fn planar_blobs(centers: &[[f32; 2]], sigma: f32, count: usize, seed: u64) -> Blobs {
    let specs: Vec<BlobSpec> = centers
        .iter()
        .map(|center| BlobSpec {
            center: center.to_vec(),
            sigma,
            count,
        })
        .collect();
    gaussian_blobs(&specs, seed)
}

// Box-Muller transform; the open interval keeps `ln` finite.
fn standard_normal<R: Rng>(rng: &mut R) -> f32 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.r#gen();
    let radius = (-2.0 * u1.ln()).sqrt();
    (radius * (std::f64::consts::TAU * u2).cos()) as f32
}
