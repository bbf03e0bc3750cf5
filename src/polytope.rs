/*!
# Constraint systems

A [`Polytope`] is the region `{x : A_in·x ≤ b_in}` in `n` dimensions, optionally intersected
with the affine subspace `{x : A_eq·x = b_eq}`. Shapes are validated when the polytope is built
and whenever the equality system is replaced.

For polytopes with equality constraints the polytope caches a projection matrix `P` (`n×k`)
whose orthonormal columns span the null space of `A_eq`. Moving along `P·g` for any `g` leaves
`A_eq·x` unchanged.

The polytope also owns a device copy of its matrices, built for its current
[`Placement`]. Changing the precision or compute target rebuilds that copy in place.

# Examples

```rust
use ndarray::{arr1, arr2};
use polytope_walk::polytope::Polytope;

// The square [-1, 1]².
let a_in = arr2(&[[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]]);
let b_in = arr1(&[1.0, 1.0, 1.0, 1.0]);
let square = Polytope::new(a_in, b_in).unwrap();
assert_eq!(square.n(), 2);
assert_eq!(square.m_in(), 4);
assert!(square.is_full_dimensional());
```
*/

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;

use crate::backend::Storage;
use crate::error::{Error, Result};
use crate::placement::{ComputeTarget, Placement, Precision};

/// Equality constraints `A_eq·x = b_eq` together with their cached null-space basis.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualitySystem {
    a_eq: Array2<f64>,
    b_eq: Array1<f64>,
    projection: Array2<f64>,
    rank: usize,
}

impl EqualitySystem {
    fn new(a_eq: Array2<f64>, b_eq: Array1<f64>) -> Result<Self> {
        if a_eq.nrows() != b_eq.len() {
            return Err(Error::DimensionMismatch {
                what: "b_eq length vs. A_eq rows",
                expected: a_eq.nrows(),
                found: b_eq.len(),
            });
        }
        let (projection, rank) = null_space(&a_eq)?;
        Ok(Self {
            a_eq,
            b_eq,
            projection,
            rank,
        })
    }

    pub fn a_eq(&self) -> &Array2<f64> {
        &self.a_eq
    }

    pub fn b_eq(&self) -> &Array1<f64> {
        &self.b_eq
    }

    /// Number of equality rows, `mE`.
    pub fn m_eq(&self) -> usize {
        self.a_eq.nrows()
    }

    /// `n×k` matrix with orthonormal columns spanning the null space of `A_eq`.
    pub fn projection(&self) -> &Array2<f64> {
        &self.projection
    }

    /// Numerical rank of `A_eq`.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// True when some equality rows are linear combinations of the others.
    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.m_eq()
    }
}

/// Orthonormal basis of the null space of `a`, plus the numerical rank of `a`.
///
/// `a` is padded with zero rows to at least `n×n` so the SVD returns a full set of right
/// singular vectors. Vectors whose singular value is at most `max(m, n)·ε·σ_max` are kept.
fn null_space(a: &Array2<f64>) -> Result<(Array2<f64>, usize)> {
    let (m, n) = a.dim();
    if n == 0 {
        return Err(Error::DegenerateEquality { rank: 0, n });
    }
    let rows = m.max(n);
    let padded = DMatrix::from_fn(rows, n, |i, j| if i < m { a[[i, j]] } else { 0.0 });
    let svd = padded.svd(false, true);
    let v_t = svd.v_t.ok_or(Error::DegenerateEquality { rank: m, n })?;

    let sigma_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let tol = rows as f64 * f64::EPSILON * sigma_max;
    let null_rows: Vec<usize> = svd
        .singular_values
        .iter()
        .enumerate()
        .filter(|(_, s)| **s <= tol)
        .map(|(i, _)| i)
        .collect();

    let rank = n - null_rows.len();
    if null_rows.is_empty() {
        return Err(Error::DegenerateEquality { rank, n });
    }

    let basis = Array2::from_shape_fn((n, null_rows.len()), |(i, c)| v_t[(null_rows[c], i)]);
    Ok((basis, rank))
}

/// A convex polytope and its device-side storage.
#[derive(Debug, Clone)]
pub struct Polytope {
    a_in: Array2<f64>,
    b_in: Array1<f64>,
    equality: Option<EqualitySystem>,
    storage: Storage,
}

impl Polytope {
    /// Full-dimensional polytope `A_in·x ≤ b_in`, stored in double precision on the host.
    pub fn new(a_in: Array2<f64>, b_in: Array1<f64>) -> Result<Self> {
        Self::build(a_in, b_in, None, Placement::default())
    }

    /**
    Polytope with equality constraints, `A_in·x ≤ b_in` and `A_eq·x = b_eq`.

    # Examples

    ```rust
    use ndarray::{arr1, arr2};
    use polytope_walk::polytope::Polytope;

    // The simplex x + y + z = 1, x, y, z ≥ 0.
    let a_in = arr2(&[[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]]);
    let b_in = arr1(&[0.0, 0.0, 0.0]);
    let a_eq = arr2(&[[1.0, 1.0, 1.0]]);
    let b_eq = arr1(&[1.0]);
    let simplex = Polytope::with_equality(a_in, b_in, a_eq, b_eq).unwrap();
    assert_eq!(simplex.m_eq(), Some(1));
    assert_eq!(simplex.equality().unwrap().projection().dim(), (3, 2));
    ```
    */
    pub fn with_equality(
        a_in: Array2<f64>,
        b_in: Array1<f64>,
        a_eq: Array2<f64>,
        b_eq: Array1<f64>,
    ) -> Result<Self> {
        check_width(&a_in, &a_eq)?;
        let equality = EqualitySystem::new(a_eq, b_eq)?;
        Self::build(a_in, b_in, Some(equality), Placement::default())
    }

    fn build(
        a_in: Array2<f64>,
        b_in: Array1<f64>,
        equality: Option<EqualitySystem>,
        placement: Placement,
    ) -> Result<Self> {
        if a_in.nrows() != b_in.len() {
            return Err(Error::DimensionMismatch {
                what: "b_in length vs. A_in rows",
                expected: a_in.nrows(),
                found: b_in.len(),
            });
        }
        if a_in.ncols() == 0 {
            return Err(Error::DimensionMismatch {
                what: "ambient dimension",
                expected: 1,
                found: 0,
            });
        }
        let storage = Storage::build(
            placement,
            &a_in,
            &b_in,
            equality.as_ref().map(|e| &e.projection),
        )?;
        Ok(Self {
            a_in,
            b_in,
            equality,
            storage,
        })
    }

    /// Sets precision and compute target in one go.
    pub fn with_placement(mut self, placement: Placement) -> Result<Self> {
        self.set_placement(placement)?;
        Ok(self)
    }

    /// Ambient dimension `n`.
    pub fn n(&self) -> usize {
        self.a_in.ncols()
    }

    /// Number of inequality rows, `mI`.
    pub fn m_in(&self) -> usize {
        self.a_in.nrows()
    }

    /// Number of equality rows, `mE`, if the polytope has an equality system.
    pub fn m_eq(&self) -> Option<usize> {
        self.equality.as_ref().map(EqualitySystem::m_eq)
    }

    pub fn a_in(&self) -> &Array2<f64> {
        &self.a_in
    }

    pub fn b_in(&self) -> &Array1<f64> {
        &self.b_in
    }

    pub fn equality(&self) -> Option<&EqualitySystem> {
        self.equality.as_ref()
    }

    pub fn is_full_dimensional(&self) -> bool {
        self.equality.is_none()
    }

    pub fn placement(&self) -> Placement {
        self.storage.placement()
    }

    pub fn precision(&self) -> Precision {
        self.placement().precision
    }

    pub fn target(&self) -> ComputeTarget {
        self.placement().target
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Rebuilds the device copy for `placement`. On error the polytope is left unchanged.
    pub fn set_placement(&mut self, placement: Placement) -> Result<()> {
        if placement == self.placement() {
            return Ok(());
        }
        self.storage = Storage::build(
            placement,
            &self.a_in,
            &self.b_in,
            self.equality.as_ref().map(|e| &e.projection),
        )?;
        Ok(())
    }

    /// Moves the device copy to `target`, keeping the current precision.
    pub fn move_to(&mut self, target: ComputeTarget) -> Result<()> {
        self.set_placement(Placement::new(self.precision(), target))
    }

    /// Like [`Polytope::move_to`], with the target given by name (`"cpu"`, `"cuda"`, ...).
    pub fn send_to(&mut self, target: &str) -> Result<()> {
        let target: ComputeTarget = target.parse()?;
        self.move_to(target)
    }

    /// Recasts the device copy to `precision`, keeping the current target.
    pub fn set_precision(&mut self, precision: Precision) -> Result<()> {
        self.set_placement(Placement::new(precision, self.target()))
    }

    /// Replaces the equality system and recomputes the cached projection.
    pub fn set_equality(&mut self, a_eq: Array2<f64>, b_eq: Array1<f64>) -> Result<()> {
        check_width(&self.a_in, &a_eq)?;
        let equality = EqualitySystem::new(a_eq, b_eq)?;
        self.storage = Storage::build(
            self.placement(),
            &self.a_in,
            &self.b_in,
            Some(&equality.projection),
        )?;
        self.equality = Some(equality);
        Ok(())
    }

    /// Largest constraint violation over the columns of an `n×k` point matrix.
    ///
    /// Inequalities contribute `max(A_in·x − b_in, 0)`, equalities `|A_eq·x − b_eq|`.
    pub fn max_violation(&self, points: ArrayView2<f64>) -> Result<f64> {
        if points.nrows() != self.n() {
            return Err(Error::InvalidShape {
                what: "point matrix",
                expected: self.n(),
                found: points.nrows(),
            });
        }
        Ok(self.constraints().violation(points))
    }

    /// Largest constraint violation over every point of a `(T, n, z)` sample array.
    pub fn max_sample_violation(&self, samples: &Array3<f64>) -> Result<f64> {
        let (batches, n, _) = samples.dim();
        if n != self.n() {
            return Err(Error::InvalidShape {
                what: "sample array",
                expected: self.n(),
                found: n,
            });
        }
        let constraints = self.constraints();
        Ok((0..batches)
            .into_par_iter()
            .map(|t| constraints.violation(samples.index_axis(Axis(0), t)))
            .reduce(|| 0.0, f64::max))
    }

    fn constraints(&self) -> Constraints<'_> {
        Constraints {
            a_in: &self.a_in,
            b_in: &self.b_in,
            equality: self.equality.as_ref(),
        }
    }
}

/// Host-only view of the constraint matrices, shareable across threads.
struct Constraints<'a> {
    a_in: &'a Array2<f64>,
    b_in: &'a Array1<f64>,
    equality: Option<&'a EqualitySystem>,
}

impl Constraints<'_> {
    fn violation(&self, points: ArrayView2<f64>) -> f64 {
        let slack = self.a_in.dot(&points) - &self.b_in.view().insert_axis(Axis(1));
        let mut worst = slack.iter().copied().fold(0.0, f64::max);
        if let Some(eq) = self.equality {
            let residual = eq.a_eq.dot(&points) - &eq.b_eq.view().insert_axis(Axis(1));
            worst = residual.iter().map(|r| r.abs()).fold(worst, f64::max);
        }
        worst
    }
}

fn check_width(a_in: &Array2<f64>, a_eq: &Array2<f64>) -> Result<()> {
    if a_in.ncols() != a_eq.ncols() {
        return Err(Error::DimensionMismatch {
            what: "A_eq columns vs. A_in columns",
            expected: a_in.ncols(),
            found: a_eq.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array};

    fn unit_square() -> Polytope {
        let a_in = arr2(&[[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]]);
        Polytope::new(a_in, arr1(&[1.0, 1.0, 1.0, 1.0])).unwrap()
    }

    fn cube3() -> (Array2<f64>, Array1<f64>) {
        let mut a = Array2::zeros((6, 3));
        for i in 0..3 {
            a[[2 * i, i]] = 1.0;
            a[[2 * i + 1, i]] = -1.0;
        }
        (a, Array1::ones(6))
    }

    #[test]
    fn rejects_mismatched_b_in() {
        let a_in = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let err = Polytope::new(a_in, arr1(&[1.0])).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn rejects_equality_of_wrong_width() {
        let (a_in, b_in) = cube3();
        let err = Polytope::with_equality(a_in, b_in, arr2(&[[1.0, 1.0]]), arr1(&[0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn rejects_equality_rhs_of_wrong_length() {
        let (a_in, b_in) = cube3();
        let err = Polytope::with_equality(a_in, b_in, arr2(&[[1.0, 1.0, 1.0]]), arr1(&[0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn projection_spans_null_space() {
        let (a_in, b_in) = cube3();
        let a_eq = arr2(&[[1.0, 2.0, -1.0]]);
        let poly = Polytope::with_equality(a_in, b_in, a_eq.clone(), arr1(&[0.0])).unwrap();
        let eq = poly.equality().unwrap();
        let p = eq.projection();
        assert_eq!(p.dim(), (3, 2));
        assert_eq!(eq.rank(), 1);
        assert!(!eq.is_rank_deficient());

        let ap = a_eq.dot(p);
        for v in ap.iter() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
        let gram = p.t().dot(p);
        assert_abs_diff_eq!(gram, Array2::<f64>::eye(2), epsilon = 1e-12);
    }

    #[test]
    fn rank_deficient_equalities_widen_null_space() {
        let (a_in, b_in) = cube3();
        let a_eq = arr2(&[[1.0, 1.0, 0.0], [2.0, 2.0, 0.0]]);
        let poly = Polytope::with_equality(a_in, b_in, a_eq, arr1(&[0.0, 0.0])).unwrap();
        let eq = poly.equality().unwrap();
        assert_eq!(eq.rank(), 1);
        assert!(eq.is_rank_deficient());
        assert_eq!(eq.projection().ncols(), 2);
    }

    #[test]
    fn full_rank_square_equality_is_degenerate() {
        let (a_in, b_in) = cube3();
        let err = Polytope::with_equality(a_in, b_in, Array::eye(3), arr1(&[0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateEquality { rank: 3, n: 3 }));
    }

    #[test]
    fn set_equality_recomputes_projection() {
        let (a_in, b_in) = cube3();
        let mut poly =
            Polytope::with_equality(a_in, b_in, arr2(&[[1.0, 0.0, 0.0]]), arr1(&[0.0])).unwrap();
        poly.set_equality(arr2(&[[0.0, 0.0, 1.0]]), arr1(&[0.5]))
            .unwrap();
        let p = poly.equality().unwrap().projection();
        for i in 0..p.ncols() {
            assert_abs_diff_eq!(p[[2, i]], 0.0, epsilon = 1e-12);
        }
        assert_eq!(poly.equality().unwrap().b_eq(), &arr1(&[0.5]));
    }

    #[test]
    fn placement_changes_keep_values() {
        let mut poly = unit_square();
        assert_eq!(poly.placement(), Placement::default());
        poly.set_precision(Precision::Single).unwrap();
        assert_eq!(poly.precision(), Precision::Single);
        assert_eq!(poly.target(), ComputeTarget::Host);
        assert_eq!(poly.b_in(), &arr1(&[1.0, 1.0, 1.0, 1.0]));
        poly.send_to("cpu").unwrap();
        assert_eq!(poly.target(), ComputeTarget::Host);
    }

    #[test]
    fn failed_placement_change_leaves_polytope_untouched() {
        let mut poly = unit_square();
        assert!(poly.send_to("tpu").is_err());
        assert!(poly.set_precision(Precision::Half).is_err());
        assert_eq!(poly.placement(), Placement::default());
    }

    #[test]
    fn violation_measures_worst_constraint() {
        let poly = unit_square();
        let inside = arr2(&[[0.5, -0.9], [0.0, 0.3]]);
        assert_eq!(poly.max_violation(inside.view()).unwrap(), 0.0);
        let outside = arr2(&[[0.5, 1.25], [0.0, 0.0]]);
        assert_abs_diff_eq!(poly.max_violation(outside.view()).unwrap(), 0.25);
        assert!(poly.max_violation(Array2::zeros((3, 1)).view()).is_err());
    }

    #[test]
    fn sample_violation_reduces_over_batches() {
        let poly = unit_square();
        let mut samples = Array3::zeros((4, 2, 3));
        samples[[2, 1, 0]] = -1.5;
        assert_abs_diff_eq!(poly.max_sample_violation(&samples).unwrap(), 0.5);
    }
}
