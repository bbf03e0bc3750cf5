/*!
Ratio test: how far each chain may move along its direction.

For positions `x` (`[n, z]`) and directions `d` (`[n, z]`) the chord through column `j` is
`{x_j + λ·d_j : λ ∈ [λ⁻_j, λ⁺_j]}`, where

- `λ⁺_j = min_i (b_i − A_i·x_j) / (A_i·d_j)` over rows with `A_i·d_j > 0`,
- `λ⁻_j = max_i (b_i − A_i·x_j) / (A_i·d_j)` over rows with `A_i·d_j < 0`.

Rows that cannot bind in a direction are replaced by the representable extreme of the active
precision (see [`Precision::finite_range`]) instead of infinities, so they never win the
reduction. A row with `A_i·d_j == 0` is parallel to the direction and bounds neither side.
*/

use burn::prelude::*;

use crate::backend::tensor_to_vec;
use crate::error::{Error, Result};
use crate::placement::Precision;

/// Per-chain chord bounds, both of shape `[1, z]`.
#[derive(Debug, Clone)]
pub struct ChordBounds<B: Backend> {
    pub lambda_pos: Tensor<B, 2>,
    pub lambda_neg: Tensor<B, 2>,
}

/// Runs the ratio test for every chain at once.
///
/// `a_in` is `[mI, n]`, `b_in` is `[mI, 1]`, `x` and `d` are `[n, z]`.
pub fn chord_bounds<B: Backend>(
    a_in: &Tensor<B, 2>,
    b_in: &Tensor<B, 2>,
    x: &Tensor<B, 2>,
    d: &Tensor<B, 2>,
    precision: Precision,
) -> ChordBounds<B> {
    let (lo, hi) = precision.finite_range();
    let [m_in, _] = a_in.dims();
    let z = x.dims()[1];
    if m_in == 0 {
        let device = x.device();
        return ChordBounds {
            lambda_pos: Tensor::full([1, z], hi, &device),
            lambda_neg: Tensor::full([1, z], lo, &device),
        };
    }

    let numerator = b_in
        .clone()
        .repeat_dim(1, z)
        .sub(a_in.clone().matmul(x.clone()));
    let denominator = a_in.clone().matmul(d.clone());
    let ratio = numerator.div(denominator.clone());

    // Masked entries may hold NaN or ±inf from the division; they are overwritten.
    let lambda_pos = ratio
        .clone()
        .mask_fill(denominator.clone().lower_equal_elem(0.0), hi)
        .min_dim(0);
    let lambda_neg = ratio
        .mask_fill(denominator.greater_equal_elem(0.0), lo)
        .max_dim(0);

    ChordBounds {
        lambda_pos,
        lambda_neg,
    }
}

impl<B: Backend> ChordBounds<B> {
    /// Step lengths `θ = (1 − u)·λ⁺ + u·λ⁻` for uniform draws `u` of shape `[1, z]`.
    ///
    /// A convex combination of the two ends of the chord. For `u ~ U[0, 1)` this is uniform
    /// on `[λ⁻, λ⁺]` up to rounding; on an unbounded side the sentinel bound makes it only
    /// an approximation.
    pub fn step(&self, u: Tensor<B, 2>) -> Tensor<B, 2> {
        let one_minus_u = u.clone().mul_scalar(-1.0).add_scalar(1.0);
        one_minus_u
            .mul(self.lambda_pos.clone())
            .add(u.mul(self.lambda_neg.clone()))
    }

    /// Reads both bounds back as `(lambda_neg, lambda_pos)`.
    pub fn to_host(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        Ok((
            tensor_to_vec(self.lambda_neg.clone())?,
            tensor_to_vec(self.lambda_pos.clone())?,
        ))
    }

    /// Fails when clamping could not keep the bounds a valid interval.
    ///
    /// Returns the number of chains whose chord is unbounded on at least one side, i.e. the
    /// sentinel became the binding bound.
    pub fn validate(&self, precision: Precision, iteration: usize) -> Result<usize> {
        let (lo, hi) = precision.finite_range();
        let (neg, pos) = self.to_host()?;
        let mut unbounded = 0;
        for (chain, (&lower, &upper)) in neg.iter().zip(pos.iter()).enumerate() {
            if lower.is_nan() || upper.is_nan() || lower > upper {
                return Err(Error::RangeExhaustion {
                    iteration,
                    chain,
                    lower,
                    upper,
                });
            }
            if lower <= lo || upper >= hi {
                unbounded += 1;
            }
        }
        Ok(unbounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::array2_to_tensor;
    use approx::assert_abs_diff_eq;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use ndarray::{arr2, Array2};
    use proptest::prelude::*;

    type Host = NdArray<f64>;

    fn square() -> (Array2<f64>, Array2<f64>) {
        let a = arr2(&[[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]]);
        let b = arr2(&[[1.0], [1.0], [1.0], [1.0]]);
        (a, b)
    }

    fn bounds_on_host(
        a: &Array2<f64>,
        b: &Array2<f64>,
        x: &Array2<f64>,
        d: &Array2<f64>,
    ) -> ChordBounds<Host> {
        let dev = NdArrayDevice::Cpu;
        chord_bounds(
            &array2_to_tensor::<Host>(a, &dev),
            &array2_to_tensor::<Host>(b, &dev),
            &array2_to_tensor::<Host>(x, &dev),
            &array2_to_tensor::<Host>(d, &dev),
            Precision::Double,
        )
    }

    #[test]
    fn axis_direction_hits_both_walls() {
        let (a, b) = square();
        let x = arr2(&[[0.5], [0.0]]);
        let d = arr2(&[[2.0], [0.0]]);
        let (neg, pos) = bounds_on_host(&a, &b, &x, &d).to_host().unwrap();
        assert_abs_diff_eq!(pos[0], 0.25);
        assert_abs_diff_eq!(neg[0], -0.75);
    }

    #[test]
    fn chains_are_independent_columns() {
        let (a, b) = square();
        let x = arr2(&[[0.0, 0.5], [0.0, -0.5]]);
        let d = arr2(&[[1.0, 0.0], [1.0, -1.0]]);
        let (neg, pos) = bounds_on_host(&a, &b, &x, &d).to_host().unwrap();
        assert_abs_diff_eq!(pos[0], 1.0);
        assert_abs_diff_eq!(neg[0], -1.0);
        assert_abs_diff_eq!(pos[1], 0.5);
        assert_abs_diff_eq!(neg[1], -1.5);
    }

    #[test]
    fn open_side_gets_sentinel() {
        // Half-plane x ≤ 1 only: moving along -x never hits a wall.
        let a = arr2(&[[1.0, 0.0]]);
        let b = arr2(&[[1.0]]);
        let x = arr2(&[[0.0], [0.0]]);
        let d = arr2(&[[1.0], [0.0]]);
        let bounds = bounds_on_host(&a, &b, &x, &d);
        let (neg, pos) = bounds.to_host().unwrap();
        let (lo, _) = Precision::Double.finite_range();
        assert_abs_diff_eq!(pos[0], 1.0);
        assert_eq!(neg[0], lo);
        assert_eq!(bounds.validate(Precision::Double, 1).unwrap(), 1);
    }

    #[test]
    fn tangent_direction_is_unbounded_by_that_row() {
        let (a, b) = square();
        let x = arr2(&[[0.0], [0.5]]);
        let d = arr2(&[[0.0], [1.0]]);
        let (neg, pos) = bounds_on_host(&a, &b, &x, &d).to_host().unwrap();
        assert_abs_diff_eq!(pos[0], 0.5);
        assert_abs_diff_eq!(neg[0], -1.5);
    }

    #[test]
    fn infeasible_interval_is_range_exhaustion() {
        // Point outside both walls: bounds cross.
        let a = arr2(&[[1.0], [-1.0]]);
        let b = arr2(&[[-1.0], [-1.0]]);
        let x = arr2(&[[0.0]]);
        let d = arr2(&[[1.0]]);
        let bounds = bounds_on_host(&a, &b, &x, &d);
        assert!(matches!(
            bounds.validate(Precision::Double, 9),
            Err(Error::RangeExhaustion { iteration: 9, chain: 0, .. })
        ));
    }

    #[test]
    fn step_interpolates_between_bounds() {
        let (a, b) = square();
        let x = arr2(&[[0.5, 0.5, 0.5], [0.0, 0.0, 0.0]]);
        let d = arr2(&[[1.0, 1.0, 1.0], [0.0, 0.0, 0.0]]);
        let bounds = bounds_on_host(&a, &b, &x, &d);
        let u = array2_to_tensor::<Host>(&arr2(&[[0.0, 0.5, 1.0]]), &NdArrayDevice::Cpu);
        let theta = crate::backend::tensor_to_vec(bounds.step(u)).unwrap();
        assert_abs_diff_eq!(theta[0], 0.5);
        assert_abs_diff_eq!(theta[1], -0.5);
        assert_abs_diff_eq!(theta[2], -1.5);
    }

    proptest! {
        #[test]
        fn chord_stays_inside_box(
            x0 in -0.99f64..0.99,
            x1 in -0.99f64..0.99,
            d0 in -5.0f64..5.0,
            d1 in -5.0f64..5.0,
            t in 0.0f64..=1.0,
        ) {
            prop_assume!(d0.abs() + d1.abs() > 1e-6);
            let (a, b) = square();
            let x = arr2(&[[x0], [x1]]);
            let d = arr2(&[[d0], [d1]]);
            let (neg, pos) = bounds_on_host(&a, &b, &x, &d).to_host().unwrap();
            prop_assert!(neg[0] <= 0.0 && 0.0 <= pos[0]);
            let lambda = (1.0 - t) * neg[0] + t * pos[0];
            let y = [x0 + lambda * d0, x1 + lambda * d1];
            prop_assert!(y.iter().all(|v| v.abs() <= 1.0 + 1e-9));
        }
    }
}
