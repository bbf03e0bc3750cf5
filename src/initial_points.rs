/*!
Matching a set of interior points to the number of parallel chains.

Given an `n×k` matrix of starting points and a chain count `z`:

- `z == k`: the points are used as they are;
- `z < k`: the first `z` columns are used;
- `z > k`: the whole block is repeated `z / k` times and the first `z % k` columns are appended.

```rust
use ndarray::arr2;
use polytope_walk::initial_points::adapt_initial_points;

let x0 = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
let tiled = adapt_initial_points(x0.view(), 2, 5).unwrap();
assert_eq!(tiled, arr2(&[[1.0, 2.0, 1.0, 2.0, 1.0], [3.0, 4.0, 3.0, 4.0, 3.0]]));
```
*/

use ndarray::{s, Array2, ArrayView2};

use crate::error::{ConfigurationError, Error, Result};

/// Builds the `n×z` starting matrix for `z` chains from the columns of `points`.
pub fn adapt_initial_points(points: ArrayView2<f64>, n: usize, z: usize) -> Result<Array2<f64>> {
    let (rows, k) = points.dim();
    if rows != n {
        return Err(Error::InvalidShape {
            what: "initial points",
            expected: n,
            found: rows,
        });
    }
    if z == 0 {
        return Err(ConfigurationError::NoChains.into());
    }
    if k == 0 {
        return Err(Error::InvalidShape {
            what: "initial points (columns)",
            expected: 1,
            found: 0,
        });
    }

    if z <= k {
        return Ok(points.slice(s![.., ..z]).to_owned());
    }

    // Column `j` of the tiled block is column `j % k` of the input.
    Ok(Array2::from_shape_fn((n, z), |(i, j)| points[[i, j % k]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array};

    fn points_3x4() -> Array2<f64> {
        Array::from_shape_fn((3, 4), |(i, j)| (10 * i + j) as f64)
    }

    #[test]
    fn same_count_passes_through() {
        let x0 = points_3x4();
        assert_eq!(adapt_initial_points(x0.view(), 3, 4).unwrap(), x0);
    }

    #[test]
    fn fewer_chains_take_leading_columns() {
        let x0 = points_3x4();
        let out = adapt_initial_points(x0.view(), 3, 2).unwrap();
        assert_eq!(out, arr2(&[[0.0, 1.0], [10.0, 11.0], [20.0, 21.0]]));
    }

    #[test]
    fn more_chains_tile_then_pad() {
        let x0 = points_3x4();
        let out = adapt_initial_points(x0.view(), 3, 6).unwrap();
        assert_eq!(out.dim(), (3, 6));
        assert_eq!(out.slice(s![.., ..4]), x0);
        assert_eq!(out.slice(s![.., 4..]), x0.slice(s![.., ..2]));
    }

    #[test]
    fn exact_multiple_repeats_whole_block() {
        let x0 = points_3x4();
        let out = adapt_initial_points(x0.view(), 3, 8).unwrap();
        assert_eq!(out.slice(s![.., 4..]), x0);
        assert_eq!(out.slice(s![.., ..4]), x0);
    }

    #[test]
    fn wrong_dimension_is_invalid_shape() {
        let x0 = points_3x4();
        let err = adapt_initial_points(x0.view(), 2, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidShape {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn zero_chains_are_rejected() {
        let x0 = points_3x4();
        assert!(matches!(
            adapt_initial_points(x0.view(), 3, 0),
            Err(Error::Configuration(ConfigurationError::NoChains))
        ));
    }
}
