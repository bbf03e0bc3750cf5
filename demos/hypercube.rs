//! Samples the unit cube `[-1, 1]^n` with a batch of hit-and-run chains and prints summary
//! statistics of the pooled samples.
//!
//! `verbosity(1)` shows the progress bars.

use ndarray::{Array1, Array2, Axis};
use polytope_walk::Polytope;
use polytope_walk::Walk;
use std::error::Error;

#[cfg(feature = "csv")]
use polytope_walk::io::csv::save_csv;

fn main() -> Result<(), Box<dyn Error>> {
    const N: usize = 5;
    const CHAINS: usize = 32;
    const BATCHES: usize = 200;

    let eye = Array2::<f64>::eye(N);
    let a_in = ndarray::concatenate![Axis(0), eye, -&eye];
    let mut cube = Polytope::new(a_in, Array1::ones(2 * N))?;
    let x0 = Array2::<f64>::zeros((N, 1));

    let samples = Walk::new(CHAINS, BATCHES)
        .verbosity(1)
        .run(&mut cube, x0.view())?;
    println!("Generated {} samples", BATCHES * CHAINS);

    // (T, n, z) -> (T·z, n)
    let pooled = samples
        .view()
        .permuted_axes([0, 2, 1])
        .as_standard_layout()
        .to_owned()
        .into_shape_with_order((BATCHES * CHAINS, N))?;
    let mean = pooled.mean_axis(Axis(0)).unwrap();
    let var = pooled.var_axis(Axis(0), 1.0);
    println!("Mean:     {mean:.3}");
    // Uniform on [-1, 1] has variance 1/3.
    println!("Variance: {var:.3} (uniform: {:.3})", 1.0 / 3.0);
    println!(
        "Largest constraint violation: {:e}",
        cube.max_sample_violation(&samples)?
    );

    #[cfg(feature = "csv")]
    save_csv(&samples, "/tmp/hypercube_samples.csv")?;

    Ok(())
}
