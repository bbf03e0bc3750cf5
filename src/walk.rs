/*!
# Hit-and-run walk

Runs `z` hit-and-run chains in lockstep inside a [`Polytope`] and collects `T` batches of
positions, returned as an array of shape `(T, n, z)`.

Each inner iteration:

1. draws a direction per chain (projected onto the equality null space if there is one);
2. runs the ratio test for the feasible chord `[λ⁻, λ⁺]` along it;
3. draws `u ~ U[0, 1)` per chain and moves by `θ = (1 − u)·λ⁺ + u·λ⁻`.

`warm` windows of `thinning` steps are discarded first; afterwards the positions are stored
every `thinning` steps. The thinning factor defaults to `n³` and the warm-up to `thinning`
windows.

# Example

```rust
use ndarray::{arr1, arr2};
use polytope_walk::polytope::Polytope;
use polytope_walk::walk::Walk;

let a_in = arr2(&[[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]]);
let b_in = arr1(&[1.0, 1.0, 1.0, 1.0]);
let mut square = Polytope::new(a_in, b_in).unwrap();
let x0 = arr2(&[[0.0], [0.0]]);

let samples = Walk::new(4, 10)
    .thinning(2)
    .warm(1)
    .seed(42)
    .run(&mut square, x0.view())
    .unwrap();
assert_eq!(samples.shape(), &[10, 2, 4]);
assert!(samples.iter().all(|v| v.abs() <= 1.0 + 1e-9));
```
*/

use burn::prelude::*;
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::backend::{array2_to_tensor, tensor_to_array2, DeviceSystem, Storage};
use crate::direction::DirectionSampler;
use crate::error::{ConfigurationError, Error, Result};
use crate::initial_points::adapt_initial_points;
use crate::placement::ComputeTarget;
use crate::polytope::Polytope;
use crate::progress::{
    BarProgress, LogWarnings, NoProgress, ProgressReporter, ProgressUpdate, WarningSink,
};
use crate::ratio::chord_bounds;
use crate::schedule::{ChainSchedule, Phase};

/// Relative tolerance used when checking that starting points are feasible.
const START_TOLERANCE: f64 = 1e-6;

/// Configuration of one walk, built with chained setters.
pub struct Walk {
    z: usize,
    total: usize,
    warm: Option<usize>,
    thinning: Option<usize>,
    target: Option<String>,
    seed: Option<u64>,
    verbosity: u8,
    progress: Option<Box<dyn ProgressReporter>>,
    warnings: Box<dyn WarningSink>,
}

impl Walk {
    /// `z` parallel chains, `total` collected batches.
    pub fn new(z: usize, total: usize) -> Self {
        Self {
            z,
            total,
            warm: None,
            thinning: None,
            target: None,
            seed: None,
            verbosity: 0,
            progress: None,
            warnings: Box::new(LogWarnings),
        }
    }

    /// Number of thinning windows discarded before the first batch.
    pub fn warm(mut self, warm: usize) -> Self {
        self.warm = Some(warm);
        self
    }

    /// Steps between stored batches.
    pub fn thinning(mut self, thinning: usize) -> Self {
        self.thinning = Some(thinning);
        self
    }

    /// Compute target by name (`"cpu"`, `"cuda"`, ...). The polytope is moved there before
    /// the walk starts; an unknown name fails the run.
    pub fn target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn compute_target(mut self, target: ComputeTarget) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 0 is silent, 1 logs the run parameters and shows progress bars, 2 adds debug output.
    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Box::new(reporter));
        self
    }

    pub fn warnings(mut self, sink: impl WarningSink + 'static) -> Self {
        self.warnings = Box::new(sink);
        self
    }

    /// Runs the walk from the columns of `x0` (`n×k`), returning `(T, n, z)` samples.
    pub fn run(&mut self, polytope: &mut Polytope, x0: ArrayView2<f64>) -> Result<Array3<f64>> {
        let target = self
            .target
            .as_deref()
            .map(str::parse::<ComputeTarget>)
            .transpose()?;

        let n = polytope.n();
        if x0.nrows() != n {
            return Err(ConfigurationError::AmbientDimension {
                expected: n,
                found: x0.nrows(),
            }
            .into());
        }
        if self.z == 0 {
            return Err(ConfigurationError::NoChains.into());
        }

        let thinning = self.thinning.unwrap_or(n * n * n);
        let warm = self.warm.unwrap_or(thinning);
        let schedule = ChainSchedule::new(self.total, warm, thinning)?;
        let start = adapt_initial_points(x0, n, self.z)?;

        if let Some(target) = target {
            polytope.move_to(target)?;
        }

        if self.verbosity >= 1 {
            log::info!(
                "n: {n}  mI: {}  mE: {:?}  z: {}",
                polytope.m_in(),
                polytope.m_eq(),
                self.z
            );
            if self.thinning.is_none() {
                log::info!("Automatic thinning factor: {thinning}");
            }
            if self.warm.is_none() {
                log::info!("Warm-up windows: {warm}");
            }
        }
        if self.verbosity > 1 {
            let (lo, hi) = polytope.precision().finite_range();
            log::debug!("Minimum number allowed {lo}, maximum number allowed {hi}");
        }

        self.check_start(polytope, &start)?;

        let mut sampler = DirectionSampler::new(polytope.placement(), self.seed);
        if self.verbosity > 1 {
            log::debug!("Seed: {}", sampler.seed());
        }

        if schedule.is_done() {
            return Ok(Array3::zeros((0, n, self.z)));
        }

        let mut bars;
        let mut silent = NoProgress;
        let progress: &mut (dyn ProgressReporter + 'static) = match self.progress.as_deref_mut() {
            Some(reporter) => reporter,
            None if self.verbosity >= 1 => {
                bars = BarProgress::new(thinning, self.total);
                &mut bars
            }
            None => &mut silent,
        };

        let mut chains = Chains {
            schedule,
            sampler: &mut sampler,
            progress,
            warnings: &mut *self.warnings,
        };
        match polytope.storage() {
            Storage::HostSingle(system) => chains.run(system, &start),
            Storage::HostDouble(system) => chains.run(system, &start),
            #[cfg(feature = "wgpu")]
            Storage::AcceleratorHalf(system) => chains.run(system, &start),
            #[cfg(feature = "wgpu")]
            Storage::AcceleratorSingle(system) => chains.run(system, &start),
        }
    }

    /// Warns about starting points outside the polytope and redundant equality rows.
    fn check_start(&mut self, polytope: &Polytope, start: &Array2<f64>) -> Result<()> {
        let scale = polytope
            .b_in()
            .iter()
            .map(|b| b.abs())
            .fold(1.0, f64::max);
        let violation = polytope.max_violation(start.view())?;
        if violation > START_TOLERANCE * scale {
            self.warnings.warn(&format!(
                "initial points violate the constraints by up to {violation:e}; \
                 samples may leave the polytope"
            ));
        }
        if let Some(eq) = polytope.equality() {
            if eq.is_rank_deficient() {
                self.warnings.warn(&format!(
                    "equality system has {} rows but rank {}; redundant rows are ignored",
                    eq.m_eq(),
                    eq.rank()
                ));
            }
        }
        Ok(())
    }
}

/// Borrowed state of one running walk.
struct Chains<'a> {
    schedule: ChainSchedule,
    sampler: &'a mut DirectionSampler,
    progress: &'a mut (dyn ProgressReporter + 'static),
    warnings: &'a mut (dyn WarningSink + 'static),
}

impl Chains<'_> {
    fn run<B: Backend>(&mut self, system: &DeviceSystem<B>, start: &Array2<f64>) -> Result<Array3<f64>> {
        let (n, z) = start.dim();
        let precision = system.placement.precision;
        let thinning = self.schedule.thinning();
        let total = self.schedule.total();

        let mut out = Array3::<f64>::zeros((total, n, z));
        let mut x = array2_to_tensor::<B>(start, &system.device);
        let mut iteration = 0;
        let mut warned_unbounded = false;

        while !self.schedule.is_done() {
            iteration += 1;

            let d = self.sampler.draw_direction(system, z)?;
            let bounds = chord_bounds(&system.a_in, &system.b_in, &x, &d, precision);
            let unbounded = bounds.validate(precision, iteration)?;
            if unbounded > 0 && !warned_unbounded {
                self.warnings.warn(&format!(
                    "{unbounded} of {z} chains found an unbounded chord at iteration \
                     {iteration}; the polytope may be unbounded"
                ));
                warned_unbounded = true;
            }

            let u = self.sampler.draw_uniform(system, z)?;
            let theta = bounds.step(u).repeat_dim(0, n);
            x = x.add(d.mul(theta));

            let phase = self.schedule.advance();
            let emitted = self.schedule.t() - 1;
            self.progress.update(ProgressUpdate {
                burned: self.schedule.burned(),
                thinning,
                t: emitted,
                total,
                new_batch: false,
            });

            if let Phase::Emit { slot } = phase {
                let snapshot = tensor_to_array2(x.clone())?;
                if let Some(chain) = first_non_finite_column(&snapshot) {
                    return Err(Error::NonFinitePosition { iteration, chain });
                }
                out.index_axis_mut(Axis(0), slot).assign(&snapshot);
                self.progress.update(ProgressUpdate {
                    burned: self.schedule.burned(),
                    thinning,
                    t: emitted,
                    total,
                    new_batch: true,
                });
            }
        }
        Ok(out)
    }
}

fn first_non_finite_column(positions: &Array2<f64>) -> Option<usize> {
    positions
        .axis_iter(Axis(1))
        .position(|column| column.iter().any(|v| !v.is_finite()))
}

/// Samples a polytope in one call.
///
/// Equivalent to configuring a [`Walk`] with the same values; `warm` and `thinning` fall
/// back to their defaults when `None`, and `target` overrides the polytope's compute target.
#[allow(clippy::too_many_arguments)]
pub fn walk(
    polytope: &mut Polytope,
    x0: ArrayView2<f64>,
    z: usize,
    total: usize,
    warm: Option<usize>,
    thinning: Option<usize>,
    target: Option<&str>,
    seed: Option<u64>,
    verbosity: u8,
) -> Result<Array3<f64>> {
    let mut walk = Walk::new(z, total).verbosity(verbosity);
    walk.warm = warm;
    walk.thinning = thinning;
    walk.target = target.map(str::to_string);
    walk.seed = seed;
    walk.run(polytope, x0)
}
