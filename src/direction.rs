//! Random directions and chord positions for hit-and-run steps.
//!
//! One [`DirectionSampler`] owns the single random generator of a walk. Every outer iteration
//! advances it exactly twice, direction first and uniform second, so a fixed seed reproduces
//! a walk bit for bit.

use burn::prelude::*;
use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::backend::DeviceSystem;
use crate::error::{ConfigurationError, Result};
use crate::placement::{Placement, Precision};

#[derive(Debug, Clone)]
pub(crate) struct DirectionSampler {
    placement: Placement,
    seed: u64,
    rng: SmallRng,
}

impl DirectionSampler {
    /// Binds a generator to `placement`; without a seed one is drawn from the thread RNG.
    pub(crate) fn new(placement: Placement, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| thread_rng().gen::<u64>());
        Self {
            placement,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub(crate) fn seed(&self) -> u64 {
        self.seed
    }

    /// `[n, z]` directions with i.i.d. N(0, 1) entries, mapped through the equality
    /// projection when the polytope has one (`d = P·g`, `g` of shape `[k, z]`).
    pub(crate) fn draw_direction<B: Backend>(
        &mut self,
        system: &DeviceSystem<B>,
        z: usize,
    ) -> Result<Tensor<B, 2>> {
        self.check(system.placement)?;
        match &system.projection {
            Some(projection) => {
                let k = projection.dims()[1];
                let g = self.standard_normal([k, z]);
                Ok(projection
                    .clone()
                    .matmul(Tensor::from_data(g.convert::<B::FloatElem>(), &system.device)))
            }
            None => {
                let h = self.standard_normal([system.n(), z]);
                Ok(Tensor::from_data(
                    h.convert::<B::FloatElem>(),
                    &system.device,
                ))
            }
        }
    }

    /// `[1, z]` draws from U[0, 1).
    pub(crate) fn draw_uniform<B: Backend>(
        &mut self,
        system: &DeviceSystem<B>,
        z: usize,
    ) -> Result<Tensor<B, 2>> {
        self.check(system.placement)?;
        let u = self.uniform(z);
        Ok(Tensor::from_data(
            u.convert::<B::FloatElem>(),
            &system.device,
        ))
    }

    fn check(&self, storage: Placement) -> Result<()> {
        if storage != self.placement {
            return Err(ConfigurationError::PlacementMismatch {
                sampler: self.placement.to_string(),
                storage: storage.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // Half precision draws in single precision and rounds on upload.
    fn standard_normal(&mut self, shape: [usize; 2]) -> TensorData {
        let len = shape[0] * shape[1];
        match self.placement.precision {
            Precision::Double => {
                let values: Vec<f64> = (0..len)
                    .map(|_| self.rng.sample::<f64, _>(StandardNormal))
                    .collect();
                TensorData::new(values, shape)
            }
            Precision::Single | Precision::Half => {
                let values: Vec<f32> = (0..len)
                    .map(|_| self.rng.sample::<f32, _>(StandardNormal))
                    .collect();
                TensorData::new(values, shape)
            }
        }
    }

    fn uniform(&mut self, z: usize) -> TensorData {
        match self.placement.precision {
            Precision::Double => {
                let values: Vec<f64> = (0..z).map(|_| self.rng.gen::<f64>()).collect();
                TensorData::new(values, [1, z])
            }
            Precision::Single | Precision::Half => {
                let values: Vec<f32> = (0..z).map(|_| self.rng.gen::<f32>()).collect();
                TensorData::new(values, [1, z])
            }
        }
    }
}
