/*!
Numeric precision and compute target of a polytope.

A [`Placement`] pairs one [`Precision`] with one [`ComputeTarget`]. It is resolved once,
when the polytope's storage is (re)built, to exactly one `burn` backend:

| target        | precision | backend                |
|---------------|-----------|------------------------|
| `Host`        | `Single`  | `NdArray<f32>`         |
| `Host`        | `Double`  | `NdArray<f64>`         |
| `Accelerator` | `Half`    | `Wgpu<f16>` (`wgpu`)   |
| `Accelerator` | `Single`  | `Wgpu<f32>` (`wgpu`)   |

Every other pairing is rejected with [`ConfigurationError::UnsupportedPlacement`]. In
particular half precision is only available on the accelerator: the `ndarray` backend has
no `f16` element, so `Half` on `Host` is a configuration error rather than a CPU half tensor.

# Examples

```rust
use polytope_walk::placement::{ComputeTarget, Placement, Precision};

let target: ComputeTarget = "cpu".parse().unwrap();
let placement = Placement::new(Precision::Double, target);
assert!(placement.check().is_ok());
assert!("tpu".parse::<ComputeTarget>().is_err());
```
*/

use std::fmt;
use std::str::FromStr;

use burn::tensor::f16;
use num_traits::Float;

use crate::error::ConfigurationError;

/// Distance kept from the representable extremes when a constraint must not bind.
pub const RANGE_MARGIN: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Half,
    Single,
    Double,
}

impl Precision {
    pub fn bits(self) -> u32 {
        match self {
            Precision::Half => 16,
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }

    pub fn from_bits(bits: u32) -> Result<Self, ConfigurationError> {
        match bits {
            16 => Ok(Precision::Half),
            32 => Ok(Precision::Single),
            64 => Ok(Precision::Double),
            other => Err(ConfigurationError::InvalidPrecision(other.to_string())),
        }
    }

    /// Smallest and largest representable finite values, pulled in by [`RANGE_MARGIN`].
    ///
    /// These are the sentinels substituted for constraints that cannot bound a chord. At 32 and
    /// 64 bits the margin is far below one ulp of the extremes and is lost to rounding, so the
    /// sentinels there are the extremes themselves.
    pub fn finite_range(self) -> (f64, f64) {
        let (lo, hi) = match self {
            Precision::Half => (f16::MIN.to_f64(), f16::MAX.to_f64()),
            Precision::Single => extremes::<f32>(),
            Precision::Double => extremes::<f64>(),
        };
        (lo + RANGE_MARGIN, hi - RANGE_MARGIN)
    }
}

fn extremes<F: Float>() -> (f64, f64) {
    (
        F::min_value().to_f64().unwrap_or(f64::MIN),
        F::max_value().to_f64().unwrap_or(f64::MAX),
    )
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

impl FromStr for Precision {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let name = lowered.strip_prefix("torch.").unwrap_or(&lowered);
        match name {
            "16" | "f16" | "float16" | "half" => Ok(Precision::Half),
            "32" | "f32" | "float32" | "float" | "single" => Ok(Precision::Single),
            "64" | "f64" | "float64" | "double" => Ok(Precision::Double),
            _ => Err(ConfigurationError::InvalidPrecision(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeTarget {
    /// CPU, through the `ndarray` backend.
    Host,
    /// GPU, through the `wgpu` backend.
    Accelerator,
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeTarget::Host => write!(f, "host"),
            ComputeTarget::Accelerator => write!(f, "accelerator"),
        }
    }
}

impl FromStr for ComputeTarget {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "host" => Ok(ComputeTarget::Host),
            "cuda" | "gpu" | "wgpu" | "accelerator" => Ok(ComputeTarget::Accelerator),
            _ => Err(ConfigurationError::InvalidTarget(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub precision: Precision,
    pub target: ComputeTarget,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            precision: Precision::Double,
            target: ComputeTarget::Host,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.precision, self.target)
    }
}

impl Placement {
    pub fn new(precision: Precision, target: ComputeTarget) -> Self {
        Self { precision, target }
    }

    /// Checks that this build has a backend for the pairing.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        match (self.target, self.precision) {
            (ComputeTarget::Host, Precision::Single | Precision::Double) => Ok(()),
            (ComputeTarget::Accelerator, Precision::Half | Precision::Single) => {
                if cfg!(feature = "wgpu") {
                    Ok(())
                } else {
                    Err(ConfigurationError::TargetUnavailable(self.target))
                }
            }
            (target, precision) => {
                Err(ConfigurationError::UnsupportedPlacement { precision, target })
            }
        }
    }
}
