//! Device-side copies of a constraint system.
//!
//! The canonical constraint matrices stay on the host as `f64` arrays. [`Storage`] holds the
//! copy the walk actually computes with, on exactly one `burn` backend chosen from the
//! polytope's [`Placement`].

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::prelude::*;
use ndarray::{Array1, Array2};

use crate::error::{ConfigurationError, Error, Result};
use crate::placement::{ComputeTarget, Placement, Precision};

#[cfg(feature = "wgpu")]
use burn::backend::{wgpu::WgpuDevice, Wgpu};
#[cfg(feature = "wgpu")]
use burn::tensor::f16;

/// Inequality system (and projection, if any) uploaded to one backend.
#[derive(Debug, Clone)]
pub(crate) struct DeviceSystem<B: Backend> {
    pub(crate) placement: Placement,
    pub(crate) device: B::Device,
    /// `[mI, n]`
    pub(crate) a_in: Tensor<B, 2>,
    /// `[mI, 1]`
    pub(crate) b_in: Tensor<B, 2>,
    /// `[n, k]` orthonormal basis of the equality null space.
    pub(crate) projection: Option<Tensor<B, 2>>,
}

impl<B: Backend> DeviceSystem<B> {
    fn upload(
        placement: Placement,
        device: B::Device,
        a_in: &Array2<f64>,
        b_in: &Array1<f64>,
        projection: Option<&Array2<f64>>,
    ) -> Self {
        let b_col = b_in.view().insert_axis(ndarray::Axis(1)).to_owned();
        Self {
            placement,
            a_in: array2_to_tensor(a_in, &device),
            b_in: array2_to_tensor(&b_col, &device),
            projection: projection.map(|p| array2_to_tensor(p, &device)),
            device,
        }
    }

    pub(crate) fn n(&self) -> usize {
        self.a_in.dims()[1]
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Storage {
    HostSingle(DeviceSystem<NdArray<f32>>),
    HostDouble(DeviceSystem<NdArray<f64>>),
    #[cfg(feature = "wgpu")]
    AcceleratorHalf(DeviceSystem<Wgpu<f16>>),
    #[cfg(feature = "wgpu")]
    AcceleratorSingle(DeviceSystem<Wgpu<f32>>),
}

impl Storage {
    /// Allocates the device copy for `placement`, casting from the canonical `f64` values.
    pub(crate) fn build(
        placement: Placement,
        a_in: &Array2<f64>,
        b_in: &Array1<f64>,
        projection: Option<&Array2<f64>>,
    ) -> std::result::Result<Self, ConfigurationError> {
        placement.check()?;
        match (placement.target, placement.precision) {
            (ComputeTarget::Host, Precision::Single) => Ok(Storage::HostSingle(
                DeviceSystem::upload(placement, NdArrayDevice::Cpu, a_in, b_in, projection),
            )),
            (ComputeTarget::Host, Precision::Double) => Ok(Storage::HostDouble(
                DeviceSystem::upload(placement, NdArrayDevice::Cpu, a_in, b_in, projection),
            )),
            #[cfg(feature = "wgpu")]
            (ComputeTarget::Accelerator, Precision::Half) => {
                Ok(Storage::AcceleratorHalf(DeviceSystem::upload(
                    placement,
                    WgpuDevice::default(),
                    a_in,
                    b_in,
                    projection,
                )))
            }
            #[cfg(feature = "wgpu")]
            (ComputeTarget::Accelerator, Precision::Single) => {
                Ok(Storage::AcceleratorSingle(DeviceSystem::upload(
                    placement,
                    WgpuDevice::default(),
                    a_in,
                    b_in,
                    projection,
                )))
            }
            (target, precision) => {
                Err(ConfigurationError::UnsupportedPlacement { precision, target })
            }
        }
    }

    pub(crate) fn placement(&self) -> Placement {
        match self {
            Storage::HostSingle(sys) => sys.placement,
            Storage::HostDouble(sys) => sys.placement,
            #[cfg(feature = "wgpu")]
            Storage::AcceleratorHalf(sys) => sys.placement,
            #[cfg(feature = "wgpu")]
            Storage::AcceleratorSingle(sys) => sys.placement,
        }
    }
}

/// Uploads a host matrix, converting to the backend's float element.
pub(crate) fn array2_to_tensor<B: Backend>(arr: &Array2<f64>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, cols) = arr.dim();
    let data: Vec<f64> = arr.iter().copied().collect();
    let td = TensorData::new(data, [rows, cols]).convert::<B::FloatElem>();
    Tensor::<B, 2>::from_data(td, device)
}

/// Reads a matrix back to the host as `f64`.
pub(crate) fn tensor_to_array2<B: Backend>(tensor: Tensor<B, 2>) -> Result<Array2<f64>> {
    let [rows, cols] = tensor.dims();
    let values = tensor_to_vec(tensor)?;
    Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Transfer(e.to_string()))
}

/// Flattens a tensor (row-major) into host `f64` values.
pub(crate) fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| Error::Transfer(format!("{e:?}")))
}
