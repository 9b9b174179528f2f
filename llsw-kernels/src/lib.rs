//! Layer-object math kernels.
//!
//! - `layer`: the contract a caller fills in (tensor objects, quantization
//!   lists, kernel parameter blocks, input/weight chains).
//! - `naive`: reference implementations of every kernel symbol, correct but
//!   slow. Used on the host and as a correctness baseline.
//! - [`Forward`]: the single entry point a kernel library exposes.

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod layer;
pub mod math;
pub mod naive;

pub use error::KernelError;
pub use layer::{
    ArgKind, Axis, Buf, BufMut, ConvArgs, ConvStrategy, Coord, DType, FilterOrder, FilterShape,
    GemmArgs, IntqFlags, IntqInfoList, Layer, LayerOp, LrnArgs, OffsetFormat, Pads, PoolArgs,
    PoolKind, ResizeMode, ScaleFormat, Shape, Stride, TensorList, TensorObj, TensorObjMut,
    ZeroPoints, MAX_CHAIN,
};
pub use math::{ActivArgs, ActivFn, BinaryOp};

/// A math-kernel library: runs one fully assembled layer to completion.
pub trait Forward {
    fn forward(&mut self, layer: Layer<'_>) -> Result<(), KernelError>;
}

impl<F: Forward + ?Sized> Forward for &mut F {
    fn forward(&mut self, layer: Layer<'_>) -> Result<(), KernelError> {
        (**self).forward(layer)
    }
}

/// Host backend built on [`naive`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Reference;

impl Forward for Reference {
    fn forward(&mut self, layer: Layer<'_>) -> Result<(), KernelError> {
        let symbol = layer.op.symbol();
        naive::forward(layer).inspect_err(|e| log::debug!("{symbol} rejected layer: {e}"))
    }
}
