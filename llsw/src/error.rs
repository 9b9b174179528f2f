use llsw_kernels::KernelError;

use crate::ir::{NodeType, ParamsKind};

/// Dispatch failure. Every malformed node surfaces here instead of running
/// an undefined fallback path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Node kind has no kernel mapping on the path it was sent down
    #[error("{0:?} has no software kernel on this path")]
    UnsupportedOperator(NodeType),
    /// Logical axis outside `0..=3`
    #[error("axis {0} is out of range 0..=3")]
    InvalidAxis(i32),
    /// Node dispatched with a parameter struct of the wrong shape
    #[error("{node:?} expects {expected:?} parameters, got {found:?}")]
    ParamsMismatch {
        node: NodeType,
        expected: ParamsKind,
        found: ParamsKind,
    },
    /// A tensor the operator cannot run without has no memory
    #[error("{node:?}: required tensor `{tensor}` is null")]
    MissingTensor {
        node: NodeType,
        tensor: &'static str,
    },
    /// Operand count outside what the operator accepts
    #[error("{node:?}: {count} operands is not supported")]
    OperandCount { node: NodeType, count: usize },
    /// Scalar parameter with an unusable value
    #[error("{node:?}: invalid {what}")]
    InvalidParameter {
        node: NodeType,
        what: &'static str,
    },
    /// Auxiliary tensor does not line up with the operand it describes
    #[error("{node:?}: {what}")]
    ShapeMismatch {
        node: NodeType,
        what: &'static str,
    },
    /// Descriptor's cached element count disagrees with its dims
    #[error("descriptor claims {num_elem} elements, dims give {product}")]
    ElementCount { num_elem: u32, product: u64 },
    /// Quantization list length is neither 1 nor the channel count
    #[error("quantization list of {size} entries does not fit {channels} channels")]
    QuantInfoSize { size: usize, channels: usize },
    /// Scale and zero-point tensors hold a different number of entries
    #[error("{scales} scales but {zero_points} zero points")]
    QuantInfoMismatch { scales: usize, zero_points: usize },
    /// Zero-point storage type disagrees with its signedness flag
    #[error("zero-point storage does not match its signedness flag")]
    ZeroPointFormat,
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type Result<T> = core::result::Result<T, Error>;
