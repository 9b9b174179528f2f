use crate::layer::DType;

/// Rejection raised by a kernel when a layer object is malformed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// Tensor payload has a different element type than the kernel reads or writes
    #[error("expected {expected:?} data, found {found:?}")]
    DType { expected: DType, found: DType },
    /// Slice is shorter than the furthest strided offset of its shape
    #[error("tensor view needs {needed} elements, slice holds {len}")]
    TensorTooSmall { needed: usize, len: usize },
    /// Operand shapes cannot be combined by this kernel
    #[error("shape mismatch: {0}")]
    ShapeMismatch(&'static str),
    /// Input or weight chain is shorter than the kernel requires
    #[error("layer has no {chain} operand at index {index}")]
    MissingOperand { chain: &'static str, index: usize },
    /// A quantized operand was handed over without its scale/zero-point list
    #[error("operand {0} is quantized but carries no quantization info")]
    MissingQuantInfo(&'static str),
    /// Tensor chain capacity exhausted
    #[error("tensor chain holds at most {0} tensors")]
    ChainFull(usize),
    /// The kernel symbol exists in the contract but this backend does not provide it
    #[error("{0} is not provided by this backend")]
    Unsupported(&'static str),
    /// Activation received a parameter array of the wrong length
    #[error("{func} takes {expected} parameters, got {found}")]
    ParamCount { func: &'static str, expected: usize, found: usize },
    /// Convolution strategy does not fit the layer's static shape
    #[error("convolution strategy precondition failed: {0}")]
    StrategyMismatch(&'static str),
    /// Gather index falls outside the indexed dimension
    #[error("index {index} out of range for dimension of size {dim}")]
    IndexOutOfRange { index: i64, dim: usize },
}
