//! Per-operator parameter structs.
//!
//! Every struct starts with a [`General`] header (node type, primary input,
//! output). The rest are the operator's own fields, in the layout the graph
//! interpreter fills them in. Tensor-valued fields may be null
//! ([`Tensor::null`]) where the operator treats them as optional.
//!
//! Padding is `[h_begin, w_begin, h_end, w_end]`; strides, dilations and
//! kernel extents are `[h, w]`. Axes are logical (`0..=3`, batch, channel,
//! height, width).

use super::node::NodeType;
use super::tensor::{Quant, Tensor, TensorMut};

/// Header shared by every parameter struct.
#[derive(Debug)]
pub struct General<'a> {
    pub node_type: NodeType,
    pub input: Tensor<'a>,
    pub output: TensorMut<'a>,
}

impl<'a> General<'a> {
    pub fn new(node_type: NodeType, input: Tensor<'a>, output: TensorMut<'a>) -> Self {
        Self {
            node_type,
            input,
            output,
        }
    }
}

// ============================================================================
// Convolution & matrices
// ============================================================================

#[derive(Debug)]
pub struct ConvParams<'a> {
    pub general: General<'a>,
    /// `n = out channels, h = kh, w = kw, c = in channels per group`
    pub weights: Tensor<'a>,
    pub bias: Tensor<'a>,
    pub pads: [u32; 4],
    pub strides: [u32; 2],
    pub dilations: [u32; 2],
    pub ngroup: u32,
}

/// Quantized convolution strategy, classified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvFwdCase {
    Pointwise,
    RgbInput,
    Depthwise,
    Dilated,
    GenericPerChannel,
    GenericInteger,
}

#[derive(Debug)]
pub struct ConvIntegerParams<'a> {
    pub general: General<'a>,
    pub weights: Tensor<'a>,
    /// `i32` accumulators, one per output channel.
    pub bias: Tensor<'a>,
    pub pads: [u32; 4],
    pub strides: [u32; 2],
    pub dilations: [u32; 2],
    pub ngroup: u32,
    pub fwd_func: ConvFwdCase,
    pub input_quant: Quant<'a>,
    /// Per-tensor or one entry per output channel.
    pub weights_quant: Quant<'a>,
    /// Null scale: the output receives raw `i32` accumulators.
    pub output_quant: Quant<'a>,
}

#[derive(Debug)]
pub struct GemmParams<'a> {
    pub general: General<'a>,
    pub b: Tensor<'a>,
    pub c: Tensor<'a>,
    pub alpha: f32,
    pub beta: f32,
    pub trans_a: bool,
    pub trans_b: bool,
}

#[derive(Debug)]
pub struct GemmIntegerParams<'a> {
    pub general: General<'a>,
    pub b: Tensor<'a>,
    /// Optional `i32` bias.
    pub c: Tensor<'a>,
    pub alpha: f32,
    pub beta: f32,
    pub trans_a: bool,
    pub trans_b: bool,
    pub a_quant: Quant<'a>,
    pub b_quant: Quant<'a>,
    pub y_quant: Quant<'a>,
    /// Zero-filled and used as the bias when `c` is null.
    pub bias_scratch: Option<&'a mut [i32]>,
}

#[derive(Debug)]
pub struct MatmulParams<'a> {
    pub general: General<'a>,
    pub input2: Tensor<'a>,
}

#[derive(Debug)]
pub struct QLinearMatMulParams<'a> {
    pub general: General<'a>,
    pub input2: Tensor<'a>,
    pub a_quant: Quant<'a>,
    pub b_quant: Quant<'a>,
    pub y_quant: Quant<'a>,
    /// Always zero-filled and handed to the kernel as the bias.
    pub bias_scratch: Option<&'a mut [i32]>,
}

// ============================================================================
// Pooling
// ============================================================================

#[derive(Debug)]
pub struct PoolParams<'a> {
    pub general: General<'a>,
    pub kernel_shape: [u32; 2],
    pub strides: [u32; 2],
    pub pads: [u32; 4],
    pub count_include_pad: bool,
}

#[derive(Debug)]
pub struct PoolIntegerParams<'a> {
    pub general: General<'a>,
    pub kernel_shape: [u32; 2],
    pub strides: [u32; 2],
    pub pads: [u32; 4],
    pub count_include_pad: bool,
    pub input_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

#[derive(Debug)]
pub struct GlobalPoolParams<'a> {
    pub general: General<'a>,
}

#[derive(Debug)]
pub struct GlobalPoolIntegerParams<'a> {
    pub general: General<'a>,
    pub input_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

// ============================================================================
// Element-wise
// ============================================================================

#[derive(Debug)]
pub struct ActivParams<'a> {
    pub general: General<'a>,
    pub alpha: f32,
    pub beta: f32,
    pub min: f32,
    pub max: f32,
    /// Hardmax only.
    pub axis: i32,
    /// PRelu only.
    pub slope: Tensor<'a>,
}

#[derive(Debug)]
pub struct ActivIntegerParams<'a> {
    pub general: General<'a>,
    pub alpha: f32,
    pub min: f32,
    pub max: f32,
    pub input_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

#[derive(Debug)]
pub struct ArithParams<'a> {
    pub general: General<'a>,
    pub input2: Tensor<'a>,
    pub input3: Tensor<'a>,
    pub input4: Tensor<'a>,
    pub num_of_inputs: u32,
}

#[derive(Debug)]
pub struct ArithIntegerParams<'a> {
    pub general: General<'a>,
    pub input2: Tensor<'a>,
    pub input_quant: Quant<'a>,
    pub input2_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

#[derive(Debug)]
pub struct SignParams<'a> {
    pub general: General<'a>,
}

/// Output quantization of a float to integer conversion.
#[derive(Debug)]
pub struct QuantizeParams<'a> {
    pub general: General<'a>,
    pub quant: Quant<'a>,
}

/// Input quantization of an integer to float conversion.
#[derive(Debug)]
pub struct DequantizeParams<'a> {
    pub general: General<'a>,
    pub quant: Quant<'a>,
}

#[derive(Debug)]
pub struct RequantizeParams<'a> {
    pub general: General<'a>,
    pub input_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

// ============================================================================
// Axis operators
// ============================================================================

#[derive(Debug)]
pub struct ReduceParams<'a> {
    pub general: General<'a>,
    pub axis: i32,
}

#[derive(Debug)]
pub struct ArgParams<'a> {
    pub general: General<'a>,
    pub axis: i32,
    pub select_last_index: bool,
}

#[derive(Debug)]
pub struct SoftmaxParams<'a> {
    pub general: General<'a>,
    pub axis: i32,
}

#[derive(Debug)]
pub struct SoftmaxIntegerParams<'a> {
    pub general: General<'a>,
    pub axis: i32,
    pub input_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

#[derive(Debug)]
pub struct LpNormParams<'a> {
    pub general: General<'a>,
    pub axis: i32,
    pub p: u32,
}

#[derive(Debug)]
pub struct GatherParams<'a> {
    pub general: General<'a>,
    /// `i32` or `i64` indices.
    pub indices: Tensor<'a>,
    pub axis: i32,
}

#[derive(Debug)]
pub struct ConcatParams<'a> {
    pub general: General<'a>,
    pub input2: Tensor<'a>,
    pub input3: Tensor<'a>,
    pub input4: Tensor<'a>,
    pub num_of_inputs: u32,
    pub axis: i32,
}

// ============================================================================
// Normalisation
// ============================================================================

#[derive(Debug)]
pub struct LrnParams<'a> {
    pub general: General<'a>,
    pub size: u32,
    pub alpha: f32,
    pub beta: f32,
    pub bias: f32,
}

#[derive(Debug)]
pub struct InstanceNormParams<'a> {
    pub general: General<'a>,
    pub scale: Tensor<'a>,
    pub bias: Tensor<'a>,
    pub epsilon: f32,
}

/// Per-channel statistics, each of length `c`.
#[derive(Debug)]
pub struct BatchNormParams<'a> {
    pub general: General<'a>,
    pub scale: Tensor<'a>,
    pub bias: Tensor<'a>,
    pub mean: Tensor<'a>,
    pub var: Tensor<'a>,
}

// ============================================================================
// Data movement
// ============================================================================

/// How a resize node fills new pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeMode {
    /// Zero insertion (upsample).
    Zeros,
    Nearest,
    Linear,
    Cubic,
}

#[derive(Debug)]
pub struct ResizeParams<'a> {
    pub general: General<'a>,
    /// Four `f32` scales in logical order; entries 2 and 3 are used.
    pub scales: Tensor<'a>,
    pub mode: ResizeMode,
}

#[derive(Debug)]
pub struct ResizeIntegerParams<'a> {
    pub general: General<'a>,
    pub scales: Tensor<'a>,
    pub mode: ResizeMode,
    pub input_quant: Quant<'a>,
    pub output_quant: Quant<'a>,
}

#[derive(Debug)]
pub struct TileParams<'a> {
    pub general: General<'a>,
    /// Four `i64` repeat counts in logical order.
    pub repeats: Tensor<'a>,
}

// ============================================================================
// Tagged union
// ============================================================================

macro_rules! node_params {
    ($($variant:ident($ty:ident),)*) => {
        /// One node's parameters, tagged by struct shape.
        #[derive(Debug)]
        pub enum NodeParams<'a> {
            $($variant($ty<'a>),)*
        }

        /// Struct shape of a [`NodeParams`] value.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ParamsKind {
            $($variant,)*
        }

        impl<'a> NodeParams<'a> {
            pub fn kind(&self) -> ParamsKind {
                match self {
                    $(NodeParams::$variant(_) => ParamsKind::$variant,)*
                }
            }

            pub fn general(&self) -> &General<'a> {
                match self {
                    $(NodeParams::$variant(p) => &p.general,)*
                }
            }

            pub fn general_mut(&mut self) -> &mut General<'a> {
                match self {
                    $(NodeParams::$variant(p) => &mut p.general,)*
                }
            }
        }

        $(
            impl<'a> From<$ty<'a>> for NodeParams<'a> {
                fn from(p: $ty<'a>) -> Self {
                    NodeParams::$variant(p)
                }
            }
        )*
    };
}

node_params! {
    Conv(ConvParams),
    ConvInteger(ConvIntegerParams),
    Gemm(GemmParams),
    GemmInteger(GemmIntegerParams),
    Matmul(MatmulParams),
    QLinearMatMul(QLinearMatMulParams),
    Pool(PoolParams),
    PoolInteger(PoolIntegerParams),
    GlobalPool(GlobalPoolParams),
    GlobalPoolInteger(GlobalPoolIntegerParams),
    Activ(ActivParams),
    ActivInteger(ActivIntegerParams),
    Arith(ArithParams),
    ArithInteger(ArithIntegerParams),
    Sign(SignParams),
    Quantize(QuantizeParams),
    Dequantize(DequantizeParams),
    Requantize(RequantizeParams),
    Reduce(ReduceParams),
    Arg(ArgParams),
    Softmax(SoftmaxParams),
    SoftmaxInteger(SoftmaxIntegerParams),
    LpNorm(LpNormParams),
    Gather(GatherParams),
    Concat(ConcatParams),
    Lrn(LrnParams),
    InstanceNorm(InstanceNormParams),
    BatchNorm(BatchNormParams),
    Resize(ResizeParams),
    ResizeInteger(ResizeIntegerParams),
    Tile(TileParams),
}

impl NodeParams<'_> {
    pub fn node_type(&self) -> NodeType {
        self.general().node_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::tensor::Dim;

    #[test]
    fn test_kind_and_header_follow_variant() {
        let x = [1.0f32];
        let mut y = [0.0f32];
        let general = General::new(
            NodeType::Sign,
            Tensor::f32(Dim::nhwc(1, 1, 1, 1), &x),
            TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
        );
        let mut params = NodeParams::from(SignParams { general });
        assert_eq!(params.kind(), ParamsKind::Sign);
        assert_eq!(params.node_type(), NodeType::Sign);
        params.general_mut().node_type = NodeType::ActivAbs;
        assert_eq!(params.node_type(), NodeType::ActivAbs);
        assert_eq!(params.kind(), ParamsKind::Sign);
    }
}
