//! Affine-quantized operators.
//!
//! Every tensor that takes part in affine math carries an `IntqInfoList`
//! built from its scale/zero-point pair. Activations are quantized along
//! channels; convolution weights along output channels.

use llsw_kernels::{
    Axis, Buf, ConvArgs, ConvStrategy, FilterShape, Forward, GemmArgs, KernelError, Layer,
    LayerOp, PoolArgs, PoolKind, Shape, TensorObj,
};

use super::float::{global_window, kernel_resize_mode, pool_kind, resize_scales};
use super::{
    input, intq_info, output, pads_in_order, pads_reversed, pair, quantized, quantized_output,
    submit,
};
use crate::axis::shape_axis;
use crate::error::{Error, Result};
use crate::ir::{
    ConvFwdCase, ConvIntegerParams, DequantizeParams, GemmIntegerParams,
    GlobalPoolIntegerParams, NodeType, PoolIntegerParams, QLinearMatMulParams, QuantizeParams,
    RequantizeParams, ResizeIntegerParams, SoftmaxIntegerParams,
};

pub fn conv_strategy(case: ConvFwdCase) -> ConvStrategy {
    match case {
        ConvFwdCase::Pointwise => ConvStrategy::Pointwise,
        ConvFwdCase::RgbInput => ConvStrategy::RgbInput,
        ConvFwdCase::Depthwise => ConvStrategy::Depthwise,
        ConvFwdCase::Dilated => ConvStrategy::Dilated,
        ConvFwdCase::GenericPerChannel => ConvStrategy::GenericPerChannel,
        ConvFwdCase::GenericInteger => ConvStrategy::GenericInteger,
    }
}

/// Zero-filled `[1, 1, 1, n]` accumulator tensor over the caller's scratch.
fn zeroed_bias<'s>(
    node: NodeType,
    scratch: &'s mut Option<&mut [i32]>,
    n: usize,
) -> Result<TensorObj<'s>> {
    let buf = scratch.as_deref_mut().ok_or(Error::MissingTensor {
        node,
        tensor: "bias_scratch",
    })?;
    let len = buf.len();
    let buf = buf
        .get_mut(..n)
        .ok_or(KernelError::TensorTooSmall { needed: n, len })?;
    buf.fill(0);
    Ok(TensorObj::contiguous(Shape::new(1, 1, 1, n), Buf::I32(buf))?)
}

// ============================================================================
// Convolution & matrices
// ============================================================================

/// ConvInteger and QLinearConv. A ConvInteger node without an output scale
/// gets raw `i32` accumulators.
pub fn conv_integer(p: &mut ConvIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let w = input(node, "weights", &p.weights)?;
    let w = w.with_intq(intq_info(node, &p.weights_quant, w.shape.n, Axis::Batch)?);
    let bias = p.bias.to_obj()?;
    let d = p.weights.dim;
    let op = LayerOp::Conv2dInteger {
        strategy: conv_strategy(p.fwd_func),
        conv: ConvArgs {
            filter: FilterShape::nhwc([d.n as usize, d.h as usize, d.w as usize, d.c as usize]),
            pads: pads_reversed(p.pads),
            strides: pair(p.strides),
            dilations: pair(p.dilations),
            groups: p.ngroup as usize,
        },
    };

    let out_quant = p.output_quant;
    let raw = node == NodeType::ConvInteger && out_quant.scale.is_null();
    let y = if raw {
        output(node, &mut p.general.output)?
    } else {
        quantized_output(node, &mut p.general.output, &out_quant)?
    };
    let mut layer = Layer::new(op, y).with_input(x)?.with_weight(w)?;
    if let Some(b) = bias {
        layer = layer.with_weight(b)?;
    }
    submit(node, lib, layer)
}

/// Uses `C` when present, otherwise a zero-filled scratch bias.
pub fn gemm_integer(p: &mut GemmIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let a = quantized(node, "input", &p.general.input, &p.a_quant)?;
    let b = quantized(node, "b", &p.b, &p.b_quant)?;
    let n = if p.trans_b {
        b.shape.n * b.shape.h * b.shape.w
    } else {
        b.shape.c
    };
    let args = GemmArgs {
        alpha: p.alpha,
        beta: p.beta,
        trans_a: p.trans_a,
        trans_b: p.trans_b,
    };
    let c = match p.c.to_obj()? {
        Some(c) => c,
        None => zeroed_bias(node, &mut p.bias_scratch, n)?,
    };

    let y_quant = p.y_quant;
    let y = quantized_output(node, &mut p.general.output, &y_quant)?;
    let layer = Layer::new(LayerOp::GemmInteger(args), y)
        .with_input(a)?
        .with_weight(b)?
        .with_weight(c)?;
    submit(node, lib, layer)
}

/// The bias handed to the kernel is always the zero-filled scratch.
pub fn qlinear_matmul(p: &mut QLinearMatMulParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let a = quantized(node, "input", &p.general.input, &p.a_quant)?;
    let b = quantized(node, "input2", &p.input2, &p.b_quant)?;
    let bias = zeroed_bias(node, &mut p.bias_scratch, b.shape.c)?;

    let y_quant = p.y_quant;
    let y = quantized_output(node, &mut p.general.output, &y_quant)?;
    let layer = Layer::new(LayerOp::QLinearMatMul, y)
        .with_input(a)?
        .with_input(b)?
        .with_weight(bias)?;
    submit(node, lib, layer)
}

// ============================================================================
// Pooling
// ============================================================================

/// Average pooling passes the pads in node order, max pooling reversed.
pub fn pool_integer(p: &mut PoolIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let kind = pool_kind(node, p.count_include_pad)?;
    let pads = match kind {
        PoolKind::Average { .. } => pads_in_order(p.pads),
        PoolKind::Max => pads_reversed(p.pads),
    };
    let args = PoolArgs {
        kind,
        kernel: pair(p.kernel_shape),
        strides: pair(p.strides),
        pads,
    };
    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    submit(node, lib, Layer::new(LayerOp::PoolInteger(args), y).with_input(x)?)
}

pub fn global_pool_integer(
    p: &mut GlobalPoolIntegerParams<'_>,
    lib: &mut dyn Forward,
) -> Result<()> {
    let node = p.general.node_type;
    let args = global_window(pool_kind(node, false)?, &p.general.input);
    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    submit(node, lib, Layer::new(LayerOp::PoolInteger(args), y).with_input(x)?)
}

// ============================================================================
// Axis operators & data movement
// ============================================================================

pub fn softmax_integer(p: &mut SoftmaxIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let axis = shape_axis(p.axis)?;
    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    submit(
        node,
        lib,
        Layer::new(LayerOp::SoftmaxInteger { axis }, y).with_input(x)?,
    )
}

pub fn resize_integer(p: &mut ResizeIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let scale = resize_scales(node, &p.scales)?;
    let op = match kernel_resize_mode(p.mode) {
        None => LayerOp::UpsampleInteger { scale },
        Some(mode) => LayerOp::ResizeInteger { mode, scale },
    };
    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    submit(node, lib, Layer::new(op, y).with_input(x)?)
}

// ============================================================================
// Domain conversion
// ============================================================================

pub fn quantize_linear(p: &mut QuantizeParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = input(node, "input", &p.general.input)?;
    let quant = p.quant;
    let y = quantized_output(node, &mut p.general.output, &quant)?;
    submit(node, lib, Layer::new(LayerOp::QuantizeLinear, y).with_input(x)?)
}

pub fn dequantize_linear(p: &mut DequantizeParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = quantized(node, "input", &p.general.input, &p.quant)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::DequantizeLinear, y).with_input(x)?)
}

pub fn requantize_linear(p: &mut RequantizeParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    submit(node, lib, Layer::new(LayerOp::RequantizeLinear, y).with_input(x)?)
}
