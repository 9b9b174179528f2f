//! Float operators that map onto a single kernel.
//!
//! - `conv`: weights `[Co, Kh, Kw, Ci]` handed over as an HWCN filter tuple,
//!   bias omitted when null
//! - `gemm`: `A` as input, `B` and optional `C` as weights
//! - `pool`, `global_pool`: average (with `count_include_pad`) or max
//! - `resize`: zero-insertion mode goes to the upsample kernel

use llsw_kernels::{
    self as kernels, ArgKind, ConvArgs, FilterShape, Forward, GemmArgs, Layer, LayerOp, LrnArgs,
    PoolArgs, PoolKind,
};

use super::{input, output, pads_reversed, pair, submit};
use crate::axis::shape_axis;
use crate::error::{Error, Result};
use crate::ir::{
    ArgParams, ConcatParams, ConvParams, GatherParams, GemmParams, GlobalPoolParams,
    InstanceNormParams, LpNormParams, LrnParams, MatmulParams, NodeType, PoolParams,
    ResizeMode, ResizeParams, SignParams, SoftmaxParams, Tensor, TileParams,
};

// ============================================================================
// Convolution & matrices
// ============================================================================

pub fn conv(p: &mut ConvParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = input(node, "input", &p.general.input)?;
    let w = input(node, "weights", &p.weights)?;
    let bias = p.bias.to_obj()?;
    let d = p.weights.dim;
    let args = ConvArgs {
        filter: FilterShape::hwcn([d.h as usize, d.w as usize, d.c as usize, d.n as usize]),
        pads: pads_reversed(p.pads),
        strides: pair(p.strides),
        dilations: pair(p.dilations),
        groups: p.ngroup as usize,
    };

    let y = output(node, &mut p.general.output)?;
    let mut layer = Layer::new(LayerOp::Conv2d(args), y)
        .with_input(x)?
        .with_weight(w)?;
    if let Some(b) = bias {
        layer = layer.with_weight(b)?;
    }
    submit(node, lib, layer)
}

pub fn gemm(p: &mut GemmParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let a = input(node, "input", &p.general.input)?;
    let b = input(node, "b", &p.b)?;
    let c = p.c.to_obj()?;
    let args = GemmArgs {
        alpha: p.alpha,
        beta: p.beta,
        trans_a: p.trans_a,
        trans_b: p.trans_b,
    };

    let y = output(node, &mut p.general.output)?;
    let mut layer = Layer::new(LayerOp::Gemm(args), y)
        .with_input(a)?
        .with_weight(b)?;
    if let Some(c) = c {
        layer = layer.with_weight(c)?;
    }
    submit(node, lib, layer)
}

pub fn matmul(p: &mut MatmulParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let a = input(node, "input", &p.general.input)?;
    let b = input(node, "input2", &p.input2)?;
    let y = output(node, &mut p.general.output)?;
    let layer = Layer::new(LayerOp::MatMul, y).with_input(a)?.with_input(b)?;
    submit(node, lib, layer)
}

// ============================================================================
// Pooling
// ============================================================================

pub(crate) fn pool_kind(node: NodeType, count_include_pad: bool) -> Result<PoolKind> {
    match node {
        NodeType::PoolAverage
        | NodeType::GlobalPoolAverage
        | NodeType::PoolAverageInteger
        | NodeType::GlobalPoolAverageInteger => Ok(PoolKind::Average { count_include_pad }),
        NodeType::PoolMax
        | NodeType::GlobalPoolMax
        | NodeType::PoolMaxInteger
        | NodeType::GlobalPoolMaxInteger => Ok(PoolKind::Max),
        other => Err(Error::UnsupportedOperator(other)),
    }
}

/// Window covering the whole spatial extent, stride 1, no padding.
pub(crate) fn global_window(kind: PoolKind, input: &Tensor<'_>) -> PoolArgs {
    PoolArgs {
        kind,
        kernel: [input.dim.h as usize, input.dim.w as usize],
        strides: [1, 1],
        pads: [0; 4],
    }
}

pub fn pool(p: &mut PoolParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let args = PoolArgs {
        kind: pool_kind(node, p.count_include_pad)?,
        kernel: pair(p.kernel_shape),
        strides: pair(p.strides),
        pads: pads_reversed(p.pads),
    };
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::Pool(args), y).with_input(x)?)
}

pub fn global_pool(p: &mut GlobalPoolParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let args = global_window(pool_kind(node, false)?, &p.general.input);
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::Pool(args), y).with_input(x)?)
}

// ============================================================================
// Data movement
// ============================================================================

/// Height and width scales, entries 2 and 3 of the scale tensor.
pub(crate) fn resize_scales(node: NodeType, scales: &Tensor<'_>) -> Result<[f32; 2]> {
    let t = input(node, "scales", scales)?;
    if t.shape.size() < 4 {
        return Err(Error::ShapeMismatch {
            node,
            what: "scale tensor needs four entries",
        });
    }
    let data = t.data.as_f32()?;
    Ok([data[t.flat(2)], data[t.flat(3)]])
}

pub(crate) fn kernel_resize_mode(mode: ResizeMode) -> Option<kernels::ResizeMode> {
    match mode {
        ResizeMode::Zeros => None,
        ResizeMode::Nearest => Some(kernels::ResizeMode::Nearest),
        ResizeMode::Linear => Some(kernels::ResizeMode::Linear),
        ResizeMode::Cubic => Some(kernels::ResizeMode::Cubic),
    }
}

pub fn resize(p: &mut ResizeParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let scale = resize_scales(node, &p.scales)?;
    let op = match kernel_resize_mode(p.mode) {
        None => LayerOp::Upsample { scale },
        Some(mode) => LayerOp::Resize { mode, scale },
    };
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(op, y).with_input(x)?)
}

pub fn concat(p: &mut ConcatParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let count = p.num_of_inputs as usize;
    if !(2..=4).contains(&count) {
        return Err(Error::OperandCount { node, count });
    }
    let axis = shape_axis(p.axis)?;
    let parts = [
        (p.general.input, "input"),
        (p.input2, "input2"),
        (p.input3, "input3"),
        (p.input4, "input4"),
    ];

    let y = output(node, &mut p.general.output)?;
    let mut layer = Layer::new(LayerOp::Concat { axis }, y);
    for (t, name) in &parts[..count] {
        layer = layer.with_input(input(node, name, t)?)?;
    }
    submit(node, lib, layer)
}

pub fn gather(p: &mut GatherParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let axis = shape_axis(p.axis)?;
    let data = input(node, "input", &p.general.input)?;
    let indices = input(node, "indices", &p.indices)?;
    let y = output(node, &mut p.general.output)?;
    let layer = Layer::new(LayerOp::Gather { axis }, y)
        .with_input(data)?
        .with_input(indices)?;
    submit(node, lib, layer)
}

/// Repeat counts arrive in logical order and are placed on their layout axes.
pub fn tile(p: &mut TileParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let t = input(node, "repeats", &p.repeats)?;
    if t.shape.size() != 4 {
        return Err(Error::ShapeMismatch {
            node,
            what: "repeats tensor needs four entries",
        });
    }
    let mut repeats = [1usize; 4];
    for logical in 0..4 {
        let count = t.data.index_at(t.flat(logical))?;
        let count = usize::try_from(count).map_err(|_| Error::InvalidParameter {
            node,
            what: "negative repeat count",
        })?;
        repeats[shape_axis(logical as i32)?.index()] = count;
    }

    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::Tile { repeats }, y).with_input(x)?)
}

// ============================================================================
// Axis operators & normalisation
// ============================================================================

pub fn softmax(p: &mut SoftmaxParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let axis = shape_axis(p.axis)?;
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::Softmax { axis }, y).with_input(x)?)
}

pub fn arg(p: &mut ArgParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let kind = match node {
        NodeType::ArgMin => ArgKind::Min,
        NodeType::ArgMax => ArgKind::Max,
        other => return Err(Error::UnsupportedOperator(other)),
    };
    let op = LayerOp::ArgReduce {
        kind,
        axis: shape_axis(p.axis)?,
        select_last_index: p.select_last_index,
    };
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(op, y).with_input(x)?)
}

pub fn lrn(p: &mut LrnParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let args = LrnArgs {
        size: p.size as usize,
        alpha: p.alpha,
        beta: p.beta,
        bias: p.bias,
    };
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::Lrn(args), y).with_input(x)?)
}

pub fn instance_norm(p: &mut InstanceNormParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = input(node, "input", &p.general.input)?;
    let scale = input(node, "scale", &p.scale)?;
    let bias = input(node, "bias", &p.bias)?;
    let y = output(node, &mut p.general.output)?;
    let layer = Layer::new(LayerOp::InstanceNorm { epsilon: p.epsilon }, y)
        .with_input(x)?
        .with_weight(scale)?
        .with_weight(bias)?;
    submit(node, lib, layer)
}

pub fn lp_norm(p: &mut LpNormParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let op = LayerOp::LpNorm {
        axis: shape_axis(p.axis)?,
        p: p.p,
    };
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(op, y).with_input(x)?)
}

pub fn sign(p: &mut SignParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(LayerOp::Sign, y).with_input(x)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::recorder::Recorder;
    use crate::ir::{Dim, General, TensorMut};
    use llsw_kernels::{Axis, FilterOrder, Reference, Shape};

    #[test]
    fn test_conv_filter_order_and_reversed_pads() {
        let x = [0.0f32; 2 * 3 * 3 * 2];
        let w = [0.0f32; 4 * 2 * 1 * 2];
        let mut y = [0.0f32; 2 * 3 * 3 * 4];
        let mut p = ConvParams {
            general: General::new(
                NodeType::Conv,
                Tensor::f32(Dim::nhwc(2, 3, 3, 2), &x),
                TensorMut::f32(Dim::nhwc(2, 3, 3, 4), &mut y),
            ),
            weights: Tensor::f32(Dim::nhwc(4, 2, 1, 2), &w),
            bias: Tensor::null(),
            pads: [1, 0, 0, 0],
            strides: [1, 1],
            dilations: [1, 1],
            ngroup: 1,
        };
        let mut lib = Recorder::default();
        conv(&mut p, &mut lib).unwrap();
        let call = lib.only();
        let LayerOp::Conv2d(args) = call.op else {
            panic!("unexpected op {:?}", call.op);
        };
        assert_eq!(args.filter.order, FilterOrder::Hwcn);
        assert_eq!(args.filter.dims, [2, 1, 2, 4]);
        assert_eq!(args.pads, [0, 0, 0, 1]);
        // Null bias is left out of the weight chain.
        assert_eq!(call.weights.len(), 1);

        // Same geometry runs on the reference kernels.
        conv(&mut p, &mut Reference).unwrap();
    }

    #[test]
    fn test_conv_bias_present() {
        let x = [1.0f32, 2.0];
        let w = [3.0f32, 4.0];
        let b = [0.5f32];
        let mut y = [0.0f32];
        let mut p = ConvParams {
            general: General::new(
                NodeType::Conv,
                Tensor::f32(Dim::nhwc(1, 1, 1, 2), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
            ),
            weights: Tensor::f32(Dim::nhwc(1, 1, 1, 2), &w),
            bias: Tensor::f32(Dim::nhwc(1, 1, 1, 1), &b),
            pads: [0; 4],
            strides: [1, 1],
            dilations: [1, 1],
            ngroup: 1,
        };
        conv(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [11.5]);
    }

    #[test]
    fn test_gemm_without_c() {
        let a = [1.0f32, 2.0];
        let b = [3.0f32, 4.0];
        let mut y = [0.0f32];
        let mut p = GemmParams {
            general: General::new(
                NodeType::Gemm,
                Tensor::f32(Dim::nhwc(1, 1, 1, 2), &a),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
            ),
            b: Tensor::f32(Dim::nhwc(1, 1, 2, 1), &b),
            c: Tensor::null(),
            alpha: 2.0,
            beta: 1.0,
            trans_a: false,
            trans_b: false,
        };
        let mut lib = Recorder::default();
        gemm(&mut p, &mut lib).unwrap();
        assert_eq!(lib.only().weights.len(), 1);
        gemm(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [22.0]);
    }

    #[test]
    fn test_pool_kinds_and_global_window() {
        let x = [1.0f32, 5.0, 3.0, 2.0];
        let mut y = [0.0f32];
        let mut p = GlobalPoolParams {
            general: General::new(
                NodeType::GlobalPoolMax,
                Tensor::f32(Dim::nhwc(1, 2, 2, 1), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
            ),
        };
        let mut lib = Recorder::default();
        global_pool(&mut p, &mut lib).unwrap();
        assert_eq!(
            lib.only().op,
            LayerOp::Pool(PoolArgs {
                kind: PoolKind::Max,
                kernel: [2, 2],
                strides: [1, 1],
                pads: [0; 4],
            })
        );
        global_pool(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [5.0]);

        assert_eq!(
            pool_kind(NodeType::PoolAverage, true).unwrap(),
            PoolKind::Average {
                count_include_pad: true
            }
        );
        assert_eq!(
            pool_kind(NodeType::Conv, false),
            Err(Error::UnsupportedOperator(NodeType::Conv))
        );
    }

    #[test]
    fn test_resize_scales_from_entries_two_and_three() {
        let x = [1.0f32, 2.0];
        let scales = [9.0f32, 9.0, 2.0, 1.0];
        let mut y = [0.0f32; 4];
        let mut p = ResizeParams {
            general: General::new(
                NodeType::Resize,
                Tensor::f32(Dim::nhwc(1, 2, 1, 1), &x),
                TensorMut::f32(Dim::nhwc(1, 4, 1, 1), &mut y),
            ),
            scales: Tensor::f32(Dim::nhwc(1, 1, 1, 4), &scales),
            mode: ResizeMode::Zeros,
        };
        let mut lib = Recorder::default();
        resize(&mut p, &mut lib).unwrap();
        assert_eq!(lib.only().op, LayerOp::Upsample { scale: [2.0, 1.0] });

        p.mode = ResizeMode::Nearest;
        let mut lib = Recorder::default();
        resize(&mut p, &mut lib).unwrap();
        assert_eq!(
            lib.only().op,
            LayerOp::Resize {
                mode: kernels::ResizeMode::Nearest,
                scale: [2.0, 1.0]
            }
        );
        resize(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_concat_operand_count() {
        let a = [1.0f32];
        let b = [2.0f32];
        let c = [3.0f32];
        let mut y = [0.0f32; 3];
        let one = Dim::nhwc(1, 1, 1, 1);
        let mut p = ConcatParams {
            general: General::new(
                NodeType::Concat,
                Tensor::f32(one, &a),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 3), &mut y),
            ),
            input2: Tensor::f32(one, &b),
            input3: Tensor::f32(one, &c),
            input4: Tensor::null(),
            num_of_inputs: 5,
            axis: 1,
        };
        assert_eq!(
            concat(&mut p, &mut Recorder::default()),
            Err(Error::OperandCount {
                node: NodeType::Concat,
                count: 5
            })
        );
        p.num_of_inputs = 4;
        assert_eq!(
            concat(&mut p, &mut Recorder::default()),
            Err(Error::MissingTensor {
                node: NodeType::Concat,
                tensor: "input4"
            })
        );
        p.num_of_inputs = 3;
        let mut lib = Recorder::default();
        concat(&mut p, &mut lib).unwrap();
        assert_eq!(lib.only().op, LayerOp::Concat { axis: Axis::Channel });
        concat(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_tile_repeats_follow_logical_order() {
        let x = [1.0f32, 2.0];
        // batch 1, channel 1, height 1, width 2
        let repeats = [1i64, 1, 1, 2];
        let mut y = [0.0f32; 4];
        let mut p = TileParams {
            general: General::new(
                NodeType::Tile,
                Tensor::f32(Dim::nhwc(1, 1, 2, 1), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 4, 1), &mut y),
            ),
            repeats: Tensor::i64(Dim::nhwc(1, 1, 1, 4), &repeats),
        };
        let mut lib = Recorder::default();
        tile(&mut p, &mut lib).unwrap();
        assert_eq!(lib.only().op, LayerOp::Tile { repeats: [1, 1, 2, 1] });
        tile(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [1.0, 2.0, 1.0, 2.0]);

        let negative = [1i64, -1, 1, 1];
        let mut y = [0.0f32; 2];
        let mut p = TileParams {
            general: General::new(
                NodeType::Tile,
                Tensor::f32(Dim::nhwc(1, 1, 2, 1), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 2, 1), &mut y),
            ),
            repeats: Tensor::i64(Dim::nhwc(1, 1, 1, 4), &negative),
        };
        assert_eq!(
            tile(&mut p, &mut Recorder::default()),
            Err(Error::InvalidParameter {
                node: NodeType::Tile,
                what: "negative repeat count"
            })
        );
    }

    #[test]
    fn test_gather_and_arg_reduce() {
        let x = [5.0f32, 7.0, 9.0];
        let idx = [-1i64, 0];
        let mut y = [0.0f32; 2];
        let mut p = GatherParams {
            general: General::new(
                NodeType::Gather,
                Tensor::f32(Dim::nhwc(1, 1, 1, 3), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 2), &mut y),
            ),
            indices: Tensor::i64(Dim::nhwc(1, 1, 1, 2), &idx),
            axis: 1,
        };
        gather(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [9.0, 5.0]);

        let mut best = [0i64];
        let mut p = ArgParams {
            general: General::new(
                NodeType::ArgMin,
                Tensor::f32(Dim::nhwc(1, 1, 1, 3), &x),
                TensorMut::i64(Dim::nhwc(1, 1, 1, 1), &mut best),
            ),
            axis: 1,
            select_last_index: false,
        };
        let mut lib = Recorder::default();
        arg(&mut p, &mut lib).unwrap();
        assert_eq!(lib.only().symbol, "forward_argmin");
        assert_eq!(lib.only().output.shape, Shape::new(1, 1, 1, 1));
        arg(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(best, [0]);
    }

    #[test]
    fn test_axis_out_of_range_fails_before_kernel() {
        let x = [1.0f32];
        let mut y = [0.0f32];
        let mut p = SoftmaxParams {
            general: General::new(
                NodeType::Softmax,
                Tensor::f32(Dim::nhwc(1, 1, 1, 1), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
            ),
            axis: -1,
        };
        let mut lib = Recorder::default();
        assert_eq!(softmax(&mut p, &mut lib), Err(Error::InvalidAxis(-1)));
        assert!(lib.calls.is_empty());
    }
}
