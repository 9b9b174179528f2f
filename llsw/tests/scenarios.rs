//! End-to-end dispatch through the reference kernels.

use llsw::ir::*;
use llsw::kernels::Reference;
use llsw::{forward, Error, Result};
use proptest::prelude::*;

const ONE: Dim = Dim::new(1, 1, 1, 1);

fn run<'a>(params: impl Into<NodeParams<'a>>) -> Result<()> {
    forward(&mut params.into(), &mut Reference)
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= 1e-4 * e.abs().max(1.0), "{actual:?} != {expected:?}");
    }
}

#[test]
fn conv_without_bias_is_a_dot_product() {
    let x = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
    let w = [1.0f32, 0.0, -1.0, 2.0, 0.5, 0.0, 0.0, 1.0, 0.25];
    let mut y = [0.0f32];
    let spatial = Dim::nhwc(1, 3, 3, 1);
    run(ConvParams {
        general: General::new(NodeType::Conv, Tensor::f32(spatial, &x), TensorMut::f32(ONE, &mut y)),
        weights: Tensor::f32(spatial, &w),
        bias: Tensor::null(),
        pads: [0; 4],
        strides: [1, 1],
        dilations: [1, 1],
        ngroup: 1,
    })
    .unwrap();
    // 1 - 3 + 8 + 2.5 + 8 + 2.25
    assert_close(&y, &[18.75]);
}

#[test]
fn quantize_linear_to_u8() {
    let x = [0.0f32, 1.0, 2.0];
    let (scale, zero_point) = ([1.0f32], [0u8]);
    let mut y = [0xffu8; 3];
    let dim = Dim::nhwc(1, 1, 1, 3);
    run(QuantizeParams {
        general: General::new(NodeType::QuantizeLinear, Tensor::f32(dim, &x), TensorMut::u8(dim, &mut y)),
        quant: Quant::new(Tensor::f32(ONE, &scale), Tensor::u8(ONE, &zero_point)),
    })
    .unwrap();
    assert_eq!(y, [0, 1, 2]);
}

#[test]
fn quant_list_must_be_per_tensor_or_per_channel() {
    let x = [0.0f32, 1.0, 2.0];
    let dim = Dim::nhwc(1, 1, 1, 3);
    let quantize = |scales: &[f32]| {
        let mut y = [0u8; 3];
        let quant = Quant::new(
            Tensor::f32(Dim::nhwc(1, 1, 1, scales.len() as u32), scales),
            Tensor::null(),
        );
        run(QuantizeParams {
            general: General::new(NodeType::QuantizeLinear, Tensor::f32(dim, &x), TensorMut::u8(dim, &mut y)),
            quant,
        })
        .map(|()| y)
    };

    assert_eq!(quantize(&[0.5, 1.0, 2.0]), Ok([0, 1, 1]));
    assert_eq!(quantize(&[1.0]), Ok([0, 1, 2]));
    assert_eq!(
        quantize(&[1.0, 1.0]),
        Err(Error::QuantInfoSize {
            size: 2,
            channels: 3
        })
    );
}

#[test]
fn concat_on_channels_keeps_input_order() {
    let (a, b) = ([1.0f32, 2.0], [3.0f32, 4.0]);
    let mut y = [0.0f32; 4];
    let half = Dim::new(1, 1, 2, 1);
    run(ConcatParams {
        general: General::new(NodeType::Concat, Tensor::f32(half, &a), TensorMut::f32(Dim::new(1, 1, 4, 1), &mut y)),
        input2: Tensor::f32(half, &b),
        input3: Tensor::null(),
        input4: Tensor::null(),
        num_of_inputs: 2,
        axis: 1,
    })
    .unwrap();
    assert_eq!(y, [1.0, 2.0, 3.0, 4.0]);
}

fn reduce(node: NodeType, x: &[f32], x_dim: Dim, y_dim: Dim) -> Result<Vec<f32>> {
    let mut y = vec![0.0f32; y_dim.num_elem as usize];
    run(ReduceParams {
        general: General::new(node, Tensor::f32(x_dim, x), TensorMut::f32(y_dim, &mut y)),
        axis: 1,
    })?;
    Ok(y)
}

#[test]
fn reduce_sum_of_zeros_is_zero() {
    let y = reduce(NodeType::ReduceSum, &[0.0; 4], Dim::nhwc(1, 1, 1, 4), ONE).unwrap();
    assert_eq!(y, [0.0]);
}

#[test]
fn reduce_min_over_single_entry_axis_is_identity() {
    let x = [3.5f32, -2.0, 1e30];
    let dim = Dim::nhwc(1, 1, 3, 1);
    let y = reduce(NodeType::ReduceMin, &x, dim, dim).unwrap();
    assert_eq!(y, x);
}

#[test]
fn batch_norm_with_identity_statistics() {
    let x = [-3.0f32, 0.5, 8.0, 1e3];
    let (ones, zeros) = ([1.0f32; 2], [0.0f32; 2]);
    let var = [1.0f32 - 1e-5; 2];
    let mut y = [0.0f32; 4];
    let dim = Dim::nhwc(1, 1, 2, 2);
    let stat = Dim::nhwc(1, 1, 1, 2);
    run(BatchNormParams {
        general: General::new(NodeType::BatchNorm, Tensor::f32(dim, &x), TensorMut::f32(dim, &mut y)),
        scale: Tensor::f32(stat, &ones),
        bias: Tensor::f32(stat, &zeros),
        mean: Tensor::f32(stat, &zeros),
        var: Tensor::f32(stat, &var),
    })
    .unwrap();
    assert_close(&y, &x);
}

#[test]
fn only_sum_accepts_more_than_two_operands() {
    let (a, b, c) = ([1.0f32], [2.0f32], [3.0f32]);
    for node in [NodeType::ArithAdd, NodeType::ArithMul, NodeType::ArithMax] {
        let mut y = [0.0f32];
        let res = run(ArithParams {
            general: General::new(node, Tensor::f32(ONE, &a), TensorMut::f32(ONE, &mut y)),
            input2: Tensor::f32(ONE, &b),
            input3: Tensor::f32(ONE, &c),
            input4: Tensor::null(),
            num_of_inputs: 3,
        });
        assert_eq!(res, Err(Error::OperandCount { node, count: 3 }));
    }
}

#[test]
fn dispatch_writes_only_the_output() {
    let x = [1.0f32, -2.0, 3.0, 4.0];
    let w = [0.5f32, 0.5, -1.0, 2.0];
    let bias = [0.25f32];
    let before = (x, w, bias);
    let mut y = [0.0f32];
    let spatial = Dim::nhwc(1, 2, 2, 1);
    run(ConvParams {
        general: General::new(NodeType::Conv, Tensor::f32(spatial, &x), TensorMut::f32(ONE, &mut y)),
        weights: Tensor::f32(spatial, &w),
        bias: Tensor::f32(ONE, &bias),
        pads: [0; 4],
        strides: [1, 1],
        dilations: [1, 1],
        ngroup: 1,
    })
    .unwrap();
    assert_eq!((x, w, bias), before);
    // 0.5 - 1 - 3 + 8 + 0.25
    assert_close(&y, &[4.75]);

    // With C present the scratch bias is left alone.
    let (a, b, c) = ([3u8, 5], [2u8, 4], [2i32]);
    let (a_scale, b_scale, y_scale) = ([0.5f32], [1.0f32], [1.0f32]);
    let (a_zp, zp) = ([1u8], [0u8]);
    let before = (a, b, c, a_scale, b_scale, y_scale, a_zp, zp);
    let mut scratch = [7i32; 2];
    let mut yq = [0u8];
    run(GemmIntegerParams {
        general: General::new(
            NodeType::GemmInteger,
            Tensor::u8(Dim::nhwc(1, 1, 1, 2), &a),
            TensorMut::u8(ONE, &mut yq),
        ),
        b: Tensor::u8(Dim::nhwc(1, 1, 2, 1), &b),
        c: Tensor::i32(ONE, &c),
        alpha: 1.0,
        beta: 1.0,
        trans_a: false,
        trans_b: false,
        a_quant: Quant::new(Tensor::f32(ONE, &a_scale), Tensor::u8(ONE, &a_zp)),
        b_quant: Quant::new(Tensor::f32(ONE, &b_scale), Tensor::u8(ONE, &zp)),
        y_quant: Quant::new(Tensor::f32(ONE, &y_scale), Tensor::u8(ONE, &zp)),
        bias_scratch: Some(&mut scratch),
    })
    .unwrap();
    assert_eq!((a, b, c, a_scale, b_scale, y_scale, a_zp, zp), before);
    assert_eq!(scratch, [7, 7]);
    // 0.5 * ((3 - 1) * 2 + (5 - 1) * 4 + 2)
    assert_eq!(yq, [11]);

    let ops = [[1.0f32, -1.0], [2.0, 0.5], [3.0, 0.25], [4.0, 0.125]];
    let before = ops;
    let mut sum = [0.0f32; 2];
    let dim = Dim::nhwc(1, 1, 1, 2);
    run(ArithParams {
        general: General::new(NodeType::ArithSum, Tensor::f32(dim, &ops[0]), TensorMut::f32(dim, &mut sum)),
        input2: Tensor::f32(dim, &ops[1]),
        input3: Tensor::f32(dim, &ops[2]),
        input4: Tensor::f32(dim, &ops[3]),
        num_of_inputs: 4,
    })
    .unwrap();
    assert_eq!(ops, before);
    assert_close(&sum, &[10.0, -0.125]);

    let xq = [130u8, 126];
    let (in_scale, in_zp) = ([0.5f32], [128u8]);
    let (out_scale, out_zp) = ([0.25f32], [-10i8]);
    let before = (xq, in_scale, in_zp, out_scale, out_zp);
    let mut requant = [0i8; 2];
    run(RequantizeParams {
        general: General::new(NodeType::RequantizeLinear, Tensor::u8(dim, &xq), TensorMut::i8(dim, &mut requant)),
        input_quant: Quant::new(Tensor::f32(ONE, &in_scale), Tensor::u8(ONE, &in_zp)),
        output_quant: Quant::new(Tensor::f32(ONE, &out_scale), Tensor::i8(ONE, &out_zp)),
    })
    .unwrap();
    assert_eq!((xq, in_scale, in_zp, out_scale, out_zp), before);
    assert_eq!(requant, [-6, -14]);
}

fn operand_sets() -> impl Strategy<Value = Vec<Vec<f32>>> {
    (2usize..=4, 1usize..8).prop_flat_map(|(count, len)| {
        prop::collection::vec(prop::collection::vec(-100.0f32..100.0, len), count)
    })
}

proptest! {
    #[test]
    fn prop_sum_matches_scalar_sum(operands in operand_sets()) {
        let len = operands[0].len();
        let dim = Dim::nhwc(1, 1, 1, len as u32);
        let t = |i: usize| operands.get(i).map_or(Tensor::null(), |v| Tensor::f32(dim, v));
        let mut y = vec![0.0f32; len];
        run(ArithParams {
            general: General::new(NodeType::ArithSum, t(0), TensorMut::f32(dim, &mut y)),
            input2: t(1),
            input3: t(2),
            input4: t(3),
            num_of_inputs: operands.len() as u32,
        })
        .unwrap();

        for (j, got) in y.iter().enumerate() {
            let expected: f32 = operands.iter().map(|v| v[j]).sum();
            prop_assert!((got - expected).abs() <= 1e-3, "{got} != {expected}");
        }
    }
}
