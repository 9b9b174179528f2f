//! Element-wise arithmetic and reductions: the two operator selection tables
//! and the dispatch functions built on them.

use llsw_kernels::{BinaryOp, Forward, Layer, LayerOp};

use super::{input, output, quantized, quantized_output, submit};
use crate::axis::shape_axis;
use crate::error::{Error, Result};
use crate::ir::{ArithIntegerParams, ArithParams, NodeType, ReduceParams};

// ============================================================================
// Selection tables
// ============================================================================

/// Binary operator of an arithmetic node, float or integer.
pub fn binary_op(node: NodeType) -> Option<BinaryOp> {
    let op = match node {
        NodeType::ArithAdd | NodeType::ArithSum | NodeType::ArithAddInteger => BinaryOp::Add,
        NodeType::ArithSub | NodeType::ArithSubInteger => BinaryOp::Sub,
        NodeType::ArithMul | NodeType::ArithMulInteger => BinaryOp::Mul,
        NodeType::ArithDiv | NodeType::ArithDivInteger => BinaryOp::Div,
        NodeType::ArithPow => BinaryOp::Pow,
        NodeType::ArithGreater => BinaryOp::Greater,
        NodeType::ArithGreaterOrEqual => BinaryOp::GreaterOrEqual,
        NodeType::ArithLess => BinaryOp::Less,
        NodeType::ArithLessOrEqual => BinaryOp::LessOrEqual,
        NodeType::ArithEqual => BinaryOp::Equal,
        NodeType::ArithMin => BinaryOp::Min,
        NodeType::ArithMax => BinaryOp::Max,
        NodeType::ArithMod => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

/// Fold operator and its starting value for a generic reduction.
///
/// `ReduceProd` shares the max entry (`Max`, `0.0`), as the deployed
/// runtime does.
pub fn reduce_op(node: NodeType) -> Option<(BinaryOp, f32)> {
    let entry = match node {
        NodeType::ReduceSum => (BinaryOp::Add, 0.0),
        NodeType::ReduceMin => (BinaryOp::Min, f32::MAX),
        NodeType::ReduceMax | NodeType::ReduceProd => (BinaryOp::Max, 0.0),
        _ => return None,
    };
    Some(entry)
}

// ============================================================================
// Dispatch
// ============================================================================

pub fn arith(p: &mut ArithParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let op = binary_op(node).ok_or(Error::UnsupportedOperator(node))?;
    let count = p.num_of_inputs as usize;

    let layer_op = match (node, count) {
        (_, 2) => LayerOp::Eltwise { op },
        (NodeType::ArithSum, 3 | 4) => LayerOp::SumN,
        _ => return Err(Error::OperandCount { node, count }),
    };

    let x = input(node, "input", &p.general.input)?;
    let x2 = input(node, "input2", &p.input2)?;
    let y = output(node, &mut p.general.output)?;
    let mut layer = Layer::new(layer_op, y).with_input(x)?.with_input(x2)?;
    if count >= 3 {
        layer = layer.with_input(input(node, "input3", &p.input3)?)?;
    }
    if count == 4 {
        layer = layer.with_input(input(node, "input4", &p.input4)?)?;
    }
    submit(node, lib, layer)
}

pub fn arith_integer(p: &mut ArithIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let op = match node {
        NodeType::ArithAddInteger
        | NodeType::ArithSubInteger
        | NodeType::ArithMulInteger
        | NodeType::ArithDivInteger => binary_op(node),
        _ => None,
    }
    .ok_or(Error::UnsupportedOperator(node))?;

    let a = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let b = quantized(node, "input2", &p.input2, &p.input2_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    let layer = Layer::new(LayerOp::EltwiseInteger { op }, y)
        .with_input(a)?
        .with_input(b)?;
    submit(node, lib, layer)
}

pub fn reduce(p: &mut ReduceParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let axis = shape_axis(p.axis)?;
    let op = if node == NodeType::ReduceLogSumExp {
        LayerOp::ReduceLogSumExp { axis }
    } else {
        let (op, neutral) = reduce_op(node).ok_or(Error::UnsupportedOperator(node))?;
        if node == NodeType::ReduceProd {
            log::warn!("ReduceProd runs as a max reduction with neutral 0.0");
        }
        LayerOp::Reduce { op, neutral, axis }
    };

    let x = input(node, "input", &p.general.input)?;
    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(op, y).with_input(x)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::recorder::Recorder;
    use crate::ir::{Dim, General, Tensor, TensorMut};
    use llsw_kernels::{Axis, Reference};

    fn arith_params<'a>(
        node: NodeType,
        operands: &[&'a [f32]],
        y: &'a mut [f32],
    ) -> ArithParams<'a> {
        let dim = Dim::nhwc(1, 1, 1, y.len() as u32);
        let t = |i: usize| operands.get(i).map_or(Tensor::null(), |&d| Tensor::f32(dim, d));
        ArithParams {
            general: General::new(node, t(0), TensorMut::f32(dim, y)),
            input2: t(1),
            input3: t(2),
            input4: t(3),
            num_of_inputs: operands.len() as u32,
        }
    }

    #[test]
    fn test_binary_table_covers_arith_kinds() {
        for &node in NodeType::ALL {
            let is_arith = matches!(
                node.params_kind(),
                crate::ir::ParamsKind::Arith | crate::ir::ParamsKind::ArithInteger
            );
            assert_eq!(binary_op(node).is_some(), is_arith, "{node:?}");
        }
        assert_eq!(binary_op(NodeType::ArithSum), Some(BinaryOp::Add));
    }

    #[test]
    fn test_reduce_table() {
        assert_eq!(reduce_op(NodeType::ReduceSum), Some((BinaryOp::Add, 0.0)));
        assert_eq!(reduce_op(NodeType::ReduceMin), Some((BinaryOp::Min, f32::MAX)));
        assert_eq!(reduce_op(NodeType::ReduceProd), reduce_op(NodeType::ReduceMax));
        assert_eq!(reduce_op(NodeType::ReduceLogSumExp), None);
    }

    #[test]
    fn test_two_operands_take_binary_path() {
        let (a, b) = ([1.0f32, 2.0], [3.0f32, 5.0]);
        let mut y = [0.0f32; 2];
        let mut lib = Recorder::default();
        arith(&mut arith_params(NodeType::ArithDiv, &[&a, &b], &mut y), &mut lib).unwrap();
        assert_eq!(lib.only().op, LayerOp::Eltwise { op: BinaryOp::Div });
        assert_eq!(lib.only().inputs.len(), 2);
    }

    #[test]
    fn test_sum_takes_variadic_path() {
        let (a, b, c, d) = ([1.0f32], [2.0f32], [3.0f32], [4.0f32]);
        let mut y = [0.0f32];
        let mut lib = Recorder::default();
        arith(
            &mut arith_params(NodeType::ArithSum, &[&a, &b, &c, &d], &mut y),
            &mut lib,
        )
        .unwrap();
        assert_eq!(lib.only().op, LayerOp::SumN);
        assert_eq!(lib.only().inputs.len(), 4);

        arith(
            &mut arith_params(NodeType::ArithSum, &[&a, &b, &c], &mut y),
            &mut Reference,
        )
        .unwrap();
        assert_eq!(y, [6.0]);
    }

    #[test]
    fn test_operand_count_outside_law_rejected() {
        let (a, b, c) = ([1.0f32], [2.0f32], [3.0f32]);
        let mut y = [0.0f32];
        assert_eq!(
            arith(
                &mut arith_params(NodeType::ArithAdd, &[&a, &b, &c], &mut y),
                &mut Recorder::default()
            ),
            Err(Error::OperandCount {
                node: NodeType::ArithAdd,
                count: 3
            })
        );
        assert_eq!(
            arith(
                &mut arith_params(NodeType::ArithSum, &[&a], &mut y),
                &mut Recorder::default()
            ),
            Err(Error::OperandCount {
                node: NodeType::ArithSum,
                count: 1
            })
        );
        assert_eq!(
            arith(
                &mut arith_params(NodeType::ArithSum, &[], &mut y),
                &mut Recorder::default()
            ),
            Err(Error::OperandCount {
                node: NodeType::ArithSum,
                count: 0
            })
        );
    }

    #[test]
    fn test_sum_count_beyond_supplied_operands() {
        let (a, b) = ([1.0f32], [2.0f32]);
        let mut y = [0.0f32];
        let mut p = arith_params(NodeType::ArithSum, &[&a, &b], &mut y);
        p.num_of_inputs = 3;
        let mut lib = Recorder::default();
        assert_eq!(
            arith(&mut p, &mut lib),
            Err(Error::MissingTensor {
                node: NodeType::ArithSum,
                tensor: "input3"
            })
        );
        assert!(lib.calls.is_empty());
    }

    #[test]
    fn test_reduce_axis_and_prod_mapping() {
        let x = [1.0f32, 2.0, 3.0];
        let mut y = [0.0f32];
        let mut p = ReduceParams {
            general: General::new(
                NodeType::ReduceProd,
                Tensor::f32(Dim::nhwc(1, 1, 1, 3), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
            ),
            axis: 1,
        };
        let mut lib = Recorder::default();
        reduce(&mut p, &mut lib).unwrap();
        assert_eq!(
            lib.only().op,
            LayerOp::Reduce {
                op: BinaryOp::Max,
                neutral: 0.0,
                axis: Axis::Channel
            }
        );
        reduce(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [3.0]);
    }

    #[test]
    fn test_log_sum_exp_has_its_own_kernel() {
        let x = [0.0f32, 0.0];
        let mut y = [0.0f32];
        let mut p = ReduceParams {
            general: General::new(
                NodeType::ReduceLogSumExp,
                Tensor::f32(Dim::nhwc(1, 1, 1, 2), &x),
                TensorMut::f32(Dim::nhwc(1, 1, 1, 1), &mut y),
            ),
            axis: 1,
        };
        let mut lib = Recorder::default();
        reduce(&mut p, &mut lib).unwrap();
        assert_eq!(lib.only().symbol, "forward_reduce_log_sum_exp");
    }
}
