//! Activation selection: node kind to kernel function plus its parameters.

use llsw_kernels::{ActivArgs, ActivFn, Forward, Layer, LayerOp};

use super::{input, output, quantized, quantized_output, submit};
use crate::axis::shape_axis;
use crate::error::{Error, Result};
use crate::ir::{ActivIntegerParams, ActivParams, NodeType};

fn float_fn(node: NodeType) -> Option<ActivFn> {
    let func = match node {
        NodeType::ActivRelu => ActivFn::Relu,
        NodeType::ActivElu => ActivFn::Elu,
        NodeType::ActivThresholdedRelu => ActivFn::ThresholdedRelu,
        NodeType::ActivSelu => ActivFn::Selu,
        NodeType::ActivLeakyRelu => ActivFn::LeakyRelu,
        NodeType::ActivClip => ActivFn::Clip,
        NodeType::ActivAbs => ActivFn::Abs,
        NodeType::ActivAcos => ActivFn::Acos,
        NodeType::ActivAcosh => ActivFn::Acosh,
        NodeType::ActivAsin => ActivFn::Asin,
        NodeType::ActivAsinh => ActivFn::Asinh,
        NodeType::ActivAtan => ActivFn::Atan,
        NodeType::ActivAtanh => ActivFn::Atanh,
        NodeType::ActivCos => ActivFn::Cos,
        NodeType::ActivCosh => ActivFn::Cosh,
        NodeType::ActivSin => ActivFn::Sin,
        NodeType::ActivSinh => ActivFn::Sinh,
        NodeType::ActivTan => ActivFn::Tan,
        NodeType::ActivTanh => ActivFn::Tanh,
        NodeType::ActivSigmoid => ActivFn::Sigmoid,
        NodeType::ActivSoftsign => ActivFn::Softsign,
        NodeType::ActivSoftplus => ActivFn::Softplus,
        NodeType::ActivHardSigmoid => ActivFn::HardSigmoid,
        NodeType::ActivHardSwish => ActivFn::HardSwish,
        NodeType::ActivGelu => ActivFn::Gelu,
        NodeType::ActivCeil => ActivFn::Ceil,
        NodeType::ActivFloor => ActivFn::Floor,
        NodeType::ActivRound => ActivFn::Round,
        NodeType::ActivExp => ActivFn::Exp,
        NodeType::ActivLog => ActivFn::Log,
        NodeType::ActivNeg => ActivFn::Neg,
        NodeType::ActivNot => ActivFn::Not,
        NodeType::ActivReciprocal => ActivFn::Reciprocal,
        NodeType::ActivSqrt => ActivFn::Sqrt,
        NodeType::ActivErf => ActivFn::Erf,
        _ => return None,
    };
    Some(func)
}

/// Parameter array for a float activation.
fn float_args(func: ActivFn, p: &ActivParams<'_>) -> ActivArgs {
    match func {
        ActivFn::Elu | ActivFn::ThresholdedRelu | ActivFn::LeakyRelu => ActivArgs::one(p.alpha),
        // beta carries gamma
        ActivFn::Selu => ActivArgs::two(p.alpha, p.beta),
        ActivFn::Clip => ActivArgs::two(p.min, p.max),
        ActivFn::HardSigmoid => ActivArgs::two(p.alpha, p.beta),
        _ => ActivArgs::NONE,
    }
}

pub fn activ(p: &mut ActivParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let x = input(node, "input", &p.general.input)?;

    let op = match node {
        NodeType::ActivPRelu => {
            let slope = input(node, "slope", &p.slope)?;
            let y = output(node, &mut p.general.output)?;
            let layer = Layer::new(LayerOp::PRelu, y)
                .with_input(x)?
                .with_weight(slope)?;
            return submit(node, lib, layer);
        }
        NodeType::ActivHardmax => LayerOp::Hardmax {
            axis: shape_axis(p.axis)?,
        },
        other => {
            let func = float_fn(other).ok_or(Error::UnsupportedOperator(other))?;
            LayerOp::Activ {
                func,
                args: float_args(func, p),
            }
        }
    };

    let y = output(node, &mut p.general.output)?;
    submit(node, lib, Layer::new(op, y).with_input(x)?)
}

pub fn activ_integer(p: &mut ActivIntegerParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = p.general.node_type;
    let (func, args) = match node {
        NodeType::ActivReluInteger => (ActivFn::Relu, ActivArgs::NONE),
        NodeType::ActivLeakyReluInteger => (ActivFn::LeakyRelu, ActivArgs::one(p.alpha)),
        NodeType::ActivClipInteger => (ActivFn::Clip, ActivArgs::two(p.min, p.max)),
        NodeType::ActivSigmoidInteger => (ActivFn::Sigmoid, ActivArgs::NONE),
        NodeType::ActivTanhInteger => (ActivFn::Tanh, ActivArgs::NONE),
        other => return Err(Error::UnsupportedOperator(other)),
    };

    let x = quantized(node, "input", &p.general.input, &p.input_quant)?;
    let out_quant = p.output_quant;
    let y = quantized_output(node, &mut p.general.output, &out_quant)?;
    submit(
        node,
        lib,
        Layer::new(LayerOp::ActivInteger { func, args }, y).with_input(x)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::recorder::Recorder;
    use crate::ir::{Dim, General, Quant, Tensor, TensorMut};
    use llsw_kernels::{Axis, Reference};

    fn params<'a>(node: NodeType, x: &'a [f32], y: &'a mut [f32]) -> ActivParams<'a> {
        let dim = Dim::nhwc(1, 1, 1, x.len() as u32);
        ActivParams {
            general: General::new(node, Tensor::f32(dim, x), TensorMut::f32(dim, y)),
            alpha: 0.1,
            beta: 1.5,
            min: -1.0,
            max: 1.0,
            axis: 1,
            slope: Tensor::null(),
        }
    }

    #[test]
    fn test_every_float_kind_selects_a_kernel() {
        let x = [0.5f32];
        for &node in NodeType::ALL {
            if node.params_kind() != crate::ir::ParamsKind::Activ || node == NodeType::ActivPRelu {
                continue;
            }
            let mut y = [0.0f32];
            let mut lib = Recorder::default();
            activ(&mut params(node, &x, &mut y), &mut lib).unwrap();
            assert_eq!(lib.calls.len(), 1, "{node:?}");
        }
    }

    #[test]
    fn test_parameter_arrays() {
        let x = [0.5f32];
        let mut y = [0.0f32];
        let mut lib = Recorder::default();
        activ(&mut params(NodeType::ActivClip, &x, &mut y), &mut lib).unwrap();
        assert_eq!(
            lib.only().op,
            LayerOp::Activ {
                func: ActivFn::Clip,
                args: ActivArgs::two(-1.0, 1.0)
            }
        );

        let mut lib = Recorder::default();
        activ(&mut params(NodeType::ActivSelu, &x, &mut y), &mut lib).unwrap();
        assert_eq!(
            lib.only().op,
            LayerOp::Activ {
                func: ActivFn::Selu,
                args: ActivArgs::two(0.1, 1.5)
            }
        );

        let mut lib = Recorder::default();
        activ(&mut params(NodeType::ActivSqrt, &x, &mut y), &mut lib).unwrap();
        assert_eq!(lib.only().symbol, "forward_sqrt");
    }

    #[test]
    fn test_hardmax_axis_checked() {
        let x = [0.5f32, 2.0];
        let mut y = [0.0f32; 2];
        let mut p = params(NodeType::ActivHardmax, &x, &mut y);
        let mut lib = Recorder::default();
        activ(&mut p, &mut lib).unwrap();
        assert_eq!(
            lib.only().op,
            LayerOp::Hardmax {
                axis: Axis::Channel
            }
        );

        p.axis = 7;
        assert_eq!(
            activ(&mut p, &mut Recorder::default()),
            Err(Error::InvalidAxis(7))
        );
    }

    #[test]
    fn test_prelu_needs_slope() {
        let x = [-2.0f32, 4.0];
        let slope = [0.25f32];
        let mut y = [0.0f32; 2];
        let mut p = params(NodeType::ActivPRelu, &x, &mut y);
        assert_eq!(
            activ(&mut p, &mut Recorder::default()),
            Err(Error::MissingTensor {
                node: NodeType::ActivPRelu,
                tensor: "slope"
            })
        );
        p.slope = Tensor::f32(Dim::nhwc(1, 1, 1, 1), &slope);
        activ(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [-0.5, 4.0]);
    }

    #[test]
    fn test_non_activation_rejected() {
        let x = [0.5f32];
        let mut y = [0.0f32];
        assert_eq!(
            activ(&mut params(NodeType::Sign, &x, &mut y), &mut Recorder::default()),
            Err(Error::UnsupportedOperator(NodeType::Sign))
        );
    }

    #[test]
    fn test_integer_relu_threads_quantization() {
        let x = [100u8, 140];
        let mut y = [0u8; 2];
        let scale = [0.5f32];
        let zp = [128u8];
        let dim = Dim::nhwc(1, 1, 1, 2);
        let one = Dim::nhwc(1, 1, 1, 1);
        let quant = Quant::new(Tensor::f32(one, &scale), Tensor::u8(one, &zp));
        let mut p = ActivIntegerParams {
            general: General::new(
                NodeType::ActivReluInteger,
                Tensor::u8(dim, &x),
                TensorMut::u8(dim, &mut y),
            ),
            alpha: 0.0,
            min: 0.0,
            max: 0.0,
            input_quant: quant,
            output_quant: quant,
        };
        let mut lib = Recorder::default();
        activ_integer(&mut p, &mut lib).unwrap();
        let call = lib.only();
        assert_eq!(call.symbol, "forward_relu_integer");
        assert_eq!(call.inputs[0].intq.unwrap().first_scale, 0.5);
        assert!(call.output.intq.is_some());

        activ_integer(&mut p, &mut Reference).unwrap();
        drop(p);
        assert_eq!(y, [128, 140]);
    }
}
