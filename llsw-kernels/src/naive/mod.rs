//! Naive reference implementations - correct but slow.
//! Every [`LayerOp`] symbol has one here; use them for testing and as a
//! baseline for optimised backends.

mod conv;
mod elementwise;
mod linalg;
mod norm;
mod pool;
mod reduce;
mod shape;
mod view;

use crate::error::KernelError;
use crate::layer::{operand, Layer, LayerOp, Shape, TensorObj};
use view::{FIn, FOut, QIn, QOut};

/// Runs one layer.
pub fn forward(layer: Layer<'_>) -> Result<(), KernelError> {
    let Layer {
        op,
        inputs,
        weights,
        mut output,
    } = layer;
    let out = &mut output;

    match op {
        // --------------------------------------------------------------------
        // Convolution & matrices
        // --------------------------------------------------------------------
        LayerOp::Conv2d(args) => conv::conv2d(&args, &inputs, &weights, out),
        LayerOp::Conv2dInteger { strategy, conv } => {
            conv::conv2d_integer(strategy, &conv, &inputs, &weights, out)
        }
        LayerOp::Gemm(args) => linalg::gemm(&args, &inputs, &weights, out),
        LayerOp::GemmInteger(args) => linalg::gemm_integer(&args, &inputs, &weights, out),
        LayerOp::MatMul => linalg::matmul(&inputs, out),
        LayerOp::QLinearMatMul => linalg::qlinear_matmul(&inputs, &weights, out),

        // --------------------------------------------------------------------
        // Pooling
        // --------------------------------------------------------------------
        LayerOp::Pool(args) => pool::pool(&args, &f_in(&inputs, 0)?, &mut FOut::new(out)?),
        LayerOp::PoolInteger(args) => {
            pool::pool(&args, &q_in(&inputs, 0)?, &mut QOut::new(out)?)
        }

        // --------------------------------------------------------------------
        // Element-wise
        // --------------------------------------------------------------------
        LayerOp::Activ { func, args } => {
            elementwise::activ(func, &args, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::ActivInteger { func, args } => {
            elementwise::activ(func, &args, &q_in(&inputs, 0)?, &mut QOut::new(out)?)
        }
        LayerOp::PRelu => {
            let slope = FIn::new(operand(&weights, "weight", 0)?)?;
            elementwise::prelu(&f_in(&inputs, 0)?, &slope, &mut FOut::new(out)?)
        }
        LayerOp::Eltwise { op } => elementwise::eltwise(
            op,
            &f_in(&inputs, 0)?,
            &f_in(&inputs, 1)?,
            &mut FOut::new(out)?,
        ),
        LayerOp::EltwiseInteger { op } => elementwise::eltwise(
            op,
            &q_in(&inputs, 0)?,
            &q_in(&inputs, 1)?,
            &mut QOut::new(out)?,
        ),
        LayerOp::SumN => {
            let mut terms = heapless::Vec::<FIn<'_>, { crate::MAX_CHAIN }>::new();
            for t in inputs.iter() {
                // Capacities match, push cannot fail.
                let _ = terms.push(FIn::new(t)?);
            }
            elementwise::sum_n(&terms, &mut FOut::new(out)?)
        }
        LayerOp::Sign => elementwise::sign(&f_in(&inputs, 0)?, &mut FOut::new(out)?),
        LayerOp::QuantizeLinear => elementwise::convert(&f_in(&inputs, 0)?, &mut QOut::new(out)?),
        LayerOp::DequantizeLinear => {
            elementwise::convert(&q_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::RequantizeLinear => {
            elementwise::convert(&q_in(&inputs, 0)?, &mut QOut::new(out)?)
        }

        // --------------------------------------------------------------------
        // Reductions & normalisation along an axis
        // --------------------------------------------------------------------
        LayerOp::Reduce { op, neutral, axis } => {
            reduce::reduce(op, neutral, axis, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::ReduceLogSumExp { axis } => {
            reduce::log_sum_exp(axis, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::Softmax { axis } => {
            reduce::softmax(axis, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::SoftmaxInteger { axis } => {
            reduce::softmax(axis, &q_in(&inputs, 0)?, &mut QOut::new(out)?)
        }
        LayerOp::Hardmax { axis } => {
            reduce::hardmax(axis, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::ArgReduce {
            kind,
            axis,
            select_last_index,
        } => reduce::arg_reduce(kind, axis, select_last_index, &f_in(&inputs, 0)?, out),
        LayerOp::LpNorm { axis, p } => {
            reduce::lp_norm(axis, p, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::Lrn(args) => norm::lrn(&args, &f_in(&inputs, 0)?, &mut FOut::new(out)?),
        LayerOp::InstanceNorm { epsilon } => {
            let scale = FIn::new(operand(&weights, "weight", 0)?)?;
            let bias = FIn::new(operand(&weights, "weight", 1)?)?;
            norm::instance_norm(epsilon, &f_in(&inputs, 0)?, &scale, &bias, &mut FOut::new(out)?)
        }

        // --------------------------------------------------------------------
        // Data movement
        // --------------------------------------------------------------------
        LayerOp::Resize { mode, scale } => {
            shape::resize(mode, scale, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::ResizeInteger { mode, scale } => {
            shape::resize(mode, scale, &q_in(&inputs, 0)?, &mut QOut::new(out)?)
        }
        LayerOp::Upsample { scale } => {
            shape::upsample_zeros(scale, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
        LayerOp::UpsampleInteger { scale } => {
            shape::upsample_zeros(scale, &q_in(&inputs, 0)?, &mut QOut::new(out)?)
        }
        LayerOp::Concat { axis } => {
            let mut parts = heapless::Vec::<FIn<'_>, { crate::MAX_CHAIN }>::new();
            for t in inputs.iter() {
                let _ = parts.push(FIn::new(t)?);
            }
            shape::concat(axis, &parts, &mut FOut::new(out)?)
        }
        LayerOp::Gather { axis } => {
            shape::gather(axis, &f_in(&inputs, 0)?, operand(&inputs, "input", 1)?, &mut FOut::new(out)?)
        }
        LayerOp::Tile { repeats } => {
            shape::tile(repeats, &f_in(&inputs, 0)?, &mut FOut::new(out)?)
        }
    }
}

fn f_in<'a>(chain: &[TensorObj<'a>], index: usize) -> Result<FIn<'a>, KernelError> {
    FIn::new(operand(chain, "input", index)?)
}

fn q_in<'a>(chain: &[TensorObj<'a>], index: usize) -> Result<QIn<'a>, KernelError> {
    QIn::new(operand(chain, "input", index)?, "input")
}

pub(crate) fn same_shape(a: &Shape, b: &Shape, what: &'static str) -> Result<(), KernelError> {
    if a != b {
        return Err(KernelError::ShapeMismatch(what));
    }
    Ok(())
}
