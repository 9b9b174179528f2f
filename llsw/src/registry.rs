//! Node type to dispatch function.
//!
//! The table is a closed `match`: a node type without an entry fails to
//! compile. Every entry takes the [`NodeParams`] union and checks that it
//! carries the struct its node type is dispatched with before doing anything
//! else.

use llsw_kernels::Forward;

use crate::dispatch::{activ, arith, batchnorm, float, integer};
use crate::error::{Error, Result};
use crate::ir::{BatchNormParams, Domain, NodeParams, NodeType, ParamsKind};

/// Signature shared by every dispatch entry.
pub type ForwardFn = fn(&mut NodeParams<'_>, &mut dyn Forward) -> Result<()>;

fn mismatch(params: &NodeParams<'_>) -> Error {
    let node = params.node_type();
    Error::ParamsMismatch {
        node,
        expected: node.params_kind(),
        found: params.kind(),
    }
}

fn batch_norm(p: &mut BatchNormParams<'_>, _lib: &mut dyn Forward) -> Result<()> {
    batchnorm::batch_norm(p)
}

macro_rules! entries {
    ($($name:ident: $variant:ident => $run:path;)*) => {
        $(
            fn $name(params: &mut NodeParams<'_>, lib: &mut dyn Forward) -> Result<()> {
                match params {
                    NodeParams::$variant(p) => $run(p, lib),
                    other => Err(mismatch(other)),
                }
            }
        )*
    };
}

entries! {
    run_conv: Conv => float::conv;
    run_conv_integer: ConvInteger => integer::conv_integer;
    run_gemm: Gemm => float::gemm;
    run_gemm_integer: GemmInteger => integer::gemm_integer;
    run_matmul: Matmul => float::matmul;
    run_qlinear_matmul: QLinearMatMul => integer::qlinear_matmul;
    run_pool: Pool => float::pool;
    run_pool_integer: PoolInteger => integer::pool_integer;
    run_global_pool: GlobalPool => float::global_pool;
    run_global_pool_integer: GlobalPoolInteger => integer::global_pool_integer;
    run_activ: Activ => activ::activ;
    run_activ_integer: ActivInteger => activ::activ_integer;
    run_arith: Arith => arith::arith;
    run_arith_integer: ArithInteger => arith::arith_integer;
    run_sign: Sign => float::sign;
    run_quantize: Quantize => integer::quantize_linear;
    run_dequantize: Dequantize => integer::dequantize_linear;
    run_requantize: Requantize => integer::requantize_linear;
    run_reduce: Reduce => arith::reduce;
    run_arg: Arg => float::arg;
    run_softmax: Softmax => float::softmax;
    run_softmax_integer: SoftmaxInteger => integer::softmax_integer;
    run_lp_norm: LpNorm => float::lp_norm;
    run_gather: Gather => float::gather;
    run_concat: Concat => float::concat;
    run_lrn: Lrn => float::lrn;
    run_instance_norm: InstanceNorm => float::instance_norm;
    run_batch_norm: BatchNorm => batch_norm;
    run_resize: Resize => float::resize;
    run_resize_integer: ResizeInteger => integer::resize_integer;
    run_tile: Tile => float::tile;
}

/// Dispatch entry of `node`. Every node type has exactly one.
pub fn lookup(node: NodeType) -> ForwardFn {
    match node.params_kind() {
        ParamsKind::Conv => run_conv,
        ParamsKind::ConvInteger => run_conv_integer,
        ParamsKind::Gemm => run_gemm,
        ParamsKind::GemmInteger => run_gemm_integer,
        ParamsKind::Matmul => run_matmul,
        ParamsKind::QLinearMatMul => run_qlinear_matmul,
        ParamsKind::Pool => run_pool,
        ParamsKind::PoolInteger => run_pool_integer,
        ParamsKind::GlobalPool => run_global_pool,
        ParamsKind::GlobalPoolInteger => run_global_pool_integer,
        ParamsKind::Activ => run_activ,
        ParamsKind::ActivInteger => run_activ_integer,
        ParamsKind::Arith => run_arith,
        ParamsKind::ArithInteger => run_arith_integer,
        ParamsKind::Sign => run_sign,
        ParamsKind::Quantize => run_quantize,
        ParamsKind::Dequantize => run_dequantize,
        ParamsKind::Requantize => run_requantize,
        ParamsKind::Reduce => run_reduce,
        ParamsKind::Arg => run_arg,
        ParamsKind::Softmax => run_softmax,
        ParamsKind::SoftmaxInteger => run_softmax_integer,
        ParamsKind::LpNorm => run_lp_norm,
        ParamsKind::Gather => run_gather,
        ParamsKind::Concat => run_concat,
        ParamsKind::Lrn => run_lrn,
        ParamsKind::InstanceNorm => run_instance_norm,
        ParamsKind::BatchNorm => run_batch_norm,
        ParamsKind::Resize => run_resize,
        ParamsKind::ResizeInteger => run_resize_integer,
        ParamsKind::Tile => run_tile,
    }
}

/// Float-domain table.
pub fn float_forward(node: NodeType) -> Option<ForwardFn> {
    (node.domain() == Domain::Float).then(|| lookup(node))
}

/// Integer-domain table.
pub fn integer_forward(node: NodeType) -> Option<ForwardFn> {
    (node.domain() == Domain::Integer).then(|| lookup(node))
}

/// Resolves the entry for the node type in `params` and runs it.
pub fn forward(params: &mut NodeParams<'_>, lib: &mut dyn Forward) -> Result<()> {
    let node = params.node_type();
    log::trace!("dispatching {} ({:?} domain)", node.name(), node.domain());
    lookup(node)(params, lib)
}
