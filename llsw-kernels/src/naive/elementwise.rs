//! Element-wise kernels: activations, binary operators with broadcasting,
//! n-ary sum and domain conversion.

use super::same_shape;
use super::view::{Dst, FIn, Src};
use crate::error::KernelError;
use crate::layer::{Coord, Shape};
use crate::math::{ActivArgs, ActivFn, BinaryOp};

/// Maps `at` of the output onto an operand that may have size-1 axes.
#[inline]
fn broadcast(at: Coord, shape: &Shape) -> Coord {
    let dims = shape.dims();
    core::array::from_fn(|i| if dims[i] == 1 { 0 } else { at[i] })
}

fn check_broadcast(src: &Shape, out: &Shape) -> Result<(), KernelError> {
    let ok = src
        .dims()
        .iter()
        .zip(out.dims())
        .all(|(&s, o)| s == o || s == 1);
    if !ok {
        return Err(KernelError::ShapeMismatch("operand does not broadcast to output"));
    }
    Ok(())
}

fn map(x: &impl Src, y: &mut impl Dst, f: impl Fn(f32) -> f32) -> Result<(), KernelError> {
    same_shape(&x.shape(), &y.shape(), "element-wise input vs output")?;
    for at in y.shape().coords() {
        y.write(at, f(x.read(at)));
    }
    Ok(())
}

pub(super) fn activ(
    func: ActivFn,
    args: &ActivArgs,
    x: &impl Src,
    y: &mut impl Dst,
) -> Result<(), KernelError> {
    if args.len() != func.arity() {
        return Err(KernelError::ParamCount {
            func: func.symbol(),
            expected: func.arity(),
            found: args.len(),
        });
    }
    map(x, y, |v| func.eval(v, args))
}

/// Parametric ReLU; `slope` broadcasts against the input.
pub(super) fn prelu(x: &FIn<'_>, slope: &FIn<'_>, y: &mut impl Dst) -> Result<(), KernelError> {
    same_shape(&x.shape, &y.shape(), "prelu input vs output")?;
    check_broadcast(&slope.shape, &x.shape)?;
    for at in x.shape.coords() {
        let v = x.read(at);
        let out = if v >= 0.0 {
            v
        } else {
            slope.read(broadcast(at, &slope.shape)) * v
        };
        y.write(at, out);
    }
    Ok(())
}

pub(super) fn eltwise(
    op: BinaryOp,
    a: &impl Src,
    b: &impl Src,
    y: &mut impl Dst,
) -> Result<(), KernelError> {
    let (sa, sb, sy) = (a.shape(), b.shape(), y.shape());
    check_broadcast(&sa, &sy)?;
    check_broadcast(&sb, &sy)?;
    for at in sy.coords() {
        let v = op.apply(a.read(broadcast(at, &sa)), b.read(broadcast(at, &sb)));
        y.write(at, v);
    }
    Ok(())
}

/// Sum over every tensor in the chain.
pub(super) fn sum_n(terms: &[FIn<'_>], y: &mut impl Dst) -> Result<(), KernelError> {
    if terms.is_empty() {
        return Err(KernelError::MissingOperand {
            chain: "input",
            index: 0,
        });
    }
    let sy = y.shape();
    for t in terms {
        check_broadcast(&t.shape, &sy)?;
    }
    for at in sy.coords() {
        let v: f32 = terms.iter().map(|t| t.read(broadcast(at, &t.shape))).sum();
        y.write(at, v);
    }
    Ok(())
}

pub(super) fn sign(x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    map(x, y, |v| {
        if v > 0.0 {
            1.0
        } else if v < 0.0 {
            -1.0
        } else {
            0.0
        }
    })
}

/// Copies values across numeric domains: quantize, dequantize or requantize
/// depending on the views passed in.
pub(super) fn convert(x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    map(x, y, |v| v)
}
