//! Kernels that work along one axis: reductions, softmax/hardmax,
//! arg-min/max and Lp normalisation.

use libm::{expf, fabsf, fmaxf, logf, sqrtf};

use super::same_shape;
use super::view::{Dst, FIn, Src};
use crate::error::KernelError;
use crate::layer::{ArgKind, Axis, Coord, Coords, Shape, TensorObjMut};
use crate::math::BinaryOp;

/// One coordinate per lane along `axis`, with that axis pinned to 0.
fn lanes(shape: &Shape, axis: Axis) -> Coords {
    shape.with(axis, 1).coords()
}

#[inline]
fn along(mut at: Coord, axis: Axis, k: usize) -> Coord {
    at[axis.index()] = k;
    at
}

fn check_reduced(x: &Shape, y: &Shape, axis: Axis) -> Result<(), KernelError> {
    if *y != x.with(axis, 1) {
        return Err(KernelError::ShapeMismatch("reduced axis must have length 1 in the output"));
    }
    Ok(())
}

fn lane_max(x: &impl Src, base: Coord, axis: Axis, len: usize) -> f32 {
    (0..len)
        .map(|k| x.read(along(base, axis, k)))
        .fold(f32::NEG_INFINITY, fmaxf)
}

/// Folds `op` over `axis`, starting from `neutral`.
pub(super) fn reduce(
    op: BinaryOp,
    neutral: f32,
    axis: Axis,
    x: &impl Src,
    y: &mut impl Dst,
) -> Result<(), KernelError> {
    let xs = x.shape();
    check_reduced(&xs, &y.shape(), axis)?;
    let len = xs.get(axis);
    for base in lanes(&xs, axis) {
        let acc = (0..len).fold(neutral, |acc, k| op.apply(acc, x.read(along(base, axis, k))));
        y.write(base, acc);
    }
    Ok(())
}

pub(super) fn log_sum_exp(axis: Axis, x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let xs = x.shape();
    check_reduced(&xs, &y.shape(), axis)?;
    let len = xs.get(axis);
    for base in lanes(&xs, axis) {
        let m = lane_max(x, base, axis, len);
        let sum: f32 = (0..len).map(|k| expf(x.read(along(base, axis, k)) - m)).sum();
        y.write(base, m + logf(sum));
    }
    Ok(())
}

pub(super) fn softmax(axis: Axis, x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let xs = x.shape();
    same_shape(&xs, &y.shape(), "softmax input vs output")?;
    let len = xs.get(axis);
    for base in lanes(&xs, axis) {
        let m = lane_max(x, base, axis, len);
        let sum: f32 = (0..len).map(|k| expf(x.read(along(base, axis, k)) - m)).sum();
        for k in 0..len {
            let at = along(base, axis, k);
            y.write(at, expf(x.read(at) - m) / sum);
        }
    }
    Ok(())
}

/// One-hot of the first maximum along `axis`.
pub(super) fn hardmax(axis: Axis, x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let xs = x.shape();
    same_shape(&xs, &y.shape(), "hardmax input vs output")?;
    let len = xs.get(axis);
    for base in lanes(&xs, axis) {
        let winner = arg_best(ArgKind::Max, false, (0..len).map(|k| x.read(along(base, axis, k))));
        for k in 0..len {
            y.write(along(base, axis, k), if k == winner { 1.0 } else { 0.0 });
        }
    }
    Ok(())
}

fn arg_best(kind: ArgKind, select_last_index: bool, values: impl Iterator<Item = f32>) -> usize {
    let mut best = 0;
    let mut best_val = match kind {
        ArgKind::Max => f32::NEG_INFINITY,
        ArgKind::Min => f32::INFINITY,
    };
    for (k, v) in values.enumerate() {
        let better = match kind {
            ArgKind::Max => v > best_val,
            ArgKind::Min => v < best_val,
        };
        if better || (select_last_index && v == best_val) {
            best = k;
            best_val = v;
        }
    }
    best
}

/// Writes the index of the extreme value along `axis` as an index-typed
/// (`I64` or `I32`) output.
pub(super) fn arg_reduce(
    kind: ArgKind,
    axis: Axis,
    select_last_index: bool,
    x: &FIn<'_>,
    out: &mut TensorObjMut<'_>,
) -> Result<(), KernelError> {
    check_reduced(&x.shape, &out.shape, axis)?;
    let len = x.shape.get(axis);
    let stride = out.stride;
    for base in lanes(&x.shape, axis) {
        let k = arg_best(
            kind,
            select_last_index,
            (0..len).map(|k| x.read(along(base, axis, k))),
        );
        out.data.store_index(stride.offset(base), k as i64)?;
    }
    Ok(())
}

pub(super) fn lp_norm(axis: Axis, p: u32, x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    if p != 1 && p != 2 {
        return Err(KernelError::Unsupported("lp normalisation with p other than 1 or 2"));
    }
    let xs = x.shape();
    same_shape(&xs, &y.shape(), "lp norm input vs output")?;
    let len = xs.get(axis);
    for base in lanes(&xs, axis) {
        let values = (0..len).map(|k| x.read(along(base, axis, k)));
        let norm = if p == 1 {
            values.map(fabsf).sum::<f32>()
        } else {
            sqrtf(values.map(|v| v * v).sum::<f32>())
        };
        for k in 0..len {
            let at = along(base, axis, k);
            let v = if norm == 0.0 { 0.0 } else { x.read(at) / norm };
            y.write(at, v);
        }
    }
    Ok(())
}
