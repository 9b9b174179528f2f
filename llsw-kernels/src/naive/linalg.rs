//! Matrix kernels (naive). Tensors are read as matrices with
//! `rows = n * h * w` and `cols = c`.
//!
//! - Gemm: `Y = alpha * A' * B' + beta * C`, `A` in the input chain,
//!   `B` and optional `C` in the weight chain.
//! - MatMul: `Y = A * B`, both in the input chain.
//! - QLinearMatMul: `A`, `B` in the input chain, `i32` bias in the weights.

use super::view::{Dst, FIn, FOut, QIn, QOut, Src};
use crate::error::KernelError;
use crate::layer::{operand, Coord, GemmArgs, Shape, TensorObj, TensorObjMut};

#[derive(Clone, Copy)]
struct Mat {
    shape: Shape,
    rows: usize,
    cols: usize,
    trans: bool,
}

impl Mat {
    fn new(shape: Shape, trans: bool) -> Self {
        let (r, c) = (shape.n * shape.h * shape.w, shape.c);
        let (rows, cols) = if trans { (c, r) } else { (r, c) };
        Self {
            shape,
            rows,
            cols,
            trans,
        }
    }

    /// Tensor coordinate of logical element `(i, j)`.
    fn at(&self, i: usize, j: usize) -> Coord {
        let (r, c) = if self.trans { (j, i) } else { (i, j) };
        self.shape.unravel(r * self.shape.c + c)
    }

    /// Like [`Mat::at`] with size-1 rows/cols broadcast.
    fn broadcast_at(&self, i: usize, j: usize) -> Coord {
        self.at(
            if self.rows == 1 { 0 } else { i },
            if self.cols == 1 { 0 } else { j },
        )
    }
}

/// Returns `(m, n, k)`.
fn dims(a: &Mat, b: &Mat, y: &Shape) -> Result<(usize, usize, usize), KernelError> {
    if a.cols != b.rows {
        return Err(KernelError::ShapeMismatch("matrix inner dimensions"));
    }
    let y = Mat::new(*y, false);
    if y.rows != a.rows || y.cols != b.cols {
        return Err(KernelError::ShapeMismatch("matrix output shape"));
    }
    Ok((a.rows, b.cols, a.cols))
}

fn check_broadcast(c: &Mat, m: usize, n: usize) -> Result<(), KernelError> {
    if (c.rows != 1 && c.rows != m) || (c.cols != 1 && c.cols != n) {
        return Err(KernelError::ShapeMismatch("gemm C does not broadcast to output"));
    }
    Ok(())
}

pub(super) fn gemm(
    args: &GemmArgs,
    inputs: &[TensorObj<'_>],
    weights: &[TensorObj<'_>],
    out: &mut TensorObjMut<'_>,
) -> Result<(), KernelError> {
    let a = FIn::new(operand(inputs, "input", 0)?)?;
    let b = FIn::new(operand(weights, "weight", 0)?)?;
    let c = weights.get(1).map(FIn::new).transpose()?;
    let mut y = FOut::new(out)?;

    let (am, bm) = (Mat::new(a.shape, args.trans_a), Mat::new(b.shape, args.trans_b));
    let (m, n, k) = dims(&am, &bm, &y.shape)?;
    let cm = c.as_ref().map(|c| Mat::new(c.shape, false));
    if let Some(cm) = &cm {
        check_broadcast(cm, m, n)?;
    }
    let ym = Mat::new(y.shape, false);

    for i in 0..m {
        for j in 0..n {
            let sum: f32 = (0..k).map(|p| a.read(am.at(i, p)) * b.read(bm.at(p, j))).sum();
            let bias = match (&c, &cm) {
                (Some(c), Some(cm)) => c.read(cm.broadcast_at(i, j)),
                _ => 0.0,
            };
            y.write(ym.at(i, j), args.alpha * sum + args.beta * bias);
        }
    }
    Ok(())
}

pub(super) fn matmul(inputs: &[TensorObj<'_>], out: &mut TensorObjMut<'_>) -> Result<(), KernelError> {
    let a = FIn::new(operand(inputs, "input", 0)?)?;
    let b = FIn::new(operand(inputs, "input", 1)?)?;
    let mut y = FOut::new(out)?;
    let (am, bm) = (Mat::new(a.shape, false), Mat::new(b.shape, false));
    let (m, n, k) = dims(&am, &bm, &y.shape)?;
    let ym = Mat::new(y.shape, false);
    for i in 0..m {
        for j in 0..n {
            let sum: f32 = (0..k).map(|p| a.read(am.at(i, p)) * b.read(bm.at(p, j))).sum();
            y.write(ym.at(i, j), sum);
        }
    }
    Ok(())
}

/// Integer dot product of row `i` of `a` and column `j` of `b`, zero points removed.
fn dot_centered(a: &QIn<'_>, am: &Mat, b: &QIn<'_>, bm: &Mat, i: usize, j: usize, k: usize) -> i64 {
    (0..k)
        .map(|p| i64::from(a.centered(am.at(i, p))) * i64::from(b.centered(bm.at(p, j))))
        .sum()
}

/// Quantized GEMM. `C` is an `i32` accumulator-domain tensor; the caller
/// supplies zeros when the node has none.
pub(super) fn gemm_integer(
    args: &GemmArgs,
    inputs: &[TensorObj<'_>],
    weights: &[TensorObj<'_>],
    out: &mut TensorObjMut<'_>,
) -> Result<(), KernelError> {
    let a = QIn::new(operand(inputs, "input", 0)?, "input")?;
    let b = QIn::new(operand(weights, "weight", 0)?, "weight")?;
    let c = operand(weights, "weight", 1)?;
    let c_data = c.data.as_i32()?;
    let mut y = QOut::new(out)?;

    let (am, bm) = (Mat::new(a.shape, args.trans_a), Mat::new(b.shape, args.trans_b));
    let (m, n, k) = dims(&am, &bm, &y.shape)?;
    let cm = Mat::new(c.shape, false);
    check_broadcast(&cm, m, n)?;
    let ym = Mat::new(y.shape, false);
    let a_scale = a.intq.scale_at([0; 4]);

    for i in 0..m {
        for j in 0..n {
            let acc = dot_centered(&a, &am, &b, &bm, i, j, k);
            let bias = c_data[c.offset(cm.broadcast_at(i, j))];
            let scale = a_scale * b.intq.scale_at(bm.at(0, j));
            let real = scale * (args.alpha * acc as f32 + args.beta * bias as f32);
            y.write(ym.at(i, j), real);
        }
    }
    Ok(())
}

pub(super) fn qlinear_matmul(
    inputs: &[TensorObj<'_>],
    weights: &[TensorObj<'_>],
    out: &mut TensorObjMut<'_>,
) -> Result<(), KernelError> {
    let a = QIn::new(operand(inputs, "input", 0)?, "input")?;
    let b = QIn::new(operand(inputs, "input", 1)?, "input")?;
    let bias = operand(weights, "weight", 0)?;
    let bias_data = bias.data.as_i32()?;
    let mut y = QOut::new(out)?;

    let (am, bm) = (Mat::new(a.shape, false), Mat::new(b.shape, false));
    let (m, n, k) = dims(&am, &bm, &y.shape)?;
    if bias.shape.size() != n {
        return Err(KernelError::ShapeMismatch("qlinearmatmul bias length"));
    }
    let ym = Mat::new(y.shape, false);
    let a_scale = a.intq.scale_at([0; 4]);

    for i in 0..m {
        for j in 0..n {
            let acc = dot_centered(&a, &am, &b, &bm, i, j, k) + i64::from(bias_data[bias.flat(j)]);
            let scale = a_scale * b.intq.scale_at(bm.at(0, j));
            y.write(ym.at(i, j), scale * acc as f32);
        }
    }
    Ok(())
}
