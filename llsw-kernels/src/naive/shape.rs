//! Data movement: resize/upsample, concat, gather, tile.

use libm::{floorf, fmaxf};

use super::view::{Dst, FIn, Src};
use crate::error::KernelError;
use crate::layer::{Axis, Coord, ResizeMode, Shape, TensorObj};

fn check_spatial_only(x: &Shape, y: &Shape) -> Result<(), KernelError> {
    if x.n != y.n || x.c != y.c {
        return Err(KernelError::ShapeMismatch("resize changes batch or channels"));
    }
    Ok(())
}

/// Source position of output index `o` along an axis of length `len`
/// (asymmetric coordinate mapping).
#[inline]
fn source(o: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let s = o as f32 / scale;
    let i0 = (fmaxf(floorf(s), 0.0) as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    (i0, i1, s - i0 as f32)
}

/// Resizes height and width. `scale` is `[h, w]`.
pub(super) fn resize(
    mode: ResizeMode,
    scale: [f32; 2],
    x: &impl Src,
    y: &mut impl Dst,
) -> Result<(), KernelError> {
    let (xs, ys) = (x.shape(), y.shape());
    check_spatial_only(&xs, &ys)?;
    if scale.iter().any(|s| s.is_nan() || *s <= 0.0) {
        return Err(KernelError::ShapeMismatch("resize scale must be positive"));
    }
    if xs.size() == 0 {
        return Ok(());
    }
    let [sh, sw] = scale;
    match mode {
        ResizeMode::Nearest => {
            for at in ys.coords() {
                let [n, oy, ox, c] = at;
                let (iy, _, _) = source(oy, sh, xs.h);
                let (ix, _, _) = source(ox, sw, xs.w);
                y.write(at, x.read([n, iy, ix, c]));
            }
        }
        ResizeMode::Linear => {
            for at in ys.coords() {
                let [n, oy, ox, c] = at;
                let (y0, y1, fy) = source(oy, sh, xs.h);
                let (x0, x1, fx) = source(ox, sw, xs.w);
                let top = x.read([n, y0, x0, c]) * (1.0 - fx) + x.read([n, y0, x1, c]) * fx;
                let bottom = x.read([n, y1, x0, c]) * (1.0 - fx) + x.read([n, y1, x1, c]) * fx;
                y.write(at, top * (1.0 - fy) + bottom * fy);
            }
        }
        ResizeMode::Cubic => return Err(KernelError::Unsupported("cubic resize")),
    }
    Ok(())
}

/// Zero-insertion upsampling: input pixels land on multiples of the scale,
/// everything in between is zero.
pub(super) fn upsample_zeros(scale: [f32; 2], x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let (xs, ys) = (x.shape(), y.shape());
    check_spatial_only(&xs, &ys)?;
    let sh = floorf(scale[0]) as usize;
    let sw = floorf(scale[1]) as usize;
    if sh == 0 || sw == 0 {
        return Err(KernelError::ShapeMismatch("upsample scale below 1"));
    }
    if ys.h != xs.h * sh || ys.w != xs.w * sw {
        return Err(KernelError::ShapeMismatch("upsample output shape"));
    }
    for at in ys.coords() {
        let [n, oy, ox, c] = at;
        let v = if oy % sh == 0 && ox % sw == 0 {
            x.read([n, oy / sh, ox / sw, c])
        } else {
            0.0
        };
        y.write(at, v);
    }
    Ok(())
}

pub(super) fn concat(axis: Axis, parts: &[FIn<'_>], y: &mut impl Dst) -> Result<(), KernelError> {
    let ys = y.shape();
    let mut total = 0;
    for p in parts {
        if p.shape.with(axis, 0) != ys.with(axis, 0) {
            return Err(KernelError::ShapeMismatch("concat operands differ off the concat axis"));
        }
        total += p.shape.get(axis);
    }
    if total != ys.get(axis) {
        return Err(KernelError::ShapeMismatch("concat output length"));
    }

    let mut start = 0;
    for p in parts {
        for at in p.shape.coords() {
            let mut dst = at;
            dst[axis.index()] += start;
            y.write(dst, p.read(at));
        }
        start += p.shape.get(axis);
    }
    Ok(())
}

/// Picks slices of `data` along `axis` by the flat `indices` tensor.
/// Negative indices count from the end.
pub(super) fn gather(
    axis: Axis,
    data: &FIn<'_>,
    indices: &TensorObj<'_>,
    y: &mut impl Dst,
) -> Result<(), KernelError> {
    let ys = y.shape();
    let count = indices.shape.size();
    if ys != data.shape.with(axis, count) {
        return Err(KernelError::ShapeMismatch("gather output shape"));
    }
    let dim = data.shape.get(axis);
    for at in ys.coords() {
        let k = at[axis.index()];
        let raw = indices.data.index_at(indices.flat(k))?;
        let idx = if raw < 0 { raw + dim as i64 } else { raw };
        if idx < 0 || idx >= dim as i64 {
            return Err(KernelError::IndexOutOfRange { index: raw, dim });
        }
        let mut src: Coord = at;
        src[axis.index()] = idx as usize;
        y.write(at, data.read(src));
    }
    Ok(())
}

/// Repeats the input `repeats[i]` times along each `[n, h, w, c]` axis.
pub(super) fn tile(repeats: [usize; 4], x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let (xs, ys) = (x.shape(), y.shape());
    let d = xs.dims();
    let expected = Shape::new(d[0] * repeats[0], d[1] * repeats[1], d[2] * repeats[2], d[3] * repeats[3]);
    if ys != expected {
        return Err(KernelError::ShapeMismatch("tile output shape"));
    }
    for at in ys.coords() {
        let src: Coord = core::array::from_fn(|i| at[i] % d[i]);
        y.write(at, x.read(src));
    }
    Ok(())
}
