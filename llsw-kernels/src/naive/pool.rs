//! 2D pooling (NHWC, naive). One implementation serves both domains.
//!
//! - `input`:  [N, H, W, C]
//! - `output`: [N, Ho, Wo, C]

use super::view::{Dst, Src};
use crate::error::KernelError;
use crate::layer::{PoolArgs, PoolKind, Shape};

pub(super) fn pool(args: &PoolArgs, x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let (xs, ys) = (x.shape(), y.shape());
    let [kh, kw] = args.kernel;
    let [sh, sw] = args.strides;
    let [pad_right, pad_bottom, pad_left, pad_top] = args.pads;
    if kh == 0 || kw == 0 || sh == 0 || sw == 0 {
        return Err(KernelError::ShapeMismatch("pool kernel or stride is zero"));
    }
    let padded_h = xs.h + pad_top + pad_bottom;
    let padded_w = xs.w + pad_left + pad_right;
    if padded_h < kh || padded_w < kw {
        return Err(KernelError::ShapeMismatch("pool window larger than padded input"));
    }
    let expected = Shape::new(xs.n, (padded_h - kh) / sh + 1, (padded_w - kw) / sw + 1, xs.c);
    if ys != expected {
        return Err(KernelError::ShapeMismatch("pool output shape"));
    }

    for at in ys.coords() {
        let [n, oy, ox, ch] = at;
        let mut sum = 0.0f32;
        let mut max_val = f32::NEG_INFINITY;
        let mut taps = 0usize;
        let mut window = 0usize;
        for ky in 0..kh {
            for kx in 0..kw {
                window += 1;
                let iy = (oy * sh + ky).checked_sub(pad_top);
                let ix = (ox * sw + kx).checked_sub(pad_left);
                let (Some(iy), Some(ix)) = (iy, ix) else {
                    continue;
                };
                if iy >= xs.h || ix >= xs.w {
                    continue;
                }
                let v = x.read([n, iy, ix, ch]);
                sum += v;
                if v > max_val {
                    max_val = v;
                }
                taps += 1;
            }
        }
        let value = match args.kind {
            PoolKind::Max => max_val,
            PoolKind::Average { count_include_pad } => {
                let count = if count_include_pad { window } else { taps };
                if count == 0 {
                    0.0
                } else {
                    sum / count as f32
                }
            }
        };
        y.write(at, value);
    }
    Ok(())
}
