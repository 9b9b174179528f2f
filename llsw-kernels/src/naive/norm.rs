//! Local response and instance normalisation (NHWC, naive).

use libm::{powf, sqrtf};

use super::same_shape;
use super::view::{Dst, FIn, Src};
use crate::error::KernelError;
use crate::layer::LrnArgs;

/// Cross-channel LRN: `x / (bias + alpha / size * sum(x_i^2))^beta` over a
/// window of `size` neighbouring channels.
pub(super) fn lrn(args: &LrnArgs, x: &impl Src, y: &mut impl Dst) -> Result<(), KernelError> {
    let xs = x.shape();
    same_shape(&xs, &y.shape(), "lrn input vs output")?;
    if args.size == 0 {
        return Err(KernelError::ShapeMismatch("lrn window size is zero"));
    }
    let before = (args.size - 1) / 2;
    let after = args.size - 1 - before;
    for at in xs.coords() {
        let [n, h, w, c] = at;
        let lo = c.saturating_sub(before);
        let hi = (c + after).min(xs.c - 1);
        let square_sum: f32 = (lo..=hi)
            .map(|i| {
                let v = x.read([n, h, w, i]);
                v * v
            })
            .sum();
        let denom = powf(args.bias + args.alpha / args.size as f32 * square_sum, args.beta);
        y.write(at, x.read(at) / denom);
    }
    Ok(())
}

/// Per-(batch, channel) normalisation over the spatial extent, followed by
/// a per-channel affine transform.
pub(super) fn instance_norm(
    epsilon: f32,
    x: &FIn<'_>,
    scale: &FIn<'_>,
    bias: &FIn<'_>,
    y: &mut impl Dst,
) -> Result<(), KernelError> {
    let xs = x.shape;
    same_shape(&xs, &y.shape(), "instance norm input vs output")?;
    if scale.shape.size() != xs.c || bias.shape.size() != xs.c {
        return Err(KernelError::ShapeMismatch("instance norm scale/bias length"));
    }
    let plane = (xs.h * xs.w) as f32;
    for n in 0..xs.n {
        for c in 0..xs.c {
            let pixels = || (0..xs.h).flat_map(move |h| (0..xs.w).map(move |w| [n, h, w, c]));
            let mean = pixels().map(|at| x.read(at)).sum::<f32>() / plane;
            let var = pixels()
                .map(|at| {
                    let d = x.read(at) - mean;
                    d * d
                })
                .sum::<f32>()
                / plane;
            let inv = 1.0 / sqrtf(var + epsilon);
            let (g, b) = (scale.flat(c), bias.flat(c));
            for at in pixels() {
                y.write(at, (x.read(at) - mean) * inv * g + b);
            }
        }
    }
    Ok(())
}
