//! 2D convolution (NHWC, naive), float and quantized.
//!
//! - `input`:  [N, H, W, Ci]
//! - `weight`: [Co, Kh, Kw, Ci / groups]
//! - `bias`:   [Co], optional (f32 for float, i32 accumulators for integer)
//! - `output`: [N, Ho, Wo, Co]

use super::view::{Dst, FIn, FOut, QIn, QOut, Src};
use crate::error::KernelError;
use crate::layer::{operand, ConvArgs, ConvStrategy, Coord, DType, Shape, TensorObj, TensorObjMut};

/// Output position to input window mapping.
struct Geometry {
    kernel: [usize; 2],
    strides: [usize; 2],
    dilations: [usize; 2],
    /// `[top, left]`
    pad_begin: [usize; 2],
    input: [usize; 2],
    cin_per_group: usize,
    cout_per_group: usize,
}

impl Geometry {
    fn new(args: &ConvArgs, x: &Shape, w: &Shape, y: &Shape) -> Result<Self, KernelError> {
        let [kh, kw] = args.filter.kernel();
        let cin_g = args.filter.in_channels();
        let cout = args.filter.out_channels();
        let groups = args.groups;
        if groups == 0 || cout % groups != 0 || x.c != cin_g * groups {
            return Err(KernelError::ShapeMismatch("conv channels vs groups"));
        }
        if *w != Shape::new(cout, kh, kw, cin_g) {
            return Err(KernelError::ShapeMismatch("conv weight vs filter shape"));
        }

        let [pad_right, pad_bottom, pad_left, pad_top] = args.pads;
        let [sh, sw] = args.strides;
        let [dh, dw] = args.dilations;
        if sh == 0 || sw == 0 || dh == 0 || dw == 0 || kh == 0 || kw == 0 {
            return Err(KernelError::ShapeMismatch("conv stride, dilation or kernel is zero"));
        }
        let span_h = (kh - 1) * dh + 1;
        let span_w = (kw - 1) * dw + 1;
        let padded_h = x.h + pad_top + pad_bottom;
        let padded_w = x.w + pad_left + pad_right;
        if padded_h < span_h || padded_w < span_w {
            return Err(KernelError::ShapeMismatch("conv window larger than padded input"));
        }
        let expected = Shape::new(
            x.n,
            (padded_h - span_h) / sh + 1,
            (padded_w - span_w) / sw + 1,
            cout,
        );
        if *y != expected {
            return Err(KernelError::ShapeMismatch("conv output shape"));
        }

        Ok(Self {
            kernel: [kh, kw],
            strides: args.strides,
            dilations: args.dilations,
            pad_begin: [pad_top, pad_left],
            input: [x.h, x.w],
            cin_per_group: cin_g,
            cout_per_group: cout / groups,
        })
    }

    /// Calls `tap(input_coord, weight_coord)` for every in-bounds tap
    /// feeding output `at`. Padded taps contribute nothing.
    fn for_each_tap(&self, at: Coord, mut tap: impl FnMut(Coord, Coord)) {
        let [n, oy, ox, oc] = at;
        let group = oc / self.cout_per_group;
        for ky in 0..self.kernel[0] {
            let Some(iy) = (oy * self.strides[0] + ky * self.dilations[0]).checked_sub(self.pad_begin[0])
            else {
                continue;
            };
            if iy >= self.input[0] {
                continue;
            }
            for kx in 0..self.kernel[1] {
                let Some(ix) =
                    (ox * self.strides[1] + kx * self.dilations[1]).checked_sub(self.pad_begin[1])
                else {
                    continue;
                };
                if ix >= self.input[1] {
                    continue;
                }
                for ic in 0..self.cin_per_group {
                    tap(
                        [n, iy, ix, group * self.cin_per_group + ic],
                        [oc, ky, kx, ic],
                    );
                }
            }
        }
    }
}

fn check_bias(bias: Option<&TensorObj<'_>>, cout: usize) -> Result<(), KernelError> {
    match bias {
        Some(b) if b.shape.size() != cout => Err(KernelError::ShapeMismatch("conv bias length")),
        _ => Ok(()),
    }
}

pub(super) fn conv2d(
    args: &ConvArgs,
    inputs: &[TensorObj<'_>],
    weights: &[TensorObj<'_>],
    out: &mut TensorObjMut<'_>,
) -> Result<(), KernelError> {
    let x = FIn::new(operand(inputs, "input", 0)?)?;
    let w = FIn::new(operand(weights, "weight", 0)?)?;
    let bias = weights.get(1);
    check_bias(bias, args.filter.out_channels())?;
    let bias = bias.map(FIn::new).transpose()?;
    let mut y = FOut::new(out)?;
    let geom = Geometry::new(args, &x.shape, &w.shape, &y.shape)?;

    for at in y.shape.coords() {
        let mut sum = bias.as_ref().map_or(0.0, |b| b.flat(at[3]));
        geom.for_each_tap(at, |xi, wi| sum += x.read(xi) * w.read(wi));
        y.write(at, sum);
    }
    Ok(())
}

fn check_strategy(
    strategy: ConvStrategy,
    args: &ConvArgs,
    x: &Shape,
) -> Result<(), KernelError> {
    let failed = match strategy {
        ConvStrategy::Pointwise if args.filter.kernel() != [1, 1] => "pointwise needs a 1x1 kernel",
        ConvStrategy::RgbInput if x.c != 3 => "rgb input needs 3 input channels",
        ConvStrategy::Depthwise if args.groups < 2 => "depthwise needs a grouped convolution",
        _ => return Ok(()),
    };
    Err(KernelError::StrategyMismatch(failed))
}

/// Quantized convolution. An `I32` output receives raw accumulators;
/// a `U8`/`I8` output is requantized with its own scale and zero point.
pub(super) fn conv2d_integer(
    strategy: ConvStrategy,
    args: &ConvArgs,
    inputs: &[TensorObj<'_>],
    weights: &[TensorObj<'_>],
    out: &mut TensorObjMut<'_>,
) -> Result<(), KernelError> {
    let x = QIn::new(operand(inputs, "input", 0)?, "input")?;
    let w = QIn::new(operand(weights, "weight", 0)?, "weight")?;
    check_strategy(strategy, args, &x.shape)?;
    if x.intq.size != 1 {
        return Err(KernelError::ShapeMismatch("conv input must be per-tensor quantized"));
    }
    let bias = weights.get(1);
    check_bias(bias, args.filter.out_channels())?;
    let bias = match bias {
        Some(b) => Some((b, b.data.as_i32()?)),
        None => None,
    };
    let out_shape = out.shape;
    let geom = Geometry::new(args, &x.shape, &w.shape, &out_shape)?;

    let accumulate = |at: Coord| -> i64 {
        let mut acc = bias.map_or(0, |(b, d)| i64::from(d[b.flat(at[3])]));
        geom.for_each_tap(at, |xi, wi| {
            acc += i64::from(x.centered(xi)) * i64::from(w.centered(wi));
        });
        acc
    };

    if out.data.dtype() == DType::I32 {
        let stride = out.stride;
        let data = out.data.as_i32_mut()?;
        for at in out_shape.coords() {
            // Raw accumulators saturate at the i32 range.
            let acc = accumulate(at).clamp(i64::from(i32::MIN), i64::from(i32::MAX));
            data[stride.offset(at)] = acc as i32;
        }
        return Ok(());
    }

    let in_scale = x.intq.scale_at([0; 4]);
    let mut y = QOut::new(out)?;
    for at in out_shape.coords() {
        let w_scale = w.intq.scale_at([at[3], 0, 0, 0]);
        y.write(at, accumulate(at) as f32 * in_scale * w_scale);
    }
    Ok(())
}
