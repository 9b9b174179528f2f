//! Scalar math shared by the kernels: binary operators, activation
//! functions and affine quantization.

use core::ops::RangeInclusive;

use libm::{
    acosf, acoshf, asinf, asinhf, atanf, atanhf, ceilf, cosf, coshf, erff, expf, fabsf, floorf,
    fmaxf, fminf, fmodf, log1pf, logf, powf, rintf, sinf, sinhf, sqrtf, tanf, tanhf,
};

// ============================================================================
// Binary operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    Min,
    Max,
    Mod,
}

impl BinaryOp {
    /// Comparisons yield `1.0` for true and `0.0` for false.
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => powf(a, b),
            BinaryOp::Greater => flag(a > b),
            BinaryOp::GreaterOrEqual => flag(a >= b),
            BinaryOp::Less => flag(a < b),
            BinaryOp::LessOrEqual => flag(a <= b),
            BinaryOp::Equal => flag(a == b),
            BinaryOp::Min => fminf(a, b),
            BinaryOp::Max => fmaxf(a, b),
            BinaryOp::Mod => fmodf(a, b),
        }
    }
}

#[inline]
fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

// ============================================================================
// Activations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivFn {
    Relu,
    Elu,
    ThresholdedRelu,
    Selu,
    LeakyRelu,
    Clip,
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Cos,
    Cosh,
    Sin,
    Sinh,
    Tan,
    Tanh,
    Sigmoid,
    Softsign,
    Softplus,
    HardSigmoid,
    HardSwish,
    Gelu,
    Ceil,
    Floor,
    Round,
    Exp,
    Log,
    Neg,
    Not,
    Reciprocal,
    Sqrt,
    Erf,
}

/// Up to two float parameters handed to an activation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActivArgs {
    values: [f32; 2],
    len: usize,
}

impl ActivArgs {
    pub const NONE: Self = Self {
        values: [0.0; 2],
        len: 0,
    };

    pub const fn one(a: f32) -> Self {
        Self {
            values: [a, 0.0],
            len: 1,
        }
    }

    pub const fn two(a: f32, b: f32) -> Self {
        Self {
            values: [a, b],
            len: 2,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values[..self.len]
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ActivFn {
    /// Number of parameters the function reads.
    pub const fn arity(self) -> usize {
        match self {
            ActivFn::Elu | ActivFn::ThresholdedRelu | ActivFn::LeakyRelu => 1,
            ActivFn::Selu | ActivFn::Clip | ActivFn::HardSigmoid => 2,
            _ => 0,
        }
    }

    pub fn eval(self, x: f32, args: &ActivArgs) -> f32 {
        let [a, b] = args.values;
        match self {
            ActivFn::Relu => fmaxf(x, 0.0),
            ActivFn::Elu => {
                if x >= 0.0 {
                    x
                } else {
                    a * (expf(x) - 1.0)
                }
            }
            ActivFn::ThresholdedRelu => {
                if x > a {
                    x
                } else {
                    0.0
                }
            }
            // a = alpha, b = gamma
            ActivFn::Selu => {
                if x > 0.0 {
                    b * x
                } else {
                    b * (a * expf(x) - a)
                }
            }
            ActivFn::LeakyRelu => {
                if x >= 0.0 {
                    x
                } else {
                    a * x
                }
            }
            ActivFn::Clip => fmaxf(fminf(x, b), a),
            ActivFn::Abs => fabsf(x),
            ActivFn::Acos => acosf(x),
            ActivFn::Acosh => acoshf(x),
            ActivFn::Asin => asinf(x),
            ActivFn::Asinh => asinhf(x),
            ActivFn::Atan => atanf(x),
            ActivFn::Atanh => atanhf(x),
            ActivFn::Cos => cosf(x),
            ActivFn::Cosh => coshf(x),
            ActivFn::Sin => sinf(x),
            ActivFn::Sinh => sinhf(x),
            ActivFn::Tan => tanf(x),
            ActivFn::Tanh => tanhf(x),
            ActivFn::Sigmoid => sigmoid(x),
            ActivFn::Softsign => x / (1.0 + fabsf(x)),
            ActivFn::Softplus => log1pf(expf(x)),
            ActivFn::HardSigmoid => fmaxf(0.0, fminf(1.0, a * x + b)),
            ActivFn::HardSwish => x * fmaxf(0.0, fminf(1.0, x / 6.0 + 0.5)),
            ActivFn::Gelu => 0.5 * x * (1.0 + erff(x * core::f32::consts::FRAC_1_SQRT_2)),
            ActivFn::Ceil => ceilf(x),
            ActivFn::Floor => floorf(x),
            ActivFn::Round => rintf(x),
            ActivFn::Exp => expf(x),
            ActivFn::Log => logf(x),
            ActivFn::Neg => -x,
            ActivFn::Not => flag(x == 0.0),
            ActivFn::Reciprocal => 1.0 / x,
            ActivFn::Sqrt => sqrtf(x),
            ActivFn::Erf => erff(x),
        }
    }

    /// Float kernel symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            ActivFn::Relu => "forward_relu",
            ActivFn::Elu => "forward_elu",
            ActivFn::ThresholdedRelu => "forward_relu_thresholded",
            ActivFn::Selu => "forward_selu",
            ActivFn::LeakyRelu => "forward_relu_generic",
            ActivFn::Clip => "forward_clip",
            ActivFn::Abs => "forward_abs",
            ActivFn::Acos => "forward_acos",
            ActivFn::Acosh => "forward_acosh",
            ActivFn::Asin => "forward_asin",
            ActivFn::Asinh => "forward_asinh",
            ActivFn::Atan => "forward_atan",
            ActivFn::Atanh => "forward_atanh",
            ActivFn::Cos => "forward_cos",
            ActivFn::Cosh => "forward_cosh",
            ActivFn::Sin => "forward_sin",
            ActivFn::Sinh => "forward_sinh",
            ActivFn::Tan => "forward_tan",
            ActivFn::Tanh => "forward_tanh",
            ActivFn::Sigmoid => "forward_sigmoid",
            ActivFn::Softsign => "forward_soft_sign",
            ActivFn::Softplus => "forward_soft_plus",
            ActivFn::HardSigmoid => "forward_hard_sigmoid",
            ActivFn::HardSwish => "forward_hardswish",
            ActivFn::Gelu => "forward_gelu",
            ActivFn::Ceil => "forward_ceil",
            ActivFn::Floor => "forward_floor",
            ActivFn::Round => "forward_round",
            ActivFn::Exp => "forward_exp",
            ActivFn::Log => "forward_log",
            ActivFn::Neg => "forward_neg",
            ActivFn::Not => "forward_not",
            ActivFn::Reciprocal => "forward_reciprocal",
            ActivFn::Sqrt => "forward_sqrt",
            ActivFn::Erf => "forward_erf",
        }
    }

    /// Quantized kernel symbol. Functions without a dedicated integer
    /// kernel run through the generic dequantize/requantize path.
    pub fn integer_symbol(self) -> &'static str {
        match self {
            ActivFn::Relu => "forward_relu_integer",
            ActivFn::LeakyRelu => "forward_relu_generic_integer",
            ActivFn::Clip => "forward_clip_integer",
            ActivFn::Sigmoid => "forward_sigmoid_integer",
            ActivFn::Tanh => "forward_tanh_integer",
            _ => "forward_activ_integer",
        }
    }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + expf(-x))
}

// ============================================================================
// Affine quantization
// ============================================================================

pub const U8_RANGE: RangeInclusive<i32> = 0..=255;
pub const I8_RANGE: RangeInclusive<i32> = -128..=127;

#[inline]
pub fn dequantize(q: i32, scale: f32, zero_point: i32) -> f32 {
    (q - zero_point) as f32 * scale
}

/// `round(x / scale) + zero_point`, rounding half to even and saturating
/// to `range`.
#[inline]
pub fn quantize(x: f32, scale: f32, zero_point: i32, range: RangeInclusive<i32>) -> i32 {
    let q = rintf(x / scale) as i64 + i64::from(zero_point);
    q.clamp(i64::from(*range.start()), i64::from(*range.end())) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_comparisons_are_flags() {
        assert_eq!(BinaryOp::Greater.apply(2.0, 1.0), 1.0);
        assert_eq!(BinaryOp::LessOrEqual.apply(2.0, 1.0), 0.0);
        assert_eq!(BinaryOp::Equal.apply(3.0, 3.0), 1.0);
        assert_eq!(BinaryOp::Mod.apply(7.0, 3.0), 1.0);
        assert_eq!(BinaryOp::Min.apply(-1.0, 4.0), -1.0);
    }

    #[test]
    fn test_parameterised_activations() {
        let alpha = ActivArgs::one(0.1);
        assert!((ActivFn::LeakyRelu.eval(-2.0, &alpha) + 0.2).abs() < EPS);
        assert_eq!(ActivFn::LeakyRelu.eval(3.0, &alpha), 3.0);
        let clip = ActivArgs::two(-1.0, 1.0);
        assert_eq!(ActivFn::Clip.eval(5.0, &clip), 1.0);
        assert_eq!(ActivFn::Clip.eval(-5.0, &clip), -1.0);
        let hs = ActivArgs::two(0.2, 0.5);
        assert!((ActivFn::HardSigmoid.eval(0.0, &hs) - 0.5).abs() < EPS);
        assert_eq!(ActivFn::ThresholdedRelu.eval(0.5, &ActivArgs::one(1.0)), 0.0);
    }

    #[test]
    fn test_arity_matches_parameterised_kinds() {
        assert_eq!(ActivFn::Relu.arity(), 0);
        assert_eq!(ActivFn::Elu.arity(), 1);
        assert_eq!(ActivFn::Selu.arity(), 2);
    }

    #[test]
    fn test_quantize_rounds_half_even_and_saturates() {
        assert_eq!(quantize(2.5, 1.0, 0, U8_RANGE), 2);
        assert_eq!(quantize(3.5, 1.0, 0, U8_RANGE), 4);
        assert_eq!(quantize(-4.0, 1.0, 0, U8_RANGE), 0);
        assert_eq!(quantize(1000.0, 1.0, 0, I8_RANGE), 127);
        assert_eq!(quantize(1.0, 0.5, 10, I8_RANGE), 12);
        assert!((dequantize(12, 0.5, 10) - 1.0).abs() < EPS);
    }
}
