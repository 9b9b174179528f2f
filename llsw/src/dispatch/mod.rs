//! Node to kernel lowering.
//!
//! Each `forward` function takes one node's parameter struct, assembles the
//! kernel's layer object (tensor objects, quantization lists, parameter
//! block) and submits it to a [`Forward`] library. Batch normalisation is
//! the only operator computed here instead of in a kernel.
//!
//! - `float`: float32 operators with a single kernel each
//! - `activ`: activation selection
//! - `arith`: element-wise arithmetic and reduction selection tables
//! - `batchnorm`: the in-core batch normalisation loop
//! - `integer`: affine-quantized operators

pub mod activ;
pub mod arith;
pub mod batchnorm;
pub mod float;
pub mod integer;

use llsw_kernels::{
    Axis, Buf, Forward, IntqFlags, IntqInfoList, Layer, OffsetFormat, Pads, ScaleFormat,
    TensorObj, TensorObjMut, ZeroPoints,
};

use crate::error::{Error, Result};
use crate::ir::{NodeType, Quant, Tensor, TensorMut};

// ============================================================================
// Operands
// ============================================================================

/// Kernel view of a tensor the operator cannot run without.
pub(crate) fn input<'a>(
    node: NodeType,
    name: &'static str,
    t: &Tensor<'a>,
) -> Result<TensorObj<'a>> {
    t.to_obj()?
        .ok_or(Error::MissingTensor { node, tensor: name })
}

pub(crate) fn output<'o>(node: NodeType, t: &'o mut TensorMut<'_>) -> Result<TensorObjMut<'o>> {
    t.to_obj_mut()?.ok_or(Error::MissingTensor {
        node,
        tensor: "output",
    })
}

/// Whether element `i` of the view sits at offset `i`. Quantization lists
/// are read densely by the kernels.
fn is_dense(obj: &TensorObj<'_>) -> bool {
    (0..obj.shape.size()).all(|i| obj.flat(i) == i)
}

/// Builds the quantization list of a tensor with `channels` entries along
/// `axis`.
pub(crate) fn intq_info<'a>(
    node: NodeType,
    q: &Quant<'a>,
    channels: usize,
    axis: Axis,
) -> Result<IntqInfoList<'a>> {
    let scale_obj = input(node, "scale", &q.scale)?;
    let scale = scale_obj.data.as_f32()?;
    let size = scale_obj.shape.size();
    if size != 1 && size != channels {
        return Err(Error::QuantInfoSize { size, channels });
    }
    if !is_dense(&scale_obj) {
        return Err(Error::ShapeMismatch {
            node,
            what: "quantization scale is not contiguous",
        });
    }

    // Storage width comes from the zero-point tensor, not the data.
    let offset = if q.zero_point.format.is_signed {
        OffsetFormat::S8
    } else {
        OffsetFormat::U8
    };
    let zero_point = match q.zero_point.to_obj()? {
        None => ZeroPoints::Zero,
        Some(z) => {
            let zero_points = z.shape.size();
            if zero_points != size {
                return Err(Error::QuantInfoMismatch {
                    scales: size,
                    zero_points,
                });
            }
            if !is_dense(&z) {
                return Err(Error::ShapeMismatch {
                    node,
                    what: "zero point is not contiguous",
                });
            }
            match (z.data, offset) {
                (Buf::U8(d), OffsetFormat::U8) => ZeroPoints::U8(d),
                (Buf::I8(d), OffsetFormat::S8) => ZeroPoints::I8(d),
                _ => return Err(Error::ZeroPointFormat),
            }
        }
    };

    Ok(IntqInfoList {
        flags: IntqFlags {
            scale: ScaleFormat::Float,
            offset,
            channel_axis: axis,
        },
        size,
        scale,
        zero_point,
    })
}

/// Required tensor with channel-axis quantization attached.
pub(crate) fn quantized<'a>(
    node: NodeType,
    name: &'static str,
    t: &Tensor<'a>,
    q: &Quant<'a>,
) -> Result<TensorObj<'a>> {
    let obj = input(node, name, t)?;
    let intq = intq_info(node, q, obj.shape.c, Axis::Channel)?;
    Ok(obj.with_intq(intq))
}

pub(crate) fn quantized_output<'o, 'a: 'o>(
    node: NodeType,
    t: &'o mut TensorMut<'_>,
    q: &Quant<'a>,
) -> Result<TensorObjMut<'o>> {
    let obj = output(node, t)?;
    let intq = intq_info(node, q, obj.shape.c, Axis::Channel)?;
    Ok(obj.with_intq(intq))
}

// ============================================================================
// Parameter conversion
// ============================================================================

/// `pads[3], pads[2], pads[1], pads[0]`: node order to kernel order.
pub(crate) fn pads_reversed(p: [u32; 4]) -> Pads {
    [p[3] as usize, p[2] as usize, p[1] as usize, p[0] as usize]
}

/// `pads[0], pads[1], pads[2], pads[3]`, handed over unchanged.
pub(crate) fn pads_in_order(p: [u32; 4]) -> Pads {
    p.map(|v| v as usize)
}

pub(crate) fn pair(v: [u32; 2]) -> [usize; 2] {
    v.map(|v| v as usize)
}

// ============================================================================
// Submission
// ============================================================================

pub(crate) fn submit(node: NodeType, lib: &mut dyn Forward, layer: Layer<'_>) -> Result<()> {
    let symbol = layer.op.symbol();
    log::trace!("{node:?} -> {symbol}");
    lib.forward(layer).map_err(|e| {
        log::debug!("{node:?}: {symbol} failed: {e}");
        Error::Kernel(e)
    })
}

#[cfg(test)]
pub(crate) mod recorder {
    //! A [`Forward`] backend that keeps what it was handed.

    use llsw_kernels::{
        Axis, Forward, IntqInfoList, KernelError, Layer, LayerOp, OffsetFormat, Shape, TensorObj,
    };

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct IntqSummary {
        pub size: usize,
        pub offset: OffsetFormat,
        pub channel_axis: Axis,
        pub first_scale: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Operand {
        pub shape: Shape,
        pub intq: Option<IntqSummary>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub symbol: &'static str,
        pub op: LayerOp,
        pub inputs: Vec<Operand>,
        pub weights: Vec<Operand>,
        pub output: Operand,
    }

    #[derive(Debug, Default)]
    pub struct Recorder {
        pub calls: Vec<Call>,
    }

    impl Recorder {
        pub fn only(&self) -> &Call {
            assert_eq!(self.calls.len(), 1, "expected exactly one kernel call");
            &self.calls[0]
        }
    }

    fn summary(intq: Option<&IntqInfoList<'_>>) -> Option<IntqSummary> {
        intq.map(|q| IntqSummary {
            size: q.size,
            offset: q.flags.offset,
            channel_axis: q.flags.channel_axis,
            first_scale: q.scale[0],
        })
    }

    fn operands(chain: &[TensorObj<'_>]) -> Vec<Operand> {
        chain
            .iter()
            .map(|t| Operand {
                shape: t.shape,
                intq: summary(t.intq.as_ref()),
            })
            .collect()
    }

    impl Forward for Recorder {
        fn forward(&mut self, layer: Layer<'_>) -> Result<(), KernelError> {
            self.calls.push(Call {
                symbol: layer.op.symbol(),
                op: layer.op,
                inputs: operands(&layer.inputs),
                weights: operands(&layer.weights),
                output: Operand {
                    shape: layer.output.shape,
                    intq: summary(layer.output.intq.as_ref()),
                },
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Dim, Stride};

    fn one() -> Dim {
        Dim::nhwc(1, 1, 1, 1)
    }

    #[test]
    fn test_offset_flag_follows_zero_point_signedness() {
        let scale = [0.5f32];
        let zp = [-3i8];
        let q = Quant::new(Tensor::f32(one(), &scale), Tensor::i8(one(), &zp));
        let info = intq_info(NodeType::QuantizeLinear, &q, 8, Axis::Channel).unwrap();
        assert_eq!(info.flags.offset, OffsetFormat::S8);
        assert_eq!(info.flags.scale, ScaleFormat::Float);
        assert_eq!(info.zero_point, ZeroPoints::I8(&zp));
        assert_eq!(info.size, 1);
    }

    #[test]
    fn test_null_zero_point_is_zero() {
        let scale = [0.5f32, 0.25];
        let q = Quant::new(Tensor::f32(Dim::nhwc(1, 1, 1, 2), &scale), Tensor::null());
        let info = intq_info(NodeType::ConvInteger, &q, 2, Axis::Batch).unwrap();
        assert_eq!(info.zero_point, ZeroPoints::Zero);
        assert_eq!(info.size, 2);
        assert_eq!(info.flags.channel_axis, Axis::Batch);
    }

    #[test]
    fn test_size_must_be_one_or_channels() {
        let scale = [1.0f32; 3];
        let q = Quant::new(Tensor::f32(Dim::nhwc(1, 1, 1, 3), &scale), Tensor::null());
        assert_eq!(
            intq_info(NodeType::ConvInteger, &q, 4, Axis::Channel),
            Err(Error::QuantInfoSize {
                size: 3,
                channels: 4
            })
        );
    }

    #[test]
    fn test_zero_point_count_and_format() {
        let scale = [1.0f32; 2];
        let zp = [0u8; 1];
        let q = Quant::new(Tensor::f32(Dim::nhwc(1, 1, 1, 2), &scale), Tensor::u8(one(), &zp));
        assert_eq!(
            intq_info(NodeType::ConvInteger, &q, 2, Axis::Channel),
            Err(Error::QuantInfoMismatch {
                scales: 2,
                zero_points: 1
            })
        );

        let scale = [1.0f32];
        let mut zero_point = Tensor::u8(one(), &zp);
        zero_point.format.is_signed = true;
        let q = Quant::new(Tensor::f32(one(), &scale), zero_point);
        assert_eq!(
            intq_info(NodeType::ConvInteger, &q, 1, Axis::Channel),
            Err(Error::ZeroPointFormat)
        );
    }

    #[test]
    fn test_strided_quant_views_rejected() {
        let every_other = Stride {
            n: 3,
            h: 3,
            w: 3,
            c: 2,
        };
        let two = Dim::nhwc(1, 1, 1, 2);
        let scale = [0.5f32, 99.0, 0.25];
        let q = Quant::new(
            Tensor::f32(two, &scale).with_stride(every_other),
            Tensor::null(),
        );
        assert_eq!(
            intq_info(NodeType::QuantizeLinear, &q, 2, Axis::Channel),
            Err(Error::ShapeMismatch {
                node: NodeType::QuantizeLinear,
                what: "quantization scale is not contiguous"
            })
        );

        let dense = [0.5f32, 0.25];
        let zp = [1u8, 200, 2];
        let q = Quant::new(
            Tensor::f32(two, &dense),
            Tensor::u8(two, &zp).with_stride(every_other),
        );
        assert_eq!(
            intq_info(NodeType::QuantizeLinear, &q, 2, Axis::Channel),
            Err(Error::ShapeMismatch {
                node: NodeType::QuantizeLinear,
                what: "zero point is not contiguous"
            })
        );

        // A single entry is dense whatever its strides say.
        let q = Quant::new(
            Tensor::f32(one(), &scale).with_stride(every_other),
            Tensor::null(),
        );
        assert!(intq_info(NodeType::QuantizeLinear, &q, 2, Axis::Channel).is_ok());
    }

    #[test]
    fn test_missing_scale_reported() {
        let q = Quant::default();
        assert_eq!(
            intq_info(NodeType::QuantizeLinear, &q, 1, Axis::Channel),
            Err(Error::MissingTensor {
                node: NodeType::QuantizeLinear,
                tensor: "scale"
            })
        );
    }

    #[test]
    fn test_pad_orders() {
        assert_eq!(pads_reversed([1, 2, 3, 4]), [4, 3, 2, 1]);
        assert_eq!(pads_in_order([1, 2, 3, 4]), [1, 2, 3, 4]);
    }
}
