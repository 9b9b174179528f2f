//! Element access over tensor objects.
//!
//! Kernels that exist in both numeric domains are written once against
//! [`Src`] / [`Dst`]. Float views read and write values directly; quantized
//! views dequantize on read and requantize on write.

use core::ops::RangeInclusive;

use crate::error::KernelError;
use crate::layer::{Buf, BufMut, Coord, DType, IntqInfoList, Shape, Stride, TensorObj, TensorObjMut};
use crate::math::{dequantize, quantize, I8_RANGE, U8_RANGE};

pub(crate) trait Src {
    fn shape(&self) -> Shape;
    fn read(&self, at: Coord) -> f32;
}

pub(crate) trait Dst {
    fn shape(&self) -> Shape;
    fn write(&mut self, at: Coord, value: f32);
}

// ----------------------------------------------------------------------------
// Float
// ----------------------------------------------------------------------------

#[derive(Clone, Copy)]
pub(crate) struct FIn<'a> {
    pub shape: Shape,
    pub stride: Stride,
    pub data: &'a [f32],
}

impl<'a> FIn<'a> {
    pub fn new(t: &TensorObj<'a>) -> Result<Self, KernelError> {
        Ok(Self {
            shape: t.shape,
            stride: t.stride,
            data: t.data.as_f32()?,
        })
    }
}

impl FIn<'_> {
    /// The `i`-th logical element, for 1-D operands such as bias vectors.
    pub fn flat(&self, i: usize) -> f32 {
        self.data[self.stride.offset(self.shape.unravel(i))]
    }
}

impl Src for FIn<'_> {
    fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    fn read(&self, at: Coord) -> f32 {
        self.data[self.stride.offset(at)]
    }
}

pub(crate) struct FOut<'o> {
    pub shape: Shape,
    pub stride: Stride,
    pub data: &'o mut [f32],
}

impl<'o> FOut<'o> {
    pub fn new(t: &'o mut TensorObjMut<'_>) -> Result<Self, KernelError> {
        let (shape, stride) = (t.shape, t.stride);
        Ok(Self {
            shape,
            stride,
            data: t.data.as_f32_mut()?,
        })
    }
}

impl Dst for FOut<'_> {
    fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    fn write(&mut self, at: Coord, value: f32) {
        self.data[self.stride.offset(at)] = value;
    }
}

// ----------------------------------------------------------------------------
// Quantized
// ----------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum QData<'a> {
    U8(&'a [u8]),
    I8(&'a [i8]),
}

#[derive(Clone, Copy)]
pub(crate) struct QIn<'a> {
    pub shape: Shape,
    stride: Stride,
    data: QData<'a>,
    pub intq: IntqInfoList<'a>,
}

impl<'a> QIn<'a> {
    pub fn new(t: &TensorObj<'a>, name: &'static str) -> Result<Self, KernelError> {
        let intq = t.intq.ok_or(KernelError::MissingQuantInfo(name))?;
        intq.validate(&t.shape)?;
        let data = match t.data {
            Buf::U8(d) => QData::U8(d),
            Buf::I8(d) => QData::I8(d),
            other => {
                return Err(KernelError::DType {
                    expected: DType::U8,
                    found: other.dtype(),
                })
            }
        };
        Ok(Self {
            shape: t.shape,
            stride: t.stride,
            data,
            intq,
        })
    }

    /// Stored integer at `at`.
    #[inline]
    pub fn raw(&self, at: Coord) -> i32 {
        let o = self.stride.offset(at);
        match self.data {
            QData::U8(d) => i32::from(d[o]),
            QData::I8(d) => i32::from(d[o]),
        }
    }

    /// Stored integer minus its zero point.
    #[inline]
    pub fn centered(&self, at: Coord) -> i32 {
        self.raw(at) - self.intq.zero_point_at(at)
    }
}

impl Src for QIn<'_> {
    fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    fn read(&self, at: Coord) -> f32 {
        dequantize(
            self.raw(at),
            self.intq.scale_at(at),
            self.intq.zero_point_at(at),
        )
    }
}

enum QDataMut<'o> {
    U8(&'o mut [u8]),
    I8(&'o mut [i8]),
}

pub(crate) struct QOut<'o, 'a> {
    pub shape: Shape,
    stride: Stride,
    data: QDataMut<'o>,
    pub intq: IntqInfoList<'a>,
}

impl<'o, 'a> QOut<'o, 'a> {
    pub fn new(t: &'o mut TensorObjMut<'a>) -> Result<Self, KernelError> {
        let (shape, stride) = (t.shape, t.stride);
        let intq = t.intq.ok_or(KernelError::MissingQuantInfo("output"))?;
        intq.validate(&shape)?;
        let data = match &mut t.data {
            BufMut::U8(d) => QDataMut::U8(&mut **d),
            BufMut::I8(d) => QDataMut::I8(&mut **d),
            other => {
                return Err(KernelError::DType {
                    expected: DType::U8,
                    found: other.dtype(),
                })
            }
        };
        Ok(Self {
            shape,
            stride,
            data,
            intq,
        })
    }

    fn range(&self) -> RangeInclusive<i32> {
        match self.data {
            QDataMut::U8(_) => U8_RANGE,
            QDataMut::I8(_) => I8_RANGE,
        }
    }

    /// Stores an already quantized value, saturating to the storage type.
    #[inline]
    pub fn write_raw(&mut self, at: Coord, q: i32) {
        let o = self.stride.offset(at);
        match &mut self.data {
            QDataMut::U8(d) => d[o] = q.clamp(0, 255) as u8,
            QDataMut::I8(d) => d[o] = q.clamp(-128, 127) as i8,
        }
    }
}

impl Dst for QOut<'_, '_> {
    fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    fn write(&mut self, at: Coord, value: f32) {
        let q = quantize(
            value,
            self.intq.scale_at(at),
            self.intq.zero_point_at(at),
            self.range(),
        );
        self.write_raw(at, q);
    }
}
