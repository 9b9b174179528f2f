//! Tensor descriptors as the graph interpreter hands them over.
//!
//! A descriptor is plain data built right before one dispatch call: dims,
//! element strides, a borrowed typed slice (or nothing, for an absent
//! auxiliary tensor) and a signedness flag for quantized storage.

use llsw_kernels::{self as kernels, Buf, BufMut, DType, Shape, TensorObj, TensorObjMut};

use crate::error::{Error, Result};

/// Logical extent in `(h, w, c, n)` order plus the cached element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Dim {
    pub h: u32,
    pub w: u32,
    pub c: u32,
    pub n: u32,
    /// Must equal `h * w * c * n`.
    pub num_elem: u32,
}

impl Dim {
    pub const fn new(h: u32, w: u32, c: u32, n: u32) -> Self {
        Self {
            h,
            w,
            c,
            n,
            num_elem: h.saturating_mul(w).saturating_mul(c).saturating_mul(n),
        }
    }

    /// Channel-last convenience constructor.
    pub const fn nhwc(n: u32, h: u32, w: u32, c: u32) -> Self {
        Self::new(h, w, c, n)
    }

    pub const fn product(&self) -> u64 {
        self.h as u64 * self.w as u64 * self.c as u64 * self.n as u64
    }

    pub fn check(&self) -> Result<()> {
        let product = self.product();
        if u64::from(self.num_elem) != product {
            return Err(Error::ElementCount {
                num_elem: self.num_elem,
                product,
            });
        }
        Ok(())
    }

    pub const fn shape(&self) -> Shape {
        Shape::new(
            self.n as usize,
            self.h as usize,
            self.w as usize,
            self.c as usize,
        )
    }
}

/// Per-axis element strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Stride {
    pub h: u32,
    pub w: u32,
    pub c: u32,
    pub n: u32,
}

impl Stride {
    /// Dense channel-last layout for `dim`.
    pub const fn contiguous(dim: &Dim) -> Self {
        Self {
            c: 1,
            w: dim.c,
            h: dim.w.saturating_mul(dim.c),
            n: dim.h.saturating_mul(dim.w).saturating_mul(dim.c),
        }
    }
}

impl From<Stride> for kernels::Stride {
    fn from(s: Stride) -> Self {
        kernels::Stride::new(s.n as usize, s.h as usize, s.w as usize, s.c as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Format {
    /// Quantized storage is `i8` rather than `u8`.
    pub is_signed: bool,
}

fn format_of(dtype: DType) -> Format {
    Format {
        is_signed: matches!(dtype, DType::I8),
    }
}

/// Read-only tensor descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tensor<'a> {
    pub dim: Dim,
    pub stride: Stride,
    /// `None` for an absent auxiliary tensor.
    pub mem: Option<Buf<'a>>,
    pub format: Format,
}

impl Default for Tensor<'_> {
    fn default() -> Self {
        Self::null()
    }
}

impl<'a> Tensor<'a> {
    pub const fn null() -> Self {
        Self {
            dim: Dim::new(0, 0, 0, 0),
            stride: Stride {
                h: 0,
                w: 0,
                c: 0,
                n: 0,
            },
            mem: None,
            format: Format { is_signed: false },
        }
    }

    /// Contiguous descriptor over `mem`; signedness follows the element type.
    pub fn new(dim: Dim, mem: Buf<'a>) -> Self {
        Self {
            dim,
            stride: Stride::contiguous(&dim),
            format: format_of(mem.dtype()),
            mem: Some(mem),
        }
    }

    pub fn f32(dim: Dim, data: &'a [f32]) -> Self {
        Self::new(dim, Buf::F32(data))
    }

    pub fn u8(dim: Dim, data: &'a [u8]) -> Self {
        Self::new(dim, Buf::U8(data))
    }

    pub fn i8(dim: Dim, data: &'a [i8]) -> Self {
        Self::new(dim, Buf::I8(data))
    }

    pub fn i32(dim: Dim, data: &'a [i32]) -> Self {
        Self::new(dim, Buf::I32(data))
    }

    pub fn i64(dim: Dim, data: &'a [i64]) -> Self {
        Self::new(dim, Buf::I64(data))
    }

    pub fn with_stride(mut self, stride: Stride) -> Self {
        self.stride = stride;
        self
    }

    pub const fn is_null(&self) -> bool {
        self.mem.is_none()
    }

    /// Kernel view of the descriptor, `None` when it has no memory.
    pub fn to_obj(&self) -> Result<Option<TensorObj<'a>>> {
        let Some(mem) = self.mem else {
            return Ok(None);
        };
        self.dim.check()?;
        Ok(Some(TensorObj::new(
            self.dim.shape(),
            self.stride.into(),
            mem,
        )?))
    }
}

/// Output descriptor.
#[derive(Debug, PartialEq)]
pub struct TensorMut<'a> {
    pub dim: Dim,
    pub stride: Stride,
    pub mem: Option<BufMut<'a>>,
    pub format: Format,
}

impl Default for TensorMut<'_> {
    fn default() -> Self {
        Self::null()
    }
}

impl<'a> TensorMut<'a> {
    pub const fn null() -> Self {
        Self {
            dim: Dim::new(0, 0, 0, 0),
            stride: Stride {
                h: 0,
                w: 0,
                c: 0,
                n: 0,
            },
            mem: None,
            format: Format { is_signed: false },
        }
    }

    pub fn new(dim: Dim, mem: BufMut<'a>) -> Self {
        Self {
            dim,
            stride: Stride::contiguous(&dim),
            format: format_of(mem.dtype()),
            mem: Some(mem),
        }
    }

    pub fn f32(dim: Dim, data: &'a mut [f32]) -> Self {
        Self::new(dim, BufMut::F32(data))
    }

    pub fn u8(dim: Dim, data: &'a mut [u8]) -> Self {
        Self::new(dim, BufMut::U8(data))
    }

    pub fn i8(dim: Dim, data: &'a mut [i8]) -> Self {
        Self::new(dim, BufMut::I8(data))
    }

    pub fn i32(dim: Dim, data: &'a mut [i32]) -> Self {
        Self::new(dim, BufMut::I32(data))
    }

    pub fn i64(dim: Dim, data: &'a mut [i64]) -> Self {
        Self::new(dim, BufMut::I64(data))
    }

    pub fn with_stride(mut self, stride: Stride) -> Self {
        self.stride = stride;
        self
    }

    /// Kernel view borrowing the output memory for one call.
    pub fn to_obj_mut(&mut self) -> Result<Option<TensorObjMut<'_>>> {
        let (dim, stride) = (self.dim, self.stride);
        let Some(mem) = self.mem.as_mut() else {
            return Ok(None);
        };
        dim.check()?;
        Ok(Some(TensorObjMut::new(
            dim.shape(),
            stride.into(),
            mem.reborrow(),
        )?))
    }
}

/// Scale and zero-point tensors describing one quantized operand.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quant<'a> {
    pub scale: Tensor<'a>,
    pub zero_point: Tensor<'a>,
}

impl<'a> Quant<'a> {
    pub fn new(scale: Tensor<'a>, zero_point: Tensor<'a>) -> Self {
        Self { scale, zero_point }
    }
}
