//! Layer object contract.
//!
//! A [`Layer`] is what a caller assembles before a kernel runs: the kernel
//! symbol with its parameter block ([`LayerOp`]), a chain of input tensors,
//! a chain of weight tensors and one output tensor. Tensor objects are
//! borrowed, strided NHWC views; nothing in this module allocates.

use crate::error::KernelError;
use crate::math::{ActivArgs, ActivFn, BinaryOp};

/// Capacity of an input or weight chain.
pub const MAX_CHAIN: usize = 4;

/// Tensor coordinate in `[n, h, w, c]` order.
pub type Coord = [usize; 4];

// ============================================================================
// Shape & Stride
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Batch,
    Height,
    Width,
    Channel,
}

impl Axis {
    /// Position of this axis inside a [`Coord`].
    pub const fn index(self) -> usize {
        match self {
            Axis::Batch => 0,
            Axis::Height => 1,
            Axis::Width => 2,
            Axis::Channel => 3,
        }
    }
}

/// Logical extent of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Shape {
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub c: usize,
}

impl Shape {
    pub const fn new(n: usize, h: usize, w: usize, c: usize) -> Self {
        Self { n, h, w, c }
    }

    pub const fn from_dims(d: Coord) -> Self {
        Self::new(d[0], d[1], d[2], d[3])
    }

    pub const fn dims(&self) -> Coord {
        [self.n, self.h, self.w, self.c]
    }

    pub const fn size(&self) -> usize {
        self.n * self.h * self.w * self.c
    }

    pub const fn get(&self, axis: Axis) -> usize {
        self.dims()[axis.index()]
    }

    /// Same shape with one axis replaced.
    pub const fn with(&self, axis: Axis, len: usize) -> Self {
        let mut d = self.dims();
        d[axis.index()] = len;
        Self::from_dims(d)
    }

    /// Dense channel-last strides for this shape.
    pub const fn contiguous(&self) -> Stride {
        Stride {
            c: 1,
            w: self.c,
            h: self.w * self.c,
            n: self.h * self.w * self.c,
        }
    }

    /// Every coordinate of the shape, channel fastest.
    pub fn coords(&self) -> Coords {
        Coords {
            dims: self.dims(),
            next: if self.size() == 0 { None } else { Some([0; 4]) },
        }
    }

    /// Coordinate of the `i`-th element in channel-last order.
    pub const fn unravel(&self, mut i: usize) -> Coord {
        let c = i % self.c;
        i /= self.c;
        let w = i % self.w;
        i /= self.w;
        let h = i % self.h;
        [i / self.h, h, w, c]
    }
}

/// Element strides of a tensor view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Stride {
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub c: usize,
}

impl Stride {
    pub const fn new(n: usize, h: usize, w: usize, c: usize) -> Self {
        Self { n, h, w, c }
    }

    pub const fn offset(&self, at: Coord) -> usize {
        at[0] * self.n + at[1] * self.h + at[2] * self.w + at[3] * self.c
    }

    pub const fn get(&self, axis: Axis) -> usize {
        match axis {
            Axis::Batch => self.n,
            Axis::Height => self.h,
            Axis::Width => self.w,
            Axis::Channel => self.c,
        }
    }
}

/// Iterator returned by [`Shape::coords`].
#[derive(Debug, Clone)]
pub struct Coords {
    dims: Coord,
    next: Option<Coord>,
}

impl Iterator for Coords {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        let cur = self.next?;
        let mut nxt = cur;
        let mut i = 3;
        self.next = loop {
            nxt[i] += 1;
            if nxt[i] < self.dims[i] {
                break Some(nxt);
            }
            nxt[i] = 0;
            if i == 0 {
                break None;
            }
            i -= 1;
        };
        Some(cur)
    }
}

/// Largest strided offset of `shape` plus one.
pub const fn extent(shape: &Shape, stride: &Stride) -> usize {
    if shape.size() == 0 {
        return 0;
    }
    stride.offset([shape.n - 1, shape.h - 1, shape.w - 1, shape.c - 1]) + 1
}

// ============================================================================
// Buffers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    U8,
    I8,
    I32,
    I64,
}

/// Borrowed, typed tensor payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Buf<'a> {
    F32(&'a [f32]),
    U8(&'a [u8]),
    I8(&'a [i8]),
    I32(&'a [i32]),
    I64(&'a [i64]),
}

impl<'a> Buf<'a> {
    pub fn dtype(&self) -> DType {
        match self {
            Buf::F32(_) => DType::F32,
            Buf::U8(_) => DType::U8,
            Buf::I8(_) => DType::I8,
            Buf::I32(_) => DType::I32,
            Buf::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buf::F32(d) => d.len(),
            Buf::U8(d) => d.len(),
            Buf::I8(d) => d.len(),
            Buf::I32(d) => d.len(),
            Buf::I64(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Result<&'a [f32], KernelError> {
        match *self {
            Buf::F32(d) => Ok(d),
            other => Err(mismatch(DType::F32, other.dtype())),
        }
    }

    pub fn as_i32(&self) -> Result<&'a [i32], KernelError> {
        match *self {
            Buf::I32(d) => Ok(d),
            other => Err(mismatch(DType::I32, other.dtype())),
        }
    }

    /// Index-typed element widened to `i64`. Accepts `I32` and `I64` payloads.
    pub fn index_at(&self, offset: usize) -> Result<i64, KernelError> {
        match *self {
            Buf::I64(d) => Ok(d[offset]),
            Buf::I32(d) => Ok(i64::from(d[offset])),
            other => Err(mismatch(DType::I64, other.dtype())),
        }
    }
}

/// Mutable counterpart of [`Buf`], used for the output tensor.
#[derive(Debug, PartialEq)]
pub enum BufMut<'a> {
    F32(&'a mut [f32]),
    U8(&'a mut [u8]),
    I8(&'a mut [i8]),
    I32(&'a mut [i32]),
    I64(&'a mut [i64]),
}

impl<'a> BufMut<'a> {
    pub fn dtype(&self) -> DType {
        match self {
            BufMut::F32(_) => DType::F32,
            BufMut::U8(_) => DType::U8,
            BufMut::I8(_) => DType::I8,
            BufMut::I32(_) => DType::I32,
            BufMut::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BufMut::F32(d) => d.len(),
            BufMut::U8(d) => d.len(),
            BufMut::I8(d) => d.len(),
            BufMut::I32(d) => d.len(),
            BufMut::I64(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shorter-lived view of the same payload.
    pub fn reborrow(&mut self) -> BufMut<'_> {
        match self {
            BufMut::F32(d) => BufMut::F32(&mut **d),
            BufMut::U8(d) => BufMut::U8(&mut **d),
            BufMut::I8(d) => BufMut::I8(&mut **d),
            BufMut::I32(d) => BufMut::I32(&mut **d),
            BufMut::I64(d) => BufMut::I64(&mut **d),
        }
    }

    pub fn as_f32_mut(&mut self) -> Result<&mut [f32], KernelError> {
        match self {
            BufMut::F32(d) => Ok(&mut **d),
            other => Err(mismatch(DType::F32, other.dtype())),
        }
    }

    pub fn as_i32_mut(&mut self) -> Result<&mut [i32], KernelError> {
        match self {
            BufMut::I32(d) => Ok(&mut **d),
            other => Err(mismatch(DType::I32, other.dtype())),
        }
    }

    /// Writes an index-typed element. Accepts `I32` and `I64` payloads.
    pub fn store_index(&mut self, offset: usize, value: i64) -> Result<(), KernelError> {
        match self {
            BufMut::I64(d) => d[offset] = value,
            BufMut::I32(d) => d[offset] = value as i32,
            other => return Err(mismatch(DType::I64, other.dtype())),
        }
        Ok(())
    }
}

fn mismatch(expected: DType, found: DType) -> KernelError {
    KernelError::DType { expected, found }
}

// ============================================================================
// Quantization info
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFormat {
    Float,
}

/// Storage width of the zero-point entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetFormat {
    U8,
    S8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntqFlags {
    pub scale: ScaleFormat,
    pub offset: OffsetFormat,
    /// Axis that per-channel entries follow.
    pub channel_axis: Axis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZeroPoints<'a> {
    /// No zero-point tensor: every entry is 0.
    Zero,
    U8(&'a [u8]),
    I8(&'a [i8]),
}

impl ZeroPoints<'_> {
    pub fn len(&self) -> Option<usize> {
        match self {
            ZeroPoints::Zero => None,
            ZeroPoints::U8(z) => Some(z.len()),
            ZeroPoints::I8(z) => Some(z.len()),
        }
    }
}

/// Scale/zero-point list describing one quantized tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntqInfoList<'a> {
    pub flags: IntqFlags,
    /// 1 for per-tensor, otherwise the length of `flags.channel_axis`.
    pub size: usize,
    pub scale: &'a [f32],
    pub zero_point: ZeroPoints<'a>,
}

impl<'a> IntqInfoList<'a> {
    pub fn per_tensor(scale: &'a [f32], zero_point: ZeroPoints<'a>, offset: OffsetFormat) -> Self {
        Self {
            flags: IntqFlags {
                scale: ScaleFormat::Float,
                offset,
                channel_axis: Axis::Channel,
            },
            size: 1,
            scale,
            zero_point,
        }
    }

    /// Checks the list against the tensor it describes.
    pub fn validate(&self, shape: &Shape) -> Result<(), KernelError> {
        if self.size != 1 && self.size != shape.get(self.flags.channel_axis) {
            return Err(KernelError::ShapeMismatch("quantization list length"));
        }
        if self.scale.len() < self.size {
            return Err(KernelError::ShapeMismatch("scale entries"));
        }
        if self.zero_point.len().is_some_and(|len| len < self.size) {
            return Err(KernelError::ShapeMismatch("zero-point entries"));
        }
        Ok(())
    }

    fn entry(&self, at: Coord) -> usize {
        if self.size == 1 {
            0
        } else {
            at[self.flags.channel_axis.index()]
        }
    }

    pub fn scale_at(&self, at: Coord) -> f32 {
        self.scale[self.entry(at)]
    }

    pub fn zero_point_at(&self, at: Coord) -> i32 {
        let i = self.entry(at);
        match self.zero_point {
            ZeroPoints::Zero => 0,
            ZeroPoints::U8(z) => i32::from(z[i]),
            ZeroPoints::I8(z) => i32::from(z[i]),
        }
    }
}

// ============================================================================
// Tensor objects
// ============================================================================

/// Read-only tensor operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorObj<'a> {
    pub shape: Shape,
    pub stride: Stride,
    pub data: Buf<'a>,
    pub intq: Option<IntqInfoList<'a>>,
}

impl<'a> TensorObj<'a> {
    /// Fails when `data` does not reach the furthest strided offset of `shape`.
    pub fn new(shape: Shape, stride: Stride, data: Buf<'a>) -> Result<Self, KernelError> {
        check_extent(&shape, &stride, data.len())?;
        Ok(Self {
            shape,
            stride,
            data,
            intq: None,
        })
    }

    pub fn contiguous(shape: Shape, data: Buf<'a>) -> Result<Self, KernelError> {
        Self::new(shape, shape.contiguous(), data)
    }

    pub fn with_intq(mut self, intq: IntqInfoList<'a>) -> Self {
        self.intq = Some(intq);
        self
    }

    pub fn offset(&self, at: Coord) -> usize {
        self.stride.offset(at)
    }

    /// Offset of the `i`-th logical element.
    pub fn flat(&self, i: usize) -> usize {
        self.stride.offset(self.shape.unravel(i))
    }
}

/// Output tensor.
#[derive(Debug, PartialEq)]
pub struct TensorObjMut<'a> {
    pub shape: Shape,
    pub stride: Stride,
    pub data: BufMut<'a>,
    pub intq: Option<IntqInfoList<'a>>,
}

impl<'a> TensorObjMut<'a> {
    pub fn new(shape: Shape, stride: Stride, data: BufMut<'a>) -> Result<Self, KernelError> {
        check_extent(&shape, &stride, data.len())?;
        Ok(Self {
            shape,
            stride,
            data,
            intq: None,
        })
    }

    pub fn contiguous(shape: Shape, data: BufMut<'a>) -> Result<Self, KernelError> {
        Self::new(shape, shape.contiguous(), data)
    }

    pub fn with_intq(mut self, intq: IntqInfoList<'a>) -> Self {
        self.intq = Some(intq);
        self
    }
}

fn check_extent(shape: &Shape, stride: &Stride, len: usize) -> Result<(), KernelError> {
    let needed = extent(shape, stride);
    if needed > len {
        return Err(KernelError::TensorTooSmall { needed, len });
    }
    Ok(())
}

// ============================================================================
// Operator parameter blocks
// ============================================================================

/// Zero padding in kernel order: `[w_end, h_end, w_begin, h_begin]`.
pub type Pads = [usize; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOrder {
    /// `[kh, kw, cin, cout]`
    Hwcn,
    /// `[cout, kh, kw, cin]`
    Nhwc,
}

/// Filter extent tagged with the order its dimensions are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterShape {
    pub order: FilterOrder,
    pub dims: [usize; 4],
}

impl FilterShape {
    pub const fn hwcn(dims: [usize; 4]) -> Self {
        Self {
            order: FilterOrder::Hwcn,
            dims,
        }
    }

    pub const fn nhwc(dims: [usize; 4]) -> Self {
        Self {
            order: FilterOrder::Nhwc,
            dims,
        }
    }

    pub const fn kernel(&self) -> [usize; 2] {
        match self.order {
            FilterOrder::Hwcn => [self.dims[0], self.dims[1]],
            FilterOrder::Nhwc => [self.dims[1], self.dims[2]],
        }
    }

    /// Input channels seen by one group.
    pub const fn in_channels(&self) -> usize {
        match self.order {
            FilterOrder::Hwcn => self.dims[2],
            FilterOrder::Nhwc => self.dims[3],
        }
    }

    pub const fn out_channels(&self) -> usize {
        match self.order {
            FilterOrder::Hwcn => self.dims[3],
            FilterOrder::Nhwc => self.dims[0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvArgs {
    pub filter: FilterShape,
    pub pads: Pads,
    /// `[h, w]`
    pub strides: [usize; 2],
    /// `[h, w]`
    pub dilations: [usize; 2],
    pub groups: usize,
}

/// Quantized convolution execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvStrategy {
    Pointwise,
    RgbInput,
    Depthwise,
    Dilated,
    GenericPerChannel,
    GenericInteger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmArgs {
    pub alpha: f32,
    pub beta: f32,
    pub trans_a: bool,
    pub trans_b: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Average { count_include_pad: bool },
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolArgs {
    pub kind: PoolKind,
    /// `[h, w]`
    pub kernel: [usize; 2],
    /// `[h, w]`
    pub strides: [usize; 2],
    pub pads: Pads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeMode {
    Nearest,
    Linear,
    Cubic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrnArgs {
    pub size: usize,
    pub alpha: f32,
    pub beta: f32,
    pub bias: f32,
}

/// Kernel entry symbol together with its parameter block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerOp {
    Conv2d(ConvArgs),
    Conv2dInteger { strategy: ConvStrategy, conv: ConvArgs },
    Gemm(GemmArgs),
    GemmInteger(GemmArgs),
    MatMul,
    QLinearMatMul,
    Pool(PoolArgs),
    PoolInteger(PoolArgs),
    Activ { func: ActivFn, args: ActivArgs },
    ActivInteger { func: ActivFn, args: ActivArgs },
    PRelu,
    Hardmax { axis: Axis },
    Eltwise { op: BinaryOp },
    EltwiseInteger { op: BinaryOp },
    /// Element-wise sum over every input in the chain.
    SumN,
    Reduce { op: BinaryOp, neutral: f32, axis: Axis },
    ReduceLogSumExp { axis: Axis },
    /// `scale` is `[h, w]`.
    Resize { mode: ResizeMode, scale: [f32; 2] },
    ResizeInteger { mode: ResizeMode, scale: [f32; 2] },
    /// Zero-insertion upsampling.
    Upsample { scale: [f32; 2] },
    UpsampleInteger { scale: [f32; 2] },
    Concat { axis: Axis },
    Softmax { axis: Axis },
    SoftmaxInteger { axis: Axis },
    Gather { axis: Axis },
    ArgReduce { kind: ArgKind, axis: Axis, select_last_index: bool },
    Lrn(LrnArgs),
    InstanceNorm { epsilon: f32 },
    LpNorm { axis: Axis, p: u32 },
    Sign,
    /// Repeat count per `[n, h, w, c]` axis.
    Tile { repeats: [usize; 4] },
    QuantizeLinear,
    DequantizeLinear,
    RequantizeLinear,
}

impl LayerOp {
    /// Kernel entry symbol, as a library would export it.
    pub fn symbol(&self) -> &'static str {
        match self {
            LayerOp::Conv2d(_) => "forward_conv2d",
            LayerOp::Conv2dInteger { strategy, .. } => match strategy {
                ConvStrategy::Pointwise => "forward_pw_integer",
                ConvStrategy::RgbInput => "forward_conv2d_rgb_integer",
                ConvStrategy::Depthwise => "forward_dw_integer",
                ConvStrategy::Dilated => "forward_conv2d_dilated_integer",
                ConvStrategy::GenericPerChannel => "forward_conv2d_integer_sssa_ch",
                ConvStrategy::GenericInteger => "forward_conv2d_integer",
            },
            LayerOp::Gemm(_) => "forward_gemm",
            LayerOp::GemmInteger(_) => "forward_gemm_integer",
            LayerOp::MatMul => "forward_matmul",
            LayerOp::QLinearMatMul => "forward_qlinearmatmul",
            LayerOp::Pool(args) => match args.kind {
                PoolKind::Average { .. } => "forward_ap",
                PoolKind::Max => "forward_mp",
            },
            LayerOp::PoolInteger(args) => match args.kind {
                PoolKind::Average { .. } => "forward_ap_integer",
                PoolKind::Max => "forward_mp_integer",
            },
            LayerOp::Activ { func, .. } => func.symbol(),
            LayerOp::ActivInteger { func, .. } => func.integer_symbol(),
            LayerOp::PRelu => "forward_prelu",
            LayerOp::Hardmax { .. } => "forward_hardmax",
            LayerOp::Eltwise { .. } => "forward_eltwise",
            LayerOp::EltwiseInteger { .. } => "forward_eltwise_integer",
            LayerOp::SumN => "forward_sum",
            LayerOp::Reduce { .. } => "forward_reduce",
            LayerOp::ReduceLogSumExp { .. } => "forward_reduce_log_sum_exp",
            LayerOp::Resize { .. } => "forward_resize",
            LayerOp::ResizeInteger { .. } => "forward_resize_integer",
            LayerOp::Upsample { .. } => "forward_upsample_zeros",
            LayerOp::UpsampleInteger { .. } => "forward_upsample_zeros_integer",
            LayerOp::Concat { .. } => "forward_concat",
            LayerOp::Softmax { .. } => "forward_sm",
            LayerOp::SoftmaxInteger { .. } => "forward_sm_integer",
            LayerOp::Gather { .. } => "forward_gather",
            LayerOp::ArgReduce { kind: ArgKind::Min, .. } => "forward_argmin",
            LayerOp::ArgReduce { kind: ArgKind::Max, .. } => "forward_argmax",
            LayerOp::Lrn(_) => "forward_lrn",
            LayerOp::InstanceNorm { .. } => "forward_instancenorm",
            LayerOp::LpNorm { .. } => "forward_lp_norm",
            LayerOp::Sign => "forward_sign",
            LayerOp::Tile { .. } => "forward_tile",
            LayerOp::QuantizeLinear => "forward_quantize_linear",
            LayerOp::DequantizeLinear => "forward_dequantize_linear",
            LayerOp::RequantizeLinear => "forward_requantize_linear",
        }
    }
}

// ============================================================================
// Layer
// ============================================================================

pub type TensorList<'a> = heapless::Vec<TensorObj<'a>, MAX_CHAIN>;

/// One kernel invocation: operator, input chain, weight chain, output.
#[derive(Debug)]
pub struct Layer<'a> {
    pub op: LayerOp,
    pub inputs: TensorList<'a>,
    pub weights: TensorList<'a>,
    pub output: TensorObjMut<'a>,
}

impl<'a> Layer<'a> {
    pub fn new(op: LayerOp, output: TensorObjMut<'a>) -> Self {
        Self {
            op,
            inputs: TensorList::new(),
            weights: TensorList::new(),
            output,
        }
    }

    pub fn with_input(mut self, t: TensorObj<'a>) -> Result<Self, KernelError> {
        self.inputs
            .push(t)
            .map_err(|_| KernelError::ChainFull(MAX_CHAIN))?;
        Ok(self)
    }

    pub fn with_weight(mut self, t: TensorObj<'a>) -> Result<Self, KernelError> {
        self.weights
            .push(t)
            .map_err(|_| KernelError::ChainFull(MAX_CHAIN))?;
        Ok(self)
    }

    pub fn input(&self, index: usize) -> Result<&TensorObj<'a>, KernelError> {
        operand(&self.inputs, "input", index)
    }

    pub fn weight(&self, index: usize) -> Result<&TensorObj<'a>, KernelError> {
        operand(&self.weights, "weight", index)
    }
}

/// Fetches `chain[index]` or reports which operand is missing.
pub fn operand<'l, 'a>(
    chain: &'l [TensorObj<'a>],
    name: &'static str,
    index: usize,
) -> Result<&'l TensorObj<'a>, KernelError> {
    chain
        .get(index)
        .ok_or(KernelError::MissingOperand { chain: name, index })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coords_visit_channel_fastest() {
        let shape = Shape::new(1, 2, 1, 2);
        let all: Vec<Coord> = shape.coords().collect();
        assert_eq!(
            all,
            vec![[0, 0, 0, 0], [0, 0, 0, 1], [0, 1, 0, 0], [0, 1, 0, 1]]
        );
        assert_eq!(Shape::new(1, 0, 3, 3).coords().count(), 0);
    }

    #[test]
    fn test_unravel_matches_contiguous_offset() {
        let shape = Shape::new(2, 3, 4, 5);
        let stride = shape.contiguous();
        for i in 0..shape.size() {
            assert_eq!(stride.offset(shape.unravel(i)), i);
        }
    }

    #[test]
    fn test_tensor_obj_rejects_short_slice() {
        let data = [0.0f32; 5];
        let err = TensorObj::contiguous(Shape::new(1, 1, 2, 3), Buf::F32(&data)).unwrap_err();
        assert_eq!(err, KernelError::TensorTooSmall { needed: 6, len: 5 });
    }

    #[test]
    fn test_padded_stride_extent() {
        // Rows padded to 4 elements, 3 used.
        let shape = Shape::new(1, 2, 3, 1);
        let stride = Stride::new(8, 4, 1, 1);
        assert_eq!(extent(&shape, &stride), 7);
        let data = [0u8; 7];
        assert!(TensorObj::new(shape, stride, Buf::U8(&data)).is_ok());
    }

    #[test]
    fn test_chain_capacity() {
        let x = [1.0f32];
        let mut y = [0.0f32];
        let t = TensorObj::contiguous(Shape::new(1, 1, 1, 1), Buf::F32(&x)).unwrap();
        let out = TensorObjMut::contiguous(Shape::new(1, 1, 1, 1), BufMut::F32(&mut y)).unwrap();
        let mut layer = Layer::new(LayerOp::SumN, out);
        for _ in 0..MAX_CHAIN {
            layer = layer.with_input(t).unwrap();
        }
        assert_eq!(
            layer.with_input(t).unwrap_err(),
            KernelError::ChainFull(MAX_CHAIN)
        );
    }

    #[test]
    fn test_per_channel_entry_follows_axis() {
        let scale = [0.5f32, 0.25];
        let zp = [3u8, 7];
        let mut q = IntqInfoList::per_tensor(&scale, ZeroPoints::U8(&zp), OffsetFormat::U8);
        q.size = 2;
        q.flags.channel_axis = Axis::Batch;
        assert!(q.validate(&Shape::new(2, 3, 3, 1)).is_ok());
        assert!(q.validate(&Shape::new(3, 3, 3, 2)).is_err());
        assert_eq!(q.scale_at([1, 0, 0, 0]), 0.25);
        assert_eq!(q.zero_point_at([1, 2, 2, 0]), 7);
        assert_eq!(q.zero_point_at([0, 2, 2, 0]), 3);
    }

    #[test]
    fn test_filter_shape_orders_agree() {
        let a = FilterShape::hwcn([3, 5, 2, 8]);
        let b = FilterShape::nhwc([8, 3, 5, 2]);
        assert_eq!(a.kernel(), b.kernel());
        assert_eq!(a.in_channels(), b.in_channels());
        assert_eq!(a.out_channels(), b.out_channels());
    }
}
