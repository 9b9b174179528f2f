//! The closed set of node kinds the software path can execute.

use super::params::ParamsKind;

/// Numeric domain a node kind runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Float,
    Integer,
}

macro_rules! node_types {
    ($($name:ident => $domain:ident, $kind:ident;)*) => {
        /// Dispatch key of a software-assigned node.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum NodeType {
            $($name,)*
        }

        impl NodeType {
            pub const ALL: &'static [NodeType] = &[$(NodeType::$name,)*];

            pub const fn domain(self) -> Domain {
                match self {
                    $(NodeType::$name => Domain::$domain,)*
                }
            }

            /// Parameter struct a node of this kind is dispatched with.
            pub const fn params_kind(self) -> ParamsKind {
                match self {
                    $(NodeType::$name => ParamsKind::$kind,)*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(NodeType::$name => stringify!($name),)*
                }
            }
        }
    };
}

node_types! {
    // ------------------------------------------------------------------------
    // Float
    // ------------------------------------------------------------------------
    Conv => Float, Conv;
    Gemm => Float, Gemm;
    MatMul => Float, Matmul;
    PoolAverage => Float, Pool;
    PoolMax => Float, Pool;
    GlobalPoolAverage => Float, GlobalPool;
    GlobalPoolMax => Float, GlobalPool;

    ActivRelu => Float, Activ;
    ActivPRelu => Float, Activ;
    ActivElu => Float, Activ;
    ActivThresholdedRelu => Float, Activ;
    ActivSelu => Float, Activ;
    ActivLeakyRelu => Float, Activ;
    ActivClip => Float, Activ;
    ActivAbs => Float, Activ;
    ActivAcos => Float, Activ;
    ActivAcosh => Float, Activ;
    ActivAsin => Float, Activ;
    ActivAsinh => Float, Activ;
    ActivAtan => Float, Activ;
    ActivAtanh => Float, Activ;
    ActivCos => Float, Activ;
    ActivCosh => Float, Activ;
    ActivSin => Float, Activ;
    ActivSinh => Float, Activ;
    ActivTan => Float, Activ;
    ActivTanh => Float, Activ;
    ActivSigmoid => Float, Activ;
    ActivSoftsign => Float, Activ;
    ActivSoftplus => Float, Activ;
    ActivHardSigmoid => Float, Activ;
    ActivHardSwish => Float, Activ;
    ActivHardmax => Float, Activ;
    ActivGelu => Float, Activ;
    ActivCeil => Float, Activ;
    ActivFloor => Float, Activ;
    ActivRound => Float, Activ;
    ActivExp => Float, Activ;
    ActivLog => Float, Activ;
    ActivNeg => Float, Activ;
    ActivNot => Float, Activ;
    ActivReciprocal => Float, Activ;
    ActivSqrt => Float, Activ;
    ActivErf => Float, Activ;

    ArithAdd => Float, Arith;
    ArithSum => Float, Arith;
    ArithSub => Float, Arith;
    ArithMul => Float, Arith;
    ArithDiv => Float, Arith;
    ArithPow => Float, Arith;
    ArithGreater => Float, Arith;
    ArithGreaterOrEqual => Float, Arith;
    ArithLess => Float, Arith;
    ArithLessOrEqual => Float, Arith;
    ArithEqual => Float, Arith;
    ArithMin => Float, Arith;
    ArithMax => Float, Arith;
    ArithMod => Float, Arith;

    ReduceSum => Float, Reduce;
    ReduceMin => Float, Reduce;
    ReduceMax => Float, Reduce;
    ReduceProd => Float, Reduce;
    ReduceLogSumExp => Float, Reduce;

    Resize => Float, Resize;
    Concat => Float, Concat;
    Softmax => Float, Softmax;
    Gather => Float, Gather;
    ArgMin => Float, Arg;
    ArgMax => Float, Arg;
    Lrn => Float, Lrn;
    InstanceNorm => Float, InstanceNorm;
    LpNormalization => Float, LpNorm;
    Sign => Float, Sign;
    Tile => Float, Tile;
    BatchNorm => Float, BatchNorm;

    // ------------------------------------------------------------------------
    // Integer
    // ------------------------------------------------------------------------
    ConvInteger => Integer, ConvInteger;
    QLinearConv => Integer, ConvInteger;
    GemmInteger => Integer, GemmInteger;
    QLinearMatMul => Integer, QLinearMatMul;
    PoolAverageInteger => Integer, PoolInteger;
    PoolMaxInteger => Integer, PoolInteger;
    GlobalPoolAverageInteger => Integer, GlobalPoolInteger;
    GlobalPoolMaxInteger => Integer, GlobalPoolInteger;
    ActivReluInteger => Integer, ActivInteger;
    ActivLeakyReluInteger => Integer, ActivInteger;
    ActivClipInteger => Integer, ActivInteger;
    ActivSigmoidInteger => Integer, ActivInteger;
    ActivTanhInteger => Integer, ActivInteger;
    ArithAddInteger => Integer, ArithInteger;
    ArithSubInteger => Integer, ArithInteger;
    ArithMulInteger => Integer, ArithInteger;
    ArithDivInteger => Integer, ArithInteger;
    SoftmaxInteger => Integer, SoftmaxInteger;
    ResizeInteger => Integer, ResizeInteger;
    QuantizeLinear => Integer, Quantize;
    DequantizeLinear => Integer, Dequantize;
    RequantizeLinear => Integer, Requantize;
}
