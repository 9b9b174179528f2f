//! Node-level data model: tensor descriptors, node kinds and the
//! parameter structs a node is dispatched with.

pub mod node;
pub mod params;
pub mod tensor;

pub use node::{Domain, NodeType};
pub use params::*;
pub use tensor::{Dim, Format, Quant, Stride, Tensor, TensorMut};
