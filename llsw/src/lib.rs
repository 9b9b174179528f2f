//! Software-fallback operator dispatch for float and affine-quantized NN nodes.
//!
//! A graph interpreter fills one parameter struct per software-assigned
//! node and hands it to [`registry::forward`], which assembles the
//! layer object for the node's kernel and submits it to a [`Forward`]
//! library.
//!
//! - `ir`: tensor descriptors, per-operator parameter structs, node types
//! - `axis`: logical axis index to layout axis
//! - `dispatch`: the float and quantized lowering functions
//! - `registry`: node type to dispatch function
//!
//! [`Forward`]: llsw_kernels::Forward

#![cfg_attr(not(test), no_std)]

pub mod axis;
pub mod dispatch;
pub mod error;
pub mod ir;
pub mod registry;

pub use error::{Error, Result};
pub use llsw_kernels as kernels;
pub use registry::{float_forward, forward, integer_forward, lookup, ForwardFn};
