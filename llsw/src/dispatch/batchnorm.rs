//! Batch normalisation, computed here rather than in a kernel.
//!
//! `y = (x - mean[c]) / sqrt(var[c] + 1e-5) * scale[c] + bias[c]`

use libm::sqrtf;
use llsw_kernels::TensorObj;

use super::{input, output};
use crate::error::{Error, Result};
use crate::ir::{BatchNormParams, NodeType, Tensor};

/// Fixed variance epsilon.
pub const EPSILON: f32 = 1e-5;

/// One per-channel statistics vector.
struct ChannelStat<'a> {
    obj: TensorObj<'a>,
    data: &'a [f32],
}

impl<'a> ChannelStat<'a> {
    fn new(node: NodeType, name: &'static str, t: &Tensor<'a>, channels: usize) -> Result<Self> {
        let obj = input(node, name, t)?;
        if obj.shape.size() != channels {
            return Err(Error::ShapeMismatch {
                node,
                what: "statistics length differs from the channel count",
            });
        }
        let data = obj.data.as_f32()?;
        Ok(Self { obj, data })
    }

    #[inline]
    fn at(&self, c: usize) -> f32 {
        self.data[self.obj.flat(c)]
    }
}

pub fn batch_norm(p: &mut BatchNormParams<'_>) -> Result<()> {
    let node = p.general.node_type;
    let x = input(node, "input", &p.general.input)?;
    let shape = x.shape;
    if shape.c == 0 {
        return Err(Error::InvalidParameter {
            node,
            what: "channel count of zero",
        });
    }
    if shape.size() == 0 {
        return Err(Error::InvalidParameter {
            node,
            what: "element count of zero",
        });
    }
    let xd = x.data.as_f32()?;

    let scale = ChannelStat::new(node, "scale", &p.scale, shape.c)?;
    let bias = ChannelStat::new(node, "bias", &p.bias, shape.c)?;
    let mean = ChannelStat::new(node, "mean", &p.mean, shape.c)?;
    let var = ChannelStat::new(node, "var", &p.var, shape.c)?;

    let mut y = output(node, &mut p.general.output)?;
    if y.shape != shape {
        return Err(Error::ShapeMismatch {
            node,
            what: "output shape differs from input",
        });
    }
    let stride = y.stride;
    let yd = y.data.as_f32_mut()?;

    log::trace!("{node:?} -> in-core batch norm over {} channels", shape.c);
    for at in shape.coords() {
        let c = at[3];
        let norm = (xd[x.offset(at)] - mean.at(c)) / sqrtf(var.at(c) + EPSILON);
        yd[stride.offset(at)] = norm * scale.at(c) + bias.at(c);
    }
    Ok(())
}
