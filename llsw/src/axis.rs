//! Logical axis indices (batch, channel, height, width order) to the
//! kernels' channel-last axes.

use llsw_kernels::Axis;

use crate::error::{Error, Result};

/// Maps a logical axis `0..=3` to the layout axis it names.
pub fn shape_axis(axis: i32) -> Result<Axis> {
    match axis {
        0 => Ok(Axis::Batch),
        1 => Ok(Axis::Channel),
        2 => Ok(Axis::Height),
        3 => Ok(Axis::Width),
        other => Err(Error::InvalidAxis(other)),
    }
}

/// Inverse of [`shape_axis`].
pub const fn logical_axis(axis: Axis) -> i32 {
    match axis {
        Axis::Batch => 0,
        Axis::Channel => 1,
        Axis::Height => 2,
        Axis::Width => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_axes_are_distinct() {
        let mapped: Vec<Axis> = (0..4).map(|a| shape_axis(a).unwrap()).collect();
        for (i, a) in mapped.iter().enumerate() {
            assert!(!mapped[i + 1..].contains(a));
        }
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        assert_eq!(shape_axis(4), Err(Error::InvalidAxis(4)));
        assert_eq!(shape_axis(-1), Err(Error::InvalidAxis(-1)));
    }

    proptest! {
        #[test]
        fn prop_axis_round_trip(axis in 0i32..4) {
            prop_assert_eq!(logical_axis(shape_axis(axis).unwrap()), axis);
        }

        #[test]
        fn prop_invalid_axis_rejected(axis in any::<i32>().prop_filter("outside 0..4", |a| !(0..4).contains(a))) {
            prop_assert_eq!(shape_axis(axis), Err(Error::InvalidAxis(axis)));
        }
    }
}
