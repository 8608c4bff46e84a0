//! Strongly-typed time scalars.
//!
//! The planner's internal time unit is always minutes (see `DESIGN.md`'s Open
//! Question decisions). A live data source stores cycle times in seconds; wrapping
//! both units in distinct newtypes means a value read in the wrong unit cannot
//! silently participate in arithmetic with a value in the right one — the compiler
//! forces an explicit `Seconds::to_minutes` conversion at the source boundary.
use derive_more::{Add, Display, Sub};
use serde::{Deserialize, Serialize};

/// A duration or point in time expressed in minutes, the planner's canonical unit.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Add, Sub, Display, Serialize, Deserialize,
)]
pub struct Minutes(pub f64);

impl Minutes {
    pub const ZERO: Minutes = Minutes(0.0);

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::ops::Mul<f64> for Minutes {
    type Output = Minutes;
    fn mul(self, rhs: f64) -> Minutes {
        Minutes(self.0 * rhs)
    }
}

/// A duration expressed in seconds, as stored by the live tabular data source.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Add, Sub, Display, Serialize, Deserialize,
)]
pub struct Seconds(pub f64);

impl Seconds {
    #[must_use]
    pub fn to_minutes(self) -> Minutes {
        Minutes(self.0 / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_converts_to_minutes() {
        assert_eq!(Seconds(90.0).to_minutes(), Minutes(1.5));
    }

    #[test]
    fn minutes_scale_by_quantity() {
        assert_eq!(Minutes(2.0) * 3.0, Minutes(6.0));
    }
}
