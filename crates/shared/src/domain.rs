use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of buttons every published configuration carries.
pub const BUTTON_COUNT: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must be in 0..={max}, got {value}")]
pub struct RangeError {
    pub field: &'static str,
    pub value: i64,
    pub max: u8,
}

macro_rules! bounded_newtype {
    ($name:ident, $field:literal, $max:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "u8")]
        pub struct $name(u8);

        impl $name {
            pub const MAX: u8 = $max;

            pub fn new(value: u8) -> Result<Self, RangeError> {
                Self::try_from(i64::from(value))
            }

            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = RangeError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                if (0..=i64::from($max)).contains(&value) {
                    Ok(Self(value as u8))
                } else {
                    Err(RangeError {
                        field: $field,
                        value,
                        max: $max,
                    })
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

bounded_newtype!(Channel, "channel", 15);
bounded_newtype!(TriggerCode, "note", 127);
bounded_newtype!(Intensity, "velocity", 127);

/// Position of a button in the configured grid. Only constructed through
/// [`ButtonIndex::checked`], so a held value is always addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonIndex(usize);

impl ButtonIndex {
    /// Accepts `raw` only when it falls inside `[0, BUTTON_COUNT)` and inside
    /// the `available` button count of the snapshot being consulted.
    pub fn checked(raw: i64, available: usize) -> Option<Self> {
        let index = usize::try_from(raw).ok()?;
        (index < BUTTON_COUNT && index < available).then_some(Self(index))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
