use core::fmt;
use core::num::NonZeroU32;

use crate::CoreError;

/// Identifier of an owning component (a part whose results are scoped to it).
///
/// - user-visible ids start at 1
/// - `NonZero` keeps `Option<OwnerId>` the same size as `OwnerId`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OwnerId(NonZeroU32);

impl OwnerId {
    pub fn new(value: u32) -> Result<Self, CoreError> {
        NonZeroU32::new(value)
            .map(Self)
            .ok_or(CoreError::InvalidOwnerId { value })
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.get())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
