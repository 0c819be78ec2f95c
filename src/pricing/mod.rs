use serde::{Deserialize, Serialize};

use crate::bank::Amount;
use crate::error::Error;

/// Tiered mint pricing: the first `free_mints` tokens cost nothing, then the
/// price climbs by `step_price` every `stride` mints.
///
/// The schedule is a pure function of the registry's mint counter; it holds no
/// counters of its own.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceSchedule {
    free_mints: u64,
    stride: u64,
    step_price: Amount,
}

impl PriceSchedule {
    pub fn new(free_mints: u64, stride: u64, step_price: Amount) -> Result<Self, Error> {
        if stride == 0 {
            return Err(Error::ZeroStride);
        }
        Ok(Self {
            free_mints,
            stride,
            step_price,
        })
    }

    pub fn free_mints(&self) -> u64 {
        self.free_mints
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn step_price(&self) -> Amount {
        self.step_price
    }

    pub fn set_free_mints(&mut self, free_mints: u64) {
        self.free_mints = free_mints;
    }

    pub fn set_stride(&mut self, stride: u64) -> Result<(), Error> {
        if stride == 0 {
            return Err(Error::ZeroStride);
        }
        self.stride = stride;
        Ok(())
    }

    pub fn set_step_price(&mut self, step_price: Amount) {
        self.step_price = step_price;
    }

    /// Completed pricing tiers once `minted` tokens have been issued.
    pub fn steps(&self, minted: u64) -> u64 {
        if minted < self.free_mints {
            0
        } else {
            (minted - self.free_mints) / self.stride
        }
    }

    /// Exact value that must accompany the next mint when `minted` tokens
    /// have been issued so far.
    pub fn price(&self, minted: u64) -> Amount {
        if minted < self.free_mints {
            0
        } else {
            (self.steps(minted) + 1) * self.step_price
        }
    }
}
