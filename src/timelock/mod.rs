use serde::{Deserialize, Serialize};

use crate::bank::{is_null, AccountId, Amount, Bank};
use crate::error::Error;

/// Single-shot time-gated fund release.
///
/// Value parked in the holding account stays locked until `release_time`;
/// afterwards anyone may trigger the payout, but the destination is fixed at
/// construction. Releasing an already-emptied lock transfers zero and is not
/// an error.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timelock {
    account: AccountId,
    beneficiary: AccountId,
    release_time: u64,
    released: bool,
}

impl Timelock {
    pub fn new(
        account: AccountId,
        beneficiary: AccountId,
        release_time: u64,
    ) -> Result<Self, Error> {
        if is_null(&beneficiary) {
            return Err(Error::NullBeneficiary);
        }
        Ok(Self {
            account,
            beneficiary,
            release_time,
            released: false,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn beneficiary(&self) -> &str {
        &self.beneficiary
    }

    pub fn release_time(&self) -> u64 {
        self.release_time
    }

    pub fn released(&self) -> bool {
        self.released
    }

    /// Move the entire held balance to the beneficiary. Permissionless, but
    /// only at or after `release_time`.
    pub fn release(&mut self, bank: &mut Bank, now: u64) -> Result<Amount, Error> {
        if now < self.release_time {
            return Err(Error::BeforeReleaseTime);
        }
        let held = bank.available(&self.account);
        self.released = true;
        if held > 0 {
            bank.transfer(&self.account, &self.beneficiary, held)?;
        }
        Ok(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;

    #[test]
    fn rejects_a_null_beneficiary() {
        assert_eq!(
            Timelock::new("lock".into(), "".into(), DAY),
            Err(Error::NullBeneficiary)
        );
    }

    #[test]
    fn release_is_gated_by_the_deadline() {
        let mut lock = Timelock::new("lock".into(), "bob".into(), DAY).unwrap();
        let mut bank = Bank::new();
        bank.credit(&"lock".to_string(), 100);

        assert_eq!(lock.release(&mut bank, 0), Err(Error::BeforeReleaseTime));
        assert_eq!(
            lock.release(&mut bank, DAY - 1),
            Err(Error::BeforeReleaseTime)
        );
        assert!(!lock.released());
        assert_eq!(bank.available("lock"), 100);

        // the boundary itself is inclusive
        assert_eq!(lock.release(&mut bank, DAY), Ok(100));
        assert!(lock.released());
        assert_eq!(bank.available("lock"), 0);
        assert_eq!(bank.available("bob"), 100);
    }

    #[test]
    fn releasing_an_empty_lock_is_a_no_op() {
        let mut lock = Timelock::new("lock".into(), "bob".into(), DAY).unwrap();
        let mut bank = Bank::new();
        bank.credit(&"lock".to_string(), 100);

        assert_eq!(lock.release(&mut bank, DAY + 1), Ok(100));
        assert_eq!(lock.release(&mut bank, DAY + 2), Ok(0));
        assert_eq!(bank.available("bob"), 100);
    }

    #[test]
    fn anyone_may_trigger_but_the_destination_is_fixed() {
        let mut lock = Timelock::new("lock".into(), "bob".into(), DAY).unwrap();
        let mut bank = Bank::new();
        bank.credit(&"lock".to_string(), 40);

        // no caller parameter exists: the trigger carries no authority and
        // the payout lands with the beneficiary regardless
        lock.release(&mut bank, DAY).unwrap();
        assert_eq!(bank.available("bob"), 40);
    }
}
