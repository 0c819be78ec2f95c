use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bank::{is_null, AccountId, Amount, Bank};
use crate::error::Error;

/// Pull-based payment splitter over a fixed payee roster.
///
/// Value accumulates in the splitter's holding account; each payee withdraws
/// its proportional entitlement itself. Entitlements are floor-divided, so a
/// residual of at most `total_shares - 1` units stays with the holding account
/// rather than ever being paid twice.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Splitter {
    account: AccountId,
    payees: Vec<AccountId>,
    shares: BTreeMap<AccountId, u64>,
    released: BTreeMap<AccountId, Amount>,
    total_shares: u64,
    total_released: Amount,
}

impl Splitter {
    /// The payee roster and share weights are fixed here for good.
    pub fn new(account: AccountId, payees: Vec<(AccountId, u64)>) -> Result<Self, Error> {
        if payees.is_empty() {
            return Err(Error::NoPayees);
        }
        let mut roster = Vec::with_capacity(payees.len());
        let mut shares = BTreeMap::new();
        let mut total_shares = 0u64;
        for (payee, weight) in payees {
            if is_null(&payee) {
                return Err(Error::NoPayees);
            }
            if weight == 0 {
                return Err(Error::ZeroShares(payee));
            }
            if shares.contains_key(&payee) {
                return Err(Error::DuplicatePayee(payee));
            }
            shares.insert(payee.clone(), weight);
            roster.push(payee);
            total_shares += weight;
        }
        Ok(Self {
            account,
            payees: roster,
            shares,
            released: BTreeMap::new(),
            total_shares,
            total_released: 0,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn total_shares(&self) -> u64 {
        self.total_shares
    }

    pub fn total_released(&self) -> Amount {
        self.total_released
    }

    pub fn shares(&self, account: &str) -> u64 {
        self.shares.get(account).copied().unwrap_or(0)
    }

    pub fn released(&self, account: &str) -> Amount {
        self.released.get(account).copied().unwrap_or(0)
    }

    /// Payee at `index` in construction order.
    pub fn payee(&self, index: usize) -> Option<&AccountId> {
        self.payees.get(index)
    }

    pub fn payee_count(&self) -> usize {
        self.payees.len()
    }

    /// Pay out everything `payee` is entitled to but has not yet drawn.
    ///
    /// Only the payee itself may trigger its own release. The entitlement is
    /// recomputed from the holding account's lifetime receipts, so value that
    /// arrived since the last draw becomes claimable with no further
    /// registration step.
    pub fn release(
        &mut self,
        bank: &mut Bank,
        caller: &AccountId,
        payee: &AccountId,
    ) -> Result<Amount, Error> {
        if caller != payee {
            return Err(Error::NotPayee);
        }
        let weight = self.shares.get(payee).copied().ok_or(Error::NoShares)?;
        let total_received = bank.total_received(&self.account);
        let entitlement =
            (total_received as u128 * weight as u128 / self.total_shares as u128) as Amount;
        let drawn = self.released(payee);
        if entitlement <= drawn {
            return Err(Error::NothingDue);
        }
        let due = entitlement - drawn;

        // bookkeeping first, the outbound transfer strictly last
        self.released.insert(payee.clone(), entitlement);
        self.total_released += due;
        bank.transfer(&self.account, payee, due)?;
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_80_20() -> Splitter {
        Splitter::new(
            "splitter".into(),
            vec![("bob".into(), 80), ("carol".into(), 20)],
        )
        .unwrap()
    }

    #[test]
    fn construction_fixes_roster_and_shares() {
        let splitter = split_80_20();
        assert_eq!(splitter.total_shares(), 100);
        assert_eq!(splitter.shares("bob"), 80);
        assert_eq!(splitter.shares("carol"), 20);
        assert_eq!(splitter.shares("dave"), 0);
        assert_eq!(splitter.payee(0).unwrap(), "bob");
        assert_eq!(splitter.payee(1).unwrap(), "carol");
        assert_eq!(splitter.payee(2), None);
        assert_eq!(splitter.payee_count(), 2);
        assert_eq!(splitter.total_released(), 0);
    }

    #[test]
    fn construction_rejects_bad_rosters() {
        assert_eq!(
            Splitter::new("splitter".into(), vec![]),
            Err(Error::NoPayees)
        );
        assert_eq!(
            Splitter::new("splitter".into(), vec![("bob".into(), 0)]),
            Err(Error::ZeroShares("bob".into()))
        );
        assert_eq!(
            Splitter::new(
                "splitter".into(),
                vec![("bob".into(), 80), ("bob".into(), 20)]
            ),
            Err(Error::DuplicatePayee("bob".into()))
        );
    }

    #[test]
    fn release_pays_proportional_entitlements_exactly_once() {
        let mut splitter = split_80_20();
        let mut bank = Bank::new();
        bank.credit(&"splitter".to_string(), 300);

        let paid_b = splitter
            .release(&mut bank, &"bob".into(), &"bob".into())
            .unwrap();
        let paid_c = splitter
            .release(&mut bank, &"carol".into(), &"carol".into())
            .unwrap();
        assert_eq!(paid_b, 240);
        assert_eq!(paid_c, 60);
        assert_eq!(splitter.released("bob"), 240);
        assert_eq!(splitter.released("carol"), 60);
        assert_eq!(splitter.total_released(), 300);
        assert_eq!(bank.available("splitter"), 0);

        // a second draw before new value arrives finds nothing due
        assert_eq!(
            splitter.release(&mut bank, &"bob".into(), &"bob".into()),
            Err(Error::NothingDue)
        );
        assert_eq!(
            splitter.release(&mut bank, &"carol".into(), &"carol".into()),
            Err(Error::NothingDue)
        );
    }

    #[test]
    fn later_receipts_become_claimable() {
        let mut splitter = split_80_20();
        let mut bank = Bank::new();
        bank.credit(&"splitter".to_string(), 100);
        assert_eq!(
            splitter
                .release(&mut bank, &"bob".into(), &"bob".into())
                .unwrap(),
            80
        );
        bank.credit(&"splitter".to_string(), 100);
        assert_eq!(
            splitter
                .release(&mut bank, &"bob".into(), &"bob".into())
                .unwrap(),
            80
        );
        // carol draws her share of both receipts in one pull
        assert_eq!(
            splitter
                .release(&mut bank, &"carol".into(), &"carol".into())
                .unwrap(),
            40
        );
    }

    #[test]
    fn only_the_payee_itself_may_release() {
        let mut splitter = split_80_20();
        let mut bank = Bank::new();
        bank.credit(&"splitter".to_string(), 300);
        assert_eq!(
            splitter.release(&mut bank, &"alice".into(), &"bob".into()),
            Err(Error::NotPayee)
        );
        assert_eq!(
            splitter.release(&mut bank, &"dave".into(), &"dave".into()),
            Err(Error::NoShares)
        );
        assert_eq!(bank.available("splitter"), 300);
    }

    #[test]
    fn floor_division_biases_residue_toward_the_holding_account() {
        let mut splitter = Splitter::new(
            "splitter".into(),
            vec![("bob".into(), 1), ("carol".into(), 2)],
        )
        .unwrap();
        let mut bank = Bank::new();
        bank.credit(&"splitter".to_string(), 100);

        // 100 * 1/3 = 33, 100 * 2/3 = 66; one unit stays behind
        assert_eq!(
            splitter
                .release(&mut bank, &"bob".into(), &"bob".into())
                .unwrap(),
            33
        );
        assert_eq!(
            splitter
                .release(&mut bank, &"carol".into(), &"carol".into())
                .unwrap(),
            66
        );
        assert_eq!(splitter.total_released(), 99);
        assert_eq!(bank.available("splitter"), 1);
    }

    #[test]
    fn release_with_no_receipts_finds_nothing_due() {
        let mut splitter = split_80_20();
        let mut bank = Bank::new();
        assert_eq!(
            splitter.release(&mut bank, &"bob".into(), &"bob".into()),
            Err(Error::NothingDue)
        );
    }
}
