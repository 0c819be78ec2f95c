use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type AccountId = String;
pub type Amount = u64;

/// The null identity. It can never hold value or own tokens.
pub fn is_null(account: &str) -> bool {
    account.is_empty()
}

/// Value ledger for the smallest indivisible unit of the payment system.
///
/// Besides spendable balances it tracks, per account, the total amount ever
/// credited. That counter is monotone and is what the payment splitter reads
/// as `total_received` for its holding account.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bank {
    accounts: BTreeMap<AccountId, Amount>,
    received: BTreeMap<AccountId, Amount>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available(&self, account: &str) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    /// Cumulative credits into `account` over its whole lifetime.
    pub fn total_received(&self, account: &str) -> Amount {
        self.received.get(account).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, account: &AccountId, amount: Amount) {
        *self.accounts.entry(account.clone()).or_default() += amount;
        *self.received.entry(account.clone()).or_default() += amount;
    }

    pub fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<(), Error> {
        let balance = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| Error::UnknownAccount(account.clone()))?;
        if *balance < amount {
            return Err(Error::InsufficientFunds(account.clone()));
        }
        *balance -= amount;
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), Error> {
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, Amount)> {
        self.accounts.iter().map(|(id, amount)| (id, *amount))
    }
}
