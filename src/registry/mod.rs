use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bank::{is_null, AccountId, Amount, Bank};
use crate::error::Error;
use crate::pricing::PriceSchedule;

pub type TokenId = u64;

/// Construction-time configuration. The admin controls the pause gate and the
/// pricing knobs; the treasury receives every paid mint's attached value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    pub name: String,
    pub symbol: String,
    pub max_supply: u64,
    pub admin: AccountId,
    pub treasury: AccountId,
}

/// Ownership ledger for uniquely identified tokens.
///
/// One owner per live token, a single approved spender slot per token, and
/// per-account operator sets. Burned ids are retired permanently and are never
/// handed out again, so the ledger satisfies
/// `sum(balance_of) == mint_count - burn_count` under any call sequence.
///
/// Every mutating operation validates first, updates all bookkeeping second,
/// and only then moves value through the bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registry {
    config: RegistryConfig,
    pricing: PriceSchedule,
    paused: bool,
    base_uri: String,
    owners: BTreeMap<TokenId, AccountId>,
    balances: BTreeMap<AccountId, u64>,
    approvals: BTreeMap<TokenId, AccountId>,
    operators: BTreeMap<AccountId, BTreeSet<AccountId>>,
    retired: BTreeSet<TokenId>,
    labels: BTreeMap<TokenId, String>,
    messages: BTreeMap<TokenId, String>,
    mint_count: u64,
    burn_count: u64,
    next_id: TokenId,
}

impl Registry {
    /// A fresh registry starts paused; the admin opens minting explicitly.
    pub fn new(config: RegistryConfig, pricing: PriceSchedule) -> Self {
        Self {
            config,
            pricing,
            paused: true,
            base_uri: String::new(),
            owners: BTreeMap::new(),
            balances: BTreeMap::new(),
            approvals: BTreeMap::new(),
            operators: BTreeMap::new(),
            retired: BTreeSet::new(),
            labels: BTreeMap::new(),
            messages: BTreeMap::new(),
            mint_count: 0,
            burn_count: 0,
            next_id: 1,
        }
    }

    //---------- reads ----------//

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn max_supply(&self) -> u64 {
        self.config.max_supply
    }

    pub fn admin(&self) -> &str {
        &self.config.admin
    }

    pub fn treasury(&self) -> &str {
        &self.config.treasury
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn mint_count(&self) -> u64 {
        self.mint_count
    }

    pub fn burn_count(&self) -> u64 {
        self.burn_count
    }

    pub fn pricing(&self) -> &PriceSchedule {
        &self.pricing
    }

    /// Exact value the next mint must attach.
    pub fn price(&self) -> Amount {
        self.pricing.price(self.mint_count)
    }

    /// Completed pricing tiers so far.
    pub fn steps(&self) -> u64 {
        self.pricing.steps(self.mint_count)
    }

    pub fn owner_of(&self, id: TokenId) -> Result<&AccountId, Error> {
        self.owners.get(&id).ok_or(Error::UnknownToken(id))
    }

    pub fn balance_of(&self, account: &str) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn get_approved(&self, id: TokenId) -> Result<Option<&AccountId>, Error> {
        if !self.owners.contains_key(&id) {
            return Err(Error::UnknownToken(id));
        }
        Ok(self.approvals.get(&id))
    }

    pub fn is_approved_for_all(&self, owner: &str, operator: &str) -> bool {
        self.operators
            .get(owner)
            .map(|set| set.contains(operator))
            .unwrap_or(false)
    }

    pub fn token_uri(&self, id: TokenId) -> Result<String, Error> {
        self.owner_of(id)?;
        Ok(format!("{}{}", self.base_uri, id))
    }

    pub fn label(&self, id: TokenId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn message(&self, id: TokenId) -> Option<&str> {
        self.messages.get(&id).map(String::as_str)
    }

    //---------- minting ----------//

    /// Mint a token to `to`, with an optional caller-chosen id.
    ///
    /// Gate order: pause, supply cap, recipient and id validation, exact
    /// payment, caller funds. Only then is the ledger mutated, and the
    /// attached value moves to the treasury strictly last.
    pub fn mint(
        &mut self,
        bank: &mut Bank,
        caller: &AccountId,
        to: &AccountId,
        id: Option<TokenId>,
        value: Amount,
    ) -> Result<TokenId, Error> {
        if self.paused {
            return Err(Error::Paused);
        }
        if self.mint_count + 1 > self.config.max_supply {
            return Err(Error::MaxSupplyReached);
        }
        if is_null(to) {
            return Err(Error::MintToNull);
        }
        let (id, auto_assigned) = match id {
            Some(id) => {
                if self.owners.contains_key(&id) {
                    return Err(Error::AlreadyMinted(id));
                }
                if self.retired.contains(&id) {
                    return Err(Error::Retired(id));
                }
                (id, false)
            }
            None => (self.next_free_id(), true),
        };
        let price = self.pricing.price(self.mint_count);
        if value != price {
            return Err(Error::WrongMintValue { price, sent: value });
        }
        if value > 0 && bank.available(caller) < value {
            return Err(Error::InsufficientFunds(caller.clone()));
        }

        self.owners.insert(id, to.clone());
        *self.balances.entry(to.clone()).or_default() += 1;
        self.approvals.remove(&id);
        self.mint_count += 1;
        if auto_assigned {
            self.next_id = id + 1;
        }

        if value > 0 {
            bank.transfer(caller, &self.config.treasury, value)?;
        }
        Ok(id)
    }

    /// Smallest id that has never been owned or retired, starting from 1.
    fn next_free_id(&self) -> TokenId {
        let mut id = self.next_id;
        while self.owners.contains_key(&id) || self.retired.contains(&id) {
            id += 1;
        }
        id
    }

    //---------- transfers, approvals, burning ----------//

    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        id: TokenId,
    ) -> Result<(), Error> {
        self.require_token_authority(caller, id)?;
        let owner = self.owner_of(id)?.clone();
        if &owner != from {
            return Err(Error::WrongOwner);
        }
        if is_null(to) {
            return Err(Error::TransferToNull);
        }

        *self.balances.entry(from.clone()).or_default() -= 1;
        *self.balances.entry(to.clone()).or_default() += 1;
        self.owners.insert(id, to.clone());
        // a new owner inherits no stale spender
        self.approvals.remove(&id);
        Ok(())
    }

    /// Set the single approved-spender slot for `id`. A null spender clears it.
    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        id: TokenId,
    ) -> Result<(), Error> {
        let owner = self.owner_of(id)?.clone();
        if caller != &owner && !self.is_approved_for_all(&owner, caller) {
            return Err(Error::NotAuthorized(id));
        }
        if is_null(spender) {
            self.approvals.remove(&id);
        } else {
            self.approvals.insert(id, spender.clone());
        }
        Ok(())
    }

    /// Grant or revoke `operator` over every token of the caller. Idempotent.
    pub fn set_approval_for_all(&mut self, caller: &AccountId, operator: &AccountId, enabled: bool) {
        let set = self.operators.entry(caller.clone()).or_default();
        if enabled {
            set.insert(operator.clone());
        } else {
            set.remove(operator);
        }
    }

    /// Burn `id` under the same authority predicate as a transfer. The id is
    /// retired for good.
    pub fn burn(&mut self, caller: &AccountId, id: TokenId) -> Result<(), Error> {
        self.require_token_authority(caller, id)?;
        let owner = self.owner_of(id)?.clone();

        *self.balances.entry(owner).or_default() -= 1;
        self.owners.remove(&id);
        self.approvals.remove(&id);
        self.labels.remove(&id);
        self.messages.remove(&id);
        self.retired.insert(id);
        self.burn_count += 1;
        Ok(())
    }

    /// Owner, approved spender, or operator for the owner.
    fn require_token_authority(&self, caller: &AccountId, id: TokenId) -> Result<(), Error> {
        let owner = self.owner_of(id)?;
        if caller == owner
            || self.approvals.get(&id) == Some(caller)
            || self.is_approved_for_all(owner, caller)
        {
            Ok(())
        } else {
            Err(Error::NotAuthorized(id))
        }
    }

    //---------- metadata ----------//

    pub fn set_label(&mut self, caller: &AccountId, id: TokenId, text: String) -> Result<(), Error> {
        self.require_token_owner(caller, id)?;
        self.labels.insert(id, text);
        Ok(())
    }

    pub fn set_message(
        &mut self,
        caller: &AccountId,
        id: TokenId,
        text: String,
    ) -> Result<(), Error> {
        self.require_token_owner(caller, id)?;
        self.messages.insert(id, text);
        Ok(())
    }

    /// Metadata writes are owner-only; operators and approved spenders do not
    /// qualify.
    fn require_token_owner(&self, caller: &AccountId, id: TokenId) -> Result<(), Error> {
        if self.owner_of(id)? != caller {
            return Err(Error::NotTokenOwner);
        }
        Ok(())
    }

    //---------- admin ----------//

    /// Flip the pause gate, returning the new state.
    pub fn toggle_paused(&mut self, caller: &AccountId) -> Result<bool, Error> {
        self.require_admin(caller)?;
        self.paused = !self.paused;
        Ok(self.paused)
    }

    pub fn set_base_uri(&mut self, caller: &AccountId, base_uri: String) -> Result<(), Error> {
        self.require_admin(caller)?;
        self.base_uri = base_uri;
        Ok(())
    }

    pub fn set_stride(&mut self, caller: &AccountId, stride: u64) -> Result<(), Error> {
        self.require_admin(caller)?;
        self.pricing.set_stride(stride)
    }

    pub fn set_step_price(&mut self, caller: &AccountId, step_price: Amount) -> Result<(), Error> {
        self.require_admin(caller)?;
        self.pricing.set_step_price(step_price);
        Ok(())
    }

    pub fn set_free_mints(&mut self, caller: &AccountId, free_mints: u64) -> Result<(), Error> {
        self.require_admin(caller)?;
        self.pricing.set_free_mints(free_mints);
        Ok(())
    }

    fn require_admin(&self, caller: &AccountId) -> Result<(), Error> {
        if caller != &self.config.admin {
            return Err(Error::NotAdmin);
        }
        Ok(())
    }
}

/// Merkle root over the bank's balances and the registry's ownership map,
/// used as the snapshot checksum of a persisted ledger.
pub fn state_root(registry: &Registry, bank: &Bank) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    for (account, amount) in bank.accounts() {
        let mut hasher = Sha256::new();
        hasher.update(b"acct");
        hasher.update(account.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (id, owner) in &registry.owners {
        let mut hasher = Sha256::new();
        hasher.update(b"token");
        hasher.update(id.to_le_bytes());
        hasher.update(owner.as_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"stepmint-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
