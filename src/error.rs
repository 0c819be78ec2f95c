use crate::bank::{AccountId, Amount};
use crate::registry::TokenId;

/// Broad class of a ledger failure, independent of the concrete variant.
///
/// Every operation either commits all of its state changes or returns one of
/// these; callers resubmit a corrected call rather than retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: null recipient, wrong payment amount, unknown token.
    Validation,
    /// Valid input against the wrong state: already minted, paused, nothing due.
    State,
    /// Caller lacks the required relationship to an owner, payee, or the admin.
    Authorization,
    /// The supply cap rejected the operation.
    Supply,
    /// The release time has not been reached.
    Timing,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("mint to the null account")]
    MintToNull,
    #[error("transfer to the null account")]
    TransferToNull,
    #[error("unknown token {0}")]
    UnknownToken(TokenId),
    #[error("transfer from incorrect owner")]
    WrongOwner,
    #[error("must send exact value to mint: price {price}, sent {sent}")]
    WrongMintValue { price: Amount, sent: Amount },
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("insufficient funds in account {0}")]
    InsufficientFunds(AccountId),
    #[error("stride must be greater than zero")]
    ZeroStride,
    #[error("no payees")]
    NoPayees,
    #[error("payee {0} has zero shares")]
    ZeroShares(AccountId),
    #[error("payee {0} already registered")]
    DuplicatePayee(AccountId),
    #[error("account has no shares")]
    NoShares,
    #[error("timelock beneficiary is the null account")]
    NullBeneficiary,

    #[error("token {0} already minted")]
    AlreadyMinted(TokenId),
    #[error("token {0} has been burned")]
    Retired(TokenId),
    #[error("minting is paused")]
    Paused,
    #[error("account is not due payment")]
    NothingDue,

    #[error("caller is not the admin")]
    NotAdmin,
    #[error("caller may not operate on token {0}")]
    NotAuthorized(TokenId),
    #[error("only token owner can call")]
    NotTokenOwner,
    #[error("only owner account can trigger release")]
    NotPayee,

    #[error("max supply reached")]
    MaxSupplyReached,

    #[error("current time is before release time")]
    BeforeReleaseTime,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MintToNull
            | Error::TransferToNull
            | Error::UnknownToken(_)
            | Error::WrongOwner
            | Error::WrongMintValue { .. }
            | Error::UnknownAccount(_)
            | Error::InsufficientFunds(_)
            | Error::ZeroStride
            | Error::NoPayees
            | Error::ZeroShares(_)
            | Error::DuplicatePayee(_)
            | Error::NoShares
            | Error::NullBeneficiary => ErrorKind::Validation,

            Error::AlreadyMinted(_)
            | Error::Retired(_)
            | Error::Paused
            | Error::NothingDue => ErrorKind::State,

            Error::NotAdmin
            | Error::NotAuthorized(_)
            | Error::NotTokenOwner
            | Error::NotPayee => ErrorKind::Authorization,

            Error::MaxSupplyReached => ErrorKind::Supply,

            Error::BeforeReleaseTime => ErrorKind::Timing,
        }
    }
}
