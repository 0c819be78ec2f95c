mod bank;
mod error;
mod pricing;
mod registry;
mod splitter;
mod timelock;

use std::{
    fs,
    path::{Path, PathBuf},
    process,
    time::{SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bank::{AccountId, Amount, Bank};
use crate::error::Error;
use crate::pricing::PriceSchedule;
use crate::registry::{state_root, Registry, RegistryConfig, TokenId};
use crate::splitter::Splitter;
use crate::timelock::Timelock;

/// Holding account ids inside the bank for the two payout components.
const SPLITTER_ACCOUNT: &str = "splitter";
const TIMELOCK_ACCOUNT: &str = "timelock";

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    version: u8,
    bank: Bank,
    registry: Registry,
    splitter: Option<Splitter>,
    timelock: Option<Timelock>,
}

#[derive(Parser)]
#[command(
    name = "stepmint",
    version,
    about = "Token-issuance ledger with step pricing, payment splitting, and timelocked release"
)]
struct Cli {
    /// Path of the ledger state file.
    #[arg(long, global = true, default_value = "stepmint.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new ledger state file.
    Init {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        max_supply: u64,
        #[arg(long)]
        admin: AccountId,
        /// Receiver of mint proceeds; defaults to the splitter's holding
        /// account when payees are configured, otherwise to the admin.
        #[arg(long)]
        treasury: Option<AccountId>,
        #[arg(long, default_value_t = 0)]
        free_mints: u64,
        #[arg(long, default_value_t = 1)]
        stride: u64,
        #[arg(long, default_value_t = 0)]
        step_price: Amount,
        /// Splitter payee as `address:shares`; repeatable.
        #[arg(long = "payee")]
        payees: Vec<String>,
        #[arg(long, requires = "lock_release_time")]
        lock_beneficiary: Option<AccountId>,
        /// Absolute unix time (seconds) at which the timelock opens.
        #[arg(long, requires = "lock_beneficiary")]
        lock_release_time: Option<u64>,
    },
    /// Generate an ed25519 keypair and its derived ledger address.
    Keygen,
    /// Credit an account with fresh value.
    Fund {
        #[arg(long)]
        account: AccountId,
        #[arg(long)]
        amount: Amount,
    },
    /// Mint a token, paying the current step price.
    Mint {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        to: AccountId,
        /// Caller-chosen id; omitted means the next free id.
        #[arg(long)]
        id: Option<TokenId>,
        #[arg(long, default_value_t = 0)]
        value: Amount,
    },
    /// Move a token between accounts.
    Transfer {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        from: AccountId,
        #[arg(long)]
        to: AccountId,
        #[arg(long)]
        id: TokenId,
    },
    /// Set the approved spender slot of a token (empty spender clears it).
    Approve {
        #[arg(long)]
        caller: AccountId,
        #[arg(long, default_value = "")]
        spender: AccountId,
        #[arg(long)]
        id: TokenId,
    },
    /// Grant (or with --revoke, withdraw) an operator over the caller's tokens.
    SetOperator {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        operator: AccountId,
        #[arg(long)]
        revoke: bool,
    },
    /// Burn a token, retiring its id permanently.
    Burn {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        id: TokenId,
    },
    OwnerOf {
        #[arg(long)]
        id: TokenId,
    },
    BalanceOf {
        #[arg(long)]
        account: AccountId,
    },
    Approved {
        #[arg(long)]
        id: TokenId,
    },
    IsOperator {
        #[arg(long)]
        owner: AccountId,
        #[arg(long)]
        operator: AccountId,
    },
    TokenUri {
        #[arg(long)]
        id: TokenId,
    },
    /// Exact value the next mint must attach.
    Price,
    /// Completed pricing tiers so far.
    Steps,
    /// Summarize the ledger configuration and counters.
    Info,
    SetLabel {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        id: TokenId,
        #[arg(long)]
        text: String,
    },
    SetMessage {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        id: TokenId,
        #[arg(long)]
        text: String,
    },
    TogglePaused {
        #[arg(long)]
        caller: AccountId,
    },
    SetBaseUri {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        uri: String,
    },
    SetStride {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        stride: u64,
    },
    SetStepPrice {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        price: Amount,
    },
    SetFreeMints {
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        count: u64,
    },
    /// Draw a payee's outstanding entitlement from the splitter.
    ReleaseSplit {
        #[arg(long)]
        caller: AccountId,
        /// Defaults to the caller (only self-release is permitted anyway).
        #[arg(long)]
        payee: Option<AccountId>,
    },
    /// Trigger the timelock payout against the system clock.
    ReleaseLock,
    /// Pretty-print the whole ledger with its state root.
    Show,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Init {
            name,
            symbol,
            max_supply,
            admin,
            treasury,
            free_mints,
            stride,
            step_price,
            payees,
            lock_beneficiary,
            lock_release_time,
        } => init_cmd(
            &cli.state,
            name,
            symbol,
            max_supply,
            admin,
            treasury,
            free_mints,
            stride,
            step_price,
            payees,
            lock_beneficiary,
            lock_release_time,
        ),
        Command::Keygen => keygen_cmd(),
        command => {
            let mut ledger = load(&cli.state);
            run(&mut ledger, command).unwrap_or_else(|err| fail(&err));
            save(&cli.state, &ledger);
        }
    }
}

/// Apply one operation. Mutating commands only reach the save in `main` after
/// returning `Ok`, so a failed call leaves the state file untouched.
fn run(ledger: &mut LedgerFile, command: Command) -> Result<(), Error> {
    match command {
        Command::Init { .. } | Command::Keygen => unreachable!("handled in main"),
        Command::Fund { account, amount } => {
            ledger.bank.credit(&account, amount);
            println!("credited {amount} to {account}");
        }
        Command::Mint {
            caller,
            to,
            id,
            value,
        } => {
            let id = ledger
                .registry
                .mint(&mut ledger.bank, &caller, &to, id, value)?;
            println!("minted token {id} to {to} (value {value})");
        }
        Command::Transfer {
            caller,
            from,
            to,
            id,
        } => {
            ledger.registry.transfer_from(&caller, &from, &to, id)?;
            println!("token {id}: {from} -> {to}");
        }
        Command::Approve { caller, spender, id } => {
            ledger.registry.approve(&caller, &spender, id)?;
            if spender.is_empty() {
                println!("token {id}: approval cleared");
            } else {
                println!("token {id}: approved {spender}");
            }
        }
        Command::SetOperator {
            caller,
            operator,
            revoke,
        } => {
            ledger
                .registry
                .set_approval_for_all(&caller, &operator, !revoke);
            println!(
                "{operator} is {} an operator for {caller}",
                if revoke { "no longer" } else { "now" }
            );
        }
        Command::Burn { caller, id } => {
            ledger.registry.burn(&caller, id)?;
            println!("burned token {id}");
        }
        Command::OwnerOf { id } => println!("{}", ledger.registry.owner_of(id)?),
        Command::BalanceOf { account } => println!("{}", ledger.registry.balance_of(&account)),
        Command::Approved { id } => match ledger.registry.get_approved(id)? {
            Some(spender) => println!("{spender}"),
            None => println!("(none)"),
        },
        Command::IsOperator { owner, operator } => {
            println!("{}", ledger.registry.is_approved_for_all(&owner, &operator))
        }
        Command::TokenUri { id } => println!("{}", ledger.registry.token_uri(id)?),
        Command::Price => println!("{}", ledger.registry.price()),
        Command::Steps => println!("{}", ledger.registry.steps()),
        Command::Info => {
            let registry = &ledger.registry;
            println!("{} ({})", registry.name(), registry.symbol());
            println!("admin:    {}", registry.admin());
            println!("treasury: {}", registry.treasury());
            println!("paused:   {}", registry.paused());
            println!(
                "supply:   {} minted / {} max, {} burned",
                registry.mint_count(),
                registry.max_supply(),
                registry.burn_count()
            );
            println!(
                "price:    {} (step {}, stride {}, {} free)",
                registry.price(),
                registry.pricing().step_price(),
                registry.pricing().stride(),
                registry.pricing().free_mints()
            );
            println!("base uri: {}", registry.base_uri());
            if let Some(splitter) = &ledger.splitter {
                println!(
                    "splitter: {} payees / {} shares, released {}, holding {}",
                    splitter.payee_count(),
                    splitter.total_shares(),
                    splitter.total_released(),
                    ledger.bank.available(splitter.account())
                );
            }
            if let Some(timelock) = &ledger.timelock {
                println!(
                    "timelock: {} held for {}, opens at {}{}",
                    ledger.bank.available(timelock.account()),
                    timelock.beneficiary(),
                    timelock.release_time(),
                    if timelock.released() { " (released)" } else { "" }
                );
            }
        }
        Command::SetLabel { caller, id, text } => {
            ledger.registry.set_label(&caller, id, text)?;
            println!("token {id}: label set");
        }
        Command::SetMessage { caller, id, text } => {
            ledger.registry.set_message(&caller, id, text)?;
            println!("token {id}: message set");
        }
        Command::TogglePaused { caller } => {
            let paused = ledger.registry.toggle_paused(&caller)?;
            println!("paused: {paused}");
        }
        Command::SetBaseUri { caller, uri } => {
            ledger.registry.set_base_uri(&caller, uri)?;
            println!("base uri updated");
        }
        Command::SetStride { caller, stride } => {
            ledger.registry.set_stride(&caller, stride)?;
            println!("stride: {stride}");
        }
        Command::SetStepPrice { caller, price } => {
            ledger.registry.set_step_price(&caller, price)?;
            println!("step price: {price}");
        }
        Command::SetFreeMints { caller, count } => {
            ledger.registry.set_free_mints(&caller, count)?;
            println!("free mints: {count}");
        }
        Command::ReleaseSplit { caller, payee } => {
            let splitter = ledger
                .splitter
                .as_mut()
                .unwrap_or_else(|| die("no splitter configured"));
            let payee = payee.unwrap_or_else(|| caller.clone());
            let paid = splitter.release(&mut ledger.bank, &caller, &payee)?;
            println!("released {paid} to {payee}");
        }
        Command::ReleaseLock => {
            let timelock = ledger
                .timelock
                .as_mut()
                .unwrap_or_else(|| die("no timelock configured"));
            let paid = timelock.release(&mut ledger.bank, unix_now())?;
            println!("released {paid} to {}", timelock.beneficiary());
        }
        Command::Show => {
            let root = state_root(&ledger.registry, &ledger.bank);
            let rendered = serde_json::to_string_pretty(ledger).expect("encode ledger");
            println!("{rendered}");
            println!("state root: {}", hex::encode(root));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn init_cmd(
    path: &Path,
    name: String,
    symbol: String,
    max_supply: u64,
    admin: AccountId,
    treasury: Option<AccountId>,
    free_mints: u64,
    stride: u64,
    step_price: Amount,
    payees: Vec<String>,
    lock_beneficiary: Option<AccountId>,
    lock_release_time: Option<u64>,
) {
    if path.exists() {
        die(&format!("{} already exists", path.display()));
    }

    let splitter = if payees.is_empty() {
        None
    } else {
        let roster: Vec<(AccountId, u64)> = payees.iter().map(|raw| parse_payee(raw)).collect();
        Some(Splitter::new(SPLITTER_ACCOUNT.to_string(), roster).unwrap_or_else(|err| fail(&err)))
    };

    let treasury = treasury.unwrap_or_else(|| {
        if splitter.is_some() {
            SPLITTER_ACCOUNT.to_string()
        } else {
            admin.clone()
        }
    });

    let pricing =
        PriceSchedule::new(free_mints, stride, step_price).unwrap_or_else(|err| fail(&err));
    let registry = Registry::new(
        RegistryConfig {
            name,
            symbol,
            max_supply,
            admin,
            treasury,
        },
        pricing,
    );

    let timelock = match (lock_beneficiary, lock_release_time) {
        (Some(beneficiary), Some(release_time)) => Some(
            Timelock::new(TIMELOCK_ACCOUNT.to_string(), beneficiary, release_time)
                .unwrap_or_else(|err| fail(&err)),
        ),
        _ => None,
    };

    let ledger = LedgerFile {
        version: 1,
        bank: Bank::new(),
        registry,
        splitter,
        timelock,
    };
    save(path, &ledger);
    println!("initialized ledger -> {}", path.display());
}

fn keygen_cmd() {
    let signing = SigningKey::generate(&mut OsRng);
    let verifying = signing.verifying_key();
    let address = hex::encode(Sha256::digest(verifying.as_bytes()));
    println!("secret:  {}", hex::encode(signing.to_bytes()));
    println!("public:  {}", hex::encode(verifying.as_bytes()));
    println!("address: {address}");
}

fn parse_payee(raw: &str) -> (AccountId, u64) {
    let (account, weight) = raw
        .rsplit_once(':')
        .unwrap_or_else(|| die(&format!("invalid payee {raw}: expected address:shares")));
    let weight: u64 = weight
        .parse()
        .unwrap_or_else(|_| die(&format!("invalid payee shares in {raw}")));
    (account.to_string(), weight)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

fn load(path: &Path) -> LedgerFile {
    let bytes =
        fs::read(path).unwrap_or_else(|err| die(&format!("cannot read {}: {err}", path.display())));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|err| die(&format!("cannot parse {}: {err}", path.display())))
}

fn save(path: &Path, ledger: &LedgerFile) {
    let bytes = serde_json::to_vec_pretty(ledger).expect("encode ledger");
    fs::write(path, bytes)
        .unwrap_or_else(|err| die(&format!("cannot write {}: {err}", path.display())));
}

fn fail(err: &Error) -> ! {
    eprintln!("error: {err} [{:?}]", err.kind());
    process::exit(2)
}

fn die(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(2)
}
