//! # CLI Interface
//!
//! Defines the command-line argument structure for `cipherchain-node` using
//! `clap` derive. Every ledger parameter can also come from a
//! `CIPHERCHAIN_*` environment variable.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use cipherchain::config::{
    LedgerConfig, BLOCK_CAPACITY, DEFAULT_RELAY_PORT, DIFFICULTY, LEDGER_SERVICE_NAME,
    SAFE_PRIME_BITS,
};
use cipherchain::crypto::keys::SignatureScheme;

use crate::logging::LogFormat;

/// Ledger tooling and message relay for cipherchain.
#[derive(Parser, Debug)]
#[command(
    name = "cipherchain-node",
    about = "cipherchain ledger tooling and message relay",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Log output format.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "CIPHERCHAIN_LOG_FORMAT",
        default_value = "pretty"
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a prime and write it to a file (decimal).
    Prime(PrimeArgs),
    /// Build an ElGamal or RSA key pair from prime files.
    Keygen(KeygenArgs),
    /// Sign a transfer with a key file and append it to the ledger.
    Transfer(TransferArgs),
    /// Verify the whole ledger.
    Verify(LedgerArgs),
    /// Replay the ledger and print an identity's balance.
    Balance(BalanceArgs),
    /// Run the message relay with the ledger service attached.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

/// Where the ledger lives and how it grows.
#[derive(Args, Debug, Clone)]
pub struct LedgerArgs {
    /// Ledger file (JSON). Created on first write.
    #[arg(long, env = "CIPHERCHAIN_LEDGER", default_value = "ledger.json")]
    pub ledger: PathBuf,

    /// Signature scheme of a new ledger: El_gamal or RSA.
    #[arg(long, env = "CIPHERCHAIN_SCHEME", default_value = "El_gamal")]
    pub scheme: SignatureScheme,

    /// Trailing zero bits required of a mined block digest.
    #[arg(long, env = "CIPHERCHAIN_DIFFICULTY", default_value_t = DIFFICULTY)]
    pub difficulty: u32,

    /// Transactions per block.
    #[arg(long, env = "CIPHERCHAIN_BLOCK_CAPACITY", default_value_t = BLOCK_CAPACITY)]
    pub block_capacity: usize,

    /// Give up mining after this many salts.
    #[arg(long, env = "CIPHERCHAIN_MAX_MINING_ATTEMPTS")]
    pub max_mining_attempts: Option<u64>,
}

impl LedgerArgs {
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig {
            difficulty: self.difficulty,
            block_capacity: self.block_capacity,
            max_mining_attempts: self.max_mining_attempts,
        }
    }
}

#[derive(Args, Debug)]
pub struct PrimeArgs {
    /// Bit length of the prime.
    #[arg(long, default_value_t = SAFE_PRIME_BITS)]
    pub bits: u64,

    /// Any prime instead of a safe prime (enough for RSA).
    #[arg(long)]
    pub plain: bool,

    /// PRNG seed. Omit to seed from OS entropy.
    #[arg(long, env = "CIPHERCHAIN_SEED")]
    pub seed: Option<u64>,

    /// Give up after this many candidates.
    #[arg(long)]
    pub max_attempts: Option<u64>,

    /// Output file.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// El_gamal or RSA.
    #[arg(long)]
    pub scheme: SignatureScheme,

    /// Prime file: the group prime for ElGamal, the first factor for RSA.
    #[arg(long)]
    pub prime: PathBuf,

    /// Second prime file (RSA only).
    #[arg(long)]
    pub second_prime: Option<PathBuf>,

    /// PRNG seed. Omit to seed from OS entropy.
    #[arg(long, env = "CIPHERCHAIN_SEED")]
    pub seed: Option<u64>,

    /// Output key file (JSON, contains the private exponent).
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Key file of the debit account.
    #[arg(long)]
    pub key: PathBuf,

    /// Credit identity.
    #[arg(long)]
    pub to: String,

    /// Amount to transfer.
    #[arg(long, value_parser = parse_finite)]
    pub value: f64,

    /// PRNG seed for the signature nonce. Omit to seed from OS entropy.
    #[arg(long, env = "CIPHERCHAIN_SEED")]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Identity to look up.
    #[arg(long, conflicts_with = "key", required_unless_present = "key")]
    pub identity: Option<String>,

    /// Or: a key file whose identity to look up.
    #[arg(long)]
    pub key: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Address to bind.
    #[arg(long, env = "CIPHERCHAIN_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, env = "CIPHERCHAIN_PORT", default_value_t = DEFAULT_RELAY_PORT)]
    pub port: u16,

    /// Name the ledger service answers under.
    #[arg(long, default_value = LEDGER_SERVICE_NAME)]
    pub service_name: String,
}

/// Parses an `f64`, refusing NaN and infinities.
fn parse_finite(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if !value.is_finite() {
        return Err(format!("{raw} is not a finite number"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        Cli::command().debug_assert();
    }

    #[test]
    fn ledger_defaults() {
        let cli = Cli::try_parse_from(["cipherchain-node", "verify"]).unwrap();
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.scheme, SignatureScheme::ElGamal);
        assert_eq!(args.config(), LedgerConfig::default());
    }

    #[test]
    fn balance_needs_an_identity_or_a_key() {
        assert!(Cli::try_parse_from(["cipherchain-node", "balance"]).is_err());
        assert!(Cli::try_parse_from(["cipherchain-node", "balance", "--identity", "42"]).is_ok());
    }

    #[test]
    fn scheme_names_are_forgiving() {
        let cli = Cli::try_parse_from([
            "cipherchain-node",
            "keygen",
            "--scheme",
            "rsa",
            "--prime",
            "p",
            "--out",
            "k",
        ])
        .unwrap();
        let Commands::Keygen(args) = cli.command else {
            panic!("expected keygen");
        };
        assert_eq!(args.scheme, SignatureScheme::Rsa);
    }

    #[test]
    fn transfer_value_must_be_finite() {
        let parse = |value: &str| {
            Cli::try_parse_from([
                "cipherchain-node",
                "transfer",
                "--key",
                "k",
                "--to",
                "bob",
                "--value",
                value,
            ])
        };
        assert!(parse("2.5").is_ok());
        for value in ["NaN", "inf", "-inf", "infinity", "ten"] {
            assert!(parse(value).is_err(), "{value} should be refused");
        }
    }
}
