// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # cipherchain Node
//!
//! Entry point for the `cipherchain-node` binary. Parses CLI arguments,
//! initializes logging, and runs one of:
//!
//! - `prime`    - search a (safe) prime and write it to a file
//! - `keygen`   - build an ElGamal or RSA key file from prime files
//! - `transfer` - sign a transfer and append it to the ledger file
//! - `verify`   - verify the ledger file
//! - `balance`  - replay the ledger for one identity
//! - `serve`    - run the message relay with the ledger service
//! - `version`  - print build version information

mod cli;
mod logging;
mod relay;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use num_bigint::BigUint;
use tokio::signal;

use cipherchain::crypto::keys::{ElGamalKeyPair, KeyPair, RsaKeyPair, SignatureScheme};
use cipherchain::crypto::numtheory::{find_prime, find_safe_prime};
use cipherchain::crypto::prng::Xorshift512;
use cipherchain::network::LedgerService;
use cipherchain::storage::{LedgerStore, SharedLedger};
use cipherchain::transaction::{sign_transaction, Transaction};

use cli::{Cli, Commands};
use relay::Relay;

const DEFAULT_LOG_LEVEL: &str = "cipherchain=info,cipherchain_node=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(DEFAULT_LOG_LEVEL, cli.log_format);

    match cli.command {
        Commands::Prime(args) => prime(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Transfer(args) => transfer(args),
        Commands::Verify(args) => verify(args),
        Commands::Balance(args) => balance(args),
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn rng(seed: Option<u64>) -> Xorshift512 {
    match seed {
        Some(seed) => Xorshift512::from_u64(seed),
        None => Xorshift512::from_entropy(),
    }
}

fn read_prime(path: &Path) -> Result<BigUint> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read prime file {}", path.display()))?;
    text.trim()
        .parse()
        .with_context(|| format!("{} does not hold a decimal integer", path.display()))
}

fn read_key(path: &Path) -> Result<KeyPair> {
    let raw =
        fs::read(path).with_context(|| format!("failed to read key file {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a valid key file", path.display()))
}

fn write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn prime(args: cli::PrimeArgs) -> Result<()> {
    let mut rng = rng(args.seed);
    tracing::info!(bits = args.bits, safe = !args.plain, "searching prime");

    let p = if args.plain {
        find_prime(args.bits, &mut rng, args.max_attempts)?
    } else {
        find_safe_prime(args.bits, &mut rng, args.max_attempts)?
    };

    fs::write(&args.out, format!("{p}\n"))
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("{p}");
    Ok(())
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let mut rng = rng(args.seed);
    let p = read_prime(&args.prime)?;

    let keypair: KeyPair = match args.scheme {
        SignatureScheme::ElGamal => ElGamalKeyPair::generate(&p, &mut rng)?.into(),
        SignatureScheme::Rsa => {
            let Some(second) = &args.second_prime else {
                bail!("RSA needs --second-prime");
            };
            let q = read_prime(second)?;
            RsaKeyPair::generate(&p, &q, &mut rng)?.into()
        }
    };

    write_secret(&args.out, &serde_json::to_vec_pretty(&keypair)?)?;
    tracing::info!(
        scheme = %keypair.scheme(),
        key_path = %args.out.display(),
        "key pair generated"
    );
    println!("{}", keypair.identity());
    Ok(())
}

fn transfer(args: cli::TransferArgs) -> Result<()> {
    let mut rng = rng(args.seed);
    let key = read_key(&args.key)?;

    let mut tx = Transaction::new(key.identity(), args.to.clone(), args.value);
    sign_transaction(&mut tx, &key, &mut rng)?;

    let store = LedgerStore::open(&args.ledger.ledger);
    let config = args.ledger.config();
    let blocks = store.transact(args.ledger.scheme, &config, |chain| {
        chain.accept_transaction(tx)?;
        Ok(chain.len())
    })?;

    tracing::info!(to = %args.to, value = args.value, blocks, "transfer recorded");
    Ok(())
}

fn verify(args: cli::LedgerArgs) -> Result<()> {
    let store = LedgerStore::open(&args.ledger);
    let Some(chain) = store.load(&args.config())? else {
        println!("{}: no ledger yet", args.ledger.display());
        return Ok(());
    };

    match chain.verify_chain() {
        Ok(()) => {
            println!("valid ({} blocks, {})", chain.len(), chain.signature_type());
            Ok(())
        }
        Err(fault) => bail!("ledger is invalid: {fault}"),
    }
}

fn balance(args: cli::BalanceArgs) -> Result<()> {
    let identity = match (&args.identity, &args.key) {
        (Some(identity), _) => identity.clone(),
        (None, Some(key)) => read_key(key)?.identity(),
        (None, None) => bail!("pass --identity or --key"),
    };

    let store = LedgerStore::open(&args.ledger.ledger);
    let balance = store
        .load(&args.ledger.config())?
        .map_or(0.0, |chain| chain.balance(&identity));
    println!("{balance}");
    Ok(())
}

async fn serve(args: cli::ServeArgs) -> Result<()> {
    let config = args.ledger.config();
    let ledger = SharedLedger::persistent(
        LedgerStore::open(&args.ledger.ledger),
        args.ledger.scheme,
        &config,
    )?;
    let service = LedgerService::new(args.service_name.clone(), ledger);

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {}", addr))?;
    tracing::info!(
        %addr,
        service = %args.service_name,
        ledger = %args.ledger.ledger.display(),
        "relay listening"
    );

    tokio::select! {
        res = Relay::new(service).serve(listener) => res?,
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("relay stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("cipherchain-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc            {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is never reported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
