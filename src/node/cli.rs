use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::LedgerConfig;
use crate::crypto::{Keypair, PublicKey};
use crate::ledger::{validate_blocks, VoteRequest};
use crate::node::Node;
use crate::storage::read_ledger_file;
use crate::utils::init_logging;

/// CLI for the vote ledger.
#[derive(Parser)]
#[clap(name = "votechain", version)]
pub struct Cli {
    /// Path to the TOML config file
    #[clap(long, default_value = "./votechain.toml")]
    pub config: PathBuf,

    /// Override the ledger file path
    #[clap(long)]
    pub ledger: Option<PathBuf>,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Generate a secp256k1 authority key pair
    Keygen,
    /// Write a config file (private key excluded) and create the ledger
    Init {
        /// hex public key distributed to auditors
        #[clap(long)]
        authority_public_key: Option<String>,
        /// replace an existing config file
        #[clap(long)]
        force: bool,
    },
    /// Record one vote in its own block
    Vote {
        #[clap(long)]
        voter: String,
        #[clap(long)]
        candidate: String,
        #[clap(long)]
        message: Option<String>,
        /// record a one-way fingerprint instead of the voter hash
        #[clap(long)]
        secret: Option<String>,
    },
    /// Audit the ledger file without modifying it
    Validate {
        /// hex public key every block must be signed by
        #[clap(long)]
        authority: Option<String>,
        /// stop at the first violation
        #[clap(long)]
        fail_fast: bool,
    },
    /// Print every block as JSON
    Show,
    /// Print votes per candidate
    Tally,
    /// Discard every block and start from genesis
    Reset {
        #[clap(long)]
        yes: bool,
    },
    /// Serve the JSON-RPC API
    Serve {
        /// rpc bind address (host:port)
        #[clap(long)]
        rpc: Option<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = LedgerConfig::resolve(Some(&cli.config))?;
    if let Some(ledger) = cli.ledger {
        cfg.ledger_path = ledger;
    }
    init_logging(&cfg.log_filter);

    match cli.cmd {
        Cmd::Keygen => {
            let kp = Keypair::generate();
            println!("authority_public_key = \"{}\"", kp.public().to_hex());
            eprintln!("# keep the private key out of shared config; pass it via $VOTECHAIN_AUTHORITY_SECRET");
            println!("authority_private_key = \"{}\"", kp.secret().to_hex());
            Ok(())
        }
        Cmd::Init { authority_public_key, force } => {
            if authority_public_key.is_some() {
                cfg.authority_public_key = authority_public_key;
            }
            write_config(&cli.config, &cfg, force)?;
            let chain = Node::new(cfg.clone()).open_chain()?;
            println!(
                "initialized ledger at {} ({} blocks), config at {}",
                cfg.ledger_path.display(),
                chain.len(),
                cli.config.display()
            );
            Ok(())
        }
        Cmd::Vote { voter, candidate, message, secret } => {
            let chain = Node::new(cfg).open_chain()?;
            let mut request = VoteRequest::new(voter, candidate);
            if let Some(m) = message {
                request = request.with_message(m);
            }
            if let Some(s) = secret {
                request = request.anonymous(s);
            }
            let receipt = chain.cast_vote(request)?;
            println!("recorded in block #{} ({})", receipt.block_index, receipt.block_hash);
            if let Some(nonce) = receipt.nonce {
                println!("fingerprint nonce (keep private): {}", nonce);
            }
            Ok(())
        }
        Cmd::Validate { authority, fail_fast } => {
            let expected = match authority {
                Some(hex) => Some(PublicKey::from_hex(&hex)?),
                None => cfg.audit_key()?,
            };
            let blocks = read_ledger_file(&cfg.ledger_path)
                .with_context(|| format!("reading {}", cfg.ledger_path.display()))?;
            let report = validate_blocks(&blocks, expected.as_ref(), fail_fast);
            for v in &report.violations {
                println!("{}", v);
            }
            if !report.is_valid() {
                bail!("ledger is INVALID ({} violations in {} blocks)", report.violations.len(), report.length);
            }
            println!("ledger is valid ({} blocks)", report.length);
            Ok(())
        }
        Cmd::Show => {
            let chain = Node::new(cfg).open_chain()?;
            println!("{}", serde_json::to_string_pretty(&chain.blocks())?);
            Ok(())
        }
        Cmd::Tally => {
            let chain = Node::new(cfg).open_chain()?;
            for (candidate, votes) in chain.tally() {
                println!("{}: {}", candidate, votes);
            }
            Ok(())
        }
        Cmd::Reset { yes } => {
            if !yes {
                bail!("refusing to reset without --yes");
            }
            let chain = Node::new(cfg).open_chain()?;
            let genesis = chain.reset()?;
            println!("ledger reset, genesis {}", genesis.hash());
            Ok(())
        }
        Cmd::Serve { rpc } => {
            if let Some(addr) = rpc {
                cfg.rpc_addr = addr;
            }
            let svc = Node::new(cfg).start().await?;
            println!("serving ledger RPC on {}", svc.rpc_addr());
            // Wait for Ctrl+C
            tokio::signal::ctrl_c().await?;
            println!("Shutting down...");
            svc.shutdown().await?;
            Ok(())
        }
    }
}

/// Write `cfg` to `path`. An existing file is only replaced with `force`,
/// since the private key it may hold is never written back.
fn write_config(path: &Path, cfg: &LedgerConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }
    if cfg.authority_private_key.is_some() {
        eprintln!("# authority private key is not written; pass it via $VOTECHAIN_AUTHORITY_SECRET");
    }
    std::fs::write(path, cfg.to_toml()?).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votechain.toml");
        let secret = Keypair::generate().secret().to_hex();
        let original = format!("authority_private_key = \"{}\"\n", secret);
        std::fs::write(&path, &original).unwrap();

        let cfg = LedgerConfig::load(&path).unwrap();
        assert!(write_config(&path, &cfg, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        write_config(&path, &cfg, true).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains(&secret));
    }

    #[test]
    fn init_writes_fresh_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votechain.toml");
        let cfg = LedgerConfig { ledger_path: dir.path().join("ledger.json"), ..Default::default() };
        write_config(&path, &cfg, false).unwrap();
        assert_eq!(LedgerConfig::load(&path).unwrap().ledger_path, cfg.ledger_path);
    }
}
