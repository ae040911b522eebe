use anyhow::Context;
use colored::Colorize;
use ibl_log::FileLogStore;
use ibl_store::{FileSnapshotStore, Ledger, SnapshotStore};
use ibl_txn::{Coordinator, Endpoint, RecoveryEngine, TransferOutcome, TransferRequest};
use ibl_types::{non_negative, AccountId, PartitionName, TxnIdGenerator};
use serde_json::json;

use crate::cli::*;
use crate::config::IblConfig;
use crate::crash::{ensure_reachable, CliFaults, CrashBanner, CrashReason};

/// Stores for one invocation, opened from the resolved configuration.
struct Site {
    snapshots: FileSnapshotStore,
    logs: FileLogStore,
    format: OutputFormat,
}

impl Site {
    fn open(config: &IblConfig, format: OutputFormat) -> anyhow::Result<Self> {
        let logs = FileLogStore::open(&config.data_dir, config.log_config())
            .with_context(|| format!("opening data directory {}", config.data_dir.display()))?;
        let snapshots =
            FileSnapshotStore::new(config.snapshot_path()).with_fsync(config.fsync_snapshot);
        Ok(Self {
            snapshots,
            logs,
            format,
        })
    }

    fn load(&self) -> anyhow::Result<Ledger> {
        self.snapshots
            .load()
            .with_context(|| format!("loading {}", self.snapshots.path().display()))
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = IblConfig::load(cli.config.as_deref(), cli.data_dir.as_deref())?;
    tracing::debug!(?config, "configuration resolved");
    let site = Site::open(&config, cli.format)?;

    match cli.command {
        Command::Show => cmd_show(&site),
        Command::Transfer(args) => {
            let request = TransferRequest::new(
                parse_endpoint(&args.from)?,
                parse_endpoint(&args.to)?,
                non_negative(args.amount)?,
            );
            cmd_transfer(&site, request, &args.faults)
        }
        Command::Credit(args) => {
            let request = TransferRequest::credit(AccountId::new(args.to)?, non_negative(args.amount)?);
            cmd_transfer(&site, request, &args.faults)
        }
        Command::Debit(args) => {
            let request = TransferRequest::debit(AccountId::new(args.from)?, non_negative(args.amount)?);
            cmd_transfer(&site, request, &args.faults)
        }
        Command::Recover => cmd_recover(&site),
        Command::Create(args) => cmd_create(&site, args),
        Command::Crash(args) => crash("manual crash", args.reason),
    }
}

fn parse_endpoint(s: &str) -> anyhow::Result<Endpoint> {
    s.parse()
        .with_context(|| format!("invalid account {s:?}"))
}

fn cmd_show(site: &Site) -> anyhow::Result<()> {
    let ledger = site.load()?;
    match site.format {
        OutputFormat::Json => {
            let out = json!({
                "accounts": ledger.accounts(),
                "total": ledger.total_balance().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("\n{}", "--- Accounts ---".bold());
            for account in ledger.accounts() {
                println!(
                    "{} ({}): {}",
                    account.id.as_str().yellow(),
                    account.partition.as_str().cyan(),
                    account.balance
                );
            }
            println!("---------------");
            println!("Total: {}", ledger.total_balance().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_transfer(site: &Site, request: TransferRequest, faults: &FaultArgs) -> anyhow::Result<()> {
    let mut ledger = site.load()?;
    ensure_reachable(faults.crash_at, &request.reachable_checkpoints(&ledger))?;
    let mut coordinator = Coordinator::resume(&site.snapshots, &site.logs, &ledger)?;
    let mut injector = CliFaults::new(faults.crash_at);

    match coordinator.transfer(&mut ledger, &request, &mut injector)? {
        TransferOutcome::Completed { txn_id } => {
            match site.format {
                OutputFormat::Json => {
                    let out = json!({
                        "txn_id": txn_id,
                        "from": request.from.to_string(),
                        "to": request.to.to_string(),
                        "amount": request.amount,
                        "state": "COMPLETE",
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                OutputFormat::Text => {
                    println!(
                        "{} Transaction {} completed successfully.",
                        "✓".green().bold(),
                        txn_id.to_string().yellow()
                    );
                }
            }
            Ok(())
        }
        TransferOutcome::Interrupted { at, .. } => crash(&at.to_string(), faults.reason),
    }
}

fn cmd_recover(site: &Site) -> anyhow::Result<()> {
    if site.format == OutputFormat::Text {
        println!("Recovering from logs...");
    }
    let report = RecoveryEngine::recover(&site.snapshots, &site.logs)?;

    if site.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for bad in &report.malformed {
        println!(
            "  {} skipped {} {} log line {}: {}",
            "!".yellow().bold(),
            bad.partition,
            bad.kind,
            bad.line_no,
            bad.reason
        );
    }
    for rollback in &report.rollbacks {
        println!(
            "Rolled back incomplete TXN {} for account {} by +{}",
            rollback.txn_id.to_string().yellow(),
            rollback.account.as_str().bold(),
            rollback.amount
        );
    }
    if report.rollback_count() > 0 {
        println!(
            "{} Recovery complete. Rolled back {} incomplete transaction(s).",
            "✓".green().bold(),
            report.rollback_count()
        );
    } else {
        println!(
            "{} Recovery complete. No incomplete transactions to roll back.",
            "✓".green().bold()
        );
    }
    Ok(())
}

fn cmd_create(site: &Site, args: CreateArgs) -> anyhow::Result<()> {
    let mut ledger = site.load()?;
    let id = AccountId::new(args.id)?;
    let partition = PartitionName::new(args.partition)?;
    // Account creation writes no log record, so no id is ever drawn.
    let coordinator = Coordinator::new(&site.snapshots, &site.logs, TxnIdGenerator::new());
    coordinator.create_account(&mut ledger, id.clone(), partition, args.balance)?;

    match site.format {
        OutputFormat::Json => {
            let account = ledger.lookup(&id)?;
            println!("{}", serde_json::to_string_pretty(account)?);
        }
        OutputFormat::Text => println!("{} Account {} created.", "✓".green().bold(), id.as_str().yellow()),
    }
    Ok(())
}

/// Print the crash banner and terminate without any further writes.
fn crash(phase: &str, reason: CrashReason) -> ! {
    let reason = reason.describe(&mut rand::thread_rng());
    tracing::warn!(phase, reason, "simulated crash");
    println!("{}", CrashBanner { phase, reason });
    std::process::exit(1)
}
