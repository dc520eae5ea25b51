// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use donation_ledger::{
    AccountId, Budget, BudgetId, Campaign, CampaignId, Config, DeadLetterLog, Donation,
    DonationId, InMemoryLedger, LedgerError, OperationKind, OperationQueue, OrganizationId,
    QueueWorker, Scheduler, Tick, UserId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Donation Ledger - Replay donation operations against a seeded ledger
///
/// Seeds an in-memory ledger from a TOML file, submits every row of the
/// operations CSV to the processing queue, lets the worker apply them and
/// writes the resulting account states to stdout.
#[derive(Parser, Debug)]
#[command(name = "donation-ledger")]
#[command(about = "Replays donation operations through the processing queue", long_about = None)]
struct Args {
    /// Path to CSV file with donation operations
    ///
    /// Expected format: type,donation,account,budget,campaign,contributor,amount
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// TOML file describing budgets, campaigns and members
    #[arg(long, value_name = "SEED")]
    seed: PathBuf,

    /// Worker configuration (TOML); environment variables otherwise
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Tick at the configured interval instead of back to back
    #[arg(long)]
    paced: bool,

    /// Also write campaign totals as CSV to this file
    #[arg(long, value_name = "FILE")]
    campaigns_out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let ledger = match File::open(&args.seed)
        .map_err(SeedError::from)
        .and_then(|file| load_seed(BufReader::new(file)))
    {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            eprintln!("Error loading seed '{}': {}", args.seed.display(), e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let queue = Arc::new(OperationQueue::new());
    if let Err(e) = submit_operations(BufReader::new(file), &queue) {
        eprintln!("Error reading operations: {}", e);
        process::exit(1);
    }

    let dead_letters = Arc::new(DeadLetterLog::new(config.dead_letter.capacity));
    let worker = Arc::new(QueueWorker::from_config(
        Arc::clone(&queue),
        Arc::clone(&ledger),
        Arc::clone(&dead_letters),
        &config.worker,
    ));

    if args.paced {
        let scheduler = match Scheduler::from_config(Arc::clone(&worker), &config.worker) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                eprintln!("Error starting worker thread: {}", e);
                process::exit(1);
            }
        };
        while !queue.is_empty() {
            thread::sleep(config.worker.tick_interval());
        }
        scheduler.shutdown(config.worker.shutdown);
    } else {
        while worker.tick() != Tick::Idle {}
    }

    let stats = worker.stats();
    tracing::info!(
        applied = stats.applied,
        failed = stats.failed,
        dead_letters = dead_letters.len(),
        "replay finished"
    );

    if let Err(e) = write_accounts(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    if let Some(path) = &args.campaigns_out {
        let result = File::create(path)
            .map_err(csv::Error::from)
            .and_then(|file| write_campaigns(&ledger, file));
        if let Err(e) = result {
            eprintln!("Error writing '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

#[derive(Debug, Error)]
enum SeedError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] toml::de::Error),

    #[error("{context}: {source}")]
    Ledger {
        context: String,
        source: LedgerError,
    },
}

/// Seed file layout.
#[derive(Debug, Deserialize)]
struct Seed {
    #[serde(default)]
    campaigns: Vec<CampaignSeed>,
    #[serde(default)]
    budgets: Vec<BudgetSeed>,
}

#[derive(Debug, Deserialize)]
struct CampaignSeed {
    id: u64,
    title: String,
    donations_required: Decimal,
    funding_deadline: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct BudgetSeed {
    id: u64,
    name: String,
    amount_per_member: Decimal,
    organization: u64,
    sponsor: u64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    #[serde(default)]
    campaigns: Vec<u64>,
    /// Members receiving an account; the budget is distributed when non-empty.
    #[serde(default)]
    members: Vec<u64>,
}

fn context(what: String) -> impl FnOnce(LedgerError) -> SeedError {
    move |source| SeedError::Ledger {
        context: what,
        source,
    }
}

/// Builds a ledger from a seed file.
fn load_seed<R: Read>(mut reader: R) -> Result<InMemoryLedger, SeedError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let seed: Seed = toml::from_str(&content)?;
    let ledger = InMemoryLedger::new();

    for campaign in seed.campaigns {
        ledger
            .insert_campaign(Campaign::new(
                CampaignId(campaign.id),
                campaign.title,
                campaign.donations_required,
                campaign.funding_deadline,
            ))
            .map_err(context(format!("campaign {}", campaign.id)))?;
    }

    for budget in seed.budgets {
        let id = BudgetId(budget.id);
        ledger
            .insert_budget(Budget {
                id,
                name: budget.name,
                amount_per_member: budget.amount_per_member,
                organization: OrganizationId(budget.organization),
                sponsor: UserId(budget.sponsor),
                distributed: false,
                start_date: budget.start_date,
                end_date: budget.end_date,
                campaigns: BTreeSet::new(),
            })
            .map_err(context(format!("budget {}", budget.id)))?;
        for campaign in budget.campaigns {
            ledger
                .link_campaign(id, CampaignId(campaign))
                .map_err(context(format!("budget {} campaign {}", budget.id, campaign)))?;
        }
        if !budget.members.is_empty() {
            let members: Vec<UserId> = budget.members.into_iter().map(UserId).collect();
            ledger
                .distribute_budget(id, &members)
                .map_err(context(format!("budget {} distribution", budget.id)))?;
        }
    }

    Ok(ledger)
}

/// Raw CSV record matching the operations format.
///
/// Fields: `type, donation, account, budget, campaign, contributor, amount`.
/// A delete row only needs `type` and `donation` when the donation was
/// created earlier in the same file.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    op_type: String,
    donation: DonationId,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    account: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    budget: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    campaign: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    contributor: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
}

impl CsvRecord {
    fn kind(&self) -> Option<OperationKind> {
        match self.op_type.to_lowercase().as_str() {
            "create" => Some(OperationKind::Create),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }

    /// Builds the donation from the row's own columns.
    fn donation(&self) -> Option<Donation> {
        Donation::with_id(
            self.donation,
            AccountId(self.account?),
            BudgetId(self.budget?),
            CampaignId(self.campaign?),
            UserId(self.contributor?),
            self.amount?,
        )
        .ok()
    }
}

/// Submits every valid row to the queue, the way request handlers would.
///
/// Malformed rows and rows failing request validation are skipped. Returns
/// the number of operations submitted.
fn submit_operations<R: Read>(reader: R, queue: &OperationQueue) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut known: HashMap<DonationId, Donation> = HashMap::new();
    let mut submitted = 0;

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("skipping malformed row: {}", e);
                continue;
            }
        };

        let Some(kind) = record.kind() else {
            tracing::warn!(op_type = %record.op_type, "skipping unknown operation type");
            continue;
        };

        let donation = match kind {
            OperationKind::Create => record.donation(),
            OperationKind::Delete => known
                .get(&record.donation)
                .cloned()
                .or_else(|| record.donation()),
        };
        let Some(donation) = donation else {
            tracing::warn!(donation = %record.donation, %kind, "skipping incomplete row");
            continue;
        };

        if kind == OperationKind::Create {
            known.insert(donation.id, donation.clone());
        }
        queue.submit(kind, donation);
        submitted += 1;
    }

    Ok(submitted)
}

/// Write account states to a CSV writer.
///
/// Columns: `account, owner, budget, amount, initial_amount`
fn write_accounts<W: Write>(ledger: &InMemoryLedger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in ledger.accounts() {
        wtr.serialize(&*account)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write campaign totals to a CSV writer.
///
/// Columns: `campaign, status, donations_required, total_donations`
fn write_campaigns<W: Write>(ledger: &InMemoryLedger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for campaign in ledger.campaigns() {
        wtr.serialize(&*campaign)?;
    }
    wtr.flush()?;
    Ok(())
}
