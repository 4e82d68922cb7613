use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use nestegg::audit::EventRecorder;
use nestegg::clock::{Clock, ZonedClock};
use nestegg::config::{default_config_path, ResolvedConfig};
use nestegg::duration::format_duration;
use nestegg::format::format_minor_units;
use nestegg::identity::{Identity, IdentityProvider, StaticIdentity};
use nestegg::models::{parse_currency_code, Account, Id, Scope};
use nestegg::rates::{FrankfurterRateSource, RateService};
use nestegg::snapshots::SnapshotService;
use nestegg::storage::{SqliteStorage, Storage};
use nestegg::trends::{DaysBack, Seeder, TrendService};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    nestegg::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "nestegg")]
#[command(about = "Family balance snapshots and trends")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Override how old exchange rates may get before a refresh (e.g. "6h").
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    rates_ttl: Option<Duration>,

    #[command(subcommand)]
    command: Command,
}

/// Who the command runs as.
#[derive(Args)]
struct Who {
    /// Requesting user id
    #[arg(long)]
    user: String,

    /// Run with the admin role (family-wide scope)
    #[arg(long)]
    admin: bool,
}

impl Who {
    fn identity(&self) -> Option<Identity> {
        let identity = if self.admin {
            Identity::admin(self.user.as_str())
        } else {
            Identity::member(self.user.as_str())
        };
        StaticIdentity::new(identity).current_identity()
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,
    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCommand),
    /// Exchange rates
    #[command(subcommand)]
    Rates(RatesCommand),
    /// Write snapshots
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
    /// Show a balance trend
    Trend {
        #[command(flatten)]
        who: Who,
        /// Number of days, today included
        #[arg(long, default_value_t = 30, conflicts_with = "all")]
        days: u32,
        /// All history (five years)
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Backfill sparse history now
    Seed {
        #[command(flatten)]
        who: Who,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Add an account
    Add {
        /// Owner user id
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        /// ISO currency code (e.g. CNY, USD)
        #[arg(long)]
        currency: String,
        /// Balance in minor units (cents, fen)
        #[arg(long, allow_hyphen_values = true)]
        balance: i64,
        #[arg(long, default_value = "")]
        bank: String,
    },
    /// List accounts
    List {
        #[arg(long)]
        user: Option<String>,
    },
    /// Set an account's balance in minor units
    SetBalance {
        id: String,
        #[arg(allow_hyphen_values = true)]
        balance: i64,
    },
    /// Remove an account
    Rm { id: String },
}

#[derive(Subcommand)]
enum RatesCommand {
    /// Fetch the latest rates now
    Refresh,
    /// Show stored rates
    List,
}

#[derive(Subcommand)]
enum SnapshotCommand {
    /// Snapshot one user's balance for today
    Today {
        #[command(flatten)]
        who: Who,
    },
    /// Snapshot every user for a date (admin only)
    All {
        #[command(flatten)]
        who: Who,
        /// Date to write (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

struct Services {
    config: ResolvedConfig,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn Storage>,
    recorder: Arc<dyn EventRecorder>,
    rates: Arc<RateService>,
    snapshots: SnapshotService,
}

impl Services {
    fn build(config: ResolvedConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(ZonedClock::new(config.timezone));
        let sqlite = Arc::new(SqliteStorage::open(&config.database_path)?);
        let storage: Arc<dyn Storage> = sqlite.clone();
        let recorder: Arc<dyn EventRecorder> = sqlite;
        let source = Arc::new(FrankfurterRateSource::from_config(&config.rates)?);
        let rates = Arc::new(
            RateService::new(storage.clone(), source, &config.base_currency)
                .with_extra_currencies(config.currencies.clone())
                .with_ttl(config.rates.ttl)
                .with_clock(clock.clone()),
        );
        let snapshots =
            SnapshotService::new(storage.clone(), rates.clone()).with_clock(clock.clone());
        Ok(Self {
            config,
            clock,
            storage,
            recorder,
            rates,
            snapshots,
        })
    }

    fn trends(&self) -> TrendService {
        let trends = &self.config.trends;
        TrendService::new(self.storage.clone(), self.rates.clone())
            .with_clock(self.clock.clone())
            .with_recorder(self.recorder.clone())
            .with_sparsity_threshold(trends.sparsity_threshold)
            .with_min_points(trends.min_points)
            .with_seed_window_days(trends.seed_window_days)
    }

    fn money(&self, minor: i64) -> String {
        format_minor_units(minor, &self.config.base_currency, &self.config.display)
    }

    /// Refresh today's snapshot for `owner` and wait for it before exiting.
    async fn after_mutation(&self, owner: Id) {
        if let Err(e) = self.snapshots.snapshot_after_mutation(owner).await {
            tracing::warn!(error = %e, "snapshot task did not complete");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load nestegg config: {}", cli.config.display()))?;
    if let Some(ttl) = cli.rates_ttl {
        config.rates.ttl = ttl;
    }

    if let Command::Config = cli.command {
        println!("Config file: {}", cli.config.display());
        println!("Database: {}", config.database_path.display());
        println!("Base currency: {}", config.base_currency);
        println!("Time zone: {}", config.timezone);
        println!("Extra currencies: {}", config.currencies.join(", "));
        println!("Rate TTL: {}", format_duration(config.rates.ttl));
        println!("Rate API: {}", config.rates.api_url);
        println!(
            "Sparsity threshold: {} rows, seed window: {} days, minimum points: {}",
            config.trends.sparsity_threshold,
            config.trends.seed_window_days,
            config.trends.min_points
        );
        return Ok(());
    }

    let services = Services::build(config)?;

    match cli.command {
        Command::Config => {}
        Command::Account(cmd) => run_account(&services, cmd).await?,
        Command::Rates(RatesCommand::Refresh) => {
            let written = services.rates.refresh().await?;
            println!("Refreshed {written} rate(s)");
        }
        Command::Rates(RatesCommand::List) => {
            let rates = services.rates.list_rates().await?;
            if rates.is_empty() {
                println!("No rates stored");
            }
            for rate in rates {
                println!(
                    "{}  1 = {} {}  (updated {})",
                    rate.currency_code,
                    rate.rate_to_base,
                    services.rates.base_currency(),
                    rate.updated_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        Command::Snapshot(SnapshotCommand::Today { who }) => {
            let snapshot = services
                .snapshots
                .create_today_snapshot(who.identity().as_ref())
                .await?;
            println!(
                "{} {} {}",
                snapshot.user_id,
                snapshot.snapshot_date,
                services.money(snapshot.total_balance_minor)
            );
        }
        Command::Snapshot(SnapshotCommand::All { who, date }) => {
            let written = services
                .snapshots
                .snapshot_all_users(who.identity().as_ref(), date)
                .await?;
            println!("Wrote {written} snapshot(s)");
        }
        Command::Trend {
            who,
            days,
            all,
            json,
        } => {
            let days_back = if all {
                DaysBack::All
            } else {
                DaysBack::from_raw(i64::from(days)).context("--days must be positive")?
            };
            let Some(series) = services
                .trends()
                .get_trend(who.identity().as_ref(), days_back)
                .await?
            else {
                println!("Not signed in");
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
                return Ok(());
            }
            if series.points.is_empty() {
                println!("No accounts yet");
                return Ok(());
            }
            for point in &series.points {
                println!("{}  {:>20}", point.date, services.money(point.total_balance));
            }
            if let Some(change) = series.change() {
                println!(
                    "Change: {} ({:?}, scope {})",
                    services.money(change),
                    series.source,
                    series.scope
                );
            }
        }
        Command::Seed { who } => {
            let Some(identity) = who.identity() else {
                println!("Not signed in");
                return Ok(());
            };
            let trends = &services.config.trends;
            let report = Seeder::new(services.storage.clone(), services.rates.clone())
                .with_clock(services.clock.clone())
                .with_window_days(trends.seed_window_days)
                .seed_scope(&Scope::for_identity(&identity))
                .await?;
            println!(
                "Seeded {} owner(s), {} row(s)",
                report.owners_seeded, report.rows_written
            );
        }
    }

    Ok(())
}

async fn run_account(services: &Services, cmd: AccountCommand) -> Result<()> {
    match cmd {
        AccountCommand::Add {
            user,
            name,
            currency,
            balance,
            bank,
        } => {
            let currency = parse_currency_code(&currency)?;
            let account = Account::new(user.as_str(), name, &currency, balance).with_bank(bank);
            services.storage.save_account(&account).await?;
            println!("Added account {}", account.id);
            services.after_mutation(account.owner_id).await;
        }
        AccountCommand::List { user } => {
            let owner = user.map(Id::from);
            let accounts = services.storage.list_accounts(owner.as_ref()).await?;
            if accounts.is_empty() {
                println!("No accounts");
            }
            for a in accounts {
                println!(
                    "{}  {}  {} {}  {} {}",
                    a.id, a.owner_id, a.bank_name, a.account_name, a.balance_minor, a.currency_code
                );
            }
        }
        AccountCommand::SetBalance { id, balance } => {
            let id = Id::from(id);
            let mut account = services
                .storage
                .get_account(&id)
                .await?
                .with_context(|| format!("No account {id}"))?;
            account.balance_minor = balance;
            services.storage.save_account(&account).await?;
            println!("Updated account {id}");
            services.after_mutation(account.owner_id).await;
        }
        AccountCommand::Rm { id } => {
            let id = Id::from(id);
            let account = services
                .storage
                .get_account(&id)
                .await?
                .with_context(|| format!("No account {id}"))?;
            services.storage.delete_account(&id).await?;
            println!("Removed account {id}");
            services.after_mutation(account.owner_id).await;
        }
    }
    Ok(())
}
