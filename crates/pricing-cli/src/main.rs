// salary-pricer: command-line front end for the pricing engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use pricing_engine::cache::PricingDataCache;
use pricing_engine::config::{self, DataSourceKind, PricingConfig};
use pricing_engine::db::Database;
use pricing_engine::import::load_players_csv;
use pricing_engine::session::PricingSession;
use pricing_engine::source::{JsonFileSource, PricingDataSource};
use pricing_engine::valuation::adjust::AdjustmentRequest;
use pricing_engine::PriceSet;

#[derive(Parser)]
#[command(name = "salary-pricer")]
#[command(about = "Generate and adjust auction salaries for a fantasy baseball league")]
#[command(version)]
struct Cli {
    /// Path to pricing.toml. Relative data paths resolve against its directory.
    #[arg(short, long, default_value = "pricing.toml", global = true)]
    config: PathBuf,

    /// League id; defaults to the config's league id.
    #[arg(short, long, global = true)]
    league: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate prices and print the summary
    Price {
        /// Print the full price set as JSON
        #[arg(long)]
        json: bool,

        /// Persist the result to the SQLite store
        #[arg(long)]
        finalize: bool,
    },

    /// Generate prices, apply one adjustment, and print the result
    Adjust {
        /// Comma-separated player ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        players: Vec<String>,

        /// percentage, fixed, or set
        #[arg(short, long)]
        kind: String,

        /// Adjustment amount
        #[arg(short, long, allow_hyphen_values = true)]
        value: String,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        finalize: bool,
    },

    /// Import a player CSV (and the config's scoring selection) into SQLite
    Import {
        /// CSV with player_id, name, position, team, window and stat columns
        csv: PathBuf,
    },

    /// Print the latest finalized price set
    Show {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let base_dir = cli
        .config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let league_id = cli
        .league
        .clone()
        .unwrap_or_else(|| config.league.league_id().to_string());
    info!(
        "Config loaded: league={}, {} teams, roster {}",
        config.league.name, config.league.num_teams, config.league.roster_size
    );

    match cli.command {
        Commands::Price { json, finalize } => {
            let mut session = build_session(&config, &base_dir, &league_id)?;
            session.generate().await.context("failed to generate prices")?;
            report(&session, json, finalize, &config, &base_dir)?;
        }
        Commands::Adjust {
            players,
            kind,
            value,
            json,
            finalize,
        } => {
            let request = AdjustmentRequest::parse(players, &kind, &value)
                .context("invalid adjustment")?;
            let mut session = build_session(&config, &base_dir, &league_id)?;
            session.generate().await.context("failed to generate prices")?;
            session.apply(&request).context("failed to apply adjustment")?;
            report(&session, json, finalize, &config, &base_dir)?;
        }
        Commands::Import { csv } => {
            let players = load_players_csv(&csv)
                .with_context(|| format!("failed to import {}", csv.display()))?;
            let db = open_database(&config, &base_dir)?;
            db.upsert_players(&league_id, &players)?;
            if let Some(scoring) = &config.scoring {
                db.set_scoring(&league_id, scoring)?;
            }
            println!("Imported {} players into league {}", players.len(), league_id);
        }
        Commands::Show { json } => {
            let db = open_database(&config, &base_dir)?;
            let Some(latest) = db.load_latest_price_set(&league_id)? else {
                bail!("no finalized price set for league {league_id}");
            };
            println!(
                "Price set #{} finalized at {}",
                latest.id,
                latest.finalized_at.to_rfc3339()
            );
            print_price_set(&latest.price_set, json)?;
        }
    }

    Ok(())
}

type DynSource = Arc<dyn PricingDataSource>;

fn build_session(
    config: &PricingConfig,
    base_dir: &Path,
    league_id: &str,
) -> anyhow::Result<PricingSession<DynSource>> {
    let source: DynSource = match config.data.source {
        DataSourceKind::Json => Arc::new(JsonFileSource::new(base_dir.join(&config.data.path))),
        DataSourceKind::Sqlite => Arc::new(open_database(config, base_dir)?),
    };
    let cache = PricingDataCache::with_ttl(source, config.cache.ttl());
    let mut session = PricingSession::new(league_id, cache, config.budget_config()?)
        .with_season_weights(config.valuation.season_weights);
    if let Some(scoring) = &config.scoring {
        session = session.with_scoring(scoring.clone());
    }
    Ok(session)
}

fn open_database(config: &PricingConfig, base_dir: &Path) -> anyhow::Result<Database> {
    let path = base_dir.join(&config.data.database);
    let path = path.to_str().context("database path is not valid UTF-8")?;
    Database::open(path)
}

fn report(
    session: &PricingSession<DynSource>,
    json: bool,
    finalize: bool,
    config: &PricingConfig,
    base_dir: &Path,
) -> anyhow::Result<()> {
    let set = session
        .price_set()
        .context("no price set was generated")?;
    print_price_set(set, json)?;
    if finalize {
        let db = open_database(config, base_dir)?;
        let id = session.finalize(&db)?;
        println!("Finalized price set #{id}");
    }
    Ok(())
}

fn print_price_set(set: &PriceSet, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(set)?);
        return Ok(());
    }

    let summary = set.summary();
    println!(
        "{} players, total ${}, avg ${:.2}, max ${}",
        summary.player_count, summary.total_salary, summary.avg_salary, summary.max_salary
    );
    println!();
    println!("Distribution:");
    for bucket in pricing_engine::valuation::distribution::SalaryBucket::ALL {
        println!("  {:>7}  {}", bucket.label(), summary.distribution.count(bucket));
    }
    println!();
    println!("Top players:");
    for (rank, top) in summary.top_players.iter().enumerate() {
        let marker = match set.entry(&top.player_id) {
            Some(entry) if entry.is_overridden() => " *",
            _ => "",
        };
        println!(
            "  {:>2}. {:<24} {:<6} ${}{}",
            rank + 1,
            top.player_name,
            top.position,
            top.salary,
            marker
        );
    }
    Ok(())
}

/// Logs go to stderr so stdout stays clean for `--json`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pricing_engine=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
