use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tripplanner::core::config::AppConfig;
use tripplanner::core::models::{ActivityPreference, Transportation, TripRequest};
use tripplanner::store::{JsonlTripStore, TripStore};
use tripplanner::{GenerationSession, SessionUpdate, TripPlanner};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Transit,
    Rental,
    Charter,
}

impl From<TransportArg> for Transportation {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Transit => Self::PublicTransit,
            TransportArg::Rental => Self::RentalCar,
            TransportArg::Charter => Self::CharteredCar,
        }
    }
}

/// Stream an AI-generated travel itinerary to the terminal.
#[derive(Debug, Parser)]
#[command(name = "trip-planner", version)]
struct Cli {
    /// Where to go
    #[arg(short, long, required_unless_present = "list_history")]
    destination: Option<String>,

    /// Trip length in days (ignored when --start and --end are given)
    #[arg(long, default_value_t = 3)]
    days: u32,

    /// First day of the trip (YYYY-MM-DD)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last day of the trip (YYYY-MM-DD)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Total budget for the whole party
    #[arg(short, long, default_value_t = 30000.0)]
    budget: f64,

    /// Number of travellers
    #[arg(short, long, default_value_t = 2)]
    party: u32,

    /// Prefer indoor culture and shopping over outdoor activities
    #[arg(long)]
    indoor: bool,

    #[arg(long, value_enum, default_value_t = TransportArg::Transit)]
    transport: TransportArg,

    /// Free-text special requests, passed to the model verbatim
    #[arg(short, long, default_value = "")]
    request: String,

    /// Trip history file (overrides TRIP_HISTORY_PATH)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Print saved trips and exit
    #[arg(long)]
    list_history: bool,
}

impl Cli {
    fn trip_request(&self) -> Result<TripRequest> {
        let destination = self.destination.clone().unwrap_or_default();
        let preference = if self.indoor {
            ActivityPreference::Indoor
        } else {
            ActivityPreference::Outdoor
        };

        let mut request = TripRequest::new(destination, self.days, self.budget, self.party, preference)?
            .with_transportation(self.transport.into())
            .with_special_request(self.request.clone());
        if let (Some(start), Some(end)) = (self.start, self.end) {
            request = request.with_dates(start, end)?;
        }
        Ok(request)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn list_history(path: PathBuf) -> Result<()> {
    let store = JsonlTripStore::new(path);
    let records = store.list().await?;
    if records.is_empty() {
        println!("No saved trips in {}", store.path().display());
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {} ({} days, {} travellers, budget {:.0})",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.destination,
            record.days,
            record.party_size,
            record.budget
        );
    }
    Ok(())
}

/// The part of the accumulated itinerary not yet printed; advances `written`.
fn unwritten(accumulated: &str, written: &mut usize) -> String {
    let fresh = accumulated.get(*written..).unwrap_or_default().to_string();
    *written = accumulated.len().max(*written);
    fresh
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if cli.list_history {
        let path = cli
            .history
            .clone()
            .or_else(|| std::env::var_os("TRIP_HISTORY_PATH").map(PathBuf::from))
            .context("no history file: pass --history or set TRIP_HISTORY_PATH")?;
        return list_history(path).await;
    }

    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(path) = &cli.history {
        config.history_path = Some(path.clone());
    }
    let request = cli.trip_request()?;
    let planner = Arc::new(TripPlanner::from_config(&config)?);

    let session = GenerationSession::new();
    let mut updates = session.subscribe();

    let generation = {
        let planner = Arc::clone(&planner);
        let session = session.clone();
        tokio::spawn(async move { planner.generate(&session, &request).await })
    };

    let ctrl_c_session = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling generation");
            ctrl_c_session.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let mut written = 0;
    loop {
        match updates.recv().await {
            Ok(SessionUpdate::Phase(phase)) => {
                if phase.is_terminal() {
                    break;
                }
                eprintln!("{}", phase.progress_text());
            }
            Ok(SessionUpdate::Fragment(_)) => {
                print!("{}", unwritten(&session.accumulated_text(), &mut written));
                let _ = stdout.flush();
            }
            Ok(SessionUpdate::Failed(_)) => break,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                info!(skipped, "Output fell behind the stream; resyncing");
                print!("{}", unwritten(&session.accumulated_text(), &mut written));
                let _ = stdout.flush();
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
    print!("{}", unwritten(&session.accumulated_text(), &mut written));
    println!();

    match generation.await? {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(error = %e, "Generation failed");
            let partial = session.accumulated_text();
            if !partial.is_empty() {
                eprintln!("(partial itinerary kept above)");
            }
            bail!("{e}")
        }
    }
}
