/// Trip planner - streams AI-generated travel itineraries from a chat-completions API.
///
/// A caller builds a `TripRequest`, hands it to a `TripPlanner` together with a
/// `GenerationSession`, and observes the session while the itinerary text
/// streams in.
///
/// # Architecture
///
/// The system uses:
/// - reqwest for the streaming HTTP request
/// - a line-oriented SSE parser for `data:` frames
/// - tokio `watch`/`broadcast` channels for session observers
/// - tracing for structured logs
///
/// # Example
///
/// ```no_run
/// use tripplanner::core::config::AppConfig;
/// use tripplanner::core::models::{ActivityPreference, TripRequest};
/// use tripplanner::{GenerationSession, SessionUpdate, TripPlanner};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     tripplanner::setup_logging();
///
///     let config = AppConfig::from_env()?;
///     let planner = TripPlanner::from_config(&config)?;
///
///     let request = TripRequest::new("Kyoto", 3, 30000.0, 2, ActivityPreference::Outdoor)?
///         .with_special_request("Vegetarian food, please");
///
///     let session = GenerationSession::new();
///     let mut updates = session.subscribe();
///     let printer = tokio::spawn(async move {
///         while let Ok(update) = updates.recv().await {
///             match update {
///                 SessionUpdate::Fragment(text) => print!("{text}"),
///                 SessionUpdate::Failed(detail) => eprintln!("\n{detail}"),
///                 SessionUpdate::Phase(_) => {}
///             }
///         }
///     });
///
///     let result = planner.generate(&session, &request).await;
///     drop(session);
///     let _ = printer.await;
///     result?;
///     Ok(())
/// }
/// ```
// Module declarations
pub mod ai;
pub mod core;
pub mod errors;
pub mod planner;
pub mod session;
pub mod store;

pub use errors::PlannerError;
pub use planner::TripPlanner;
pub use session::{GenerationSession, Phase, SessionSnapshot, SessionUpdate};

/// Configure structured logging with JSON output.
///
/// Honours `RUST_LOG`, defaulting to `info`. Calling it again after a
/// subscriber is installed is a no-op.
///
/// # Example
///
/// ```
/// tripplanner::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
