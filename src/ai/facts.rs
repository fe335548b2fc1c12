//! Auxiliary context fetched before prompting: weather and budget split.
//!
//! Facts are advisory. A provider failure degrades to a fallback sentence
//! instead of failing the generation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::models::TripRequest;
use crate::errors::PlannerError;

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn lookup_weather(&self, place: &str) -> Result<String, PlannerError>;
}

#[async_trait]
pub trait BudgetPlanner: Send + Sync {
    async fn compute_budget_split(
        &self,
        total: f64,
        party_size: u32,
        days: u32,
    ) -> Result<String, PlannerError>;
}

/// Context injected into the system prompt. `None` means no provider was supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryFacts {
    pub weather: Option<String>,
    pub budget: Option<String>,
}

/// The set of providers a planner consults; either may be absent.
#[derive(Clone, Default)]
pub struct FactProviders {
    weather: Option<Arc<dyn WeatherLookup>>,
    budget: Option<Arc<dyn BudgetPlanner>>,
}

impl std::fmt::Debug for FactProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactProviders")
            .field("weather", &self.weather.is_some())
            .field("budget", &self.budget.is_some())
            .finish()
    }
}

impl FactProviders {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// The static weather table plus the proportional budget split.
    #[must_use]
    pub fn builtin() -> Self {
        Self::none()
            .with_weather(Arc::new(StaticWeatherTable::default()))
            .with_budget(Arc::new(ProportionalBudgetSplit))
    }

    #[must_use]
    pub fn with_weather(mut self, provider: Arc<dyn WeatherLookup>) -> Self {
        self.weather = Some(provider);
        self
    }

    #[must_use]
    pub fn with_budget(mut self, provider: Arc<dyn BudgetPlanner>) -> Self {
        self.budget = Some(provider);
        self
    }

    /// Runs both lookups concurrently and waits for both.
    pub async fn gather(&self, request: &TripRequest) -> AuxiliaryFacts {
        let weather = async {
            let provider = self.weather.as_ref()?;
            let place = request.destination();
            Some(match provider.lookup_weather(place).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, place, "Weather lookup failed; using fallback");
                    weather_fallback(place)
                }
            })
        };
        let budget = async {
            let provider = self.budget.as_ref()?;
            Some(
                match provider
                    .compute_budget_split(request.budget(), request.party_size(), request.days())
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Budget split failed; using fallback");
                        BUDGET_FALLBACK.to_string()
                    }
                },
            )
        };

        let (weather, budget) = futures::join!(weather, budget);
        debug!(
            has_weather = weather.is_some(),
            has_budget = budget.is_some(),
            "Gathered auxiliary facts"
        );
        AuxiliaryFacts { weather, budget }
    }
}

const BUDGET_FALLBACK: &str =
    "No budget breakdown is available; keep daily spending within the total budget.";

fn weather_fallback(place: &str) -> String {
    format!("No forecast is available for {place}; pack for changeable weather.")
}

/// Canned forecasts keyed by city, with a fair-weather default.
#[derive(Debug, Clone)]
pub struct StaticWeatherTable {
    entries: HashMap<String, &'static str>,
    latency: Duration,
}

impl Default for StaticWeatherTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        for (names, forecast) in [
            (
                ["taipei", "台北"],
                "Cloudy with sunny spells, 22-28°C, occasional afternoon showers.",
            ),
            (["tokyo", "東京"], "Clear and dry, 15-22°C, good for walking."),
            (
                ["kyoto", "京都"],
                "Cool and comfortable, 14-20°C, large day-night swing.",
            ),
            (["seoul", "首爾"], "Dry and cold, 10-18°C, dress warmly."),
            (["paris", "巴黎"], "Overcast with drizzle, 12-16°C, bring rain gear."),
        ] {
            for name in names {
                entries.insert(name.to_string(), forecast);
            }
        }
        Self {
            entries,
            latency: Duration::ZERO,
        }
    }
}

impl StaticWeatherTable {
    /// Adds an artificial delay to every lookup.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl WeatherLookup for StaticWeatherTable {
    async fn lookup_weather(&self, place: &str) -> Result<String, PlannerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let key = place.trim().to_lowercase();
        Ok(self.entries.get(&key).map_or_else(
            || format!("{place}: clear skies all week, averaging 25°C; good for outdoor activities."),
            |forecast| (*forecast).to_string(),
        ))
    }
}

/// Splits the total per person and per day, plus a fixed category allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalBudgetSplit;

const ALLOCATION: [(&str, f64); 4] = [
    ("lodging", 0.35),
    ("food", 0.30),
    ("transport", 0.20),
    ("tickets & shopping", 0.15),
];

#[async_trait]
impl BudgetPlanner for ProportionalBudgetSplit {
    async fn compute_budget_split(
        &self,
        total: f64,
        party_size: u32,
        days: u32,
    ) -> Result<String, PlannerError> {
        if party_size == 0 || days == 0 {
            return Err(PlannerError::Fact(
                "party size and day count must be positive".to_string(),
            ));
        }
        let total = total.trunc();
        let per_person = (total / f64::from(party_size)).floor();
        let daily = (total / f64::from(days)).floor();

        let split = ALLOCATION
            .iter()
            .map(|(name, share)| format!("{name} {:.0}% ({:.0})", share * 100.0, total * share))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "Total budget {total:.0} for {party_size} traveller(s), about {per_person:.0} per person. \
             About {daily:.0} per day for the whole party. Suggested split: {split}."
        ))
    }
}
