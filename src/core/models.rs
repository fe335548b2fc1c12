use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PlannerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityPreference {
    Outdoor,
    Indoor,
}

impl ActivityPreference {
    /// Phrase used when describing the preference to the model.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Outdoor => "outdoor nature and adventure",
            Self::Indoor => "indoor culture and shopping",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transportation {
    #[default]
    PublicTransit,
    RentalCar,
    CharteredCar,
}

impl Transportation {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::PublicTransit => "public transit",
            Self::RentalCar => "self-drive rental car",
            Self::CharteredCar => "chartered car with driver",
        }
    }
}

/// Validated input for a single itinerary generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    destination: String,
    days: u32,
    budget: f64,
    party_size: u32,
    preference: ActivityPreference,
    special_request: String,
    transportation: Transportation,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl TripRequest {
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the destination is blank, `days` or
    /// `party_size` is zero, or the budget is negative or not finite.
    pub fn new(
        destination: impl Into<String>,
        days: u32,
        budget: f64,
        party_size: u32,
        preference: ActivityPreference,
    ) -> Result<Self, PlannerError> {
        let destination = destination.into().trim().to_string();
        if destination.is_empty() {
            return Err(PlannerError::InvalidRequest(
                "destination must not be empty".to_string(),
            ));
        }
        if days == 0 {
            return Err(PlannerError::InvalidRequest(
                "trip must last at least one day".to_string(),
            ));
        }
        if !budget.is_finite() || budget < 0.0 {
            return Err(PlannerError::InvalidRequest(format!(
                "budget must be a non-negative number, got {budget}"
            )));
        }
        if party_size == 0 {
            return Err(PlannerError::InvalidRequest(
                "party size must be at least one".to_string(),
            ));
        }

        Ok(Self {
            destination,
            days,
            budget,
            party_size,
            preference,
            special_request: String::new(),
            transportation: Transportation::default(),
            start_date: None,
            end_date: None,
        })
    }

    /// Sets the trip dates and derives the day count from them (inclusive).
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if `end` is before `start`.
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Result<Self, PlannerError> {
        if end < start {
            return Err(PlannerError::InvalidRequest(format!(
                "end date {end} is before start date {start}"
            )));
        }
        let span = (end - start).num_days() + 1;
        self.days = u32::try_from(span.max(1)).unwrap_or(u32::MAX);
        self.start_date = Some(start);
        self.end_date = Some(end);
        Ok(self)
    }

    #[must_use]
    pub fn with_special_request(mut self, request: impl Into<String>) -> Self {
        self.special_request = request.into();
        self
    }

    #[must_use]
    pub const fn with_transportation(mut self, transportation: Transportation) -> Self {
        self.transportation = transportation;
        self
    }

    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    #[must_use]
    pub const fn days(&self) -> u32 {
        self.days
    }

    #[must_use]
    pub const fn budget(&self) -> f64 {
        self.budget
    }

    #[must_use]
    pub const fn party_size(&self) -> u32 {
        self.party_size
    }

    #[must_use]
    pub const fn preference(&self) -> ActivityPreference {
        self.preference
    }

    #[must_use]
    pub fn special_request(&self) -> &str {
        &self.special_request
    }

    #[must_use]
    pub const fn transportation(&self) -> Transportation {
        self.transportation
    }

    #[must_use]
    pub const fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    #[must_use]
    pub const fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }
}

/// Append-only history entry written after a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: Uuid,
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub days: u32,
    pub budget: f64,
    pub party_size: u32,
    pub preference: ActivityPreference,
    pub transportation: Transportation,
    pub itinerary: String,
    pub created_at: DateTime<Utc>,
}

impl TripRecord {
    #[must_use]
    pub fn from_generation(request: &TripRequest, itinerary: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination: request.destination.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            days: request.days,
            budget: request.budget,
            party_size: request.party_size,
            preference: request.preference,
            transportation: request.transportation,
            itinerary,
            created_at: Utc::now(),
        }
    }
}
