use crate::error::{PlannerError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Shortest trip the planner accepts, in days.
pub const MIN_TRIP_DAYS: u32 = 1;
/// Longest trip the planner accepts, in days.
pub const MAX_TRIP_DAYS: u32 = 14;

const DEFAULT_DURATION: u32 = 3;
const DEFAULT_TRAVELERS: &str = "2 Adults, 1 Child";

/// Spending tier for the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BudgetLevel {
    Budget,
    #[default]
    Moderate,
    Luxury,
}

impl BudgetLevel {
    /// Wording used when describing the budget to the generation service.
    pub fn label(&self) -> &'static str {
        match self {
            BudgetLevel::Budget => "Budget-friendly",
            BudgetLevel::Moderate => "Moderate",
            BudgetLevel::Luxury => "Luxury",
        }
    }
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BudgetLevel {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "budget" | "budget-friendly" | "cheap" => Ok(BudgetLevel::Budget),
            "moderate" | "mid" | "medium" => Ok(BudgetLevel::Moderate),
            "luxury" | "high" => Ok(BudgetLevel::Luxury),
            other => Err(PlannerError::InvalidPreferences(format!(
                "unknown budget level `{other}` (expected budget, moderate or luxury)"
            ))),
        }
    }
}

/// How much walking the travelers are comfortable with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WalkingTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl WalkingTolerance {
    pub fn label(&self) -> &'static str {
        match self {
            WalkingTolerance::Low => "Low (prefer taxi/transit)",
            WalkingTolerance::Medium => "Medium (happy to walk)",
            WalkingTolerance::High => "High (hiking/long walks)",
        }
    }
}

impl fmt::Display for WalkingTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WalkingTolerance {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(WalkingTolerance::Low),
            "medium" | "mid" => Ok(WalkingTolerance::Medium),
            "high" => Ok(WalkingTolerance::High),
            other => Err(PlannerError::InvalidPreferences(format!(
                "unknown walking tolerance `{other}` (expected low, medium or high)"
            ))),
        }
    }
}

/// Everything the traveler told us about the trip they want.
///
/// Only obtainable through [`TripPreferences::builder`], so a value of this
/// type always satisfies the field-level preconditions of a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPreferences {
    destination: String,
    start_date: NaiveDate,
    duration: u32,
    budget_level: BudgetLevel,
    walking_tolerance: WalkingTolerance,
    interests: Vec<String>,
    travelers: String,
}

impl TripPreferences {
    pub fn builder(destination: impl Into<String>, start_date: NaiveDate) -> TripPreferencesBuilder {
        TripPreferencesBuilder::new(destination, start_date)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Trip length in days.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn budget_level(&self) -> BudgetLevel {
        self.budget_level
    }

    pub fn walking_tolerance(&self) -> WalkingTolerance {
        self.walking_tolerance
    }

    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    pub fn travelers(&self) -> &str {
        &self.travelers
    }
}

#[derive(Debug, Clone)]
pub struct TripPreferencesBuilder {
    destination: String,
    start_date: NaiveDate,
    duration: u32,
    budget_level: BudgetLevel,
    walking_tolerance: WalkingTolerance,
    interests: Vec<String>,
    travelers: String,
}

impl TripPreferencesBuilder {
    fn new(destination: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            destination: destination.into(),
            start_date,
            duration: DEFAULT_DURATION,
            budget_level: BudgetLevel::default(),
            walking_tolerance: WalkingTolerance::default(),
            interests: Vec::new(),
            travelers: DEFAULT_TRAVELERS.to_string(),
        }
    }

    pub fn duration(mut self, days: u32) -> Self {
        self.duration = days;
        self
    }

    pub fn budget(mut self, level: BudgetLevel) -> Self {
        self.budget_level = level;
        self
    }

    pub fn walking(mut self, tolerance: WalkingTolerance) -> Self {
        self.walking_tolerance = tolerance;
        self
    }

    pub fn interest(mut self, interest: impl Into<String>) -> Self {
        self.interests.push(interest.into());
        self
    }

    pub fn interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests.extend(interests.into_iter().map(Into::into));
        self
    }

    pub fn travelers(mut self, travelers: impl Into<String>) -> Self {
        self.travelers = travelers.into();
        self
    }

    pub fn build(self) -> Result<TripPreferences> {
        let destination = self.destination.trim().to_string();
        if destination.is_empty() {
            return Err(PlannerError::InvalidPreferences(
                "destination must not be empty".to_string(),
            ));
        }

        if !(MIN_TRIP_DAYS..=MAX_TRIP_DAYS).contains(&self.duration) {
            return Err(PlannerError::InvalidPreferences(format!(
                "duration must be between {} and {} days, got {}",
                MIN_TRIP_DAYS, MAX_TRIP_DAYS, self.duration
            )));
        }

        // Interests behave as a set: first spelling wins, order is kept.
        let mut interests: Vec<String> = Vec::with_capacity(self.interests.len());
        for interest in self.interests {
            let interest = interest.trim();
            if interest.is_empty()
                || interests
                    .iter()
                    .any(|seen| seen.eq_ignore_ascii_case(interest))
            {
                continue;
            }
            interests.push(interest.to_string());
        }

        let travelers = match self.travelers.trim() {
            "" => DEFAULT_TRAVELERS.to_string(),
            other => other.to_string(),
        };

        Ok(TripPreferences {
            destination,
            start_date: self.start_date,
            duration: self.duration,
            budget_level: self.budget_level,
            walking_tolerance: self.walking_tolerance,
            interests,
            travelers,
        })
    }
}

/// Parse a `YYYY-MM-DD` start date as entered by the user.
pub fn parse_start_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|err| {
        PlannerError::InvalidPreferences(format!(
            "start date `{}` is not a YYYY-MM-DD date: {}",
            text.trim(),
            err
        ))
    })
}
