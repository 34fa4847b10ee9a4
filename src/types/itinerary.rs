use crate::{
    completion_schema,
    error::{PlannerError, Result},
};
use chrono::{Days, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A day-by-day family travel itinerary.
#[completion_schema(name = "Itinerary")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    /// Catchy title for the whole trip
    pub title: String,
    /// Two or three sentence overview of the trip
    pub summary: String,
    /// One entry per trip day, in order, numbered from 1
    pub days: Vec<DayPlan>,
}

/// Plan for a single day of the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    /// 1-based day counter within the itinerary
    pub day_number: u32,
    /// Calendar date, assigned from the trip start date once the plan is accepted.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub date: Option<NaiveDate>,
    /// Short theme tying the day together
    pub theme: String,
    /// Morning activities in chronological order
    pub morning: Vec<Activity>,
    /// Afternoon activities in chronological order
    pub afternoon: Vec<Activity>,
    /// Evening activities in chronological order
    pub evening: Vec<Activity>,
}

/// A single planned activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Name of the activity
    pub title: String,
    /// What the family will do and why it suits them
    pub description: String,
    /// Venue, neighbourhood or address
    pub location: String,
    /// Rough cost, e.g. "Free" or "$20 per person"
    #[serde(default)]
    pub estimated_cost: String,
    /// Rough duration, e.g. "2 hours"
    #[serde(default)]
    pub duration: String,
    /// Short labels such as "Kid-friendly" or "Indoor"
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Constraints an itinerary must meet beyond its JSON shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCountExpectation {
    /// Exact number of days required, if any.
    pub exact: Option<usize>,
}

impl DayCountExpectation {
    pub fn exactly(days: usize) -> Self {
        Self { exact: Some(days) }
    }

    pub fn any() -> Self {
        Self { exact: None }
    }
}

impl Itinerary {
    /// Checks the invariants JSON Schema cannot express.
    ///
    /// Days must be numbered 1..=N in order, every activity must carry a
    /// non-blank title, description and location, and the day count must
    /// satisfy `expectation`. The first problem found aborts the check.
    pub fn check_structure(&self, expectation: DayCountExpectation) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(violation("title", "must not be blank"));
        }

        if self.days.is_empty() {
            return Err(violation("days", "itinerary contains no days"));
        }

        if let Some(expected) = expectation.exact {
            if self.days.len() != expected {
                return Err(violation(
                    "days",
                    &format!("expected {} days, got {}", expected, self.days.len()),
                ));
            }
        }

        for (idx, day) in self.days.iter().enumerate() {
            let position = idx + 1;
            if day.day_number as usize != position {
                return Err(violation(
                    &format!("days[{idx}].dayNumber"),
                    &format!("expected {}, got {}", position, day.day_number),
                ));
            }

            for (slot, activities) in day.slots() {
                for (a_idx, activity) in activities.iter().enumerate() {
                    let path = format!("days[{idx}].{slot}[{a_idx}]");
                    activity.check_required(&path)?;
                }
            }
        }

        Ok(())
    }

    /// Stamp each day with `start + (dayNumber - 1)`.
    pub fn assign_dates(&mut self, start: NaiveDate) {
        for day in &mut self.days {
            let offset = u64::from(day.day_number.saturating_sub(1));
            day.date = start.checked_add_days(Days::new(offset));
        }
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Total number of activities across all days and time slots.
    pub fn activity_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|day| day.slots())
            .map(|(_, activities)| activities.len())
            .sum()
    }
}

impl DayPlan {
    /// The three time slots in display order.
    pub fn slots(&self) -> [(&'static str, &[Activity]); 3] {
        [
            ("morning", self.morning.as_slice()),
            ("afternoon", self.afternoon.as_slice()),
            ("evening", self.evening.as_slice()),
        ]
    }
}

impl Activity {
    fn check_required(&self, path: &str) -> Result<()> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("location", &self.location),
        ] {
            if value.trim().is_empty() {
                return Err(violation(&format!("{path}.{field}"), "must not be blank"));
            }
        }
        Ok(())
    }
}

fn violation(path: &str, detail: &str) -> PlannerError {
    PlannerError::SchemaViolation(format!("`Itinerary` invalid at {path}: {detail}"))
}
