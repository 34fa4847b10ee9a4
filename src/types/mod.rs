pub mod itinerary;
pub mod preferences;
pub mod response;
pub mod turn;

pub use itinerary::{Activity, DayCountExpectation, DayPlan, Itinerary};
pub use preferences::{
    parse_start_date, BudgetLevel, TripPreferences, TripPreferencesBuilder, WalkingTolerance,
    MAX_TRIP_DAYS, MIN_TRIP_DAYS,
};
pub use response::{deserialize_structured_response, parse_structured_text};
pub use turn::{TokenUsage, TurnKind, TurnRecord};
