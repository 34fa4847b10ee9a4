//! wanderplan: conversational trip-itinerary sessions over a structured-output LLM service
//!
//! A [`SessionManager`] owns the single active trip conversation. It turns
//! [`TripPreferences`] into a generation request, turns free-text feedback
//! into refinement requests on the same conversation, and only ever exposes
//! itineraries that passed schema and structural validation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wanderplan::{parse_start_date, PlannerConfig, SessionManager, TripPreferences};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlannerConfig::from_env()?;
//!     let planner = SessionManager::from_config(&config);
//!
//!     let prefs = TripPreferences::builder("Kyoto, Japan", parse_start_date("2026-11-02")?)
//!         .duration(2)
//!         .interest("Local Culture")
//!         .travelers("2 Adults")
//!         .build()?;
//!
//!     let itinerary = planner.start_session(prefs).await?;
//!     println!("{}", itinerary.title);
//!
//!     let revised = planner.refine("Make day 2 more relaxing").await?;
//!     println!("{}", revised.summary);
//!     Ok(())
//! }
//! ```

extern crate self as wanderplan;

pub mod config;
pub mod core;
pub mod error;
pub mod schemas;
pub mod services;
pub mod types;

pub use config::PlannerConfig;
pub use self::core::{
    Conversation, PlannerState, SessionManager, SessionSettings, SessionStatus, TripSession,
};
pub use error::{PlannerError, Result};
pub use schemas::{CompletionSchema, SchemaHandle};
pub use services::{
    request_itinerary, Exchange, GenerationReply, GenerationRequest, GenerationService,
    OpenAIClient,
};
pub use types::{
    parse_start_date, parse_structured_text, Activity, BudgetLevel, DayCountExpectation, DayPlan,
    Itinerary, TokenUsage, TripPreferences, TurnKind, TurnRecord, WalkingTolerance,
};
pub use wanderplan_macros::completion_schema;

pub use schemas as schema;

#[cfg(feature = "cli")]
pub mod cli;
