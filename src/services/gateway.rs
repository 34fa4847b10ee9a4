use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    error::{PlannerError, Result},
    services::generation::{GenerationRequest, GenerationService},
    types::{parse_structured_text, DayCountExpectation, Itinerary, TokenUsage},
};

/// A validated itinerary together with the raw reply that produced it.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub itinerary: Itinerary,
    /// Reply text exactly as received, kept for the conversation history
    pub reply_text: String,
    pub usage: Option<TokenUsage>,
    pub elapsed: Duration,
}

/// Send one turn and accept the reply only if it is a complete, valid itinerary.
///
/// Transport failures, empty replies and schema violations all come back as
/// typed errors; a half-valid itinerary is never returned.
pub async fn request_itinerary(
    service: &dyn GenerationService,
    request: GenerationRequest,
    expectation: DayCountExpectation,
    start_date: NaiveDate,
) -> Result<Exchange> {
    let started = Instant::now();
    let reply = service.generate(request).await?;
    let elapsed = started.elapsed();

    let reply_text = reply
        .text
        .filter(|text| !text.trim().is_empty())
        .ok_or(PlannerError::EmptyResponse)?;

    let mut itinerary: Itinerary = parse_structured_text(&reply_text)?;
    itinerary.check_structure(expectation).map_err(|err| {
        debug!(target: "wanderplan::schema", error = %err, "itinerary rejected");
        err
    })?;
    itinerary.assign_dates(start_date);

    Ok(Exchange {
        itinerary,
        reply_text,
        usage: reply.usage,
        elapsed,
    })
}
