use crate::types::TripPreferences;

/// Fixed instruction profile every trip conversation starts with.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert family travel planner. Your goal is to create detailed, realistic, and structured travel itineraries based on user inputs.
Always prioritize family-friendly logistics (not too many activities, breaks included).
Format dates based on the user's start date.
Ensure the output is strictly Valid JSON adhering to the provided schema.";

/// First user turn of a session, embedding every preference field.
pub fn generation_prompt(prefs: &TripPreferences) -> String {
    let interests = if prefs.interests().is_empty() {
        "No specific interests".to_string()
    } else {
        prefs.interests().join(", ")
    };

    format!(
        "Create a {}-day trip to {} starting on {}.\n\
         Travelers: {}.\n\
         Budget: {}.\n\
         Walking Tolerance: {}.\n\
         Interests: {}.\n\
         \n\
         Please provide a day-by-day itinerary.",
        prefs.duration(),
        prefs.destination(),
        prefs.start_date().format("%Y-%m-%d"),
        prefs.travelers(),
        prefs.budget_level().label(),
        prefs.walking_tolerance().label(),
        interests
    )
}

/// Follow-up user turn asking for a revision of the current itinerary.
///
/// With `locked_days` set the prompt pins the day count explicitly.
pub fn refinement_prompt(feedback: &str, locked_days: Option<usize>) -> String {
    let mut prompt = format!(
        "Update the itinerary based on this feedback: \"{}\".\n\
         Keep the same JSON structure. Maintain the same dates and general flow unless requested otherwise.",
        feedback.trim()
    );

    if let Some(days) = locked_days {
        prompt.push_str(&format!(
            "\nThe itinerary must still contain exactly {} days, numbered 1 to {}.",
            days, days
        ));
    }

    prompt
}
