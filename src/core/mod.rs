pub mod conversation;
pub mod prompts;
pub mod session;

pub use conversation::Conversation;
pub use prompts::{generation_prompt, refinement_prompt, SYSTEM_INSTRUCTION};
pub use session::{PlannerState, SessionManager, SessionSettings, SessionStatus, TripSession};
