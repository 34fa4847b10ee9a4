pub mod gateway;
pub mod generation;
pub mod openai_client;

pub use gateway::{request_itinerary, Exchange};
pub use generation::{GenerationReply, GenerationRequest, GenerationService};
pub use openai_client::OpenAIClient;
