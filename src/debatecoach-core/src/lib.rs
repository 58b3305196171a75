//! DebateCoach Core Library
//!
//! Provides the six-round debate state machine, the completion service
//! contract it is driven by, and the reading collaborators (topics, quiz,
//! essay feedback) built on the same contract.

pub mod book;
pub mod completion;
pub mod config;
pub mod debate_format;
pub mod error;
pub mod feedback;
pub mod mock;
pub mod orchestrator;
pub mod participant;
pub mod quiz;
pub mod session_store;
pub mod topics;

pub use book::Book;
pub use completion::{ChatMessage, ChatRole, CompletionError, CompletionService, OpenAiCompletion};
pub use config::{Config, default_config};
pub use debate_format::{Round, scheduled_side};
pub use error::DebateError;
pub use orchestrator::{DebateEvent, DebateOrchestrator, DebateSession, DebateState, Turn};
pub use participant::{Side, Speaker};
pub use session_store::SessionStore;
pub use topics::propose_topics;
