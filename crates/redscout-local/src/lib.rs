//! Z.AI-backed Reddit thread discovery: request building, the live transport,
//! and interpretation of whatever shape the service answers with.

pub mod diagnostics;
pub mod extract;
pub mod interpret;
pub mod request;
pub mod response;
pub mod zai;

pub use diagnostics::{MemorySink, TracingSink};
pub use interpret::{parse, Interpreter, RelevancePolicy};
pub use request::{core_subject, search_reddit, SearchParams, ZAI_CHAT_URL};
pub use zai::{ZaiConfig, ZaiTransport};
