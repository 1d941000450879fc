//! Finance Command Router
//!
//! Turns short natural-language messages ("beli kopi 25rb", "gaji 5jt")
//! into validated calls against a registry of finance tools:
//! - AI path: a completion service picks one tool and its arguments
//! - Fallback path: deterministic keyword rules when the AI is absent,
//!   slow, or declines
//! - Every dispatch goes through schema validation first
//! - A vernacular calculator resolves amounts like "1,5jt" or "2 x 15rb"
//!
//! ROUTING:
//! MESSAGE → AI_ATTEMPT → (DISPATCH | FALLBACK → (DISPATCH | NO_MATCH))

pub mod api;
pub mod calculator;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod finance;
pub mod gemini;
pub mod memory;
pub mod models;
pub mod router;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use classifier::PatternMatcher;
pub use config::AppConfig;
pub use models::*;
pub use router::{CommandRouter, RouteContext, RouteOutcome};
pub use tools::ToolRegistry;
