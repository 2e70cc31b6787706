//! Domain models for the prerequisite playground.
//!
//! # Core Concepts
//!
//! - [`PlaySession`]: a learner's diagnostic run against one target concept. It
//!   holds the prerequisite snapshot, the queue of yes/no questions, the answer
//!   log and the concepts answered negatively.
//! - [`DiagnosticResults`]: the strong/weak partition derived from a session.
//!   It is computed on demand and never stored.
//!
//! Concepts themselves have no entity; they are referenced by name.

mod session;

pub use session::*;
