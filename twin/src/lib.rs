//! Recruiter-facing profile agent.
//!
//! The agent answers questions about one person's professional profile in
//! that person's voice and captures recruiter contact details as leads. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (action parsing, lead
//!   validation, profile lookups, the per-turn state machine). No I/O.
//! - **[`io`]**: Side-effecting collaborators (config, profile file, model
//!   server, lead sinks). Hidden behind traits so tests can script them.
//!
//! Orchestration modules ([`tools`], [`session`], [`bootstrap`]) combine the
//! two to implement the CLI and the HTTP server in `twin-ui`.

pub mod bootstrap;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
