//! Chapter generation pipeline for a serialized story.
//!
//! A chapter moves through three agent roles (architect, writer, editor)
//! with a human approval gate on the outline. The crate keeps the same split
//! between deterministic logic and side effects throughout:
//!
//! - **[`core`]**: Pure logic (text metrics, numbering, validation heuristics,
//!   style statistics, workflow transitions). No I/O.
//! - **[`io`]**: Filesystem artifacts, knowledge files, configuration, prompt
//!   rendering, agent subprocesses and approval prompts.
//!
//! Orchestration modules ([`workflow`], [`training`], [`status`]) combine the
//! two to implement CLI commands.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod inputs;
pub mod io;
pub mod logging;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod training;
pub mod workflow;
