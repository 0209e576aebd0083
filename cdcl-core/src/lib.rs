//! The incremental propagation core of a CDCL solver: the assignment trail (with chronological
//! and multi-trail backtracking), two-watched-literals unit propagation, and an embedded proof
//! observer. Decision heuristics, conflict analysis and clause learning, restarts, preprocessing,
//! the main clause-arena GC and all I/O live outside this crate.

pub mod backtrack;
pub mod clause;
pub mod config;
pub mod context;
pub mod observer;
pub mod propagate;
pub mod trail;
pub mod vars;
pub mod watch;

pub use cdcl_formula::{Lit, Var};
pub use context::Context;
