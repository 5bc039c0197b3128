//! # envgate-policy
//!
//! Per-environment policy evaluation for autonomous agents.
//!
//! An [`Environment`] (sandbox, dev, staging, prod, ...) declares which
//! commands an agent may run, which filesystem roots it may read, write, or
//! delete under, and whether it may touch the network. The
//! [`EnvironmentCatalog`] loads and canonicalizes one environment from a
//! config file; the [`PolicyEvaluator`] answers "is this operation
//! permitted" without side effects.
//!
//! ## Key invariants
//!
//! - **Blocklist first**: block rules (and the built-in baseline blocklist)
//!   are checked before any allow rule, so `sudo rm -rf /` is refused in
//!   every environment.
//! - **Whole-token matching**: `rm` never matches inside `confirm`.
//! - **Canonical paths**: every path is resolved (symlinks, `..`) before it is
//!   compared against a root, closing `../` traversal.
//! - **Mutations need positive authorization**: writes and deletes must land
//!   under a writable root; reads only need to avoid forbidden roots.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use envgate_policy::EnvironmentCatalog;
//!
//! let catalog = EnvironmentCatalog::load("config/environments.yaml", "sandbox").unwrap();
//! let evaluator = catalog.into_evaluator();
//! assert!(evaluator.validate_command("sudo rm -rf /").is_err());
//! ```

pub mod catalog;
pub mod command;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod paths;

pub use catalog::{
    CommandRuleSpec, EnvironmentCatalog, EnvironmentSpec, EnvironmentsFile, PathRuleSpec,
};
pub use command::CommandVerdict;
pub use environment::{
    CommandMatcher, CommandRule, Environment, FeedbackSettings, MatchKind, PathAccess, PathRule,
    RiskLevel, RuleAction,
};
pub use error::{ConfigError, PolicyError};
pub use evaluator::PolicyEvaluator;
