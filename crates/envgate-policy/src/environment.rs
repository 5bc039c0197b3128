// environment.rs — Resolved environment model.
//
// An Environment is the validated, canonicalized form of one entry in the
// environment config file. It is built once by the catalog and never mutated:
// every path is already canonical and every regex already compiled, so the
// evaluator only compares like with like.

use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coarse severity attached to refused operations and recorded outcomes.
///
/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Whether a command rule vetoes or permits a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    #[default]
    Block,
    Allow,
}

/// How a command rule's pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Whitespace-separated tokens that must equal a run of command tokens.
    #[default]
    Prefix,
    /// A regex tested against the normalized command text.
    Regex,
}

/// Access granted beneath a path root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAccess {
    Forbidden,
    ReadOnly,
    ReadWrite,
}

impl PathAccess {
    /// Higher is stricter. Used to break ties between rules on the same root.
    pub(crate) fn strictness(self) -> u8 {
        match self {
            PathAccess::Forbidden => 2,
            PathAccess::ReadOnly => 1,
            PathAccess::ReadWrite => 0,
        }
    }
}

impl fmt::Display for PathAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathAccess::Forbidden => write!(f, "forbidden"),
            PathAccess::ReadOnly => write!(f, "read_only"),
            PathAccess::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// A compiled command pattern.
#[derive(Debug, Clone)]
pub enum CommandMatcher {
    /// Normalized tokens of a prefix pattern.
    Prefix(Vec<String>),
    /// A compiled regex.
    Regex(Regex),
}

impl CommandMatcher {
    pub fn kind(&self) -> MatchKind {
        match self {
            CommandMatcher::Prefix(_) => MatchKind::Prefix,
            CommandMatcher::Regex(_) => MatchKind::Regex,
        }
    }
}

/// One entry of an environment's command policy.
#[derive(Debug, Clone)]
pub struct CommandRule {
    /// The pattern as written in the config, used in reasons and reports.
    pub pattern: String,
    pub matcher: CommandMatcher,
    pub action: RuleAction,
    pub risk_level: RiskLevel,
}

/// Access declared for everything beneath a canonical root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub root: PathBuf,
    pub access: PathAccess,
}

/// Per-environment switches for the feedback journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSettings {
    /// Record validation outcomes at all.
    #[serde(default = "default_true")]
    pub track_outcomes: bool,
    /// Record failures automatically when an executed action errors.
    #[serde(default = "default_true")]
    pub auto_report_errors: bool,
    /// Record durations alongside outcomes.
    #[serde(default = "default_true")]
    pub collect_metrics: bool,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            track_outcomes: true,
            auto_report_errors: true,
            collect_metrics: true,
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}

/// A named, fully resolved policy profile.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub description: String,
    /// Canonical absolute working directory.
    pub working_dir: PathBuf,
    /// Command rules in declaration order.
    pub command_rules: Vec<CommandRule>,
    /// Path rules in declaration order.
    pub path_rules: Vec<PathRule>,
    /// Canonical roots under which writes and deletes may land.
    pub writable_roots: Vec<PathBuf>,
    pub network_allowed: bool,
    pub allow_write: bool,
    pub allow_delete: bool,
    pub max_file_size_mb: Option<u64>,
    pub feedback: FeedbackSettings,
}

impl Environment {
    /// Block rules in declaration order.
    pub fn block_rules(&self) -> impl Iterator<Item = &CommandRule> {
        self.command_rules
            .iter()
            .filter(|rule| rule.action == RuleAction::Block)
    }

    /// Allow rules in declaration order.
    pub fn allow_rules(&self) -> impl Iterator<Item = &CommandRule> {
        self.command_rules
            .iter()
            .filter(|rule| rule.action == RuleAction::Allow)
    }

    /// Whether an allowlist is configured for this environment.
    pub fn has_allowlist(&self) -> bool {
        self.allow_rules().next().is_some()
    }
}
