// evaluator.rs — Policy evaluation over one resolved Environment.
//
// Every agent action is checked here before it runs. The checks are pure:
// they read the Environment (and, for the working directory check, the
// process cwd) and return Ok or a PolicyError that explains the refusal.
//
// Command checks run in two passes:
//
// 1. Block pass: baseline blocklist, then the environment's block rules, in
//    declaration order. First match → BlockedCommand.
// 2. Allow pass: only when the environment declares allow rules. Every
//    segment of the command line must match one → else "not in allowlist".
//
// Path checks resolve the path first, then consult the most specific rule.
// Reads are allowed inside the working dir, a writable root, or any
// non-forbidden rule root. Writes and deletes additionally need a writable
// root.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::command::{self, CommandVerdict};
use crate::environment::{CommandRule, Environment, PathAccess, PathRule, RiskLevel};
use crate::error::PolicyError;
use crate::paths;

/// Answers "is this operation permitted" for one environment.
///
/// Holds no mutable state, so a single evaluator can be shared across
/// threads by reference.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    environment: Environment,
}

impl PolicyEvaluator {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Check that the process cwd is the environment's working directory.
    pub fn validate_working_directory(&self) -> Result<(), PolicyError> {
        match std::env::current_dir() {
            Ok(cwd) => self.validate_working_directory_at(&cwd),
            Err(e) => Err(PolicyError::WorkingDir {
                expected: self.environment.working_dir.clone(),
                actual: format!("<unavailable: {}>", e),
            }),
        }
    }

    /// Check that `cwd` is the environment's working directory.
    pub fn validate_working_directory_at(&self, cwd: &Path) -> Result<(), PolicyError> {
        let actual = paths::resolve(cwd, &self.environment.working_dir);
        if actual == self.environment.working_dir {
            Ok(())
        } else {
            tracing::info!(
                environment = %self.environment.name,
                actual = %actual.display(),
                "working directory mismatch"
            );
            Err(PolicyError::WorkingDir {
                expected: self.environment.working_dir.clone(),
                actual: actual.display().to_string(),
            })
        }
    }

    /// Check a shell command line against the command rules.
    pub fn validate_command(&self, cmd: &str) -> Result<CommandVerdict, PolicyError> {
        let segments = command::parse(cmd);
        let Some(first) = segments.first() else {
            return Err(self.blocked(cmd, "empty command".to_string(), RiskLevel::Low));
        };
        let program = first.tokens[0].clone();

        // Pass 1: blocklists. Baseline patterns apply in every environment.
        if command::is_fork_bomb(cmd) {
            return Err(self.blocked(
                cmd,
                "matches blocked pattern 'fork bomb' (baseline)".to_string(),
                RiskLevel::High,
            ));
        }
        if let Some(rule) = command::first_block(command::baseline_rules(), cmd, &segments) {
            return Err(self.blocked(
                cmd,
                format!("matches blocked pattern '{}' (baseline)", rule.pattern),
                rule.risk_level,
            ));
        }
        if let Some(rule) = command::first_block(self.environment.block_rules(), cmd, &segments) {
            return Err(self.blocked(
                cmd,
                format!(
                    "matches blocked pattern '{}' in environment '{}'",
                    rule.pattern, self.environment.name
                ),
                rule.risk_level,
            ));
        }

        // Pass 2: allowlist, only when one is configured.
        let mut matched_allow = None;
        if self.environment.has_allowlist() {
            let allow_rules: Vec<&CommandRule> = self.environment.allow_rules().collect();
            for segment in &segments {
                match command::allow_match(&allow_rules, segment) {
                    Some(rule) => {
                        if matched_allow.is_none() {
                            matched_allow = Some(rule.pattern.clone());
                        }
                    }
                    None => {
                        return Err(self.blocked(
                            cmd,
                            format!("'{}' is not in allowlist", segment.text()),
                            RiskLevel::Medium,
                        ));
                    }
                }
            }
        }

        tracing::debug!(environment = %self.environment.name, command = cmd, "command allowed");
        Ok(CommandVerdict {
            command: cmd.to_string(),
            matched_allow,
            program,
        })
    }

    /// Check that `path` may be read. Returns the canonical path.
    pub fn validate_path(&self, path: &str) -> Result<PathBuf, PolicyError> {
        self.check_read(path).map_err(|(reason, risk_level)| {
            tracing::info!(environment = %self.environment.name, path, %reason, "path restricted");
            PolicyError::RestrictedPath {
                path: path.to_string(),
                reason,
                risk_level,
            }
        })
    }

    /// Check that `path` may be written. Returns the canonical path.
    pub fn validate_write(&self, path: &str) -> Result<PathBuf, PolicyError> {
        self.check_mutation(path).map_err(|(reason, risk_level)| {
            tracing::info!(environment = %self.environment.name, path, %reason, "write denied");
            PolicyError::WriteDenied {
                path: path.to_string(),
                reason,
                risk_level,
            }
        })
    }

    /// Check that `path` may be deleted. Same checks as a write, plus the
    /// environment's delete switch; every refusal is high risk.
    pub fn validate_delete(&self, path: &str) -> Result<PathBuf, PolicyError> {
        let result = if self.environment.allow_delete {
            self.check_mutation(path).map_err(|(reason, _)| reason)
        } else {
            Err(format!(
                "deletes are disabled in environment '{}'",
                self.environment.name
            ))
        };
        result.map_err(|reason| {
            tracing::info!(environment = %self.environment.name, path, %reason, "delete denied");
            PolicyError::DeleteDenied {
                path: path.to_string(),
                reason,
            }
        })
    }

    /// Check the environment's network gate.
    pub fn validate_network(&self) -> Result<(), PolicyError> {
        if self.environment.network_allowed {
            Ok(())
        } else {
            Err(PolicyError::NetworkDenied {
                environment: self.environment.name.clone(),
            })
        }
    }

    /// Check a file size against the environment's limit, if any.
    pub fn validate_file_size(&self, size_bytes: u64) -> Result<(), PolicyError> {
        match self.environment.max_file_size_mb {
            Some(limit_mb) if size_bytes > limit_mb.saturating_mul(1024 * 1024) => {
                Err(PolicyError::FileTooLarge {
                    size_bytes,
                    limit_mb,
                })
            }
            _ => Ok(()),
        }
    }

    /// Read-only projection of the environment for display.
    pub fn constraints_summary(&self) -> Value {
        let env = &self.environment;
        let describe = |rule: &CommandRule| {
            json!({
                "pattern": rule.pattern,
                "match": rule.matcher.kind(),
                "risk": rule.risk_level,
            })
        };
        let blocked: Vec<Value> = env.block_rules().map(describe).collect();
        let allowed: Vec<Value> = env.allow_rules().map(describe).collect();
        let path_rules: Vec<Value> = env
            .path_rules
            .iter()
            .map(|rule| json!({ "root": rule.root.display().to_string(), "access": rule.access }))
            .collect();
        let writable_roots: Vec<String> = env
            .writable_roots
            .iter()
            .map(|root| root.display().to_string())
            .collect();

        json!({
            "name": env.name,
            "description": env.description,
            "working_dir": env.working_dir.display().to_string(),
            "network_allowed": env.network_allowed,
            "allow_write": env.allow_write,
            "allow_delete": env.allow_delete,
            "max_file_size_mb": env.max_file_size_mb,
            "blocked_commands": blocked,
            "allowed_commands": allowed,
            "path_rules": path_rules,
            "writable_roots": writable_roots,
            "feedback": env.feedback,
        })
    }

    fn blocked(&self, cmd: &str, reason: String, risk_level: RiskLevel) -> PolicyError {
        tracing::info!(
            environment = %self.environment.name,
            command = cmd,
            %reason,
            %risk_level,
            "command blocked"
        );
        PolicyError::BlockedCommand {
            command: cmd.to_string(),
            reason,
            risk_level,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        paths::resolve(Path::new(path), &self.environment.working_dir)
    }

    /// The most specific path rule covering `resolved`. On equal depth the
    /// stricter rule wins.
    fn governing_rule(&self, resolved: &Path) -> Option<&PathRule> {
        let mut best: Option<&PathRule> = None;
        for rule in &self.environment.path_rules {
            if !resolved.starts_with(&rule.root) {
                continue;
            }
            best = match best {
                Some(current) => {
                    let (depth, current_depth) = (paths::depth(&rule.root), paths::depth(&current.root));
                    if depth > current_depth
                        || (depth == current_depth
                            && rule.access.strictness() > current.access.strictness())
                    {
                        Some(rule)
                    } else {
                        Some(current)
                    }
                }
                None => Some(rule),
            };
        }
        best
    }

    /// The most specific writable root covering `resolved`.
    fn writable_root(&self, resolved: &Path) -> Option<&PathBuf> {
        self.environment
            .writable_roots
            .iter()
            .filter(|root| resolved.starts_with(root))
            .max_by_key(|root| paths::depth(root))
    }

    fn check_read(&self, path: &str) -> Result<PathBuf, (String, RiskLevel)> {
        let resolved = self.resolve(path);
        match self.governing_rule(&resolved) {
            Some(rule) if rule.access == PathAccess::Forbidden => Err((
                format!(
                    "'{}' is under forbidden root '{}'",
                    resolved.display(),
                    rule.root.display()
                ),
                RiskLevel::High,
            )),
            Some(_) => Ok(resolved),
            None if resolved.starts_with(&self.environment.working_dir)
                || self.writable_root(&resolved).is_some() =>
            {
                Ok(resolved)
            }
            None => Err((
                format!("'{}' is outside permitted roots", resolved.display()),
                RiskLevel::Medium,
            )),
        }
    }

    fn check_mutation(&self, path: &str) -> Result<PathBuf, (String, RiskLevel)> {
        if !self.environment.allow_write {
            return Err((
                format!("writes are disabled in environment '{}'", self.environment.name),
                RiskLevel::Medium,
            ));
        }

        let resolved = self.check_read(path)?;
        let Some(root) = self.writable_root(&resolved) else {
            return Err((
                format!("'{}' is not under any writable root", resolved.display()),
                RiskLevel::Medium,
            ));
        };

        // A read-only rule deeper than the writable root wins.
        if let Some(rule) = self.governing_rule(&resolved) {
            if rule.access == PathAccess::ReadOnly && paths::depth(&rule.root) >= paths::depth(root)
            {
                return Err((
                    format!(
                        "'{}' is under read-only root '{}'",
                        resolved.display(),
                        rule.root.display()
                    ),
                    RiskLevel::Medium,
                ));
            }
        }
        Ok(resolved)
    }
}
