// catalog.rs — Environment config loading and resolution.
//
// The config file lists every environment a deployment knows about:
//
// ```yaml
// environments:
//   - name: sandbox
//     description: "Throwaway scratch space"
//     working_dir: ~/agents/sandbox
//     network_allowed: false
//     writable_roots: [".", /tmp]
//     command_rules:
//       - pattern: "sudo"
//         action: block
//         risk: high
//       - pattern: "^curl .*\\| *sh"
//         match: regex
//     path_rules:
//       - root: /etc
//         access: forbidden
//     feedback:
//       track_outcomes: true
// ```
//
// Loading picks one environment by name and resolves it exactly once:
// `~` expansion, relative roots joined onto the working dir, and every path
// canonicalized. The resulting Environment is immutable.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::pattern_tokens;
use crate::environment::{
    default_true, CommandMatcher, CommandRule, Environment, FeedbackSettings, MatchKind,
    PathAccess, PathRule, RiskLevel, RuleAction,
};
use crate::error::ConfigError;
use crate::evaluator::PolicyEvaluator;
use crate::paths;

/// Top-level shape of an environment config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentsFile {
    #[serde(default)]
    pub environments: Vec<EnvironmentSpec>,
}

/// One environment as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub working_dir: String,
    #[serde(default)]
    pub network_allowed: bool,
    #[serde(default = "default_true")]
    pub allow_write: bool,
    #[serde(default = "default_true")]
    pub allow_delete: bool,
    #[serde(default)]
    pub max_file_size_mb: Option<u64>,
    #[serde(default)]
    pub command_rules: Vec<CommandRuleSpec>,
    #[serde(default)]
    pub path_rules: Vec<PathRuleSpec>,
    /// Relative entries are joined onto `working_dir`.
    #[serde(default)]
    pub writable_roots: Vec<String>,
    #[serde(default)]
    pub feedback: FeedbackSettings,
}

/// A command rule as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRuleSpec {
    pub pattern: String,
    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,
    #[serde(default)]
    pub action: RuleAction,
    /// Defaults to high for block rules and low for allow rules.
    #[serde(default)]
    pub risk: Option<RiskLevel>,
}

/// A path rule as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRuleSpec {
    pub root: String,
    pub access: PathAccess,
}

/// Holds the one environment resolved for this process.
#[derive(Debug, Clone)]
pub struct EnvironmentCatalog {
    environment: Environment,
    source: Option<PathBuf>,
}

impl EnvironmentCatalog {
    /// Load environment `name` from a YAML (`.yaml`, `.yml`, default) or
    /// JSON (`.json`) config file.
    pub fn load(path: impl AsRef<Path>, name: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = read_file(path)?;
        let mut catalog = Self::from_file(file, name)?;
        catalog.source = Some(path.to_path_buf());
        tracing::info!(
            environment = %catalog.environment.name,
            config = %path.display(),
            "loaded environment"
        );
        Ok(catalog)
    }

    /// Names of every environment defined in a config file.
    pub fn names(path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
        let file = read_file(path.as_ref())?;
        Ok(file.environments.into_iter().map(|env| env.name).collect())
    }

    pub fn from_yaml_str(content: &str, name: &str) -> Result<Self, ConfigError> {
        Self::from_file(serde_yaml::from_str(content)?, name)
    }

    pub fn from_json_str(content: &str, name: &str) -> Result<Self, ConfigError> {
        Self::from_file(serde_json::from_str(content)?, name)
    }

    /// Pick `name` out of a parsed config file and resolve it.
    pub fn from_file(file: EnvironmentsFile, name: &str) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for env in &file.environments {
            if !seen.insert(env.name.as_str()) {
                return Err(ConfigError::DuplicateEnvironment(env.name.clone()));
            }
        }

        let available: Vec<String> = file.environments.iter().map(|e| e.name.clone()).collect();
        let spec = file
            .environments
            .into_iter()
            .find(|env| env.name == name)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
                available,
            })?;
        Self::from_spec(spec)
    }

    /// Resolve a single environment definition.
    pub fn from_spec(spec: EnvironmentSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            environment: resolve_environment(spec)?,
            source: None,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The config file this catalog was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn into_evaluator(self) -> PolicyEvaluator {
        PolicyEvaluator::new(self.environment)
    }
}

fn read_file(path: &Path) -> Result<EnvironmentsFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

fn resolve_environment(spec: EnvironmentSpec) -> Result<Environment, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        environment: spec.name.clone(),
        reason,
    };

    if spec.name.trim().is_empty() {
        return Err(invalid("environment name is empty".to_string()));
    }

    let working_dir = paths::expand_home(&spec.working_dir);
    if !working_dir.is_absolute() {
        return Err(invalid(format!(
            "working_dir '{}' is not an absolute path",
            spec.working_dir
        )));
    }
    let working_dir = paths::resolve(&working_dir, Path::new("/"));

    let resolve_root = |raw: &str| -> Result<PathBuf, ConfigError> {
        if raw.trim().is_empty() {
            return Err(invalid("path root is empty".to_string()));
        }
        Ok(paths::resolve(&paths::expand_home(raw), &working_dir))
    };

    let command_rules = spec
        .command_rules
        .iter()
        .map(compile_rule)
        .collect::<Result<Vec<_>, _>>()?;

    let path_rules = spec
        .path_rules
        .iter()
        .map(|rule| {
            Ok(PathRule {
                root: resolve_root(rule.root.as_str())?,
                access: rule.access,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let writable_roots = spec
        .writable_roots
        .iter()
        .map(|root| resolve_root(root.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Environment {
        name: spec.name.clone(),
        description: spec.description.clone(),
        working_dir,
        command_rules,
        path_rules,
        writable_roots,
        network_allowed: spec.network_allowed,
        allow_write: spec.allow_write,
        allow_delete: spec.allow_delete,
        max_file_size_mb: spec.max_file_size_mb,
        feedback: spec.feedback,
    })
}

fn compile_rule(spec: &CommandRuleSpec) -> Result<CommandRule, ConfigError> {
    let pattern = spec.pattern.trim();
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern {
            pattern: spec.pattern.clone(),
            reason: "pattern is empty".to_string(),
        });
    }

    let matcher = match spec.match_kind {
        MatchKind::Prefix => CommandMatcher::Prefix(pattern_tokens(pattern)),
        MatchKind::Regex => {
            let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: spec.pattern.clone(),
                reason: e.to_string(),
            })?;
            CommandMatcher::Regex(regex)
        }
    };

    let risk_level = spec.risk.unwrap_or(match spec.action {
        RuleAction::Block => RiskLevel::High,
        RuleAction::Allow => RiskLevel::Low,
    });

    Ok(CommandRule {
        pattern: pattern.to_string(),
        matcher,
        action: spec.action,
        risk_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_yaml(working_dir: &Path) -> String {
        format!(
            r#"
environments:
  - name: sandbox
    description: scratch space
    working_dir: {wd}
    writable_roots: [".", "out/"]
    command_rules:
      - pattern: "sudo"
      - pattern: "ls"
        action: allow
      - pattern: "^curl .*"
        match: regex
        risk: medium
    path_rules:
      - root: secrets
        access: forbidden
  - name: prod
    working_dir: {wd}
    allow_delete: false
"#,
            wd = working_dir.display()
        )
    }

    #[test]
    fn load_resolves_relative_roots_against_working_dir() {
        let dir = tempdir().unwrap();
        let wd = dir.path().canonicalize().unwrap();
        let catalog = EnvironmentCatalog::from_yaml_str(&sample_yaml(&wd), "sandbox").unwrap();
        let env = catalog.environment();

        assert_eq!(env.working_dir, wd);
        assert_eq!(env.writable_roots, vec![wd.clone(), wd.join("out")]);
        assert_eq!(env.path_rules[0].root, wd.join("secrets"));
        assert_eq!(env.path_rules[0].access, PathAccess::Forbidden);
    }

    #[test]
    fn rule_defaults_follow_action() {
        let dir = tempdir().unwrap();
        let catalog = EnvironmentCatalog::from_yaml_str(&sample_yaml(dir.path()), "sandbox").unwrap();
        let rules = &catalog.environment().command_rules;

        assert_eq!(rules[0].action, RuleAction::Block);
        assert_eq!(rules[0].risk_level, RiskLevel::High);
        assert_eq!(rules[1].action, RuleAction::Allow);
        assert_eq!(rules[1].risk_level, RiskLevel::Low);
        assert_eq!(rules[2].matcher.kind(), MatchKind::Regex);
        assert_eq!(rules[2].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn optional_switches_have_defaults() {
        let dir = tempdir().unwrap();
        let prod = EnvironmentCatalog::from_yaml_str(&sample_yaml(dir.path()), "prod").unwrap();
        let env = prod.environment();

        assert!(env.allow_write);
        assert!(!env.allow_delete);
        assert!(!env.network_allowed);
        assert!(env.feedback.track_outcomes);
        assert!(env.max_file_size_mb.is_none());
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = tempdir().unwrap();
        let err = EnvironmentCatalog::from_yaml_str(&sample_yaml(dir.path()), "qa").unwrap_err();
        match err {
            ConfigError::UnknownEnvironment { name, available } => {
                assert_eq!(name, "qa");
                assert_eq!(available, vec!["sandbox", "prod"]);
            }
            other => panic!("expected UnknownEnvironment, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = r#"
environments:
  - name: dev
    working_dir: /tmp
  - name: dev
    working_dir: /tmp
"#;
        let err = EnvironmentCatalog::from_yaml_str(yaml, "dev").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEnvironment(name) if name == "dev"));
    }

    #[test]
    fn relative_working_dir_is_rejected() {
        let yaml = r#"
environments:
  - name: dev
    working_dir: relative/dir
"#;
        let err = EnvironmentCatalog::from_yaml_str(yaml, "dev").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn bad_regex_is_rejected() {
        let yaml = r#"
environments:
  - name: dev
    working_dir: /tmp
    command_rules:
      - pattern: "(unclosed"
        match: regex
"#;
        let err = EnvironmentCatalog::from_yaml_str(yaml, "dev").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = EnvironmentCatalog::from_yaml_str("environments: [name: {", "dev").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn json_files_are_detected_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environments.json");
        let json = serde_json::json!({
            "environments": [
                { "name": "dev", "working_dir": "/tmp", "network_allowed": true }
            ]
        });
        fs::write(&path, json.to_string()).unwrap();

        let catalog = EnvironmentCatalog::load(&path, "dev").unwrap();
        assert!(catalog.environment().network_allowed);
        assert_eq!(catalog.source(), Some(path.as_path()));
        assert_eq!(EnvironmentCatalog::names(&path).unwrap(), vec!["dev"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EnvironmentCatalog::load("/nonexistent/environments.yaml", "dev").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/environments.yaml"));
    }

    #[test]
    fn bundled_config_loads_every_environment() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/environments.yaml");
        let names = EnvironmentCatalog::names(&path).unwrap();
        assert_eq!(names, vec!["sandbox", "dev", "staging", "prod"]);

        for name in &names {
            let evaluator = EnvironmentCatalog::load(&path, name).unwrap().into_evaluator();
            assert!(evaluator.validate_command("sudo rm -rf /").is_err());
        }

        let sandbox = EnvironmentCatalog::load(&path, "sandbox").unwrap().into_evaluator();
        let err = sandbox.validate_command("sudo rm -rf /").unwrap_err();
        assert_eq!(err.risk_level(), RiskLevel::High);
        assert!(sandbox.validate_command("ls -lh").is_ok());
        let err = sandbox.validate_path("/System/Library/test").unwrap_err();
        assert!(err.reason().contains("forbidden root"), "got {err:?}");
        assert_eq!(err.risk_level(), RiskLevel::High);
        assert!(sandbox.validate_path("/tmp/test.txt").is_ok());

        let prod = EnvironmentCatalog::load(&path, "prod").unwrap().into_evaluator();
        assert!(prod.validate_command("kubectl get pods").is_ok());
        assert!(prod.validate_command("kubectl apply -f x.yaml").is_err());
        assert!(prod.validate_write("notes.txt").is_err());
    }
}
