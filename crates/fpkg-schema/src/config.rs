use crate::types::{parse_octal_mode, Perm};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Owner applied to files that no rule assigns an owner to.
pub const DEFAULT_FILE_OWNER: &str = "root";
/// Group applied to files that no rule assigns a group to.
pub const DEFAULT_FILE_GROUP: &str = "wheel";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing or empty {0}")]
    MissingField(String),
    #[error("missing or zero {0}")]
    ZeroId(String),
    #[error("invalid {field} '{value}': expected [A-Za-z0-9_][A-Za-z0-9_.-]*")]
    InvalidName { field: String, value: String },
    #[error("invalid {field}: {reason}")]
    InvalidRule { field: String, reason: &'static str },
    #[error("invalid {field} '{mode}': expected an octal mode no greater than 7777")]
    InvalidMode { field: String, mode: String },
    #[error("invalid {field}: {source}")]
    InvalidRegex {
        field: String,
        source: regex::Error,
    },
}

/// Raw configuration document, as decoded from YAML.
///
/// Every field defaults so that a missing key is reported by [`ConfigFile::validate`]
/// with the field name rather than as an opaque decode error.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub website_uri: String,
    #[serde(default)]
    pub maintainer: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub dependencies: Vec<DependencySection>,
    #[serde(default)]
    pub users: Vec<UserSection>,
    #[serde(default)]
    pub groups: Vec<GroupSection>,
    #[serde(default)]
    pub file_owner: Option<String>,
    #[serde(default)]
    pub file_group: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRuleSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DependencySection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UserSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gid: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileRuleSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub path_regexp: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

/// Ownership applied when neither a file rule nor the configuration names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDefaults {
    pub owner: String,
    pub group: String,
}

impl Default for FileDefaults {
    fn default() -> Self {
        Self {
            owner: DEFAULT_FILE_OWNER.to_owned(),
            group: DEFAULT_FILE_GROUP.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub uid: u32,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub gid: u32,
}

#[derive(Debug, Clone)]
pub enum PathMatcher {
    Exact(String),
    Pattern(Regex),
}

/// A validated ownership/permission override.
#[derive(Debug, Clone)]
pub struct FileRule {
    pub matcher: PathMatcher,
    pub mode: Option<Perm>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

impl FileRule {
    pub fn matches(&self, path: &str) -> bool {
        match &self.matcher {
            PathMatcher::Exact(p) => p == path,
            PathMatcher::Pattern(re) => re.is_match(path),
        }
    }
}

/// Validated, immutable package configuration.
#[derive(Debug, Clone)]
pub struct Config {
    source: ConfigFile,
    defaults: FileDefaults,
    dependencies: Vec<Dependency>,
    users: Vec<User>,
    groups: Vec<Group>,
    rules: Vec<FileRule>,
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn non_empty_owned(s: Option<&String>) -> Option<String> {
    s.filter(|v| !v.is_empty()).cloned()
}

impl Config {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn version(&self) -> &str {
        &self.source.version
    }

    pub fn short_description(&self) -> &str {
        &self.source.short_description
    }

    pub fn long_description(&self) -> Option<&str> {
        non_empty(&self.source.long_description)
    }

    pub fn website_uri(&self) -> &str {
        &self.source.website_uri
    }

    pub fn maintainer(&self) -> &str {
        &self.source.maintainer
    }

    pub fn origin(&self) -> Option<&str> {
        non_empty(&self.source.origin)
    }

    pub fn architecture(&self) -> Option<&str> {
        non_empty(&self.source.architecture)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn rules(&self) -> &[FileRule] {
        &self.rules
    }

    /// Owner set explicitly in the configuration, if any.
    pub fn explicit_file_owner(&self) -> Option<&str> {
        self.source.file_owner.as_deref().and_then(non_empty)
    }

    /// Group set explicitly in the configuration, if any.
    pub fn explicit_file_group(&self) -> Option<&str> {
        self.source.file_group.as_deref().and_then(non_empty)
    }

    /// Owner used for entries without a more specific one.
    pub fn file_owner(&self) -> &str {
        self.explicit_file_owner().unwrap_or(&self.defaults.owner)
    }

    /// Group used for entries without a more specific one.
    pub fn file_group(&self) -> &str {
        self.explicit_file_group().unwrap_or(&self.defaults.group)
    }

    /// The raw document this configuration was validated from.
    pub fn source(&self) -> &ConfigFile {
        &self.source
    }

    /// Find the rule governing `path`.
    ///
    /// Exact-path rules take precedence over pattern rules; within each kind
    /// the first rule in declaration order wins.
    pub fn find_rule(&self, path: &str) -> Option<&FileRule> {
        self.rules
            .iter()
            .find(|r| matches!(r.matcher, PathMatcher::Exact(_)) && r.matches(path))
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|r| matches!(r.matcher, PathMatcher::Pattern(_)) && r.matches(path))
            })
    }
}

impl ConfigFile {
    /// Replace the package version, e.g. from a command-line override.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Validate with the standard `root:wheel` ownership defaults.
    pub fn validate(self) -> Result<Config, ConfigError> {
        self.validate_with(FileDefaults::default())
    }

    /// Validate the document and compile its file rules.
    ///
    /// Returns the first violation found, checking fields in document order.
    pub fn validate_with(self, defaults: FileDefaults) -> Result<Config, ConfigError> {
        require("name", &self.name)?;
        require("version", &self.version)?;
        require("short_description", &self.short_description)?;
        require("website_uri", &self.website_uri)?;
        require("maintainer", &self.maintainer)?;

        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for (i, dep) in self.dependencies.iter().enumerate() {
            require(&format!("dependencies[{i}].name"), &dep.name)?;
            require(&format!("dependencies[{i}].version"), &dep.version)?;
            dependencies.push(Dependency {
                name: dep.name.clone(),
                version: dep.version.clone(),
                origin: non_empty_owned(dep.origin.as_ref()),
            });
        }

        let mut users = Vec::with_capacity(self.users.len());
        for (i, user) in self.users.iter().enumerate() {
            let field = format!("users[{i}].name");
            require(&field, &user.name)?;
            validate_account_name(&field, &user.name)?;
            if user.uid == 0 {
                return Err(ConfigError::ZeroId(format!("users[{i}].uid")));
            }
            let field = format!("users[{i}].group");
            require(&field, &user.group)?;
            validate_account_name(&field, &user.group)?;
            users.push(User {
                name: user.name.clone(),
                uid: user.uid,
                group: user.group.clone(),
            });
        }

        let mut groups = Vec::with_capacity(self.groups.len());
        for (i, group) in self.groups.iter().enumerate() {
            let field = format!("groups[{i}].name");
            require(&field, &group.name)?;
            validate_account_name(&field, &group.name)?;
            if group.gid == 0 {
                return Err(ConfigError::ZeroId(format!("groups[{i}].gid")));
            }
            groups.push(Group {
                name: group.name.clone(),
                gid: group.gid,
            });
        }

        let mut rules = Vec::with_capacity(self.files.len());
        for (i, section) in self.files.iter().enumerate() {
            rules.push(compile_rule(i, section)?);
        }

        Ok(Config {
            source: self,
            defaults,
            dependencies,
            users,
            groups,
            rules,
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field.to_owned()));
    }
    Ok(())
}

/// Account names end up single-quoted in the pre-install script, so only
/// portable `pw(8)` names are accepted.
fn validate_account_name(field: &str, name: &str) -> Result<(), ConfigError> {
    let body = name.strip_suffix('$').unwrap_or(name);
    let mut chars = body.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            field: field.to_owned(),
            value: name.to_owned(),
        })
    }
}

fn compile_rule(index: usize, section: &FileRuleSection) -> Result<FileRule, ConfigError> {
    let path = section.path.as_deref().and_then(non_empty);
    let pattern = section.path_regexp.as_deref().and_then(non_empty);

    let matcher = match (path, pattern) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::InvalidRule {
                field: format!("files[{index}]"),
                reason: "cannot set both path and path_regexp",
            });
        }
        (None, None) => {
            return Err(ConfigError::InvalidRule {
                field: format!("files[{index}]"),
                reason: "missing or empty path or path_regexp",
            });
        }
        (Some(p), None) => PathMatcher::Exact(p.to_owned()),
        (None, Some(re)) => {
            PathMatcher::Pattern(Regex::new(re).map_err(|e| ConfigError::InvalidRegex {
                field: format!("files[{index}].path_regexp"),
                source: e,
            })?)
        }
    };

    let mode = match section.mode.as_deref().and_then(non_empty) {
        Some(m) => {
            if parse_octal_mode(m).is_none() {
                return Err(ConfigError::InvalidMode {
                    field: format!("files[{index}].mode"),
                    mode: m.to_owned(),
                });
            }
            Some(Perm::new(m))
        }
        None => None,
    };

    Ok(FileRule {
        matcher,
        mode,
        owner: non_empty_owned(section.owner.as_ref()),
        group: non_empty_owned(section.group.as_ref()),
    })
}

pub fn parse_config_str(input: &str) -> Result<ConfigFile, ConfigError> {
    Ok(serde_yaml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ConfigFile, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_config_str(&content)
}

/// Read, decode and validate a configuration file in one step.
pub fn load_config_file(
    path: impl AsRef<Path>,
    version_override: Option<&str>,
) -> Result<Config, ConfigError> {
    let mut file = parse_config_file(path)?;
    if let Some(v) = version_override {
        file = file.with_version(v);
    }
    file.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: demo
version: "1.0"
short_description: A demo
website_uri: http://x
maintainer: a@b
"#;

    #[test]
    fn parses_full_config() {
        let input = r#"
name: eventline
version: "1.2.3"
short_description: job scheduling platform
long_description: Eventline runs jobs.
website_uri: https://www.exograd.com
maintainer: support@exograd.com
origin: sysutils/eventline
architecture: "FreeBSD:13:amd64"
dependencies:
  - name: postgresql14-client
    version: "14.5"
  - name: ca_root_nss
    version: "3.83"
    origin: security/ca_root_nss
groups:
  - name: eventline
    gid: 1001
users:
  - name: eventline
    uid: 1001
    group: eventline
file_owner: root
file_group: wheel
files:
  - path: /usr/local/etc/eventline/eventline.yaml
    mode: "640"
    group: eventline
  - path_regexp: "^/usr/local/bin/"
    mode: "755"
"#;
        let config = parse_config_str(input).unwrap().validate().unwrap();
        assert_eq!(config.name(), "eventline");
        assert_eq!(config.version(), "1.2.3");
        assert_eq!(config.origin(), Some("sysutils/eventline"));
        assert_eq!(config.architecture(), Some("FreeBSD:13:amd64"));
        assert_eq!(config.dependencies().len(), 2);
        assert_eq!(config.dependencies()[0].origin, None);
        assert_eq!(
            config.dependencies()[1].origin.as_deref(),
            Some("security/ca_root_nss")
        );
        assert_eq!(config.users()[0].uid, 1001);
        assert_eq!(config.groups()[0].gid, 1001);
        assert_eq!(config.rules().len(), 2);
        assert_eq!(config.explicit_file_owner(), Some("root"));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config_str(MINIMAL).unwrap().validate().unwrap();
        assert_eq!(config.file_owner(), "root");
        assert_eq!(config.file_group(), "wheel");
        assert_eq!(config.explicit_file_owner(), None);
        assert_eq!(config.long_description(), None);
        assert_eq!(config.origin(), None);
        assert_eq!(config.architecture(), None);
    }

    #[test]
    fn custom_defaults_are_applied() {
        let defaults = FileDefaults {
            owner: "daemon".to_owned(),
            group: "staff".to_owned(),
        };
        let config = parse_config_str(MINIMAL)
            .unwrap()
            .validate_with(defaults)
            .unwrap();
        assert_eq!(config.file_owner(), "daemon");
        assert_eq!(config.file_group(), "staff");
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = format!("{MINIMAL}unknown_field: true\n");
        assert!(matches!(
            parse_config_str(&input),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_name() {
        let input = MINIMAL.replace("name: demo", "name: \"\"");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "name"));
    }

    #[test]
    fn rejects_each_missing_required_field() {
        for field in ["short_description", "website_uri", "maintainer"] {
            let input: String = MINIMAL
                .lines()
                .filter(|l| !l.starts_with(field))
                .map(|l| format!("{l}\n"))
                .collect();
            let err = parse_config_str(&input).unwrap().validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingField(ref f) if f == field),
                "expected missing {field}, got {err}"
            );
        }
    }

    #[test]
    fn version_override_satisfies_missing_version() {
        let input = MINIMAL.replace("version: \"1.0\"", "");
        let file = parse_config_str(&input).unwrap();
        assert!(file.clone().validate().is_err());
        let config = file.with_version("2.0").validate().unwrap();
        assert_eq!(config.version(), "2.0");
    }

    #[test]
    fn rejects_zero_uid() {
        let input = format!("{MINIMAL}users:\n  - name: svc\n    group: svc\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroId(ref f) if f == "users[0].uid"));
    }

    #[test]
    fn rejects_user_without_group() {
        let input = format!("{MINIMAL}users:\n  - name: svc\n    uid: 200\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "users[0].group"));
    }

    #[test]
    fn rejects_zero_gid() {
        let input = format!("{MINIMAL}groups:\n  - name: svc\n    gid: 0\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroId(ref f) if f == "groups[0].gid"));
    }

    #[test]
    fn rejects_unquotable_account_name() {
        let input = format!("{MINIMAL}groups:\n  - name: \"it's\"\n    gid: 300\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidName { .. }));
    }

    #[test]
    fn accepts_machine_account_name() {
        assert!(validate_account_name("f", "host$").is_ok());
        assert!(validate_account_name("f", "_www").is_ok());
        assert!(validate_account_name("f", "-x").is_err());
        assert!(validate_account_name("f", "a b").is_err());
    }

    #[test]
    fn rejects_rule_with_both_path_kinds() {
        let input = format!("{MINIMAL}files:\n  - path: /a\n    path_regexp: a\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_rule_without_path() {
        let input = format!("{MINIMAL}files:\n  - mode: \"644\"\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_invalid_regex() {
        let input = format!("{MINIMAL}files:\n  - path_regexp: \"(\"\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn rejects_non_octal_mode() {
        let input = format!("{MINIMAL}files:\n  - path: /a\n    mode: \"rwx\"\n");
        let err = parse_config_str(&input).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMode { .. }));
    }

    #[test]
    fn exact_rule_wins_over_earlier_pattern() {
        let input = format!(
            "{MINIMAL}files:\n  - path_regexp: \"^/bin/\"\n    owner: pattern\n  - path: /bin/demo\n    owner: exact\n"
        );
        let config = parse_config_str(&input).unwrap().validate().unwrap();
        let rule = config.find_rule("/bin/demo").unwrap();
        assert_eq!(rule.owner.as_deref(), Some("exact"));
        let rule = config.find_rule("/bin/other").unwrap();
        assert_eq!(rule.owner.as_deref(), Some("pattern"));
        assert!(config.find_rule("/etc/demo.conf").is_none());
    }

    #[test]
    fn first_pattern_rule_wins() {
        let input = format!(
            "{MINIMAL}files:\n  - path_regexp: \"\\\\.conf$\"\n    mode: \"600\"\n  - path_regexp: \"^/etc/\"\n    mode: \"644\"\n"
        );
        let config = parse_config_str(&input).unwrap().validate().unwrap();
        let rule = config.find_rule("/etc/demo.conf").unwrap();
        assert_eq!(rule.mode.as_ref().unwrap(), "600");
        let rule = config.find_rule("/etc/demo.txt").unwrap();
        assert_eq!(rule.mode.as_ref().unwrap(), "644");
    }

    #[test]
    fn load_config_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(dir.path().join("missing.yaml"), None).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn load_config_file_applies_version_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fpkg.yaml");
        fs::write(&path, MINIMAL).unwrap();
        let config = load_config_file(&path, Some("3.1")).unwrap();
        assert_eq!(config.version(), "3.1");
    }
}
