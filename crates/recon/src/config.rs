use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub key: KeySpec,
    #[serde(default)]
    pub policy: ConflictPolicy,
    #[serde(default)]
    pub master: Option<SourceConfig>,
    #[serde(default)]
    pub update: Option<SourceConfig>,
    /// Explicit update header -> master header mapping. Overrides name-based
    /// alignment for the columns it names.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
    /// Update headers dropped before alignment.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub recency: Option<RecencyConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "merge".into()
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Key columns, in one of three TOML shapes:
///
/// ```toml
/// key = "id"
/// key = ["first name", "last name"]
/// key = { master = ["first name", "last name"], update = ["full name"] }
/// ```
///
/// The first two name columns present in both documents. The per-side form
/// names each document's own columns; its components are flattened into one
/// space-joined value per row so that different arities can still match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    Single(String),
    Columns(Vec<String>),
    PerSide { master: Vec<String>, update: Vec<String> },
}

impl KeySpec {
    pub fn columns<S: AsRef<str>>(names: &[S]) -> Self {
        Self::Columns(names.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn master_columns(&self) -> Vec<&str> {
        match self {
            Self::Single(c) => vec![c.as_str()],
            Self::Columns(cs) => cs.iter().map(String::as_str).collect(),
            Self::PerSide { master, .. } => master.iter().map(String::as_str).collect(),
        }
    }

    pub fn update_columns(&self) -> Vec<&str> {
        match self {
            Self::PerSide { update, .. } => update.iter().map(String::as_str).collect(),
            _ => self.master_columns(),
        }
    }

    pub fn is_per_side(&self) -> bool {
        matches!(self, Self::PerSide { .. })
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How two non-empty, differing values are arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    UpdateWins,
    MasterWins,
    FlagOnly,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateWins => write!(f, "update_wins"),
            Self::MasterWins => write!(f, "master_wins"),
            Self::FlagOnly => write!(f, "flag_only"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = MergeError;

    /// Accepts `update_wins` and `update-wins` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "update_wins" => Ok(Self::UpdateWins),
            "master_wins" => Ok(Self::MasterWins),
            "flag_only" => Ok(Self::FlagOnly),
            other => Err(MergeError::ConfigValidation(format!(
                "unknown policy '{other}' (expected update_wins, master_wins or flag_only)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources, recency, output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    #[serde(default)]
    pub sheet: Option<String>,
}

/// Timestamp guard: a matched update row is applied only when its timestamp is
/// newer than master's last-updated value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecencyConfig {
    pub update_column: String,
    pub master_column: String,
    /// Write the run date into `master_column` on rows the merge changed.
    #[serde(default)]
    pub stamp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default = "default_highlight")]
    pub highlight: bool,
}

fn default_highlight() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: None,
            report: None,
            highlight: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MergeConfig {
    pub fn new(key: KeySpec) -> Self {
        Self {
            name: default_name(),
            key,
            policy: ConflictPolicy::default(),
            master: None,
            update: None,
            columns: BTreeMap::new(),
            ignore: Vec::new(),
            recency: None,
            output: OutputConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn from_toml(input: &str) -> Result<Self, MergeError> {
        let config: MergeConfig =
            toml::from_str(input).map_err(|e| MergeError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.name.trim().is_empty() {
            return Err(MergeError::ConfigValidation("name must not be empty".into()));
        }

        // Key columns
        let (master_keys, update_keys) = (self.key.master_columns(), self.key.update_columns());
        if master_keys.is_empty() || update_keys.is_empty() {
            return Err(MergeError::ConfigValidation(
                "at least one key column is required".into(),
            ));
        }
        if master_keys.iter().chain(update_keys.iter()).any(|c| c.trim().is_empty()) {
            return Err(MergeError::ConfigValidation(
                "key column names must not be empty".into(),
            ));
        }

        // Column mapping
        let mut targets = BTreeMap::new();
        for (update_col, master_col) in &self.columns {
            if update_col.trim().is_empty() || master_col.trim().is_empty() {
                return Err(MergeError::ConfigValidation(format!(
                    "column mapping '{update_col}' -> '{master_col}' has an empty side"
                )));
            }
            if let Some(first) = targets.insert(master_col.trim().to_lowercase(), update_col) {
                return Err(MergeError::ConfigValidation(format!(
                    "master column '{master_col}' is mapped from both '{first}' and '{update_col}'"
                )));
            }
        }

        // Sources must differ
        if let (Some(master), Some(update)) = (&self.master, &self.update) {
            if master.file == update.file && master.sheet == update.sheet {
                return Err(MergeError::ConfigValidation(format!(
                    "master and update both point at '{}'",
                    master.file
                )));
            }
        }

        if let Some(ref recency) = self.recency {
            if recency.update_column.trim().is_empty() || recency.master_column.trim().is_empty() {
                return Err(MergeError::ConfigValidation(
                    "recency columns must not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
