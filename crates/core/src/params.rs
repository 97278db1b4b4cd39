//! Submission parameters for training jobs.
//!
//! These types describe *what* to launch; they are resolved into an argument
//! vector by [`crate::command`] and are immutable once a job is created.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Which dataset family the job trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Rf100vl,
    Odinw,
}

impl DatasetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rf100vl => "rf100vl",
            Self::Odinw => "odinw",
        }
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the launch wrapper runs the training: on the local host or through
/// the cluster scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    Local,
    Cluster,
}

impl LaunchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cluster => "cluster",
        }
    }
}

/// Whether the submission call waits for the job to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sync,
    Async,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Async
    }
}

/// ODinW config flavour. Each variant maps to a bundled base config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OdinwConfigType {
    TextOnly,
    TextAndVisual,
    VisualOnly,
    TextOnlyPositive,
}

impl OdinwConfigType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextOnly => "text_only",
            Self::TextAndVisual => "text_and_visual",
            Self::VisualOnly => "visual_only",
            Self::TextOnlyPositive => "text_only_positive",
        }
    }

    /// File name of the bundled base config for this flavour.
    pub fn config_file(self) -> &'static str {
        match self {
            Self::TextOnly => "odinw_text_only.yaml",
            Self::TextAndVisual => "odinw_text_and_visual.yaml",
            Self::VisualOnly => "odinw_visual_only.yaml",
            Self::TextOnlyPositive => "odinw_text_only_positive.yaml",
        }
    }
}

// ---------------------------------------------------------------------------
// TrainingParameters
// ---------------------------------------------------------------------------

/// Fully-resolved submission parameters, stored verbatim on the job record.
///
/// Scheduler fields (`partition`, `account`, `qos`) are opaque identifiers
/// passed through to the launch wrapper; they are only meaningful in
/// `cluster` mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingParameters {
    /// RF100-VL supercategory to train on (`all` submits the full job array).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,

    /// ODinW config flavour; ignored for RF100-VL jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_type: Option<OdinwConfigType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<LaunchMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_gpus: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_nodes: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<String>,

    /// Root directory of the dataset (RF100-VL or ODinW layout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpe_path: Option<String>,

    /// Base config file reference; overrides `config_type` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_config: Option<String>,

    #[serde(default)]
    pub skip_config_resolution: bool,

    #[serde(default)]
    pub skip_config_validation: bool,

    #[serde(default)]
    pub skip_env_setup: bool,

    #[serde(default)]
    pub skip_data_validation: bool,

    #[serde(default)]
    pub dry_run: bool,
}

impl TrainingParameters {
    /// The config reference this submission carries, if any.
    ///
    /// `base_config` wins; for ODinW jobs the `config_type` flavour supplies
    /// a bundled file as fallback. RF100-VL jobs have no implicit default.
    pub fn config_reference(&self, dataset: DatasetType) -> Option<String> {
        if let Some(base) = &self.base_config {
            return Some(base.clone());
        }
        match dataset {
            DatasetType::Rf100vl => None,
            DatasetType::Odinw => self.config_type.map(|c| c.config_file().to_string()),
        }
    }

    /// Validate the submission. A job without a config reference is rejected
    /// with [`CoreError::ConfigMissing`] before a record is allocated.
    pub fn validate(&self, dataset: DatasetType) -> CoreResult<()> {
        if self.config_reference(dataset).is_none() {
            return Err(CoreError::ConfigMissing(format!(
                "{dataset} submission carries neither base_config nor config_type"
            )));
        }
        if let Some(gpus) = self.num_gpus {
            if gpus == 0 {
                return Err(CoreError::Validation("num_gpus must be >= 1".to_string()));
            }
        }
        if let Some(nodes) = self.num_nodes {
            if nodes == 0 {
                return Err(CoreError::Validation("num_nodes must be >= 1".to_string()));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_config_wins_over_config_type() {
        let params = TrainingParameters {
            base_config: Some("custom.yaml".to_string()),
            config_type: Some(OdinwConfigType::VisualOnly),
            ..Default::default()
        };
        assert_eq!(
            params.config_reference(DatasetType::Odinw).as_deref(),
            Some("custom.yaml")
        );
    }

    #[test]
    fn odinw_config_type_supplies_bundled_file() {
        let params = TrainingParameters {
            config_type: Some(OdinwConfigType::TextAndVisual),
            ..Default::default()
        };
        assert_eq!(
            params.config_reference(DatasetType::Odinw).as_deref(),
            Some("odinw_text_and_visual.yaml")
        );
    }

    #[test]
    fn rf100vl_has_no_implicit_config() {
        let params = TrainingParameters::default();
        assert!(params.config_reference(DatasetType::Rf100vl).is_none());
        assert!(matches!(
            params.validate(DatasetType::Rf100vl),
            Err(CoreError::ConfigMissing(_))
        ));
    }

    #[test]
    fn zero_gpus_rejected() {
        let params = TrainingParameters {
            base_config: Some("cfg.yaml".to_string()),
            num_gpus: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(DatasetType::Rf100vl),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn valid_submission_passes() {
        let params = TrainingParameters {
            base_config: Some("cfg.yaml".to_string()),
            num_gpus: Some(4),
            num_nodes: Some(1),
            ..Default::default()
        };
        assert!(params.validate(DatasetType::Rf100vl).is_ok());
    }

    #[test]
    fn parameters_roundtrip_without_empty_fields() {
        let params = TrainingParameters {
            base_config: Some("cfg.yaml".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&params).expect("serialize");
        // Absent optionals are omitted from the wire form entirely.
        assert!(json.get("partition").is_none());
        assert_eq!(json["base_config"], "cfg.yaml");
        assert_eq!(json["dry_run"], false);
    }
}
