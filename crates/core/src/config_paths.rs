//! Config reference and path resolution.
//!
//! The external framework's config files are opaque here: resolution is
//! existence checking only, never parsing. Relative references resolve
//! against the project root, trying the reference as given and then under
//! `configs/`. Dataset and experiment paths absent from a submission fall
//! back to well-known environment variables.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::params::{DatasetType, TrainingParameters};

/// Environment fallback for the RF100-VL dataset root.
pub const ENV_RF100VL_ROOT: &str = "ROBOFLOW_VL_100_ROOT";

/// Environment fallback for the ODinW dataset root.
pub const ENV_ODINW_ROOT: &str = "ODINW_ROOT";

/// Environment fallback for the experiment log directory.
pub const ENV_EXPERIMENT_LOG_DIR: &str = "EXPERIMENT_LOG_DIR";

/// Environment fallback for the BPE vocabulary file.
pub const ENV_BPE_PATH: &str = "BPE_PATH";

/// Subdirectory of the project root searched for config references.
const CONFIGS_SUBDIR: &str = "configs";

/// Name of the environment variable holding a dataset family's root.
pub fn dataset_root_env(dataset: DatasetType) -> &'static str {
    match dataset {
        DatasetType::Rf100vl => ENV_RF100VL_ROOT,
        DatasetType::Odinw => ENV_ODINW_ROOT,
    }
}

/// Resolve a possibly-relative path string against the project root.
pub fn resolve_path(project_root: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Resolve a config reference to an existing file.
///
/// Candidates, in order: the reference resolved against the project root,
/// then the same reference under `configs/`. Returns [`CoreError::ConfigMissing`]
/// when neither exists.
pub fn resolve_config_reference(project_root: &Path, reference: &str) -> CoreResult<PathBuf> {
    let direct = resolve_path(project_root, reference);
    if direct.is_file() {
        return Ok(direct);
    }

    let under_configs = project_root.join(CONFIGS_SUBDIR).join(reference);
    if under_configs.is_file() {
        return Ok(under_configs);
    }

    Err(CoreError::ConfigMissing(format!(
        "config reference does not resolve to a file: {reference}"
    )))
}

/// Fill unset path parameters from an environment lookup.
///
/// `lookup` abstracts `std::env::var` so the fallback order is testable
/// without mutating process-global state.
pub fn apply_env_fallbacks_from(
    params: &mut TrainingParameters,
    dataset: DatasetType,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if params.dataset_root.is_none() {
        params.dataset_root = lookup(dataset_root_env(dataset));
    }
    if params.experiment_dir.is_none() {
        params.experiment_dir = lookup(ENV_EXPERIMENT_LOG_DIR);
    }
    if params.bpe_path.is_none() {
        params.bpe_path = lookup(ENV_BPE_PATH);
    }
}

/// Fill unset path parameters from the process environment.
pub fn apply_env_fallbacks(params: &mut TrainingParameters, dataset: DatasetType) {
    apply_env_fallbacks_from(params, dataset, |key| std::env::var(key).ok());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
