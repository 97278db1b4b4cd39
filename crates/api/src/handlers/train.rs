//! Handlers for the `/train` resource.
//!
//! Submission is the only write path into the registry: validate the
//! payload, fill environment fallbacks, resolve the config reference, create
//! the record, then either run the executor inline (`sync`) or schedule it
//! on a background task (`async`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use segtrain_core::config_paths;
use segtrain_core::params::{
    DatasetType, ExecutionMode, LaunchMode, OdinwConfigType, TrainingParameters,
};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request payload
// ---------------------------------------------------------------------------

/// Submission payload, shared by both dataset endpoints.
///
/// `supercategory` only applies to RF100-VL jobs, `config_type` only to
/// ODinW jobs; the other family ignores the field.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTrainingRequest {
    #[validate(length(min = 1, max = 128))]
    pub supercategory: Option<String>,

    pub config_type: Option<OdinwConfigType>,

    pub mode: Option<LaunchMode>,

    #[validate(range(min = 1, max = 64))]
    pub num_gpus: Option<u32>,

    #[validate(range(min = 1, max = 64))]
    pub num_nodes: Option<u32>,

    #[validate(length(min = 1, max = 64))]
    pub partition: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub account: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub qos: Option<String>,

    pub dataset_root: Option<String>,

    pub experiment_dir: Option<String>,

    pub bpe_path: Option<String>,

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

    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

impl SubmitTrainingRequest {
    fn into_parameters(self) -> (TrainingParameters, ExecutionMode) {
        let execution_mode = self.execution_mode;
        let parameters = TrainingParameters {
            supercategory: self.supercategory,
            config_type: self.config_type,
            mode: self.mode,
            num_gpus: self.num_gpus,
            num_nodes: self.num_nodes,
            partition: self.partition,
            account: self.account,
            qos: self.qos,
            dataset_root: self.dataset_root,
            experiment_dir: self.experiment_dir,
            bpe_path: self.bpe_path,
            base_config: self.base_config,
            skip_config_resolution: self.skip_config_resolution,
            skip_config_validation: self.skip_config_validation,
            skip_env_setup: self.skip_env_setup,
            skip_data_validation: self.skip_data_validation,
            dry_run: self.dry_run,
        };
        (parameters, execution_mode)
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/train/rf100vl
///
/// Submit an RF100-VL training job. Returns 201 with the created record.
pub async fn submit_rf100vl(
    State(state): State<AppState>,
    Json(request): Json<SubmitTrainingRequest>,
) -> AppResult<impl IntoResponse> {
    submit(state, DatasetType::Rf100vl, request).await
}

/// POST /api/v1/train/odinw
///
/// Submit an ODinW training job. Returns 201 with the created record.
pub async fn submit_odinw(
    State(state): State<AppState>,
    Json(request): Json<SubmitTrainingRequest>,
) -> AppResult<impl IntoResponse> {
    submit(state, DatasetType::Odinw, request).await
}

async fn submit(
    state: AppState,
    dataset: DatasetType,
    request: SubmitTrainingRequest,
) -> AppResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (mut parameters, execution_mode) = request.into_parameters();
    config_paths::apply_env_fallbacks(&mut parameters, dataset);

    // Resolve the config reference up front so a dangling reference fails
    // the submission call, not the job.
    if !parameters.skip_config_resolution {
        if let Some(reference) = parameters.config_reference(dataset) {
            config_paths::resolve_config_reference(&state.config.project_root, &reference)?;
        }
    }

    let record = state
        .registry
        .create(dataset, execution_mode, parameters)
        .await?;

    tracing::info!(
        job_id = %record.job_id,
        dataset = %dataset,
        execution_mode = ?execution_mode,
        "Training job submitted",
    );

    match execution_mode {
        ExecutionMode::Async => {
            // Detached: completion is observed through the registry.
            let _ = state.executor.spawn(record.job_id);
        }
        ExecutionMode::Sync => {
            state.executor.execute(record.job_id).await?;
        }
    }

    let record = state.registry.view(record.job_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}
