//! Launch command construction.
//!
//! Maps [`TrainingParameters`] onto the argument vector of the external
//! training launch wrapper (`train_rf100vl.sh` / `train_odinw.sh`). The
//! wrapper's flag vocabulary is fixed; this module is the single place that
//! knows it. The wrapper's semantics beyond exit code and captured text are
//! not interpreted here.

use std::path::Path;

use crate::params::{DatasetType, TrainingParameters};

/// A fully-built command line, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program to execute (`bash`).
    pub program: String,
    /// Arguments, starting with the wrapper script path.
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// Single-line rendering for logging and the job's first log line.
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// File name of the launch wrapper for a dataset family.
pub fn launch_script_name(dataset: DatasetType) -> &'static str {
    match dataset {
        DatasetType::Rf100vl => "train_rf100vl.sh",
        DatasetType::Odinw => "train_odinw.sh",
    }
}

/// Build the launch command for `dataset` with the given parameters.
///
/// Only populated fields become flags; boolean switches are emitted without a
/// value. The dataset root flag differs per family (`--roboflow-root` vs
/// `--odinw-root`).
pub fn build_launch_command(
    scripts_dir: &Path,
    dataset: DatasetType,
    params: &TrainingParameters,
) -> LaunchCommand {
    let script = scripts_dir.join(launch_script_name(dataset));
    let mut args = vec![script.to_string_lossy().into_owned()];

    match dataset {
        DatasetType::Rf100vl => {
            push_opt(&mut args, "--supercategory", params.supercategory.as_deref());
        }
        DatasetType::Odinw => {
            push_opt(
                &mut args,
                "--config-type",
                params.config_type.map(|c| c.as_str()),
            );
        }
    }

    push_opt(&mut args, "--mode", params.mode.map(|m| m.as_str()));
    push_opt_num(&mut args, "--num-gpus", params.num_gpus);
    push_opt_num(&mut args, "--num-nodes", params.num_nodes);
    push_opt(&mut args, "--partition", params.partition.as_deref());
    push_opt(&mut args, "--account", params.account.as_deref());
    push_opt(&mut args, "--qos", params.qos.as_deref());

    let root_flag = match dataset {
        DatasetType::Rf100vl => "--roboflow-root",
        DatasetType::Odinw => "--odinw-root",
    };
    push_opt(&mut args, root_flag, params.dataset_root.as_deref());

    push_opt(&mut args, "--experiment-dir", params.experiment_dir.as_deref());
    push_opt(&mut args, "--bpe-path", params.bpe_path.as_deref());
    push_opt(&mut args, "--base-config", params.base_config.as_deref());

    push_switch(&mut args, "--skip-config-resolution", params.skip_config_resolution);
    push_switch(&mut args, "--skip-config-validation", params.skip_config_validation);
    push_switch(&mut args, "--skip-env-setup", params.skip_env_setup);
    push_switch(&mut args, "--skip-data-validation", params.skip_data_validation);
    push_switch(&mut args, "--dry-run", params.dry_run);

    LaunchCommand {
        program: "bash".to_string(),
        args,
    }
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(v) = value {
        args.push(flag.to_string());
        args.push(v.to_string());
    }
}

fn push_opt_num(args: &mut Vec<String>, flag: &str, value: Option<u32>) {
    if let Some(v) = value {
        args.push(flag.to_string());
        args.push(v.to_string());
    }
}

fn push_switch(args: &mut Vec<String>, flag: &str, enabled: bool) {
    if enabled {
        args.push(flag.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::params::{LaunchMode, OdinwConfigType};

    fn scripts_dir() -> PathBuf {
        PathBuf::from("/opt/segtrain/scripts")
    }

    #[test]
    fn rf100vl_command_maps_all_flags() {
        let params = TrainingParameters {
            supercategory: Some("animals".to_string()),
            mode: Some(LaunchMode::Cluster),
            num_gpus: Some(8),
            num_nodes: Some(2),
            partition: Some("gpu".to_string()),
            account: Some("ml-team".to_string()),
            qos: Some("high".to_string()),
            dataset_root: Some("/data/rf100vl".to_string()),
            experiment_dir: Some("/exp/logs".to_string()),
            bpe_path: Some("/data/bpe.txt".to_string()),
            base_config: Some("base.yaml".to_string()),
            dry_run: true,
            ..Default::default()
        };

        let cmd = build_launch_command(&scripts_dir(), DatasetType::Rf100vl, &params);

        assert_eq!(cmd.program, "bash");
        assert_eq!(cmd.args[0], "/opt/segtrain/scripts/train_rf100vl.sh");
        let rest = &cmd.args[1..];
        assert_eq!(
            rest,
            &[
                "--supercategory",
                "animals",
                "--mode",
                "cluster",
                "--num-gpus",
                "8",
                "--num-nodes",
                "2",
                "--partition",
                "gpu",
                "--account",
                "ml-team",
                "--qos",
                "high",
                "--roboflow-root",
                "/data/rf100vl",
                "--experiment-dir",
                "/exp/logs",
                "--bpe-path",
                "/data/bpe.txt",
                "--base-config",
                "base.yaml",
                "--dry-run",
            ]
        );
    }

    #[test]
    fn odinw_command_uses_config_type_and_odinw_root() {
        let params = TrainingParameters {
            config_type: Some(OdinwConfigType::TextOnly),
            dataset_root: Some("/data/odinw".to_string()),
            ..Default::default()
        };

        let cmd = build_launch_command(&scripts_dir(), DatasetType::Odinw, &params);

        assert_eq!(cmd.args[0], "/opt/segtrain/scripts/train_odinw.sh");
        assert!(cmd.args.contains(&"--config-type".to_string()));
        assert!(cmd.args.contains(&"text_only".to_string()));
        assert!(cmd.args.contains(&"--odinw-root".to_string()));
        assert!(!cmd.args.contains(&"--roboflow-root".to_string()));
        assert!(!cmd.args.contains(&"--supercategory".to_string()));
    }

    #[test]
    fn empty_parameters_produce_script_only() {
        let cmd = build_launch_command(
            &scripts_dir(),
            DatasetType::Rf100vl,
            &TrainingParameters::default(),
        );
        assert_eq!(cmd.args.len(), 1);
    }

    #[test]
    fn skip_switches_emitted_without_values() {
        let params = TrainingParameters {
            skip_config_resolution: true,
            skip_data_validation: true,
            ..Default::default()
        };
        let cmd = build_launch_command(&scripts_dir(), DatasetType::Odinw, &params);
        assert!(cmd.args.contains(&"--skip-config-resolution".to_string()));
        assert!(cmd.args.contains(&"--skip-data-validation".to_string()));
        assert!(!cmd.args.contains(&"--skip-env-setup".to_string()));
    }

    #[test]
    fn display_line_joins_program_and_args() {
        let params = TrainingParameters {
            dry_run: true,
            ..Default::default()
        };
        let cmd = build_launch_command(&scripts_dir(), DatasetType::Rf100vl, &params);
        assert_eq!(
            cmd.display_line(),
            "bash /opt/segtrain/scripts/train_rf100vl.sh --dry-run"
        );
    }
}
