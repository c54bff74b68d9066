//! # Slurm 脚本生成工具
//!
//! 为一次收敛测试生成 sbatch 阵列作业脚本：每个阵列任务对应一个
//! (收敛参数, 晶格偏离) 计算点。
//!
//! 两种方式：
//! - 由模板生成：模板中的 `CHANGE` 替换为最大任务编号
//! - 由 [`SlurmConfig`] 直接生成
//!
//! ## 依赖关系
//! - 被 `commands/prepare.rs` 和 `config.rs` 使用
//! - 使用 `regex`

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 模板中代表阵列上限的占位符
pub const ARRAY_PLACEHOLDER: &str = "CHANGE";

/// Slurm 作业配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurmConfig {
    pub job_name: String,
    pub partition: String,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
    /// 每个阵列任务执行的命令，可使用 `$SLURM_ARRAY_TASK_ID`
    pub exec: String,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        SlurmConfig {
            job_name: "kkr_conv".to_string(),
            partition: "normal".to_string(),
            nodes: 1,
            ntasks: 1,
            cpus_per_task: 1,
            mem_per_cpu: "2G".to_string(),
            time_limit: "24:00:00".to_string(),
            modules: vec![],
            exec: "kkr_point.sh \"$SCAN_ROOT\" \"$SLURM_ARRAY_TASK_ID\"".to_string(),
        }
    }
}

/// 阵列作业的最大任务编号（任务编号从 0 开始）
pub fn array_upper_bound(energy_points: usize, scan_values: usize) -> usize {
    (energy_points * scan_values).saturating_sub(1)
}

/// 将模板中的占位符替换为阵列上限
pub fn render_array_template(template: &str, upper_bound: usize) -> String {
    let pattern = Regex::new(&format!(r"\b{}\b", ARRAY_PLACEHOLDER)).unwrap();
    pattern
        .replace_all(template, upper_bound.to_string().as_str())
        .into_owned()
}

/// 生成 sbatch 阵列脚本内容
pub fn generate_array_script(config: &SlurmConfig, scan_root: &Path, upper_bound: usize) -> String {
    let module_loads = config
        .modules
        .iter()
        .map(|m| format!("module load {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"#!/bin/bash
#SBATCH --partition {}
#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH --array=0-{}
#SBATCH -o slurm_logs/%x_%a.out
#SBATCH -e slurm_logs/%x_%a.err

set -euo pipefail

module purge 2>&1
{}

export SCAN_ROOT="{}"
echo "Task $SLURM_ARRAY_TASK_ID of {}"
{}
"#,
        config.partition,
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks,
        config.job_name,
        upper_bound,
        module_loads,
        scan_root.display(),
        config.job_name,
        config.exec,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_upper_bound() {
        assert_eq!(array_upper_bound(5, 4), 19);
        assert_eq!(array_upper_bound(0, 4), 0);
    }

    #[test]
    fn test_render_array_template() {
        let template = "#SBATCH --array=0-CHANGE\n#SBATCH -J CHANGES\n";
        let rendered = render_array_template(template, 19);
        assert_eq!(rendered, "#SBATCH --array=0-19\n#SBATCH -J CHANGES\n");
    }

    #[test]
    fn test_generate_array_script() {
        let config = SlurmConfig {
            modules: vec!["kkr/2024".to_string()],
            ..SlurmConfig::default()
        };
        let script = generate_array_script(&config, Path::new("/scratch/conv"), 9);
        assert!(script.contains("#SBATCH --array=0-9"));
        assert!(script.contains("module load kkr/2024"));
        assert!(script.contains("export SCAN_ROOT=\"/scratch/conv\""));
    }
}
