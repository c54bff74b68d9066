//! # 工作流配置
//!
//! 所有默认参数集中在 [`WorkflowConfig`]：在 `main` 中构造一次（默认值 →
//! 可选 TOML 文件 → 命令行覆盖），之后以引用传给各命令。
//!
//! 配置文件示例：
//! ```toml
//! [convergence]
//! lattice_threshold = 0.01
//! energy_threshold = 1e-6
//! comparison_window = 2
//!
//! [relaxation]
//! max_deviation = 5.0
//! energy_points = 5
//!
//! [slurm]
//! partition = "normal"
//! ```
//!
//! ## 依赖关系
//! - 被 `main.rs` 和 `commands/` 使用
//! - 使用 `serde` + `toml`
//! - 使用 `utils/slurm.rs` 的 `SlurmConfig`

use crate::error::{KkrError, Result};
use crate::utils::slurm::SlurmConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 工作流总配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub convergence: ConvergenceConfig,
    pub relaxation: RelaxationConfig,
    pub files: FileNames,
    pub plot: PlotConfig,
    pub slurm: SlurmConfig,
}

/// 收敛判定参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// 结构量（平衡晶格常数）容差，无默认值
    pub lattice_threshold: Option<f64>,
    /// 总能容差
    pub energy_threshold: f64,
    /// 与之比较的前序样本数
    pub comparison_window: usize,
    /// 未收敛时沿用旧行为：仍高亮最后移出窗口的样本，且不写判定文件
    pub legacy_fallthrough: bool,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        ConvergenceConfig {
            lattice_threshold: None,
            energy_threshold: 1e-6,
            comparison_window: 2,
            legacy_fallthrough: false,
        }
    }
}

/// 晶格弛豫扫描参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationConfig {
    /// 晶格常数最大偏离（> 1 时按百分比）
    pub max_deviation: f64,
    /// 每次弛豫计算的能量点数
    pub energy_points: usize,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        RelaxationConfig {
            max_deviation: 5.0,
            energy_points: 5,
        }
    }
}

/// 计算目录中使用的文件名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub inputcard: String,
    pub point_output: String,
    pub kkr_output: String,
    pub fit_result: String,
    pub relaxation_table: String,
    pub convergence_table: String,
    pub verdict: String,
    pub energy_plot: String,
    pub structural_plot: String,
    pub fit_plot: String,
}

impl Default for FileNames {
    fn default() -> Self {
        FileNames {
            inputcard: "inputcard.json".to_string(),
            point_output: "output.csv".to_string(),
            kkr_output: "kkr.out".to_string(),
            fit_result: "lat_const_out.csv".to_string(),
            relaxation_table: "relaxation.csv".to_string(),
            convergence_table: "convergence.csv".to_string(),
            verdict: "output.dat".to_string(),
            energy_plot: "energy_plot.png".to_string(),
            structural_plot: "lat_plot.png".to_string(),
            fit_plot: "lat_const_plot.png".to_string(),
        }
    }
}

/// 图像尺寸 (像素)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            width: 1200,
            height: 700,
        }
    }
}

impl WorkflowConfig {
    /// 读取配置文件；未给出路径时使用默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(WorkflowConfig::default());
        };

        let content = fs::read_to_string(path).map_err(|e| KkrError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|reason| KkrError::InvalidConfig {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// 命令行对收敛参数的覆盖
#[derive(Debug, Clone, Default)]
pub struct ConvergenceOverrides {
    pub lattice_threshold: Option<f64>,
    pub energy_threshold: Option<f64>,
    pub comparison_window: Option<usize>,
    pub legacy_fallthrough: bool,
}

impl ConvergenceOverrides {
    pub fn apply_to(&self, base: &ConvergenceConfig) -> ConvergenceConfig {
        ConvergenceConfig {
            lattice_threshold: self.lattice_threshold.or(base.lattice_threshold),
            energy_threshold: self.energy_threshold.unwrap_or(base.energy_threshold),
            comparison_window: self.comparison_window.unwrap_or(base.comparison_window),
            legacy_fallthrough: self.legacy_fallthrough || base.legacy_fallthrough,
        }
    }
}

/// 命令行对晶格弛豫参数的覆盖
#[derive(Debug, Clone, Default)]
pub struct RelaxationOverrides {
    pub max_deviation: Option<f64>,
    pub energy_points: Option<usize>,
}

impl RelaxationOverrides {
    pub fn apply_to(&self, base: &RelaxationConfig) -> RelaxationConfig {
        RelaxationConfig {
            max_deviation: self.max_deviation.unwrap_or(base.max_deviation),
            energy_points: self.energy_points.unwrap_or(base.energy_points),
        }
    }
}
