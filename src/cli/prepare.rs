//! # prepare 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/prepare.rs`

use crate::config::RelaxationOverrides;

use clap::Args;
use std::path::PathBuf;

/// prepare 子命令参数
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Scan root to create (one conv_<value> directory per scanned value)
    pub path: PathBuf,

    /// JSON inputcard used as template; its lattice constant is the initial guess
    #[arg(short = 'i', long)]
    pub template: PathBuf,

    /// Parameters set to the scanned value, as <section:key> (all receive the same value)
    #[arg(short = 'c', long = "parameter", required = true, num_args = 1..)]
    pub parameters: Vec<String>,

    /// Scanned integer range: MIN MAX STEP (MAX excluded)
    #[arg(short, long, num_args = 3, value_names = ["MIN", "MAX", "STEP"], allow_negative_numbers = true)]
    pub range: Vec<i64>,

    /// Maximum lattice deviation, taken as percent when > 1 [default: 5]
    #[arg(long)]
    pub max_deviation: Option<f64>,

    /// Number of lattice points per relaxation [default: 5]
    #[arg(long)]
    pub energy_points: Option<usize>,

    /// c/a mismatch scan inside every lattice point: MIN MAX N ratios (ac_1.00 is always written)
    #[arg(long, num_args = 3, value_names = ["MIN", "MAX", "N"])]
    pub mismatch_ratios: Option<Vec<f64>>,

    /// Slurm script template; 'CHANGE' is replaced by the last array index
    #[arg(long)]
    pub slurm_template: Option<PathBuf>,

    /// Atom indices the empty spheres take their weights from (passed to the job script)
    #[arg(short, long, num_args = 0..)]
    pub weights: Vec<String>,

    /// Submit the array job with sbatch after generation
    #[arg(long, default_value_t = false)]
    pub submit: bool,
}

impl PrepareArgs {
    pub fn overrides(&self) -> RelaxationOverrides {
        RelaxationOverrides {
            max_deviation: self.max_deviation,
            energy_points: self.energy_points,
        }
    }
}
