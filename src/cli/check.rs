//! # check 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/check.rs`

use crate::config::ConvergenceOverrides;

use clap::Args;
use std::path::PathBuf;

/// check 子命令参数
#[derive(Args, Debug)]
#[command(after_help = "The aggregated table is cached as <PATH>/convergence.csv and is never \
refreshed automatically. Delete it after adding or re-running calculations to force \
re-aggregation. The same holds for <PATH>/conv_*/lat_const_out.csv.")]
pub struct CheckArgs {
    /// Scan root containing one directory per scanned value
    pub path: PathBuf,

    /// Scanned inputcard parameter as <section:key> (e.g. 'energy:KMAX')
    #[arg(short = 'c', long)]
    pub parameter: String,

    /// Tolerance on the equilibrium lattice constant
    #[arg(short = 'b', long)]
    pub lattice_threshold: Option<f64>,

    /// Tolerance on the total energy [default: 1e-6]
    #[arg(short = 'e', long)]
    pub energy_threshold: Option<f64>,

    /// Number of preceding samples each sample is compared with [default: 2]
    #[arg(long)]
    pub comparisons: Option<usize>,

    /// Highlight the last compared sample even without convergence and skip the verdict file
    #[arg(long, default_value_t = false)]
    pub legacy_fallthrough: bool,

    /// Do not write plots
    #[arg(long, default_value_t = false)]
    pub no_plots: bool,
}

impl CheckArgs {
    pub fn overrides(&self) -> ConvergenceOverrides {
        ConvergenceOverrides {
            lattice_threshold: self.lattice_threshold,
            energy_threshold: self.energy_threshold,
            comparison_window: self.comparisons,
            legacy_fallthrough: self.legacy_fallthrough,
        }
    }
}
