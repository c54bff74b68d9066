//! # relax 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/relax.rs`

use clap::Args;
use std::path::PathBuf;

/// relax 子命令参数
#[derive(Args, Debug)]
pub struct RelaxArgs {
    /// Relaxation directory with one sub-directory per lattice deviation
    pub dir: PathBuf,

    /// Do not write the fit plot
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,
}
