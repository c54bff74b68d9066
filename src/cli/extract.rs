//! # extract 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/extract.rs`

use clap::Args;
use std::path::PathBuf;

/// extract 子命令参数
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Directory of the self-consistent run; output.csv is written to its parent
    pub path: PathBuf,

    /// JSON inputcard of the run [default: <PATH>/../inputcard.json]
    #[arg(short = 'i', long)]
    pub inputcard: Option<PathBuf>,

    /// Name of the solver output file inside PATH [default: kkr.out]
    #[arg(long)]
    pub kkr_output: Option<String>,
}
