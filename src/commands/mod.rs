//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `analysis/`, `report/`, `parsers/`, `models/`, `utils/`
//! - 子模块: check, relax, prepare, extract

pub mod check;
pub mod extract;
pub mod prepare;
pub mod relax;

use crate::cli::Commands;
use crate::config::WorkflowConfig;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands, config: &WorkflowConfig) -> Result<()> {
    match cmd {
        Commands::Check(args) => check::execute(args, config),
        Commands::Relax(args) => relax::execute(args, config),
        Commands::Prepare(args) => prepare::execute(args, config),
        Commands::Extract(args) => extract::execute(args, config),
    }
}
