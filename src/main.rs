//! # kkrconv - KKR 收敛测试与晶格弛豫工作流
//!
//! 将收敛测试的准备、单点后处理、晶格弛豫拟合与收敛判定统一成单一可执行文件。
//!
//! ## 子命令
//! - `prepare` - 生成收敛扫描目录与 Slurm 阵列脚本
//! - `extract` - 从 kkr.out 提取单点结果
//! - `relax`   - 晶格弛豫目录的三次拟合
//! - `check`   - 收敛判定与作图
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── analysis/  (拟合、汇总、收敛判定)
//!   │     ├── report/    (图表与判定文本)
//!   │     ├── parsers/   (kkr.out, output.csv)
//!   │     └── models/    (数据模型)
//!   ├── config.rs   (工作流配置)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod analysis;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod parsers;
mod report;
mod utils;

use clap::Parser;
use cli::Cli;
use config::WorkflowConfig;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::telemetry::init(cli.verbose);

    let result = WorkflowConfig::load(cli.config.as_deref())
        .and_then(|config| commands::run(cli.command, &config));

    if let Err(e) = result {
        tracing::debug!(kind = ?e.kind(), error = ?e, "command failed");
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
