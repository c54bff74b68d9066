//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `check`: 收敛判定（汇总 → 判定 → 作图）
//! - `relax`: 单个晶格弛豫目录的拟合
//! - `prepare`: 生成收敛扫描目录与 Slurm 阵列脚本
//! - `extract`: 从 kkr.out 提取单点结果
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: check, relax, prepare, extract

pub mod check;
pub mod extract;
pub mod prepare;
pub mod relax;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// kkrconv - KKR 收敛测试与晶格弛豫工作流
#[derive(Parser)]
#[command(name = "kkrconv")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Convergence tests and lattice relaxation for the KKR Green's function code", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file (defaults are used when absent)
    #[arg(long, global = true, env = "KKRCONV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase diagnostic output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Decide convergence of a scanned parameter and plot the result
    Check(check::CheckArgs),

    /// Fit the equilibrium lattice constant of one relaxation directory
    Relax(relax::RelaxArgs),

    /// Create the directory tree and slurm array script for a convergence scan
    Prepare(prepare::PrepareArgs),

    /// Extract energies from a finished single-point run
    Extract(extract::ExtractArgs),
}
