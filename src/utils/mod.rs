//! # 工具函数模块
//!
//! 提供美化输出、进度条、目录遍历、日志初始化、Slurm 脚本生成等工具。
//!
//! ## 依赖关系
//! - 被 `commands/`, `analysis/` 和 `main.rs` 使用
//! - 子模块: dirs, output, progress, slurm, telemetry

pub mod dirs;
pub mod output;
pub mod progress;
pub mod slurm;
pub mod telemetry;
