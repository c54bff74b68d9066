//! # 统一错误处理模块
//!
//! 定义 kkrconv 的所有错误类型，使用 `thiserror` 派生。
//!
//! 错误按来源分为五类（见 [`ErrorKind`]）：
//! - `Data`   - 计算目录中的记录缺失或格式错误
//! - `Fit`    - 多项式拟合或极小化失败
//! - `Config` - 阈值、单位、参数等配置错误
//! - `Io`     - 文件读写
//! - `External` - 外部命令 (sbatch)
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// kkrconv 统一错误类型
#[derive(Error, Debug)]
pub enum KkrError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 数据错误
    // ─────────────────────────────────────────────────────────────
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Quantity '{quantity}' missing in {path}")]
    MissingQuantity { quantity: String, path: String },

    #[error("Key path '{key}' not found in {path}")]
    MissingKey { key: String, path: String },

    #[error("Duplicate parameter value {parameter} in sample table")]
    DuplicateParameter { parameter: f64 },

    #[error("No calculation directories found in {path}")]
    NoCalculations { path: String },

    // ─────────────────────────────────────────────────────────────
    // 拟合错误
    // ─────────────────────────────────────────────────────────────
    #[error("Cubic fit needs at least {needed} samples, got {found}")]
    InsufficientSamples { needed: usize, found: usize },

    #[error("Least-squares fit failed: {0}")]
    FitFailed(String),

    #[error("Minimization of fitted polynomial failed: {0}")]
    MinimizationFailed(String),

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Sample table is empty")]
    EmptyTable,

    #[error("Invalid threshold '{name}': {value} (must be positive and finite)")]
    InvalidThreshold { name: String, value: f64 },

    #[error("Unit mismatch for {quantity}: expected '{expected}', found '{found}'")]
    UnitMismatch {
        quantity: String,
        expected: String,
        found: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration file {path}\nReason: {reason}")]
    InvalidConfig { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 序列化 / 绘图
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Plot rendering failed: {0}")]
    PlotError(String),
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Data,
    Fit,
    Config,
    External,
}

impl KkrError {
    /// 返回错误所属类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            KkrError::FileReadError { .. }
            | KkrError::FileWriteError { .. }
            | KkrError::DirectoryNotFound { .. }
            | KkrError::PlotError(_) => ErrorKind::Io,

            KkrError::FileNotFound { .. }
            | KkrError::ParseError { .. }
            | KkrError::MissingQuantity { .. }
            | KkrError::MissingKey { .. }
            | KkrError::DuplicateParameter { .. }
            | KkrError::NoCalculations { .. }
            | KkrError::CsvError(_)
            | KkrError::JsonError(_) => ErrorKind::Data,

            KkrError::InsufficientSamples { .. }
            | KkrError::FitFailed(_)
            | KkrError::MinimizationFailed(_) => ErrorKind::Fit,

            KkrError::EmptyTable
            | KkrError::InvalidThreshold { .. }
            | KkrError::UnitMismatch { .. }
            | KkrError::InvalidArgument(_)
            | KkrError::InvalidConfig { .. } => ErrorKind::Config,

            KkrError::CommandNotFound { .. } | KkrError::CommandFailed { .. } => {
                ErrorKind::External
            }
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, KkrError>;
