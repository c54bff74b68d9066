//! # 数据模型模块
//!
//! 定义扫描样本、收敛判定结果和输入卡的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `analysis/` 和 `commands/` 使用
//! - 子模块: sample, verdict, inputcard

pub mod inputcard;
pub mod sample;
pub mod verdict;

pub use inputcard::{Inputcard, ParameterPath};
pub use sample::{
    ConvergenceRecord, ConvergenceTable, EquilibriumPoint, Quantity, Sample, SampleTable,
};
pub use verdict::ConvergenceVerdict;
