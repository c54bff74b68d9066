//! # 分析模块
//!
//! 收敛测试与晶格弛豫的核心计算。
//!
//! ## 子模块
//! - `fitter` - 三次多项式拟合与极小化
//! - `relaxation` - 单个晶格弛豫目录的后处理
//! - `store` - 收敛表的汇总与缓存
//! - `convergence` - 滑动窗口收敛判定
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/`, `parsers/`, `report/`

pub mod convergence;
pub mod fitter;
pub mod relaxation;
pub mod store;
