//! # 解析器模块
//!
//! 提供 KKR 输出文件和单点结果表的读写。
//!
//! ## 依赖关系
//! - 被 `analysis/` 和 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: kkr_out, point_output

pub mod kkr_out;
pub mod point_output;
