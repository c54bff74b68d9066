//! # 收敛判定结果
//!
//! ## 依赖关系
//! - 由 `analysis/convergence.rs` 生成
//! - 被 `report/` 和 `commands/check.rs` 使用

use super::sample::{ConvergenceRecord, ConvergenceTable};

/// 收敛判定结果，生成后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceVerdict {
    pub converged: bool,
    /// 稳定区间中最早一个样本的下标
    pub converged_at_index: Option<usize>,
    pub converged_at_parameter: Option<f64>,
    /// 满足判据的连续样本（未收敛时为空）
    pub window_used: Vec<ConvergenceRecord>,
    /// 扫描停止时所在下标
    pub termination_index: usize,
    /// 扫描停止时 FIFO 中的参考样本数
    pub trailing_len: usize,
}

impl ConvergenceVerdict {
    /// 绘图时高亮的样本下标，即 `termination_index - trailing_len`。
    ///
    /// 收敛时与 `converged_at_index` 相同。未收敛时仅在 `legacy` 模式下
    /// 给出，指向最后一个被移出 FIFO 的样本；下标为负时从表尾回绕。
    pub fn reference_index(&self, table_len: usize, legacy: bool) -> Option<usize> {
        if self.converged {
            return self.converged_at_index;
        }
        if !legacy || table_len == 0 {
            return None;
        }
        let index = self.termination_index as isize - self.trailing_len as isize;
        Some(index.rem_euclid(table_len as isize) as usize)
    }

    /// 绘图参考样本
    pub fn reference_record<'a>(
        &self,
        table: &'a ConvergenceTable,
        legacy: bool,
    ) -> Option<&'a ConvergenceRecord> {
        self.reference_index(table.len(), legacy)
            .and_then(|i| table.records().get(i))
    }
}
