//! # 收敛判定
//!
//! 按收敛参数升序扫描收敛表，维护最近 `comparison_window` 个样本的
//! (结构量, 总能) FIFO。当前样本与 FIFO 中每个样本的两个差值都严格小于
//! 各自阈值（且 FIFO 非空）时判定收敛，收敛点记为 FIFO 中最早的样本，
//! 即下标 `index - len(FIFO)`，而不是触发判定的样本。
//!
//! ## 依赖关系
//! - 被 `commands/check.rs` 使用
//! - 使用 `models/sample.rs`, `models/verdict.rs`, `config.rs`

use crate::config::ConvergenceConfig;
use crate::error::{KkrError, Result};
use crate::models::{ConvergenceTable, ConvergenceVerdict};

use std::collections::VecDeque;
use tracing::debug;

/// 收敛判据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCriteria {
    pub lattice_threshold: f64,
    pub energy_threshold: f64,
    pub comparison_window: usize,
}

impl ConvergenceCriteria {
    pub fn new(lattice_threshold: f64, energy_threshold: f64, comparison_window: usize) -> Result<Self> {
        check_threshold("lattice_threshold", lattice_threshold)?;
        check_threshold("energy_threshold", energy_threshold)?;
        if comparison_window == 0 {
            return Err(KkrError::InvalidArgument(
                "comparison_window must be at least 1".to_string(),
            ));
        }

        Ok(ConvergenceCriteria {
            lattice_threshold,
            energy_threshold,
            comparison_window,
        })
    }

    pub fn from_config(config: &ConvergenceConfig) -> Result<Self> {
        let lattice_threshold = config.lattice_threshold.ok_or_else(|| {
            KkrError::InvalidArgument(
                "lattice threshold not set (use --lattice-threshold or [convergence] lattice_threshold)"
                    .to_string(),
            )
        })?;
        Self::new(
            lattice_threshold,
            config.energy_threshold,
            config.comparison_window,
        )
    }
}

fn check_threshold(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(KkrError::InvalidThreshold {
            name: name.to_string(),
            value,
        })
    }
}

/// 所有差值都严格小于阈值
fn all_within(reference: &VecDeque<f64>, value: f64, threshold: f64) -> bool {
    reference.iter().all(|old| (old - value).abs() < threshold)
}

/// 对收敛表做收敛判定
pub fn evaluate(table: &ConvergenceTable, criteria: &ConvergenceCriteria) -> Result<ConvergenceVerdict> {
    if table.is_empty() {
        return Err(KkrError::EmptyTable);
    }

    let records = table.records();
    let capacity = criteria.comparison_window;
    let mut old_structural: VecDeque<f64> = VecDeque::with_capacity(capacity + 1);
    let mut old_energies: VecDeque<f64> = VecDeque::with_capacity(capacity + 1);

    for (index, record) in records.iter().enumerate() {
        let stable = !old_structural.is_empty()
            && all_within(&old_structural, record.structural_value, criteria.lattice_threshold)
            && all_within(&old_energies, record.energy, criteria.energy_threshold);

        debug!(index, parameter = record.parameter, stable, "convergence scan");

        if stable {
            let trailing_len = old_structural.len();
            let start = index - trailing_len;
            return Ok(ConvergenceVerdict {
                converged: true,
                converged_at_index: Some(start),
                converged_at_parameter: Some(records[start].parameter),
                window_used: records[start..=index].to_vec(),
                termination_index: index,
                trailing_len,
            });
        }

        old_structural.push_back(record.structural_value);
        old_energies.push_back(record.energy);
        if old_structural.len() > capacity {
            old_structural.pop_front();
            old_energies.pop_front();
        }
    }

    Ok(ConvergenceVerdict {
        converged: false,
        converged_at_index: None,
        converged_at_parameter: None,
        window_used: Vec::new(),
        termination_index: records.len() - 1,
        trailing_len: old_structural.len(),
    })
}
