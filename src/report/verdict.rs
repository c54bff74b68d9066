//! # 判定文本
//!
//! 写出收敛扫描根目录下的 `output.dat`。每次判定前先删除旧文件：
//! - 收敛时写出收敛参数
//! - 未收敛时写出明确的未收敛说明；`legacy` 模式下不写文件
//!
//! ## 依赖关系
//! - 被 `commands/check.rs` 使用

use crate::analysis::convergence::ConvergenceCriteria;
use crate::error::{KkrError, Result};
use crate::models::ConvergenceVerdict;

use std::fs;
use std::path::Path;

/// 判定文本；`legacy` 模式下未收敛时没有文本
pub fn verdict_text(
    verdict: &ConvergenceVerdict,
    criteria: &ConvergenceCriteria,
    key: &str,
    legacy: bool,
) -> Option<String> {
    match verdict.converged_at_parameter {
        Some(parameter) if verdict.converged => Some(format!(
            "Lattice convergence up to {} and energy convergence up to {} was achieved with {} {}",
            criteria.lattice_threshold, criteria.energy_threshold, parameter, key
        )),
        _ if legacy => None,
        _ => Some(format!(
            "No convergence within lattice threshold {} and energy threshold {} for {}",
            criteria.lattice_threshold, criteria.energy_threshold, key
        )),
    }
}

/// 删除旧判定文件并写出新文本，返回写出的内容
pub fn write_verdict(
    path: &Path,
    verdict: &ConvergenceVerdict,
    criteria: &ConvergenceCriteria,
    key: &str,
    legacy: bool,
) -> Result<Option<String>> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| KkrError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
    }

    let Some(text) = verdict_text(verdict, criteria, key, legacy) else {
        return Ok(None);
    };

    fs::write(path, &text).map_err(|e| KkrError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(text))
}
