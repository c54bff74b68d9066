//! # KKR 输出文件 (kkr.out) 解析器
//!
//! 从自洽计算的纯文本输出中提取费米能、总能以及最后一次迭代的 rms 误差。
//!
//! ## 依赖关系
//! - 被 `commands/extract.rs` 使用
//! - 使用 `regex` 解析 Fortran 格式数字 (`1.23D-05`)

use crate::error::{KkrError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// 未找到 rms 误差时的缺省值（视为未收敛）
const DEFAULT_RMS_ERROR: f64 = 1.0;

/// 自洽计算摘要
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScfSummary {
    /// 费米能 (Ry)
    pub fermi_energy: Option<f64>,
    /// 总能 (Ry)，取最后一次出现的值
    pub total_energy: Option<f64>,
    /// 最后一次迭代的 rms 误差
    pub last_rms_error: Option<f64>,
}

impl ScfSummary {
    /// 最后的 rms 误差是否低于 QBOUND
    pub fn is_converged(&self, qbound: f64) -> bool {
        self.rms_error() < qbound
    }

    pub fn rms_error(&self) -> f64 {
        self.last_rms_error.unwrap_or(DEFAULT_RMS_ERROR)
    }
}

/// 解析 kkr.out 文件
///
/// 非 UTF-8 字节按替换字符读入，不会截断后续迭代
pub fn parse_kkr_output(path: &Path) -> Result<ScfSummary> {
    let bytes = fs::read(path).map_err(|e| KkrError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(parse_kkr_content(&String::from_utf8_lossy(&bytes)))
}

/// 解析 kkr.out 文本内容
pub fn parse_kkr_content(content: &str) -> ScfSummary {
    let mut summary = ScfSummary::default();

    for line in content.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        // " FERMI ENERGY = 0.6523 ..."
        if tokens.contains(&"FERMI") {
            if let Some(val) = tokens.get(3).and_then(|t| parse_fortran_float(t)) {
                summary.fermi_energy = Some(val);
            }
        }

        // "total energy in ryd. :   -12345.678"
        if tokens.len() > 3 && tokens[0..3] == ["total", "energy", "in"] {
            if let Some(val) = tokens.last().and_then(|t| parse_fortran_float(t)) {
                summary.total_energy = Some(val);
            }
        }

        // "rms-error for next iteration no.:   12   0.1234D-06"
        if tokens.contains(&"rms-error") && tokens.contains(&"no.:") {
            if let Some(val) = tokens.last().and_then(|t| parse_fortran_float(t)) {
                summary.last_rms_error = Some(val);
            }
        }
    }

    summary
}

/// 解析数字，接受 Fortran 双精度指数 `D`
pub fn parse_fortran_float(token: &str) -> Option<f64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^([-+]?(?:\d+\.?\d*|\.\d+))(?:[DdEe]([-+]?\d+))?$").expect("valid regex")
    });

    let caps = re.captures(token.trim())?;
    let mantissa = caps.get(1)?.as_str();
    match caps.get(2) {
        Some(exp) => format!("{}e{}", mantissa, exp.as_str()).parse().ok(),
        None => mantissa.parse().ok(),
    }
}
