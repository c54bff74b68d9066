//! # extract 命令实现
//!
//! 单点自洽计算的后处理：
//! 1. 解析 `kkr.out`（费米能、总能、最后的 rms 误差）
//! 2. 与输入卡中的 `scf-cycle.QBOUND` 比较，写出 `CONVERGED` 或 `NOT_CONVERGED`
//! 3. 在计算目录的上一级写出 `output.csv`
//!
//! ## 依赖关系
//! - 使用 `cli/extract.rs` 定义的参数
//! - 使用 `parsers/kkr_out.rs`, `parsers/point_output.rs`, `models/inputcard.rs`

use crate::cli::extract::ExtractArgs;
use crate::config::WorkflowConfig;
use crate::error::{KkrError, Result};
use crate::models::{Inputcard, ParameterPath};
use crate::parsers::kkr_out::{parse_kkr_output, ScfSummary};
use crate::parsers::point_output::{
    write_point_output, PointRow, FERMI_ENERGY, LATTICE_CONSTANT, TOTAL_ENERGY,
};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 自洽收敛阈值的键路径
pub const QBOUND_KEY: &str = "scf-cycle.QBOUND";

pub const CONVERGED_MARKER: &str = "CONVERGED";
pub const NOT_CONVERGED_MARKER: &str = "NOT_CONVERGED";

/// 执行 extract 命令
pub fn execute(args: ExtractArgs, config: &WorkflowConfig) -> Result<()> {
    let files = &config.files;
    let run_dir = run_dir(&args.path);

    let kkr_name = args.kkr_output.as_deref().unwrap_or(&files.kkr_output);
    let summary = parse_kkr_output(&args.path.join(kkr_name))?;

    let card_path = args
        .inputcard
        .clone()
        .unwrap_or_else(|| run_dir.join(&files.inputcard));
    let card = Inputcard::from_file(&card_path)?;

    let qbound_key = ParameterPath::parse(QBOUND_KEY)?;
    let qbound = card.value_at(&qbound_key).ok_or_else(|| KkrError::MissingKey {
        key: QBOUND_KEY.to_string(),
        path: card_path.display().to_string(),
    })?;

    let marker = write_scf_marker(&args.path, &summary, qbound)?;
    if summary.is_converged(qbound) {
        output::print_success(&format!(
            "SCF converged: rms-error {} < {}",
            summary.rms_error(),
            qbound
        ));
    } else {
        output::print_warning(&format!(
            "SCF not converged: rms-error {} >= {}",
            summary.rms_error(),
            qbound
        ));
    }
    output::print_written("marker", &marker);

    let rows = point_rows(&card, &summary, &args.path.join(kkr_name))?;
    let output_path = run_dir.join(&files.point_output);
    write_point_output(&output_path, &rows)?;
    output::print_written("point output", &output_path);

    Ok(())
}

/// 单点计算所在目录（自洽目录的上一级）
fn run_dir(scf_dir: &Path) -> PathBuf {
    match scf_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// 写出收敛标记文件，并删除相反的旧标记
pub fn write_scf_marker(scf_dir: &Path, summary: &ScfSummary, qbound: f64) -> Result<PathBuf> {
    let rms = summary.rms_error();
    let (marker, stale, text) = if summary.is_converged(qbound) {
        (
            CONVERGED_MARKER,
            NOT_CONVERGED_MARKER,
            format!("The calculation converged with a threshold of {} < {}", rms, qbound),
        )
    } else {
        (
            NOT_CONVERGED_MARKER,
            CONVERGED_MARKER,
            format!(
                "The calculation did not converge with a threshold of {} > {}",
                rms, qbound
            ),
        )
    };

    let stale_path = scf_dir.join(stale);
    if stale_path.exists() {
        fs::remove_file(&stale_path).map_err(|e| KkrError::FileWriteError {
            path: stale_path.display().to_string(),
            source: e,
        })?;
    }

    let path = scf_dir.join(marker);
    fs::write(&path, text).map_err(|e| KkrError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(path)
}

/// `output.csv` 的三行：晶格常数 [a0], 费米能 [Ry], 总能 [Ry]
pub fn point_rows(card: &Inputcard, summary: &ScfSummary, source: &Path) -> Result<Vec<PointRow>> {
    let total_energy = summary.total_energy.ok_or_else(|| KkrError::MissingQuantity {
        quantity: "total energy".to_string(),
        path: source.display().to_string(),
    })?;

    Ok(vec![
        PointRow::new(LATTICE_CONSTANT, Some(card.lattice_constant()), "a0"),
        PointRow::new(FERMI_ENERGY, summary.fermi_energy, "Ry"),
        PointRow::new(TOTAL_ENERGY, Some(total_energy), "Ry"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parsers::point_output::read_point_output;
    use serde_json::json;

    fn summary(rms: Option<f64>, energy: Option<f64>) -> ScfSummary {
        ScfSummary {
            fermi_energy: Some(0.6123),
            total_energy: energy,
            last_rms_error: rms,
        }
    }

    fn card() -> Inputcard {
        serde_json::from_value(json!({
            "lattice": { "lattice-constant": 5.13 },
            "scf-cycle": { "QBOUND": 1e-7 }
        }))
        .unwrap()
    }

    #[test]
    fn test_marker_replaces_opposite_state() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_scf_marker(dir.path(), &summary(Some(1e-3), None), 1e-7).unwrap();
        assert!(path.ends_with(NOT_CONVERGED_MARKER));

        let path = write_scf_marker(dir.path(), &summary(Some(1e-9), None), 1e-7).unwrap();
        assert!(path.ends_with(CONVERGED_MARKER));
        assert!(!dir.path().join(NOT_CONVERGED_MARKER).exists());
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("The calculation converged"));
    }

    #[test]
    fn test_missing_rms_is_not_converged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scf_marker(dir.path(), &summary(None, None), 1e-7).unwrap();
        assert!(path.ends_with(NOT_CONVERGED_MARKER));
    }

    #[test]
    fn test_point_rows_round_trip_through_output_csv() {
        let dir = tempfile::tempdir().unwrap();
        let rows = point_rows(&card(), &summary(Some(1e-9), Some(-13325.789)), dir.path()).unwrap();

        let out = dir.path().join("output.csv");
        write_point_output(&out, &rows).unwrap();
        let parsed = read_point_output(&out).unwrap();

        assert_eq!(parsed.get(LATTICE_CONSTANT).map(|q| q.value), Some(5.13));
        assert_eq!(parsed.get(TOTAL_ENERGY).map(|q| q.value), Some(-13325.789));
        assert_eq!(parsed.get(FERMI_ENERGY).map(|q| q.unit.as_str()), Some("Ry"));
    }

    #[test]
    fn test_missing_total_energy() {
        let err = point_rows(&card(), &summary(Some(1e-9), None), Path::new("kkr.out")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn test_qbound_lookup() {
        let path = ParameterPath::parse(QBOUND_KEY).unwrap();
        assert_eq!(card().value_at(&path), Some(1e-7));
    }
}
