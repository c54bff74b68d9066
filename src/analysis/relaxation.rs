//! # 晶格弛豫后处理
//!
//! 对一个晶格弛豫目录（每个子目录是一个晶格常数偏离点）：
//! 1. 汇总各点 `output.csv` 中的 `lat_const` 与 `e_tot`，写出 `relaxation.csv`
//!    （已存在则直接读取）
//! 2. 三次多项式拟合并求平衡晶格常数
//! 3. 写出 `lat_const_out.csv`，可选绘制拟合图
//!
//! ## 依赖关系
//! - 被 `analysis/store.rs`, `commands/relax.rs` 使用
//! - 使用 `analysis/fitter.rs`, `parsers/point_output.rs`, `report/plot.rs`

use crate::analysis::fitter::{find_equilibrium, EquilibriumFit};
use crate::config::{FileNames, PlotConfig};
use crate::error::{KkrError, Result};
use crate::models::{Sample, SampleTable};
use crate::parsers::point_output::{
    read_point_output, write_fit_result, LATTICE_CONSTANT, TOTAL_ENERGY,
};
use crate::report;
use crate::utils::dirs::list_run_dirs;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// relaxation.csv 中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScanRow {
    lat_const: f64,
    lat_const_unit: String,
    e_tot: f64,
    e_tot_unit: String,
}

/// 晶格弛豫结果
#[derive(Debug, Clone)]
pub struct RelaxationOutcome {
    pub scan: SampleTable,
    pub fit: EquilibriumFit,
    pub fit_result_path: PathBuf,
    pub plot_path: Option<PathBuf>,
}

/// 读取（或汇总）一个弛豫目录的能量-晶格常数扫描
pub fn load_scan(dir: &Path, files: &FileNames) -> Result<SampleTable> {
    let cache = dir.join(&files.relaxation_table);

    if cache.exists() {
        debug!(path = %cache.display(), "using cached relaxation table");
        return rows_to_table(&read_scan_rows(&cache)?);
    }

    // 校验通过后才写缓存
    let rows = collect_scan_rows(dir, files)?;
    let table = rows_to_table(&rows)?;
    write_scan_rows(&cache, &rows)?;
    Ok(table)
}

/// 对弛豫目录求平衡晶格常数并写出结果文件
pub fn relax_directory(
    dir: &Path,
    files: &FileNames,
    plot: Option<&PlotConfig>,
) -> Result<RelaxationOutcome> {
    let scan = load_scan(dir, files)?;
    let fit = find_equilibrium(&scan)?;

    let fit_result_path = dir.join(&files.fit_result);
    write_fit_result(&fit_result_path, &fit.equilibrium)?;

    info!(
        dir = %dir.display(),
        equilibrium = fit.equilibrium.value,
        unit = %fit.equilibrium.unit,
        "lattice relaxation fitted"
    );

    let plot_path = match plot {
        Some(cfg) => {
            let path = dir.join(&files.fit_plot);
            report::render_fit_plot(&scan, &fit, &path, (cfg.width, cfg.height))?;
            Some(path)
        }
        None => None,
    };

    Ok(RelaxationOutcome {
        scan,
        fit,
        fit_result_path,
        plot_path,
    })
}

fn collect_scan_rows(dir: &Path, files: &FileNames) -> Result<Vec<ScanRow>> {
    let runs = list_run_dirs(dir)?;
    if runs.is_empty() {
        return Err(KkrError::NoCalculations {
            path: dir.display().to_string(),
        });
    }

    let mut rows = Vec::with_capacity(runs.len());
    for run in &runs {
        let path = run.join(&files.point_output);
        let output = read_point_output(&path)?;
        let lattice = output.require(LATTICE_CONSTANT, &path)?;
        let energy = output.require(TOTAL_ENERGY, &path)?;

        rows.push(ScanRow {
            lat_const: lattice.value,
            lat_const_unit: lattice.unit,
            e_tot: energy.value,
            e_tot_unit: energy.unit,
        });
    }

    rows.sort_by(|a, b| a.lat_const.total_cmp(&b.lat_const));
    Ok(rows)
}

fn rows_to_table(rows: &[ScanRow]) -> Result<SampleTable> {
    let unit = rows
        .first()
        .map(|r| r.lat_const_unit.clone())
        .ok_or(KkrError::EmptyTable)?;

    if let Some(other) = rows.iter().find(|r| r.lat_const_unit != unit) {
        return Err(KkrError::UnitMismatch {
            quantity: "lattice constant".to_string(),
            expected: unit,
            found: other.lat_const_unit.clone(),
        });
    }

    let samples = rows
        .iter()
        .map(|r| Sample::new(r.lat_const, r.e_tot, r.e_tot_unit.clone()))
        .collect();
    SampleTable::new(unit, samples)
}

fn read_scan_rows(path: &Path) -> Result<Vec<ScanRow>> {
    let mut rdr = csv::Reader::from_path(path)?;
    rdr.deserialize()
        .collect::<std::result::Result<Vec<ScanRow>, _>>()
        .map_err(|e| KkrError::ParseError {
            format: "relaxation table".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

fn write_scan_rows(path: &Path, rows: &[ScanRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| KkrError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
