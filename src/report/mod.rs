//! # 报告输出模块
//!
//! 收敛判定与晶格弛豫的图表和判定文本。
//!
//! ## 子模块
//! - `plot` - 散点图渲染
//! - `verdict` - 判定文本与 `output.dat`
//!
//! ## 依赖关系
//! - 被 `commands/check.rs`, `analysis/relaxation.rs` 使用
//! - 使用 `models/`, `analysis/fitter.rs`, `analysis/convergence.rs`

pub mod plot;
pub mod verdict;

pub use plot::{Band, ScatterPlot};

use crate::analysis::convergence::ConvergenceCriteria;
use crate::analysis::fitter::EquilibriumFit;
use crate::error::Result;
use crate::models::{ConvergenceTable, ConvergenceVerdict, SampleTable};

use std::path::Path;

/// 拟合曲线的采样点数
const CURVE_SAMPLES: usize = 200;

/// 构造总能与结构量两张收敛图。
///
/// 有参考样本时绘制 `±threshold` 容差带并高亮该样本；否则只画散点。
pub fn convergence_plots(
    table: &ConvergenceTable,
    verdict: &ConvergenceVerdict,
    criteria: &ConvergenceCriteria,
    legacy: bool,
) -> (ScatterPlot, ScatterPlot) {
    let reference = verdict.reference_record(table, legacy);

    let energy = ScatterPlot {
        title: "Total energy convergence".to_string(),
        x_label: "Convergence Parameter".to_string(),
        y_label: format!(
            "Convergence Criterion [{}]",
            table.energy_unit().unwrap_or_default()
        ),
        points: table.energy_points(),
        band: reference.map(|r| Band {
            center: r.energy,
            half_width: criteria.energy_threshold,
        }),
        highlight: reference.map(|r| (r.parameter, r.energy)),
        ..ScatterPlot::default()
    };

    let structural = ScatterPlot {
        title: "Lattice constant convergence".to_string(),
        x_label: "Convergence Parameter".to_string(),
        y_label: format!(
            "Convergence Criterion [{}]",
            table.structural_unit().unwrap_or_default()
        ),
        points: table.structural_points(),
        band: reference.map(|r| Band {
            center: r.structural_value,
            half_width: criteria.lattice_threshold,
        }),
        highlight: reference.map(|r| (r.parameter, r.structural_value)),
        ..ScatterPlot::default()
    };

    (energy, structural)
}

/// 写出两张收敛图
pub fn render_convergence_plots(
    table: &ConvergenceTable,
    verdict: &ConvergenceVerdict,
    criteria: &ConvergenceCriteria,
    legacy: bool,
    energy_path: &Path,
    structural_path: &Path,
    size: (u32, u32),
) -> Result<()> {
    let (energy, structural) = convergence_plots(table, verdict, criteria, legacy);
    energy.render(energy_path, size)?;
    structural.render(structural_path, size)
}

/// 构造晶格弛豫拟合图：样本、拟合曲线与平衡位置
pub fn fit_plot(scan: &SampleTable, fit: &EquilibriumFit) -> ScatterPlot {
    let points = scan.points();
    let x_min = points.first().map(|p| p.0).unwrap_or(fit.equilibrium.value);
    let x_max = points.last().map(|p| p.0).unwrap_or(fit.equilibrium.value);

    ScatterPlot {
        title: "Lattice relaxation".to_string(),
        x_label: format!("Lattice constant [{}]", scan.parameter_unit()),
        y_label: format!("Total energy [{}]", scan.observable_unit().unwrap_or_default()),
        points,
        curve: fit.polynomial.sample_curve(x_min, x_max, CURVE_SAMPLES),
        marker_x: Some(fit.equilibrium.value),
        ..ScatterPlot::default()
    }
}

pub fn render_fit_plot(
    scan: &SampleTable,
    fit: &EquilibriumFit,
    output_path: &Path,
    size: (u32, u32),
) -> Result<()> {
    fit_plot(scan, fit).render(output_path, size)
}
