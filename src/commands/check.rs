//! # check 命令实现
//!
//! 收敛判定流程：
//! 1. 汇总（或读取缓存的）收敛表
//! 2. 滑动窗口判定
//! 3. 写出 `output.dat` 与两张收敛图
//!
//! ## 依赖关系
//! - 使用 `cli/check.rs` 定义的参数
//! - 使用 `analysis/store.rs`, `analysis/convergence.rs`, `report/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::analysis::convergence::{evaluate, ConvergenceCriteria};
use crate::analysis::store::{SampleStore, TableSource};
use crate::cli::check::CheckArgs;
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::models::{ConvergenceTable, ConvergenceVerdict, ParameterPath};
use crate::report;
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

/// 收敛表显示行
#[derive(Debug, Clone, Tabled)]
struct TableRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Parameter")]
    parameter: String,
    #[tabled(rename = "E_tot")]
    energy: String,
    #[tabled(rename = "Lattice constant")]
    structural: String,
    #[tabled(rename = "Window")]
    window: String,
}

/// 执行 check 命令
pub fn execute(args: CheckArgs, config: &WorkflowConfig) -> Result<()> {
    output::print_header("Convergence Check");

    let parameter = ParameterPath::parse(&args.parameter)?;
    let settings = args.overrides().apply_to(&config.convergence);
    let criteria = ConvergenceCriteria::from_config(&settings)?;
    let files = &config.files;

    let mut store = SampleStore::new(&args.path, parameter.clone(), files);
    if !args.no_plots {
        store = store.with_fit_plots(&config.plot);
    }

    let spinner = progress::create_spinner("Aggregating convergence table...");
    let loaded = store.load_or_aggregate();
    spinner.finish_and_clear();

    let (table, source) = loaded?;
    match source {
        TableSource::Cache => output::print_info(&format!(
            "Using cached table '{}' (delete it to re-aggregate)",
            store.cache_path().display()
        )),
        TableSource::Aggregated => output::print_written("convergence table", &store.cache_path()),
    }

    let verdict = evaluate(&table, &criteria)?;
    println!("{}", Table::new(table_rows(&table, &verdict)));

    let verdict_path = args.path.join(&files.verdict);
    let written = report::verdict::write_verdict(
        &verdict_path,
        &verdict,
        &criteria,
        parameter.key(),
        settings.legacy_fallthrough,
    )?;
    if written.is_some() {
        output::print_written("verdict", &verdict_path);
    }

    if !args.no_plots {
        let energy_plot = args.path.join(&files.energy_plot);
        let structural_plot = args.path.join(&files.structural_plot);
        report::render_convergence_plots(
            &table,
            &verdict,
            &criteria,
            settings.legacy_fallthrough,
            &energy_plot,
            &structural_plot,
            (config.plot.width, config.plot.height),
        )?;
        output::print_written("energy plot", &energy_plot);
        output::print_written("lattice plot", &structural_plot);
    }

    match verdict.converged_at_parameter {
        Some(value) if verdict.converged => output::print_success(&format!(
            "Converged at {} = {} (lattice < {}, energy < {})",
            parameter.key(),
            value,
            criteria.lattice_threshold,
            criteria.energy_threshold
        )),
        _ => output::print_warning(&format!(
            "No convergence of {} within lattice threshold {} and energy threshold {}",
            parameter.key(),
            criteria.lattice_threshold,
            criteria.energy_threshold
        )),
    }

    Ok(())
}

fn table_rows(table: &ConvergenceTable, verdict: &ConvergenceVerdict) -> Vec<TableRow> {
    let window = verdict
        .converged_at_index
        .map(|start| start..start + verdict.window_used.len());

    table
        .records()
        .iter()
        .enumerate()
        .map(|(i, r)| TableRow {
            index: i,
            parameter: r.parameter.to_string(),
            energy: format!("{:.8} {}", r.energy, r.energy_unit),
            structural: format!("{:.5} {}", r.structural_value, r.structural_unit),
            window: match &window {
                Some(range) if range.contains(&i) => "*".to_string(),
                _ => String::new(),
            },
        })
        .collect()
}
