//! # relax 命令实现
//!
//! 对单个晶格弛豫目录拟合平衡晶格常数。
//!
//! ## 依赖关系
//! - 使用 `cli/relax.rs` 定义的参数
//! - 使用 `analysis/relaxation.rs`, `utils/output.rs`

use crate::analysis::relaxation::relax_directory;
use crate::cli::relax::RelaxArgs;
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::utils::output;

/// 执行 relax 命令
pub fn execute(args: RelaxArgs, config: &WorkflowConfig) -> Result<()> {
    output::print_header("Lattice Relaxation");

    let plot = (!args.no_plot).then_some(&config.plot);
    let outcome = relax_directory(&args.dir, &config.files, plot)?;

    output::print_info(&format!(
        "{} lattice points, fit seeded at {} {}",
        outcome.scan.len(),
        outcome.fit.seed,
        outcome.scan.parameter_unit()
    ));
    let [a0, a1, a2, a3] = outcome.fit.polynomial.coefficients();
    output::print_info(&format!(
        "E(a) = {:.6e} + {:.6e} a + {:.6e} a^2 + {:.6e} a^3",
        a0, a1, a2, a3
    ));
    output::print_info(&format!(
        "Curvature at equilibrium: {:.6e}",
        outcome.fit.polynomial.second_derivative(outcome.fit.equilibrium.value)
    ));
    output::print_written("fit result", &outcome.fit_result_path);
    if let Some(path) = &outcome.plot_path {
        output::print_written("fit plot", path);
    }
    output::print_success(&format!(
        "Equilibrium lattice constant: {:.6} {} (E = {:.8} {})",
        outcome.fit.equilibrium.value,
        outcome.fit.equilibrium.unit,
        outcome.fit.energy.value,
        outcome.fit.energy.unit
    ));

    Ok(())
}
