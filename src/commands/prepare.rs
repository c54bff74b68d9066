//! # prepare 命令实现
//!
//! 生成收敛扫描的目录树：
//! ```text
//! <path>/conv_<v>/{m_5.00, m_2.50, n, p_2.50, p_5.00}/inputcard.json
//! ```
//! 每个扫描值对应一次晶格弛豫；随后生成（可选提交）Slurm 阵列脚本，
//! 阵列任务数为 `能量点数 × 扫描值个数`。
//!
//! 给出 `--mismatch-ratios` 时每个晶格点再展开为 c/a 失配扫描：
//! ```text
//! <path>/conv_<v>/n/{ac_1.00, ac_0.50, ac_0.75, ...}/inputcard.json
//! ```
//! 此时每次弛豫的单点数为 `能量点数 × 失配点数`。
//!
//! ## 依赖关系
//! - 使用 `cli/prepare.rs` 定义的参数
//! - 使用 `models/inputcard.rs`, `utils/slurm.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::analysis::fitter::CUBIC_TERMS;
use crate::cli::prepare::PrepareArgs;
use crate::config::WorkflowConfig;
use crate::error::{KkrError, Result};
use crate::models::{Inputcard, ParameterPath};
use crate::utils::slurm::{array_upper_bound, generate_array_script, render_array_template};
use crate::utils::{output, progress};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// 偏离量小于此值视为零偏离
const ZERO_DEVIATION: f64 = 1e-12;

/// 未失配的 c/a 比值
const UNSTRAINED_RATIO: f64 = 1.0;

/// 执行 prepare 命令
pub fn execute(args: PrepareArgs, config: &WorkflowConfig) -> Result<()> {
    output::print_header("Convergence Scan Preparation");

    let relaxation = args.overrides().apply_to(&config.relaxation);
    let paths = args
        .parameters
        .iter()
        .map(|p| ParameterPath::parse(p))
        .collect::<Result<Vec<_>>>()?;

    let [min, max, step] = args.range[..] else {
        return Err(KkrError::InvalidArgument(
            "--range expects MIN MAX STEP".to_string(),
        ));
    };
    let values = scan_values(min, max, step)?;
    let devs = deviations(relaxation.max_deviation, relaxation.energy_points)?;
    let ratios = match args.mismatch_ratios.as_deref() {
        Some(&[min, max, n]) => mismatch_points(&mismatch_ratios(min, max, ratio_count(n)?)?),
        Some(_) => {
            return Err(KkrError::InvalidArgument(
                "--mismatch-ratios expects MIN MAX N".to_string(),
            ))
        }
        None => Vec::new(),
    };
    if devs.len() < CUBIC_TERMS {
        output::print_warning(&format!(
            "{} lattice points per relaxation, the cubic fit needs at least {}",
            devs.len(),
            CUBIC_TERMS
        ));
    }

    let template = Inputcard::from_file(&args.template)?;
    output::print_info(&format!(
        "Scanning {} over {:?} with {} lattice points around {}",
        args.parameters.join(", "),
        values,
        devs.len(),
        template.lattice_constant()
    ));
    if !ratios.is_empty() {
        output::print_info(&format!("c/a mismatch ratios per lattice point: {:?}", ratios));
    }
    let points = devs.len() * ratios.len().max(1);

    let pb = progress::create_progress_bar(values.len() as u64, "Writing inputcards");
    for &value in &values {
        let card = scan_card(&template, &paths, value)?;
        let relax_dir = args.path.join(format!("conv_{}", value));
        prepare_relaxation(&relax_dir, &card, &devs, &ratios, &config.files.inputcard)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    output::print_success(&format!(
        "Created {} relaxation directories under '{}'",
        values.len(),
        args.path.display()
    ));

    let upper = array_upper_bound(points, values.len());
    let (script_path, script) = match &args.slurm_template {
        Some(template_path) => {
            let content = fs::read_to_string(template_path).map_err(|e| KkrError::FileReadError {
                path: template_path.display().to_string(),
                source: e,
            })?;
            let name = template_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("slurm_conv.job"));
            (script_dir(&args.path).join(name), render_array_template(&content, upper))
        }
        None => (
            script_dir(&args.path).join(format!("{}.sh", config.slurm.job_name)),
            generate_array_script(&config.slurm, &args.path, upper),
        ),
    };

    fs::write(&script_path, script).map_err(|e| KkrError::FileWriteError {
        path: script_path.display().to_string(),
        source: e,
    })?;
    output::print_written(&format!("slurm array 0-{}", upper), &script_path);

    if args.submit {
        let job = submit(&script_path, &args.path, &args.weights, points)?;
        output::print_success(&format!("Submitted: {}", job));
    }

    Ok(())
}

/// 脚本写在扫描根目录的上一级
fn script_dir(root: &Path) -> PathBuf {
    match root.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `[min, max)` 按 `step` 取整数扫描值
pub fn scan_values(min: i64, max: i64, step: i64) -> Result<Vec<i64>> {
    if step <= 0 {
        return Err(KkrError::InvalidArgument(format!(
            "Range step must be positive, got {}",
            step
        )));
    }

    let values: Vec<i64> = std::iter::successors(Some(min), |v| v.checked_add(step))
        .take_while(|v| *v < max)
        .collect();

    if values.is_empty() {
        return Err(KkrError::InvalidArgument(format!(
            "Empty range [{}, {}) with step {}",
            min, max, step
        )));
    }
    Ok(values)
}

/// 晶格常数相对偏离：`[-d, d]` 上均匀取 `points` 个点，`max_deviation > 1` 按百分比
pub fn deviations(max_deviation: f64, points: usize) -> Result<Vec<f64>> {
    if !max_deviation.is_finite() || max_deviation < 0.0 {
        return Err(KkrError::InvalidArgument(format!(
            "Invalid maximum deviation {}",
            max_deviation
        )));
    }
    if points == 0 {
        return Err(KkrError::InvalidArgument(
            "energy_points must be at least 1".to_string(),
        ));
    }

    let d = if max_deviation > 1.0 {
        max_deviation / 100.0
    } else {
        max_deviation
    };

    if points == 1 {
        return Ok(vec![-d]);
    }

    let step = 2.0 * d / (points - 1) as f64;
    Ok((0..points).map(|i| -d + step * i as f64).collect())
}

/// 偏离点目录名：`n`, `m_<百分比>`, `p_<百分比>`
pub fn deviation_dir_name(deviation: f64) -> String {
    if deviation.abs() < ZERO_DEVIATION {
        "n".to_string()
    } else if deviation < 0.0 {
        format!("m_{:.2}", deviation.abs() * 100.0)
    } else {
        format!("p_{:.2}", deviation * 100.0)
    }
}

fn ratio_count(n: f64) -> Result<usize> {
    if n.fract() != 0.0 || n < 1.0 {
        return Err(KkrError::InvalidArgument(format!(
            "Number of mismatch ratios must be a positive integer, got {}",
            n
        )));
    }
    Ok(n as usize)
}

/// c/a 比值：`[min, max]` 上均匀取 `points` 个点（含端点）
pub fn mismatch_ratios(min: f64, max: f64, points: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite()) || min <= 0.0 || max < min {
        return Err(KkrError::InvalidArgument(format!(
            "Invalid mismatch ratio range [{}, {}]",
            min, max
        )));
    }
    if points == 0 {
        return Err(KkrError::InvalidArgument(
            "mismatch ratios need at least 1 point".to_string(),
        ));
    }
    if points == 1 {
        return Ok(vec![min]);
    }

    let step = (max - min) / (points - 1) as f64;
    Ok((0..points).map(|i| min + step * i as f64).collect())
}

/// 实际写出的失配点：未失配点在最前，其余按目录名去重
pub fn mismatch_points(ratios: &[f64]) -> Vec<f64> {
    let mut points = vec![UNSTRAINED_RATIO];
    for &ratio in ratios {
        let name = mismatch_dir_name(ratio);
        if !points.iter().any(|&p| mismatch_dir_name(p) == name) {
            points.push(ratio);
        }
    }
    points
}

/// 失配点目录名：`ac_<比值>`
pub fn mismatch_dir_name(ratio: f64) -> String {
    format!("ac_{:.2}", ratio)
}

/// 所有扫描参数设为同一个值后的输入卡
pub fn scan_card(template: &Inputcard, paths: &[ParameterPath], value: i64) -> Result<Inputcard> {
    paths.iter().try_fold(template.clone(), |card, path| {
        card.with_override(path, path.scan_value(value))
    })
}

/// 写出一次晶格弛豫的全部输入卡，返回各偏离点目录
///
/// `ratios` 非空时每个偏离点下按 c/a 比值再分一层 `ac_<比值>` 目录
pub fn prepare_relaxation(
    relax_dir: &Path,
    card: &Inputcard,
    deviations: &[f64],
    ratios: &[f64],
    inputcard_name: &str,
) -> Result<Vec<PathBuf>> {
    let a0 = card.lattice_constant();
    let mut dirs = Vec::with_capacity(deviations.len());

    for &dev in deviations {
        let dir = relax_dir.join(deviation_dir_name(dev));
        create_dir(&dir)?;

        let lattice_constant = a0 * (1.0 + dev);
        let point = card.with_lattice_constant(lattice_constant);
        if ratios.is_empty() {
            point.write_to(&dir.join(inputcard_name))?;
            debug!(dir = %dir.display(), lattice_constant, "inputcard written");
        } else {
            prepare_mismatch(&dir, &point, ratios, inputcard_name)?;
        }

        dirs.push(dir);
    }

    Ok(dirs)
}

/// 写出一个晶格点上的 c/a 失配输入卡，返回各失配点目录
pub fn prepare_mismatch(
    point_dir: &Path,
    card: &Inputcard,
    ratios: &[f64],
    inputcard_name: &str,
) -> Result<Vec<PathBuf>> {
    ratios
        .iter()
        .map(|&ratio| {
            let dir = point_dir.join(mismatch_dir_name(ratio));
            create_dir(&dir)?;
            card.with_c_over_a(ratio)?.write_to(&dir.join(inputcard_name))?;
            debug!(dir = %dir.display(), ratio, "mismatch inputcard written");
            Ok(dir)
        })
        .collect()
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| KkrError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })
}

/// `sbatch <script> -p <root> -w <weights> -e <points>`
fn submit(script: &Path, root: &Path, weights: &[String], points: usize) -> Result<String> {
    let command = "sbatch";
    let out = Command::new(command)
        .arg(script)
        .arg("-p")
        .arg(root)
        .arg("-w")
        .arg(weights.join(","))
        .arg("-e")
        .arg(points.to_string())
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => KkrError::CommandNotFound {
                command: command.to_string(),
            },
            _ => KkrError::CommandFailed {
                command: command.to_string(),
                stderr: e.to_string(),
            },
        })?;

    if !out.status.success() {
        return Err(KkrError::CommandFailed {
            command: format!("{} {}", command, script.display()),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn template() -> Inputcard {
        serde_json::from_value(json!({
            "lattice": {
                "lattice-constant": 5.4,
                "alat-unit": "a0",
                "bravais-lattice": [[1.0, 0.0, 0.0], [-0.5, 0.866, 0.0], [0.0, 0.0, 1.6]]
            },
            "energy": { "KMAX": [10, 10, 10], "NPT": 30 },
            "scf-cycle": { "QBOUND": 1e-7 }
        }))
        .unwrap()
    }

    #[test]
    fn test_scan_values() {
        assert_eq!(scan_values(4, 10, 2).unwrap(), vec![4, 6, 8]);
        assert_eq!(scan_values(-2, 1, 1).unwrap(), vec![-2, -1, 0]);
        assert!(scan_values(4, 10, 0).is_err());
        assert!(scan_values(10, 4, 2).is_err());
    }

    #[test]
    fn test_deviations_percent_and_fraction() {
        let pct = deviations(5.0, 5).unwrap();
        let frac = deviations(0.05, 5).unwrap();
        assert_eq!(pct.len(), 5);
        for (a, b) in pct.iter().zip(&frac) {
            assert_relative_eq!(*a, *b, epsilon = 1e-15);
        }
        assert_relative_eq!(pct[0], -0.05, epsilon = 1e-15);
        assert_relative_eq!(pct[4], 0.05, epsilon = 1e-15);

        assert_eq!(deviations(5.0, 1).unwrap(), vec![-0.05]);
        assert!(deviations(5.0, 0).is_err());
        assert!(deviations(-1.0, 5).is_err());
    }

    #[test]
    fn test_deviation_dir_names() {
        let names: Vec<String> = deviations(5.0, 5)
            .unwrap()
            .into_iter()
            .map(deviation_dir_name)
            .collect();
        assert_eq!(names, vec!["m_5.00", "m_2.50", "n", "p_2.50", "p_5.00"]);
        assert_eq!(deviation_dir_name(-0.0125), "m_1.25");
    }

    #[test]
    fn test_scan_card_sets_every_parameter() {
        let paths = vec![
            ParameterPath::parse("energy:KMAX").unwrap(),
            ParameterPath::parse("energy:NPT").unwrap(),
        ];
        let card = scan_card(&template(), &paths, 16).unwrap();

        assert_eq!(card.value_at(&paths[0]), Some(16.0));
        assert_eq!(card.value_at(&paths[1]), Some(16.0));
        let raw = serde_json::to_value(&card).unwrap();
        assert_eq!(raw["energy"]["KMAX"], json!([16, 16, 16]));

        // 模板不被修改
        assert_eq!(template().value_at(&paths[1]), Some(30.0));

        let missing = [ParameterPath::parse("cluster:RCLUSTZ").unwrap()];
        assert!(scan_card(&template(), &missing, 3).is_err());
    }

    #[test]
    fn test_prepare_relaxation_writes_scaled_lattice() {
        let root = tempfile::tempdir().unwrap();
        let relax_dir = root.path().join("conv_16");
        let devs = deviations(5.0, 5).unwrap();

        let dirs = prepare_relaxation(&relax_dir, &template(), &devs, &[], "inputcard.json").unwrap();
        assert_eq!(dirs.len(), 5);

        let low = Inputcard::from_file(&relax_dir.join("m_5.00").join("inputcard.json")).unwrap();
        let mid = Inputcard::from_file(&relax_dir.join("n").join("inputcard.json")).unwrap();
        let high = Inputcard::from_file(&relax_dir.join("p_5.00").join("inputcard.json")).unwrap();
        assert_relative_eq!(low.lattice_constant(), 5.4 * 0.95, epsilon = 1e-12);
        assert_relative_eq!(mid.lattice_constant(), 5.4, epsilon = 1e-12);
        assert_relative_eq!(high.lattice_constant(), 5.4 * 1.05, epsilon = 1e-12);
        assert_eq!(mid.value_at(&ParameterPath::parse("scf-cycle.QBOUND").unwrap()), Some(1e-7));
    }

    #[test]
    fn test_mismatch_dir_names() {
        let ratios = mismatch_ratios(0.5, 2.0, 7).unwrap();
        assert_eq!(ratios, vec![0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0]);

        let names: Vec<String> = mismatch_points(&ratios)
            .into_iter()
            .map(mismatch_dir_name)
            .collect();
        assert_eq!(
            names,
            vec!["ac_1.00", "ac_0.50", "ac_0.75", "ac_1.25", "ac_1.50", "ac_1.75", "ac_2.00"]
        );

        // 不含 1 的区间仍写出未失配点
        assert_eq!(mismatch_points(&[0.9]), vec![1.0, 0.9]);
        assert_eq!(mismatch_ratios(1.2, 1.2, 1).unwrap(), vec![1.2]);
        assert!(mismatch_ratios(0.0, 2.0, 3).is_err());
        assert!(mismatch_ratios(2.0, 0.5, 3).is_err());
        assert!(mismatch_ratios(0.5, 2.0, 0).is_err());
        assert!(ratio_count(2.5).is_err());
        assert_eq!(ratio_count(7.0).unwrap(), 7);
    }

    #[test]
    fn test_mismatch_nested_in_lattice_points() {
        let root = tempfile::tempdir().unwrap();
        let relax_dir = root.path().join("conv_16");
        let devs = deviations(5.0, 3).unwrap();
        let ratios = mismatch_points(&mismatch_ratios(0.5, 1.5, 3).unwrap());

        let dirs = prepare_relaxation(&relax_dir, &template(), &devs, &ratios, "inputcard.json").unwrap();
        assert_eq!(dirs.len(), 3);
        assert!(!relax_dir.join("n").join("inputcard.json").exists());

        for (name, a) in [("m_5.00", 5.4 * 0.95), ("n", 5.4), ("p_5.00", 5.4 * 1.05)] {
            let point = relax_dir.join(name);
            let ac: Vec<Inputcard> = ["ac_1.00", "ac_0.50", "ac_1.50"]
                .iter()
                .map(|d| Inputcard::from_file(&point.join(d).join("inputcard.json")).unwrap())
                .collect();

            for card in &ac {
                assert_relative_eq!(card.lattice_constant(), a, epsilon = 1e-12);
                assert_eq!(card.lattice.extra["bravais-lattice"][0], json!([1.0, 0.0, 0.0]));
            }
            // 每个比值都由未失配的晶格缩放
            assert_eq!(ac[0].lattice.extra["bravais-lattice"][2], json!([0.0, 0.0, 1.6]));
            assert_eq!(ac[1].lattice.extra["bravais-lattice"][2], json!([0.0, 0.0, 0.8]));
            let c = ac[2].lattice.extra["bravais-lattice"][2][2].as_f64().unwrap();
            assert_relative_eq!(c, 2.4, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_script_dir() {
        assert_eq!(script_dir(Path::new("/scratch/fe/kmax")), PathBuf::from("/scratch/fe"));
        assert_eq!(script_dir(Path::new("kmax")), PathBuf::from("."));
    }
}
