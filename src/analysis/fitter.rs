//! # 平衡晶格常数拟合
//!
//! 对 E(x) 样本做三次多项式最小二乘拟合
//! `E(x) = a0 + a1·x + a2·x² + a3·x³`，再从中位下标样本出发做局部极小化，
//! 得到平衡点。
//!
//! 拟合在归一化变量 `t = (x - c) / s` 中进行（`c` 为样本均值，`s` 为最大
//! 偏离），晶格常数在 5 a0 附近、总能在 -10⁴ Ry 量级时，直接用单项式
//! 基会严重病态。
//!
//! ## 依赖关系
//! - 被 `analysis/relaxation.rs` 使用
//! - 使用 `models/sample.rs`
//! - 使用 `nalgebra` (SVD 最小二乘)

use crate::error::{KkrError, Result};
use crate::models::{EquilibriumPoint, Quantity, SampleTable};

use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// 三次多项式的系数个数
pub const CUBIC_TERMS: usize = 4;

/// 奇异值比低于该值视为秩亏
const RANK_TOLERANCE: f64 = 1e-12;

const MAX_ITERATIONS: usize = 200;

/// 单步最大步长（归一化单位）
const MAX_STEP: f64 = 0.5;

/// 迭代离开样本区间这么多倍即判为发散
const DIVERGENCE_LIMIT: f64 = 50.0;

/// 归一化变量中的三次多项式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicFit {
    center: f64,
    scale: f64,
    /// 关于 t 的系数 b0..b3
    normalized: [f64; CUBIC_TERMS],
}

impl CubicFit {
    /// E(x)
    pub fn eval(&self, x: f64) -> f64 {
        self.eval_t(self.to_t(x))
    }

    /// d²E/dx²
    pub fn second_derivative(&self, x: f64) -> f64 {
        self.d2_t(self.to_t(x)) / (self.scale * self.scale)
    }

    /// 单项式基下的系数 [a0, a1, a2, a3]
    pub fn coefficients(&self) -> [f64; CUBIC_TERMS] {
        // ((x - c) / s)^k = s^-k Σ_j C(k, j) x^j (-c)^(k-j)
        const BINOMIAL: [[f64; CUBIC_TERMS]; CUBIC_TERMS] = [
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 0.0],
            [1.0, 2.0, 1.0, 0.0],
            [1.0, 3.0, 3.0, 1.0],
        ];

        let mut coefficients = [0.0; CUBIC_TERMS];
        for (k, b) in self.normalized.iter().enumerate() {
            let factor = b / self.scale.powi(k as i32);
            for (j, a) in coefficients.iter_mut().enumerate().take(k + 1) {
                *a += factor * BINOMIAL[k][j] * (-self.center).powi((k - j) as i32);
            }
        }
        coefficients
    }

    /// 在给定区间内均匀取点，用于绘制拟合曲线
    pub fn sample_curve(&self, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
        if n < 2 {
            return vec![(x_min, self.eval(x_min))];
        }
        let step = (x_max - x_min) / (n - 1) as f64;
        (0..n)
            .map(|i| {
                let x = x_min + step * i as f64;
                (x, self.eval(x))
            })
            .collect()
    }

    fn to_t(&self, x: f64) -> f64 {
        (x - self.center) / self.scale
    }

    fn eval_t(&self, t: f64) -> f64 {
        let [b0, b1, b2, b3] = self.normalized;
        b0 + t * (b1 + t * (b2 + t * b3))
    }

    fn d1_t(&self, t: f64) -> f64 {
        let [_, b1, b2, b3] = self.normalized;
        b1 + t * (2.0 * b2 + t * 3.0 * b3)
    }

    fn d2_t(&self, t: f64) -> f64 {
        let [_, _, b2, b3] = self.normalized;
        2.0 * b2 + 6.0 * b3 * t
    }
}

/// 三次多项式最小二乘拟合
pub fn fit_cubic(points: &[(f64, f64)]) -> Result<CubicFit> {
    if points.len() < CUBIC_TERMS {
        return Err(KkrError::InsufficientSamples {
            needed: CUBIC_TERMS,
            found: points.len(),
        });
    }

    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(KkrError::FitFailed("non-finite sample".to_string()));
    }

    let n = points.len();
    let center = points.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let scale = points
        .iter()
        .map(|(x, _)| (x - center).abs())
        .fold(0.0, f64::max);

    if scale == 0.0 {
        return Err(KkrError::FitFailed(
            "all samples share the same parameter value".to_string(),
        ));
    }

    let design = DMatrix::from_fn(n, CUBIC_TERMS, |i, j| {
        ((points[i].0 - center) / scale).powi(j as i32)
    });
    let rhs = DVector::from_iterator(n, points.iter().map(|(_, y)| *y));

    let svd = design.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if s_min <= s_max * RANK_TOLERANCE {
        return Err(KkrError::FitFailed(format!(
            "design matrix is rank deficient (singular values {:.3e} .. {:.3e})",
            s_min, s_max
        )));
    }

    let solution = svd
        .solve(&rhs, 0.0)
        .map_err(|e| KkrError::FitFailed(e.to_string()))?;

    let mut normalized = [0.0; CUBIC_TERMS];
    for (b, s) in normalized.iter_mut().zip(solution.iter()) {
        *b = *s;
    }
    if normalized.iter().any(|b| !b.is_finite()) {
        return Err(KkrError::FitFailed("non-finite coefficients".to_string()));
    }

    Ok(CubicFit {
        center,
        scale,
        normalized,
    })
}

/// 从 `seed` 出发局部极小化拟合多项式，返回极小点的 x。
///
/// 曲率为正时取 Newton 步，否则沿下降方向走一个最大步长并回溯，直到函数值
/// 不升高。
pub fn minimize(fit: &CubicFit, seed: f64) -> Result<f64> {
    let [_, b1, b2, b3] = fit.normalized;
    let gradient_tol = 1e-12 * (b1.abs() + b2.abs() + b3.abs()).max(f64::MIN_POSITIVE);

    let mut t = fit.to_t(seed);

    for iteration in 0..MAX_ITERATIONS {
        let g = fit.d1_t(t);
        let h = fit.d2_t(t);

        if g.abs() <= gradient_tol {
            if h > 0.0 {
                debug!(iteration, t, "minimization converged");
                return Ok(fit.center + fit.scale * t);
            }
            return Err(KkrError::MinimizationFailed(format!(
                "stationary point at {} is not a minimum",
                fit.center + fit.scale * t
            )));
        }

        let raw_step = if h > 0.0 { -g / h } else { -g.signum() * MAX_STEP };
        let step = raw_step.clamp(-MAX_STEP, MAX_STEP);

        // 曲率为正且未截断的 Newton 步不会越过极小点，不回溯
        let mut alpha = 1.0;
        if h <= 0.0 || raw_step.abs() > MAX_STEP {
            let f0 = fit.eval_t(t);
            while fit.eval_t(t + alpha * step) > f0 && alpha > 1e-12 {
                alpha *= 0.5;
            }
        }

        let t_next = t + alpha * step;
        if t_next.abs() > DIVERGENCE_LIMIT {
            return Err(KkrError::MinimizationFailed(
                "iteration diverged, fitted cubic has no local minimum near the samples"
                    .to_string(),
            ));
        }

        // 步长已到机器精度，按曲率判断是否为极小
        if (t_next - t).abs() <= f64::EPSILON * t.abs().max(1.0) {
            if fit.d2_t(t_next) > 0.0 {
                return Ok(fit.center + fit.scale * t_next);
            }
            return Err(KkrError::MinimizationFailed(
                "iteration stalled away from a minimum".to_string(),
            ));
        }

        t = t_next;
    }

    Err(KkrError::MinimizationFailed(format!(
        "no convergence after {} iterations",
        MAX_ITERATIONS
    )))
}

/// 平衡点拟合结果
#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumFit {
    pub polynomial: CubicFit,
    /// 极小化起点（中位下标样本的参数）
    pub seed: f64,
    pub equilibrium: EquilibriumPoint,
    /// 平衡点处的拟合能量
    pub energy: Quantity,
}

/// 由能量-晶格常数扫描求平衡晶格常数
pub fn find_equilibrium(scan: &SampleTable) -> Result<EquilibriumFit> {
    if scan.is_empty() {
        return Err(KkrError::EmptyTable);
    }
    let polynomial = fit_cubic(&scan.points())?;

    // 中位下标，而非中位数值
    let seed = scan.samples()[scan.len() / 2].parameter;
    let x_min = minimize(&polynomial, seed)?;

    debug!(seed, equilibrium = x_min, "equilibrium found");

    Ok(EquilibriumFit {
        polynomial,
        seed,
        equilibrium: Quantity::new(x_min, scan.parameter_unit()),
        energy: Quantity::new(
            polynomial.eval(x_min),
            scan.observable_unit().unwrap_or_default(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::Sample;
    use approx::assert_relative_eq;

    fn cubic(a: [f64; 4], x: f64) -> f64 {
        a[0] + a[1] * x + a[2] * x * x + a[3] * x * x * x
    }

    #[test]
    fn test_fit_recovers_exact_cubic() {
        // p'(x) = (x - 1)(x - 3)，极小点 x = 3
        let a = [1.0, 3.0, -2.0, 1.0 / 3.0];
        let xs = [2.0, 2.4, 2.9, 3.3, 3.6, 4.1];
        let points: Vec<(f64, f64)> = xs.iter().map(|&x| (x, cubic(a, x))).collect();

        let fit = fit_cubic(&points).unwrap();
        for (fitted, exact) in fit.coefficients().iter().zip(a.iter()) {
            assert_relative_eq!(fitted, exact, epsilon = 1e-9, max_relative = 1e-9);
        }

        let x_min = minimize(&fit, 3.3).unwrap();
        assert_relative_eq!(x_min, 3.0, epsilon = 1e-8);
        assert!(fit.second_derivative(x_min) > 0.0);
    }

    #[test]
    fn test_equilibrium_lattice_constant() {
        // E = E0 + B (a - a0)² + C (a - a0)³，平衡点 a0
        let (e0, a0, b, c) = (-13325.56, 5.41, 0.8, -0.3);
        let samples: Vec<Sample> = [5.20, 5.30, 5.35, 5.40, 5.45, 5.50, 5.60]
            .iter()
            .map(|&a| {
                let d = a - a0;
                Sample::new(a, e0 + b * d * d + c * d * d * d, "Ry")
            })
            .collect();
        let scan = SampleTable::new("a0", samples).unwrap();

        let result = find_equilibrium(&scan).unwrap();
        assert_eq!(result.seed, 5.40);
        assert_relative_eq!(result.equilibrium.value, a0, epsilon = 1e-4);
        assert_eq!(result.equilibrium.unit, "a0");
        assert_relative_eq!(result.energy.value, e0, epsilon = 1e-6);
        assert_eq!(result.energy.unit, "Ry");
    }

    #[test]
    fn test_seed_is_median_index_not_median_value() {
        let samples: Vec<Sample> = [1.0, 1.1, 1.2, 4.0, 9.0]
            .iter()
            .map(|&x| Sample::new(x, (x - 2.0) * (x - 2.0), "Ry"))
            .collect();
        let scan = SampleTable::new("a0", samples).unwrap();

        let result = find_equilibrium(&scan).unwrap();
        assert_eq!(result.seed, 1.2);
        assert_relative_eq!(result.equilibrium.value, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_scan_is_rejected() {
        let scan = SampleTable::new("a0", Vec::new()).unwrap();
        let err = find_equilibrium(&scan).unwrap_err();
        assert!(matches!(err, KkrError::EmptyTable));
    }

    #[test]
    fn test_too_few_samples() {
        let err = fit_cubic(&[(1.0, 1.0), (2.0, 0.5), (3.0, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            KkrError::InsufficientSamples {
                needed: 4,
                found: 3
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Fit);
    }

    #[test]
    fn test_rank_deficient_fit() {
        let points = [(1.0, 1.0), (1.0, 1.1), (2.0, 0.5), (2.0, 0.4)];
        let err = fit_cubic(&points).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fit);
    }

    #[test]
    fn test_monotonic_data_has_no_minimum() {
        let points: Vec<(f64, f64)> = (0..6).map(|i| (i as f64, -2.0 * i as f64)).collect();
        let fit = fit_cubic(&points).unwrap();

        let err = minimize(&fit, 3.0).unwrap_err();
        assert!(matches!(err, KkrError::MinimizationFailed(_)));
    }
}
