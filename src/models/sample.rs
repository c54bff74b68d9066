//! # 扫描样本数据模型
//!
//! 收敛测试与晶格弛豫共用的数据结构：
//! - [`Quantity`]: 带单位的数值（平衡晶格常数亦使用此类型）
//! - [`SampleTable`]: 能量-晶格常数扫描 (E-V 曲线)
//! - [`ConvergenceTable`]: 收敛参数 → (总能, 平衡晶格常数)
//!
//! 两种表构造时即按参数升序排列，并检查参数唯一性与单位一致性。
//!
//! ## 依赖关系
//! - 被 `analysis/`, `parsers/`, `report/` 使用
//! - 使用 `error.rs`

use crate::error::{KkrError, Result};
use serde::{Deserialize, Serialize};

/// 带单位的数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Quantity {
            value,
            unit: unit.into(),
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// 平衡点：拟合能量曲线的极小值位置
pub type EquilibriumPoint = Quantity;

/// 单个扫描点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub parameter: f64,
    pub observable: f64,
    pub observable_unit: String,
}

impl Sample {
    pub fn new(parameter: f64, observable: f64, observable_unit: impl Into<String>) -> Self {
        Sample {
            parameter,
            observable,
            observable_unit: observable_unit.into(),
        }
    }
}

/// 按参数升序排列的样本表
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    parameter_unit: String,
    samples: Vec<Sample>,
}

impl SampleTable {
    /// 构造样本表（排序并校验）
    pub fn new(parameter_unit: impl Into<String>, mut samples: Vec<Sample>) -> Result<Self> {
        samples.sort_by(|a, b| a.parameter.total_cmp(&b.parameter));

        check_unique(samples.iter().map(|s| s.parameter))?;
        check_units("observable", samples.iter().map(|s| s.observable_unit.as_str()))?;

        Ok(SampleTable {
            parameter_unit: parameter_unit.into(),
            samples,
        })
    }

    pub fn parameter_unit(&self) -> &str {
        &self.parameter_unit
    }

    /// 观测量单位（空表返回 None）
    pub fn observable_unit(&self) -> Option<&str> {
        self.samples.first().map(|s| s.observable_unit.as_str())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// (参数, 观测量) 点对
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| (s.parameter, s.observable))
            .collect()
    }
}

/// 收敛表中的一行，字段名即 `convergence.csv` 的列名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRecord {
    pub parameter: f64,
    pub energy: f64,
    pub energy_unit: String,
    pub structural_value: f64,
    pub structural_unit: String,
}

/// 收敛参数扫描结果表
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvergenceTable {
    records: Vec<ConvergenceRecord>,
}

impl ConvergenceTable {
    /// 构造收敛表（排序并校验）
    pub fn new(mut records: Vec<ConvergenceRecord>) -> Result<Self> {
        records.sort_by(|a, b| a.parameter.total_cmp(&b.parameter));

        check_unique(records.iter().map(|r| r.parameter))?;
        check_units("energy", records.iter().map(|r| r.energy_unit.as_str()))?;
        check_units(
            "structural value",
            records.iter().map(|r| r.structural_unit.as_str()),
        )?;

        Ok(ConvergenceTable { records })
    }

    pub fn records(&self) -> &[ConvergenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn energy_unit(&self) -> Option<&str> {
        self.records.first().map(|r| r.energy_unit.as_str())
    }

    pub fn structural_unit(&self) -> Option<&str> {
        self.records.first().map(|r| r.structural_unit.as_str())
    }

    /// (参数, 总能) 点对
    pub fn energy_points(&self) -> Vec<(f64, f64)> {
        self.records.iter().map(|r| (r.parameter, r.energy)).collect()
    }

    /// (参数, 结构量) 点对
    pub fn structural_points(&self) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .map(|r| (r.parameter, r.structural_value))
            .collect()
    }
}

/// 已排序序列中相邻参数相等即为重复
fn check_unique(parameters: impl Iterator<Item = f64>) -> Result<()> {
    let mut previous: Option<f64> = None;
    for p in parameters {
        if previous == Some(p) {
            return Err(KkrError::DuplicateParameter { parameter: p });
        }
        previous = Some(p);
    }
    Ok(())
}

fn check_units<'a>(quantity: &str, mut units: impl Iterator<Item = &'a str>) -> Result<()> {
    let Some(expected) = units.next() else {
        return Ok(());
    };
    for found in units {
        if found != expected {
            return Err(KkrError::UnitMismatch {
                quantity: quantity.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(parameter: f64, energy_unit: &str, structural_unit: &str) -> ConvergenceRecord {
        ConvergenceRecord {
            parameter,
            energy: -100.0,
            energy_unit: energy_unit.to_string(),
            structural_value: 5.4,
            structural_unit: structural_unit.to_string(),
        }
    }

    #[test]
    fn test_convergence_table_sorted() {
        let table = ConvergenceTable::new(vec![
            record(30.0, "Ry", "a0"),
            record(10.0, "Ry", "a0"),
            record(20.0, "Ry", "a0"),
        ])
        .unwrap();

        let params: Vec<f64> = table.records().iter().map(|r| r.parameter).collect();
        assert_eq!(params, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_duplicate_parameter_is_data_error() {
        let err = ConvergenceTable::new(vec![record(10.0, "Ry", "a0"), record(10.0, "Ry", "a0")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn test_unit_mismatch_is_config_error() {
        let err = ConvergenceTable::new(vec![record(10.0, "Ry", "a0"), record(20.0, "eV", "a0")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ConvergenceTable::new(vec![record(10.0, "Ry", "a0"), record(20.0, "Ry", "Ang")])
            .unwrap_err();
        assert!(matches!(err, KkrError::UnitMismatch { .. }));

        let err = SampleTable::new(
            "a0",
            vec![Sample::new(5.3, -1.0, "Ry"), Sample::new(5.4, -1.1, "eV")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_sample_table_points() {
        let table = SampleTable::new(
            "a0",
            vec![Sample::new(5.5, -2.0, "Ry"), Sample::new(5.3, -1.0, "Ry")],
        )
        .unwrap();
        assert_eq!(table.points(), vec![(5.3, -1.0), (5.5, -2.0)]);
        assert_eq!(table.observable_unit(), Some("Ry"));
        assert_eq!(table.parameter_unit(), "a0");
    }
}
