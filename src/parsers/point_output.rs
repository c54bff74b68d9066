//! # 单点计算结果文件
//!
//! 读写每个计算点的结果表和晶格弛豫结果：
//! - `output.csv`: `quantity,value,unit`，行名 `lat_const` / `e_fermi` / `e_tot`
//! - `lat_const_out.csv`: `value,unit`，仅一行
//!
//! ## 依赖关系
//! - 被 `analysis/store.rs`, `analysis/fitter.rs`, `commands/extract.rs` 使用
//! - 使用 `csv` + `serde`

use crate::error::{KkrError, Result};
use crate::models::{EquilibriumPoint, Quantity};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const LATTICE_CONSTANT: &str = "lat_const";
pub const FERMI_ENERGY: &str = "e_fermi";
pub const TOTAL_ENERGY: &str = "e_tot";

/// output.csv 中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRow {
    pub quantity: String,
    pub value: Option<f64>,
    pub unit: String,
}

impl PointRow {
    pub fn new(quantity: &str, value: Option<f64>, unit: &str) -> Self {
        PointRow {
            quantity: quantity.to_string(),
            value,
            unit: unit.to_string(),
        }
    }
}

/// 单个计算点的结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointOutput {
    quantities: BTreeMap<String, Quantity>,
}

impl PointOutput {
    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.quantities.get(name)
    }

    /// 取必需的量，缺失时报告文件路径
    pub fn require(&self, name: &str, path: &Path) -> Result<Quantity> {
        self.get(name).cloned().ok_or_else(|| KkrError::MissingQuantity {
            quantity: name.to_string(),
            path: path.display().to_string(),
        })
    }
}

/// 读取 output.csv
pub fn read_point_output(path: &Path) -> Result<PointOutput> {
    if !path.exists() {
        return Err(KkrError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let mut rdr = csv::Reader::from_path(path)?;
    let mut quantities = BTreeMap::new();

    for row in rdr.deserialize() {
        let row: PointRow = row.map_err(|e| KkrError::ParseError {
            format: "output.csv".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // 空值（如未解析到费米能）视为缺失
        if let Some(value) = row.value {
            quantities.insert(row.quantity, Quantity::new(value, row.unit));
        }
    }

    Ok(PointOutput { quantities })
}

/// 写出 output.csv
pub fn write_point_output(path: &Path, rows: &[PointRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| KkrError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 读取晶格弛豫结果 lat_const_out.csv
pub fn read_fit_result(path: &Path) -> Result<EquilibriumPoint> {
    let mut rdr = csv::Reader::from_path(path)?;
    let first = rdr.deserialize::<EquilibriumPoint>().next().ok_or_else(|| KkrError::ParseError {
        format: "lat_const_out.csv".to_string(),
        path: path.display().to_string(),
        reason: "no data row".to_string(),
    })?;

    first.map_err(|e| KkrError::ParseError {
        format: "lat_const_out.csv".to_string(),
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// 写出晶格弛豫结果
pub fn write_fit_result(path: &Path, point: &EquilibriumPoint) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.serialize(point)?;
    wtr.flush().map_err(|e| KkrError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
