//! # 收敛样本存储
//!
//! 从收敛扫描根目录汇总 [`ConvergenceTable`]，并以 `convergence.csv` 缓存：
//! - 缓存存在时直接读取，不做任何失效判断（删除文件即可强制重新汇总）
//! - 否则逐个子目录汇总，全部成功后才写缓存
//!
//! 目录结构：
//! ```text
//! root/
//!   conv_4/           收敛参数的一个取值
//!     m_5.00/ ... n/ ... p_5.00/    晶格偏离点
//!     lat_const_out.csv             平衡晶格常数（缺失时现场拟合）
//!   conv_5/
//!   convergence.csv
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/check.rs` 使用
//! - 使用 `analysis/relaxation.rs`, `models/`, `parsers/point_output.rs`, `utils/dirs.rs`

use crate::analysis::relaxation::relax_directory;
use crate::config::{FileNames, PlotConfig};
use crate::error::{KkrError, Result};
use crate::models::{ConvergenceRecord, ConvergenceTable, EquilibriumPoint, Inputcard, ParameterPath};
use crate::parsers::point_output::{read_fit_result, read_point_output, TOTAL_ENERGY};
use crate::utils::dirs::{list_run_dirs, midpoint_run_dir};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 汇总来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    Cache,
    Aggregated,
}

/// 收敛扫描根目录上的样本存储
#[derive(Debug, Clone)]
pub struct SampleStore<'a> {
    root: PathBuf,
    parameter: ParameterPath,
    files: &'a FileNames,
    plot: Option<&'a PlotConfig>,
}

impl<'a> SampleStore<'a> {
    pub fn new(root: impl Into<PathBuf>, parameter: ParameterPath, files: &'a FileNames) -> Self {
        SampleStore {
            root: root.into(),
            parameter,
            files,
            plot: None,
        }
    }

    /// 需要现场拟合时同时绘制拟合图
    pub fn with_fit_plots(mut self, plot: &'a PlotConfig) -> Self {
        self.plot = Some(plot);
        self
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root.join(&self.files.convergence_table)
    }

    /// 读取缓存，缺失时汇总并写缓存
    pub fn load_or_aggregate(&self) -> Result<(ConvergenceTable, TableSource)> {
        let cache = self.cache_path();
        if cache.exists() {
            info!(path = %cache.display(), "loading cached convergence table");
            return Ok((read_table(&cache)?, TableSource::Cache));
        }

        let table = self.aggregate()?;
        write_table(&cache, &table)?;
        Ok((table, TableSource::Aggregated))
    }

    /// 从子目录汇总（不读写缓存）
    pub fn aggregate(&self) -> Result<ConvergenceTable> {
        let children = list_run_dirs(&self.root)?;
        if children.is_empty() {
            return Err(KkrError::NoCalculations {
                path: self.root.display().to_string(),
            });
        }

        let records = children
            .iter()
            .map(|child| self.collect_child(child))
            .collect::<Result<Vec<_>>>()?;

        ConvergenceTable::new(records)
    }

    fn collect_child(&self, child: &Path) -> Result<ConvergenceRecord> {
        let run = midpoint_run_dir(child)?;
        debug!(child = %child.display(), run = %run.display(), "representative run");

        let card_path = run.join(&self.files.inputcard);
        let card = Inputcard::from_file(&card_path)?;
        let parameter = card
            .value_at(&self.parameter)
            .ok_or_else(|| KkrError::MissingKey {
                key: self.parameter.to_string(),
                path: card_path.display().to_string(),
            })?;

        let output_path = run.join(&self.files.point_output);
        let energy = read_point_output(&output_path)?.require(TOTAL_ENERGY, &output_path)?;

        let structural = self.structural_value(child)?;

        Ok(ConvergenceRecord {
            parameter,
            energy: energy.value,
            energy_unit: energy.unit,
            structural_value: structural.value,
            structural_unit: structural.unit,
        })
    }

    fn structural_value(&self, child: &Path) -> Result<EquilibriumPoint> {
        let fit_path = child.join(&self.files.fit_result);
        if fit_path.exists() {
            return read_fit_result(&fit_path);
        }

        info!(child = %child.display(), "no fit result, running lattice relaxation");
        Ok(relax_directory(child, self.files, self.plot)?.fit.equilibrium)
    }
}

/// 读取 convergence.csv
pub fn read_table(path: &Path) -> Result<ConvergenceTable> {
    let mut rdr = csv::Reader::from_path(path)?;
    let records = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<ConvergenceRecord>, _>>()
        .map_err(|e| KkrError::ParseError {
            format: "convergence table".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    ConvergenceTable::new(records)
}

/// 写出 convergence.csv
pub fn write_table(path: &Path, table: &ConvergenceTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in table.records() {
        wtr.serialize(record)?;
    }
    wtr.flush().map_err(|e| KkrError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parsers::point_output::{write_fit_result, write_point_output, PointRow};
    use crate::models::Quantity;
    use serde_json::json;
    use std::fs;

    fn write_card(dir: &Path, kmax: i64, lat: f64) {
        let card = json!({
            "lattice": { "lattice-constant": lat },
            "energy": { "KMAX": [kmax, kmax, kmax] }
        });
        fs::write(dir.join("inputcard.json"), card.to_string()).unwrap();
    }

    /// 一个收敛参数取值的子目录，带现成的平衡晶格常数
    fn make_child(root: &Path, kmax: i64, energy: f64, structural: f64) {
        let child = root.join(format!("conv_{}", kmax));
        for (name, lat) in [("m_5.00", 5.13), ("n", 5.4), ("p_5.00", 5.67)] {
            let run = child.join(name);
            fs::create_dir_all(&run).unwrap();
            write_card(&run, kmax, lat);
            write_point_output(
                &run.join("output.csv"),
                &[
                    PointRow::new("lat_const", Some(lat), "a0"),
                    PointRow::new("e_tot", Some(energy), "Ry"),
                ],
            )
            .unwrap();
        }
        write_fit_result(&child.join("lat_const_out.csv"), &Quantity::new(structural, "a0")).unwrap();
    }

    fn kmax() -> ParameterPath {
        ParameterPath::parse("energy:KMAX").unwrap()
    }

    #[test]
    fn test_aggregate_reads_midpoint_runs() {
        let root = tempfile::tempdir().unwrap();
        make_child(root.path(), 6, -100.002, 5.402);
        make_child(root.path(), 4, -100.0, 5.40);
        make_child(root.path(), 10, -100.003, 5.403);

        let files = FileNames::default();
        let store = SampleStore::new(root.path(), kmax(), &files);
        let (table, source) = store.load_or_aggregate().unwrap();

        assert_eq!(source, TableSource::Aggregated);
        let params: Vec<f64> = table.records().iter().map(|r| r.parameter).collect();
        assert_eq!(params, vec![4.0, 6.0, 10.0]);
        assert_eq!(table.records()[1].energy, -100.002);
        assert_eq!(table.records()[1].structural_value, 5.402);
        assert_eq!(table.energy_unit(), Some("Ry"));
        assert!(store.cache_path().exists());
    }

    #[test]
    fn test_cache_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        make_child(root.path(), 4, -100.0, 5.40);
        make_child(root.path(), 6, -100.002, 5.402);

        let files = FileNames::default();
        let store = SampleStore::new(root.path(), kmax(), &files);
        let (first, _) = store.load_or_aggregate().unwrap();
        let bytes = fs::read(store.cache_path()).unwrap();

        let (second, source) = store.load_or_aggregate().unwrap();
        assert_eq!(source, TableSource::Cache);
        assert_eq!(first, second);
        assert_eq!(fs::read(store.cache_path()).unwrap(), bytes);
    }

    #[test]
    fn test_missing_output_writes_no_cache() {
        let root = tempfile::tempdir().unwrap();
        make_child(root.path(), 4, -100.0, 5.40);
        make_child(root.path(), 6, -100.002, 5.402);
        fs::remove_file(root.path().join("conv_6").join("n").join("output.csv")).unwrap();

        let files = FileNames::default();
        let store = SampleStore::new(root.path(), kmax(), &files);
        let err = store.load_or_aggregate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert!(!store.cache_path().exists());
    }

    #[test]
    fn test_missing_parameter_key() {
        let root = tempfile::tempdir().unwrap();
        make_child(root.path(), 4, -100.0, 5.40);

        let files = FileNames::default();
        let path = ParameterPath::parse("energy:NPT").unwrap();
        let err = SampleStore::new(root.path(), path, &files).aggregate().unwrap_err();
        assert!(matches!(err, KkrError::MissingKey { .. }));
    }

    #[test]
    fn test_child_without_runs() {
        let root = tempfile::tempdir().unwrap();
        make_child(root.path(), 4, -100.0, 5.40);
        fs::create_dir(root.path().join("conv_8")).unwrap();

        let files = FileNames::default();
        let err = SampleStore::new(root.path(), kmax(), &files).aggregate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }
}
