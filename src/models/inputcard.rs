//! # 输入卡 (inputcard.json) 数据模型
//!
//! KKR 输入参数的 JSON 表示。晶格部分强类型化（晶格弛豫需要修改晶格常数），
//! 其余各节 (`general`, `cluster`, `energy-contour`, `scf-cycle`, ...) 原样保留。
//!
//! 每个扫描点都由模板加一个改动构造出新的值
//! ([`Inputcard::with_lattice_constant`], [`Inputcard::with_override`],
//! [`Inputcard::with_c_over_a`])，模板本身不被修改。
//!
//! ## 依赖关系
//! - 被 `analysis/store.rs`, `commands/prepare.rs`, `commands/extract.rs` 使用
//! - 使用 `serde_json`

use crate::error::{KkrError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 晶格常数的键路径
pub const LATTICE_CONSTANT_KEY: &str = "lattice.lattice-constant";

/// Bravais 矢量的键路径（三行，每行一个矢量）
pub const BRAVAIS_LATTICE_KEY: &str = "lattice.bravais-lattice";

/// 以 3 元组形式写入的键
const TRIPLE_KEYS: [&str; 2] = ["KMIN", "KMAX"];

/// 输入卡
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inputcard {
    pub lattice: LatticeSection,

    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

/// 晶格描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeSection {
    /// 数字或数字字符串
    #[serde(rename = "lattice-constant", deserialize_with = "number_or_string")]
    pub lattice_constant: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 输入卡中的键路径，如 `lattice.lattice-constant` 或 `cluster:RCLUSTZ`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPath {
    segments: Vec<String>,
}

impl ParameterPath {
    /// 解析键路径（`.` 或 `:` 分隔）
    pub fn parse(s: &str) -> Result<Self> {
        let segments: Vec<String> = s
            .split(['.', ':'])
            .map(|seg| seg.trim().to_string())
            .collect();

        if segments.len() < 2 || segments.iter().any(|seg| seg.is_empty()) {
            return Err(KkrError::InvalidArgument(format!(
                "Invalid parameter path '{}', expected <section>.<key>",
                s
            )));
        }

        Ok(ParameterPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 最后一级键名
    pub fn key(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_lattice_constant(&self) -> bool {
        self.to_string() == LATTICE_CONSTANT_KEY
    }

    /// 扫描值的 JSON 表示，k 点网格 (KMIN/KMAX) 写为三元组
    pub fn scan_value(&self, value: i64) -> Value {
        if TRIPLE_KEYS.contains(&self.key()) {
            Value::from(vec![value; 3])
        } else {
            Value::from(value)
        }
    }
}

impl std::fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl Inputcard {
    /// 从 JSON 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KkrError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| KkrError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| KkrError::ParseError {
            format: "inputcard".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// 写出为 JSON 文件
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| KkrError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn lattice_constant(&self) -> f64 {
        self.lattice.lattice_constant
    }

    /// 取键路径对应的数值；若为列表取第一个元素
    pub fn value_at(&self, path: &ParameterPath) -> Option<f64> {
        let root = serde_json::to_value(self).ok()?;
        let mut node = &root;
        for seg in path.segments() {
            node = node.get(seg.as_str())?;
        }

        match node {
            Value::Array(items) => items.first().and_then(as_number),
            other => as_number(other),
        }
    }

    /// 返回晶格常数替换后的新输入卡
    pub fn with_lattice_constant(&self, lattice_constant: f64) -> Inputcard {
        Inputcard {
            lattice: LatticeSection {
                lattice_constant,
                extra: self.lattice.extra.clone(),
            },
            sections: self.sections.clone(),
        }
    }

    /// 返回键路径处设为 `value` 后的新输入卡。
    ///
    /// 所在节必须已存在，节内缺失的键会被新增。
    pub fn with_override(&self, path: &ParameterPath, value: Value) -> Result<Inputcard> {
        if path.is_lattice_constant() {
            let a = as_number(&value).ok_or_else(|| {
                KkrError::InvalidArgument(format!("Lattice constant must be a number, got {}", value))
            })?;
            return Ok(self.with_lattice_constant(a));
        }

        let mut root = serde_json::to_value(self)?;
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| KkrError::InvalidArgument(path.to_string()))?;

        let mut node = &mut root;
        for seg in parents {
            node = node.get_mut(seg.as_str()).ok_or_else(|| KkrError::MissingKey {
                key: path.to_string(),
                path: "inputcard template".to_string(),
            })?;
        }

        let section = node.as_object_mut().ok_or_else(|| {
            KkrError::InvalidArgument(format!("'{}' does not address a section", path))
        })?;
        section.insert(last.clone(), value);

        Ok(serde_json::from_value(root)?)
    }

    /// 返回 c/a 失配后的新输入卡：第三个 Bravais 矢量乘以 `ratio`，
    /// 面内两个矢量与晶格常数不变
    pub fn with_c_over_a(&self, ratio: f64) -> Result<Inputcard> {
        let path = ParameterPath::parse(BRAVAIS_LATTICE_KEY)?;
        let raw = self
            .lattice
            .extra
            .get("bravais-lattice")
            .cloned()
            .ok_or_else(|| KkrError::MissingKey {
                key: BRAVAIS_LATTICE_KEY.to_string(),
                path: "inputcard template".to_string(),
            })?;

        let mut vectors: Vec<[f64; 3]> = serde_json::from_value(raw).map_err(|e| {
            KkrError::InvalidArgument(format!("'{}' must be three 3-vectors: {}", path, e))
        })?;
        if vectors.len() != 3 {
            return Err(KkrError::InvalidArgument(format!(
                "'{}' must be three 3-vectors, got {}",
                path,
                vectors.len()
            )));
        }

        for component in vectors[2].iter_mut() {
            *component *= ratio;
        }
        self.with_override(&path, serde_json::to_value(vectors)?)
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    as_number(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Inputcard {
        serde_json::from_value(json!({
            "lattice": {
                "lattice-constant": 5.4,
                "bravais-lattice": [[0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]],
                "CARTESIAN": "T"
            },
            "cluster": { "RCLUSTZ": 1.5, "KMIN": [4, 4, 4] },
            "scf-cycle": { "NSTEPS": 100, "QBOUND": 1e-7 }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_parameter_path() {
        let p = ParameterPath::parse("lattice:lattice-constant").unwrap();
        assert!(p.is_lattice_constant());
        assert_eq!(p.to_string(), LATTICE_CONSTANT_KEY);

        let p = ParameterPath::parse("scf-cycle.QBOUND").unwrap();
        assert_eq!(p.key(), "QBOUND");

        assert!(ParameterPath::parse("lattice").is_err());
        assert!(ParameterPath::parse("lattice.").is_err());
    }

    #[test]
    fn test_value_at() {
        let card = template();
        let qbound = ParameterPath::parse("scf-cycle.QBOUND").unwrap();
        assert_eq!(card.value_at(&qbound), Some(1e-7));

        // 列表取第一个元素
        let kmin = ParameterPath::parse("cluster.KMIN").unwrap();
        assert_eq!(card.value_at(&kmin), Some(4.0));

        let missing = ParameterPath::parse("cluster.RCLUSTXY").unwrap();
        assert_eq!(card.value_at(&missing), None);
    }

    #[test]
    fn test_with_override_leaves_template_untouched() {
        let card = template();
        let kmax = ParameterPath::parse("cluster:KMAX").unwrap();

        let point = card.with_override(&kmax, kmax.scan_value(12)).unwrap();
        assert_eq!(point.value_at(&kmax), Some(12.0));
        assert_eq!(point.sections["cluster"]["KMAX"], json!([12, 12, 12]));
        assert_eq!(card.value_at(&kmax), None);

        let lat = ParameterPath::parse(LATTICE_CONSTANT_KEY).unwrap();
        let scaled = card.with_override(&lat, json!(5.6)).unwrap();
        assert_eq!(scaled.lattice_constant(), 5.6);
        assert_eq!(card.lattice_constant(), 5.4);
        assert_eq!(scaled.lattice.extra["CARTESIAN"], json!("T"));
    }

    #[test]
    fn test_string_lattice_constant() {
        let card: Inputcard = serde_json::from_value(json!({
            "lattice": { "lattice-constant": " 5.4 " }
        }))
        .unwrap();
        assert_eq!(card.lattice_constant(), 5.4);

        // 写出时为数字
        let raw = serde_json::to_value(&card).unwrap();
        assert_eq!(raw["lattice"]["lattice-constant"], json!(5.4));

        let bad = serde_json::from_value::<Inputcard>(json!({
            "lattice": { "lattice-constant": "a0" }
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_c_over_a_scales_third_vector() {
        let card = template();
        let stretched = card.with_c_over_a(1.5).unwrap();
        assert_eq!(
            stretched.lattice.extra["bravais-lattice"],
            json!([[0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.75, 0.75, 0.0]])
        );
        assert_eq!(stretched.lattice_constant(), 5.4);
        assert_eq!(stretched.lattice.extra["CARTESIAN"], json!("T"));

        // 模板不被修改
        assert_eq!(card.lattice.extra["bravais-lattice"][2], json!([0.5, 0.5, 0.0]));
    }

    #[test]
    fn test_c_over_a_requires_bravais_lattice() {
        let card: Inputcard = serde_json::from_value(json!({
            "lattice": { "lattice-constant": 5.4 }
        }))
        .unwrap();
        assert!(matches!(card.with_c_over_a(1.2), Err(KkrError::MissingKey { .. })));

        let flat: Inputcard = serde_json::from_value(json!({
            "lattice": { "lattice-constant": 5.4, "bravais-lattice": [[1.0, 0.0, 0.0]] }
        }))
        .unwrap();
        assert!(matches!(flat.with_c_over_a(1.2), Err(KkrError::InvalidArgument(_))));
    }

    #[test]
    fn test_with_override_unknown_section() {
        let card = template();
        let path = ParameterPath::parse("energy-contour.NPOL").unwrap();
        assert!(card.with_override(&path, json!(7)).is_err());
    }
}
