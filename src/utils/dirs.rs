//! # 计算目录遍历
//!
//! 列出扫描根目录下的子计算目录（只列目录，不递归，按名称排序）。
//!
//! ## 依赖关系
//! - 被 `analysis/store.rs`, `analysis/relaxation.rs` 使用
//! - 使用 `walkdir` 遍历目录

use crate::error::{KkrError, Result};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 按名称排序列出 `root` 的直接子目录
pub fn list_run_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(KkrError::DirectoryNotFound {
            path: root.display().to_string(),
        });
    }

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| KkrError::FileReadError {
            path: root.display().to_string(),
            source: e.into(),
        })?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    Ok(dirs)
}

/// 排序后位于中点的子目录（下标 `len / 2`）
pub fn midpoint_run_dir(root: &Path) -> Result<PathBuf> {
    let mut dirs = list_run_dirs(root)?;
    if dirs.is_empty() {
        return Err(KkrError::NoCalculations {
            path: root.display().to_string(),
        });
    }
    let mid = dirs.len() / 2;
    Ok(dirs.swap_remove(mid))
}
