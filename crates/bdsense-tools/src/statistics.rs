//! 采样聚合与精度统计
//!
//! 采样聚合供逐点探测使用：均值按轴算术平均；中位数按 z 排序
//! 取中间样本，偶数个样本时取中间两个样本的按轴平均。精度
//! 统计对应 N 次采样的精度报告。

use serde::{Deserialize, Serialize};

use crate::position::Position3D;

/// 按轴算术平均
///
/// 空切片返回 `None`。
pub fn mean_position(positions: &[Position3D]) -> Option<Position3D> {
    if positions.is_empty() {
        return None;
    }
    let count = positions.len() as f64;
    Some(Position3D {
        x: positions.iter().map(|p| p.x).sum::<f64>() / count,
        y: positions.iter().map(|p| p.y).sum::<f64>() / count,
        z: positions.iter().map(|p| p.z).sum::<f64>() / count,
    })
}

/// 按 z 排序的中位样本
///
/// 奇数个样本返回中间样本本身；偶数个样本返回中间两个样本的
/// 按轴平均。空切片返回 `None`。
pub fn median_position(positions: &[Position3D]) -> Option<Position3D> {
    if positions.is_empty() {
        return None;
    }
    let mut by_z: Vec<Position3D> = positions.to_vec();
    by_z.sort_by(|a, b| a.z.total_cmp(&b.z));
    let middle = by_z.len() / 2;
    if by_z.len() % 2 == 1 {
        return Some(by_z[middle]);
    }
    mean_position(&by_z[middle - 1..=middle])
}

/// 精度报告统计量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStatistics {
    /// 最大 z（毫米）
    pub max_mm: f64,
    /// 最小 z（毫米）
    pub min_mm: f64,
    /// 极差（毫米）
    pub range_mm: f64,
    /// 算术平均（毫米）
    pub mean_mm: f64,
    /// 中位数（毫米）
    pub median_mm: f64,
    /// 总体标准差（毫米）
    pub std_dev_mm: f64,
    /// 样本数量
    pub sample_count: usize,
}

impl AccuracyStatistics {
    /// 由一组采样位置计算
    ///
    /// 空切片返回 `None`。
    pub fn from_samples(positions: &[Position3D]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let zs: Vec<f64> = positions.iter().map(|p| p.z).collect();
        let max_mm = zs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_mm = zs.iter().copied().fold(f64::INFINITY, f64::min);
        let mean_mm = mean_position(positions)?.z;
        let median_mm = median_position(positions)?.z;
        let variance =
            zs.iter().map(|z| (z - mean_mm).powi(2)).sum::<f64>() / zs.len() as f64;
        Some(Self {
            max_mm,
            min_mm,
            range_mm: max_mm - min_mm,
            mean_mm,
            median_mm,
            std_dev_mm: variance.sqrt(),
            sample_count: positions.len(),
        })
    }
}

impl std::fmt::Display for AccuracyStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "probe accuracy results: maximum {:.6}, minimum {:.6}, range {:.6}, \
             average {:.6}, median {:.6}, standard deviation {:.6}",
            self.max_mm, self.min_mm, self.range_mm, self.mean_mm, self.median_mm, self.std_dev_mm
        )
    }
}
