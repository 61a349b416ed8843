//! # BDsense Tools - 共享数据结构和算法
//!
//! **依赖原则**: 纯数据与纯函数，不依赖 `bdsense-probe` 或
//! 任何硬件层 crate
//!
//! ## 包含模块
//!
//! - `position` - 机器坐标类型（纯数据结构）
//! - `statistics` - 采样聚合与精度统计（纯函数）

pub mod position;
pub mod statistics;

// 重新导出常用类型
pub use position::Position3D;
pub use statistics::{AccuracyStatistics, mean_position, median_position};
