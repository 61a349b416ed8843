//! 机器坐标类型

use serde::{Deserialize, Serialize};

/// 机器坐标系中的一个点（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// XY 平面投影
    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}
