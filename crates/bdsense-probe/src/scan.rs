//! 运动同步连续扫描
//!
//! 密集网格的点落在轴对齐的行上时，不必逐点停测：移动到行
//! 起点停稳后，一次不间断地移动到行终点，对照运动队列的预测
//! 时间线在每个网格列经过的瞬间读一次传感器。
//!
//! 轮询循环每次迭代用有界短睡让出控制权，绝不忙等——后台的
//! 运动队列冲刷要与采样并发推进。任何一步失败都放弃连续扫描，
//! 回落到逐点采样，绝不留下一条产出错误高度的半扫描行。

use std::time::Duration;

use bdsense_channel::{BusTransport, ReadMode};
use bdsense_tools::Position3D;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::error::ProbeError;
use crate::motion::{MotionController, MoveTarget};
use crate::probe::Probe;

/// 轮询让出间隔的默认值
pub const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 列细分策略
///
/// 细分公式在不同机型上需要经验调参，作为可配置策略而非硬编码
/// 单一公式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTiming {
    /// 按移动时间等分（默认）
    #[default]
    EqualTime,
    /// 按指令位置的行程等分
    EqualDistance,
}

/// 扫描选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOptions {
    pub timing: ScanTiming,
    /// 轮询之间的让出时长
    pub poll_interval: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timing: ScanTiming::default(),
            poll_interval: SCAN_POLL_INTERVAL,
        }
    }
}

/// 一条扫描行：共享同一 y 的连续点列
///
/// 点保持遍历顺序（蛇形网格的相邻行方向相反）；点数 ≥ 2，
/// 否则无法定义时间-位置映射。
#[derive(Debug, Clone, PartialEq)]
pub struct ScanLine {
    pub points: Vec<(f64, f64)>,
}

impl ScanLine {
    pub fn start(&self) -> (f64, f64) {
        self.points[0]
    }

    pub fn end(&self) -> (f64, f64) {
        self.points[self.points.len() - 1]
    }
}

/// 把探测点分组为扫描行
///
/// 共享同一 y 的连续点构成一行；出现不足 2 点的行说明网格
/// 方向不是 X，报配置错误。
pub fn group_scan_lines(points: &[(f64, f64)]) -> Result<Vec<ScanLine>, ConfigError> {
    let mut lines: Vec<ScanLine> = Vec::new();
    for &(x, y) in points {
        match lines.last_mut() {
            Some(line) if line.points[0].1 == y => line.points.push((x, y)),
            _ => lines.push(ScanLine {
                points: vec![(x, y)],
            }),
        }
    }
    for line in &lines {
        if line.points.len() < 2 {
            return Err(ConfigError::BadMeshDirection {
                count: line.points.len(),
            });
        }
    }
    Ok(lines)
}

/// 第 k 列的时间门限：span 的 (count - 1) 等分
pub fn column_threshold(k: usize, count: usize, span: f64) -> f64 {
    span * k as f64 / (count - 1) as f64
}

/// 扫描一行
///
/// 移动到行起点停稳，然后一次不间断移动到行终点；移动执行
/// 期间按细分策略在每列经过的瞬间读一次传感器，记录
/// (列坐标, 指令 z − 传感器距离)。运动在采满所有列之前结束时
/// 报 [`ProbeError::ScanIncomplete`]，由调用方触发逐点回落。
pub fn scan_line<T: BusTransport>(
    probe: &mut Probe<T>,
    motion: &mut dyn MotionController,
    line: &ScanLine,
    speed: f64,
    options: &ScanOptions,
    offsets: (f64, f64),
    results: &mut Vec<Position3D>,
) -> Result<(), ProbeError> {
    let count = line.points.len();
    let (start_x, start_y) = line.start();
    let (end_x, end_y) = line.end();

    // 移动到行起点并停稳
    motion.manual_move(
        MoveTarget::xy(start_x - offsets.0, start_y - offsets.1),
        speed,
    )?;
    motion.wait_moves()?;

    // 一次不间断移动到行终点，冲刷前瞻使时序估计立即可用
    motion.manual_move(MoveTarget::xy(end_x - offsets.0, end_y - offsets.1), speed)?;
    motion.flush_lookahead()?;
    let start_time = motion.estimated_elapsed_time();
    let span = motion.queued_move_end_time() - start_time;
    debug!(span_s = span, columns = count, "scan line started");

    let mut k = 0usize;
    loop {
        while k < count && column_due(motion, line, k, span, start_time, options.timing, offsets) {
            let (column_x, column_y) = line.points[k];
            let mut position = motion.get_position();
            position.x = column_x;
            position.y = column_y;
            let reading = probe.endstop_mut().read_distance(ReadMode::Checked)?;
            position.z -= reading.value_mm;
            info!(
                "probe at {:.3},{:.3} is z={:.6}",
                position.x, position.y, position.z
            );
            results.push(position);
            k += 1;
        }
        if k >= count {
            break;
        }
        if !motion.is_motion_active() {
            return Err(ProbeError::ScanIncomplete {
                sampled: k,
                expected: count,
            });
        }
        // 让出调度，避免饿死运动队列冲刷
        spin_sleep::sleep(options.poll_interval);
    }
    Ok(())
}

fn column_due(
    motion: &mut dyn MotionController,
    line: &ScanLine,
    k: usize,
    span: f64,
    start_time: f64,
    timing: ScanTiming,
    offsets: (f64, f64),
) -> bool {
    let count = line.points.len();
    match timing {
        ScanTiming::EqualTime => {
            let elapsed = motion.estimated_elapsed_time() - start_time;
            elapsed >= column_threshold(k, count, span)
        }
        ScanTiming::EqualDistance => {
            let commanded_start_x = line.start().0 - offsets.0;
            let travelled = (motion.get_position().x - commanded_start_x).abs();
            let target = (line.points[k].0 - line.start().0).abs();
            travelled + 1e-9 >= target
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_contiguous_lines() {
        // 蛇形网格：第二行反向
        let points = [
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ];
        let lines = group_scan_lines(&points).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start(), (0.0, 0.0));
        assert_eq!(lines[0].end(), (20.0, 0.0));
        assert_eq!(lines[1].start(), (20.0, 10.0));
        assert_eq!(lines[1].end(), (0.0, 10.0));
    }

    #[test]
    fn test_group_rejects_single_point_line() {
        let points = [(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)];
        assert!(matches!(
            group_scan_lines(&points),
            Err(ConfigError::BadMeshDirection { count: 1 })
        ));
    }

    #[test]
    fn test_group_empty() {
        assert!(group_scan_lines(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_column_threshold_equal_subdivisions() {
        // 5 点、2.0s 行程：第 k 列在 k * 0.5s 到期
        for k in 0..5 {
            let expected = k as f64 * 2.0 / 4.0;
            assert!((column_threshold(k, 5, 2.0) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_scan_timing_deserializes() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            timing: ScanTiming,
        }
        let w: Wrapper = toml::from_str(r#"timing = "equal_distance""#).unwrap();
        assert_eq!(w.timing, ScanTiming::EqualDistance);
    }
}
