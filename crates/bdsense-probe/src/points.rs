//! 批量点位探测助手
//!
//! 网格/调平例程消费的批量探测：按序遍历点列，逐点停测并上报
//! 位置；当传感器具备不停机读取能力且由网格标定驱动时，整批
//! 改走连续扫描，失败则回落到逐点路径。

use bdsense_channel::BusTransport;
use bdsense_tools::Position3D;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ConfigError;
use crate::error::ProbeError;
use crate::motion::{MotionController, MoveTarget};
use crate::probe::{Probe, ProbePurpose, ProbeRequest};
use crate::scan::{ScanOptions, group_scan_lines, scan_line};

/// 批量探测配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    /// 探测点列（机器坐标，遍历顺序）
    pub points: Vec<(f64, f64)>,
    /// 点间移动的安全高度（毫米）
    pub horizontal_move_z: f64,
    /// 点间移动速度（毫米/秒）
    pub speed: f64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            horizontal_move_z: 5.0,
            speed: 50.0,
        }
    }
}

/// 批次收尾回调的裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeVerdict {
    /// 批次完成
    Done,
    /// 清空结果，重新探整批
    Retry,
}

/// 批次收尾回调：收到探针偏移与全部记录点
pub type FinalizeCallback<'a> =
    dyn FnMut((f64, f64, f64), &[Position3D]) -> FinalizeVerdict + 'a;

/// 一次批量探测的请求
#[derive(Debug, Clone, Copy, Default)]
pub struct PointsRequest {
    pub probe_request: ProbeRequest,
    /// 安全高度覆盖值
    pub horizontal_move_z: Option<f64>,
}

/// 批量点位探测助手
pub struct ProbePointsHelper {
    name: String,
    config: PointsConfig,
    use_offsets: bool,
    scan_options: ScanOptions,
    // 单次批次内部状态
    horizontal_move_z: f64,
    lift_speed: f64,
    probe_offsets: (f64, f64, f64),
    results: Vec<Position3D>,
}

impl ProbePointsHelper {
    pub fn new(name: impl Into<String>, config: PointsConfig) -> Self {
        let horizontal_move_z = config.horizontal_move_z;
        Self {
            name: name.into(),
            config,
            use_offsets: false,
            scan_options: ScanOptions::default(),
            horizontal_move_z,
            lift_speed: 0.0,
            probe_offsets: (0.0, 0.0, 0.0),
            results: Vec::new(),
        }
    }

    /// 校验点数下限
    pub fn minimum_points(&self, required: usize) -> Result<(), ConfigError> {
        if self.config.points.len() < required {
            return Err(ConfigError::InsufficientPoints {
                required,
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// 替换点列并校验下限
    pub fn update_probe_points(
        &mut self,
        points: Vec<(f64, f64)>,
        min_points: usize,
    ) -> Result<(), ConfigError> {
        self.config.points = points;
        self.minimum_points(min_points)
    }

    /// 探测时是否把探针 XY 偏移折算进目标点
    pub fn use_xy_offsets(&mut self, use_offsets: bool) {
        self.use_offsets = use_offsets;
    }

    /// 覆盖扫描轮询选项（细分策略始终取探针配置）
    pub fn set_scan_options(&mut self, options: ScanOptions) {
        self.scan_options = options;
    }

    pub fn lift_speed(&self) -> f64 {
        self.lift_speed
    }

    /// 启动一次批量探测
    ///
    /// 批次括号覆盖整个遍历；任何错误都先做尽力而为的会话拆除
    /// 再向上传播。
    pub fn start_probe<T: BusTransport>(
        &mut self,
        probe: &mut Probe<T>,
        motion: &mut dyn MotionController,
        request: &PointsRequest,
        finalize: &mut FinalizeCallback<'_>,
    ) -> Result<(), ProbeError> {
        self.results.clear();
        self.horizontal_move_z = request
            .horizontal_move_z
            .unwrap_or(self.config.horizontal_move_z);
        self.lift_speed = probe.lift_speed();
        self.probe_offsets = probe.offsets();
        if self.horizontal_move_z < self.probe_offsets.2 {
            return Err(ConfigError::HorizontalMoveTooLow.into());
        }

        probe.multi_probe_begin();
        match self.run_batch(probe, motion, request, finalize) {
            Ok(()) => probe.multi_probe_end(motion),
            Err(e) => {
                probe.on_command_error(motion);
                Err(e)
            }
        }
    }

    fn run_batch<T: BusTransport>(
        &mut self,
        probe: &mut Probe<T>,
        motion: &mut dyn MotionController,
        request: &PointsRequest,
        finalize: &mut FinalizeCallback<'_>,
    ) -> Result<(), ProbeError> {
        if request.probe_request.purpose == ProbePurpose::MeshCalibration
            && probe.supports_continuous_scan()
        {
            match self.fast_probe(probe, motion, finalize) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // 绝不保留半扫描行：清空后整批回落到逐点路径
                    warn!(error = %e, "continuous scan failed, falling back to per-point probing");
                    self.results.clear();
                }
            }
        }

        loop {
            if self.move_next(motion, finalize)? {
                break;
            }
            let position = probe.run_probe(motion, &request.probe_request)?;
            self.results.push(position);
        }
        Ok(())
    }

    /// 抬升、必要时收尾、移动到下一个点
    ///
    /// 返回 `true` 表示批次完成。
    fn move_next(
        &mut self,
        motion: &mut dyn MotionController,
        finalize: &mut FinalizeCallback<'_>,
    ) -> Result<bool, ProbeError> {
        // 第一个点用全速，之后用抬升速度
        let speed = if self.results.is_empty() {
            self.config.speed
        } else {
            self.lift_speed
        };
        motion.manual_move(MoveTarget::z_only(self.horizontal_move_z), speed)?;

        if self.results.len() >= self.config.points.len() {
            motion.wait_moves()?;
            match finalize(self.probe_offsets, &self.results) {
                FinalizeVerdict::Done => return Ok(true),
                FinalizeVerdict::Retry => self.results.clear(),
            }
        }

        let (mut x, mut y) = self.config.points[self.results.len()];
        if self.use_offsets {
            x -= self.probe_offsets.0;
            y -= self.probe_offsets.1;
        }
        motion.manual_move(MoveTarget::xy(x, y), self.config.speed)?;
        Ok(false)
    }

    /// 整批连续扫描
    fn fast_probe<T: BusTransport>(
        &mut self,
        probe: &mut Probe<T>,
        motion: &mut dyn MotionController,
        finalize: &mut FinalizeCallback<'_>,
    ) -> Result<(), ProbeError> {
        motion.manual_move(MoveTarget::z_only(self.horizontal_move_z), self.config.speed)?;
        let lines = group_scan_lines(&self.config.points)?;
        let offsets = if self.use_offsets {
            (self.probe_offsets.0, self.probe_offsets.1)
        } else {
            (0.0, 0.0)
        };
        let options = ScanOptions {
            timing: probe.config().scan_timing,
            ..self.scan_options
        };

        loop {
            self.results.clear();
            for line in &lines {
                scan_line(
                    probe,
                    motion,
                    line,
                    self.config.speed,
                    &options,
                    offsets,
                    &mut self.results,
                )?;
            }
            match finalize(self.probe_offsets, &self.results) {
                FinalizeVerdict::Done => {
                    self.results.clear();
                    return Ok(());
                }
                FinalizeVerdict::Retry => continue,
            }
        }
    }
}
