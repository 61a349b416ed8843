//! 探测引擎高层接口
//!
//! 单点停测采样（多次读数、容差重试、统计聚合）、精度报告与
//! Z 偏移标定收尾。批次会话在没有外层括号时自动管理，错误
//! 路径也保证拆除。

use bdsense_channel::{BusTransport, ReadMode};
use bdsense_tools::{AccuracyStatistics, Position3D, mean_position, median_position};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{info, warn};

use crate::config::{AggregationMode, ProbeConfig, ProbeOverrides, ProbeParams};
use crate::endstop::{EndstopMonitor, EndstopState, SETTLE_DWELL};
use crate::error::ProbeError;
use crate::motion::{Axis, MotionController, MoveTarget};

/// 精度报告的默认采样次数
const ACCURACY_DEFAULT_SAMPLES: usize = 10;

/// 标定时抬离床面的高度（毫米）
const CALIBRATE_LIFT_MM: f64 = 5.0;

/// 一个探测点的采样集合
///
/// 栈上预留 8 个位置：常见 samples 配置为 1-5，容差重试会清空
/// 重收，几乎不会触碰堆。
pub type SampleSet = SmallVec<[Position3D; 8]>;

/// 触发探测的命令类别
///
/// 网格/调平标定驱动的探测在连续扫描能力不可用时走直读快速
/// 路径（纯近似，任何异常都回落到机械探测）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbePurpose {
    /// 手动单点探测
    #[default]
    Manual,
    /// 网格标定驱动
    MeshCalibration,
    /// 调平标定驱动
    TiltCalibration,
}

impl ProbePurpose {
    /// 是否为标定类命令（允许直读快速路径）
    pub fn is_calibration(self) -> bool {
        matches!(
            self,
            ProbePurpose::MeshCalibration | ProbePurpose::TiltCalibration
        )
    }
}

/// 一次探测调用的请求
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeRequest {
    pub overrides: ProbeOverrides,
    pub purpose: ProbePurpose,
}

impl ProbeRequest {
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn for_purpose(purpose: ProbePurpose) -> Self {
        Self {
            purpose,
            ..Self::default()
        }
    }
}

/// 状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatus {
    pub name: String,
    pub last_query: Option<EndstopState>,
    pub last_z_result: f64,
}

/// 探测引擎
///
/// 独占持有 endstop 监视器（进而持有传感器通道与会话状态）；
/// 运动协作方在每次调用时借入，引擎从不拥有它。
pub struct Probe<T> {
    config: ProbeConfig,
    endstop: EndstopMonitor<T>,
    last_state: Option<EndstopState>,
    last_z_result: f64,
    calibrate_z: f64,
}

impl<T: BusTransport> Probe<T> {
    /// 构造引擎；配置在此处校验一次
    pub fn new(transport: T, config: ProbeConfig) -> Result<Self, ProbeError> {
        config.validate()?;
        let endstop = EndstopMonitor::new(transport, &config);
        Ok(Self {
            config,
            endstop,
            last_state: None,
            last_z_result: 0.0,
            calibrate_z: 0.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// 探针偏移 (x, y, z)
    pub fn offsets(&self) -> (f64, f64, f64) {
        (
            self.config.x_offset,
            self.config.y_offset,
            self.config.z_offset,
        )
    }

    pub fn lift_speed(&self) -> f64 {
        self.config.lift_speed()
    }

    /// 传感器是否支持不停机读取（构造期解析的能力标志）
    pub fn supports_continuous_scan(&self) -> bool {
        self.config.no_stop_probe
    }

    /// endstop 监视器（归位括号与诊断序列用）
    pub fn endstop_mut(&mut self) -> &mut EndstopMonitor<T> {
        &mut self.endstop
    }

    /// 查询虚拟 endstop 状态并更新状态快照
    pub fn query_endstop(&mut self) -> Result<EndstopState, ProbeError> {
        use crate::motion::EndstopPoller;
        let state = self.endstop.query_endstop()?;
        self.last_state = Some(state);
        Ok(state)
    }

    /// 状态快照
    pub fn status(&self) -> ProbeStatus {
        ProbeStatus {
            name: self.config.name.clone(),
            last_query: self.last_state,
            last_z_result: self.last_z_result,
        }
    }

    // === 批次括号（委托给 endstop 监视器） ===

    pub fn multi_probe_begin(&mut self) {
        self.endstop.multi_probe_begin();
    }

    pub fn multi_probe_end(&mut self, motion: &mut dyn MotionController) -> Result<(), ProbeError> {
        self.endstop.multi_probe_end(motion)
    }

    /// 命令处理错误时的兜底拆除：幂等、只记录不抛出
    pub fn on_command_error(&mut self, motion: &mut dyn MotionController) {
        self.endstop.multi_probe_end_best_effort(motion);
    }

    // === 采样 ===

    /// 单点停测采样
    ///
    /// 没有外层批次括号时自动开启并在返回前关闭（错误路径走
    /// 尽力而为拆除）。
    pub fn run_probe(
        &mut self,
        motion: &mut dyn MotionController,
        request: &ProbeRequest,
    ) -> Result<Position3D, ProbeError> {
        let params = self.config.resolve(&request.overrides)?;
        let auto_session = !self.endstop.session_pending();
        if auto_session {
            self.multi_probe_begin();
        }
        let result = self.collect_samples(motion, &params, request.purpose);
        if auto_session {
            if result.is_ok() {
                self.endstop.multi_probe_end(motion)?;
            } else {
                self.endstop.multi_probe_end_best_effort(motion);
            }
        }
        let position = result?;
        self.last_z_result = position.z;
        Ok(position)
    }

    fn collect_samples(
        &mut self,
        motion: &mut dyn MotionController,
        params: &ProbeParams,
        purpose: ProbePurpose,
    ) -> Result<Position3D, ProbeError> {
        let (probe_x, probe_y) = motion.get_position().xy();
        let mut samples = SampleSet::new();
        let mut retries = 0usize;

        while samples.len() < params.samples {
            let position = self.probe_once(motion, params.probe_speed, purpose)?;
            samples.push(position);

            let spread = z_spread(&samples);
            if spread > params.samples_tolerance {
                if retries >= params.samples_tolerance_retries {
                    return Err(ProbeError::ToleranceExceeded {
                        spread_mm: spread,
                        tolerance_mm: params.samples_tolerance,
                    });
                }
                info!("Probe samples exceed tolerance. Retrying...");
                retries += 1;
                samples.clear();
                continue;
            }

            // 还有剩余采样时回退，为下一次进给留出行程
            if samples.len() < params.samples {
                motion.manual_move(
                    MoveTarget::xyz(probe_x, probe_y, position.z + params.sample_retract_dist),
                    params.lift_speed,
                )?;
            }
        }

        let aggregated = match params.samples_result {
            AggregationMode::Mean => mean_position(&samples),
            AggregationMode::Median => median_position(&samples),
        };
        let Some(position) = aggregated else {
            unreachable!("samples >= 1 is enforced by configuration validation")
        };
        Ok(position)
    }

    fn probe_once(
        &mut self,
        motion: &mut dyn MotionController,
        speed: f64,
        purpose: ProbePurpose,
    ) -> Result<Position3D, ProbeError> {
        if purpose.is_calibration() {
            match self.direct_probe(motion) {
                Ok(position) => return Ok(position),
                Err(e) => {
                    warn!(error = %e, "direct sensor read failed, falling back to mechanical probe")
                }
            }
        }
        self.mechanical_probe(motion, speed)
    }

    /// 直读快速路径：不下探，在当前位置读传感器
    fn direct_probe(&mut self, motion: &mut dyn MotionController) -> Result<Position3D, ProbeError> {
        motion.wait_moves()?;
        motion.dwell(SETTLE_DWELL);
        let mut position = motion.get_position();
        let reading = self.endstop.read_distance(ReadMode::Checked)?;
        position.z -= reading.value_mm;
        info!(
            "probe at {:.3},{:.3} is z={:.6}",
            position.x, position.y, position.z
        );
        Ok(position)
    }

    /// 机械探测：向 Z 下限进给直至 endstop 触发
    fn mechanical_probe(
        &mut self,
        motion: &mut dyn MotionController,
        speed: f64,
    ) -> Result<Position3D, ProbeError> {
        if !motion.is_homed(Axis::Z) {
            return Err(ProbeError::NotHomed);
        }
        let z_target = self.config.z_position_min;
        let position = motion.probing_move(&mut self.endstop, z_target, speed)?;
        info!(
            "probe at {:.3},{:.3} is z={:.6}",
            position.x, position.y, position.z
        );
        Ok(position)
    }

    // === 精度报告 ===

    /// N 次采样的精度报告
    ///
    /// 采样次数默认 10（不走配置的 samples），其余参数与普通
    /// 探测相同。
    pub fn probe_accuracy(
        &mut self,
        motion: &mut dyn MotionController,
        overrides: &ProbeOverrides,
    ) -> Result<AccuracyStatistics, ProbeError> {
        let mut overrides = *overrides;
        if overrides.samples.is_none() {
            overrides.samples = Some(ACCURACY_DEFAULT_SAMPLES);
        }
        let params = self.config.resolve(&overrides)?;
        let start = motion.get_position();
        info!(
            "PROBE_ACCURACY at X:{:.3} Y:{:.3} Z:{:.3} (samples={} retract={:.3} speed={:.1} lift_speed={:.1})",
            start.x,
            start.y,
            start.z,
            params.samples,
            params.sample_retract_dist,
            params.probe_speed,
            params.lift_speed
        );

        self.multi_probe_begin();
        let result = self.accuracy_samples(motion, &params);
        match result {
            Ok(positions) => {
                self.endstop.multi_probe_end(motion)?;
                let Some(stats) = AccuracyStatistics::from_samples(&positions) else {
                    unreachable!("samples >= 1 is enforced by configuration validation")
                };
                info!("{stats}");
                Ok(stats)
            }
            Err(e) => {
                self.endstop.multi_probe_end_best_effort(motion);
                Err(e)
            }
        }
    }

    fn accuracy_samples(
        &mut self,
        motion: &mut dyn MotionController,
        params: &ProbeParams,
    ) -> Result<Vec<Position3D>, ProbeError> {
        let mut positions = Vec::with_capacity(params.samples);
        while positions.len() < params.samples {
            let position = self.mechanical_probe(motion, params.probe_speed)?;
            positions.push(position);
            motion.manual_move(
                MoveTarget::z_only(position.z + params.sample_retract_dist),
                params.lift_speed,
            )?;
        }
        Ok(positions)
    }

    // === Z 偏移标定 ===

    /// 标定开场：探一次，记录高度，抬离床面并把喷嘴移到探针点
    ///
    /// 返回手动对高的起始位置；收尾由 [`Probe::calibrate_finalize`]
    /// 完成。
    pub fn probe_calibrate_begin(
        &mut self,
        motion: &mut dyn MotionController,
        request: &ProbeRequest,
    ) -> Result<Position3D, ProbeError> {
        let lift_speed = request.overrides.lift_speed.unwrap_or_else(|| self.lift_speed());
        let position = self.run_probe(motion, request)?;
        self.calibrate_z = position.z;

        let mut current = position;
        current.z += CALIBRATE_LIFT_MM;
        motion.manual_move(current.into(), lift_speed)?;

        // 把喷嘴移到探针点上方
        current.x += self.config.x_offset;
        current.y += self.config.y_offset;
        motion.manual_move(MoveTarget::xy(current.x, current.y), self.config.speed)?;
        Ok(current)
    }

    /// 标定收尾：由手动对高得到的运动学 Z 计算新的 z_offset
    ///
    /// 持久化由调用方完成（配置写回不在本引擎职责内）。
    pub fn calibrate_finalize(&mut self, kin_z: f64) -> f64 {
        let z_offset = self.calibrate_z - kin_z;
        info!("{}: z_offset: {:.3}", self.config.name, z_offset);
        z_offset
    }

    /// 把归位原点偏移折算进 z_offset；偏移为 0 时无事可做
    pub fn apply_z_offset(&self, homing_origin_z: f64) -> Option<f64> {
        if homing_origin_z == 0.0 {
            return None;
        }
        Some(self.config.z_offset - homing_origin_z)
    }
}

/// 采样集合的 z 极差
fn z_spread(samples: &[Position3D]) -> f64 {
    let max = samples.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max);
    let min = samples.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
    max - min
}
