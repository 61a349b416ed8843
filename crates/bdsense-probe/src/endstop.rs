//! 虚拟 endstop 监视器
//!
//! 把轮询到的距离读数变成相对配置阈值的触发/断开状态，并承担
//! 归位括号（home_start / wait_for_trigger / probe_prepare /
//! probe_finish）与多点探测会话的硬件效果。
//!
//! # 归位修正
//!
//! 归位移动成功结束后，最后一次传感器距离被捕获，机器的 Z
//! 坐标被改写为该值（把传感器眼中的真实床距融合进轴坐标），
//! 并记录修正日志。该修正由会话 `end` 恰好应用一次。

use std::time::Duration;

use bdsense_channel::{BusTransport, ChannelError, ReadMode, SensorChannel};
use bdsense_protocol::{Command, Opcode, SensorReading};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::motion::{EndstopPoller, MotionController};
use crate::session::MultiProbeState;

/// 归位轮询的静息间隔上限
pub const ENDSTOP_REST_TIME: Duration = Duration::from_millis(1);

/// 传感器在运动停止后的稳定时间
pub(crate) const SETTLE_DWELL: Duration = Duration::from_millis(4);

/// 归位期间的控制器定时器间隔（毫秒）
const HOMING_TIMER_MS: u32 = 5;

/// 空闲时的控制器定时器间隔（毫秒）
const IDLE_TIMER_MS: u32 = 100;

/// 虚拟 endstop 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndstopState {
    Open,
    Triggered,
}

/// 虚拟 endstop 监视器
///
/// 独占持有传感器通道与多点会话状态；运动协作方按调用借入。
pub struct EndstopMonitor<T> {
    channel: SensorChannel<T>,
    position_endstop: f64,
    stow_on_each_sample: bool,
    multi: MultiProbeState,
    /// 外层批次括号是否已打开（`end` 的幂等性依据）
    session_pending: bool,
    /// 当前批次是否由归位触发（决定 `end` 时的 Z 修正）
    homing: bool,
}

impl<T: BusTransport> EndstopMonitor<T> {
    pub fn new(transport: T, config: &ProbeConfig) -> Self {
        Self {
            channel: SensorChannel::new(transport),
            position_endstop: config.position_endstop,
            stow_on_each_sample: config.stow_on_each_sample,
            multi: MultiProbeState::Off,
            session_pending: false,
            homing: false,
        }
    }

    /// 配置的触发阈值（毫米）
    pub fn position_endstop(&self) -> f64 {
        self.position_endstop
    }

    /// 当前会话状态
    pub fn session_state(&self) -> MultiProbeState {
        self.multi
    }

    /// 批次括号是否已打开
    pub fn session_pending(&self) -> bool {
        self.session_pending
    }

    /// 最近一次距离读数（状态表面）
    pub fn last_reading(&self) -> Option<SensorReading> {
        self.channel.last_reading()
    }

    /// 传感器通道（诊断序列用）
    pub fn channel_mut(&mut self) -> &mut SensorChannel<T> {
        &mut self.channel
    }

    /// 以校验模式读取一次距离
    pub fn read_distance(&mut self, mode: ReadMode) -> Result<SensorReading, ChannelError> {
        self.channel.read_distance(mode)
    }

    /// 开始一次归位移动
    ///
    /// 静息间隔钳制到 [`ENDSTOP_REST_TIME`] 之内，再交给硬件归位
    /// 监视。
    pub fn home_start(
        &mut self,
        motion: &mut dyn MotionController,
        rest_time: Duration,
    ) -> Result<(), ProbeError> {
        self.homing = true;
        let rest_time = rest_time.min(ENDSTOP_REST_TIME);
        debug!(rest_time = ?rest_time, "homing watch start");
        motion.home_start(rest_time)?;
        Ok(())
    }

    /// 阻塞等待归位触发
    ///
    /// 先轮询一次传感器并下调控制器定时器间隔，然后阻塞在归位
    /// 完成原语上；触发后若无批次会话，立即收起探针。
    pub fn wait_for_trigger(
        &mut self,
        motion: &mut dyn MotionController,
    ) -> Result<(), ProbeError> {
        self.channel.read_distance(ReadMode::Endstop)?;
        self.channel.send(Command::TimerInterval(HOMING_TIMER_MS))?;
        {
            let (channel, threshold) = (&mut self.channel, self.position_endstop);
            let mut poller = ChannelPoller { channel, threshold };
            motion.home_wait(&mut poller)?;
        }
        if !self.multi.is_active() {
            self.raise_probe(motion)?;
        }
        Ok(())
    }

    /// 单次探测移动前的准备：必要时展开探针
    pub fn probe_prepare(&mut self, motion: &mut dyn MotionController) -> Result<(), ProbeError> {
        if !matches!(self.multi, MultiProbeState::On) {
            self.lower_probe(motion)?;
        }
        self.multi = self.multi.after_prepare();
        Ok(())
    }

    /// 单次探测移动后的收尾
    ///
    /// 通知传感器结束读取，复位控制器定时器；无批次会话时收起
    /// 探针。
    pub fn probe_finish(&mut self, motion: &mut dyn MotionController) -> Result<(), ProbeError> {
        self.channel.send(Command::Op(Opcode::FinishReading))?;
        if !self.multi.is_active() {
            self.raise_probe(motion)?;
        }
        self.channel.send(Command::TimerInterval(IDLE_TIMER_MS))?;
        Ok(())
    }

    /// 打开批次括号
    ///
    /// 不可重入：调用方必须保证没有已打开的括号。
    pub fn multi_probe_begin(&mut self) {
        trace!("multi probe begin");
        self.session_pending = true;
        self.multi = self.multi.begin(self.stow_on_each_sample);
    }

    /// 关闭批次括号（幂等）
    ///
    /// 无括号打开时是安全的空操作。批次跟在归位触发之后时，
    /// 恰好一次地把 Z 坐标修正为传感器测得的真实床距。
    pub fn multi_probe_end(&mut self, motion: &mut dyn MotionController) -> Result<(), ProbeError> {
        if !self.session_pending {
            return Ok(());
        }
        self.session_pending = false;
        trace!("multi probe end");
        self.channel.send(Command::Op(Opcode::FinishReading))?;
        if self.homing {
            let reading = self.channel.read_distance(ReadMode::Checked)?;
            motion.wait_moves()?;
            motion.dwell(SETTLE_DWELL);
            motion.set_z_position(reading.value_mm)?;
            info!(
                value_mm = reading.value_mm,
                "The actually triggered position of Z is {:.3} mm", reading.value_mm
            );
        }
        self.homing = false;
        if !self.stow_on_each_sample {
            self.raise_probe(motion)?;
            self.multi = self.multi.end();
        }
        Ok(())
    }

    /// 错误路径的批次拆除：尽力而为，只记录不再抛出
    pub fn multi_probe_end_best_effort(&mut self, motion: &mut dyn MotionController) {
        if let Err(e) = self.multi_probe_end(motion) {
            tracing::error!(error = %e, "multi-probe end failed during error cleanup");
        }
    }

    /// 收起探针，校验脚本没有移动工具头
    fn raise_probe(&mut self, motion: &mut dyn MotionController) -> Result<(), ProbeError> {
        let start = motion.get_position();
        motion.run_deactivate_script()?;
        if motion.get_position() != start {
            return Err(ProbeError::MotionAborted {
                script: "deactivate",
            });
        }
        Ok(())
    }

    /// 展开探针，校验脚本没有移动工具头
    fn lower_probe(&mut self, motion: &mut dyn MotionController) -> Result<(), ProbeError> {
        let start = motion.get_position();
        motion.run_activate_script()?;
        if motion.get_position() != start {
            return Err(ProbeError::MotionAborted { script: "activate" });
        }
        Ok(())
    }
}

impl<T: BusTransport> EndstopPoller for EndstopMonitor<T> {
    /// 查询 endstop 状态
    ///
    /// 每次都是新读数；连接错误向上传播为致命错误，绝不折叠成
    /// 触发或断开。等于阈值时判定为触发。
    fn query_endstop(&mut self) -> Result<EndstopState, ProbeError> {
        let reading = self.channel.read_distance(ReadMode::Endstop)?;
        Ok(state_for(reading.value_mm, self.position_endstop))
    }
}

/// 归位等待期间借出的轻量轮询器
///
/// `wait_for_trigger` 同时借用通道与运动控制，无法把整个监视器
/// 交给 `home_wait`，于是借出只含通道与阈值的视图。
struct ChannelPoller<'a, T> {
    channel: &'a mut SensorChannel<T>,
    threshold: f64,
}

impl<T: BusTransport> EndstopPoller for ChannelPoller<'_, T> {
    fn query_endstop(&mut self) -> Result<EndstopState, ProbeError> {
        let reading = self.channel.read_distance(ReadMode::Endstop)?;
        Ok(state_for(reading.value_mm, self.threshold))
    }
}

fn state_for(value_mm: f64, threshold: f64) -> EndstopState {
    if value_mm > threshold {
        EndstopState::Open
    } else {
        EndstopState::Triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdsense_channel::MockTransport;

    fn monitor_with(
        responses: &[u16],
        config: &ProbeConfig,
    ) -> EndstopMonitor<MockTransport> {
        let mut mock = MockTransport::new();
        for &raw in responses {
            mock.enqueue_raw(raw);
        }
        EndstopMonitor::new(mock, config)
    }

    fn threshold_config(position_endstop: f64) -> ProbeConfig {
        ProbeConfig {
            position_endstop,
            ..Default::default()
        }
    }

    #[test]
    fn test_query_endstop_triggered_below_threshold() {
        // 阈值 1.0mm，读数 0.8mm → 触发
        let mut monitor = monitor_with(&[80], &threshold_config(1.0));
        assert_eq!(monitor.query_endstop().unwrap(), EndstopState::Triggered);
    }

    #[test]
    fn test_query_endstop_open_above_threshold() {
        let mut monitor = monitor_with(&[150], &threshold_config(1.0));
        assert_eq!(monitor.query_endstop().unwrap(), EndstopState::Open);
    }

    #[test]
    fn test_query_endstop_boundary_equality_triggers() {
        // 边界行为固定：等于阈值 → 触发
        let mut monitor = monitor_with(&[100], &threshold_config(1.0));
        assert_eq!(monitor.query_endstop().unwrap(), EndstopState::Triggered);
    }

    #[test]
    fn test_query_endstop_connection_error_is_fatal() {
        let mut monitor = monitor_with(&[1030, 1030], &threshold_config(1.0));
        assert!(matches!(
            monitor.query_endstop(),
            Err(ProbeError::Channel(ChannelError::ConnectionFault { .. }))
        ));
    }

    #[test]
    fn test_session_begin_respects_stow_config() {
        let mut monitor = monitor_with(&[], &threshold_config(0.5));
        // 默认 stow_on_each_sample = true：保持 Off
        monitor.multi_probe_begin();
        assert_eq!(monitor.session_state(), MultiProbeState::Off);
        assert!(monitor.session_pending());

        let config = ProbeConfig {
            stow_on_each_sample: false,
            ..threshold_config(0.5)
        };
        let mut monitor = monitor_with(&[], &config);
        monitor.multi_probe_begin();
        assert_eq!(monitor.session_state(), MultiProbeState::First);
    }
}
