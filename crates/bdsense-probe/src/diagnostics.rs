//! 诊断命令面
//!
//! 小的有符号整数选择器映射到一组固定的短命令脚本，全部直接
//! 架在传感器通道上并受迭代上限约束。这些序列绝不触碰多点
//! 探测会话状态。

use std::time::Duration;

use bdsense_channel::{BusTransport, ReadMode};
use bdsense_protocol::mounting::{MountingCheck, check_mounting};
use bdsense_protocol::reading::clamp_printable;
use bdsense_protocol::{Command, DiagnosticCommand, Opcode, QueryRequest};
use tracing::info;

use crate::error::ProbeError;
use crate::motion::{Axis, MotionController};
use crate::probe::Probe;

/// 版本字符串的固定轮询次数
const VERSION_POLLS: usize = 20;

/// 原始数据转储的轮询上限
const DUMP_POLLS_MAX: usize = 40;

/// 零点标定扫掠的步进次数
const SWEEP_STEPS: u16 = 40;

/// 逐字节轮询之间的驻留
const POLL_DWELL: Duration = Duration::from_millis(100);

/// 扫掠开始前的稳定驻留
const SWEEP_SETTLE: Duration = Duration::from_millis(800);

/// 扫掠每步前后的驻留
const SWEEP_STEP_DWELL: Duration = Duration::from_millis(200);

/// 保存标定数据的驻留
const SAVE_DWELL: Duration = Duration::from_secs(1);

/// 扫掠单步距离（毫米）
const SWEEP_STEP_MM: f64 = 0.1;

/// 扫掠步进速度（毫米/秒）
const SWEEP_SPEED: f64 = 5.0;

/// 扫掠步进加速度（毫米/秒²）
const SWEEP_ACCEL: f64 = 1000.0;

impl<T: BusTransport> Probe<T> {
    /// 运行一个诊断序列
    ///
    /// 未映射的选择器被拒绝；返回序列产出的文本行。序列正常
    /// 结束后通知传感器结束读取（两次，容忍单次丢失）。
    pub fn run_diagnostic(
        &mut self,
        motion: &mut dyn MotionController,
        selector: i8,
    ) -> Result<Vec<String>, ProbeError> {
        let command = DiagnosticCommand::try_from(selector)
            .map_err(|_| ProbeError::UnknownSelector(selector))?;
        info!(command = ?command, "running sensor diagnostic");

        let mut lines = Vec::new();
        let result = match command {
            DiagnosticCommand::ReadVersion => self.diag_read_version(motion, &mut lines),
            DiagnosticCommand::ReadDistance => self.diag_read_distance(&mut lines),
            DiagnosticCommand::RawDump => self.diag_raw_dump(motion, &mut lines),
            DiagnosticCommand::ZeroSweep => self.diag_zero_sweep(motion, &mut lines),
            DiagnosticCommand::Reboot => self.diag_reboot(),
        };
        if result.is_ok() {
            let channel = self.endstop_mut().channel_mut();
            channel.send(Command::Op(Opcode::FinishReading))?;
            channel.send(Command::Op(Opcode::FinishReading))?;
        }
        result.map(|()| lines)
    }

    /// 固件版本读取：20 字节轮询，钳制到可打印 ASCII
    fn diag_read_version(
        &mut self,
        motion: &mut dyn MotionController,
        lines: &mut Vec<String>,
    ) -> Result<(), ProbeError> {
        let channel = self.endstop_mut().channel_mut();
        channel.send(Command::Op(Opcode::ReadVersion))?;
        channel.send(Command::Op(Opcode::ReadVersion))?;

        let mut bytes = Vec::with_capacity(VERSION_POLLS);
        for _ in 0..VERSION_POLLS {
            let raw = channel.query(QueryRequest::NextByte)?;
            bytes.push(clamp_printable(raw.0));
            motion.dwell(POLL_DWELL);
        }
        channel.send(Command::Op(Opcode::FinishReading))?;

        let version: String = bytes.into_iter().map(char::from).collect();
        info!(version = %version, "sensor firmware version");
        lines.push(version);
        Ok(())
    }

    /// 距离读取：渲染为状态文本，哨兵段用错误字符串表示
    fn diag_read_distance(&mut self, lines: &mut Vec<String>) -> Result<(), ProbeError> {
        let reading = self.endstop_mut().read_distance(ReadMode::Unchecked)?;
        lines.push(reading.display_string());
        Ok(())
    }

    /// 原始标定数据转储，带安装高度检查
    ///
    /// 最严重的"过近或过高"组合是致命错误；其余故障只作为
    /// 诊断文本报告并终止转储。
    fn diag_raw_dump(
        &mut self,
        motion: &mut dyn MotionController,
        lines: &mut Vec<String>,
    ) -> Result<(), ProbeError> {
        let channel = self.endstop_mut().channel_mut();
        channel.send(Command::Op(Opcode::ReadCalibrationData))?;
        channel.send(Command::Op(Opcode::ReadCalibrationData))?;

        for index in 0..DUMP_POLLS_MAX {
            let raw = channel.query(QueryRequest::NextByte)?;
            lines.push(raw.0.to_string());
            match check_mounting(raw.0, index) {
                MountingCheck::Fault(fault) if fault.is_fatal() => {
                    lines.push(fault.to_string());
                    return Err(fault.into());
                }
                MountingCheck::Fault(fault) => {
                    lines.push(fault.to_string());
                    break;
                }
                MountingCheck::Ok => {}
            }
            motion.dwell(POLL_DWELL);
        }
        Ok(())
    }

    /// 零点标定扫掠
    ///
    /// 逐步抬升被测轴并反复通知传感器重新基准化，最后下发
    /// 保存命令。扫掠期间不得断电。
    fn diag_zero_sweep(
        &mut self,
        motion: &mut dyn MotionController,
        lines: &mut Vec<String>,
    ) -> Result<(), ProbeError> {
        lines.push("Calibrating from 0.0mm to 3.9mm, don't power off the printer".to_string());
        {
            let channel = self.endstop_mut().channel_mut();
            channel.send(Command::Op(Opcode::StartCalibration))?;
            channel.send(Command::Op(Opcode::StartCalibration))?;
        }
        motion.force_enable_steppers()?;
        motion.wait_moves()?;
        lines.push("Please Waiting...".to_string());
        motion.dwell(SWEEP_SETTLE);

        for step in 0..SWEEP_STEPS {
            {
                let channel = self.endstop_mut().channel_mut();
                for _ in 0..4 {
                    channel.send(Command::CalibrationStep(step))?;
                }
            }
            motion.dwell(SWEEP_STEP_DWELL);
            motion.step_axis(Axis::Z, SWEEP_STEP_MM, SWEEP_SPEED, SWEEP_ACCEL)?;
            motion.wait_moves()?;
            motion.dwell(SWEEP_STEP_DWELL);
        }

        self.endstop_mut()
            .channel_mut()
            .send(Command::Op(Opcode::SaveCalibration))?;
        motion.dwell(SAVE_DWELL);
        lines.push("Calibrate Finished!".to_string());
        lines.push("Raw calibration data can be checked with the raw dump diagnostic".to_string());
        Ok(())
    }

    /// 重启传感器：单条 fire-and-forget 命令
    fn diag_reboot(&mut self) -> Result<(), ProbeError> {
        self.endstop_mut()
            .channel_mut()
            .send(Command::Op(Opcode::Reboot))?;
        Ok(())
    }
}
