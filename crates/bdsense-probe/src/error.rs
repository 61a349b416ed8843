//! 探测引擎错误类型定义

use bdsense_channel::ChannelError;
use bdsense_protocol::MountingFault;
use thiserror::Error;

use crate::config::ConfigError;
use crate::motion::MotionError;

/// 归位超时的补充提示
pub const HINT_TIMEOUT: &str = "\
If the probe did not move far enough to trigger, then
consider reducing the Z axis minimum position so the probe
can travel further (the Z minimum position can be negative).";

/// 探测引擎错误类型
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 探测前置条件：轴未归位
    #[error("Must home before probe")]
    NotHomed,

    /// 采样极差超出容差且重试预算耗尽
    #[error(
        "Probe samples exceed samples_tolerance: \
         spread {spread_mm:.6} > {tolerance_mm:.6}"
    )]
    ToleranceExceeded { spread_mm: f64, tolerance_mm: f64 },

    /// 归位进给在触发前超时
    #[error("Timeout during endstop homing\n{HINT_TIMEOUT}")]
    ProbingTimeout,

    /// 收放探针脚本期间工具头发生了移动
    #[error("Toolhead moved during probe {script} script")]
    MotionAborted { script: &'static str },

    /// 连续扫描在采满所有列之前结束
    #[error("Continuous scan ended early: sampled {sampled} of {expected} columns")]
    ScanIncomplete { sampled: usize, expected: usize },

    /// 未映射的诊断选择器
    #[error("Unknown diagnostic selector: {0}")]
    UnknownSelector(i8),

    /// 安装高度故障（标定诊断）
    #[error(transparent)]
    Mounting(#[from] MountingFault),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 传感器通道错误（含连接故障/超量程，携带测量值）
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// 运动协作方错误
    #[error("Motion command error: {0}")]
    Motion(MotionError),
}

impl From<MotionError> for ProbeError {
    fn from(e: MotionError) -> Self {
        match e {
            // 归位超时附带提示文本
            MotionError::EndstopTimeout => ProbeError::ProbingTimeout,
            other => ProbeError::Motion(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_message_carries_values() {
        let err = ProbeError::ToleranceExceeded {
            spread_mm: 0.09,
            tolerance_mm: 0.05,
        };
        let msg = format!("{err}");
        assert!(msg.contains("0.090000"));
        assert!(msg.contains("0.050000"));
    }

    #[test]
    fn test_endstop_timeout_gets_hint() {
        let err: ProbeError = MotionError::EndstopTimeout.into();
        let msg = format!("{err}");
        assert!(msg.contains("Timeout during endstop homing"));
        assert!(msg.contains("Z minimum position can be negative"));
    }

    #[test]
    fn test_other_motion_errors_pass_through() {
        let err: ProbeError = MotionError::CommandFailed("stall".to_string()).into();
        assert!(matches!(err, ProbeError::Motion(_)));
        assert!(format!("{err}").contains("stall"));
    }

    #[test]
    fn test_sensor_fault_message_carries_value() {
        let err = ProbeError::Channel(ChannelError::ConnectionFault { value_mm: 10.3 });
        assert!(format!("{err}").contains("10.30"));
    }
}
