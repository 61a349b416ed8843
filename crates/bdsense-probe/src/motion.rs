//! 运动协作方接口
//!
//! 引擎在构造/调用时注入类型化的运动控制句柄，不做任何运行时
//! 服务查找。引擎只通过此接口读取与下发运动，从不直接改写
//! 运动状态。

use std::time::Duration;

use bdsense_tools::Position3D;
use thiserror::Error;

use crate::endstop::EndstopState;
use crate::error::ProbeError;

/// 机器轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// 移动目标：未指定的轴保持当前坐标
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveTarget {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl MoveTarget {
    /// 只移动 Z
    pub fn z_only(z: f64) -> Self {
        Self {
            z: Some(z),
            ..Self::default()
        }
    }

    /// 只移动 XY
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: None,
        }
    }

    /// 三轴全指定
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

impl From<Position3D> for MoveTarget {
    fn from(pos: Position3D) -> Self {
        Self::xyz(pos.x, pos.y, pos.z)
    }
}

/// 运动协作方错误
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("Motion command failed: {0}")]
    CommandFailed(String),

    /// 归位进给在触发前超时
    #[error("Timeout during endstop homing")]
    EndstopTimeout,

    /// 归位监视被外部中止
    #[error("Homing move was aborted")]
    HomingAborted,
}

/// 虚拟 endstop 轮询接口
///
/// 引擎把自己作为此接口交给归位原语；归位机制在进给期间反复
/// 轮询，每次都是新读数（机械位置在变化中，绝不缓存）。
pub trait EndstopPoller {
    fn query_endstop(&mut self) -> Result<EndstopState, ProbeError>;
}

/// 运动控制接口
///
/// 所有坐标为机器坐标（毫米），时间为机器时间（秒）。
pub trait MotionController {
    /// 当前指令位置
    fn get_position(&self) -> Position3D;

    /// 下发一次手动移动
    fn manual_move(&mut self, target: MoveTarget, speed: f64) -> Result<(), MotionError>;

    /// 阻塞直到运动队列排空
    fn wait_moves(&mut self) -> Result<(), MotionError>;

    /// 在运动队列中插入一段驻留
    fn dwell(&mut self, duration: Duration);

    /// 指定轴是否已归位
    fn is_homed(&self, axis: Axis) -> bool;

    /// 归位修正：把当前 Z 坐标重写为给定值
    fn set_z_position(&mut self, z: f64) -> Result<(), MotionError>;

    /// 归位原语：向目标 Z 进给直至 endstop 触发，返回触发位置
    ///
    /// 进给期间反复轮询 `endstop`；轮询产生的传感器故障原样
    /// 向上传播（不得折叠成触发/未触发）。
    fn probing_move(
        &mut self,
        endstop: &mut dyn EndstopPoller,
        z_target: f64,
        speed: f64,
    ) -> Result<Position3D, ProbeError>;

    /// 开始一次硬件归位监视
    fn home_start(&mut self, rest_time: Duration) -> Result<(), MotionError>;

    /// 阻塞等待归位完成原语
    fn home_wait(&mut self, endstop: &mut dyn EndstopPoller) -> Result<(), ProbeError>;

    // === 连续扫描所需的运动队列时序 ===

    /// 冲刷运动前瞻队列，使时序估计立即可用
    fn flush_lookahead(&mut self) -> Result<(), MotionError>;

    /// 当前估计的已流逝机器时间（秒）
    fn estimated_elapsed_time(&self) -> f64;

    /// 队列中最后一个移动的结束时间（秒）
    fn queued_move_end_time(&self) -> f64;

    /// 运动队列是否仍在执行（未进入暂停/特殊排队状态）
    fn is_motion_active(&self) -> bool;

    // === 标定序列 ===

    /// 强制使能全部步进电机
    fn force_enable_steppers(&mut self) -> Result<(), MotionError>;

    /// 把单轴步进给定距离（标定扫掠的微步进）
    fn step_axis(
        &mut self,
        axis: Axis,
        distance: f64,
        speed: f64,
        accel: f64,
    ) -> Result<(), MotionError>;

    // === 探针收放脚本 ===

    /// 运行探针展开脚本
    fn run_activate_script(&mut self) -> Result<(), MotionError>;

    /// 运行探针收起脚本
    fn run_deactivate_script(&mut self) -> Result<(), MotionError>;
}
