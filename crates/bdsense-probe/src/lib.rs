//! # BDsense Probe Engine
//!
//! 床距传感器的探测引擎：把一条慢速、易出错的传感器通道变成
//! （a）归位状态机可用的虚拟二值 endstop，和（b）通过逐点停测
//! 或运动中连续扫描采集的床面高度图。
//!
//! ## 模块
//!
//! - `motion`: 运动协作方接口（构造期注入，无服务查找）
//! - `session`: 多点探测会话状态机（Off → First → On → Off）
//! - `endstop`: 虚拟 endstop 监视器与归位括号
//! - `probe`: 采样引擎（容差重试、均值/中位数聚合、精度报告）
//! - `points`: 批量点位探测助手（逐点遍历 + 连续扫描回落）
//! - `scan`: 运动同步连续扫描
//! - `diagnostics`: 诊断命令面（版本/转储/零点扫掠/重启）
//! - `config`: 配置与边界校验
//! - `error`: 错误分类
//!
//! ## 并发模型
//!
//! 单逻辑控制流：传感器往返对调用方是同步阻塞的；扫描轮询
//! 循环以有界短睡让出，与运动队列冲刷合作推进。同一时刻至多
//! 一个探测/归位序列在飞行中（由调用方的命令串行化保证）。

pub mod config;
pub mod diagnostics;
pub mod endstop;
pub mod error;
pub mod motion;
pub mod points;
pub mod probe;
pub mod scan;
pub mod session;

// 重新导出常用类型
pub use config::{AggregationMode, ConfigError, ProbeConfig, ProbeOverrides, ProbeParams};
pub use endstop::{ENDSTOP_REST_TIME, EndstopMonitor, EndstopState};
pub use error::{HINT_TIMEOUT, ProbeError};
pub use motion::{Axis, EndstopPoller, MotionController, MotionError, MoveTarget};
pub use points::{
    FinalizeCallback, FinalizeVerdict, PointsConfig, PointsRequest, ProbePointsHelper,
};
pub use probe::{Probe, ProbePurpose, ProbeRequest, ProbeStatus, SampleSet};
pub use scan::{SCAN_POLL_INTERVAL, ScanLine, ScanOptions, ScanTiming, group_scan_lines};
pub use session::MultiProbeState;
