//! # BDsense Channel Layer
//!
//! 传感器总线抽象层，提供统一的传输接口与请求-响应通道。
//!
//! 传感器挂在一条慢速虚拟双线总线上（任意两个 GPIO 模拟），
//! 底层排队与位时序由外部控制器负责；本层只看到两种操作：
//! fire-and-forget 的 [`BusTransport::send`] 与阻塞往返的
//! [`BusTransport::query`]。

use bdsense_protocol::{ProtocolError, SensorReading};
use thiserror::Error;

pub mod channel;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use channel::{ReadMode, SensorChannel};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;

/// 通道层统一错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Query timeout")]
    Timeout,

    #[error("Transport closed")]
    Closed,

    /// 连接/接线故障（标定值 ≥ 10.24 mm 哨兵段）
    #[error("Bed distance sensor data error: {value_mm:.2}")]
    ConnectionFault { value_mm: f64 },

    /// 目标超出可测量程
    #[error("Bed distance sensor out of range: {value_mm:.2}")]
    OutOfRange { value_mm: f64 },
}

impl ChannelError {
    /// 从一个非 Valid 的读数构造对应故障
    pub fn from_reading(reading: &SensorReading) -> Option<Self> {
        use bdsense_protocol::ReadingStatus;
        match reading.status {
            ReadingStatus::Valid => None,
            ReadingStatus::ConnectionError => Some(ChannelError::ConnectionFault {
                value_mm: reading.value_mm,
            }),
            ReadingStatus::OutOfRange => Some(ChannelError::OutOfRange {
                value_mm: reading.value_mm,
            }),
        }
    }
}

/// 传感器总线传输接口
///
/// 由外部控制器适配实现；引擎只借用传输，从不拥有。
/// `&mut T` 的 blanket 实现允许把借用直接交给 [`SensorChannel`]。
pub trait BusTransport {
    /// fire-and-forget 请求，无响应
    fn send(&mut self, data: &[u8]) -> Result<(), ChannelError>;

    /// 阻塞往返，返回响应字节
    fn query(&mut self, data: &[u8]) -> Result<Vec<u8>, ChannelError>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        (**self).send(data)
    }

    fn query(&mut self, data: &[u8]) -> Result<Vec<u8>, ChannelError> {
        (**self).query(data)
    }
}

/// 虚拟双线总线的建立参数
///
/// 在控制器初始化时下发一次；`home_position` 以原始码单位
/// 存放触发阈值（毫米 × 100）。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TwoWireBusConfig {
    /// 数据脚
    pub sda_pin: String,
    /// 时钟脚
    pub scl_pin: String,
    /// 位延迟（控制器时钟节拍）
    pub bit_delay: u32,
    /// 触发阈值（原始码单位）
    pub home_position: u16,
}

impl TwoWireBusConfig {
    /// 生成控制器建立命令行
    pub fn config_message(&self) -> String {
        format!(
            "config_BD_bus sda_pin={} scl_pin={} delay={} h_pos={}",
            self.sda_pin, self.scl_pin, self.bit_delay, self.home_position
        )
    }
}
