//! 原始码标定与读数分类
//!
//! 传感器返回的整数原始码经 `raw / 100` 标定为毫米距离。
//! 特定数值段不是噪声而是状态信号，阈值以命名常量保留：
//!
//! - 原始码 ≥ [`RAW_MALFORMED_MIN`]：一次性坏读（通道层重查一次）
//! - 标定值 ≥ [`CONNECTION_ERROR_MM`]：接线/连接故障
//! - 标定值 ∈ ([`OUT_OF_RANGE_MIN_MM`], [`CONNECTION_ERROR_MM`])：
//!   目标超出可测量程，用户侧按 [`OUT_OF_RANGE_DISPLAY_MM`] 段报告

/// 标定比例：毫米 = 原始码 / 100
pub const RAW_SCALE: f64 = 100.0;

/// 坏读哨兵：原始码达到此值时通道层重新查询一次
pub const RAW_MALFORMED_MIN: u16 = 1024;

/// 连接错误哨兵（毫米）
pub const CONNECTION_ERROR_MM: f64 = 10.24;

/// 超量程下界（毫米），标定值严格大于此值视为超量程
pub const OUT_OF_RANGE_MIN_MM: f64 = 3.8;

/// 超量程的用户可见报告值（毫米）
pub const OUT_OF_RANGE_DISPLAY_MM: f64 = 3.9;

/// 传感器原始码
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawCode(pub u16);

impl RawCode {
    /// 标定为毫米距离
    pub fn to_millimeters(self) -> f64 {
        f64::from(self.0) / RAW_SCALE
    }

    /// 是否为坏读哨兵（需要通道层重查一次）
    pub fn is_malformed(self) -> bool {
        self.0 >= RAW_MALFORMED_MIN
    }
}

/// 把版本轮询返回的原始码钳制到可打印 ASCII 区间
///
/// 固件版本按字节轮询返回；坏读钳到区间端点而不是丢弃，
/// 保证版本字符串长度固定。
pub fn clamp_printable(code: u16) -> u8 {
    code.clamp(0x20, 0x7F) as u8
}

/// 读数状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadingStatus {
    /// 正常距离值
    Valid,
    /// 连接/接线错误（标定值 ≥ 10.24 mm）
    ConnectionError,
    /// 目标超出可测量程（标定值在 (3.8, 10.24) mm）
    OutOfRange,
}

/// 一次传感器读数
///
/// 产生后不可变；每次探测尝试都重新读取，绝不跨尝试缓存。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorReading {
    /// 标定距离（毫米）
    pub value_mm: f64,
    /// 分类状态
    pub status: ReadingStatus,
}

impl SensorReading {
    /// 由原始码标定并分类
    pub fn from_raw(raw: RawCode) -> Self {
        let value_mm = raw.to_millimeters();
        let status = if value_mm >= CONNECTION_ERROR_MM {
            ReadingStatus::ConnectionError
        } else if value_mm > OUT_OF_RANGE_MIN_MM {
            ReadingStatus::OutOfRange
        } else {
            ReadingStatus::Valid
        };
        Self { value_mm, status }
    }

    /// 是否为可用距离值
    pub fn is_valid(&self) -> bool {
        self.status == ReadingStatus::Valid
    }

    /// 渲染为状态栏文本
    pub fn display_string(&self) -> String {
        match self.status {
            ReadingStatus::Valid => format!("{:.2}mm", self.value_mm),
            ReadingStatus::ConnectionError => "BDsense: connection error".to_string(),
            ReadingStatus::OutOfRange => "BDsense: out of measure range".to_string(),
        }
    }
}
