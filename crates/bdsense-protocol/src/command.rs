//! 命令操作码与编码
//!
//! 传感器侧命令是 ASCII 十进制操作码；此外控制器自身暴露一个
//! 字母前缀的定时器寄存器写入（`k <ms>`），用于归位轮询节流。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 传感器固定操作码
///
/// 数值与固件约定一一对应，不可改动。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Opcode {
    /// 读取当前距离
    ReadDistance = 1015,
    /// 读取固件版本（逐字节轮询）
    ReadVersion = 1016,
    /// 读取原始标定数据（逐样本轮询）
    ReadCalibrationData = 1017,
    /// 结束读取模式，传感器回到空闲
    FinishReading = 1018,
    /// 进入零点标定模式
    StartCalibration = 1019,
    /// 保存标定数据
    SaveCalibration = 1021,
    /// 重启传感器
    Reboot = 1022,
}

/// 向传感器/控制器发送的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 固定操作码
    Op(Opcode),
    /// 零点标定步进序号（0..=39），直接以十进制文本发送
    CalibrationStep(u16),
    /// 控制器内部定时器寄存器（毫秒）
    TimerInterval(u32),
}

impl Command {
    /// 编码为线上的 ASCII 字节
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Op(op) => u16::from(*op).to_string().into_bytes(),
            Command::CalibrationStep(n) => n.to_string().into_bytes(),
            Command::TimerInterval(ms) => format!("k {ms}").into_bytes(),
        }
    }
}

impl From<Opcode> for Command {
    fn from(op: Opcode) -> Self {
        Command::Op(op)
    }
}

/// 查询请求负载
///
/// 往返查询不携带操作码，而是一个小的寄存器选择负载。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRequest {
    /// 距离寄存器
    Distance,
    /// 逐字节轮询（版本字符串、标定数据转储）
    NextByte,
}

impl QueryRequest {
    /// 编码为线上的 ASCII 字节
    pub fn encode(&self) -> &'static [u8] {
        match self {
            QueryRequest::Distance => b"32",
            QueryRequest::NextByte => b"3",
        }
    }
}

/// 诊断命令选择器
///
/// 上层以小的有符号整数选择诊断序列，数值与固件的诊断约定
/// 保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i8)]
pub enum DiagnosticCommand {
    /// 读取固件版本字符串
    ReadVersion = -1,
    /// 读取一次距离并渲染为状态文本
    ReadDistance = -2,
    /// 原始标定数据转储（含安装高度检查）
    RawDump = -5,
    /// 零点标定扫掠
    ZeroSweep = -6,
    /// 重启传感器
    Reboot = -8,
}
