//! # BDsense Protocol
//!
//! 床距传感器的请求-响应协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 命令操作码与编码
//! - `reading`: 原始码标定与读数分类
//! - `mounting`: 安装高度诊断阈值
//!
//! ## 线格式
//!
//! 命令以 ASCII 十进制文本发送（如 `"1015"`）；传感器响应为
//! ASCII 十进制整数原始码。标定距离 = 原始码 / 100（毫米）。
//! 特殊数值段携带语义而非噪声，阈值以命名常量形式保留以保证
//! 协议兼容（见 [`reading`]）。

pub mod command;
pub mod mounting;
pub mod reading;

// 重新导出常用类型
pub use command::{Command, DiagnosticCommand, Opcode, QueryRequest};
pub use mounting::{MountingCheck, MountingFault};
pub use reading::{RawCode, ReadingStatus, SensorReading};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty response from sensor")]
    EmptyResponse,

    #[error("Invalid response text: {text:?}")]
    InvalidResponse { text: String },

    #[error("Raw code out of protocol range: {value}")]
    RawCodeOverflow { value: i64 },

    #[error("Unknown diagnostic selector: {selector}")]
    UnknownSelector { selector: i8 },
}

/// 解析传感器的 ASCII 十进制响应为原始码
///
/// 响应允许带前后空白（控制器会在行尾附加换行）。
pub fn parse_raw_code(response: &[u8]) -> Result<RawCode, ProtocolError> {
    let text = core::str::from_utf8(response)
        .map_err(|_| ProtocolError::InvalidResponse {
            text: String::from_utf8_lossy(response).into_owned(),
        })?
        .trim();
    if text.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }
    let value: i64 = text.parse().map_err(|_| ProtocolError::InvalidResponse {
        text: text.to_string(),
    })?;
    let raw = u16::try_from(value).map_err(|_| ProtocolError::RawCodeOverflow { value })?;
    Ok(RawCode(raw))
}
