//! 传感器请求-响应通道
//!
//! 在 [`BusTransport`] 之上实现协议往返：命令编码、响应解析、
//! 坏读哨兵的一次性重查，以及三种校验模式的距离读取。

use bdsense_protocol::{
    Command, Opcode, QueryRequest, RawCode, ReadingStatus, SensorReading, parse_raw_code,
};
use tracing::{debug, trace, warn};

use crate::{BusTransport, ChannelError};

/// 距离读取的校验模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// 直接读取；连接错误与超量程都是致命错误
    Checked,
    /// 强制刷新后读取；仅连接错误致命（归位轮询不得把连接
    /// 错误当作触发或未触发）
    Endstop,
    /// 强制刷新后读取；不校验（诊断显示路径）
    Unchecked,
}

/// 传感器通道
///
/// 独占持有（借用的）传输；缓存的最近读数只用于状态表面，
/// 在定义好的读取点更新，绝不回馈给探测逻辑。
pub struct SensorChannel<T> {
    transport: T,
    last_reading: Option<SensorReading>,
}

impl<T: BusTransport> SensorChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            last_reading: None,
        }
    }

    /// 最近一次距离读数（状态表面用）
    pub fn last_reading(&self) -> Option<SensorReading> {
        self.last_reading
    }

    /// 发送 fire-and-forget 命令
    pub fn send(&mut self, command: Command) -> Result<(), ChannelError> {
        let data = command.encode();
        trace!(command = ?command, "sensor send");
        self.transport.send(&data)
    }

    /// 阻塞往返查询
    ///
    /// 传感器偶尔会回显一个陈旧/乱码的大数值（原始码 ≥ 1024）；
    /// 遇到时恰好追加一次查询，第二个响应无条件接受，避免无限
    /// 重试。
    pub fn query(&mut self, request: QueryRequest) -> Result<RawCode, ChannelError> {
        let response = self.transport.query(request.encode())?;
        let raw = parse_raw_code(&response)?;
        if raw.is_malformed() {
            debug!(raw = raw.0, "malformed raw code, re-querying once");
            let response = self.transport.query(request.encode())?;
            return Ok(parse_raw_code(&response)?);
        }
        Ok(raw)
    }

    /// 读取一次距离
    ///
    /// 每次都是新读数，绝不跨探测尝试缓存；`mode` 决定是否先
    /// 强制传感器刷新，以及哪些哨兵段视为致命。
    pub fn read_distance(&mut self, mode: ReadMode) -> Result<SensorReading, ChannelError> {
        if mode != ReadMode::Checked {
            // 强制重读：先通知传感器结束当前读取
            self.send(Command::Op(Opcode::FinishReading))?;
        }
        let raw = self.query(QueryRequest::Distance)?;
        let reading = SensorReading::from_raw(raw);
        self.last_reading = Some(reading);

        match (mode, reading.status) {
            (ReadMode::Unchecked, _) => Ok(reading),
            (_, ReadingStatus::ConnectionError) => {
                warn!(value_mm = reading.value_mm, "sensor connection fault");
                Err(ChannelError::ConnectionFault {
                    value_mm: reading.value_mm,
                })
            }
            (ReadMode::Checked, ReadingStatus::OutOfRange) => {
                warn!(value_mm = reading.value_mm, "sensor target out of range");
                Err(ChannelError::OutOfRange {
                    value_mm: reading.value_mm,
                })
            }
            _ => Ok(reading),
        }
    }

    /// 访问底层传输（诊断序列需要直接轮询）
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
