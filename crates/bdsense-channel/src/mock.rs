//! Mock 传输（无硬件依赖）
//!
//! 脚本化的 [`BusTransport`] 实现，供本 crate 与上层 crate 的
//! 测试使用：预先入队响应，事后检查发送/查询记录。

use std::collections::VecDeque;

use crate::{BusTransport, ChannelError};

/// 脚本化 mock 传输
#[derive(Debug, Default)]
pub struct MockTransport {
    /// fire-and-forget 命令记录
    pub sent: Vec<Vec<u8>>,
    /// 查询负载记录
    pub queried: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队一条原始文本响应
    pub fn enqueue_response(&mut self, text: &str) {
        self.responses.push_back(text.as_bytes().to_vec());
    }

    /// 入队一个原始码响应
    pub fn enqueue_raw(&mut self, raw: u16) {
        self.enqueue_response(&raw.to_string());
    }

    /// 剩余未消费的响应条数
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }
}

impl BusTransport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        self.sent.push(data.to_vec());
        Ok(())
    }

    fn query(&mut self, data: &[u8]) -> Result<Vec<u8>, ChannelError> {
        self.queried.push(data.to_vec());
        self.responses.pop_front().ok_or(ChannelError::Timeout)
    }
}
