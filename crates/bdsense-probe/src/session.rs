//! 多点探测会话状态机
//!
//! 一个批次内的多次探测共享一对探针收/放动作：会话把传感器
//! 激活从"每点一次"摊销为"每批一次"。状态严格按
//! Off → First → On → Off 推进，且不可重入；只有 `end` 是
//! 幂等的（错误路径的拆除也要走它）。

/// 多点探测会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiProbeState {
    /// 无会话：每个点独立收放探针
    #[default]
    Off,
    /// 会话已开始，等待第一个点的 prepare
    First,
    /// 批次进行中，探针保持展开
    On,
}

impl MultiProbeState {
    /// 会话是否占用探针
    pub fn is_active(self) -> bool {
        self != MultiProbeState::Off
    }

    /// 批次开始：Off → First
    ///
    /// 配置要求每次采样收起探针时保持 Off（探针仍按点收放）。
    pub fn begin(self, stow_on_each_sample: bool) -> Self {
        if stow_on_each_sample {
            return self;
        }
        match self {
            MultiProbeState::Off => MultiProbeState::First,
            other => other,
        }
    }

    /// 第一个点的 prepare 之后：First → On
    pub fn after_prepare(self) -> Self {
        match self {
            MultiProbeState::First => MultiProbeState::On,
            other => other,
        }
    }

    /// 批次结束：回到 Off
    pub fn end(self) -> Self {
        MultiProbeState::Off
    }
}
