//! 探测引擎配置
//!
//! 数值/布尔/字符串选项带校验边界；支持从 TOML 文本加载。
//! 每次探测调用可以覆盖采样相关的默认值（见 [`ProbeOverrides`]）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scan::ScanTiming;

/// 触发阈值上界（毫米，开区间）
pub const POSITION_ENDSTOP_MAX_MM: f64 = 2.5;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Option '{option}' out of range: {value} (must be {bound})")]
    OutOfBounds {
        option: &'static str,
        value: f64,
        bound: &'static str,
    },

    #[error("Need at least {required} probe points for {name}")]
    InsufficientPoints { required: usize, name: String },

    #[error("Seems the mesh direction is not X, points count on x is {count}")]
    BadMeshDirection { count: usize },

    #[error("horizontal_move_z can't be less than probe's z_offset")]
    HorizontalMoveTooLow,

    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// 采样聚合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// 按轴算术平均
    #[serde(alias = "average")]
    Mean,
    /// 按 z 排序的中位样本
    Median,
}

/// 探测引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 探针名称（状态表面用）
    pub name: String,

    /// 探测进给速度（毫米/秒，> 0）
    pub speed: f64,
    /// 抬升速度（毫米/秒，> 0；缺省时取探测速度）
    pub lift_speed: Option<f64>,

    /// 探针相对喷嘴的偏移
    pub x_offset: f64,
    pub y_offset: f64,
    pub z_offset: f64,

    /// 虚拟 endstop 触发阈值（毫米，[0, 2.5)）
    pub position_endstop: f64,

    /// 每次采样后收起探针（批次会话退化为逐点收放）
    #[serde(alias = "deactivate_on_each_sample")]
    pub stow_on_each_sample: bool,

    /// 探测进给的 Z 下限（可为负）
    pub z_position_min: f64,

    /// 每点采样次数（≥ 1）
    pub samples: usize,
    /// 采样间回退距离（毫米，> 0）
    pub sample_retract_dist: f64,
    /// 采样聚合方式
    pub samples_result: AggregationMode,
    /// 采样极差容差（毫米，≥ 0）
    pub samples_tolerance: f64,
    /// 容差重试预算（≥ 0）
    pub samples_tolerance_retries: usize,

    /// 传感器是否支持不停机读取（连续扫描能力，构造期解析）
    pub no_stop_probe: bool,
    /// 连续扫描的列细分策略
    pub scan_timing: ScanTiming,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            name: "probe".to_string(),
            speed: 5.0,
            lift_speed: None,
            x_offset: 0.0,
            y_offset: 0.0,
            z_offset: 0.0,
            position_endstop: 0.0,
            stow_on_each_sample: true,
            z_position_min: 0.0,
            samples: 1,
            sample_retract_dist: 2.0,
            samples_result: AggregationMode::Mean,
            samples_tolerance: 0.100,
            samples_tolerance_retries: 0,
            no_stop_probe: false,
            scan_timing: ScanTiming::default(),
        }
    }
}

impl ProbeConfig {
    /// 从 TOML 文本加载并校验
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验全部选项边界
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speed <= 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "speed",
                value: self.speed,
                bound: "above 0",
            });
        }
        if let Some(lift) = self.lift_speed
            && lift <= 0.0
        {
            return Err(ConfigError::OutOfBounds {
                option: "lift_speed",
                value: lift,
                bound: "above 0",
            });
        }
        if !(0.0..POSITION_ENDSTOP_MAX_MM).contains(&self.position_endstop) {
            return Err(ConfigError::OutOfBounds {
                option: "position_endstop",
                value: self.position_endstop,
                bound: "in [0, 2.5)",
            });
        }
        if self.samples < 1 {
            return Err(ConfigError::OutOfBounds {
                option: "samples",
                value: self.samples as f64,
                bound: "at least 1",
            });
        }
        if self.sample_retract_dist <= 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "sample_retract_dist",
                value: self.sample_retract_dist,
                bound: "above 0",
            });
        }
        if self.samples_tolerance < 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "samples_tolerance",
                value: self.samples_tolerance,
                bound: "at least 0",
            });
        }
        Ok(())
    }

    /// 抬升速度（缺省回落到探测速度）
    pub fn lift_speed(&self) -> f64 {
        self.lift_speed.unwrap_or(self.speed)
    }

    /// 解析一次调用的有效参数（覆盖值优先，边界同配置）
    pub fn resolve(&self, overrides: &ProbeOverrides) -> Result<ProbeParams, ConfigError> {
        let params = ProbeParams {
            probe_speed: overrides.probe_speed.unwrap_or(self.speed),
            lift_speed: overrides.lift_speed.unwrap_or_else(|| self.lift_speed()),
            samples: overrides.samples.unwrap_or(self.samples),
            sample_retract_dist: overrides
                .sample_retract_dist
                .unwrap_or(self.sample_retract_dist),
            samples_tolerance: overrides.samples_tolerance.unwrap_or(self.samples_tolerance),
            samples_tolerance_retries: overrides
                .samples_tolerance_retries
                .unwrap_or(self.samples_tolerance_retries),
            samples_result: overrides.samples_result.unwrap_or(self.samples_result),
        };
        params.validate()?;
        Ok(params)
    }
}

/// 单次调用的覆盖值（未指定的项回落到配置默认）
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOverrides {
    pub probe_speed: Option<f64>,
    pub lift_speed: Option<f64>,
    pub samples: Option<usize>,
    pub sample_retract_dist: Option<f64>,
    pub samples_tolerance: Option<f64>,
    pub samples_tolerance_retries: Option<usize>,
    pub samples_result: Option<AggregationMode>,
}

/// 一次探测调用解析后的有效参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeParams {
    pub probe_speed: f64,
    pub lift_speed: f64,
    pub samples: usize,
    pub sample_retract_dist: f64,
    pub samples_tolerance: f64,
    pub samples_tolerance_retries: usize,
    pub samples_result: AggregationMode,
}

impl ProbeParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_speed <= 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "probe_speed",
                value: self.probe_speed,
                bound: "above 0",
            });
        }
        if self.lift_speed <= 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "lift_speed",
                value: self.lift_speed,
                bound: "above 0",
            });
        }
        if self.samples < 1 {
            return Err(ConfigError::OutOfBounds {
                option: "samples",
                value: self.samples as f64,
                bound: "at least 1",
            });
        }
        if self.sample_retract_dist <= 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "sample_retract_dist",
                value: self.sample_retract_dist,
                bound: "above 0",
            });
        }
        if self.samples_tolerance < 0.0 {
            return Err(ConfigError::OutOfBounds {
                option: "samples_tolerance",
                value: self.samples_tolerance,
                bound: "at least 0",
            });
        }
        Ok(())
    }
}
