//! 安装高度诊断阈值
//!
//! 原始标定数据转储期间，按样本原始码判断传感器的安装高度。
//! 推荐安装高度为零位时距床 0.4 mm 至 2.4 mm。

use thiserror::Error;

/// 过高/过近的严重组合阈值：原始码严格大于此值即为致命安装错误
pub const SEVERE_RAW_THRESHOLD: u16 = 1015;

/// 过高阈值：前几个样本内原始码大于此值提示安装过高
pub const TOO_HIGH_RAW_THRESHOLD: u16 = 550;

/// 过近阈值：原始码小于此值提示安装过近
pub const TOO_CLOSE_RAW_THRESHOLD: u16 = 45;

/// 过高判断只在转储的前几个样本内生效（样本序号 0..=3）
pub const EARLY_SAMPLE_WINDOW: usize = 3;

/// 安装高度故障
///
/// 只有 [`MountingFault::TooCloseOrTooHigh`] 是致命错误；
/// 其余两种作为诊断文本报告。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountingFault {
    #[error(
        "BDsense mounted too close or too high (raw {raw})! \
         0.4mm to 2.4mm from bed at zero position is recommended"
    )]
    TooCloseOrTooHigh { raw: u16 },

    #[error(
        "BDsense mounted too high (raw {raw})! \
         0.4mm to 2.4mm from bed at zero position is recommended"
    )]
    TooHigh { raw: u16 },

    #[error("BDsense mounted too close (raw {raw})! please mount the sensor 0.2~0.4mm higher")]
    TooClose { raw: u16 },
}

impl MountingFault {
    /// 是否必须中止标定
    pub fn is_fatal(&self) -> bool {
        matches!(self, MountingFault::TooCloseOrTooHigh { .. })
    }
}

/// 单个标定样本的安装高度检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountingCheck {
    /// 样本正常，继续转储
    Ok,
    /// 检出安装故障（是否致命见 [`MountingFault::is_fatal`]）
    Fault(MountingFault),
}

/// 检查一个标定样本
///
/// `sample_index` 是样本在转储中的序号（从 0 起）；过高类阈值
/// 只在前 [`EARLY_SAMPLE_WINDOW`] + 1 个样本内适用。
pub fn check_mounting(raw: u16, sample_index: usize) -> MountingCheck {
    if sample_index <= EARLY_SAMPLE_WINDOW && raw > TOO_HIGH_RAW_THRESHOLD {
        if raw > SEVERE_RAW_THRESHOLD {
            return MountingCheck::Fault(MountingFault::TooCloseOrTooHigh { raw });
        }
        return MountingCheck::Fault(MountingFault::TooHigh { raw });
    }
    if raw < TOO_CLOSE_RAW_THRESHOLD {
        return MountingCheck::Fault(MountingFault::TooClose { raw });
    }
    MountingCheck::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severe_threshold() {
        // > 1015 为致命；1015 本身只算过高
        assert_eq!(
            check_mounting(1016, 0),
            MountingCheck::Fault(MountingFault::TooCloseOrTooHigh { raw: 1016 })
        );
        assert_eq!(
            check_mounting(1015, 0),
            MountingCheck::Fault(MountingFault::TooHigh { raw: 1015 })
        );
        assert!(MountingFault::TooCloseOrTooHigh { raw: 1016 }.is_fatal());
        assert!(!MountingFault::TooHigh { raw: 1015 }.is_fatal());
    }

    #[test]
    fn test_too_high_only_in_early_window() {
        assert_eq!(
            check_mounting(600, 3),
            MountingCheck::Fault(MountingFault::TooHigh { raw: 600 })
        );
        // 窗口之外不再判定过高
        assert_eq!(check_mounting(600, 4), MountingCheck::Ok);
    }

    #[test]
    fn test_too_close() {
        assert_eq!(
            check_mounting(44, 10),
            MountingCheck::Fault(MountingFault::TooClose { raw: 44 })
        );
        assert_eq!(check_mounting(45, 10), MountingCheck::Ok);
    }

    #[test]
    fn test_nominal_band() {
        for raw in [45u16, 100, 300, 550] {
            assert_eq!(check_mounting(raw, 0), MountingCheck::Ok);
        }
    }
}
