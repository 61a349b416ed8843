//! 诊断命令面集成测试

mod common;

use bdsense_channel::MockTransport;
use bdsense_probe::{Probe, ProbeConfig, ProbeError};
use common::SimMotion;

fn probe() -> Probe<MockTransport> {
    Probe::new(MockTransport::new(), ProbeConfig::default()).unwrap()
}

fn enqueue_raw(probe: &mut Probe<MockTransport>, raw: u16) {
    probe
        .endstop_mut()
        .channel_mut()
        .transport_mut()
        .enqueue_raw(raw);
}

fn sent_count(probe: &mut Probe<MockTransport>, cmd: &[u8]) -> usize {
    probe
        .endstop_mut()
        .channel_mut()
        .transport_mut()
        .sent
        .iter()
        .filter(|c| c.as_slice() == cmd)
        .count()
}

#[test]
fn test_unknown_selector_is_rejected() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    let err = probe.run_diagnostic(&mut motion, -3).unwrap_err();
    assert!(matches!(err, ProbeError::UnknownSelector(-3)));
    // 错误路径不发结束命令
    assert_eq!(sent_count(&mut probe, b"1018"), 0);
}

#[test]
fn test_read_version_clamps_to_printable_ascii() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    // "Bds V1.2" + 填充；5 钳到空格，200 钳到 0x7F
    let codes: [u16; 20] = [
        66, 100, 115, 32, 86, 49, 46, 50, 5, 200, 32, 32, 32, 32, 32, 32, 32, 32, 32, 32,
    ];
    for code in codes {
        enqueue_raw(&mut probe, code);
    }

    let lines = probe.run_diagnostic(&mut motion, -1).unwrap();
    assert_eq!(lines.len(), 1);
    let expected = format!("Bds V1.2 \u{7f}{}", " ".repeat(10));
    assert_eq!(lines[0], expected);
    assert_eq!(sent_count(&mut probe, b"1016"), 2);
    // 序列内一次 + 公共收尾两次
    assert_eq!(sent_count(&mut probe, b"1018"), 3);
    // 每个字节之间驻留 100ms
    assert_eq!(motion.dwells.len(), 20);
}

#[test]
fn test_read_distance_renders_sentinel_bands() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    // 1024 触发一次重查；第二个 1024 按原样接受 → 连接错误文本
    enqueue_raw(&mut probe, 1024);
    enqueue_raw(&mut probe, 1024);
    let lines = probe.run_diagnostic(&mut motion, -2).unwrap();
    assert_eq!(lines, vec!["BDsense: connection error".to_string()]);

    let mut probe = Probe::new(MockTransport::new(), ProbeConfig::default()).unwrap();
    enqueue_raw(&mut probe, 150);
    let lines = probe.run_diagnostic(&mut motion, -2).unwrap();
    assert_eq!(lines, vec!["1.50mm".to_string()]);
}

#[test]
fn test_raw_dump_severe_mounting_fault_is_fatal() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    enqueue_raw(&mut probe, 1020);

    let err = probe.run_diagnostic(&mut motion, -5).unwrap_err();
    assert!(matches!(err, ProbeError::Mounting(_)));
    assert!(format!("{err}").contains("too close or too high"));
    // 致命安装错误中止序列，不发收尾
    assert_eq!(sent_count(&mut probe, b"1018"), 0);
}

#[test]
fn test_raw_dump_too_high_is_report_only() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    enqueue_raw(&mut probe, 600);

    let lines = probe.run_diagnostic(&mut motion, -5).unwrap();
    assert_eq!(lines[0], "600");
    assert!(lines[1].contains("mounted too high"));
    assert_eq!(sent_count(&mut probe, b"1017"), 2);
    assert_eq!(sent_count(&mut probe, b"1018"), 2);
}

#[test]
fn test_raw_dump_nominal_polls_to_ceiling() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    for _ in 0..40 {
        enqueue_raw(&mut probe, 100);
    }

    let lines = probe.run_diagnostic(&mut motion, -5).unwrap();
    // 40 次轮询上限，全部正常值
    assert_eq!(lines.len(), 40);
    assert!(lines.iter().all(|l| l == "100"));
}

#[test]
fn test_zero_sweep_sequence() {
    let mut probe = probe();
    let mut motion = SimMotion::new();

    let lines = probe.run_diagnostic(&mut motion, -6).unwrap();
    assert!(lines[0].contains("don't power off"));
    assert!(lines.iter().any(|l| l == "Calibrate Finished!"));

    // 进入标定模式两次，保存一次，收尾两次
    assert_eq!(sent_count(&mut probe, b"1019"), 2);
    assert_eq!(sent_count(&mut probe, b"1021"), 1);
    assert_eq!(sent_count(&mut probe, b"1018"), 2);
    // 每个步进序号通知四次
    assert_eq!(sent_count(&mut probe, b"0"), 4);
    assert_eq!(sent_count(&mut probe, b"39"), 4);

    // 被测轴步进 40 次，每次 0.1mm
    assert_eq!(motion.steps.len(), 40);
    for (axis, distance, speed, accel) in &motion.steps {
        assert_eq!(*axis, bdsense_probe::Axis::Z);
        assert_eq!(*distance, 0.1);
        assert_eq!(*speed, 5.0);
        assert_eq!(*accel, 1000.0);
    }
    assert!(motion.force_enabled);
}

#[test]
fn test_reboot_is_single_fire_and_forget() {
    let mut probe = probe();
    let mut motion = SimMotion::new();

    let lines = probe.run_diagnostic(&mut motion, -8).unwrap();
    assert!(lines.is_empty());
    assert_eq!(sent_count(&mut probe, b"1022"), 1);
    assert_eq!(sent_count(&mut probe, b"1018"), 2);
    // 重启不触碰查询通道
    assert_eq!(
        probe
            .endstop_mut()
            .channel_mut()
            .transport_mut()
            .queried
            .len(),
        0
    );
}

#[test]
fn test_diagnostics_never_touch_session_state() {
    let mut probe = probe();
    let mut motion = SimMotion::new();
    enqueue_raw(&mut probe, 150);

    probe.run_diagnostic(&mut motion, -2).unwrap();
    assert!(!probe.endstop_mut().session_pending());
}
