//! 探测流程演示（无硬件）
//!
//! 用 mock 传输和一个最小的模拟运动控制器走一遍完整流程：
//! 查询 endstop → 三采样探测 → 精度报告 → 距离诊断。
//!
//! 运行方式：
//! ```bash
//! cargo run -p bdsense-probe --example probe_cycle_demo
//! ```

use std::time::Duration;

use bdsense_channel::MockTransport;
use bdsense_probe::{
    AggregationMode, Axis, EndstopPoller, MotionController, MotionError, MoveTarget, Probe,
    ProbeConfig, ProbeError, ProbeOverrides, ProbeRequest,
};
use bdsense_tools::Position3D;

/// 最小模拟运动控制器：位置立即到位，归位进给按脚本触发
struct SimulatedMotion {
    position: Position3D,
    trigger_heights: Vec<f64>,
}

impl MotionController for SimulatedMotion {
    fn get_position(&self) -> Position3D {
        self.position
    }

    fn manual_move(&mut self, target: MoveTarget, _speed: f64) -> Result<(), MotionError> {
        if let Some(x) = target.x {
            self.position.x = x;
        }
        if let Some(y) = target.y {
            self.position.y = y;
        }
        if let Some(z) = target.z {
            self.position.z = z;
        }
        Ok(())
    }

    fn wait_moves(&mut self) -> Result<(), MotionError> {
        Ok(())
    }

    fn dwell(&mut self, _duration: Duration) {}

    fn is_homed(&self, _axis: Axis) -> bool {
        true
    }

    fn set_z_position(&mut self, z: f64) -> Result<(), MotionError> {
        self.position.z = z;
        Ok(())
    }

    fn probing_move(
        &mut self,
        _endstop: &mut dyn EndstopPoller,
        _z_target: f64,
        _speed: f64,
    ) -> Result<Position3D, ProbeError> {
        let z = self
            .trigger_heights
            .pop()
            .ok_or(ProbeError::from(MotionError::EndstopTimeout))?;
        self.position.z = z;
        Ok(self.position)
    }

    fn home_start(&mut self, _rest_time: Duration) -> Result<(), MotionError> {
        Ok(())
    }

    fn home_wait(&mut self, endstop: &mut dyn EndstopPoller) -> Result<(), ProbeError> {
        endstop.query_endstop()?;
        Ok(())
    }

    fn flush_lookahead(&mut self) -> Result<(), MotionError> {
        Ok(())
    }

    fn estimated_elapsed_time(&self) -> f64 {
        0.0
    }

    fn queued_move_end_time(&self) -> f64 {
        0.0
    }

    fn is_motion_active(&self) -> bool {
        false
    }

    fn force_enable_steppers(&mut self) -> Result<(), MotionError> {
        Ok(())
    }

    fn step_axis(
        &mut self,
        _axis: Axis,
        _distance: f64,
        _speed: f64,
        _accel: f64,
    ) -> Result<(), MotionError> {
        Ok(())
    }

    fn run_activate_script(&mut self) -> Result<(), MotionError> {
        Ok(())
    }

    fn run_deactivate_script(&mut self) -> Result<(), MotionError> {
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 脚本化传感器：endstop 查询 + 诊断读数
    let mut transport = MockTransport::new();
    transport.enqueue_raw(80); // 0.80mm → 触发
    transport.enqueue_raw(150); // 诊断读数 1.50mm

    let config = ProbeConfig {
        position_endstop: 1.0,
        samples: 3,
        samples_result: AggregationMode::Median,
        samples_tolerance: 0.05,
        ..Default::default()
    };
    let mut probe = Probe::new(transport, config)?;
    let mut motion = SimulatedMotion {
        position: Position3D::new(100.0, 100.0, 5.0),
        trigger_heights: vec![0.412, 0.409, 0.410],
    };

    let state = probe.query_endstop()?;
    println!("endstop: {state:?}");

    let result = probe.run_probe(&mut motion, &ProbeRequest::manual())?;
    println!("probe result: z={:.6}", result.z);

    motion.trigger_heights = vec![0.41; 10];
    let stats = probe.probe_accuracy(&mut motion, &ProbeOverrides::default())?;
    println!("{stats}");

    let lines = probe.run_diagnostic(&mut motion, -2)?;
    for line in lines {
        println!("{line}");
    }

    println!("status: {:?}", probe.status());
    Ok(())
}
