//! 集成测试共用的脚本化运动控制器
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use bdsense_probe::{Axis, EndstopPoller, MotionController, MotionError, MoveTarget, ProbeError};
use bdsense_tools::Position3D;

/// 脚本化运动控制器
///
/// 记录引擎下发的所有命令；`probe_results` 预演归位进给的触发
/// 位置；扫描时钟在每次 `is_motion_active` 查询后前进一个模拟
/// 节拍。
pub struct SimMotion {
    position: Cell<Position3D>,
    pub homed: bool,
    /// probing_move 的脚本化触发位置（空 → 归位超时）
    pub probe_results: VecDeque<Position3D>,
    pub moves: RefCell<Vec<(MoveTarget, f64)>>,
    pub wait_moves_count: usize,
    pub dwells: Vec<Duration>,
    pub z_corrections: Vec<f64>,
    pub activate_runs: usize,
    pub deactivate_runs: usize,
    /// 设为 true 时收放脚本会挪动工具头（测 MotionAborted）
    pub script_moves_toolhead: bool,
    pub home_rest_times: Vec<Duration>,
    /// home_wait 轮询 endstop 的上限
    pub max_home_polls: usize,
    pub home_wait_polls: usize,
    pub flush_count: usize,
    pub force_enabled: bool,
    pub steps: Vec<(Axis, f64, f64, f64)>,
    // === 扫描时钟 ===
    elapsed: Cell<f64>,
    /// 每次活动性查询后前进的模拟节拍（秒）
    pub clock_tick: f64,
    /// 每个 manual_move 在队列中占据的时长（秒）
    pub line_duration: f64,
    queue_end: Cell<f64>,
    /// 提前结束运动的时刻（测扫描中断）
    pub active_cutoff: Option<f64>,
    /// get_position 调用时刻（扫描采样时序断言用）
    pub position_query_times: RefCell<Vec<f64>>,
}

impl SimMotion {
    pub fn new() -> Self {
        Self {
            position: Cell::new(Position3D::default()),
            homed: true,
            probe_results: VecDeque::new(),
            moves: RefCell::new(Vec::new()),
            wait_moves_count: 0,
            dwells: Vec::new(),
            z_corrections: Vec::new(),
            activate_runs: 0,
            deactivate_runs: 0,
            script_moves_toolhead: false,
            home_rest_times: Vec::new(),
            max_home_polls: 16,
            home_wait_polls: 0,
            flush_count: 0,
            force_enabled: false,
            steps: Vec::new(),
            elapsed: Cell::new(0.0),
            clock_tick: 0.1,
            line_duration: 2.0,
            queue_end: Cell::new(0.0),
            active_cutoff: None,
            position_query_times: RefCell::new(Vec::new()),
        }
    }

    pub fn at(position: Position3D) -> Self {
        let sim = Self::new();
        sim.position.set(position);
        sim
    }

    /// 预演接下来 probing_move 的触发 z 序列
    pub fn script_probe_z(&mut self, zs: &[f64]) {
        for &z in zs {
            let mut pos = self.position.get();
            pos.z = z;
            self.probe_results.push_back(pos);
        }
    }

    pub fn position(&self) -> Position3D {
        self.position.get()
    }

    pub fn set_position(&self, position: Position3D) {
        self.position.set(position);
    }
}

impl MotionController for SimMotion {
    fn get_position(&self) -> Position3D {
        self.position_query_times
            .borrow_mut()
            .push(self.elapsed.get());
        self.position.get()
    }

    fn manual_move(&mut self, target: MoveTarget, speed: f64) -> Result<(), MotionError> {
        self.moves.borrow_mut().push((target, speed));
        let mut pos = self.position.get();
        if let Some(x) = target.x {
            pos.x = x;
        }
        if let Some(y) = target.y {
            pos.y = y;
        }
        if let Some(z) = target.z {
            pos.z = z;
        }
        self.position.set(pos);
        self.queue_end.set(self.elapsed.get() + self.line_duration);
        Ok(())
    }

    fn wait_moves(&mut self) -> Result<(), MotionError> {
        self.wait_moves_count += 1;
        Ok(())
    }

    fn dwell(&mut self, duration: Duration) {
        self.dwells.push(duration);
    }

    fn is_homed(&self, _axis: Axis) -> bool {
        self.homed
    }

    fn set_z_position(&mut self, z: f64) -> Result<(), MotionError> {
        self.z_corrections.push(z);
        let mut pos = self.position.get();
        pos.z = z;
        self.position.set(pos);
        Ok(())
    }

    fn probing_move(
        &mut self,
        _endstop: &mut dyn EndstopPoller,
        _z_target: f64,
        _speed: f64,
    ) -> Result<Position3D, ProbeError> {
        let Some(pos) = self.probe_results.pop_front() else {
            return Err(MotionError::EndstopTimeout.into());
        };
        self.position.set(pos);
        Ok(pos)
    }

    fn home_start(&mut self, rest_time: Duration) -> Result<(), MotionError> {
        self.home_rest_times.push(rest_time);
        Ok(())
    }

    fn home_wait(&mut self, endstop: &mut dyn EndstopPoller) -> Result<(), ProbeError> {
        for _ in 0..self.max_home_polls {
            self.home_wait_polls += 1;
            if endstop.query_endstop()? == bdsense_probe::EndstopState::Triggered {
                return Ok(());
            }
        }
        Err(MotionError::EndstopTimeout.into())
    }

    fn flush_lookahead(&mut self) -> Result<(), MotionError> {
        self.flush_count += 1;
        Ok(())
    }

    fn estimated_elapsed_time(&self) -> f64 {
        self.elapsed.get()
    }

    fn queued_move_end_time(&self) -> f64 {
        self.queue_end.get()
    }

    fn is_motion_active(&self) -> bool {
        let advanced = self.elapsed.get() + self.clock_tick;
        self.elapsed.set(advanced);
        let cutoff = self.active_cutoff.unwrap_or_else(|| self.queue_end.get());
        advanced <= cutoff + 1e-9
    }

    fn force_enable_steppers(&mut self) -> Result<(), MotionError> {
        self.force_enabled = true;
        Ok(())
    }

    fn step_axis(
        &mut self,
        axis: Axis,
        distance: f64,
        speed: f64,
        accel: f64,
    ) -> Result<(), MotionError> {
        self.steps.push((axis, distance, speed, accel));
        Ok(())
    }

    fn run_activate_script(&mut self) -> Result<(), MotionError> {
        self.activate_runs += 1;
        if self.script_moves_toolhead {
            let mut pos = self.position.get();
            pos.z += 1.0;
            self.position.set(pos);
        }
        Ok(())
    }

    fn run_deactivate_script(&mut self) -> Result<(), MotionError> {
        self.deactivate_runs += 1;
        if self.script_moves_toolhead {
            let mut pos = self.position.get();
            pos.z += 1.0;
            self.position.set(pos);
        }
        Ok(())
    }
}
