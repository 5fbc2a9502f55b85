//! 组件定时器 - 自动渲染与自动刷新

use crate::component::InstanceId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 定时器用途，同一实例每种用途最多一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    AutoRender,
    AutoRefresh,
}

#[derive(Debug, Clone)]
struct TimerState {
    interval: Duration,
    last_trigger: Instant,
}

/// 按 (实例, 用途) 索引的定时器表
#[derive(Debug, Default)]
pub struct Timers {
    timers: HashMap<(InstanceId, TimerPurpose), TimerState>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置定时器，替换同用途的旧定时器
    pub fn schedule(&mut self, instance: InstanceId, purpose: TimerPurpose, interval: Duration, now: Instant) -> bool {
        self.timers
            .insert(
                (instance, purpose),
                TimerState {
                    interval,
                    last_trigger: now,
                },
            )
            .is_some()
    }

    pub fn cancel_all(&mut self, instance: InstanceId) {
        self.timers.retain(|(owner, _), _| *owner != instance);
    }

    pub fn interval(&self, instance: InstanceId, purpose: TimerPurpose) -> Option<Duration> {
        self.timers.get(&(instance, purpose)).map(|state| state.interval)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// 取出到期的定时器并重置计时，每个定时器每次最多触发一次
    pub fn due(&mut self, now: Instant) -> Vec<(InstanceId, TimerPurpose)> {
        let mut fired = Vec::new();
        for (key, state) in self.timers.iter_mut() {
            if state.interval.is_zero() {
                continue;
            }
            if now.saturating_duration_since(state.last_trigger) >= state.interval {
                state.last_trigger = now;
                fired.push(*key);
            }
        }
        // 保持确定的触发顺序
        fired.sort_by_key(|(instance, purpose)| (*instance, *purpose as u8));
        fired
    }
}
