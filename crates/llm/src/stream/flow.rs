use std::sync::atomic::{AtomicBool, Ordering};

/// Producer throttling state derived from queue occupancy.
///
/// A stream enters `Throttled` at or above its high water mark and only returns to
/// `Normal` once occupancy falls to its low water mark or below, so a level
/// hovering around one threshold does not flap between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Normal,
    Throttled,
}

pub(super) struct FlowControl {
    high_water_mark: f64,
    low_water_mark: f64,
    throttled: AtomicBool,
}

impl FlowControl {
    pub(super) fn new(high_water_mark: f64, low_water_mark: f64) -> Self {
        Self {
            high_water_mark,
            low_water_mark,
            throttled: AtomicBool::new(false),
        }
    }

    /// Feeds a new occupancy level and returns the state after the transition.
    ///
    /// Callers serialize observations; only reads of the state are lock-free.
    pub(super) fn observe(&self, level: f64) -> FlowState {
        let throttled = self.throttled.load(Ordering::Relaxed);

        if !throttled && level >= self.high_water_mark {
            self.throttled.store(true, Ordering::Release);
            log::debug!("Stream throttled at buffer level {level:.2}");
            FlowState::Throttled
        } else if throttled && level <= self.low_water_mark {
            self.throttled.store(false, Ordering::Release);
            log::debug!("Stream resumed at buffer level {level:.2}");
            FlowState::Normal
        } else {
            self.state()
        }
    }

    pub(super) fn state(&self) -> FlowState {
        if self.throttled.load(Ordering::Acquire) {
            FlowState::Throttled
        } else {
            FlowState::Normal
        }
    }
}
