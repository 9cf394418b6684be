//! Platform abstraction layer
//!
//! The scheduler never talks to a browser or window directly. It asks a
//! [`FrameSource`] for frame, idle and timer callbacks and reads taps from
//! an [`InputSource`]. [`ManualHost`] implements both in memory so the
//! whole game can be pumped by hand.

/// Opaque handle for a scheduled host callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

/// Host-side scheduling primitives
pub trait FrameSource {
    /// Ask for one frame callback
    fn request_frame(&mut self) -> TaskHandle;
    fn cancel_frame(&mut self, handle: TaskHandle);
    /// Whether the host can run work when it is otherwise idle
    fn supports_idle(&self) -> bool;
    fn request_idle(&mut self) -> TaskHandle;
    fn cancel_idle(&mut self, handle: TaskHandle);
    fn set_timeout(&mut self, delay_ms: f64) -> TaskHandle;
    fn clear_timeout(&mut self, handle: TaskHandle);
    fn detach_resize_listener(&mut self);
}

/// Abstracted tap input
pub trait InputSource {
    /// Consume a pending tap, if any
    fn take_tap(&mut self) -> bool;
    /// Release pointer/touch capture
    fn detach(&mut self);
}

/// Everything the scheduler needs from its host
pub trait Host: FrameSource + InputSource {}

impl<T: FrameSource + InputSource> Host for T {}

/// In-memory host that records requests for tests and the headless binary
#[derive(Debug)]
pub struct ManualHost {
    next_handle: u64,
    idle_supported: bool,
    frame: Option<TaskHandle>,
    idle: Vec<TaskHandle>,
    /// (handle, due time)
    timers: Vec<(TaskHandle, f64)>,
    now_ms: f64,
    taps: u32,
    resize_attached: bool,
    input_attached: bool,
    /// Count of cancel/clear calls, for teardown checks
    pub cancellations: u32,
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ManualHost {
    pub fn new(idle_supported: bool) -> Self {
        Self {
            next_handle: 1,
            idle_supported,
            frame: None,
            idle: Vec::new(),
            timers: Vec::new(),
            now_ms: 0.0,
            taps: 0,
            resize_attached: true,
            input_attached: true,
            cancellations: 0,
        }
    }

    fn handle(&mut self) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn queue_tap(&mut self) {
        if self.input_attached {
            self.taps += 1;
        }
    }

    pub fn frame_pending(&self) -> bool {
        self.frame.is_some()
    }

    /// Fire the pending frame: advance the clock and hand back the timestamp
    pub fn take_frame(&mut self, frame_ms: f64) -> Option<f64> {
        self.frame.take().map(|_| {
            self.now_ms += frame_ms;
            self.now_ms
        })
    }

    pub fn idle_pending(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Fire the oldest idle request
    pub fn take_idle(&mut self) -> Option<TaskHandle> {
        if self.idle.is_empty() {
            None
        } else {
            Some(self.idle.remove(0))
        }
    }

    pub fn timers_pending(&self) -> usize {
        self.timers.len()
    }

    /// Advance the clock without a frame and return timers that came due
    pub fn advance(&mut self, ms: f64) -> Vec<TaskHandle> {
        self.now_ms += ms;
        let now = self.now_ms;
        let (due, waiting): (Vec<_>, Vec<_>) = self.timers.drain(..).partition(|(_, at)| *at <= now);
        self.timers = waiting;
        due.into_iter().map(|(handle, _)| handle).collect()
    }

    pub fn resize_attached(&self) -> bool {
        self.resize_attached
    }

    pub fn input_attached(&self) -> bool {
        self.input_attached
    }
}

impl FrameSource for ManualHost {
    fn request_frame(&mut self) -> TaskHandle {
        let handle = self.handle();
        self.frame = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: TaskHandle) {
        if self.frame == Some(handle) {
            self.frame = None;
        }
        self.cancellations += 1;
    }

    fn supports_idle(&self) -> bool {
        self.idle_supported
    }

    fn request_idle(&mut self) -> TaskHandle {
        let handle = self.handle();
        self.idle.push(handle);
        handle
    }

    fn cancel_idle(&mut self, handle: TaskHandle) {
        self.idle.retain(|h| *h != handle);
        self.cancellations += 1;
    }

    fn set_timeout(&mut self, delay_ms: f64) -> TaskHandle {
        let handle = self.handle();
        self.timers.push((handle, self.now_ms + delay_ms.max(0.0)));
        handle
    }

    fn clear_timeout(&mut self, handle: TaskHandle) {
        self.timers.retain(|(h, _)| *h != handle);
        self.cancellations += 1;
    }

    fn detach_resize_listener(&mut self) {
        self.resize_attached = false;
    }
}

impl InputSource for ManualHost {
    fn take_tap(&mut self) -> bool {
        if self.taps > 0 {
            self.taps -= 1;
            true
        } else {
            false
        }
    }

    fn detach(&mut self) {
        self.input_attached = false;
        self.taps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_request_and_cancel() {
        let mut host = ManualHost::default();
        let handle = host.request_frame();
        assert!(host.frame_pending());
        host.cancel_frame(handle);
        assert!(!host.frame_pending());
        assert_eq!(host.take_frame(16.0), None);
    }

    #[test]
    fn test_take_frame_advances_clock() {
        let mut host = ManualHost::default();
        host.request_frame();
        assert_eq!(host.take_frame(16.0), Some(16.0));
        assert!(!host.frame_pending());
    }

    #[test]
    fn test_timers_fire_when_due() {
        let mut host = ManualHost::default();
        let early = host.set_timeout(100.0);
        let late = host.set_timeout(500.0);
        assert_eq!(host.advance(200.0), vec![early]);
        host.clear_timeout(late);
        assert!(host.advance(1000.0).is_empty());
    }

    #[test]
    fn test_taps_are_consumed_once() {
        let mut host = ManualHost::default();
        host.queue_tap();
        assert!(host.take_tap());
        assert!(!host.take_tap());
        host.detach();
        host.queue_tap();
        assert!(!host.take_tap());
    }
}
