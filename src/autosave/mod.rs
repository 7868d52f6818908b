use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;

/// One-shot countdown. Scheduling again replaces whatever was pending.
pub trait Timer {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>);
    fn cancel(&self);
    fn is_pending(&self) -> bool;
}

/// `window.setTimeout` backed timer.
#[derive(Clone, Default)]
pub struct BrowserTimer {
    handle: Rc<Cell<Option<i32>>>,
}

impl BrowserTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for BrowserTimer {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) {
        self.cancel();

        let Some(win) = web_sys::window() else {
            tracing::warn!("no window; timer not scheduled");
            return;
        };

        let handle = self.handle.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            handle.set(None);
            callback();
        });

        match win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            delay_ms.min(i32::MAX as u32) as i32,
        ) {
            Ok(tid) => self.handle.set(Some(tid)),
            Err(e) => tracing::warn!(error = ?e, "setTimeout failed"),
        }
    }

    fn cancel(&self) {
        if let Some(tid) = self.handle.take() {
            if let Some(win) = web_sys::window() {
                win.clear_timeout_with_handle(tid);
            }
        }
    }

    fn is_pending(&self) -> bool {
        self.handle.get().is_some()
    }
}

#[derive(Default)]
struct ManualState {
    now_ms: u64,
    due: Option<(u64, Box<dyn FnOnce()>)>,
}

/// Timer driven by a virtual clock; nothing fires until [`ManualTimer::advance`].
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Rc<RefCell<ManualState>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// Move the clock forward; returns whether the pending callback fired.
    pub fn advance(&self, ms: u64) -> bool {
        let fire = {
            let mut state = self.state.borrow_mut();
            state.now_ms += ms;
            let now = state.now_ms;
            match state.due.take() {
                Some((at, cb)) if at <= now => Some(cb),
                other => {
                    state.due = other;
                    None
                }
            }
        };

        match fire {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) {
        let mut state = self.state.borrow_mut();
        let at = state.now_ms + u64::from(delay_ms);
        state.due = Some((at, callback));
    }

    fn cancel(&self) {
        self.state.borrow_mut().due = None;
    }

    fn is_pending(&self) -> bool {
        self.state.borrow().due.is_some()
    }
}

/// Debounces change notifications into a single flush.
pub struct AutosaveScheduler<T: Timer> {
    timer: T,
    quiet_ms: u32,
    flush: Rc<dyn Fn()>,
}

impl<T: Timer> AutosaveScheduler<T> {
    pub fn new(timer: T, quiet_ms: u32, flush: Rc<dyn Fn()>) -> Self {
        Self {
            timer,
            quiet_ms,
            flush,
        }
    }

    /// Restart the quiet-period countdown.
    pub fn notify_changed(&self) {
        self.schedule(self.quiet_ms);
    }

    /// Arm a flush after `delay_ms`, e.g. to retry a failed write.
    pub fn retry_after(&self, delay_ms: u32) {
        self.schedule(delay_ms);
    }

    /// Drop any pending countdown and flush right away.
    pub fn force_flush(&self) {
        self.timer.cancel();
        (self.flush)();
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    fn schedule(&self, delay_ms: u32) {
        let flush = self.flush.clone();
        self.timer.schedule(delay_ms, Box::new(move || flush()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_scheduler(quiet_ms: u32) -> (AutosaveScheduler<ManualTimer>, ManualTimer, Rc<Cell<u32>>) {
        let timer = ManualTimer::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let scheduler = AutosaveScheduler::new(timer.clone(), quiet_ms, Rc::new(move || c.set(c.get() + 1)));
        (scheduler, timer, count)
    }

    #[test]
    fn test_rapid_changes_coalesce() {
        let (scheduler, timer, count) = counting_scheduler(1000);

        for _ in 0..5 {
            scheduler.notify_changed();
            assert!(!timer.advance(300));
        }
        assert_eq!(count.get(), 0);

        assert!(!timer.advance(699));
        assert!(timer.advance(1));
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_pending());

        assert!(!timer.advance(5000));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_force_flush_cancels_countdown() {
        let (scheduler, timer, count) = counting_scheduler(1000);

        scheduler.notify_changed();
        scheduler.force_flush();
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_pending());

        timer.advance(2000);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_retry_after_uses_its_own_delay() {
        let (scheduler, timer, count) = counting_scheduler(1000);

        scheduler.retry_after(5000);
        timer.advance(1000);
        assert_eq!(count.get(), 0);
        timer.advance(4000);
        assert_eq!(count.get(), 1);
        assert_eq!(timer.now_ms(), 5000);
    }

    #[test]
    fn test_callback_may_reschedule() {
        let timer = ManualTimer::new();
        let t2 = timer.clone();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();

        timer.schedule(
            10,
            Box::new(move || t2.schedule(10, Box::new(move || f.set(true)))),
        );
        assert!(timer.advance(10));
        assert!(timer.is_pending());
        assert!(timer.advance(10));
        assert!(fired.get());
    }
}
