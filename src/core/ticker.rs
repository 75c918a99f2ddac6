use log::{debug, error};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// A background thread that calls `step` every `interval` until `step` returns
/// false or the ticker is stopped. Stopping joins the thread.
pub struct Ticker {
    thread: Option<thread::JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
}

impl Ticker {
    pub fn spawn<F>(interval: Duration, mut step: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = stop_signal.clone();
        let thread = thread::spawn(move || {
            let mut passes = 0_u64;
            while !stop_signal_clone.load(Ordering::Acquire) {
                if !step() {
                    break;
                }
                passes += 1;
                thread::sleep(interval);
            }
            debug!("Tick loop exited after {passes} passes");
        });
        Self {
            thread: Some(thread),
            stop_signal,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            error!("Tick loop thread panicked");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
