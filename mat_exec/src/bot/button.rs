//! Start/stop button watcher

use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use eqpt_if::eqpt::Panel;
use util::sync::StopEvent;

/// Polls the panel button and stops the walker on a press.
pub struct ButtonWatcher {
    inner: Arc<Inner>,
    stop: StopEvent,
    jh: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    shutdown_requested: AtomicBool,
    walker_stop: StopEvent,
}

impl ButtonWatcher {
    /// Start watching. Presses within `grace` of now are ignored.
    pub fn start(
        panel: Arc<dyn Panel>,
        walker_stop: StopEvent,
        grace: Duration,
        poll: Duration,
    ) -> Result<Self, std::io::Error> {
        let inner = Arc::new(Inner {
            shutdown_requested: AtomicBool::new(false),
            walker_stop,
        });
        let stop = StopEvent::new();

        let thread_inner = inner.clone();
        let thread_stop = stop.clone();
        let jh = thread::Builder::new()
            .name("button_watcher".into())
            .spawn(move || watcher_thread(panel, thread_inner, thread_stop, grace, poll))?;

        Ok(Self {
            inner,
            stop,
            jh: Mutex::new(Some(jh)),
        })
    }

    pub fn shutdown_requested(&self) -> bool {
        self.inner.shutdown_requested.load(Ordering::Acquire)
    }

    /// Ask the walker to stop as if the button had been pressed.
    pub fn request_shutdown(&self) {
        self.inner.request_shutdown();
    }

    /// Stop watching, leaving the walker running.
    pub fn shutdown(&self) {
        self.stop.set();

        if let Ok(mut jh) = self.jh.lock() {
            if let Some(h) = jh.take() {
                if h.join().is_err() {
                    error!("Button watcher thread panicked");
                }
            }
        }
    }
}

impl Drop for ButtonWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        self.walker_stop.set();
    }
}

fn watcher_thread(
    panel: Arc<dyn Panel>,
    inner: Arc<Inner>,
    stop: StopEvent,
    grace: Duration,
    poll: Duration,
) {
    let start = Instant::now();

    while !stop.wait_timeout(poll) {
        if !panel.button_pressed() {
            continue;
        }

        if start.elapsed() < grace {
            debug!("Ignoring the launch button press");
            continue;
        }

        info!("Button pressed, stopping");
        inner.request_shutdown();
        break;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use eqpt_if::eqpt::{BeepPattern, LedColour};

    #[derive(Default)]
    struct TestPanel {
        pressed: AtomicBool,
    }

    impl Panel for TestPanel {
        fn set_led(&self, _colour: LedColour) {}

        fn beep(&self, _pattern: BeepPattern) {}

        fn button_pressed(&self) -> bool {
            self.pressed.swap(false, Ordering::AcqRel)
        }
    }

    fn wait_for(f: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_launch_press_ignored() {
        let panel = Arc::new(TestPanel::default());
        let walker_stop = StopEvent::new();

        panel.pressed.store(true, Ordering::Release);
        let watcher = ButtonWatcher::start(
            panel.clone(),
            walker_stop.clone(),
            Duration::from_millis(500),
            Duration::from_millis(10),
        )
        .unwrap();

        // Consumed inside the grace period
        assert!(wait_for(|| !panel.pressed.load(Ordering::Acquire)));
        assert!(!watcher.shutdown_requested());
        assert!(!walker_stop.is_set());

        watcher.shutdown();
    }

    #[test]
    fn test_press_stops_walker() {
        let panel = Arc::new(TestPanel::default());
        let walker_stop = StopEvent::new();

        let watcher = ButtonWatcher::start(
            panel.clone(),
            walker_stop.clone(),
            Duration::from_millis(0),
            Duration::from_millis(10),
        )
        .unwrap();

        panel.pressed.store(true, Ordering::Release);
        assert!(wait_for(|| watcher.shutdown_requested()));
        assert!(walker_stop.is_set());
    }

    #[test]
    fn test_request_shutdown() {
        let walker_stop = StopEvent::new();
        let watcher = ButtonWatcher::start(
            Arc::new(TestPanel::default()),
            walker_stop.clone(),
            Duration::from_millis(500),
            Duration::from_millis(10),
        )
        .unwrap();

        watcher.request_shutdown();
        assert!(watcher.shutdown_requested());
        assert!(walker_stop.is_set());
    }
}
