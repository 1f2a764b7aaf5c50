//! Periodic background workers.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::{Error, ExceptionHandler};

/// A named worker thread calling a tick function at a fixed interval.
///
/// Ticks of one ticker never overlap. If a tick overruns the interval the
/// missed ticks are skipped instead of running back to back. Dropping the
/// ticker wakes the worker and joins it; a tick that is in flight completes
/// first.
pub(crate) struct Ticker {
    name: &'static str,
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    worker: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(
        name: &'static str,
        initial_delay: Duration,
        interval: Duration,
        exception_handler: ExceptionHandler,
        mut tick: F,
    ) -> Result<Self, Error>
    where
        F: FnMut() -> Result<(), Error> + Send + 'static,
    {
        #[allow(clippy::mutex_atomic)]
        let shutdown = Arc::new((Mutex::new(false), Condvar::new()));
        let worker_shutdown = shutdown.clone();

        let worker = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let (lock, cvar) = worker_shutdown.as_ref();
                let mut next = Instant::now() + initial_delay;
                loop {
                    {
                        let mut stopped = lock.lock().unwrap();
                        loop {
                            if *stopped {
                                return;
                            }
                            let now = Instant::now();
                            if now >= next {
                                break;
                            }
                            stopped = cvar.wait_timeout(stopped, next - now).unwrap().0;
                        }
                    }

                    if let Err(err) = tick() {
                        exception_handler(&err);
                    }

                    next += interval;
                    let now = Instant::now();
                    if next < now {
                        bosun_debug!("[{}] tick overran its interval", name);
                        next = now + interval;
                    }
                }
            })?;

        Ok(Self {
            name,
            shutdown,
            worker: Some(worker),
        })
    }

    /// Stops the worker and waits for it to exit.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let (lock, cvar) = self.shutdown.as_ref();
        *lock.lock().unwrap() = true;
        cvar.notify_all();
        if worker.join().is_err() {
            bosun_warn!("[{}] worker thread panicked", self.name);
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_ticks_and_reports_errors() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let handler: ExceptionHandler = {
            let errors = errors.clone();
            Arc::new(move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            })
        };

        let mut ticker = {
            let ticks = ticks.clone();
            Ticker::spawn(
                "bosun-test",
                Duration::ZERO,
                Duration::from_millis(10),
                handler,
                move || {
                    let n = ticks.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        return Err(Error::QueueFull { capacity: 1 });
                    }
                    Ok(())
                },
            )
            .unwrap()
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        ticker.stop();

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 3);
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        // no more ticks after stopping
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_stop_interrupts_initial_delay() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();
        let ticker = {
            let ticks = ticks.clone();
            Ticker::spawn(
                "bosun-test",
                Duration::from_secs(60),
                Duration::from_secs(60),
                Arc::new(|_| {}),
                move || {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap()
        };
        drop(ticker);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
