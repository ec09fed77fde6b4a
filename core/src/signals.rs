use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Shutdown: Send + Sync + 'static {
    fn shutdown(self: &Arc<Self>);
}

pub struct Signals<T: Shutdown> {
    target: Arc<T>,
    iterations: AtomicU64,
}

impl<T: Shutdown> Signals<T> {
    pub fn new(target: Arc<T>) -> Signals<T> {
        Signals { target, iterations: AtomicU64::new(0) }
    }

    pub fn init(self: &Arc<Signals<T>>) {
        let target = self.target.clone();
        let signals = self.clone();
        ctrlc::set_handler(move || {
            let v = signals.iterations.fetch_add(1, Ordering::SeqCst);
            if v > 1 {
                println!("^SIGNAL - halting");
                std::process::exit(1);
            }
            println!("^SIGNAL - shutting down... (CTRL+C again to halt)");
            target.shutdown();
        })
        .expect("Error setting signal handler");
    }
}
