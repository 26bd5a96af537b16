use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use stockledger_events::{EventBus, Subscription};

const TICK: Duration = Duration::from_millis(250);

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request shutdown and wait for the worker to stop. Messages already
    /// queued are handled first.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

/// Consumer loop for bus subscribers (stock cache, activity log).
///
/// - subscribes before the thread starts, so nothing published after `spawn`
///   returns is missed
/// - hands every message to `handler`, which must tolerate duplicates
/// - a failing handler is logged and the loop moves on
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    pub fn spawn<M, B, H, E>(name: &'static str, bus: &B, mut handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(name: &'static str, sub: Subscription<M>, shutdown_rx: mpsc::Receiver<()>, handler: &mut H)
where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let mut handle = |msg: M| {
        if let Err(err) = handler(msg) {
            warn!(worker = name, error = ?err, "worker handler failed");
        }
    };

    loop {
        if shutdown_rx.try_recv().is_ok() {
            let queued = sub.drain();
            debug!(worker = name, queued = queued.len(), "worker stopping");
            queued.into_iter().for_each(&mut handle);
            break;
        }

        match sub.recv_timeout(TICK) {
            Ok(msg) => handle(msg),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use stockledger_events::InMemoryEventBus;

    #[test]
    fn handles_published_messages_and_drains_on_shutdown() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let worker = ProjectionWorker::spawn("test-worker", &bus, move |n: u32| -> Result<(), String> {
            if n == 13 {
                return Err("unlucky".to_string());
            }
            sink.lock().unwrap().push(n);
            Ok(())
        })
        .unwrap();
        assert_eq!(worker.name(), "test-worker");

        for n in [1, 13, 2, 3] {
            bus.publish(n).unwrap();
        }
        worker.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
