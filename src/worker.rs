//! Poll-loop worker with a cross-thread shutdown protocol
//!
//! Runs a consumer's poll loop on its own task and wires up the two-step
//! stop sequence: another thread requests a wakeup, the loop observes the
//! interrupted poll, closes the consumer, and releases a latch the
//! requesting thread is waiting on. The requester is guaranteed not to
//! proceed until the worker's cleanup has finished.

use crate::consumer::Consumer;
use crate::record::ConsumeRecord;
use crate::wakeup::{ShutdownLatch, WakeupToken};
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle to a running consumer worker.
///
/// Cloneable; any holder may request shutdown and wait for termination.
#[derive(Clone)]
pub struct WorkerHandle {
    wakeup: WakeupToken,
    latch: ShutdownLatch,
}

impl WorkerHandle {
    /// Request that the worker stop. Callable from any thread; interrupts a
    /// blocked poll immediately.
    pub fn shutdown(&self) {
        self.wakeup.wake();
    }

    /// Wait until the worker has closed its consumer and stopped.
    pub async fn await_terminated(&self) {
        self.latch.wait().await;
    }

    /// Whether the worker has already terminated.
    pub fn is_terminated(&self) -> bool {
        self.latch.is_released()
    }
}

/// Consumer poll loop running on a dedicated task
pub struct ConsumerWorker;

impl ConsumerWorker {
    /// Spawn the poll loop, feeding each record to `handler`.
    ///
    /// The loop runs until a wakeup interrupts it (or polling fails with a
    /// non-transient error), then closes the consumer and releases the
    /// termination latch. The handler runs on the worker task and should
    /// not block.
    pub fn spawn<F>(consumer: Consumer, poll_timeout: Duration, mut handler: F) -> WorkerHandle
    where
        F: FnMut(ConsumeRecord) + Send + 'static,
    {
        let wakeup = consumer.wakeup_handle();
        let latch = ShutdownLatch::new();
        let worker_latch = latch.clone();

        info!("Starting consumer worker");
        tokio::spawn(async move {
            loop {
                match consumer.poll(poll_timeout).await {
                    Ok(records) => {
                        for record in records {
                            handler(record);
                        }
                    }
                    Err(e) if e.is_wakeup() => {
                        info!("Consumer worker received shutdown signal");
                        break;
                    }
                    Err(e) => {
                        error!("Consumer worker poll failed: {}", e);
                        break;
                    }
                }
            }

            if let Err(e) = consumer.close() {
                warn!("Error closing consumer during worker shutdown: {}", e);
            }
            // Cleanup is done; release anyone waiting on termination.
            worker_latch.count_down();
            info!("Consumer worker stopped");
        });

        WorkerHandle { wakeup, latch }
    }
}
