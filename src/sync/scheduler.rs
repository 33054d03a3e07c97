use std::time::Duration;

use tokio::sync::mpsc;

use super::manager::{PollOutcome, SyncManager};

/// Messages to control the poll loop
#[derive(Debug)]
pub enum PollMessage {
    /// Check the remote without waiting for the next tick
    PollNow,
    Shutdown,
}

/// Handle for the background poll loop
pub struct PollScheduler {
    sender: mpsc::Sender<PollMessage>,
}

impl PollScheduler {
    pub fn poll_now(&self) {
        let _ = self.sender.try_send(PollMessage::PollNow);
    }

    pub fn shutdown(&self) {
        let _ = self.sender.try_send(PollMessage::Shutdown);
    }
}

/// Spawn the poll loop. The first poll runs immediately.
pub fn start_poll_scheduler(manager: SyncManager, interval: Duration) -> PollScheduler {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        poll_loop(manager, interval, rx).await;
    });

    PollScheduler { sender: tx }
}

async fn poll_loop(manager: SyncManager, interval: Duration, mut receiver: mpsc::Receiver<PollMessage>) {
    log::info!("Poll loop started, every {}s", interval.as_secs());

    loop {
        match manager.poll_once().await {
            Ok(PollOutcome::Unchanged) => {}
            Ok(PollOutcome::DataChanged { revision_id, replaced }) => {
                log::debug!("Poll: data at {} (replaced={})", revision_id, replaced);
            }
            Ok(PollOutcome::CodeChanged(drift)) => {
                log::info!("Poll: new deployment at {}, reload needed", drift.head);
            }
            // Transient by nature, the next tick retries
            Err(e) => log::debug!("Poll failed: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            msg = receiver.recv() => match msg {
                Some(PollMessage::PollNow) => {
                    log::debug!("Poll requested");
                }
                Some(PollMessage::Shutdown) | None => {
                    log::info!("Poll loop shutting down");
                    break;
                }
            }
        }
    }
}
