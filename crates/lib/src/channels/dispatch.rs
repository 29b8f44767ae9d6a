//! Per-sender dispatch lanes.
//!
//! Each sender gets its own task that runs the handler over that sender's messages in arrival
//! order. Lanes for different senders run concurrently. A lane exits once its queue is empty,
//! so idle senders hold no task. A lane queues at most [`LANE_CAPACITY`] messages; a sender
//! that outpaces the handler beyond that loses the excess.

use crate::channels::client::MessageHandler;
use crate::channels::inbound::InboundMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

/// Messages one sender may have waiting behind the one being handled.
pub const LANE_CAPACITY: usize = 256;

type Lanes = Arc<Mutex<HashMap<String, mpsc::Sender<InboundMessage>>>>;

pub struct SenderLanes {
    handler: Arc<dyn MessageHandler>,
    lanes: Lanes,
}

impl SenderLanes {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            handler,
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue `msg` on its sender's lane, starting the lane if none is running.
    pub async fn dispatch(&self, msg: InboundMessage) {
        let sender = msg.sender.clone();
        let mut lanes = self.lanes.lock().await;
        let msg = match lanes.get(&sender) {
            Some(tx) => match tx.try_send(msg) {
                Ok(()) => return,
                Err(TrySendError::Full(_)) => {
                    log::warn!(
                        "dispatch: {} already has {} messages queued, dropping message",
                        sender,
                        LANE_CAPACITY
                    );
                    return;
                }
                // lane task died without deregistering (handler panic)
                Err(TrySendError::Closed(msg)) => msg,
            },
            None => msg,
        };
        let (tx, rx) = mpsc::channel(LANE_CAPACITY);
        // fresh queue with rx alive, so this cannot fail
        let _ = tx.try_send(msg);
        lanes.insert(sender.clone(), tx);
        drop(lanes);
        tokio::spawn(run_lane(
            sender,
            rx,
            self.handler.clone(),
            self.lanes.clone(),
        ));
    }

    /// Number of senders with a running lane.
    pub async fn active_lanes(&self) -> usize {
        self.lanes.lock().await.len()
    }
}

async fn run_lane(
    sender: String,
    mut rx: mpsc::Receiver<InboundMessage>,
    handler: Arc<dyn MessageHandler>,
    lanes: Lanes,
) {
    loop {
        let msg = match rx.try_recv() {
            Ok(msg) => msg,
            Err(_) => {
                // Pushes happen under this lock, so an empty queue here stays empty.
                let mut g = lanes.lock().await;
                match rx.try_recv() {
                    Ok(msg) => msg,
                    Err(_) => {
                        g.remove(&sender);
                        log::debug!("dispatch: lane for {} drained", sender);
                        return;
                    }
                }
            }
        };
        handler.handle(msg).await;
    }
}
