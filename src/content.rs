//! Content Script
//!
//! Runs the selection tracker on its own task. Page events and queries arrive
//! over a channel; the tracker's state never leaves the task.

use crate::config::SelectionLimits;
use crate::error::{LensError, LensResult};
use crate::events::{SubscriptionId, Subscriptions};
use crate::ipc::Request;
use crate::selection::{PageEvent, PageEventKind, Selection, SelectionTracker};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

const COMMAND_BUFFER: usize = 64;

enum ContentCommand {
    Page(PageEvent),
    Query(oneshot::Sender<Option<Selection>>),
    Ping(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<usize>),
}

/// Cloneable handle to a running content script
#[derive(Debug, Clone)]
pub struct ContentHandle {
    tx: mpsc::Sender<ContentCommand>,
}

impl std::fmt::Debug for ContentCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentCommand::Page(event) => f.debug_tuple("Page").field(event).finish(),
            ContentCommand::Query(_) => f.write_str("Query"),
            ContentCommand::Ping(_) => f.write_str("Ping"),
            ContentCommand::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

fn unreachable_error() -> LensError {
    LensError::RelayUnreachable("content script is not running".to_string())
}

impl ContentHandle {
    /// Deliver a page event. Events are applied in the order they are sent.
    pub async fn page_event(&self, event: PageEvent) -> LensResult<()> {
        self.tx
            .send(ContentCommand::Page(event))
            .await
            .map_err(|_| unreachable_error())
    }

    pub async fn current_selection(&self) -> LensResult<Option<Selection>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ContentCommand::Query(reply_tx))
            .await
            .map_err(|_| unreachable_error())?;
        reply_rx.await.map_err(|_| unreachable_error())
    }

    pub async fn ping(&self) -> LensResult<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ContentCommand::Ping(reply_tx))
            .await
            .map_err(|_| unreachable_error())?;
        reply_rx.await.map_err(|_| unreachable_error())
    }

    /// Stop the content script, unregistering its handlers.
    /// Returns how many handlers were removed.
    pub async fn shutdown(&self) -> LensResult<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ContentCommand::Shutdown(reply_tx))
            .await
            .map_err(|_| unreachable_error())?;
        reply_rx.await.map_err(|_| unreachable_error())
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

pub struct ContentScript {
    tracker: SelectionTracker,
    subscriptions: Subscriptions<PageEventKind, SelectionTracker, PageEvent>,
    subscription_ids: Vec<SubscriptionId>,
}

impl ContentScript {
    pub fn new(limits: SelectionLimits, notifier: mpsc::UnboundedSender<Request>) -> Self {
        let mut script = Self {
            tracker: SelectionTracker::new(limits).with_notifier(notifier),
            subscriptions: Subscriptions::new(),
            subscription_ids: Vec::new(),
        };
        script.attach();
        script
    }

    /// Register the tracker's handlers, one per page event kind
    fn attach(&mut self) {
        for kind in PageEventKind::ALL {
            let id = self
                .subscriptions
                .subscribe(kind, |tracker: &mut SelectionTracker, event: &PageEvent| {
                    let transition = tracker.handle(event, Instant::now());
                    debug!("Page event {:?} -> {:?}", event.kind(), transition);
                });
            self.subscription_ids.push(id);
        }
    }

    fn detach(&mut self) -> usize {
        let mut removed = 0;
        for id in self.subscription_ids.drain(..) {
            if self.subscriptions.unsubscribe(id) {
                removed += 1;
            }
        }
        removed
    }

    /// Start the content script on the current tokio runtime
    pub fn spawn(self) -> (ContentHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(self.run(rx));
        (ContentHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ContentCommand>) {
        info!("📄 Content script started");
        while let Some(command) = rx.recv().await {
            match command {
                ContentCommand::Page(event) => {
                    self.subscriptions
                        .dispatch(event.kind(), &mut self.tracker, &event);
                }
                ContentCommand::Query(reply) => {
                    let current = self.tracker.current_selection(Instant::now()).cloned();
                    let _ = reply.send(current);
                }
                ContentCommand::Ping(reply) => {
                    let _ = reply.send(true);
                }
                ContentCommand::Shutdown(reply) => {
                    let removed = self.detach();
                    let _ = reply.send(removed);
                    break;
                }
            }
        }
        info!("📄 Content script stopped");
    }
}
