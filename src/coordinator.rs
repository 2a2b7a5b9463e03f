//! Coordinator
//!
//! Background relay between the content script, the popup and the store.
//! Every request kind is forwarded to its owner without transformation; the
//! only state kept here is whether a selection has been announced.

use crate::content::ContentHandle;
use crate::error::LensResult;
use crate::ipc::{Relay, Request, Response};
use crate::store::{KeyValueStore, SavedItems, SettingsStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Reported for brokered processing, which the popup does itself
pub const PROCESSING_NOT_AVAILABLE: &str = "Processing through the coordinator is not yet available";

#[derive(Debug)]
pub struct Coordinator {
    content: ContentHandle,
    store: Arc<dyn KeyValueStore>,
    saved: SavedItems,
    settings: SettingsStore,
    has_selection: AtomicBool,
}

impl Coordinator {
    pub fn new(content: ContentHandle, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            content,
            saved: SavedItems::new(store.clone()),
            settings: SettingsStore::new(store.clone()),
            store,
            has_selection: AtomicBool::new(false),
        }
    }

    /// Whether the content script has announced a selection that has not
    /// since been reported gone
    pub fn has_selection(&self) -> bool {
        self.has_selection.load(Ordering::SeqCst)
    }

    /// Handle one request. Failures come back as an `error` response.
    pub async fn relay(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("⚠️ Relay failed: {}", e);
                Response::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> LensResult<Response> {
        match request {
            Request::ContentSelected { selection } => {
                info!("📡 Content selected: {}", selection.preview(60));
                self.has_selection.store(true, Ordering::SeqCst);
                Ok(Response::Ok { ok: true })
            }
            Request::PageEvent { event } => {
                self.content.page_event(event).await?;
                Ok(Response::Ok { ok: true })
            }
            Request::GetSelectedContent => {
                let selection = self.content.current_selection().await?;
                if selection.is_none() {
                    // Navigation or grace expiry dropped it
                    self.has_selection.store(false, Ordering::SeqCst);
                }
                Ok(Response::Selection { selection })
            }
            Request::Ping => Ok(Response::Ready { ready: true }),
            Request::GetStorage { keys } => {
                let data = self.store.get(&keys).await?;
                Ok(Response::Data { data })
            }
            Request::SetStorage { data } => {
                self.store.set(data).await?;
                Ok(Response::Ok { ok: true })
            }
            Request::GetSetting { key } => {
                let value = self.settings.get_field(&key).await?;
                Ok(Response::Setting { key, value })
            }
            Request::SetSetting { key, value } => {
                self.settings.set_field(&key, value).await?;
                Ok(Response::Ok { ok: true })
            }
            Request::GetSavedItems => {
                let items = self.saved.list().await?;
                Ok(Response::SavedItems { items })
            }
            Request::DeleteSavedItem { id } => {
                let ok = self.saved.delete(&id).await?;
                Ok(Response::Ok { ok })
            }
            Request::ProcessContent { action, .. } => {
                debug!("Process request for {} declined", action);
                Ok(Response::NotAvailable {
                    message: PROCESSING_NOT_AVAILABLE.to_string(),
                })
            }
        }
    }

    /// Drain selection notifications from the content script, in order
    pub async fn run_notifications(self: Arc<Self>, mut rx: UnboundedReceiver<Request>) {
        while let Some(request) = rx.recv().await {
            if let Response::Error { message, .. } = self.relay(request).await {
                warn!("⚠️ Notification not handled: {}", message);
            }
        }
        debug!("Notification channel closed");
    }
}

#[async_trait]
impl Relay for Coordinator {
    async fn send(&self, request: Request) -> LensResult<Response> {
        self.relay(request).await.into_result()
    }
}
