#![allow(dead_code)]

pub mod mock_ai;
pub mod mock_tts;

use mock_ai::MockAi;
use mock_tts::MockTts;
use pagelens::config::{Config, SelectionLimits};
use pagelens::content::{ContentHandle, ContentScript};
use pagelens::coordinator::Coordinator;
use pagelens::popup::Popup;
use pagelens::selection::PageEvent;
use pagelens::store::{KeyValueStore, MemoryStore};
use pagelens::tts::Narrator;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, thread};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const PAGE: &str = "https://example.com/article";
pub const SENTENCE: &str = "The committee postponed the decision until further notice was given.";

pub fn text_selected(text: &str) -> PageEvent {
    PageEvent::TextSelected {
        text: text.to_string(),
        context_before: "Earlier that day, ".to_string(),
        context_after: " Nobody objected.".to_string(),
        element_tag: "p".to_string(),
        page_url: PAGE.to_string(),
    }
}

pub fn image_context_menu(src: &str, width: u32, height: u32) -> PageEvent {
    PageEvent::ImageContextMenu {
        src: src.to_string(),
        alt: Some("A cat".to_string()),
        natural_width: width,
        natural_height: height,
        rendered_width: width,
        rendered_height: height,
        visible: true,
        element_tag: "img".to_string(),
        page_url: PAGE.to_string(),
    }
}

/// Content script, coordinator and popup wired together in-process
pub struct Stack {
    pub content: ContentHandle,
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<dyn KeyValueStore>,
    pub ai: MockAi,
    pub tts: MockTts,
    pub popup: Arc<Popup>,
}

impl Stack {
    pub fn new() -> Self {
        Self::with(MockAi::new(), Arc::new(MemoryStore::new()))
    }

    pub fn with(ai: MockAi, store: Arc<dyn KeyValueStore>) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (content, _task) = ContentScript::new(SelectionLimits::default(), notify_tx).spawn();
        let coordinator = Arc::new(Coordinator::new(content.clone(), store.clone()));
        tokio::spawn(coordinator.clone().run_notifications(notify_rx));

        let tts = MockTts::new();
        let popup = Arc::new(Popup::new(
            coordinator.clone(),
            ai.capabilities(),
            store.clone(),
            Narrator::new(Arc::new(tts.clone())),
        ));

        Self {
            content,
            coordinator,
            store,
            ai,
            tts,
            popup,
        }
    }

    /// Deliver an event and wait until the content script has applied it
    pub async fn select(&self, event: PageEvent) {
        self.content.page_event(event).await.unwrap();
        assert!(self.content.ping().await.unwrap());
    }
}

/// A `pagelens serve` daemon on a private socket
pub struct TestContext {
    pub temp_dir: TempDir,
    pub child: Child,
    pub socket_path: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let bin_path = env!("CARGO_BIN_EXE_pagelens");

        let config_dir = temp_dir.path().join("config");
        let data_dir = temp_dir.path().join("data");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        let config_path = config_dir.join("config.json");
        let config = Config {
            store_path: data_dir.join("store.db").to_string_lossy().to_string(),
            ..Config::default()
        };
        config.save_to(&config_path).expect("Failed to write config");

        let socket_path = temp_dir.path().join("pagelens.sock");

        let child = Command::new(bin_path)
            .arg("--config")
            .arg(&config_path)
            .arg("--socket")
            .arg(&socket_path)
            .arg("serve")
            .env("XDG_CONFIG_HOME", &config_dir)
            .env("XDG_DATA_HOME", &data_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("Failed to spawn pagelens daemon");

        let ctx = TestContext {
            temp_dir,
            child,
            socket_path,
        };

        ctx.wait_for_socket();
        ctx
    }

    fn wait_for_socket(&self) {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if self.socket_path.exists() {
                // Permissions are set right after bind
                thread::sleep(Duration::from_millis(50));
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
        panic!("Timed out waiting for socket at {:?}", self.socket_path);
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
