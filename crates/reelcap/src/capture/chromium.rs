//! Headless Chromium request capture using chromiumoxide.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSent};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CaptureHandle, ObservedRequest, RequestSink, RequestSource};
use crate::AcquireError;

/// Find a Chromium binary: `REELCAP_CHROMIUM_PATH`, then the usual names on `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("REELCAP_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Explicit browser binary; discovered with [`find_chromium`] when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub navigation_timeout: Duration,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ChromiumRequestSource {
    browser: Browser,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumRequestSource {
    /// Launch a browser instance for capturing.
    pub async fn launch(config: ChromiumConfig) -> Result<Self, AcquireError> {
        let chrome_path = config
            .executable
            .or_else(find_chromium)
            .ok_or_else(|| AcquireError::configuration("Chromium not found"))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--mute-audio");
        builder = if config.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let browser_config = builder
            .build()
            .map_err(|e| AcquireError::configuration(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AcquireError::configuration(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        info!("Chromium launched");
        Ok(Self {
            browser,
            handler,
            navigation_timeout: config.navigation_timeout,
        })
    }

    /// Close the browser and wait for its process to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close Chromium cleanly");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

#[async_trait]
impl RequestSource for ChromiumRequestSource {
    async fn start(
        &self,
        entry_url: &str,
        sink: RequestSink,
    ) -> Result<Box<dyn CaptureHandle>, AcquireError> {
        let nav_err = |e: &dyn std::fmt::Display| AcquireError::navigation(entry_url, e.to_string());

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| nav_err(&e))?;
        page.execute(EnableParams::default())
            .await
            .map_err(|e| nav_err(&e))?;

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| nav_err(&e))?;

        // listener is live before navigation starts
        let forward = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                if sink.send(ObservedRequest::new(event.request.url.clone())).is_err() {
                    break;
                }
            }
        });

        let navigation = tokio::time::timeout(self.navigation_timeout, page.goto(entry_url)).await;
        let failure = match navigation {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(nav_err(&e)),
            Err(_) => Some(AcquireError::timeout(
                format!("navigation to {entry_url}"),
                self.navigation_timeout,
            )),
        };

        if let Some(err) = failure {
            forward.abort();
            let _ = page.close().await;
            return Err(err);
        }

        debug!(entry_url, "Navigation complete");
        Ok(Box::new(ChromiumCapture {
            page: Some(page),
            forward,
        }))
    }
}

struct ChromiumCapture {
    page: Option<Page>,
    forward: JoinHandle<()>,
}

#[async_trait]
impl CaptureHandle for ChromiumCapture {
    async fn stop(mut self: Box<Self>) {
        self.forward.abort();
        let _ = (&mut self.forward).await;
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!(error = %e, "Failed to close capture page");
        }
    }
}

impl Drop for ChromiumCapture {
    fn drop(&mut self) {
        self.forward.abort();
        // abandoned without stop(): close the page in the background
        if let Some(page) = self.page.take()
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!(error = %e, "Failed to close abandoned capture page");
                }
            });
        }
    }
}
