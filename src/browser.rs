// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Chromium backed sessions
//!
//! Every participant gets its own chromium process with its own profile
//! directory. The camera of that process is replaced by the participant's
//! synthetic source and the permission prompt for camera and microphone is
//! granted automatically.

use std::{path::Path, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::CaptureScreenshotFormat,
    page::ScreenshotParams,
    Page,
};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::{
    task::JoinHandle,
    time::{sleep, timeout, Instant},
};
use url::Url;

use crate::{
    liveness::{MediaElementObservation, OBSERVE_MEDIA_SCRIPT},
    participant::ParticipantSpec,
    session::{Provisioner, Session, Surface},
    settings::BrowserSettings,
    Error,
};

/// How often a selector is looked up while waiting for it
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a browser may take to exit after it was asked to close
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Empties an input element, typing appends to the current value otherwise
const CLEAR_VALUE_FN: &str = "function() { this.value = ''; }";

/// Command line flags that bind the participant's synthetic source as camera
#[must_use]
pub fn launch_args(settings: &BrowserSettings, participant: &ParticipantSpec) -> Vec<String> {
    let mut args = vec![
        "--use-fake-ui-for-media-stream".to_string(),
        "--use-fake-device-for-media-stream".to_string(),
        format!(
            "--use-file-for-fake-video-capture={}",
            participant.source.display()
        ),
    ];

    if let Some(window) = participant.window {
        args.push(format!("--window-position={},{}", window.x, window.y));
    }

    args.extend(settings.extra_args.iter().cloned());

    args
}

#[derive(Debug, Clone)]
pub struct ChromiumProvisioner {
    settings: BrowserSettings,
}

impl ChromiumProvisioner {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provisioner for ChromiumProvisioner {
    async fn provision(&self, participant: &ParticipantSpec) -> crate::Result<Session> {
        let index = participant.index;

        log::info!(
            "Launch browser for participant {index} ('{}') with source {}",
            participant.display_name,
            participant.source.display()
        );

        let surface = ChromiumSurface::launch(&self.settings, participant)
            .await
            .map_err(|source| Error::Provisioning { index, source })?;

        Ok(Session::new(participant.clone(), Box::new(surface)))
    }
}

/// A chromium process with a single page
pub struct ChromiumSurface {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,

    // Removed after the browser has exited
    _profile: TempDir,
}

impl ChromiumSurface {
    async fn launch(settings: &BrowserSettings, participant: &ParticipantSpec) -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix(&format!("media-harness-{}-", participant.index))
            .tempdir()
            .context("failed to create browser profile directory")?;

        let args = launch_args(settings, participant);
        log::debug!("Participant {} launch args: {args:?}", participant.index);

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .launch_timeout(settings.launch_timeout)
            .args(args);

        if !settings.headless {
            builder = builder.with_head();
        }

        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }

        if let Some(window) = participant.window {
            builder = builder.window_size(window.width, window.height);
        }

        let config = builder.build().map_err(|e| anyhow!(e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch chromium")?;

        let index = participant.index;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Participant {index}: devtools handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close) = browser.close().await {
                    log::warn!("Participant {index}: failed to close browser: {close}");
                }
                handler.abort();
                return Err(e).context("failed to open page");
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
            _profile: profile,
        })
    }
}

#[async_trait]
impl Surface for ChromiumSurface {
    async fn goto(&self, url: &Url) -> Result<()> {
        self.page
            .goto(url.as_str())
            .await
            .with_context(|| format!("failed to navigate to {url}"))?;

        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        let deadline = Instant::now() + timeout;

        loop {
            let present: bool = self
                .page
                .evaluate(script.as_str())
                .await
                .with_context(|| format!("failed to query `{selector}`"))?
                .into_value()?;

            if present {
                return Ok(true);
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }

            sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("failed to find `{selector}`"))?;

        element
            .call_js_fn(CLEAR_VALUE_FN, false)
            .await
            .with_context(|| format!("failed to clear `{selector}`"))?;

        element
            .click()
            .await?
            .type_str(text)
            .await?;

        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("failed to find `{selector}`"))?
            .click()
            .await?;

        Ok(())
    }

    async fn observe_media(&self) -> Result<MediaElementObservation> {
        let observation = self
            .page
            .evaluate(OBSERVE_MEDIA_SCRIPT)
            .await
            .context("failed to evaluate media observation")?
            .into_value()?;

        Ok(observation)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        self.page
            .save_screenshot(params, path)
            .await
            .with_context(|| format!("failed to save screenshot to {}", path.display()))?;

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            bail!("browser already closed");
        }
        self.closed = true;

        let result = shut_down(&mut self.browser, EXIT_TIMEOUT).await;
        self.handler.abort();

        result
    }
}

/// The process operations needed to shut a browser down
#[async_trait]
trait BrowserProcess: Send {
    /// Ask the browser to close over the devtools connection
    async fn request_close(&mut self) -> Result<()>;

    async fn wait_exit(&mut self) -> Result<()>;

    async fn terminate(&mut self) -> Result<()>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> Result<()> {
        self.close().await?;
        Ok(())
    }

    async fn wait_exit(&mut self) -> Result<()> {
        self.wait().await?;
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        match self.kill().await {
            Some(result) => Ok(result?),
            // Not launched by us, nothing to kill
            None => Ok(()),
        }
    }
}

/// Close the browser and wait for it to exit.
///
/// A browser that refuses to close or does not exit within `exit_timeout` is
/// killed, so this always returns.
async fn shut_down<B: BrowserProcess + ?Sized>(
    browser: &mut B,
    exit_timeout: Duration,
) -> Result<()> {
    if let Err(e) = browser.request_close().await {
        if let Err(kill) = browser.terminate().await {
            log::warn!("Failed to kill browser: {kill:?}");
        }
        return Err(e).context("failed to close browser, killed it");
    }

    match timeout(exit_timeout, browser.wait_exit()).await {
        Ok(exit) => exit.context("failed to wait for browser exit"),
        Err(_) => {
            browser.terminate().await.context("failed to kill browser")?;
            bail!("browser did not exit within {exit_timeout:?}, killed it")
        }
    }
}

impl Drop for ChromiumSurface {
    fn drop(&mut self) {
        // The browser process is killed when `Browser` is dropped
        self.handler.abort();
    }
}
