//! Browser-driven scrapers for paginated press listings.
//!
//! The listing is rendered client-side, so pages are read through a browser
//! session rather than fetched directly. Scrapers are written against the
//! [`BrowserSession`] trait; [`crate::webdriver::Session`] is the production
//! implementation and tests substitute an in-memory fake.
//!
//! # Supported Sources
//!
//! | Source | Module | Pagination |
//! |--------|--------|------------|
//! | Kazakh MFA press news | [`mfa`] | "Next page" button |

pub mod mfa;

use crate::webdriver::{ElementRef, Result, Session, WebDriverError};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// The browser operations a pagination loop relies on.
pub trait BrowserSession {
    /// Handle to an element on the current page.
    type Handle;

    /// Every element matching `css`; empty when none are present yet.
    async fn find_all(&self, css: &str) -> Result<Vec<Self::Handle>>;

    /// The first element matching `css`, or [`WebDriverError::NoSuchElement`].
    async fn find(&self, css: &str) -> Result<Self::Handle>;

    async fn page_source(&self) -> Result<String>;

    async fn is_enabled(&self, handle: &Self::Handle) -> Result<bool>;

    async fn scroll_into_view(&self, handle: &Self::Handle) -> Result<()>;

    async fn click(&self, handle: &Self::Handle) -> Result<()>;
}

impl BrowserSession for Session {
    type Handle = ElementRef;

    async fn find_all(&self, css: &str) -> Result<Vec<ElementRef>> {
        self.find_elements(css).await
    }

    async fn find(&self, css: &str) -> Result<ElementRef> {
        self.find_element(css).await
    }

    async fn page_source(&self) -> Result<String> {
        Session::page_source(self).await
    }

    async fn is_enabled(&self, handle: &ElementRef) -> Result<bool> {
        Session::is_enabled(self, handle).await
    }

    async fn scroll_into_view(&self, handle: &ElementRef) -> Result<()> {
        Session::scroll_into_view(self, handle).await
    }

    async fn click(&self, handle: &ElementRef) -> Result<()> {
        Session::click(self, handle).await
    }
}

/// Poll until at least one element matches `css`, or fail with
/// [`WebDriverError::Timeout`] once `timeout` has passed.
pub async fn wait_for_presence<B: BrowserSession>(
    browser: &B,
    css: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<usize> {
    let started = Instant::now();
    loop {
        let found = browser.find_all(css).await?;
        if !found.is_empty() {
            debug!(selector = css, count = found.len(), "Elements present");
            return Ok(found.len());
        }
        if started.elapsed() >= timeout {
            return Err(WebDriverError::Timeout {
                selector: css.to_string(),
                waited: started.elapsed(),
            });
        }
        sleep(poll_interval).await;
    }
}
