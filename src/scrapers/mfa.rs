//! Kazakh Ministry of Foreign Affairs press listing scraper.
//!
//! Walks the paginated news listing at
//! [gov.kz](https://www.gov.kz/memleket/entities/mfa/press/news/1?lang=en),
//! collecting each headline and its publication date.
//!
//! # Page Contract
//!
//! | Element | Selector |
//! |---------|----------|
//! | News card (presence check) | `div.card-news-list__item` |
//! | Headline text | `div.inner-html` |
//! | Publication date | `p.typography.typography__variant-caption.categories__item.color_grey` |
//! | Pagination control | `button[aria-label="Next page"]` |
//!
//! # Termination
//!
//! Pagination stops at the first of: no "Next page" control, a disabled
//! control, a wait timeout, any other driver failure, or the wall-clock
//! budget. Nothing is retried; headlines gathered before the stop are kept.

use super::{BrowserSession, wait_for_presence};
use crate::models::HeadlineRecord;
use crate::webdriver::{WebDriver, WebDriverError};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, instrument, warn};

pub const START_URL: &str = "https://www.gov.kz/memleket/entities/mfa/press/news/1?lang=en";

const CONTAINER_CSS: &str = "div.card-news-list__item";
const NEXT_PAGE_CSS: &str = r#"button[aria-label="Next page"]"#;

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.inner-html").expect("static title selector"));
static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p.typography.typography__variant-caption.categories__item.color_grey")
        .expect("static date selector")
});

/// Waits and pauses used while paging.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Maximum wait for news cards to appear on a page.
    pub wait_timeout: Duration,
    /// Interval between presence checks while waiting.
    pub poll_interval: Duration,
    /// Pause after scrolling the pagination control into view.
    pub scroll_pause: Duration,
    /// Pause after clicking, for the next page to render.
    pub render_pause: Duration,
    /// Wall-clock budget for the whole loop.
    pub budget: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            scroll_pause: Duration::from_secs(1),
            render_pause: Duration::from_secs(2),
            budget: Duration::from_secs(20 * 60),
        }
    }
}

/// Everything needed to run one scrape.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub start_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub pacing: Pacing,
}

enum PageOutcome {
    Advanced,
    LastPage,
}

/// Scrape the listing from `config.start_url` until exhausted.
///
/// The browser session is closed before returning, whether pagination ended
/// normally, hit the budget, or failed.
#[instrument(level = "info", skip_all, fields(url = %config.start_url))]
pub async fn scrape(config: &ScrapeConfig) -> Result<Vec<HeadlineRecord>, Box<dyn Error>> {
    let driver = WebDriver::new(&config.webdriver_url)?;
    let session = driver.new_session(config.headless).await?;

    let collected = match session.goto(&config.start_url).await {
        Ok(()) => Ok(paginate(&session, &config.pacing).await),
        Err(e) => {
            error!(error = %e, "Could not open start page");
            Err(e)
        }
    };

    if let Err(e) = session.quit().await {
        warn!(error = %e, "Failed to close browser session");
    }

    let records = collected?;
    info!(count = records.len(), "Scrape finished");
    Ok(records)
}

/// Collect headlines page by page until the listing is exhausted.
#[instrument(level = "info", skip_all)]
pub async fn paginate<B: BrowserSession>(browser: &B, pacing: &Pacing) -> Vec<HeadlineRecord> {
    let started = Instant::now();
    let mut records = Vec::new();
    let mut page = 1usize;

    loop {
        if started.elapsed() > pacing.budget {
            info!(page, budget = ?pacing.budget, "Time budget reached; ending pagination");
            break;
        }

        match scrape_page(browser, pacing, &mut records).await {
            Ok(PageOutcome::Advanced) => {
                debug!(page, total = records.len(), "Advanced to next page");
                page += 1;
            }
            Ok(PageOutcome::LastPage) => {
                info!(page, "Next button is disabled; ending pagination");
                break;
            }
            Err(e) if e.is_exhaustion() => {
                info!(page, error = %e, "No more pages");
                break;
            }
            Err(e) => {
                error!(page, error = %e, "Browser failure; keeping partial results");
                break;
            }
        }
    }

    info!(pages = page, count = records.len(), elapsed = ?started.elapsed(), "Pagination complete");
    records
}

async fn scrape_page<B: BrowserSession>(
    browser: &B,
    pacing: &Pacing,
    records: &mut Vec<HeadlineRecord>,
) -> Result<PageOutcome, WebDriverError> {
    wait_for_presence(browser, CONTAINER_CSS, pacing.wait_timeout, pacing.poll_interval).await?;

    let html = browser.page_source().await?;
    records.extend(parse_listing(&html));

    let next = browser.find(NEXT_PAGE_CSS).await?;
    if !browser.is_enabled(&next).await? {
        return Ok(PageOutcome::LastPage);
    }

    browser.scroll_into_view(&next).await?;
    sleep(pacing.scroll_pause).await;
    browser.click(&next).await?;
    sleep(pacing.render_pause).await;
    Ok(PageOutcome::Advanced)
}

/// Extract (date, title) pairs from one rendered listing page.
///
/// Titles and dates are matched by position. When the counts differ the
/// extra entries are dropped.
pub fn parse_listing(html: &str) -> Vec<HeadlineRecord> {
    let document = Html::parse_document(html);
    let titles: Vec<String> = document.select(&TITLE_SELECTOR).map(element_text).collect();
    let dates: Vec<String> = document.select(&DATE_SELECTOR).map(element_text).collect();

    if titles.len() != dates.len() {
        warn!(
            titles = titles.len(),
            dates = dates.len(),
            "Title and date counts differ; pairing by position"
        );
    }

    dates
        .into_iter()
        .zip(titles)
        .map(|(date, title)| HeadlineRecord { date, title })
        .collect()
}

/// Text content with each fragment trimmed and blank fragments dropped.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webdriver::Result;
    use std::cell::Cell;

    fn listing(items: &[(&str, &str)]) -> String {
        let cards: String = items
            .iter()
            .map(|(date, title)| {
                format!(
                    r#"<div class="card-news-list__item">
                         <div class="inner-html"><p> {title} </p></div>
                         <p class="typography typography__variant-caption categories__item color_grey">{date}</p>
                       </div>"#
                )
            })
            .collect();
        format!("<html><body>{cards}</body></html>")
    }

    #[derive(Clone, Copy, PartialEq)]
    enum LastPage {
        NoButton,
        Disabled,
    }

    struct FakeBrowser {
        pages: Vec<String>,
        current: Cell<usize>,
        last_page: LastPage,
        endless: bool,
        clicks: Cell<usize>,
        /// Page index whose source read fails, and the error it fails with.
        failure: Option<(usize, fn() -> WebDriverError)>,
    }

    impl FakeBrowser {
        fn new(pages: Vec<String>, last_page: LastPage) -> Self {
            Self {
                pages,
                current: Cell::new(0),
                last_page,
                endless: false,
                clicks: Cell::new(0),
                failure: None,
            }
        }

        fn page(&self) -> &str {
            &self.pages[self.current.get().min(self.pages.len() - 1)]
        }

        fn on_last_page(&self) -> bool {
            !self.endless && self.current.get() + 1 >= self.pages.len()
        }
    }

    impl BrowserSession for FakeBrowser {
        type Handle = ();

        async fn find_all(&self, css: &str) -> Result<Vec<()>> {
            let class = css.trim_start_matches("div.");
            Ok(self.page().matches(class).map(|_| ()).collect())
        }

        async fn find(&self, _css: &str) -> Result<()> {
            if self.on_last_page() && self.last_page == LastPage::NoButton {
                return Err(WebDriverError::NoSuchElement("Next page".into()));
            }
            Ok(())
        }

        async fn page_source(&self) -> Result<String> {
            if let Some((page, error)) = self.failure {
                if self.current.get() == page {
                    return Err(error());
                }
            }
            Ok(self.page().to_string())
        }

        async fn is_enabled(&self, _handle: &()) -> Result<bool> {
            Ok(!(self.on_last_page() && self.last_page == LastPage::Disabled))
        }

        async fn scroll_into_view(&self, _handle: &()) -> Result<()> {
            Ok(())
        }

        async fn click(&self, _handle: &()) -> Result<()> {
            self.clicks.set(self.clicks.get() + 1);
            if !self.endless {
                self.current.set(self.current.get() + 1);
            }
            Ok(())
        }
    }

    fn fast() -> Pacing {
        Pacing {
            wait_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
            scroll_pause: Duration::ZERO,
            render_pause: Duration::ZERO,
            budget: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_parse_listing_pairs_dates_and_titles() {
        let html = listing(&[
            ("15 January 2022", "Kazakhstan and Russia discuss trade"),
            ("1 March 2022", "Kazakh FM meets Chinese envoy"),
        ]);
        let records = parse_listing(&html);
        assert_eq!(
            records,
            vec![
                HeadlineRecord {
                    date: "15 January 2022".into(),
                    title: "Kazakhstan and Russia discuss trade".into()
                },
                HeadlineRecord {
                    date: "1 March 2022".into(),
                    title: "Kazakh FM meets Chinese envoy".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_listing_ignores_other_captions() {
        let html = r#"<div class="inner-html">Title</div>
            <p class="typography typography__variant-caption">not a date</p>
            <p class="typography typography__variant-caption categories__item color_grey">2 May 2023</p>"#;
        let records = parse_listing(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, "2 May 2023");
    }

    #[test]
    fn test_parse_listing_truncates_mismatched_counts() {
        let html = r#"<div class="inner-html">One</div><div class="inner-html">Two</div>
            <p class="typography typography__variant-caption categories__item color_grey">2 May 2023</p>"#;
        let records = parse_listing(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "One");
    }

    #[test]
    fn test_element_text_joins_fragments() {
        let html = Html::parse_fragment(r#"<div class="inner-html"> <b>FM</b>   meets envoy </div>"#);
        let el = html.select(&TITLE_SELECTOR).next().unwrap();
        assert_eq!(element_text(el), "FM meets envoy");
    }

    #[tokio::test]
    async fn test_paginate_stops_when_next_button_missing() {
        let browser = FakeBrowser::new(
            vec![
                listing(&[("1 May 2023", "A")]),
                listing(&[("2 May 2023", "B"), ("3 May 2023", "C")]),
            ],
            LastPage::NoButton,
        );
        let records = paginate(&browser, &fast()).await;
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(browser.clicks.get(), 1);
    }

    #[tokio::test]
    async fn test_paginate_stops_when_next_button_disabled() {
        let browser = FakeBrowser::new(
            vec![listing(&[("1 May 2023", "A")]), listing(&[("2 May 2023", "B")])],
            LastPage::Disabled,
        );
        let records = paginate(&browser, &fast()).await;
        assert_eq!(records.len(), 2);
        assert_eq!(browser.clicks.get(), 1);
    }

    #[tokio::test]
    async fn test_paginate_keeps_partial_results_on_timeout() {
        let browser = FakeBrowser::new(
            vec![
                listing(&[("1 May 2023", "A")]),
                "<html><body>loading…</body></html>".to_string(),
                listing(&[("3 May 2023", "never reached")]),
            ],
            LastPage::NoButton,
        );
        let records = paginate(&browser, &fast()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "A");
    }

    fn three_pages() -> Vec<String> {
        vec![
            listing(&[("1 May 2023", "A"), ("1 May 2023", "B")]),
            listing(&[("2 May 2023", "C")]),
            listing(&[("3 May 2023", "D")]),
        ]
    }

    #[tokio::test]
    async fn test_paginate_keeps_partial_results_on_protocol_error() {
        let mut browser = FakeBrowser::new(three_pages(), LastPage::NoButton);
        let crash: fn() -> WebDriverError = || WebDriverError::Protocol {
            error: "unknown error".into(),
            message: "session deleted because of page crash".into(),
        };
        browser.failure = Some((1, crash));
        let records = paginate(&browser, &fast()).await;
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(browser.clicks.get(), 1);
    }

    #[tokio::test]
    async fn test_paginate_keeps_partial_results_on_network_error() {
        let mut browser = FakeBrowser::new(three_pages(), LastPage::NoButton);
        let refused: fn() -> WebDriverError = || WebDriverError::Network("connection refused".into());
        browser.failure = Some((1, refused));
        let records = paginate(&browser, &fast()).await;
        assert_eq!(records.len(), 2);
        assert_eq!(browser.clicks.get(), 1);
    }

    #[tokio::test]
    async fn test_paginate_respects_time_budget() {
        let mut browser = FakeBrowser::new(vec![listing(&[("1 May 2023", "A")])], LastPage::NoButton);
        browser.endless = true;
        let pacing = Pacing {
            render_pause: Duration::from_millis(5),
            budget: Duration::from_millis(40),
            ..fast()
        };
        let records = paginate(&browser, &pacing).await;
        assert!(!records.is_empty());
        assert_eq!(records.len(), browser.clicks.get());
    }
}
