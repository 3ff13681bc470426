use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::fetch::PageFetcher;
use crate::model::FailureRecord;
use crate::sites::SiteAdapter;
use crate::store::{RecordStore, Stage, StoreError};

/// Outcome of one scrape pass. `had_failures` reflects the
/// `-SCRAPE-FAILS` ledger on disk.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub total: usize,
    pub stored: usize,
    pub failed: usize,
    pub had_failures: bool,
}

/// Walks a fixed URL list: fetch the page, extract a record through the
/// site adapter, append it to the run's primary file.
///
/// The primary file is reset at the start of the pass, so this is
/// always a fresh batch. Any fetch or extraction error is projected
/// into the `-SCRAPE-FAILS` ledger and the walk continues; one bad URL
/// never aborts the batch. Only store-level errors abort.
pub struct ScrapePipeline<'a> {
    fetcher: &'a dyn PageFetcher,
    adapter: &'a dyn SiteAdapter,
}

impl<'a> ScrapePipeline<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, adapter: &'a dyn SiteAdapter) -> Self {
        Self { fetcher, adapter }
    }

    pub async fn run(
        &self,
        store: &RecordStore,
        urls: &[String],
    ) -> Result<ScrapeOutcome, StoreError> {
        store.create(Stage::Records)?;
        let total = urls.len();
        info!(total, "scraping listing pages");

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .expect("static template")
                .progress_chars("=> "),
        );

        let mut stored = 0usize;
        let mut failed = 0usize;

        for url in urls {
            let url = url.trim();
            match self.scrape_one(url).await {
                Ok(hotel) => {
                    store.append(Stage::Records, &hotel)?;
                    stored += 1;
                }
                Err(reason) => {
                    failed += 1;
                    warn!(url, reason = %reason, "listing failed, recording to ledger");
                    store.record_failure(
                        Stage::ScrapeFails,
                        &FailureRecord::scrape(name_from_url(url), url, reason),
                    )?;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        let had_failures = store.has_failures(Stage::ScrapeFails)?;
        Ok(ScrapeOutcome {
            total,
            stored,
            failed,
            had_failures,
        })
    }

    async fn scrape_one(&self, url: &str) -> Result<crate::model::Hotel, String> {
        let page = self.fetcher.fetch(url).await.map_err(|e| e.to_string())?;
        self.adapter.extract(&page).map_err(|e| e.to_string())
    }
}

/// Best-effort name for a page that never produced a record: the URL's
/// last non-empty path segment.
fn name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_string()
}
