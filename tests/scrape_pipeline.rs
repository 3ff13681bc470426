use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use hotel_scraper::fetch::{FetchError, Page, PageFetcher};
use hotel_scraper::model::{FailureRecord, Hotel};
use hotel_scraper::scrape::ScrapePipeline;
use hotel_scraper::sites::{ExtractError, SiteAdapter};
use hotel_scraper::store::{RecordStore, Stage};

/// Serves canned HTML per URL; unknown URLs come back as a 404.
struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(u, h)| (u.to_string(), h.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        match self.pages.get(url) {
            Some(html) => Ok(Page {
                url: url.to_string(),
                html: html.clone(),
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Pages look like "name:<hotel name>"; anything else fails extraction.
struct NameAdapter;

impl SiteAdapter for NameAdapter {
    fn extract(&self, page: &Page) -> Result<Hotel, ExtractError> {
        match page.html.strip_prefix("name:") {
            Some(name) => Ok(hotel(name)),
            None => Err(ExtractError::Missing("hotel name")),
        }
    }
}

fn hotel(name: &str) -> Hotel {
    Hotel {
        name: name.to_string(),
        slug: None,
        description: format!("About {name}."),
        resort: None,
        best_for: BTreeMap::new(),
        rooms: "Rooms.".into(),
        meals: "Meals.".into(),
        location: None,
        facilities: Vec::new(),
        facility_descriptions: BTreeMap::new(),
        images: Vec::new(),
    }
}

fn store(dir: &tempfile::TempDir) -> RecordStore {
    RecordStore::new(dir.path(), "tui", "tui-2023-05-03")
}

#[tokio::test]
async fn one_bad_url_is_ledgered_and_the_batch_continues() {
    // Two seed URLs, one of which 404s.
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let fetcher = MapFetcher::new(&[("https://example.com/good", "name:Hotel Good")]);
    let urls = vec![
        "https://example.com/good".to_string(),
        "https://example.com/gone".to_string(),
    ];

    let outcome = ScrapePipeline::new(&fetcher, &NameAdapter)
        .run(&store, &urls)
        .await
        .unwrap();

    assert_eq!(outcome.total, 2);
    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.had_failures);

    let records: Vec<Hotel> = store.read_all(Stage::Records).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Hotel Good");

    let failures: Vec<FailureRecord> = store.read_all(Stage::ScrapeFails).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url.as_deref(), Some("https://example.com/gone"));
    assert!(failures[0].reason.contains("404"), "reason was {}", failures[0].reason);
    assert_eq!(failures[0].name, "gone");
}

#[tokio::test]
async fn successes_and_failures_both_keep_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let fetcher = MapFetcher::new(&[
        ("https://example.com/a", "name:A"),
        ("https://example.com/b", "not a listing"),
        ("https://example.com/c", "name:C"),
        ("https://example.com/d", "not a listing"),
        ("https://example.com/e", "name:E"),
    ]);
    let urls: Vec<String> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|s| format!("https://example.com/{s}"))
        .collect();

    let outcome = ScrapePipeline::new(&fetcher, &NameAdapter)
        .run(&store, &urls)
        .await
        .unwrap();
    assert_eq!((outcome.stored, outcome.failed), (3, 2));

    let records: Vec<Hotel> = store.read_all(Stage::Records).unwrap();
    let names: Vec<_> = records.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, ["A", "C", "E"]);

    let failures: Vec<FailureRecord> = store.read_all(Stage::ScrapeFails).unwrap();
    let failed: Vec<_> = failures.iter().map(|f| f.url.as_deref().unwrap()).collect();
    assert_eq!(failed, ["https://example.com/b", "https://example.com/d"]);
    assert!(failures[0].reason.contains("hotel name"));
}

#[tokio::test]
async fn a_clean_pass_creates_no_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let fetcher = MapFetcher::new(&[("https://example.com/a", "name:A")]);
    let urls = vec!["https://example.com/a".to_string()];

    let outcome = ScrapePipeline::new(&fetcher, &NameAdapter)
        .run(&store, &urls)
        .await
        .unwrap();

    assert!(!outcome.had_failures);
    assert!(!store.has_failures(Stage::ScrapeFails).unwrap());
    assert!(!store.path(Stage::ScrapeFails).exists());
}

#[tokio::test]
async fn rerunning_a_scrape_resets_the_primary_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let fetcher = MapFetcher::new(&[("https://example.com/a", "name:A")]);
    let urls = vec!["https://example.com/a".to_string()];

    let pipeline = ScrapePipeline::new(&fetcher, &NameAdapter);
    pipeline.run(&store, &urls).await.unwrap();
    pipeline.run(&store, &urls).await.unwrap();

    // Two passes over the same run name do not double up records.
    let records: Vec<Hotel> = store.read_all(Stage::Records).unwrap();
    assert_eq!(records.len(), 1);
}
