use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hotel_scraper::cms::{CmsClient, CmsError, CmsPipeline, PushOptions};
use hotel_scraper::model::{FailureRecord, Hotel};
use hotel_scraper::store::{RecordStore, Stage};

/// Records every call in order; configured names reject or hang.
struct ScriptedClient {
    events: Arc<Mutex<Vec<String>>>,
    reject: HashSet<String>,
    hang: HashSet<String>,
    hang_once: HashSet<String>,
}

impl ScriptedClient {
    fn new(events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            events,
            reject: HashSet::new(),
            hang: HashSet::new(),
            hang_once: HashSet::new(),
        }
    }
}

#[async_trait]
impl CmsClient for ScriptedClient {
    async fn push(&mut self, hotel: &Hotel) -> Result<(), CmsError> {
        self.events.lock().unwrap().push(format!("push:{}", hotel.name));
        if self.hang.contains(&hotel.name) || self.hang_once.remove(&hotel.name) {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        if self.reject.contains(&hotel.name) {
            return Err(CmsError::Rejected("This field is required.".into()));
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), CmsError> {
        self.events.lock().unwrap().push("reset".into());
        Ok(())
    }

    async fn recycle(&mut self) -> Result<(), CmsError> {
        self.events.lock().unwrap().push("recycle".into());
        Ok(())
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

fn seeded_store(dir: &tempfile::TempDir, names: &[&str]) -> RecordStore {
    let store = RecordStore::new(dir.path(), "inghams", "inghams-2023-05-03");
    store.create(Stage::Records).unwrap();
    for name in names {
        store.append(Stage::Records, &hotel(name)).unwrap();
    }
    store
}

fn options() -> PushOptions {
    PushOptions {
        settle: Duration::ZERO,
        push_timeout: Duration::from_millis(50),
        refresh_every: None,
    }
}

#[tokio::test]
async fn a_mid_queue_failure_is_ledgered_and_the_rest_still_push() {
    // Three records, the second rejected by the remote.
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A", "B", "C"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut client = ScriptedClient::new(events.clone());
    client.reject.insert("B".into());

    let outcome = CmsPipeline::new(client, options()).run(&store).await.unwrap();

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.pushed, 2);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.had_failures);

    // Every record was attempted, in input order; the failure also
    // triggered a reset before the next attempt.
    assert_eq!(
        *events.lock().unwrap(),
        ["push:A", "push:B", "reset", "push:C"]
    );

    let failures: Vec<FailureRecord> = store.read_all(Stage::CmsFails).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "B");
    assert!(failures[0].url.is_none());
    assert!(failures[0].reason.contains("This field is required."));
}

#[tokio::test]
async fn ledger_detection_flips_only_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A", "B"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut client = ScriptedClient::new(events);
    client.reject.insert("B".into());

    assert!(!store.has_failures(Stage::CmsFails).unwrap());
    let outcome = CmsPipeline::new(client, options()).run(&store).await.unwrap();
    assert!(outcome.had_failures);
    assert!(store.has_failures(Stage::CmsFails).unwrap());
}

#[tokio::test]
async fn rerunning_a_pass_resubmits_already_committed_records() {
    // The primary file is never mutated by a push pass, so a naive
    // rerun submits every record again, duplicates included. That is
    // the accepted trade-off; the ledger alone marks what failed.
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A", "B"]);
    let events = Arc::new(Mutex::new(Vec::new()));

    CmsPipeline::new(ScriptedClient::new(events.clone()), options())
        .run(&store)
        .await
        .unwrap();
    CmsPipeline::new(ScriptedClient::new(events.clone()), options())
        .run(&store)
        .await
        .unwrap();

    let records: Vec<Hotel> = store.read_all(Stage::Records).unwrap();
    assert_eq!(records.len(), 2, "push passes leave the primary file alone");
    assert_eq!(
        *events.lock().unwrap(),
        ["push:A", "push:B", "push:A", "push:B"]
    );
}

#[tokio::test]
async fn a_push_timeout_recycles_the_session_and_retries_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut client = ScriptedClient::new(events.clone());
    client.hang_once.insert("A".into());

    let outcome = CmsPipeline::new(client, options()).run(&store).await.unwrap();

    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.failed, 0);
    assert!(!outcome.had_failures);
    assert_eq!(
        *events.lock().unwrap(),
        ["push:A", "recycle", "push:A"]
    );
}

#[tokio::test]
async fn a_second_timeout_fails_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A", "B"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut client = ScriptedClient::new(events.clone());
    client.hang.insert("A".into());

    let outcome = CmsPipeline::new(client, options()).run(&store).await.unwrap();

    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.failed, 1);

    let failures: Vec<FailureRecord> = store.read_all(Stage::CmsFails).unwrap();
    assert_eq!(failures[0].name, "A");
    assert!(failures[0].reason.contains("timed out twice"));

    // B still went through after A's two attempts.
    assert_eq!(events.lock().unwrap().last().unwrap(), "push:B");
}

#[tokio::test]
async fn the_session_is_recycled_on_the_refresh_cadence() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A", "B", "C", "D", "E"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let client = ScriptedClient::new(events.clone());

    let mut opts = options();
    opts.refresh_every = Some(2);
    CmsPipeline::new(client, opts).run(&store).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        [
            "push:A", "push:B", "recycle", "push:C", "push:D", "recycle", "push:E"
        ]
    );
}

#[tokio::test]
async fn failures_keep_queue_order_in_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, &["A", "B", "C", "D"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut client = ScriptedClient::new(events);
    client.reject.insert("A".into());
    client.reject.insert("C".into());

    CmsPipeline::new(client, options()).run(&store).await.unwrap();

    let failures: Vec<FailureRecord> = store.read_all(Stage::CmsFails).unwrap();
    let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["A", "C"]);
}
