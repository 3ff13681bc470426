use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::model::{FailureRecord, Hotel};
use crate::store::{RecordStore, Stage, StoreError};

use super::CmsClient;

/// Knobs for one push pass.
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Pause between records; the remote form UI needs breathing room,
    /// this is rate limiting rather than correctness.
    pub settle: Duration,
    /// Overall wall-clock limit for one push attempt.
    pub push_timeout: Duration,
    /// Recycle the client session after this many records. Sessions
    /// degrade over hundreds of sequential submissions.
    pub refresh_every: Option<usize>,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            push_timeout: Duration::from_secs(120),
            refresh_every: Some(150),
        }
    }
}

/// Outcome of one push pass. `had_failures` reflects the ledger on
/// disk, so a caller can surface a single summary message.
#[derive(Debug)]
pub struct PushOutcome {
    pub total: usize,
    pub pushed: usize,
    pub failed: usize,
    pub had_failures: bool,
}

/// Drains the run's primary record file into the CMS, one record at a
/// time, in file order.
///
/// Every record is attempted regardless of earlier failures; failures
/// are projected into the `-CMS-FAILS` ledger and the client is asked
/// to reset for the next attempt. The primary file is never modified:
/// the ledger is the only durable diff between a full and a resumed
/// run, so re-running a pass re-submits already-committed records.
pub struct CmsPipeline<C: CmsClient> {
    client: C,
    options: PushOptions,
}

impl<C: CmsClient> CmsPipeline<C> {
    pub fn new(client: C, options: PushOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(&mut self, store: &RecordStore) -> Result<PushOutcome, StoreError> {
        let hotels: Vec<Hotel> = store.read_all(Stage::Records)?;
        let total = hotels.len();
        info!(total, "pushing listings into the cms");

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .expect("static template")
                .progress_chars("=> "),
        );

        let mut pushed = 0usize;
        let mut failed = 0usize;

        for (index, hotel) in hotels.iter().enumerate() {
            if let Some(every) = self.options.refresh_every {
                if index > 0 && index % every == 0 {
                    info!(listings = index, "recycling cms session");
                    if let Err(e) = self.client.recycle().await {
                        warn!("session recycle failed: {e}");
                    }
                }
            }

            match self.attempt(hotel).await {
                Ok(()) => pushed += 1,
                Err(reason) => {
                    failed += 1;
                    warn!(hotel = %hotel.name, reason = %reason, "listing failed, recording to ledger");
                    store.record_failure(
                        Stage::CmsFails,
                        &FailureRecord::cms(hotel.name.clone(), reason),
                    )?;
                    if let Err(e) = self.client.reset().await {
                        warn!("cms reset after failure also failed: {e}");
                    }
                }
            }

            pb.inc(1);
            if index + 1 < total {
                tokio::time::sleep(self.options.settle).await;
            }
        }

        pb.finish_and_clear();
        let had_failures = store.has_failures(Stage::CmsFails)?;
        Ok(PushOutcome {
            total,
            pushed,
            failed,
            had_failures,
        })
    }

    /// One record's push attempt. A timed-out push gets the session
    /// recycled and exactly one more try; a second timeout fails the
    /// record.
    async fn attempt(&mut self, hotel: &Hotel) -> Result<(), String> {
        match timeout(self.options.push_timeout, self.client.push(hotel)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => {
                warn!(hotel = %hotel.name, "push timed out, recycling session and retrying");
                if let Err(e) = self.client.recycle().await {
                    return Err(format!("session recycle after timeout failed: {e}"));
                }
                match timeout(self.options.push_timeout, self.client.push(hotel)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "push timed out twice after {:?}",
                        self.options.push_timeout
                    )),
                }
            }
        }
    }
}
