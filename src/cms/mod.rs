use async_trait::async_trait;
use thiserror::Error;

use crate::model::Hotel;

mod client;
mod form;
mod pipeline;

pub use client::HttpCmsClient;
pub use form::ListingForm;
pub use pipeline::{CmsPipeline, PushOptions, PushOutcome};

#[derive(Debug, Error)]
pub enum CmsError {
    /// The remote rejected the listing (missing or invalid fields from
    /// its point of view). The message carries the collected form
    /// errors.
    #[error("cms rejected the listing: {0}")]
    Rejected(String),
    #[error("cms request failed: {0}")]
    Transport(String),
    #[error("cms login failed: {0}")]
    Login(String),
}

/// Pushes one listing into the remote CMS. Implementations own their
/// session; the pipeline drives `push`/`reset` per record and `recycle`
/// on its refresh cadence, and never looks past this seam.
#[async_trait]
pub trait CmsClient: Send {
    async fn push(&mut self, hotel: &Hotel) -> Result<(), CmsError>;

    /// Return the remote UI to a state ready for the next push,
    /// regardless of what the previous attempt left behind.
    async fn reset(&mut self) -> Result<(), CmsError>;

    /// Tear down and re-establish the session. Sessions degrade over
    /// hundreds of sequential submissions; the contract is unchanged
    /// before and after.
    async fn recycle(&mut self) -> Result<(), CmsError> {
        Ok(())
    }
}
