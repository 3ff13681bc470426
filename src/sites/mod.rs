use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::fetch::Page;
use crate::model::Hotel;

mod crystal;
mod inghams;
mod tui;

pub use crystal::CrystalAdapter;
pub use inghams::InghamsAdapter;
pub use tui::TuiAdapter;

/// Source companies with listing pages we can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Company {
    Inghams,
    Tui,
    CrystalSki,
}

impl Company {
    /// Directory name under the data root, also the name used in run
    /// labels and config keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Company::Inghams => "inghams",
            Company::Tui => "tui",
            Company::CrystalSki => "crystal_ski",
        }
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Company {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inghams" => Ok(Company::Inghams),
            "tui" => Ok(Company::Tui),
            "crystal_ski" => Ok(Company::CrystalSki),
            other => Err(anyhow::anyhow!(
                "source company must be either \"inghams\", \"tui\" or \"crystal_ski\" (\"{other}\" given)"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot find {0} on the page")]
    Missing(&'static str),
    #[error("malformed {field}: {detail}")]
    Malformed { field: &'static str, detail: String },
}

/// Turns one fetched page into a [`Hotel`]. Adapters may leave fields
/// they cannot source empty (`best_for`, descriptions) or absent
/// (`resort`, `slug`), but a returned record is otherwise complete.
/// The pipeline never inspects the error beyond stringifying it into
/// the failure ledger.
pub trait SiteAdapter: Send + Sync {
    fn extract(&self, page: &Page) -> Result<Hotel, ExtractError>;
}

pub fn adapter_for(company: Company) -> Box<dyn SiteAdapter> {
    match company {
        Company::Inghams => Box::new(InghamsAdapter),
        Company::Tui => Box::new(TuiAdapter),
        Company::CrystalSki => Box::new(CrystalAdapter),
    }
}

/// Extract the JSON object assigned after `marker` in an inline script,
/// e.g. `galleryData = {...};`. The page embeds these as single objects
/// terminated by `};`.
pub(crate) fn embedded_object(
    html: &str,
    marker: &str,
    field: &'static str,
) -> Result<serde_json::Value, ExtractError> {
    let after = html
        .split_once(marker)
        .ok_or(ExtractError::Missing(field))?
        .1;
    let body = after
        .split_once("};")
        .ok_or(ExtractError::Missing(field))?
        .0;
    serde_json::from_str(&format!("{body}}}")).map_err(|e| ExtractError::Malformed {
        field,
        detail: e.to_string(),
    })
}

/// Extract a small flat JSON object such as `"geo": {...}` where the
/// object has no nested braces.
pub(crate) fn embedded_flat_object(
    html: &str,
    marker: &str,
    field: &'static str,
) -> Result<serde_json::Value, ExtractError> {
    let after = html
        .split_once(marker)
        .ok_or(ExtractError::Missing(field))?
        .1;
    let body = after
        .split_once('}')
        .ok_or(ExtractError::Missing(field))?
        .0;
    serde_json::from_str(&format!("{body}}}")).map_err(|e| ExtractError::Malformed {
        field,
        detail: e.to_string(),
    })
}
