use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A normalized accommodation listing, as produced by any site extractor.
///
/// Serialization keeps every key present: absent scalars become `null`,
/// absent plurals become empty collections. Records are written once by
/// the scrape pass and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    #[serde(default)]
    pub resort: Option<String>,
    #[serde(default)]
    pub best_for: BTreeMap<String, String>,
    pub rooms: String,
    pub meals: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub facility_descriptions: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Free-text location description plus a latitude/longitude pair.
/// The pair is always two elements; a listing either has both parts
/// or no location at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub description: String,
    pub lat_long: [f64; 2],
}

/// One gallery image, in source order. TUI listings only carry the URL;
/// Inghams listings also carry a caption and alt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// Projection of a record whose processing raised, written to the
/// sidecar ledger for the stage. Scrape-stage failures keep the source
/// URL; CMS-stage failures no longer have one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "failed reason")]
    pub reason: String,
}

impl FailureRecord {
    pub fn scrape(name: impl Into<String>, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            reason: reason.into(),
        }
    }

    pub fn cms(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            reason: reason.into(),
        }
    }
}

/// Lowercase, alphanumeric-and-hyphens slug for a hotel name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_hotel() -> Hotel {
        Hotel {
            name: "Hotel Aurora".into(),
            slug: None,
            description: "On the Amalfi coast.".into(),
            resort: None,
            best_for: BTreeMap::new(),
            rooms: "Sea-view doubles.".into(),
            meals: "Breakfast on the terrace.".into(),
            location: None,
            facilities: Vec::new(),
            facility_descriptions: BTreeMap::new(),
            images: Vec::new(),
        }
    }

    #[test]
    fn absent_scalars_serialize_as_null_and_keys_stay_present() {
        let json = serde_json::to_value(minimal_hotel()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj["slug"].is_null());
        assert!(obj["resort"].is_null());
        assert!(obj["location"].is_null());
        assert_eq!(obj["facilities"], serde_json::json!([]));
        assert_eq!(obj["best_for"], serde_json::json!({}));
    }

    #[test]
    fn hotel_round_trips_through_json() {
        let mut hotel = minimal_hotel();
        hotel.slug = Some("hotel-aurora".into());
        hotel.location = Some(Location {
            description: "Above the bay.".into(),
            lat_long: [40.634, 14.602],
        });
        hotel.images.push(Image {
            url: "https://img.example.com/pool.jpg".into(),
            caption: Some("Pool".into()),
            alt: Some("The pool".into()),
        });
        let json = serde_json::to_string(&hotel).unwrap();
        let back: Hotel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hotel);
    }

    #[test]
    fn scrape_failure_keeps_url_and_renamed_reason_key() {
        let failure = FailureRecord::scrape("Hotel Aurora", "https://example.com/h", "404");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["url"], "https://example.com/h");
        assert_eq!(json["failed reason"], "404");
    }

    #[test]
    fn cms_failure_omits_url() {
        let failure = FailureRecord::cms("Hotel Aurora", "rejected");
        let json = serde_json::to_value(&failure).unwrap();
        assert!(json.as_object().unwrap().get("url").is_none());
        assert_eq!(json["failed reason"], "rejected");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Hotel Aurora, Amalfi"), "hotel-aurora-amalfi");
        assert_eq!(slugify("L'Hôtel  du Lac "), "l-hôtel-du-lac");
    }
}
