use std::collections::BTreeMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::fetch::Page;
use crate::model::{Hotel, Image, Location};

use super::{embedded_flat_object, embedded_object, ExtractError, SiteAdapter};

/// Extractor for TUI listing pages. Most structured data (coordinates,
/// facilities, gallery) is embedded in inline script blobs; the rest is
/// plain markup.
pub struct TuiAdapter;

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    doc.select(&sel(css)).next().map(text_of).filter(|t| !t.is_empty())
}

/// Remove parenthesized fragments such as board-basis footnotes.
pub(crate) fn strip_parentheticals(text: &str) -> String {
    let re = Regex::new(r"\([^<>]*\)").unwrap();
    re.replace_all(text, "").to_string()
}

impl TuiAdapter {
    fn name(doc: &Html) -> Result<String, ExtractError> {
        first_text(doc, "h1").ok_or(ExtractError::Missing("hotel name"))
    }

    /// The header's location line reads like "In Marbella, Spain"; the
    /// resort is the word after the leading preposition.
    fn resort(doc: &Html) -> Option<String> {
        let line = first_text(doc, "#headerContainer__component span p")?;
        let first_part = line.split(',').next()?;
        let resort = first_part.split(' ').nth(1)?;
        Some(resort.trim().to_uppercase())
    }

    fn description(doc: &Html) -> Result<String, ExtractError> {
        let about =
            first_text(doc, ".About__content").ok_or(ExtractError::Missing("description"))?;
        let disclaimer = first_text(doc, "#disclaimer__component div").unwrap_or_default();
        Ok(strip_parentheticals(&format!("{about}\n{disclaimer}")))
    }

    fn rooms(doc: &Html) -> String {
        let mut rooms = String::new();
        for block in doc.select(&sel(".UI__roomListWrapper")) {
            rooms.push_str(&text_of(block));
        }
        rooms
    }

    fn location(doc: &Html, html: &str) -> Result<Location, ExtractError> {
        let description = first_text(doc, "#locationEditorial__component aside")
            .ok_or(ExtractError::Missing("location description"))?;
        let geo = embedded_flat_object(html, "\"geo\":", "coordinates")?;
        Ok(Location {
            description,
            lat_long: [
                coordinate(&geo, "latitude")?,
                coordinate(&geo, "longitude")?,
            ],
        })
    }

    fn facilities(html: &str) -> Vec<String> {
        let Ok(data) = embedded_object(html, "accommFacilitiesJsonData = ", "facilities") else {
            return Vec::new();
        };
        data["facilities"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|f| f["name"].as_str())
                    .map(|name| name.to_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Board type heading plus the food & drink card where present.
    /// Listings without the card get a blank meals field.
    fn meals(doc: &Html) -> String {
        let board_type = first_text(doc, "h4").unwrap_or_default();
        match first_text(doc, ".Facilities__cardContet") {
            Some(card) => format!("{board_type}\n{}", strip_parentheticals(&card)),
            None => " ".to_string(),
        }
    }

    fn images(html: &str) -> Result<Vec<Image>, ExtractError> {
        let gallery = embedded_object(html, "galleryData = ", "gallery data")?;
        let items = gallery["galleryImages"]
            .as_array()
            .ok_or(ExtractError::Missing("gallery images"))?;
        let mut images: Vec<Image> = Vec::new();
        for item in items {
            let Some(src) = item["mainSrc"].as_str() else {
                continue;
            };
            // Drop resize params; the gallery repeats from the start
            // once every size variant has been listed.
            let src = src.split('?').next().unwrap_or(src);
            if images.iter().any(|i| i.url == src) {
                break;
            }
            images.push(Image {
                url: src.to_string(),
                caption: None,
                alt: None,
            });
        }
        Ok(images)
    }
}

impl SiteAdapter for TuiAdapter {
    fn extract(&self, page: &Page) -> Result<Hotel, ExtractError> {
        let doc = Html::parse_document(&page.html);
        Ok(Hotel {
            name: Self::name(&doc)?,
            slug: None,
            description: Self::description(&doc)?,
            resort: Self::resort(&doc),
            best_for: BTreeMap::new(),
            rooms: Self::rooms(&doc),
            meals: Self::meals(&doc),
            location: Some(Self::location(&doc, &page.html)?),
            facilities: Self::facilities(&page.html),
            facility_descriptions: BTreeMap::new(),
            images: Self::images(&page.html)?,
        })
    }
}

fn coordinate(geo: &serde_json::Value, field: &'static str) -> Result<f64, ExtractError> {
    let value = &geo[field];
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or(ExtractError::Malformed {
            field,
            detail: value.to_string(),
        })
}
