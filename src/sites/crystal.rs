use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::fetch::Page;
use crate::model::{Hotel, Image, Location};

use super::tui::strip_parentheticals;
use super::{embedded_object, ExtractError, SiteAdapter};

const RATING_SCALE: usize = 5;
const EXPERIENCE_LEVELS: [&str; 4] = ["beginners", "intermediates", "advanced", "boarders"];

/// Extractor for Crystal Ski listing pages. Shares the TUI page
/// skeleton but keeps its own copy sources: the `galleryData` blob
/// doubles as the carrier for the introduction, coordinates and
/// facility summary, and the resort info panel exposes per-level
/// suitability ratings.
pub struct CrystalAdapter;

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    doc.select(&sel(css)).next().map(text_of).filter(|t| !t.is_empty())
}

impl CrystalAdapter {
    fn name(doc: &Html) -> Result<String, ExtractError> {
        first_text(doc, "h1")
            .map(|n| capitalize_sentence(&n))
            .ok_or(ExtractError::Missing("hotel name"))
    }

    fn slug(name: &str) -> String {
        format!("{}-crystal", name.to_lowercase().replace(' ', "-"))
    }

    /// "Val Thorens, France" keeps its first word pair; a three-part
    /// line like "In Val Thorens, Les Trois Vallées, France" names the
    /// resort in the middle.
    fn resort(doc: &Html) -> Option<String> {
        let line = first_text(doc, "#headerContainer__component span p")?;
        let parts: Vec<&str> = line.split(',').collect();
        let resort = if parts.len() == 3 {
            parts[1]
        } else {
            parts[0].split(' ').nth(1)?
        };
        Some(capitalize_sentence(resort.trim()))
    }

    fn description(gallery: &serde_json::Value) -> Result<String, ExtractError> {
        let intro = gallery["featureCodesAndValues"]["introduction"][0]
            .as_str()
            .ok_or(ExtractError::Missing("description"))?;
        Ok(strip_parentheticals(&unescape_entities(intro)))
    }

    /// Suitability ratings per experience level, rendered as filled
    /// stars out of five. Levels disappear from the panel together, so
    /// the scan stops at the first absent one.
    fn best_for(doc: &Html) -> BTreeMap<String, String> {
        let mut best_for = BTreeMap::new();
        for level in EXPERIENCE_LEVELS {
            let Some(level_div) = doc
                .select(&sel(&format!("div.SkiResortInfo__{level}")))
                .next()
            else {
                break;
            };
            let empty = level_div
                .select(&sel(".SkiResortInfo__rectEmpty"))
                .count()
                .min(RATING_SCALE);
            best_for.insert(
                level.to_string(),
                "★".repeat(RATING_SCALE - empty),
            );
        }
        best_for
    }

    fn rooms(doc: &Html) -> String {
        first_text(doc, ".SkiRoomInfo__roomInfoBlock").unwrap_or_default()
    }

    fn location(doc: &Html, gallery: &serde_json::Value) -> Result<Location, ExtractError> {
        let description = first_text(doc, "#locationEditorial__component div")
            .ok_or(ExtractError::Missing("location description"))?;
        let features = &gallery["featureCodesAndValues"];
        Ok(Location {
            description: unescape_entities(&description),
            lat_long: [
                feature_coordinate(features, "latitude")?,
                feature_coordinate(features, "longitude")?,
            ],
        })
    }

    /// The facility summary is one `·`-separated string inside its own
    /// script blob (feature code AF0047).
    fn facilities(html: &str) -> Vec<String> {
        let Ok(data) = embedded_object(html, "accommodationFacilities  = ", "facilities") else {
            return Vec::new();
        };
        data["featureCodesAndValues"]["AF0047"][0]
            .as_str()
            .map(|joined| {
                joined
                    .split('·')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn meals(doc: &Html) -> String {
        let board_type = first_text(doc, "h4").unwrap_or_default();
        let board_description =
            first_text(doc, "#browseBoardBasis__component p").unwrap_or_default();
        format!("{board_type}\n{board_description}")
    }

    fn images(gallery: &serde_json::Value) -> Result<Vec<Image>, ExtractError> {
        let items = gallery["galleryImages"]
            .as_array()
            .ok_or(ExtractError::Missing("gallery images"))?;
        let mut images: Vec<Image> = Vec::new();
        for item in items {
            let Some(src) = item["mainSrc"].as_str() else {
                continue;
            };
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

impl SiteAdapter for CrystalAdapter {
    fn extract(&self, page: &Page) -> Result<Hotel, ExtractError> {
        let doc = Html::parse_document(&page.html);
        let gallery = embedded_object(&page.html, "galleryData = ", "gallery data")?;
        let name = Self::name(&doc)?;
        Ok(Hotel {
            slug: Some(Self::slug(&name)),
            description: Self::description(&gallery)?,
            resort: Self::resort(&doc),
            best_for: Self::best_for(&doc),
            rooms: Self::rooms(&doc),
            meals: Self::meals(&doc),
            location: Some(Self::location(&doc, &gallery)?),
            facilities: Self::facilities(&page.html),
            facility_descriptions: BTreeMap::new(),
            images: Self::images(&gallery)?,
            name,
        })
    }
}

fn feature_coordinate(
    features: &serde_json::Value,
    field: &'static str,
) -> Result<f64, ExtractError> {
    let value = &features[field][0];
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or(ExtractError::Malformed {
            field,
            detail: value.to_string(),
        })
}

/// First letter upper, rest lower. The site shouts its headings.
fn capitalize_sentence(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

/// Entities inside script-blob strings arrive encoded; markup text does
/// not need this.
fn unescape_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
