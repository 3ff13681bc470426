use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::fetch::Page;
use crate::model::{slugify, Hotel, Image, Location};

use super::{ExtractError, SiteAdapter};

const MAX_IMAGES: usize = 16;

/// Extractor for Inghams listing pages. The page is fully static: every
/// field lives in a numbered tab panel, and the gallery carries captions
/// and alt text alongside the image sources.
pub struct InghamsAdapter;

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn joined_text(doc: &Html, css: &str) -> String {
    let selector = sel(css);
    let mut out = String::new();
    for el in doc.select(&selector) {
        let t = text_of(el);
        if !t.is_empty() {
            out.push_str(&t);
            out.push('\n');
        }
    }
    out
}

impl InghamsAdapter {
    fn name(doc: &Html) -> Result<String, ExtractError> {
        doc.select(&sel("h1.c-heading-h1"))
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
            .ok_or(ExtractError::Missing("hotel name"))
    }

    fn description(doc: &Html) -> Result<String, ExtractError> {
        let text = joined_text(doc, "#descriptionAccTop p");
        if text.is_empty() {
            return Err(ExtractError::Missing("description"));
        }
        Ok(text)
    }

    /// Room copy is the run of paragraphs following the "Rooms" heading
    /// paragraph inside the accommodation tab.
    fn rooms(doc: &Html) -> Result<String, ExtractError> {
        let paragraphs: Vec<String> = doc
            .select(&sel("#tabpanel0 p"))
            .map(text_of)
            .collect();
        let start = paragraphs
            .iter()
            .position(|p| p == "Rooms")
            .ok_or(ExtractError::Missing("rooms section"))?;
        Ok(paragraphs[start + 1..].join("\n"))
    }

    /// The location tab lists `Longitude: x`, `Latitude: y` and then an
    /// optional free-text description.
    fn location(doc: &Html) -> Result<Location, ExtractError> {
        let items: Vec<String> = doc.select(&sel("#tabpanel5 li")).map(text_of).collect();
        if items.len() < 2 {
            return Err(ExtractError::Missing("location coordinates"));
        }
        let longitude = coordinate(&items[0], "longitude")?;
        let latitude = coordinate(&items[1], "latitude")?;
        let description = items.get(2).cloned().unwrap_or_default();
        Ok(Location {
            description,
            lat_long: [latitude, longitude],
        })
    }

    fn facilities(doc: &Html) -> Vec<String> {
        doc.select(&sel("#tabpanel3 ul li"))
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn meals(doc: &Html) -> String {
        joined_text(doc, "#tabpanel6 div.c-accordion__content")
    }

    /// Excursion copy has no dedicated CMS field; it rides along in the
    /// description section as a titled block.
    fn excursions(doc: &Html) -> String {
        joined_text(doc, "#tabpanel2 div.c-accordion__content")
    }

    fn images(doc: &Html) -> Result<Vec<Image>, ExtractError> {
        let slider = doc
            .select(&sel("div.c-slider__list"))
            .next()
            .ok_or(ExtractError::Missing("image gallery"))?;
        let captions: Vec<String> = slider
            .select(&sel("div.c-slider__item"))
            .map(text_of)
            .collect();
        let mut images = Vec::new();
        for (index, img) in slider.select(&sel("img")).enumerate() {
            if index >= MAX_IMAGES {
                break;
            }
            let Some(src) = img.value().attr("data-cloudinarymainslider") else {
                continue;
            };
            let alt = img.value().attr("alt").map(capitalize);
            images.push(Image {
                url: src.to_string(),
                caption: captions.get(index).filter(|c| !c.is_empty()).cloned(),
                alt,
            });
        }
        if images.is_empty() {
            return Err(ExtractError::Missing("image gallery"));
        }
        Ok(images)
    }
}

impl SiteAdapter for InghamsAdapter {
    fn extract(&self, page: &Page) -> Result<Hotel, ExtractError> {
        let doc = Html::parse_document(&page.html);
        let name = Self::name(&doc)?;
        let slug = Some(slugify(&name));

        let mut facility_descriptions = BTreeMap::new();
        let excursions = Self::excursions(&doc);
        if !excursions.is_empty() {
            facility_descriptions.insert("EXCURSIONS".to_string(), excursions);
        }

        Ok(Hotel {
            slug,
            description: Self::description(&doc)?,
            resort: None,
            best_for: BTreeMap::new(),
            rooms: Self::rooms(&doc)?,
            meals: Self::meals(&doc),
            location: Some(Self::location(&doc)?),
            facilities: Self::facilities(&doc),
            facility_descriptions,
            images: Self::images(&doc)?,
            name,
        })
    }
}

fn coordinate(item: &str, field: &'static str) -> Result<f64, ExtractError> {
    item.split(": ")
        .nth(1)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .ok_or(ExtractError::Malformed {
            field,
            detail: item.to_string(),
        })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r##"<html><body>
      <h1 class="c-heading-h1"> Hotel Aurora, Amalfi </h1>
      <div id="descriptionAccTop"><p>A fantastic location in Amalfi.</p><p>Sea views included.</p></div>
      <div id="tabpanel0"><p>Intro</p><p>Rooms</p><p>Twin rooms with balcony.</p><p>Family suites.</p></div>
      <div id="tabpanel2"><div class="c-accordion__content">Boat trip to Capri.</div></div>
      <div id="tabpanel3"><ul><li>outdoor pool</li><li>free wifi</li></ul><ul><li>bar</li></ul></div>
      <div id="tabpanel5"><ul><li>Longitude: 14.602</li><li>Latitude: 40.634</li><li>Perched above the bay.</li></ul></div>
      <div id="tabpanel6"><div class="c-accordion__content">Buffet breakfast on the terrace.</div></div>
      <div class="c-slider__list">
        <div class="c-slider__item">Pool terrace</div>
        <div class="c-slider__item">Lobby</div>
        <img data-cloudinarymainslider="https://img.example.com/pool.jpg" alt="the pool"/>
        <img data-cloudinarymainslider="https://img.example.com/lobby.jpg" alt="the lobby"/>
      </div>
    </body></html>"##;

    fn page() -> Page {
        Page {
            url: "https://www.inghams.co.uk/x/hotel-aurora".into(),
            html: FIXTURE.into(),
        }
    }

    #[test]
    fn extracts_a_complete_record() {
        let hotel = InghamsAdapter.extract(&page()).unwrap();
        assert_eq!(hotel.name, "Hotel Aurora, Amalfi");
        assert_eq!(hotel.slug.as_deref(), Some("hotel-aurora-amalfi"));
        assert!(hotel.description.contains("fantastic location"));
        assert_eq!(hotel.rooms, "Twin rooms with balcony.\nFamily suites.");
        assert_eq!(hotel.facilities, ["outdoor pool", "free wifi", "bar"]);
        assert!(hotel.meals.contains("Buffet breakfast"));
        assert_eq!(
            hotel.facility_descriptions.get("EXCURSIONS").unwrap().trim(),
            "Boat trip to Capri."
        );

        let location = hotel.location.unwrap();
        assert_eq!(location.lat_long, [40.634, 14.602]);
        assert_eq!(location.description, "Perched above the bay.");

        assert_eq!(hotel.images.len(), 2);
        assert_eq!(hotel.images[0].url, "https://img.example.com/pool.jpg");
        assert_eq!(hotel.images[0].caption.as_deref(), Some("Pool terrace"));
        assert_eq!(hotel.images[0].alt.as_deref(), Some("The pool"));
    }

    #[test]
    fn missing_name_is_a_typed_failure() {
        let page = Page {
            url: "https://www.inghams.co.uk/x".into(),
            html: "<html><body><p>nothing here</p></body></html>".into(),
        };
        match InghamsAdapter.extract(&page) {
            Err(ExtractError::Missing("hotel name")) => {}
            other => panic!("expected missing name, got {other:?}"),
        }
    }
}
