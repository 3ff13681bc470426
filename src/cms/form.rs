use crate::model::Hotel;

/// CMS facility options keyed by the substring that identifies them in
/// scraped facility text. Scraped strings are free text ("heated
/// outdoor pool", "free wifi throughout"), so matching is
/// substring-on-lowercase against this table rather than equality.
const FACILITY_OPTIONS: &[(&str, &str)] = &[
    ("pool", "Swimming pool"),
    ("wifi", "Free WiFi"),
    ("wi-fi", "Free WiFi"),
    ("spa", "Spa"),
    ("sauna", "Sauna"),
    ("steam", "Steam room"),
    ("gym", "Gym"),
    ("fitness", "Gym"),
    ("bar", "Bar"),
    ("restaurant", "Restaurant"),
    ("parking", "Parking"),
    ("tennis", "Tennis courts"),
    ("kids club", "Kids club"),
    ("childcare", "Kids club"),
    ("beach", "Beachfront"),
    ("hot tub", "Hot tub"),
    ("jacuzzi", "Hot tub"),
    ("boot room", "Boot room"),
    ("ski storage", "Boot room"),
    ("terrace", "Terrace"),
    ("garden", "Garden"),
    ("air con", "Air conditioning"),
    ("air-con", "Air conditioning"),
    ("entertainment", "Evening entertainment"),
    ("laundry", "Laundry service"),
];

const CATEGORY_HOTEL: &str = "hotel";
const SECTION_EXCLUDED_KEY: &str = "MEALS";

/// The add-accommodation form payload for one listing, in submit order.
#[derive(Debug)]
pub struct ListingForm {
    fields: Vec<(String, String)>,
}

impl ListingForm {
    pub fn from_hotel(hotel: &Hotel) -> Self {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut push = |k: &str, v: String| fields.push((k.to_string(), v));

        push("title", hotel.name.clone());
        if let Some(slug) = &hotel.slug {
            push("slug", slug.clone());
        }
        push("category", CATEGORY_HOTEL.to_string());
        push("holiday_id", holiday_id());
        if let Some(resort) = &hotel.resort {
            push("resort", normalize_resort(resort));
        }
        push("description_section_one", main_description(hotel));
        push("description_section_two", format!("Rooms\n\n{}", hotel.rooms));
        push("description_section_three", format!("Meals\n\n{}", hotel.meals));
        push("best_for_list", best_for_text(hotel));
        if let Some(location) = &hotel.location {
            push("map_iframe", map_iframe(location.lat_long[0], location.lat_long[1]));
        }
        for feature in selected_facilities(&hotel.facilities) {
            push("features", feature.to_string());
        }
        for (index, image) in hotel.images.iter().enumerate() {
            push(&format!("image_set-{index}-url"), image.url.clone());
            if let Some(caption) = &image.caption {
                push(&format!("image_set-{index}-title"), caption.clone());
            }
            if let Some(alt) = &image.alt {
                push(&format!("image_set-{index}-alt"), alt.clone());
            }
        }

        Self { fields }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Six digits, zero-padded; the CMS only wants it unique-ish per batch.
fn holiday_id() -> String {
    format!("{:06}", fastrand::u32(1..=999_999))
}

/// The resort dropdown keys on lowercased, hyphenated names with
/// quote characters dropped.
fn normalize_resort(resort: &str) -> String {
    resort
        .replace(' ', "-")
        .replace(['\'', '`'], "")
        .to_lowercase()
}

/// Main description section: the listing copy followed by any titled
/// facility blocks. Meal copy has its own section, so that key is
/// excluded here.
fn main_description(hotel: &Hotel) -> String {
    let mut text = hotel.description.clone();
    for (title, body) in &hotel.facility_descriptions {
        if title == SECTION_EXCLUDED_KEY {
            continue;
        }
        text.push_str("\n\n\n");
        text.push_str(title);
        text.push_str("\n\n");
        text.push_str(body);
    }
    text
}

fn best_for_text(hotel: &Hotel) -> String {
    if hotel.best_for.is_empty() {
        return "Coming soon!".to_string();
    }
    let mut text = String::new();
    for (key, value) in &hotel.best_for {
        text.push_str(&format!("{}: {}\n", capitalize(key), value));
    }
    text
}

fn map_iframe(lat: f64, lon: f64) -> String {
    format!(
        "<iframe src=\"https://www.google.com/maps?q={lat},{lon}&hl=es&z=14&amp;output=embed\" \
         width=\"600\" height=\"450\" style=\"border:0;\" allowfullscreen=\"\" loading=\"lazy\" \
         referrerpolicy=\"no-referrer-when-downgrade\"></iframe>"
    )
}

/// Map free-text facilities onto the CMS option list. Each option is
/// selected at most once however many scraped lines mention it.
fn selected_facilities(facilities: &[String]) -> Vec<&'static str> {
    let mut selected: Vec<&'static str> = Vec::new();
    for facility in facilities {
        let lower = facility.to_lowercase();
        for (keyword, option) in FACILITY_OPTIONS {
            if lower.contains(keyword) && !selected.contains(option) {
                selected.push(option);
            }
        }
    }
    selected
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
