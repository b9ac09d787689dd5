use std::sync::OnceLock;

use regex::Regex;

use crate::data::osm::{NormalizedRecord, RawElement};
use crate::data::CREATED;
use crate::errors::Result;

const ADDRESS_PREFIX: &str = "addr:";
const PHONE_KEYS: [&str; 2] = ["phone", "contact:phone"];
const PHONE_COUNTRY_PREFIX: &str = "+358";
const POSTAL_CODE_LEN: usize = 5;

fn phone_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-() ]|;.*$").expect("valid phone regex"))
}

/// Strips formatting and anything after a `;`, then swaps the first
/// character for the Finnish country prefix unless it is already there.
/// Numbers given without a trunk prefix lose a digit.
pub fn normalize_phone(raw: &str) -> String {
    let stripped = phone_noise().replace_all(raw, "");
    if stripped.starts_with(PHONE_COUNTRY_PREFIX) {
        return stripped.into_owned();
    }
    let mut chars = stripped.chars();
    chars.next();
    format!("{}{}", PHONE_COUNTRY_PREFIX, chars.as_str())
}

fn normalize_postal_code(raw: &str) -> String {
    raw.chars().take(POSTAL_CODE_LEN).collect()
}

/// Reshapes a node or way into a document. Other elements give `None`.
///
/// Attributes are applied first and tags second, both in document order; a
/// later write replaces an earlier one under the same key.
pub fn normalize(element: &RawElement) -> Result<Option<NormalizedRecord>> {
    if element.name != "node" && element.name != "way" {
        return Ok(None);
    }

    let mut record = NormalizedRecord::new(&element.name);

    for (key, value) in &element.attributes {
        match key.as_str() {
            key if CREATED.contains(&key) => record.insert_created(key, value),
            "lon" => record.push_lon(value.parse()?),
            "lat" => record.insert_lat(value.parse()?),
            key => record.set(key, value.as_str()),
        }
    }

    for tag in element.children_named("tag") {
        let key = tag.required_attribute("k")?;
        let value = tag.required_attribute("v")?;

        if key == "postal_code" {
            record.set(key, normalize_postal_code(value));
        } else if key.starts_with(ADDRESS_PREFIX) {
            record.insert_address(&key.replace(ADDRESS_PREFIX, ""), value);
        } else if PHONE_KEYS.contains(&key) {
            record.set("phone", normalize_phone(value));
        } else {
            record.set(key, value);
        }
    }

    for nd in element.children_named("nd") {
        record.push_node_ref(nd.required_attribute("ref")?);
    }

    Ok(Some(record))
}
