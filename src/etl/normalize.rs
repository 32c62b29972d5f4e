//! Field-level clean-up applied to tag values while shaping elements.
//!
//! Everything here is a pure function of its input, except that rejected postcodes and
//! bot usernames are recorded in the caller's [`AuditReport`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::data::audit::AuditReport;

/// Pune postcodes: "411" followed by three digits.
static LEGAL_POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^411[0-9]{3}$").expect("Invalid postal code regex")
});

/// Same shape as [`LEGAL_POSTAL_CODE`] but with separators between the digits.
/// Exactly three digits must follow 411: shorter codes such as "411 1 2" are rejected so that
/// every repaired code is six digits long.
static LOOSE_POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^411[ _-]*[0-9][ _-]*[0-9][ _-]*[0-9]$").expect("Invalid loose postal code regex")
});

static POSTAL_CODE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ _-]").expect("Invalid separator regex")
});

/// Pune landline (city code 20) or Indian mobile number, either optionally prefixed with
/// the country code 91 or a trunk 0.
static PHONE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(91|0)[\s-]?)?(20)\s?([0-9]{4}\s?[0-9]{4})|(?:(91|0)[\s-]?)?([789][0-9]{9})",
    )
    .expect("Invalid phone number regex")
});

/// Value and key rewrites used by the shaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationRules {
    /// Street abbreviation -> full word, applied to every tag value.
    pub street_mapping: BTreeMap<String, String>,
    /// Alternative sub-key spellings, e.g. `postal_code` -> `postcode`.
    pub key_aliases: BTreeMap<String, String>,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        let street_mapping = [("Rd", "Road"), ("Path", "Road"), ("Marg", "Road"), ("road", "Road")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let key_aliases = [("postal_code", "postcode")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NormalizationRules {
            street_mapping,
            key_aliases,
        }
    }
}

/// Replaces every space-delimited word of `name` that is a key of `mapping` with its value.
///
/// Keys are applied in sorted order so the result only depends on the mapping's contents.
/// Matching is case-sensitive and never touches partial words.
pub fn update_name(name: &str, mapping: &BTreeMap<String, String>) -> String {
    let mut name = name.to_string();
    for (key, value) in mapping {
        if name.split(' ').any(|word| word == key) {
            name = name
                .split(' ')
                .map(|word| if word == key { value.as_str() } else { word })
                .collect::<Vec<_>>()
                .join(" ");
        }
    }
    name
}

/// Returns a clean postcode, or an empty string when `code` cannot be repaired.
/// Unrepairable codes are recorded in `report`.
pub fn validate_postcode(code: &str, report: &mut AuditReport) -> String {
    if LEGAL_POSTAL_CODE.is_match(code) {
        code.to_string()
    } else if LOOSE_POSTAL_CODE.is_match(code) {
        POSTAL_CODE_SEPARATORS.replace_all(code, "").into_owned()
    } else {
        report.record_malformed_postcode(code);
        String::new()
    }
}

/// Picks the number out of a raw phone string: the longest group (over two characters)
/// captured by the first match. Strings without a recognisable number come back unchanged.
pub fn extract_phone(phone_number: &str) -> String {
    let Some(captures) = PHONE_NUMBER.captures(phone_number) else {
        return phone_number.to_string();
    };
    let mut best: Option<&str> = None;
    for group in captures.iter().skip(1).flatten() {
        let group = group.as_str();
        if group.len() > 2 && best.map_or(true, |current| group.len() > current.len()) {
            best = Some(group);
        }
    }
    best.unwrap_or(phone_number).to_string()
}

pub fn is_bot(username: &str) -> bool {
    username.to_lowercase().contains("bot")
}

/// Records `username` in `report` when it looks like an automated account.
pub fn find_bots(username: &str, report: &mut AuditReport) {
    if is_bot(username) {
        report.record_bot(username);
    }
}
