// File: src/handshake.rs
// Purpose: The first message a client sends after connecting

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client-reported environment, sent once before anything else
///
/// Every field is optional on the wire; missing fields take the values of
/// `InitialClientMessage::from_defaults`. Values are taken as-is here and
/// corrected later by the locale normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialClientMessage {
    /// BCP 47 tags, most preferred first
    pub preferred_languages: Vec<String>,
    pub decimal_separator: String,
    pub thousands_separator: String,
    /// strftime-style format for dates
    pub date_format_string: String,
    /// IANA timezone name
    pub timezone: String,
    pub window_width: f64,
    pub window_height: f64,
    pub prefers_light_theme: bool,
    /// Persisted settings, one JSON object per section
    pub user_settings: Map<String, Value>,
    pub month_names_long: Vec<String>,
    pub day_names_long: Vec<String>,
}

impl InitialClientMessage {
    /// Stand-in for a client that never sent its handshake
    pub fn from_defaults() -> Self {
        Self {
            preferred_languages: Vec::new(),
            decimal_separator: ".".to_string(),
            thousands_separator: ",".to_string(),
            date_format_string: "%Y-%m-%d".to_string(),
            timezone: "UTC".to_string(),
            window_width: 1920.0,
            window_height: 1080.0,
            prefers_light_theme: true,
            user_settings: Map::new(),
            month_names_long: ENGLISH_MONTHS.iter().map(|s| s.to_string()).collect(),
            day_names_long: ENGLISH_DAYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InitialClientMessage {
    /// Reads a handshake one field at a time
    ///
    /// A field of the wrong type is logged and left at its default while the
    /// other fields are kept. Returns `None` if `raw` is not a JSON object.
    pub fn from_value_lenient(raw: Value) -> Option<Self> {
        let Value::Object(mut fields) = raw else {
            return None;
        };

        let mut msg = Self::from_defaults();
        read_field(&mut fields, "preferredLanguages", &mut msg.preferred_languages);
        read_field(&mut fields, "decimalSeparator", &mut msg.decimal_separator);
        read_field(&mut fields, "thousandsSeparator", &mut msg.thousands_separator);
        read_field(&mut fields, "dateFormatString", &mut msg.date_format_string);
        read_field(&mut fields, "timezone", &mut msg.timezone);
        read_field(&mut fields, "windowWidth", &mut msg.window_width);
        read_field(&mut fields, "windowHeight", &mut msg.window_height);
        read_field(&mut fields, "prefersLightTheme", &mut msg.prefers_light_theme);
        read_field(&mut fields, "userSettings", &mut msg.user_settings);
        read_field(&mut fields, "monthNamesLong", &mut msg.month_names_long);
        read_field(&mut fields, "dayNamesLong", &mut msg.day_names_long);
        Some(msg)
    }
}

fn read_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str, slot: &mut T) {
    let Some(value) = fields.remove(key) else {
        return;
    };

    match serde_json::from_value(value) {
        Ok(parsed) => *slot = parsed,
        Err(err) => tracing::warn!(field = key, error = %err, "Ignoring malformed handshake field"),
    }
}

impl Default for InitialClientMessage {
    fn default() -> Self {
        Self::from_defaults()
    }
}

pub(crate) const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Monday first
pub(crate) const ENGLISH_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parses_camel_case_fields() {
        let msg: InitialClientMessage = serde_json::from_value(json!({
            "preferredLanguages": ["de-CH", "en"],
            "decimalSeparator": ",",
            "thousandsSeparator": "'",
            "dateFormatString": "%d.%m.%Y",
            "timezone": "Europe/Zurich",
            "windowWidth": 1280.0,
            "windowHeight": 720.0,
            "prefersLightTheme": false,
            "userSettings": { "editor": { "fontSize": 14 } }
        }))
        .unwrap();

        assert_eq!(msg.preferred_languages, vec!["de-CH", "en"]);
        assert_eq!(msg.thousands_separator, "'");
        assert_eq!(msg.timezone, "Europe/Zurich");
        assert!(!msg.prefers_light_theme);
        assert_eq!(msg.user_settings["editor"]["fontSize"], 14);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let msg: InitialClientMessage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(msg, InitialClientMessage::from_defaults());
        assert_eq!(msg.month_names_long.len(), 12);
        assert_eq!(msg.day_names_long.len(), 7);
    }

    #[test]
    fn test_lenient_read_keeps_well_typed_fields() {
        let msg = InitialClientMessage::from_value_lenient(json!({
            "preferredLanguages": ["fr-FR"],
            "decimalSeparator": 12,
            "timezone": "Europe/Paris",
            "windowWidth": "wide",
            "prefersLightTheme": false
        }))
        .unwrap();

        assert_eq!(msg.preferred_languages, vec!["fr-FR"]);
        assert_eq!(msg.decimal_separator, ".");
        assert_eq!(msg.timezone, "Europe/Paris");
        assert_eq!(msg.window_width, 1920.0);
        assert!(!msg.prefers_light_theme);
    }

    #[test]
    fn test_lenient_read_rejects_non_objects() {
        assert_eq!(InitialClientMessage::from_value_lenient(json!("hello?")), None);
        assert_eq!(InitialClientMessage::from_value_lenient(json!([1, 2])), None);
    }
}
