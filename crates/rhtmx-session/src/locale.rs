// File: src/locale.rs
// Purpose: Normalize client-reported locale settings into a LocaleBundle

use std::collections::HashMap;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

use crate::config::SessionConfig;
use crate::handshake::{InitialClientMessage, ENGLISH_DAYS, ENGLISH_MONTHS};

/// Locale settings of one session, all validated
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleBundle {
    /// Canonical BCP 47 tags, never empty
    pub preferred_languages: Vec<String>,
    pub decimal_separator: String,
    /// Empty means "no grouping"
    pub thousands_separator: String,
    pub date_format: String,
    pub timezone: Tz,
    pub first_day_of_week: Weekday,
    pub month_names_long: Vec<String>,
    /// Monday first
    pub day_names_long: Vec<String>,
}

impl LocaleBundle {
    /// Builds the bundle from a handshake, replacing anything invalid
    pub fn negotiate(msg: &InitialClientMessage, config: &SessionConfig) -> Self {
        let preferred_languages =
            normalize_languages(&msg.preferred_languages, &config.default_language);
        let first_day_of_week = first_day_of_week(&preferred_languages[0]);

        Self {
            first_day_of_week,
            preferred_languages,
            decimal_separator: decimal_separator(&msg.decimal_separator),
            thousands_separator: thousands_separator(&msg.thousands_separator),
            date_format: date_format(&msg.date_format_string, &config.default_date_format),
            timezone: timezone(&msg.timezone),
            month_names_long: names_or_english(&msg.month_names_long, &ENGLISH_MONTHS, "month"),
            day_names_long: names_or_english(&msg.day_names_long, &ENGLISH_DAYS, "day"),
        }
    }

    /// The most preferred language
    pub fn primary_language(&self) -> &str {
        &self.preferred_languages[0]
    }
}

impl Default for LocaleBundle {
    fn default() -> Self {
        Self::negotiate(&InitialClientMessage::from_defaults(), &SessionConfig::default())
    }
}

// ============================================================================
// Languages
// ============================================================================

/// Canonicalizes and deduplicates language tags, keeping their order
///
/// Tags that do not parse, and the undetermined language `und`, are dropped.
/// Falls back to `default` (or `en-US` if that is unusable too) so the result
/// is never empty.
///
/// # Examples
///
/// ```
/// use rhtmx_session::locale::normalize_languages;
///
/// let tags = vec!["en_us".to_string(), "EN-US".to_string(), "de".to_string()];
/// assert_eq!(normalize_languages(&tags, "en-US"), vec!["en-US", "de"]);
///
/// assert_eq!(normalize_languages(&[], "en-US"), vec!["en-US"]);
/// ```
pub fn normalize_languages(tags: &[String], default: &str) -> Vec<String> {
    let mut languages: Vec<String> = Vec::new();

    for tag in tags {
        let Some(canonical) = canonical_tag(tag) else {
            tracing::debug!(%tag, "Ignoring unparsable language tag");
            continue;
        };

        if !languages.contains(&canonical) {
            languages.push(canonical);
        }
    }

    if languages.is_empty() {
        languages.push(canonical_tag(default).unwrap_or_else(|| "en-US".to_string()));
    }

    languages
}

fn canonical_tag(tag: &str) -> Option<String> {
    let id: LanguageIdentifier = tag.trim().replace('_', "-").parse().ok()?;

    if id.language.as_str() == "und" {
        return None;
    }

    Some(id.to_string())
}

// ============================================================================
// Number formatting
// ============================================================================

/// Exactly one character, otherwise `.`
pub fn decimal_separator(raw: &str) -> String {
    if raw.chars().count() == 1 {
        return raw.to_string();
    }

    tracing::warn!(separator = raw, "Client sent invalid decimal separator. Using \".\" instead.");
    ".".to_string()
}

/// At most one character, otherwise no separator
pub fn thousands_separator(raw: &str) -> String {
    if raw.chars().count() <= 1 {
        return raw.to_string();
    }

    tracing::warn!(separator = raw, "Client sent invalid thousands separator. Using \"\" instead.");
    String::new()
}

// ============================================================================
// Dates and time
// ============================================================================

/// Whether `format` renders 3333-11-22 with year, month and day visible
///
/// # Examples
///
/// ```
/// use rhtmx_session::locale::is_valid_date_format;
///
/// assert!(is_valid_date_format("%d/%m/%Y"));
/// assert!(!is_valid_date_format("%d/%m"));
/// assert!(!is_valid_date_format("%Q"));
/// ```
pub fn is_valid_date_format(format: &str) -> bool {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return false;
    }

    let Some(sample) = NaiveDate::from_ymd_opt(3333, 11, 22) else {
        return false;
    };

    // Time fields on a bare date fail at format time
    let mut rendered = String::new();
    if write!(rendered, "{}", sample.format_with_items(items.iter())).is_err() {
        return false;
    }

    rendered.contains("33") && rendered.contains("11") && rendered.contains("22")
}

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

fn date_format(raw: &str, fallback: &str) -> String {
    if is_valid_date_format(raw) {
        return raw.to_string();
    }

    tracing::warn!(format = raw, fallback, "Client sent invalid date format string");
    if is_valid_date_format(fallback) {
        return fallback.to_string();
    }

    tracing::warn!(format = fallback, "Configured default date format is invalid. Using ISO dates.");
    ISO_DATE_FORMAT.to_string()
}

/// Parses an IANA timezone name, falling back to UTC
pub fn timezone(raw: &str) -> Tz {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone = raw, "Client sent unknown timezone. Using UTC instead.");
        Tz::UTC
    })
}

fn names_or_english(names: &[String], english: &[&str], kind: &str) -> Vec<String> {
    if names.len() == english.len() && names.iter().all(|name| !name.trim().is_empty()) {
        return names.to_vec();
    }

    if !names.is_empty() {
        tracing::warn!(kind, count = names.len(), "Client sent unusable {kind} names. Using English.");
    }
    english.iter().map(|name| name.to_string()).collect()
}

// ============================================================================
// First day of the week
// ============================================================================

/// Regions whose week does not start on Monday
static WEEK_START: Lazy<HashMap<&'static str, Weekday>> = Lazy::new(|| {
    let sunday = [
        "AG", "AS", "BD", "BR", "BS", "BT", "BW", "BZ", "CA", "CN", "CO", "DM", "DO", "ET",
        "GT", "GU", "HK", "HN", "ID", "IL", "IN", "JM", "JP", "KE", "KH", "KR", "LA", "MH",
        "MM", "MO", "MT", "MX", "MZ", "NI", "NP", "PA", "PE", "PH", "PK", "PR", "PT", "PY",
        "SA", "SG", "SV", "TH", "TT", "TW", "UM", "US", "VE", "VI", "WS", "YE", "ZA", "ZW",
    ];
    let saturday = [
        "AE", "AF", "BH", "DJ", "DZ", "EG", "IQ", "IR", "JO", "KW", "LY", "OM", "QA", "SD", "SY",
    ];

    sunday
        .into_iter()
        .map(|region| (region, Weekday::Sun))
        .chain(saturday.into_iter().map(|region| (region, Weekday::Sat)))
        .chain([("MV", Weekday::Fri)])
        .collect()
});

/// Region assumed for a bare language subtag
static LIKELY_REGION: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("ar", "EG"),
        ("bn", "BD"),
        ("de", "DE"),
        ("en", "US"),
        ("es", "ES"),
        ("fa", "IR"),
        ("fr", "FR"),
        ("he", "IL"),
        ("hi", "IN"),
        ("id", "ID"),
        ("it", "IT"),
        ("ja", "JP"),
        ("ko", "KR"),
        ("nl", "NL"),
        ("pl", "PL"),
        ("pt", "BR"),
        ("ru", "RU"),
        ("sv", "SE"),
        ("th", "TH"),
        ("tr", "TR"),
        ("uk", "UA"),
        ("vi", "VN"),
        ("zh", "CN"),
    ])
});

/// First day of the week for a language tag
///
/// Uses the tag's region, or the language's most likely region when the tag
/// has none. Defaults to Monday.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use rhtmx_session::locale::first_day_of_week;
///
/// assert_eq!(first_day_of_week("en-US"), Weekday::Sun);
/// assert_eq!(first_day_of_week("en-GB"), Weekday::Mon);
/// assert_eq!(first_day_of_week("ar-EG"), Weekday::Sat);
/// assert_eq!(first_day_of_week("ja"), Weekday::Sun);
/// ```
pub fn first_day_of_week(tag: &str) -> Weekday {
    let Ok(id) = tag.parse::<LanguageIdentifier>() else {
        return Weekday::Mon;
    };

    let region = match &id.region {
        Some(region) => Some(region.as_str()),
        None => LIKELY_REGION.get(id.language.as_str()).copied(),
    };

    region
        .and_then(|region| WEEK_START.get(region).copied())
        .unwrap_or(Weekday::Mon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(".", ".")]
    #[case(",", ",")]
    #[case("12", ".")]
    #[case("", ".")]
    #[case("٫", "٫")]
    fn test_decimal_separator(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decimal_separator(raw), expected);
    }

    #[rstest]
    #[case(",", ",")]
    #[case("", "")]
    #[case(" ", " ")]
    #[case("..", "")]
    fn test_thousands_separator(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(thousands_separator(raw), expected);
    }

    #[rstest]
    #[case("%Y-%m-%d", true)]
    #[case("%d/%m/%Y", true)]
    #[case("%m/%d/%y", true)]
    #[case("%d. %B %Y", false)]
    #[case("%Y", false)]
    #[case("%H:%M", false)]
    #[case("%", false)]
    #[case("", false)]
    fn test_date_format_validation(#[case] format: &str, #[case] valid: bool) {
        assert_eq!(is_valid_date_format(format), valid, "{format}");
    }

    #[test]
    fn test_languages_drop_und_and_garbage() {
        let tags = vec!["und".to_string(), "!!".to_string(), "fr-ca".to_string()];
        assert_eq!(normalize_languages(&tags, "en-US"), vec!["fr-CA"]);
    }

    #[test]
    fn test_language_fallback_uses_default() {
        assert_eq!(normalize_languages(&[], "de-DE"), vec!["de-DE"]);
        assert_eq!(normalize_languages(&[], "???"), vec!["en-US"]);
    }

    #[rstest]
    #[case(&["und", "en_us", "fr-ca", "EN-US"])]
    #[case(&["zh-hant-tw", "!!", "de"])]
    #[case(&[])]
    fn test_normalized_languages_are_stable(#[case] raw: &[&str]) {
        let tags: Vec<String> = raw.iter().map(|tag| tag.to_string()).collect();
        let once = normalize_languages(&tags, "en-US");
        assert_eq!(normalize_languages(&once, "en-US"), once);
    }

    #[test]
    fn test_bad_configured_date_format_falls_back_to_iso() {
        let config = SessionConfig {
            default_date_format: "%H:%M".to_string(),
            ..SessionConfig::default()
        };
        let msg = InitialClientMessage {
            date_format_string: "%Q".to_string(),
            ..InitialClientMessage::from_defaults()
        };

        let bundle = LocaleBundle::negotiate(&msg, &config);
        assert_eq!(bundle.date_format, "%Y-%m-%d");
        assert!(is_valid_date_format(&bundle.date_format));
    }

    #[test]
    fn test_timezone_fallback() {
        assert_eq!(timezone("Europe/Berlin"), chrono_tz::Europe::Berlin);
        assert_eq!(timezone("Mars/Olympus_Mons"), Tz::UTC);
    }

    #[test]
    fn test_bundle_from_messy_handshake() {
        let msg = InitialClientMessage {
            preferred_languages: vec!["en-gb".to_string()],
            decimal_separator: "12".to_string(),
            thousands_separator: "abc".to_string(),
            date_format_string: "%Q".to_string(),
            timezone: "Nowhere".to_string(),
            month_names_long: vec!["Jan".to_string()],
            ..InitialClientMessage::from_defaults()
        };

        let bundle = LocaleBundle::negotiate(&msg, &SessionConfig::default());
        assert_eq!(bundle.preferred_languages, vec!["en-GB"]);
        assert_eq!(bundle.decimal_separator, ".");
        assert_eq!(bundle.thousands_separator, "");
        assert_eq!(bundle.date_format, "%Y-%m-%d");
        assert_eq!(bundle.timezone, Tz::UTC);
        assert_eq!(bundle.first_day_of_week, Weekday::Mon);
        assert_eq!(bundle.month_names_long[0], "January");
    }
}
