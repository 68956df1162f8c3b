use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Interface language chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// English
    #[default]
    En,
    /// Amharic
    Am,
}

impl Language {
    /// Short code used in callback data
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Am => "am",
        }
    }

    /// Parse a language code
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Self::En),
            "am" => Some(Self::Am),
            _ => None,
        }
    }

    /// The other supported language
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::En => Self::Am,
            Self::Am => Self::En,
        }
    }
}

/// Regional results service the lookup is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Addis Ababa
    Aa,
    /// Amhara
    Amhara,
    /// Oromia
    Oromia,
    /// South West
    Sw,
}

impl Region {
    /// All known regions, in menu order
    pub const ALL: [Self; 4] = [Self::Aa, Self::Amhara, Self::Oromia, Self::Sw];

    /// Short code used in callback data and cache keys
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Aa => "aa",
            Self::Amhara => "amhara",
            Self::Oromia => "oromia",
            Self::Sw => "sw",
        }
    }

    /// Parse a region code
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|region| region.code() == code)
    }

    /// Human-readable region name for menus
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Aa => "Addis Ababa",
            Self::Amhara => "Amhara",
            Self::Oromia => "Oromia",
            Self::Sw => "South West",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Chat user behind an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    /// Platform user id
    pub id: i64,
    /// Public username, if the user set one
    pub username: Option<String>,
}

/// Student result record as returned by the upstream service.
///
/// Immutable once fetched; shared between the cache and renderers behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultRecord {
    /// Student identity block
    pub student: Student,
    /// Course list in upstream order
    #[serde(default)]
    pub courses: Vec<Course>,
}

/// Student identity block of a result record
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Student {
    /// Full name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Age (upstream sends either a number or a string)
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: Option<String>,
    /// School name
    #[serde(default, deserialize_with = "lenient_string")]
    pub school: Option<String>,
    /// Woreda (district)
    #[serde(default, deserialize_with = "lenient_string")]
    pub woreda: Option<String>,
    /// Gender
    #[serde(default, deserialize_with = "lenient_string")]
    pub gender: Option<String>,
    /// Photo URL, possibly carrying JSON escaping artifacts
    #[serde(default, rename = "photo", deserialize_with = "lenient_string")]
    pub photo_ref: Option<String>,
}

impl Student {
    /// Photo reference if present and non-empty
    #[must_use]
    pub fn photo_ref(&self) -> Option<&str> {
        self.photo_ref.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// One course entry of a result record
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Course {
    /// Course name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Raw score as sent upstream
    #[serde(default, deserialize_with = "lenient_string")]
    pub score: Option<String>,
    /// Pass/fail status as sent upstream
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

/// Accepts strings, numbers and booleans; `null` and missing become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
