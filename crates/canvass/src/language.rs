use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numeric language code carried on localizations, interviews, and the wire.
///
/// The numeric form is what scripts see under the `language` binding; the
/// two-letter form is bound as `language_str2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct Language(pub u16);

struct LanguageInfo {
    code: u16,
    str2: &'static str,
    name: &'static str,
}

// The subset of the language table the system ships with. Extending it is a
// data change, not a code change.
const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo { code: 1, str2: "en", name: "English" },
    LanguageInfo { code: 2, str2: "fr", name: "French" },
    LanguageInfo { code: 3, str2: "es", name: "Spanish" },
    LanguageInfo { code: 4, str2: "de", name: "German" },
    LanguageInfo { code: 5, str2: "it", name: "Italian" },
    LanguageInfo { code: 6, str2: "pt", name: "Portuguese" },
    LanguageInfo { code: 7, str2: "nl", name: "Dutch" },
    LanguageInfo { code: 8, str2: "ja", name: "Japanese" },
    LanguageInfo { code: 9, str2: "zh", name: "Chinese" },
    LanguageInfo { code: 10, str2: "ar", name: "Arabic" },
];

impl Language {
    pub const ENGLISH: Language = Language(1);
    pub const FRENCH: Language = Language(2);

    /// Fails when the numeric code is not in the language table.
    pub fn validate(self) -> Result<Self> {
        if LANGUAGES.iter().any(|info| info.code == self.0) {
            Ok(self)
        } else {
            Err(Error::LanguageInvalid)
        }
    }

    pub fn from_str2(str2: &str) -> Result<Self> {
        LANGUAGES
            .iter()
            .find(|info| info.str2 == str2)
            .map(|info| Language(info.code))
            .ok_or(Error::LanguageInvalid)
    }

    /// Two-letter code, empty for an unknown numeric code.
    pub fn str2(self) -> &'static str {
        LANGUAGES
            .iter()
            .find(|info| info.code == self.0)
            .map(|info| info.str2)
            .unwrap_or("")
    }

    pub fn name(self) -> &'static str {
        LANGUAGES
            .iter()
            .find(|info| info.code == self.0)
            .map(|info| info.name)
            .unwrap_or("")
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::ENGLISH
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str2 = self.str2();
        if str2.is_empty() {
            write!(f, "lang#{}", self.0)
        } else {
            f.write_str(str2)
        }
    }
}
