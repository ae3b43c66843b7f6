//! Language registry: canonical codes and alias resolution.
//!
//! Codes are script-qualified (`eng_Latn`, `hin_Deva`). Lookup is
//! insensitive to case and to `-`/`_` separators, so `ENG-latn`, `eng_latn`
//! and the alias `en` all resolve to `eng_Latn`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Canonical language code. Only produced by [`LanguageRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A language entry as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageEntry {
    /// Canonical code (e.g., "fra_Latn")
    pub code: String,
    /// Display name (e.g., "French")
    pub name: String,
    /// Alternative spellings accepted on input
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl LanguageEntry {
    pub fn new(code: &str, name: &str, aliases: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A registered language
#[derive(Debug, Clone, Serialize)]
pub struct Language {
    pub code: LanguageCode,
    pub name: String,
}

/// Languages served by the default model set.
pub fn builtin_languages() -> Vec<LanguageEntry> {
    vec![
        LanguageEntry::new("eng_Latn", "English", &["en", "eng", "english"]),
        LanguageEntry::new("hin_Deva", "Hindi", &["hi", "hin", "hindi"]),
        LanguageEntry::new("urd_Arab", "Urdu", &["ur", "urd", "urdu"]),
        LanguageEntry::new(
            "zho_Hans",
            "Chinese (Simplified)",
            &["zh", "zh_CN", "zh_Hans", "zho", "chinese", "cn"],
        ),
    ]
}

/// Static lookup table from any accepted spelling to a canonical code.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
    index: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Registry with the built-in languages only
    pub fn builtin() -> Self {
        let registry = Self::from_entries(builtin_languages());
        debug_assert!(registry.is_ok(), "built-in language table is inconsistent");
        registry.unwrap_or_else(|e| {
            tracing::error!("Built-in language table rejected: {}", e);
            Self::empty()
        })
    }

    /// Built-in languages plus extra entries from configuration
    pub fn with_extra(extra: impl IntoIterator<Item = LanguageEntry>) -> Result<Self> {
        Self::from_entries(builtin_languages().into_iter().chain(extra))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LanguageEntry>) -> Result<Self> {
        let mut registry = Self::empty();

        for entry in entries {
            let code = normalize_form(&entry.code);
            if code.is_empty() || code.chars().any(char::is_whitespace) {
                return Err(Error::ConfigInvalid {
                    field: "languages.code".to_string(),
                    reason: format!("'{}' is not a valid language code", entry.code),
                });
            }

            let position = registry.languages.len();
            registry.languages.push(Language {
                code: LanguageCode(code.clone()),
                name: entry.name,
            });

            for spelling in std::iter::once(code.as_str()).chain(entry.aliases.iter().map(String::as_str)) {
                let key = lookup_key(spelling);
                match registry.index.get(&key).copied() {
                    Some(existing) if existing != position => {
                        return Err(Error::ConfigInvalid {
                            field: "languages.aliases".to_string(),
                            reason: format!(
                                "'{spelling}' already refers to {}",
                                registry.languages[existing].code
                            ),
                        });
                    }
                    _ => {
                        registry.index.insert(key, position);
                    }
                }
            }
        }

        Ok(registry)
    }

    fn empty() -> Self {
        Self {
            languages: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Resolve any accepted spelling to its canonical code
    pub fn canonicalize(&self, code: &str) -> Result<LanguageCode> {
        self.resolve(code)
            .map(|language| language.code.clone())
            .ok_or_else(|| Error::UnknownLanguage(code.trim().to_string()))
    }

    /// True when both codes are known and denote the same language
    pub fn equivalent(&self, a: &str, b: &str) -> bool {
        match (self.resolve(a), self.resolve(b)) {
            (Some(x), Some(y)) => x.code == y.code,
            _ => false,
        }
    }

    pub fn display_name<'a>(&'a self, code: &'a LanguageCode) -> &'a str {
        self.resolve(code.as_str())
            .map_or_else(|| code.as_str(), |language| language.name.as_str())
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn contains(&self, code: &str) -> bool {
        self.resolve(code).is_some()
    }

    fn resolve(&self, code: &str) -> Option<&Language> {
        self.index
            .get(&lookup_key(code))
            .map(|&position| &self.languages[position])
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn lookup_key(code: &str) -> String {
    code.trim().replace('-', "_").to_lowercase()
}

/// Normalize the written form of a code: `ENG-latn` -> `eng_Latn`,
/// `zh-cn` -> `zh_CN`.
fn normalize_form(code: &str) -> String {
    code.trim()
        .replace('-', "_")
        .split('_')
        .enumerate()
        .map(|(i, part)| match (i, part.len()) {
            (0, _) => part.to_lowercase(),
            (_, 4) => {
                let lower = part.to_lowercase();
                let mut chars = lower.chars();
                chars
                    .next()
                    .map(|first| first.to_uppercase().chain(chars).collect())
                    .unwrap_or_default()
            }
            (_, 2 | 3) => part.to_uppercase(),
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("_")
}
