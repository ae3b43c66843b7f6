//! Utility functions shared across the crate.

use std::path::PathBuf;

use crate::cache::DiskCache;
use crate::error::Result;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's cache directory following XDG conventions.
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise `$HOME/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Get the default translation cache path.
pub fn translation_cache_path() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("pivot-translator")
}

/// Clear the default on-disk translation cache.
///
/// Returns the number of entries cleared.
pub fn clear_translation_cache() -> Result<usize> {
    let cache_path = translation_cache_path();

    if !cache_path.exists() {
        return Ok(0);
    }

    DiskCache::open(cache_path)?.clear()
}

/// Split text into (leading whitespace, content, trailing whitespace).
///
/// Concatenating the three parts yields the input.
pub fn split_padding(text: &str) -> (&str, &str, &str) {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len().max(start);
    (&text[..start], &text[start..end], &text[end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_padding() {
        assert_eq!(split_padding("  hello world\n"), ("  ", "hello world", "\n"));
        assert_eq!(split_padding("hello"), ("", "hello", ""));
        assert_eq!(split_padding(""), ("", "", ""));
        assert_eq!(split_padding(" \t "), (" \t ", "", ""));
    }
}
