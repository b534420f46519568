//! Configuration loading from .env file

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, ensure};

use crate::sequencer::UnsupportedPolicy;

/// Accepted countdown lengths, in seconds.
const START_DELAY_RANGE: RangeInclusive<u32> = 0..=10;

/// Accepted inter-character delays, in milliseconds.
const CHAR_DELAY_RANGE: RangeInclusive<u64> = 10..=500;

/// Application configuration loaded from .env
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Config {
    pub start_delay_secs: u32,
    pub char_delay_ms: u64,
    pub text_file: PathBuf,
    pub on_unsupported: UnsupportedPolicy,
    pub log_to_file: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from the environment and an optional .env file.
    ///
    /// The first command-line argument, if present, replaces `TEXT_FILE`.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(e).context("Failed to read .env file");
        }

        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Some(path) = std::env::args_os().nth(1) {
            config.text_file = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Build configuration from a key lookup, applying defaults for absent keys.
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let start_delay_secs: u32 = Self::parse_or(&lookup, "START_DELAY_SECS", 3)?;
        ensure!(
            START_DELAY_RANGE.contains(&start_delay_secs),
            "START_DELAY_SECS must be between {} and {}, got {start_delay_secs}",
            START_DELAY_RANGE.start(),
            START_DELAY_RANGE.end()
        );

        let char_delay_ms: u64 = Self::parse_or(&lookup, "CHAR_DELAY_MS", 80)?;
        ensure!(
            CHAR_DELAY_RANGE.contains(&char_delay_ms),
            "CHAR_DELAY_MS must be between {} and {}, got {char_delay_ms}",
            CHAR_DELAY_RANGE.start(),
            CHAR_DELAY_RANGE.end()
        );

        Ok(Self {
            start_delay_secs,
            char_delay_ms,
            text_file: lookup("TEXT_FILE").map_or_else(|| PathBuf::from("autotype.txt"), PathBuf::from),
            on_unsupported: Self::parse_or(&lookup, "ON_UNSUPPORTED", UnsupportedPolicy::Abort)?,
            log_to_file: Self::parse_or(&lookup, "LOG_TO_FILE", false)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
        })
    }

    /// Parse a key, or fall back to `default` when it is unset.
    fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
    where
        F: Fn(&str) -> Option<String>,
        T: FromStr,
        T::Err: Display,
    {
        lookup(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e| anyhow!("Invalid {key}: {e}"))
        })
    }

    /// Read the text to type from `text_file`.
    pub fn read_text(&self) -> Result<String> {
        read_text(&self.text_file)
    }
}

/// Read and normalise a text file for typing.
fn read_text(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))?;
    Ok(normalize_text(&raw))
}

/// Convert CRLF line endings to LF and trim surrounding whitespace.
fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(
            config,
            Config {
                start_delay_secs: 3,
                char_delay_ms: 80,
                text_file: PathBuf::from("autotype.txt"),
                on_unsupported: UnsupportedPolicy::Abort,
                log_to_file: false,
                log_level: "info".to_owned(),
            }
        );
    }

    #[test]
    fn values_are_read_from_the_lookup() {
        let config = config_from(&[
            ("START_DELAY_SECS", "0"),
            ("CHAR_DELAY_MS", " 250 "),
            ("TEXT_FILE", "notes.txt"),
            ("ON_UNSUPPORTED", "skip"),
            ("LOG_TO_FILE", "true"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.start_delay_secs, 0);
        assert_eq!(config.char_delay_ms, 250);
        assert_eq!(config.text_file, PathBuf::from("notes.txt"));
        assert_eq!(config.on_unsupported, UnsupportedPolicy::Skip);
        assert!(config.log_to_file);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn out_of_range_delays_are_rejected() {
        let err = config_from(&[("START_DELAY_SECS", "11")]).unwrap_err();
        assert!(err.to_string().contains("START_DELAY_SECS"), "{err}");

        let err = config_from(&[("CHAR_DELAY_MS", "5")]).unwrap_err();
        assert!(err.to_string().contains("CHAR_DELAY_MS"), "{err}");
    }

    #[test]
    fn malformed_values_name_the_key() {
        let err = config_from(&[("CHAR_DELAY_MS", "fast")]).unwrap_err();
        assert!(err.to_string().starts_with("Invalid CHAR_DELAY_MS"), "{err}");

        let err = config_from(&[("ON_UNSUPPORTED", "ignore")]).unwrap_err();
        assert!(err.to_string().contains("ON_UNSUPPORTED"), "{err}");
    }

    #[test]
    fn text_is_normalised() {
        assert_eq!(normalize_text("  line one\r\nline two\r\n\n"), "line one\nline two");
        assert_eq!(normalize_text("\t\n"), "");
    }

    #[test]
    fn missing_text_file_reports_the_path() {
        let err = read_text(Path::new("does/not/exist.txt")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.txt"), "{err}");
    }
}
