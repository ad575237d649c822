//! Cleans free-text profile descriptions before they are embedded.

use matchmaker_core::{MatchError, MatchResult};
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use whatlang::Lang;

/// Tokens shorter than this are dropped.
const MIN_TOKEN_CHARS: usize = 3;

pub struct TextPreprocessor {
    html_tags: Regex,
    non_alphanumeric: Regex,
    whitespace: Regex,
    stop_words: HashSet<String>,
    english: Stemmer,
    russian: Stemmer,
}

impl TextPreprocessor {
    pub fn new<I, S>(stop_words: I) -> MatchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| MatchError::Config(format!("bad regex {pattern}: {e}")))
        };
        Ok(Self {
            html_tags: compile(r"<[^>]+>")?,
            non_alphanumeric: compile(r"[^\p{L}\p{N}\s]")?,
            whitespace: compile(r"\s+")?,
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            english: Stemmer::create(Algorithm::English),
            russian: Stemmer::create(Algorithm::Russian),
        })
    }

    /// Lowercase, strip markup and punctuation, then normalize each
    /// remaining word for the detected language.
    pub fn clean(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = self.html_tags.replace_all(&text, "");
        let text = self.non_alphanumeric.replace_all(&text, " ");
        let text = self.whitespace.replace_all(&text, " ");
        let text = text.trim();
        if text.is_empty() {
            return String::new();
        }

        let stemmer = match detect_language(text) {
            Some(Lang::Eng) => Some(&self.english),
            Some(Lang::Rus) => Some(&self.russian),
            _ => None,
        };

        text.split(' ')
            .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|word| !self.stop_words.contains(*word))
            .map(|word| match stemmer {
                Some(stemmer) => stemmer.stem(word).into_owned(),
                None => word.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Language of `text`; very short inputs fall back to their script.
pub fn detect_language(text: &str) -> Option<Lang> {
    if let Some(info) = whatlang::detect(text) {
        if info.is_reliable() {
            return Some(info.lang());
        }
    }
    match whatlang::detect_script(text)? {
        whatlang::Script::Cyrillic => Some(Lang::Rus),
        whatlang::Script::Latin => Some(Lang::Eng),
        _ => None,
    }
}
