//! Fitted word-index tokenizer and fixed-length padding for sentiment input.
//!
//! The artifact is the tokenizer's own JSON export: an outer object whose
//! `config.word_index` is a JSON-encoded string mapping words to indices
//! (1-based; 0 is reserved for padding).

use std::collections::HashMap;

use ndarray::Array2;
use serde::Deserialize;
use thiserror::Error;

use crate::registry::TensorElement;

/// Characters stripped by the tokenizer unless its export overrides them.
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Token length the sentiment classifier was trained on.
pub const DEFAULT_MAX_LEN: usize = 100;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Tokenizer JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tokenizer export has no word_index")]
    MissingWordIndex,

    #[error("Tokenizer split string must not be empty")]
    EmptySplit,
}

#[derive(Deserialize)]
struct TokenizerExport {
    config: TokenizerConfig,
}

#[derive(Deserialize)]
struct TokenizerConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_true")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    char_level: bool,
    #[serde(default)]
    oov_token: Option<String>,
    #[serde(default)]
    word_index: Option<String>,
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_true() -> bool {
    true
}

fn default_split() -> String {
    " ".to_string()
}

/// Text-to-index mapping fitted on the training corpus.
#[derive(Debug, Clone)]
pub struct WordIndexTokenizer {
    word_index: HashMap<String, u32>,
    num_words: Option<usize>,
    filters: String,
    lower: bool,
    split: String,
    char_level: bool,
    oov_index: Option<u32>,
}

impl WordIndexTokenizer {
    /// Parse the tokenizer's JSON export.
    pub fn from_json(raw: &str) -> Result<Self, TokenizerError> {
        let export: TokenizerExport = serde_json::from_str(raw)?;
        let cfg = export.config;

        let encoded = cfg.word_index.ok_or(TokenizerError::MissingWordIndex)?;
        let word_index: HashMap<String, u32> = serde_json::from_str(&encoded)?;

        if cfg.split.is_empty() && !cfg.char_level {
            return Err(TokenizerError::EmptySplit);
        }

        let oov_index = cfg
            .oov_token
            .as_ref()
            .and_then(|tok| word_index.get(tok).copied());

        Ok(Self {
            word_index,
            num_words: cfg.num_words,
            filters: cfg.filters,
            lower: cfg.lower,
            split: cfg.split,
            char_level: cfg.char_level,
            oov_index,
        })
    }

    /// Build a tokenizer directly from a vocabulary with default settings.
    pub fn from_vocabulary<I, S>(words: I, oov_token: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let word_index: HashMap<String, u32> =
            words.into_iter().map(|(w, i)| (w.into(), i)).collect();
        let oov_index = oov_token.and_then(|tok| word_index.get(tok).copied());
        Self {
            word_index,
            num_words: None,
            filters: default_filters(),
            lower: true,
            split: default_split(),
            char_level: false,
            oov_index,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.word_index.len()
    }

    fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        if self.char_level {
            return text.chars().map(String::from).collect();
        }

        let cleaned: String = text
            .chars()
            .map(|c| {
                if self.filters.contains(c) {
                    self.split.clone()
                } else {
                    c.to_string()
                }
            })
            .collect();

        cleaned
            .split(self.split.as_str())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Map text to token indices. Unknown or out-of-range words become the
    /// OOV index when one was fitted and are dropped otherwise.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.words(text)
            .iter()
            .filter_map(|word| match self.word_index.get(word) {
                Some(&index) => match self.num_words {
                    Some(limit) if index as usize >= limit => self.oov_index,
                    _ => Some(index),
                },
                None => self.oov_index,
            })
            .collect()
    }
}

/// Which end of the sequence padding or truncation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Pre,
    Post,
}

/// Fixed-length policy the classifier was trained with.
///
/// The defaults are the padding utility's own defaults, which is what the
/// serving code called without arguments beyond `maxlen`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaddingConfig {
    pub maxlen: usize,
    pub padding: Side,
    pub truncating: Side,
    pub value: u32,
    /// Element type of the classifier's token input.
    pub dtype: TensorElement,
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            maxlen: DEFAULT_MAX_LEN,
            padding: Side::Pre,
            truncating: Side::Pre,
            value: 0,
            dtype: TensorElement::F32,
        }
    }
}

impl PaddingConfig {
    /// Pad or truncate `tokens` to exactly `maxlen` entries.
    pub fn apply(&self, tokens: &[u32]) -> Vec<u32> {
        let kept: &[u32] = if tokens.len() > self.maxlen {
            match self.truncating {
                Side::Pre => &tokens[tokens.len() - self.maxlen..],
                Side::Post => &tokens[..self.maxlen],
            }
        } else {
            tokens
        };

        let fill = std::iter::repeat(self.value).take(self.maxlen - kept.len());
        match self.padding {
            Side::Pre => fill.chain(kept.iter().copied()).collect(),
            Side::Post => kept.iter().copied().chain(fill).collect(),
        }
    }

    /// Padded tokens as a `(1, maxlen)` batch.
    pub fn to_batch(&self, tokens: &[u32]) -> Array2<f32> {
        let padded = self.apply(tokens);
        Array2::from_shape_fn((1, self.maxlen), |(_, j)| padded[j] as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_json(word_index: &str, extra: &str) -> String {
        let encoded = serde_json::to_string(word_index).unwrap();
        format!(r#"{{"class_name":"Tokenizer","config":{{"word_index":{encoded}{extra}}}}}"#)
    }

    fn sample() -> WordIndexTokenizer {
        WordIndexTokenizer::from_json(&export_json(
            r#"{"<OOV>":1,"the":2,"staff":3,"were":4,"excellent":5,"and":6,"caring":7}"#,
            r#","oov_token":"<OOV>""#,
        ))
        .unwrap()
    }

    #[test]
    fn encodes_known_words_in_order() {
        let tok = sample();
        assert_eq!(
            tok.encode("The staff were excellent and caring"),
            vec![2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn strips_filters_and_lowercases() {
        let tok = sample();
        assert_eq!(tok.encode("EXCELLENT!!! Caring,staff."), vec![5, 7, 3]);
    }

    #[test]
    fn unknown_words_map_to_oov() {
        let tok = sample();
        assert_eq!(tok.encode("the nurse"), vec![2, 1]);
    }

    #[test]
    fn unknown_words_dropped_without_oov() {
        let tok = WordIndexTokenizer::from_vocabulary([("good", 1u32), ("care", 2)], None);
        assert_eq!(tok.encode("good hospital care"), vec![1, 2]);
    }

    #[test]
    fn num_words_limit_routes_rare_words_to_oov() {
        let tok = WordIndexTokenizer::from_json(&export_json(
            r#"{"<OOV>":1,"the":2,"rare":9}"#,
            r#","oov_token":"<OOV>","num_words":5"#,
        ))
        .unwrap();
        assert_eq!(tok.encode("the rare"), vec![2, 1]);
    }

    #[test]
    fn missing_word_index_is_error() {
        let err = WordIndexTokenizer::from_json(r#"{"config":{}}"#).unwrap_err();
        assert!(matches!(err, TokenizerError::MissingWordIndex));
    }

    #[test]
    fn empty_text_encodes_to_nothing() {
        assert!(sample().encode("").is_empty());
    }

    #[test]
    fn pads_on_the_left_by_default() {
        let cfg = PaddingConfig {
            maxlen: 5,
            ..PaddingConfig::default()
        };
        assert_eq!(cfg.apply(&[7, 8]), vec![0, 0, 0, 7, 8]);
    }

    #[test]
    fn default_truncation_keeps_the_tail() {
        let cfg = PaddingConfig {
            maxlen: 3,
            ..PaddingConfig::default()
        };
        assert_eq!(cfg.apply(&[1, 2, 3, 4, 5]), vec![3, 4, 5]);
    }

    #[test]
    fn post_truncation_keeps_the_head() {
        let cfg = PaddingConfig {
            maxlen: 3,
            truncating: Side::Post,
            ..PaddingConfig::default()
        };
        assert_eq!(cfg.apply(&[1, 2, 3, 4, 5]), vec![1, 2, 3]);
    }

    #[test]
    fn batch_has_fixed_length() {
        let cfg = PaddingConfig::default();
        let batch = cfg.to_batch(&[4, 5, 6]);
        assert_eq!(batch.shape(), &[1, DEFAULT_MAX_LEN]);
        assert_eq!(batch[[0, DEFAULT_MAX_LEN - 1]], 6.0);
        assert_eq!(batch[[0, 0]], 0.0);
    }

    #[test]
    fn padding_config_partial_json_uses_defaults() {
        let cfg: PaddingConfig = serde_json::from_str(r#"{"truncating":"post"}"#).unwrap();
        assert_eq!(cfg.maxlen, 100);
        assert_eq!(cfg.padding, Side::Pre);
        assert_eq!(cfg.truncating, Side::Post);
    }
}
