use std::collections::HashMap;
use std::sync::OnceLock;

/// Produces a signed sentiment score for a piece of text.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> i32;
}

/// Bundled AFINN-165 word list.
const AFINN: &str = include_str!("afinn.tsv");

static BUILTIN_WEIGHTS: OnceLock<HashMap<String, i32>> = OnceLock::new();

/// Parses `word<TAB>weight` lines. Comments, blank lines and anything
/// malformed or outside -5..=5 are skipped.
fn parse_weights(source: &str) -> HashMap<String, i32> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (word, weight) = line.split_once('\t')?;
            let weight: i32 = weight.trim().parse().ok()?;
            let word = word.trim();
            if word.is_empty() || word.contains(char::is_whitespace) || !(-5..=5).contains(&weight) {
                return None;
            }
            Some((word.to_lowercase(), weight))
        })
        .collect()
}

fn builtin_weights() -> &'static HashMap<String, i32> {
    BUILTIN_WEIGHTS.get_or_init(|| parse_weights(AFINN))
}

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "isn't", "wasn't", "can't", "won't", "didn't", "doesn't",
    "cannot",
];

/// Sums per-word weights. A word directly after a negator counts with its sign flipped.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    weights: HashMap<String, i32>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self {
            weights: builtin_weights().clone(),
        }
    }
}

impl LexiconScorer {
    /// Adds or overrides weights on top of the built-in list.
    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        for (word, weight) in words {
            self.weights.insert(word.into().to_lowercase(), weight);
        }
        self
    }

    pub fn weight(&self, word: &str) -> Option<i32> {
        self.weights.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> i32 {
        let tokens = tokenize(text);
        let mut total = 0;
        for (i, token) in tokens.iter().enumerate() {
            let Some(weight) = self.weight(token) else {
                continue;
            };
            let negated = i > 0 && NEGATORS.contains(&tokens[i - 1].as_str());
            total += if negated { -weight } else { weight };
        }
        total
    }
}
