//! Token accounting: per-model tokenizers and a shared encoder cache.
//!
//! The budget manager only needs three operations from a tokenizer: encode,
//! decode, and count. [`BpeTokenizer`] provides them with `tiktoken-rs`
//! encodings; [`CharTokenizer`] counts one token per Unicode scalar and is
//! used as the last-resort fallback (flagged degraded) and in tests where
//! exact arithmetic matters.
//!
//! [`TokenizerCache`] maps model ids to encoders. Unknown model ids fall back
//! to `o200k_base` and stay on it for the lifetime of the cache.

use crate::error::TokenizerError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// A single token id.
pub type TokenId = u32;

/// Encoding family used when a model id has no known encoding.
pub const FALLBACK_ENCODING: &str = "o200k_base";

/// Encode/decode/count capability for one encoding.
pub trait Tokenizer: Send + Sync {
    /// Human-readable encoding name, for diagnostics.
    fn encoding(&self) -> &str;

    fn encode(&self, text: &str) -> Vec<TokenId>;

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// True when counts are an approximation that can break the budget
    /// guarantee against the real model tokenizer.
    fn is_degraded(&self) -> bool {
        false
    }
}

// ── BPE ────────────────────────────────────────────────────────────

/// Byte-pair encoder backed by `tiktoken-rs`.
pub struct BpeTokenizer {
    encoding: String,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Encoder registered for `model` (bare name, no provider prefix).
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            TokenizerError::Unavailable {
                model: model.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            encoding: format!("bpe:{model}"),
            bpe,
        })
    }

    /// The designated fallback encoding.
    pub fn fallback() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::o200k_base().map_err(|e| TokenizerError::Unavailable {
            model: FALLBACK_ENCODING.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            encoding: FALLBACK_ENCODING.to_string(),
            bpe,
        })
    }
}

impl fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpeTokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Tokenizer for BpeTokenizer {
    fn encoding(&self) -> &str {
        &self.encoding
    }

    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }
}

// ── Characters ─────────────────────────────────────────────────────

/// One token per Unicode scalar value.
#[derive(Debug, Clone, Default)]
pub struct CharTokenizer {
    degraded: bool,
}

impl CharTokenizer {
    /// Exact character accounting, for callers that budget in characters.
    pub fn new() -> Self {
        Self { degraded: false }
    }

    /// Character accounting standing in for an encoder that failed to load.
    pub fn degraded() -> Self {
        Self { degraded: true }
    }
}

impl Tokenizer for CharTokenizer {
    fn encoding(&self) -> &str {
        if self.degraded { "chars (degraded)" } else { "chars" }
    }

    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.chars().map(|c| c as TokenId).collect()
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        tokens
            .iter()
            .map(|&t| {
                char::from_u32(t)
                    .ok_or_else(|| TokenizerError::Decode(format!("{t:#x} is not a scalar value")))
            })
            .collect()
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn is_degraded(&self) -> bool {
        self.degraded
    }
}

// ── Accountant ─────────────────────────────────────────────────────

/// A tokenizer bound to one model id.
#[derive(Clone)]
pub struct TokenAccountant {
    model: String,
    tokenizer: Arc<dyn Tokenizer>,
}

impl TokenAccountant {
    pub fn new(model: impl Into<String>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            model: model.into(),
            tokenizer,
        }
    }

    /// Accountant with exact character counting.
    pub fn chars(model: impl Into<String>) -> Self {
        Self::new(model, Arc::new(CharTokenizer::new()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn encoding(&self) -> &str {
        self.tokenizer.encoding()
    }

    pub fn is_degraded(&self) -> bool {
        self.tokenizer.is_degraded()
    }

    pub fn count(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        self.tokenizer.encode(text)
    }

    pub fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        self.tokenizer.decode(tokens)
    }
}

impl fmt::Debug for TokenAccountant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAccountant")
            .field("model", &self.model)
            .field("encoding", &self.tokenizer.encoding())
            .finish()
    }
}

// ── Cache ──────────────────────────────────────────────────────────

/// Lazily populated map from model id to encoder.
///
/// Share one cache per process behind an `Arc`; encoder construction is the
/// only mutation and happens under the lock.
#[derive(Default)]
pub struct TokenizerCache {
    encoders: Mutex<HashMap<String, Arc<dyn Tokenizer>>>,
}

impl TokenizerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a tokenizer for `model`, replacing any cached one.
    pub fn insert(&self, model: impl Into<String>, tokenizer: Arc<dyn Tokenizer>) {
        let mut encoders = self.encoders.lock().unwrap_or_else(|e| e.into_inner());
        encoders.insert(model.into(), tokenizer);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_tokenizer(self, model: impl Into<String>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.insert(model, tokenizer);
        self
    }

    /// Accountant for `model`, constructing and caching its encoder on first use.
    pub fn accountant(&self, model: &str) -> TokenAccountant {
        TokenAccountant::new(model, self.tokenizer_for(model))
    }

    /// Number of cached encoders.
    pub fn len(&self) -> usize {
        self.encoders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tokenizer_for(&self, model: &str) -> Arc<dyn Tokenizer> {
        let mut encoders = self.encoders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = encoders.get(model) {
            return Arc::clone(existing);
        }
        let tokenizer = build_tokenizer(model);
        encoders.insert(model.to_string(), Arc::clone(&tokenizer));
        tokenizer
    }
}

impl fmt::Debug for TokenizerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerCache")
            .field("models", &self.len())
            .finish()
    }
}

/// Pick an encoder for a model id such as `"openai/gpt-4o"` or `"gpt-4o"`.
fn build_tokenizer(model: &str) -> Arc<dyn Tokenizer> {
    let name = model.rsplit('/').next().unwrap_or(model);

    match BpeTokenizer::for_model(name) {
        Ok(bpe) => {
            debug!("Tokenizer for {model}: {}", bpe.encoding());
            return Arc::new(bpe);
        }
        Err(e) => debug!("{e}; using {FALLBACK_ENCODING}"),
    }

    match BpeTokenizer::fallback() {
        Ok(bpe) => Arc::new(bpe),
        Err(e) => {
            warn!("Tokenizer for {model} degraded to character counts: {e}");
            Arc::new(CharTokenizer::degraded())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_tokenizer_counts_scalars() {
        let tok = CharTokenizer::new();
        assert_eq!(tok.count("héllo"), 5);
        assert_eq!(tok.encode("ab"), vec!['a' as u32, 'b' as u32]);
        assert_eq!(tok.decode(&tok.encode("héllo")).unwrap(), "héllo");
        assert!(!tok.is_degraded());
    }

    #[test]
    fn char_tokenizer_rejects_surrogates() {
        let tok = CharTokenizer::new();
        assert!(tok.decode(&[0xD800]).is_err());
    }

    #[test]
    fn degraded_flag_is_visible() {
        let acct = TokenAccountant::new("m", Arc::new(CharTokenizer::degraded()));
        assert!(acct.is_degraded());
        assert!(acct.encoding().contains("degraded"));
    }

    #[test]
    fn known_model_uses_its_encoding() {
        let cache = TokenizerCache::new();
        let acct = cache.accountant("gpt-4o");
        assert_eq!(acct.encoding(), "bpe:gpt-4o");
        assert!(!acct.is_degraded());
    }

    #[test]
    fn provider_prefix_is_ignored() {
        let cache = TokenizerCache::new();
        let acct = cache.accountant("openai/gpt-4o");
        assert_eq!(acct.encoding(), "bpe:gpt-4o");
    }

    #[test]
    fn unknown_model_falls_back_consistently() {
        let cache = TokenizerCache::new();
        let first = cache.accountant("acme/unheard-of-model");
        let second = cache.accountant("acme/unheard-of-model");
        assert_eq!(first.encoding(), FALLBACK_ENCODING);
        assert_eq!(second.encoding(), FALLBACK_ENCODING);
        assert_eq!(cache.len(), 1);
        assert_eq!(first.count("hello world"), second.count("hello world"));
    }

    #[test]
    fn bpe_round_trips_text() {
        let cache = TokenizerCache::new();
        let acct = cache.accountant("gpt-4o");
        let text = "fn main() { println!(\"hi\"); }";
        let tokens = acct.encode(text);
        assert_eq!(tokens.len(), acct.count(text));
        assert_eq!(acct.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn inserted_tokenizer_wins() {
        let cache = TokenizerCache::new().with_tokenizer("gpt-4o", Arc::new(CharTokenizer::new()));
        assert_eq!(cache.accountant("gpt-4o").encoding(), "chars");
    }
}
