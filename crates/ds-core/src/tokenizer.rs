use tiktoken_rs::CoreBPE;

use crate::error::Error;

/// Counts language-model tokens in a piece of text.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Token counter using tiktoken-rs BPE tokenization.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// The `o200k_base` encoding used by the gpt-4o model family.
    pub fn o200k() -> Result<Self, Error> {
        let bpe = tiktoken_rs::o200k_base()
            .map_err(|e| Error::config(format!("Failed to load o200k_base encoding: {}", e)))?;
        Ok(Self { bpe })
    }

    /// Encoding for a named model, falling back to `o200k_base`.
    pub fn for_model(model: &str) -> Result<Self, Error> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Ok(Self { bpe }),
            Err(_) => Self::o200k(),
        }
    }
}

impl Tokenizer for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_o200k_counts_tokens() {
        let counter = TiktokenCounter::o200k().unwrap();
        assert_eq!(counter.count(""), 0);
        let n = counter.count("The quick brown fox jumps over the lazy dog.");
        assert!(n > 5 && n < 20, "unexpected token count {}", n);
    }

    #[test]
    fn test_known_model_uses_its_encoding() {
        let text = "Proportional trimming keeps every source.";
        let gpt4o = TiktokenCounter::for_model("gpt-4o").unwrap();
        let o200k = TiktokenCounter::o200k().unwrap();
        assert_eq!(gpt4o.count(text), o200k.count(text));

        let gpt4 = TiktokenCounter::for_model("gpt-4").unwrap();
        assert!(gpt4.count(text) > 0);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let counter = TiktokenCounter::for_model("definitely-not-a-model").unwrap();
        assert!(counter.count("hello world") > 0);
    }
}
