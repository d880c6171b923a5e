use std::collections::HashMap;

use serde::Deserialize;
use tokenizers::{
    pre_tokenizers::delimiter::CharDelimiterSplit, OffsetReferential, OffsetType,
    PreTokenizedString, PreTokenizer,
};
use tracing::warn;
use txt2img_rs_common::FileData;

use crate::{
    error::LoadResult,
    util::{read_json, read_text},
};

const WORD_DELIMITER: char = ' ';

pub const CLS_ROLE: &str = "cls";
pub const SEP_ROLE: &str = "sep";

/// A reserved token, keyed by its role (`cls`, `sep`, ...) in `special_tokens_map.json`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SpecialToken {
    pub id: u32,
    pub content: String,
}

/// Word-level tokenizer over a fixed vocabulary.
///
/// Prompts are split on spaces and each word is looked up in the vocabulary; words without an
/// entry are dropped. The BPE merges table is kept alongside the vocabulary but no merge pass is run.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    vocab: HashMap<String, u32>,
    merges: Vec<(String, String)>,
    special_tokens: HashMap<String, SpecialToken>,
}

impl Tokenizer {
    pub fn new(
        vocab: HashMap<String, u32>,
        merges: Vec<(String, String)>,
        special_tokens: HashMap<String, SpecialToken>,
    ) -> Self {
        Self {
            vocab,
            merges,
            special_tokens,
        }
    }

    /// Load from `vocab.json`, `merges.txt` and `special_tokens_map.json`.
    pub fn from_files(
        vocab_file: &FileData,
        merges_file: &FileData,
        special_tokens_file: &FileData,
    ) -> LoadResult<Self> {
        let vocab: HashMap<String, u32> = read_json(vocab_file)?;
        let merges = parse_merges(&read_text(merges_file)?);
        let special_tokens: HashMap<String, SpecialToken> = read_json(special_tokens_file)?;
        Ok(Self::new(vocab, merges, special_tokens))
    }

    /// Tokenize `text`. With `add_special_tokens`, the `cls` and `sep` ids wrap the sequence when
    /// both roles are defined.
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Vec<u32> {
        let mut tokens = split_words(text)
            .iter()
            .filter_map(|word| self.vocab.get(word.as_str()).copied())
            .collect::<Vec<_>>();

        if add_special_tokens {
            if let (Some(cls), Some(sep)) = (
                self.special_tokens.get(CLS_ROLE),
                self.special_tokens.get(SEP_ROLE),
            ) {
                tokens.insert(0, cls.id);
                tokens.push(sep.id);
            }
        }

        tokens
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn merges(&self) -> &[(String, String)] {
        &self.merges
    }

    pub fn special_token(&self, role: &str) -> Option<&SpecialToken> {
        self.special_tokens.get(role)
    }
}

/// Space-delimited words. Runs of spaces yield no empty words; tabs and newlines are kept.
fn split_words(text: &str) -> Vec<String> {
    let mut pretokenized = PreTokenizedString::from(text);
    if let Err(e) = CharDelimiterSplit::new(WORD_DELIMITER).pre_tokenize(&mut pretokenized) {
        warn!("could not split prompt into words: {e}");
        return Vec::new();
    }
    pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(word, _, _)| word.to_string())
        .collect()
}

/// One `left right` pair per line. The `#version` header and malformed lines are skipped.
fn parse_merges(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter(|line| !line.starts_with("#version"))
        .map(|x| x.split(' ').collect::<Vec<_>>())
        .filter(|x| x.len() == 2)
        .map(|x| (x[0].to_string(), x[1].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;

    fn vocab() -> HashMap<String, u32> {
        [("a", 10), ("beautiful", 11), ("landscape", 12)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn specials() -> HashMap<String, SpecialToken> {
        [
            (
                CLS_ROLE.to_string(),
                SpecialToken {
                    id: 49406,
                    content: "<|startoftext|>".to_string(),
                },
            ),
            (
                SEP_ROLE.to_string(),
                SpecialToken {
                    id: 49407,
                    content: "<|endoftext|>".to_string(),
                },
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn empty_prompt_with_specials() {
        let tok = Tokenizer::new(vocab(), vec![], specials());
        assert_eq!(tok.encode("", true), vec![49406, 49407]);
    }

    #[test]
    fn empty_prompt_without_specials() {
        let tok = Tokenizer::new(vocab(), vec![], HashMap::new());
        assert!(tok.encode("", true).is_empty());
    }

    #[test]
    fn out_of_vocabulary_words_are_dropped() {
        let tok = Tokenizer::new(vocab(), vec![], specials());
        assert!(tok.encode("un paysage magnifique", false).is_empty());
        assert_eq!(tok.encode("a magnifique landscape", false), vec![10, 12]);
    }

    #[test]
    fn special_tokens_add_two() {
        let with = Tokenizer::new(vocab(), vec![], specials());
        let without = Tokenizer::new(vocab(), vec![], HashMap::new());
        for prompt in ["a", "a beautiful landscape", "nothing known", "  a\tbeautiful\n"] {
            let base = with.encode(prompt, false).len();
            assert_eq!(with.encode(prompt, true).len(), base + 2);
            assert_eq!(without.encode(prompt, true).len(), base);
        }
    }

    #[test]
    fn only_one_role_adds_nothing() {
        let mut only_cls = specials();
        only_cls.remove(SEP_ROLE);
        let tok = Tokenizer::new(vocab(), vec![], only_cls);
        assert_eq!(tok.encode("a", true), vec![10]);
    }

    #[test]
    fn splits_on_spaces_only() {
        let tok = Tokenizer::new(vocab(), vec![], specials());
        assert_eq!(
            tok.encode("  a   beautiful landscape ", true),
            vec![49406, 10, 11, 12, 49407]
        );
        // Tabs and newlines stay inside the word.
        assert_eq!(tok.encode("a\tbeautiful landscape\n", false), Vec::<u32>::new());

        let mut vocab = vocab();
        vocab.insert("a\tb".to_string(), 5);
        let tok = Tokenizer::new(vocab, vec![], HashMap::new());
        assert_eq!(tok.encode("a\tb", true), vec![5]);
    }

    #[test]
    fn merges_skip_header_and_malformed_lines() {
        let merges = parse_merges("#version: 0.2\ni n\nt h\nbroken\n\na b c\n");
        assert_eq!(
            merges,
            vec![
                ("i".to_string(), "n".to_string()),
                ("t".to_string(), "h".to_string())
            ]
        );
    }

    #[test]
    fn load_from_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vocab_path = dir.path().join("vocab.json");
        let merges_path = dir.path().join("merges.txt");
        let special_path = dir.path().join("special_tokens_map.json");
        std::fs::write(&vocab_path, r#"{"a": 1, "cat": 2}"#)?;
        std::fs::write(&merges_path, "#version: 0.2\nc a\nca t\n")?;
        std::fs::write(
            &special_path,
            r#"{"cls": {"id": 0, "content": "[CLS]"}, "sep": {"id": 3, "content": "[SEP]"}}"#,
        )?;

        let tok = Tokenizer::from_files(
            &FileData::from_path(&vocab_path),
            &FileData::from_path(&merges_path),
            &FileData::from_path(&special_path),
        )?;
        assert_eq!(tok.vocab_size(), 2);
        assert_eq!(tok.merges().len(), 2);
        assert_eq!(tok.special_token(SEP_ROLE).map(|t| t.id), Some(3));
        assert_eq!(tok.encode("a cat", true), vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn missing_file_is_a_load_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vocab_path = dir.path().join("vocab.json");
        std::fs::write(&vocab_path, "{}")?;
        let res = Tokenizer::from_files(
            &FileData::from_path(&vocab_path),
            &FileData::from_path(dir.path().join("merges.txt")),
            &FileData::from_path(dir.path().join("special_tokens_map.json")),
        );
        assert!(matches!(res, Err(LoadError::Io { .. })));
        Ok(())
    }

    #[test]
    fn unparsable_special_tokens_is_a_load_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vocab_path = dir.path().join("vocab.json");
        let merges_path = dir.path().join("merges.txt");
        let special_path = dir.path().join("special_tokens_map.json");
        std::fs::write(&vocab_path, "{}")?;
        std::fs::write(&merges_path, "")?;
        std::fs::write(&special_path, r#"{"cls": "<s>"}"#)?;
        let res = Tokenizer::from_files(
            &FileData::from_path(&vocab_path),
            &FileData::from_path(&merges_path),
            &FileData::from_path(&special_path),
        );
        assert!(matches!(res, Err(LoadError::Json { .. })));
        Ok(())
    }
}
