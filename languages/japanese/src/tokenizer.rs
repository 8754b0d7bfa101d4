use std::path::Path;

use unicode_normalization::UnicodeNormalization;
use yomi_core::{TokenizeError, Tokenizer};
use yomi_types::Token;

use crate::readings::ReadingDictionary;
use crate::script::{Script, hiragana_to_katakana, script_of};

/// Dictionary-assisted tokenizer that falls back to script boundaries
///
/// At each position the longest dictionary entry wins; otherwise a run of
/// characters of the same script becomes one token, ending early where a
/// dictionary entry starts. Kana runs read as themselves, unknown kanji runs
/// get no reading.
#[derive(Debug, Default)]
pub struct ScriptTokenizer {
    dictionary: ReadingDictionary,
    initialized: bool,
}

impl ScriptTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, text: &str) -> String {
        text.nfkc().collect()
    }

    fn split(&self, text: &str) -> Vec<Token> {
        let chars: Vec<char> = self.normalize(text).chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let script = script_of(chars[i]);
            if script == Script::Whitespace {
                i += 1;
                continue;
            }

            if let Some((len, entry)) = self.dictionary.longest_match(&chars, i) {
                let surface: String = chars[i..i + len].iter().collect();
                tokens.push(Token {
                    surface,
                    reading: entry.reading.clone(),
                    base_form: entry.base_form.clone(),
                    part_of_speech: entry.part_of_speech.clone(),
                    confidence: 1.0,
                    ..Default::default()
                });
                i += len;
                continue;
            }

            let mut end = i + 1;
            // punctuation stays one char per token
            if script != Script::Punctuation {
                while end < chars.len()
                    && script_of(chars[end]) == script
                    && self.dictionary.longest_match(&chars, end).is_none()
                {
                    end += 1;
                }
            }

            let surface: String = chars[i..end].iter().collect();
            tokens.push(fallback_token(surface, script));
            i = end;
        }

        tokens
    }
}

fn fallback_token(surface: String, script: Script) -> Token {
    let (reading, pos) = match script {
        Script::Hiragana | Script::Katakana => (hiragana_to_katakana(&surface), "仮名"),
        Script::Kanji => (String::new(), "漢字"),
        Script::Digit => (surface.clone(), "数"),
        Script::Latin => (surface.clone(), "ローマ字"),
        Script::Punctuation => (surface.clone(), "記号"),
        Script::Whitespace | Script::Other => (String::new(), "その他"),
    };

    Token {
        base_form: surface.clone(),
        surface,
        reading,
        part_of_speech: pos.to_string(),
        confidence: 0.5,
        ..Default::default()
    }
}

impl Tokenizer for ScriptTokenizer {
    fn initialize(&mut self, dictionary_path: &str) -> Result<(), TokenizeError> {
        let mut dictionary = ReadingDictionary::with_defaults();
        if !dictionary_path.is_empty() {
            let extra = ReadingDictionary::load_from_file(Path::new(dictionary_path))
                .map_err(|e| TokenizeError::Dictionary(format!("{dictionary_path}: {e}")))?;
            dictionary.merge(extra);
        }

        self.dictionary = dictionary;
        self.initialized = true;
        Ok(())
    }

    fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizeError> {
        if !self.initialized {
            return Err(TokenizeError::NotInitialized);
        }
        Ok(self.split(text))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> ScriptTokenizer {
        let mut tokenizer = ScriptTokenizer::new();
        tokenizer.initialize("").unwrap();
        tokenizer
    }

    fn surfaces(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.surface.as_str()).collect()
    }

    #[test]
    fn dictionary_words_and_particles() {
        let tokens = tokenizer().tokenize("京都へ").unwrap();
        assert_eq!(surfaces(&tokens), ["京都", "へ"]);
        assert_eq!(tokens[0].reading, "キョウト");
        assert_eq!(tokens[1].part_of_speech, "助詞");
    }

    #[test]
    fn script_runs_for_unknown_text() {
        let tokens = tokenizer().tokenize("魔法使いがコーヒー、ABC 123！").unwrap();
        assert_eq!(
            surfaces(&tokens),
            ["魔法使", "い", "が", "コーヒー", "、", "ABC", "123", "!"]
        );
        assert_eq!(tokens[0].reading, "");
        assert_eq!(tokens[3].reading, "コーヒー");
    }

    #[test]
    fn half_width_is_normalized() {
        let tokens = tokenizer().tokenize("ｶﾀｶﾅ").unwrap();
        assert_eq!(surfaces(&tokens), ["カタカナ"]);
    }

    #[test]
    fn requires_initialize() {
        let tokenizer = ScriptTokenizer::new();
        assert!(matches!(
            tokenizer.tokenize("京都"),
            Err(TokenizeError::NotInitialized)
        ));
    }
}
