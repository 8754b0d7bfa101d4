//! Character classes used by OCR cleanup and furigana placement

/// First code point of the CJK radicals block; everything from here up is
/// treated as CJK text that is written without spaces.
pub const CJK_START: char = '\u{2E80}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Hiragana,
    Katakana,
    Kanji,
    Latin,
    Digit,
    Punctuation,
    Whitespace,
    Other,
}

pub fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

/// Full-width katakana plus the half-width block
pub fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c) || ('\u{FF66}'..='\u{FF9D}').contains(&c)
}

pub fn is_kana(c: char) -> bool {
    is_hiragana(c) || is_katakana(c)
}

pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{F900}'..='\u{FAFF}').contains(&c)
}

pub fn is_cjk(c: char) -> bool {
    c >= CJK_START
}

/// ASCII and CJK punctuation, including full-width forms
pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || ('\u{3000}'..='\u{303F}').contains(&c)
        || ('\u{FF01}'..='\u{FF0F}').contains(&c)
        || ('\u{FF1A}'..='\u{FF20}').contains(&c)
        || ('\u{FF3B}'..='\u{FF40}').contains(&c)
        || ('\u{FF5B}'..='\u{FF65}').contains(&c)
        || matches!(c, '…' | '‥' | '・' | '“' | '”' | '‘' | '’')
}

pub fn contains_kanji(text: &str) -> bool {
    text.chars().any(is_kanji)
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

pub fn script_of(c: char) -> Script {
    if c.is_whitespace() {
        Script::Whitespace
    } else if is_hiragana(c) && c != 'ゝ' && c != 'ゞ' {
        Script::Hiragana
    } else if c == 'ー' || c == 'ｰ' || (is_katakana(c) && c != '・') {
        Script::Katakana
    } else if is_kanji(c) || c == '々' {
        Script::Kanji
    } else if c.is_ascii_digit() {
        Script::Digit
    } else if is_punctuation(c) {
        Script::Punctuation
    } else if c.is_alphabetic() && !is_cjk(c) {
        Script::Latin
    } else {
        Script::Other
    }
}

/// Katakana to hiragana, other characters untouched
pub fn katakana_to_hiragana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{30A1}'..='\u{30F6}' => char::from_u32(c as u32 - 0x60).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Hiragana to katakana, other characters untouched
pub fn hiragana_to_katakana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{3041}'..='\u{3096}' => char::from_u32(c as u32 + 0x60).unwrap_or(c),
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kana_classes() {
        assert!(is_kana('か'));
        assert!(is_kana('カ'));
        assert!(is_kana('ｶ'));
        assert!(!is_kana('漢'));
        assert!(!is_kana('a'));
    }

    #[test]
    fn kanji_and_cjk() {
        assert!(contains_kanji("京都へ"));
        assert!(!contains_kanji("ひらがな"));
        assert!(contains_cjk("abcへ"));
        assert!(!contains_cjk("abc, def"));
    }

    #[test]
    fn kana_conversion() {
        assert_eq!(katakana_to_hiragana("キョウト"), "きょうと");
        assert_eq!(katakana_to_hiragana("ラーメン"), "らーめん");
        assert_eq!(hiragana_to_katakana("へ"), "ヘ");
    }

    #[test]
    fn scripts() {
        assert_eq!(script_of('京'), Script::Kanji);
        assert_eq!(script_of('々'), Script::Kanji);
        assert_eq!(script_of('ー'), Script::Katakana);
        assert_eq!(script_of('。'), Script::Punctuation);
        assert_eq!(script_of('7'), Script::Digit);
        assert_eq!(script_of('x'), Script::Latin);
    }
}
