use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingEntry {
    /// Katakana
    pub reading: String,
    pub base_form: String,
    pub part_of_speech: String,
}

/// Surface form to reading lookup
#[derive(Debug, Default)]
pub struct ReadingDictionary {
    entries: HashMap<String, ReadingEntry>,
    longest: usize,
}

impl ReadingDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small built-in set of common words and particles
    pub fn with_defaults() -> Self {
        let mut dict = Self::new();

        let common = [
            ("京都", "キョウト", "名詞"),
            ("東京", "トウキョウ", "名詞"),
            ("大阪", "オオサカ", "名詞"),
            ("日本", "ニホン", "名詞"),
            ("日本語", "ニホンゴ", "名詞"),
            ("漢字", "カンジ", "名詞"),
            ("今日", "キョウ", "名詞"),
            ("明日", "アシタ", "名詞"),
            ("昨日", "キノウ", "名詞"),
            ("私", "ワタシ", "代名詞"),
            ("僕", "ボク", "代名詞"),
            ("彼", "カレ", "代名詞"),
            ("彼女", "カノジョ", "代名詞"),
            ("人", "ヒト", "名詞"),
            ("時間", "ジカン", "名詞"),
            ("世界", "セカイ", "名詞"),
            ("学校", "ガッコウ", "名詞"),
            ("先生", "センセイ", "名詞"),
            ("友達", "トモダチ", "名詞"),
            ("電車", "デンシャ", "名詞"),
            ("行く", "イク", "動詞"),
            ("来る", "クル", "動詞"),
            ("見る", "ミル", "動詞"),
            ("食べる", "タベル", "動詞"),
            ("読む", "ヨム", "動詞"),
            ("書く", "カク", "動詞"),
            ("話す", "ハナス", "動詞"),
            ("大きい", "オオキイ", "形容詞"),
            ("小さい", "チイサイ", "形容詞"),
            ("新しい", "アタラシイ", "形容詞"),
            ("は", "ハ", "助詞"),
            ("が", "ガ", "助詞"),
            ("を", "ヲ", "助詞"),
            ("に", "ニ", "助詞"),
            ("へ", "ヘ", "助詞"),
            ("で", "デ", "助詞"),
            ("と", "ト", "助詞"),
            ("の", "ノ", "助詞"),
            ("も", "モ", "助詞"),
            ("から", "カラ", "助詞"),
            ("まで", "マデ", "助詞"),
            ("ありがとう", "アリガトウ", "感動詞"),
        ];

        for (surface, reading, pos) in common {
            dict.insert(surface, reading, surface, pos);
        }

        dict
    }

    /// Load entries from a TSV file (`surface\treading[\tpart_of_speech[\tbase_form]]`)
    ///
    /// Blank lines, `#` comments and lines without a reading are skipped.
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let mut dict = Self::new();
        dict.extend_from_tsv(&content);
        tracing::info!(
            "Loaded {} readings from {}",
            dict.len(),
            path.display()
        );
        Ok(dict)
    }

    pub fn extend_from_tsv(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
                continue;
            }

            let pos = parts.get(2).copied().unwrap_or("");
            let base = parts.get(3).copied().unwrap_or(parts[0]);
            self.insert(parts[0], parts[1], base, pos);
        }
    }

    pub fn insert(&mut self, surface: &str, reading: &str, base_form: &str, part_of_speech: &str) {
        self.longest = self.longest.max(surface.chars().count());
        self.entries.insert(
            surface.to_string(),
            ReadingEntry {
                reading: reading.to_string(),
                base_form: base_form.to_string(),
                part_of_speech: part_of_speech.to_string(),
            },
        );
    }

    /// Entries of `other` override existing ones
    pub fn merge(&mut self, other: ReadingDictionary) {
        self.longest = self.longest.max(other.longest);
        self.entries.extend(other.entries);
    }

    pub fn get(&self, surface: &str) -> Option<&ReadingEntry> {
        self.entries.get(surface)
    }

    /// Longest entry starting at `chars[start]`, returns its length in chars
    pub fn longest_match(&self, chars: &[char], start: usize) -> Option<(usize, &ReadingEntry)> {
        let max = self.longest.min(chars.len().saturating_sub(start));
        (1..=max).rev().find_map(|len| {
            let surface: String = chars[start..start + len].iter().collect();
            self.entries.get(&surface).map(|entry| (len, entry))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
