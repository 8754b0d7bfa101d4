use yomi_config::assembler::AssemblerConfig;
use yomi_lang_japanese::script::{CJK_START, contains_cjk, is_kana, is_punctuation};
use yomi_types::{Rect, TextSegment};

/// Segment that survived filtering, alive for one assembly pass
#[derive(Debug, Clone)]
struct NormalizedSegment {
    text: String,
    bbox: Rect,
    confidence: f32,
}

impl NormalizedSegment {
    fn baseline(&self) -> i32 {
        self.bbox.bottom()
    }
}

/// A released sentence and the segments behind it
///
/// `segments` are the filtered, ruby-free segments of the kept lines in
/// reading order, so their characters line up with `text` once whitespace
/// is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub text: String,
    pub segments: Vec<TextSegment>,
}

/// Turns noisy per-frame OCR snapshots into stable sentences
///
/// A candidate is released only after it was seen on `required_hits`
/// consecutive polls and is neither the last published sentence nor the one
/// currently being tokenized.
#[derive(Debug)]
pub struct SentenceAssembler {
    config: AssemblerConfig,
    required_hits: u32,
    pending: String,
    pending_hits: u32,
    last_published: String,
    in_flight: String,
}

impl SentenceAssembler {
    pub fn new(config: AssemblerConfig, required_hits: u32) -> Self {
        Self {
            config,
            required_hits: required_hits.max(1),
            pending: String::new(),
            pending_hits: 0,
            last_published: String::new(),
            in_flight: String::new(),
        }
    }

    pub fn set_required_hits(&mut self, required_hits: u32) {
        self.required_hits = required_hits.max(1);
    }

    pub fn required_hits(&self) -> u32 {
        self.required_hits
    }

    pub fn pending_hits(&self) -> u32 {
        self.pending_hits
    }

    pub fn last_published(&self) -> &str {
        &self.last_published
    }

    pub fn in_flight(&self) -> &str {
        &self.in_flight
    }

    pub fn reset(&mut self) {
        self.clear_pending();
        self.last_published.clear();
        self.in_flight.clear();
    }

    /// Feed one poll's worth of segments, returns a sentence ready to tokenize
    pub fn try_assemble(&mut self, segments: &[TextSegment]) -> Option<Assembled> {
        let Some(assembled) = self.assemble(segments) else {
            self.clear_pending();
            return None;
        };

        if assembled.text == self.last_published || assembled.text == self.in_flight {
            self.clear_pending();
            return None;
        }

        if assembled.text == self.pending {
            self.pending_hits += 1;
        } else {
            self.pending = assembled.text.clone();
            self.pending_hits = 1;
        }

        if self.pending_hits < self.required_hits {
            return None;
        }

        self.clear_pending();
        Some(assembled)
    }

    pub fn mark_in_flight(&mut self, text: &str) {
        self.in_flight = text.to_string();
    }

    /// Only clears if `text` is still the in-flight sentence
    pub fn clear_in_flight(&mut self, text: &str) {
        if self.in_flight == text {
            self.in_flight.clear();
        }
    }

    pub fn mark_published(&mut self, text: &str) {
        self.last_published = text.to_string();
    }

    /// Candidate sentence for `segments` without touching the stability state
    pub fn candidate(&self, segments: &[TextSegment]) -> Option<String> {
        self.assemble(segments).map(|assembled| assembled.text)
    }

    /// Candidate plus the segments it was built from, stability state untouched
    pub fn assemble(&self, segments: &[TextSegment]) -> Option<Assembled> {
        let mut normalized = self.normalize(segments);
        if normalized.is_empty() {
            return None;
        }
        self.build_lines(&mut normalized)
            .filter(|assembled| !assembled.text.is_empty())
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_hits = 0;
    }

    fn normalize(&self, segments: &[TextSegment]) -> Vec<NormalizedSegment> {
        let kept: Vec<NormalizedSegment> = segments
            .iter()
            .filter(|s| s.confidence >= self.config.min_confidence)
            .filter(|s| i64::from(s.bbox.width) * i64::from(s.bbox.height) >= self.config.min_area)
            .filter_map(|s| {
                let text = s.text.trim();
                (!text.is_empty()).then(|| NormalizedSegment {
                    text: text.to_string(),
                    bbox: s.bbox,
                    confidence: s.confidence,
                })
            })
            .collect();

        if kept.is_empty() {
            return kept;
        }

        let avg_height = average_height(&kept);
        let survivors: Vec<NormalizedSegment> = kept
            .iter()
            .enumerate()
            .filter(|(index, segment)| !self.looks_like_ruby(*index, segment, &kept, avg_height))
            .map(|(_, segment)| segment.clone())
            .collect();

        let dropped = kept.len() - survivors.len();
        if dropped > 0 {
            tracing::debug!("[PIPELINE] Dropped {} ruby-like segments", dropped);
        }
        survivors
    }

    fn looks_like_ruby(
        &self,
        index: usize,
        candidate: &NormalizedSegment,
        references: &[NormalizedSegment],
        avg_height: i32,
    ) -> bool {
        let char_count = candidate.text.chars().count();
        if char_count == 0 || char_count > self.config.ruby_max_chars {
            return false;
        }

        let max_height = 8.max((f64::from(avg_height) * self.config.ruby_height_ratio) as i32);
        if candidate.bbox.height >= max_height {
            return false;
        }

        if !candidate.text.chars().all(is_kana) {
            return false;
        }

        let center_x = candidate.bbox.center_x();
        let padding = self.config.ruby_center_padding;

        references
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .any(|(_, base)| {
                if !self.overlaps_horizontally(candidate.bbox, base.bbox) {
                    return false;
                }

                let lift = 4.max(base.bbox.height / 3);
                let sits_above = candidate.baseline() <= base.baseline() - lift;

                let width = f64::from(base.bbox.width);
                let near_center = f64::from(center_x) >= f64::from(base.bbox.x) - width * padding
                    && f64::from(center_x) <= f64::from(base.bbox.x) + width * (1.0 + padding);

                sits_above && near_center
            })
    }

    fn overlaps_horizontally(&self, a: Rect, b: Rect) -> bool {
        let overlap = a.right().min(b.right()) - a.x.max(b.x);
        overlap > 0
            && f64::from(overlap) >= f64::from(a.width.min(b.width)) * self.config.ruby_min_overlap
    }

    fn build_lines(&self, segments: &mut [NormalizedSegment]) -> Option<Assembled> {
        let avg_height = average_height(segments);
        let tolerance = self
            .config
            .line_gap_tolerance
            .max((f64::from(avg_height) * self.config.line_height_ratio) as i32);

        segments.sort_by(|a, b| {
            a.bbox
                .center_y()
                .cmp(&b.bbox.center_y())
                .then(a.bbox.x.cmp(&b.bbox.x))
        });

        let mut lines: Vec<Line> = Vec::new();
        let mut current = Line::default();
        let mut current_center = 0;

        for segment in segments.iter() {
            let center = segment.bbox.center_y();
            if current.members.is_empty() {
                current.push(segment, false);
                current_center = center;
                continue;
            }

            if (center - current_center).abs() > tolerance {
                lines.push(std::mem::take(&mut current));
                current.push(segment, false);
                current_center = center;
                continue;
            }

            let spaced = needs_space(&current.text, &segment.text);
            current.push(segment, spaced);
            current_center = (current_center + center) / 2;
        }

        if !current.members.is_empty() {
            lines.push(current);
        }

        let kept: Vec<Line> = lines
            .into_iter()
            .filter(|line| !line.text.trim().is_empty())
            // short latin fragments are almost always noise
            .filter(|line| line.text.trim().chars().count() > 2 || contains_cjk(&line.text))
            .collect();

        if kept.is_empty() {
            return None;
        }

        let texts: Vec<&str> = kept.iter().map(|line| line.text.trim()).collect();
        let combined = texts.join("\n").trim().to_string();
        if combined.chars().count() <= 1 && segments.len() > 1 {
            let detail: Vec<String> = segments
                .iter()
                .map(|s| {
                    format!(
                        "{} ({},{} {}x{})",
                        s.text, s.bbox.x, s.bbox.y, s.bbox.width, s.bbox.height
                    )
                })
                .collect();
            tracing::debug!(
                "[PIPELINE] {} segments collapsed to one character: {}",
                segments.len(),
                detail.join("; ")
            );
        }

        let layout = kept.into_iter().flat_map(|line| line.members).collect();
        Some(Assembled {
            text: combined,
            segments: layout,
        })
    }
}

/// One text line while grouping, with the segments in reading order
#[derive(Debug, Default)]
struct Line {
    text: String,
    members: Vec<TextSegment>,
}

impl Line {
    fn push(&mut self, segment: &NormalizedSegment, spaced: bool) {
        if spaced {
            self.text.push(' ');
        }
        self.text.push_str(&segment.text);
        self.members
            .push(TextSegment::new(segment.text.clone(), segment.bbox, segment.confidence));
    }
}

fn average_height(segments: &[NormalizedSegment]) -> i32 {
    let total: i64 = segments.iter().map(|s| i64::from(s.bbox.height)).sum();
    let count = segments.len().max(1) as i64;
    ((total / count) as i32).max(1)
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation() || is_punctuation(c)
}

/// Space between two pieces of the same line, only for non-CJK text
fn needs_space(left: &str, right: &str) -> bool {
    let (Some(last), Some(first)) = (left.chars().last(), right.chars().next()) else {
        return false;
    };
    if is_boundary(last) || is_boundary(first) {
        return false;
    }

    let has_latin = |text: &str| text.chars().any(|c| !c.is_whitespace() && c < CJK_START);
    has_latin(left) && has_latin(right)
}
