//! Sentence-aware chunking of extracted text.
//!
//! The chunker turns an ordered list of extracted segments (pages, EPUB
//! items, a whole TXT file) into bounded chunks, preferring to cut right
//! after sentence-terminal punctuation. All lengths are in characters.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::util::char_len;

/// Preferred cut points: a chunk should end right after one of these.
pub const SENTENCE_END_PUNCTUATION: [char; 7] = ['。', '！', '？', '…', '.', '!', '?'];

/// Fallback cut points for over-long lines without sentence ends.
pub const SECONDARY_PUNCTUATION: [char; 7] = [',', '，', ';', '；', ':', '：', ' '];

/// One unit of translation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position; defines reassembly order
    pub index: usize,
    pub content: String,
}

impl Chunk {
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
        }
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.content)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {} ({} chars)", self.index + 1, self.char_len())
    }
}

/// Whether a line ends (ignoring trailing whitespace) with sentence-terminal punctuation.
pub fn is_sentence_end(line: &str) -> bool {
    line.trim_end()
        .chars()
        .next_back()
        .is_some_and(|c| SENTENCE_END_PUNCTUATION.contains(&c))
}

/// Byte offset just past the last char in `window` matching `set`.
fn last_cut_after(window: &str, set: &[char]) -> Option<usize> {
    window
        .char_indices()
        .rev()
        .find(|(_, c)| set.contains(c))
        .map(|(i, c)| i + c.len_utf8())
}

/// Splits text into chunks of at most `chunk_size` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    min_chunk_size: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, min_chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid("chunk_size", "must be at least 1"));
        }
        if min_chunk_size > chunk_size {
            return Err(Error::invalid(
                "min_chunk_size",
                format!("{min_chunk_size} exceeds chunk_size {chunk_size}"),
            ));
        }
        debug!("Chunker: chunk_size={}, min_chunk_size={}", chunk_size, min_chunk_size);
        Ok(Self {
            chunk_size,
            min_chunk_size,
        })
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    /// Join the non-blank segments with newlines and split the result.
    pub fn split_segments<S: AsRef<str>>(&self, segments: &[S]) -> Vec<String> {
        let joined = segments
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.split_text(&joined)
    }

    /// Like [`split_segments`](Self::split_segments), with chunk indices assigned.
    pub fn chunk_segments<S: AsRef<str>>(&self, segments: &[S]) -> Vec<Chunk> {
        self.split_segments(segments)
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk { index, content })
            .collect()
    }

    /// Split one text stream into chunks.
    ///
    /// Rows (lines) are accumulated until the next one would overflow
    /// `chunk_size`. At that point the buffer is cut after its last
    /// sentence-ending row, provided the head is at least `min_chunk_size`
    /// long and the carried remainder still leaves room for the incoming
    /// row; otherwise the whole buffer is emitted. A final tail shorter than
    /// `min_chunk_size` is folded into the previous chunk.
    pub fn split_text(&self, content: &str) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }
        if char_len(content) <= self.chunk_size {
            return vec![content.to_string()];
        }

        let rows: Vec<&str> = content
            .split('\n')
            .flat_map(|row| self.split_long_line(row))
            .collect();

        let mut chunks: Vec<String> = Vec::new();
        let mut buffer = RowBuffer::default();

        for row in rows {
            let row_len = char_len(row);
            if !buffer.is_empty() && buffer.len_with(row_len) > self.chunk_size {
                // Blank rows never force a cut
                if row.trim().is_empty() {
                    continue;
                }
                if buffer.is_blank() {
                    buffer.clear();
                } else {
                    match buffer.sentence_cut(row_len, self.chunk_size, self.min_chunk_size) {
                        Some(head) => push_chunk(&mut chunks, head),
                        None => push_chunk(&mut chunks, buffer.take_all()),
                    }
                }
            }
            buffer.push(row, row_len);
        }

        if !buffer.is_empty() {
            let tail = buffer.take_all();
            if char_len(&tail) < self.min_chunk_size
                && let Some(last) = chunks.last_mut()
            {
                if !tail.trim().is_empty() {
                    last.push('\n');
                    last.push_str(&tail);
                }
            } else {
                push_chunk(&mut chunks, tail);
            }
        }

        debug!("Split {} chars into {} chunks", char_len(content), chunks.len());
        chunks
    }

    /// Pre-split a single line longer than `chunk_size`.
    ///
    /// Cuts after the last sentence-terminal mark within the first
    /// `chunk_size` characters, else after the last secondary mark, else
    /// exactly at `chunk_size`. Leading whitespace of each piece is dropped,
    /// so no piece is blank.
    pub fn split_long_line<'a>(&self, line: &'a str) -> Vec<&'a str> {
        if char_len(line) <= self.chunk_size {
            return vec![line];
        }

        let mut pieces = Vec::new();
        let mut remaining = line.trim_start();

        while let Some((window_end, _)) = remaining.char_indices().nth(self.chunk_size) {
            let window = &remaining[..window_end];
            let cut = last_cut_after(window, &SENTENCE_END_PUNCTUATION)
                .or_else(|| last_cut_after(window, &SECONDARY_PUNCTUATION));

            if let Some(cut) = cut {
                pieces.push(&remaining[..cut]);
                remaining = remaining[cut..].trim_start();
            } else {
                warn!(
                    "No break point in {} chars, forcing a cut at {}",
                    char_len(remaining),
                    self.chunk_size
                );
                pieces.push(window);
                remaining = remaining[window_end..].trim_start();
            }
        }

        if !remaining.trim().is_empty() {
            pieces.push(remaining);
        }
        pieces
    }
}

fn push_chunk(chunks: &mut Vec<String>, chunk: String) {
    if !chunk.trim().is_empty() {
        chunks.push(chunk);
    }
}

/// Pending rows of the chunk being built.
#[derive(Default)]
struct RowBuffer<'a> {
    rows: Vec<(&'a str, usize)>,
    /// Joined length in chars: row lengths plus separating newlines
    len: usize,
    /// Position of the most recent row ending a sentence
    last_sentence_end: Option<usize>,
}

impl<'a> RowBuffer<'a> {
    const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn is_blank(&self) -> bool {
        self.rows.iter().all(|(row, _)| row.trim().is_empty())
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    /// Joined length if a row of `row_len` chars were appended.
    const fn len_with(&self, row_len: usize) -> usize {
        if self.rows.is_empty() {
            row_len
        } else {
            self.len + 1 + row_len
        }
    }

    fn push(&mut self, row: &'a str, row_len: usize) {
        self.len = self.len_with(row_len);
        if is_sentence_end(row) {
            self.last_sentence_end = Some(self.rows.len());
        }
        self.rows.push((row, row_len));
    }

    /// Emit rows up to the last sentence end, keeping the rest buffered.
    fn sentence_cut(&mut self, incoming: usize, max: usize, min: usize) -> Option<String> {
        let end = self.last_sentence_end?;
        let head_len = joined_len(&self.rows[..=end]);
        let rest = &self.rows[end + 1..];
        let rest_len = if rest.is_empty() {
            incoming
        } else {
            joined_len(rest) + 1 + incoming
        };
        if head_len < min || rest_len > max {
            return None;
        }

        let head = join_rows(&self.rows[..=end]);
        self.rows.drain(..=end);
        self.len = joined_len(&self.rows);
        self.last_sentence_end = self.rows.iter().rposition(|(row, _)| is_sentence_end(row));
        Some(head)
    }

    fn take_all(&mut self) -> String {
        let text = join_rows(&self.rows);
        self.rows.clear();
        self.len = 0;
        self.last_sentence_end = None;
        text
    }
}

fn joined_len(rows: &[(&str, usize)]) -> usize {
    rows.iter().map(|(_, len)| len).sum::<usize>() + rows.len().saturating_sub(1)
}

fn join_rows(rows: &[(&str, usize)]) -> String {
    rows.iter().map(|(row, _)| *row).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max: usize, min: usize) -> Chunker {
        Chunker::new(max, min).unwrap()
    }

    fn non_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_rejects_min_above_max() {
        assert!(Chunker::new(100, 200).is_err());
        assert!(Chunker::new(0, 0).is_err());
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let c = chunker(100, 10);
        assert!(c.split_segments::<&str>(&[]).is_empty());
        assert!(c.split_segments(&["", "   ", "\n"]).is_empty());
    }

    #[test]
    fn test_small_content_is_single_chunk() {
        let c = chunker(1000, 100);
        let chunks = c.split_segments(&["短文本1", "短文本2"]);
        assert_eq!(chunks, vec!["短文本1\n短文本2".to_string()]);
    }

    #[test]
    fn test_blank_segments_are_skipped() {
        let c = chunker(1000, 100);
        let chunks = c.split_segments(&["a.", "", "  ", "b."]);
        assert_eq!(chunks, vec!["a.\nb.".to_string()]);
    }

    #[test]
    fn test_is_sentence_end() {
        assert!(is_sentence_end("这是一句话。"));
        assert!(is_sentence_end("Done!  "));
        assert!(is_sentence_end("Wait…"));
        assert!(!is_sentence_end("no end,"));
        assert!(!is_sentence_end(""));
    }

    #[test]
    fn test_long_line_cuts_after_sentence_end() {
        let c = chunker(100, 50);
        let line = "这是一个很长的句子。".repeat(20);
        let pieces = c.split_long_line(&line);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(char_len(piece) <= 100);
            assert!(piece.ends_with('。'));
        }
        assert_eq!(pieces.concat(), line);
    }

    #[test]
    fn test_long_line_falls_back_to_secondary_punctuation() {
        let c = chunker(10, 0);
        let pieces = c.split_long_line("aaaa,bbbbbbb,ccccc");
        assert_eq!(pieces, vec!["aaaa,", "bbbbbbb,", "ccccc"]);
    }

    #[test]
    fn test_long_line_strips_leading_whitespace_after_cut() {
        let c = chunker(10, 0);
        let pieces = c.split_long_line("abcdefgh.   ijklmnop");
        assert_eq!(pieces, vec!["abcdefgh.", "ijklmnop"]);
    }

    #[test]
    fn test_long_line_without_break_points_is_forced() {
        let c = chunker(4, 0);
        let pieces = c.split_long_line("一二三四五六七八九");
        assert_eq!(pieces, vec!["一二三四", "五六七八", "九"]);
    }

    #[test]
    fn test_accumulation_prefers_sentence_end_rows() {
        let c = chunker(20, 5);
        // Row "ccccc" carries over because the cut happens after the sentence-ending row.
        let text = "aaaaaaaaa.\nccccc\ndddddddddd";
        let chunks = c.split_text(text);
        assert_eq!(chunks, vec!["aaaaaaaaa.".to_string(), "ccccc\ndddddddddd".to_string()]);
    }

    #[test]
    fn test_accumulation_cuts_at_buffer_without_sentence_end() {
        let c = chunker(12, 2);
        let chunks = c.split_text("aaaaa\nbbbbb\nccccc\nddddd");
        assert_eq!(chunks, vec!["aaaaa\nbbbbb".to_string(), "ccccc\nddddd".to_string()]);
    }

    #[test]
    fn test_sentence_cut_deferred_when_head_too_short() {
        let c = chunker(20, 8);
        // "ab." is shorter than min_chunk_size, so the whole buffer is emitted instead.
        let chunks = c.split_text("ab.\nccccccccccc\nddddddddddddd");
        assert_eq!(chunks[0], "ab.\nccccccccccc");
    }

    #[test]
    fn test_short_tail_merges_into_previous() {
        let c = chunker(20, 5);
        let chunks = c.split_text("aaaaaaaaaaaaaaaaaa.\nbbbbbbbbbbbbbbbbbb.\ncc");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].ends_with("\ncc"));
    }

    #[test]
    fn test_scenario_9500_chars() {
        let sentence = format!("{}。", "句".repeat(149));
        let mut text = sentence.repeat(63);
        text.push_str(&format!("{}。", "尾".repeat(49)));
        assert_eq!(char_len(&text), 9500);

        let chunks = chunker(2000, 500).split_text(&text);
        assert_eq!(chunks.len(), 5);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 2000);
            assert!(chunk.ends_with('。'));
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_no_punctuation_anywhere_loses_nothing() {
        let c = chunker(50, 10);
        let text = "x".repeat(333);
        let chunks = c.split_text(&text);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|ch| char_len(ch) <= 50 || ch == chunks.last().unwrap()));
    }

    #[test]
    fn test_mixed_document_properties() {
        let c = chunker(120, 30);
        let mut segments = Vec::new();
        for page in 0..12 {
            let mut page_text = String::new();
            for line in 0..(page % 5 + 2) {
                let words = "word ".repeat((page * 7 + line * 3) % 19 + 1);
                let end = if line % 2 == 0 { "." } else { "," };
                page_text.push_str(&format!("{words}{end}\n"));
            }
            segments.push(page_text);
        }
        let chunks = c.split_segments(&segments);
        let joined: String = segments.concat();
        assert_eq!(non_ws(&chunks.concat()), non_ws(&joined));

        let (last, body) = chunks.split_last().unwrap();
        for chunk in body {
            assert!(char_len(chunk) <= 120, "oversized chunk: {chunk:?}");
        }
        assert!(char_len(last) <= 120 + 30);
        for pair in body.windows(2) {
            assert!(char_len(&pair[0]) + 1 + char_len(&pair[1]) > 120);
        }
    }

    #[test]
    fn test_long_line_never_yields_blank_pieces() {
        let c = chunker(3, 0);
        assert_eq!(c.split_long_line("   .aa."), vec![".", "aa."]);
        assert_eq!(c.split_long_line("abc   "), vec!["abc"]);
    }

    #[test]
    fn test_whitespace_rows_do_not_split_mergeable_chunks() {
        let c = chunker(3, 1);
        assert_eq!(c.split_text(".\n   .aa."), vec![".\n.".to_string(), "aa.".to_string()]);
        assert_eq!(c.split_text(".\n  \n."), vec![".\n.".to_string()]);
        assert_eq!(c.split_text("  \n  \naa.\nbb."), vec!["aa.".to_string(), "bb.".to_string()]);
    }

    #[test]
    fn test_random_texts_keep_chunk_properties() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        const ALPHABET: [char; 6] = ['a', 'b', '.', ',', ' ', '\n'];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let max = rng.random_range(1..9);
            let min = rng.random_range(0..=max);
            let len = rng.random_range(0..40);
            let text: String = (0..len)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
                .collect();

            let chunks = chunker(max, min).split_text(&text);
            assert_eq!(non_ws(&chunks.concat()), non_ws(&text), "lost text in {text:?}");
            assert!(chunks.iter().all(|ch| !ch.trim().is_empty()), "blank chunk for {text:?}");
            if let Some((_, body)) = chunks.split_last() {
                assert!(body.iter().all(|ch| char_len(ch) <= max), "{text:?} -> {chunks:?}");
            }
            for pair in chunks.windows(2) {
                assert!(
                    char_len(&pair[0]) + 1 + char_len(&pair[1]) > max,
                    "mergeable chunks for {text:?} (max {max}): {chunks:?}"
                );
            }
        }
    }

    #[test]
    fn test_chunk_segments_assigns_indices() {
        let c = chunker(10, 0);
        let chunks = c.chunk_segments(&["aaaaaaaa.", "bbbbbbbb.", "cccccccc."]);
        let indices: Vec<usize> = chunks.iter().map(|ch| ch.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(chunks[2].content, "cccccccc.");
    }
}
