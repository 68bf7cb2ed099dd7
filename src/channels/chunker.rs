//! Splits outgoing replies into transport-sized pieces.
//!
//! Boundaries are tried coarsest first: blank-line paragraphs, lines,
//! sentences, words, then a raw character cut. Limits count characters, not
//! bytes, and concatenating the output reproduces the input.

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

impl Boundary {
    fn finer(self) -> Self {
        match self {
            Self::Paragraph => Self::Line,
            Self::Line => Self::Sentence,
            Self::Sentence => Self::Word,
            Self::Word | Self::Char => Self::Char,
        }
    }

    /// Pieces keep their trailing delimiter.
    fn pieces(self, text: &str) -> Vec<&str> {
        match self {
            Self::Paragraph => text.split_inclusive("\n\n").collect(),
            Self::Line => text.split_inclusive('\n').collect(),
            Self::Sentence => sentences(text),
            Self::Word => text.split_inclusive(' ').collect(),
            Self::Char => vec![text],
        }
    }
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((_, ch)) = iter.next() {
        if matches!(ch, '.' | '!' | '?')
            && let Some(&(space_at, ' ')) = iter.peek()
        {
            let end = space_at + 1;
            out.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn cut_chars(text: &str, limit: usize, out: &mut Vec<String>) {
    let mut piece = String::new();
    let mut len = 0;
    for ch in text.chars() {
        if len == limit {
            out.push(std::mem::take(&mut piece));
            len = 0;
        }
        piece.push(ch);
        len += 1;
    }
    if !piece.is_empty() {
        out.push(piece);
    }
}

fn pack(text: &str, limit: usize, boundary: Boundary, out: &mut Vec<String>) {
    if text.is_empty() {
        return;
    }
    if char_len(text) <= limit {
        out.push(text.to_string());
        return;
    }
    if boundary == Boundary::Char {
        cut_chars(text, limit, out);
        return;
    }

    let pieces = boundary.pieces(text);
    if pieces.len() < 2 {
        pack(text, limit, boundary.finer(), out);
        return;
    }

    let mut buffer = String::new();
    let mut buffer_len = 0;
    for piece in pieces {
        let piece_len = char_len(piece);
        if piece_len > limit {
            if !buffer.is_empty() {
                out.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }
            pack(piece, limit, boundary.finer(), out);
        } else if buffer_len + piece_len <= limit {
            buffer.push_str(piece);
            buffer_len += piece_len;
        } else {
            out.push(std::mem::replace(&mut buffer, piece.to_string()));
            buffer_len = piece_len;
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
}

/// Split `text` into pieces of at most `limit` characters.
#[must_use]
pub fn split_for_transport(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() || limit == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    pack(text, limit, Boundary::Paragraph, &mut chunks);
    chunks
}

#[cfg(test)]
mod tests {
    use super::split_for_transport;

    fn assert_well_formed(text: &str, limit: usize) -> Vec<String> {
        let chunks = split_for_transport(text, limit);
        assert!(chunks.iter().all(|c| c.chars().count() <= limit), "{chunks:?}");
        assert_eq!(chunks.concat(), text);
        chunks
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(split_for_transport("", 10).is_empty());
        assert!(split_for_transport("hello", 0).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_for_transport("hello", 10), vec!["hello"]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "first paragraph\n\nsecond paragraph";
        let chunks = assert_well_formed(text, 20);
        assert_eq!(chunks, vec!["first paragraph\n\n", "second paragraph"]);
    }

    #[test]
    fn falls_back_to_sentences_then_words() {
        let text = "One short sentence. Then another one! And a verylongwordthatneverends here";
        assert_well_formed(text, 20);
    }

    #[test]
    fn hard_cuts_unbroken_text() {
        let text = "https://example.com/".repeat(10);
        let chunks = assert_well_formed(&text, 30);
        assert_eq!(chunks.len(), 7);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "日本語のテキストです";
        let chunks = assert_well_formed(text, 4);
        assert_eq!(chunks.len(), 3);
    }
}
