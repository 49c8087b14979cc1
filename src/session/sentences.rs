//! Sentence splitting for sentence-at-a-time speech.

/// Closing quotes and brackets that may follow terminal punctuation.
const CLOSERS: &[char] = &['"', '\'', ')', '\u{201d}'];

/// Find the position of a sentence-ending character (`.`, `!`, `?`, `\n`).
///
/// Punctuation only counts when followed by whitespace or end of text
/// (after any closing quotes), so decimals like `1.5` stay intact.
/// Returns the byte index and the boundary character.
fn find_sentence_boundary(text: &str) -> Option<(usize, char)> {
    for (i, c) in text.char_indices() {
        if c == '\n' {
            return Some((i, c));
        }
        if matches!(c, '.' | '!' | '?') {
            let rest = text[i + c.len_utf8()..].trim_start_matches(CLOSERS);
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Some((i, c));
            }
        }
    }
    None
}

/// Split a reply into sentence-sized units for the speech output.
///
/// Runs of closing punctuation (`?!`, `...`) and closing quotes stay with
/// their sentence. Empty units are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut rest = text;

    while let Some((pos, boundary)) = find_sentence_boundary(rest) {
        let mut end = pos + boundary.len_utf8();
        if boundary != '\n' {
            // Pull trailing punctuation and quotes into this sentence.
            end += rest[end..]
                .char_indices()
                .find(|&(_, c)| !matches!(c, '.' | '!' | '?') && !CLOSERS.contains(&c))
                .map_or(rest.len() - end, |(i, _)| i);
        }
        let sentence = rest[..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_owned());
        }
        rest = &rest[end..];
    }

    let remaining = rest.trim();
    if !remaining.is_empty() {
        sentences.push(remaining.to_owned());
    }
    sentences
}
