//! Whitespace-aware text chunking for ingestion

/// Split `text` into chunks of at most `chunk_size` chars.
///
/// Chunks break on whitespace; the trailing words of one chunk (up to
/// `overlap` chars) are repeated at the start of the next. Words longer than
/// `chunk_size` are split hard. Overlap is capped at half the chunk size.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size / 2);

    let mut words: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        if word.chars().count() <= chunk_size {
            words.push(word.to_string());
        } else {
            let chars: Vec<char> = word.chars().collect();
            words.extend(chars.chunks(chunk_size).map(|c| c.iter().collect()));
        }
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in &words {
        let word_len = word.chars().count();

        if !current.is_empty() && joined_len(&current) + 1 + word_len > chunk_size {
            chunks.push(current.join(" "));
            current = carry_over(&current, overlap);

            while !current.is_empty() && joined_len(&current) + 1 + word_len > chunk_size {
                current.remove(0);
            }
        }

        current.push(word);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Length of `words` joined by single spaces
fn joined_len(words: &[&str]) -> usize {
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}

fn carry_over<'a>(words: &[&'a str], overlap: usize) -> Vec<&'a str> {
    let mut carry = Vec::new();
    for word in words.iter().rev() {
        carry.insert(0, *word);
        if joined_len(&carry) > overlap {
            carry.remove(0);
            break;
        }
    }
    carry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(chunk_text("check the battery", 100, 10), vec!["check the battery"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("   \n ", 100, 10).is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunk_text(text, 15, 0);

        assert!(chunks.iter().all(|c| c.chars().count() <= 15));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_overlap_repeats_trailing_words() {
        let chunks = chunk_text("aaa bbb ccc ddd eee", 11, 4);

        assert_eq!(chunks[0], "aaa bbb ccc");
        assert!(chunks[1].starts_with("ccc"));
        assert!(chunks.iter().all(|c| c.chars().count() <= 11));
    }

    #[test]
    fn test_long_word_split_hard() {
        let chunks = chunk_text("abcdefghij", 4, 0);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }
}
