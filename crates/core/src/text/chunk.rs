//! Re-packing of over-long sentences into bounded chunks.

/// A bounded-length unit of text sent to the synthesizer in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceChunk {
    /// Position in synthesis order.
    pub index: usize,
    pub text: String,
}

/// Turn segmented sentences into ordered chunks of at most `max_len` chars.
///
/// Sentences within the limit pass through. Longer ones are greedily packed
/// on word boundaries. Blank results are dropped before indexing.
pub fn chunk_sentences<S: AsRef<str>>(sentences: &[S], max_len: usize) -> Vec<SentenceChunk> {
    sentences
        .iter()
        .flat_map(|sentence| {
            let sentence = sentence.as_ref().trim();
            if sentence.chars().count() > max_len {
                split_long_sentence(sentence, max_len)
            } else {
                vec![sentence.to_string()]
            }
        })
        .filter(|text| !text.trim().is_empty())
        .enumerate()
        .map(|(index, text)| SentenceChunk { index, text })
        .collect()
}

/// Greedy word packing. A single word longer than `max_len` becomes a
/// chunk of its own rather than being cut.
pub fn split_long_sentence(sentence: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        let candidate = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if candidate <= max_len || current.is_empty() {
            current.push(word);
            current_len = candidate;
        } else {
            chunks.push(current.join(" "));
            current = vec![word];
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = "Дорогая Мария Ивановна поздравляем вас с юбилеем и желаем \
                        крепкого здоровья долгих лет жизни и всего самого наилучшего";

    #[test]
    fn test_short_sentences_pass_through() {
        let chunks = chunk_sentences(&["Привет.", "Как дела?"], 180);
        assert_eq!(
            chunks,
            vec![
                SentenceChunk { index: 0, text: "Привет.".into() },
                SentenceChunk { index: 1, text: "Как дела?".into() },
            ]
        );
    }

    #[test]
    fn test_long_sentence_respects_limit() {
        let chunks = split_long_sentence(LONG, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "{:?}", chunk);
        }
    }

    #[test]
    fn test_chunks_never_split_words() {
        for max_len in [5, 12, 30, 60] {
            let chunks = chunk_sentences(&[LONG], max_len);
            let rejoined = chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let original: Vec<&str> = LONG.split_whitespace().collect();
            let roundtrip: Vec<&str> = rejoined.split_whitespace().collect();
            assert_eq!(roundtrip, original, "max_len={}", max_len);
        }
    }

    #[test]
    fn test_oversized_word_is_own_chunk() {
        let chunks = split_long_sentence("a supercalifragilistic b", 5);
        assert_eq!(chunks, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_limit_counts_chars_not_bytes() {
        // 10 Cyrillic chars are 20 bytes
        let chunks = chunk_sentences(&["абвгд еёжзи"], 11);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_blank_sentences_dropped_and_reindexed() {
        let chunks = chunk_sentences(&["  ", "one", "", "two"], 180);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1], SentenceChunk { index: 1, text: "two".into() });
    }

    #[test]
    fn test_order_preserved_across_split() {
        let chunks = chunk_sentences(&["Первое.", LONG, "Последнее."], 40);
        assert_eq!(chunks.first().map(|c| c.text.as_str()), Some("Первое."));
        assert_eq!(chunks.last().map(|c| c.text.as_str()), Some("Последнее."));
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }
}
