//! Sentence segmentation.
//!
//! Rule-based splitter: a sentence ends at terminal punctuation followed by
//! whitespace, unless the period belongs to a known abbreviation or an
//! initial, or the next word starts in lower case.

/// Sentence segmentation backend trait.
pub trait SentenceSegmenter: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Split `text` into ordered sentence-like units.
    fn segment(&self, text: &str, language: &str) -> Vec<String>;
}

/// Punctuation-and-abbreviation rules with per-language abbreviation lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSegmenter;

impl SentenceSegmenter for RuleSegmenter {
    fn name(&self) -> &str {
        "rules"
    }

    fn segment(&self, text: &str, language: &str) -> Vec<String> {
        split_sentences(text, language)
    }
}

const RU_ABBREVIATIONS: &[&str] = &[
    "г", "гг", "т.е", "т.д", "т.п", "т.к", "т.н", "др", "пр", "ул", "им", "стр",
    "см", "тыс", "млн", "млрд", "руб", "коп", "проф", "акад", "доц", "напр",
    "и.о", "св", "ок", "мин", "сек", "просп", "пер", "обл", "рис", "англ",
];

const EN_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e",
    "inc", "ltd", "co", "no", "fig", "approx", "dept", "est", "mt", "jan", "feb",
    "aug", "sept", "oct", "nov", "dec",
];

/// Abbreviations (lower case, final period stripped) for a language code.
pub fn abbreviations_for(language: &str) -> &'static [&'static str] {
    let lang = language.split(['-', '_']).next().unwrap_or("");
    match lang.to_ascii_lowercase().as_str() {
        "ru" => RU_ABBREVIATIONS,
        "en" => EN_ABBREVIATIONS,
        _ => &[],
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '»' | '”' | '’' | ')' | ']' | '}')
}

fn is_opener(c: char) -> bool {
    matches!(c, '"' | '\'' | '«' | '“' | '‘' | '(' | '[' | '{')
}

/// Split text into trimmed, non-empty sentences.
pub fn split_sentences(text: &str, language: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let abbreviations = abbreviations_for(language);
    let byte_at = |idx: usize| chars.get(idx).map(|&(b, _)| b).unwrap_or(text.len());

    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        if !is_terminal(chars[i].1) {
            i += 1;
            continue;
        }

        // Swallow the whole punctuation run, closing quotes included
        let mut j = i + 1;
        while j < chars.len() && (is_terminal(chars[j].1) || is_closer(chars[j].1)) {
            j += 1;
        }

        if j >= chars.len() || !chars[j].1.is_whitespace() {
            i = j;
            continue;
        }

        let strong = chars[i..j].iter().any(|&(_, c)| c == '!' || c == '?');
        let next = chars[j..]
            .iter()
            .map(|&(_, c)| c)
            .find(|c| !c.is_whitespace() && !is_opener(*c));
        let next_is_lower = next.map(|c| c.is_lowercase()).unwrap_or(false);

        let boundary = if strong {
            true
        } else {
            let token = token_before(text, start, byte_at(i));
            !next_is_lower && !is_abbreviation(&token, abbreviations) && !is_initial(&token)
        };

        if boundary {
            let end = byte_at(j);
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
        }
        i = j;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// The word immediately before byte offset `end`, openers stripped.
fn token_before(text: &str, floor: usize, end: usize) -> String {
    let before = &text[floor..end];
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("");
    word.trim_start_matches(is_opener).to_lowercase()
}

fn is_abbreviation(token: &str, abbreviations: &[&str]) -> bool {
    !token.is_empty() && abbreviations.contains(&token)
}

/// A lone letter, as in "А. С. Пушкин".
fn is_initial(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_split() {
        let s = split_sentences("Привет. Как дела? Всё хорошо!", "ru");
        assert_eq!(s, vec!["Привет.", "Как дела?", "Всё хорошо!"]);
    }

    #[test]
    fn test_no_terminal_punctuation() {
        assert_eq!(split_sentences("  just words here ", "en"), vec!["just words here"]);
    }

    #[test]
    fn test_empty() {
        assert!(split_sentences("   ", "ru").is_empty());
    }

    #[test]
    fn test_repeated_exclamation() {
        let s = split_sentences("Ура!!! Поздравляю.", "ru");
        assert_eq!(s, vec!["Ура!!!", "Поздравляю."]);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        let s = split_sentences("Он сказал: «Привет.» Потом ушёл.", "ru");
        assert_eq!(s, vec!["Он сказал: «Привет.»", "Потом ушёл."]);
    }

    #[test]
    fn test_russian_abbreviation() {
        let s = split_sentences("Встреча в 2020 г. Москва ждёт. Конец.", "ru");
        assert_eq!(s, vec!["Встреча в 2020 г. Москва ждёт.", "Конец."]);
    }

    #[test]
    fn test_english_abbreviation() {
        let s = split_sentences("Dr. Smith is here. He waits.", "en");
        assert_eq!(s, vec!["Dr. Smith is here.", "He waits."]);
    }

    #[test]
    fn test_abbreviations_are_language_specific() {
        // "Dr" is not a Russian abbreviation
        let s = split_sentences("Dr. Smith", "ru");
        assert_eq!(s, vec!["Dr.", "Smith"]);
    }

    #[test]
    fn test_initials_do_not_split() {
        let s = split_sentences("Стихи написал А. С. Пушкин. Это классика.", "ru");
        assert_eq!(s, vec!["Стихи написал А. С. Пушкин.", "Это классика."]);
    }

    #[test]
    fn test_lowercase_continuation() {
        let s = split_sentences("Мы ждали... и дождались. Да.", "ru");
        assert_eq!(s, vec!["Мы ждали... и дождались.", "Да."]);
    }

    #[test]
    fn test_decimal_numbers() {
        let s = split_sentences("Pi is 3.14 roughly. Yes.", "en");
        assert_eq!(s, vec!["Pi is 3.14 roughly.", "Yes."]);
    }

    #[test]
    fn test_language_region_suffix() {
        assert_eq!(abbreviations_for("en-US"), EN_ABBREVIATIONS);
        assert!(abbreviations_for("de").is_empty());
    }

    #[test]
    fn test_rule_segmenter_trait() {
        let seg: Box<dyn SentenceSegmenter> = Box::new(RuleSegmenter);
        assert_eq!(seg.name(), "rules");
        assert_eq!(seg.segment("Ab cd. Ef gh.", "en"), vec!["Ab cd.", "Ef gh."]);
    }
}
