use once_cell::sync::Lazy;
use regex::Regex;

static EXPLICIT_REQUEST_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\b(speak|in) english\b").unwrap(), "en"),
        (Regex::new(r"(?i)\bem português\b").unwrap(), "pt"),
        (Regex::new(r"(?i)\ben español\b").unwrap(), "es"),
        (Regex::new(r"(?i)\ben français\b").unwrap(), "fr"),
    ]
});

static PT_VOCAB: Lazy<Vec<&'static str>> = Lazy::new(|| vec![
    "você", "voce", "não", "nao", "obrigado", "obrigada", "tudo", "bem", "oi", "olá", "ola",
    "por", "favor", "sim", "eu", "que", "com", "para", "está", "esta", "é", "isso",
]);
static EN_VOCAB: Lazy<Vec<&'static str>> = Lazy::new(|| vec![
    "you", "the", "please", "thanks", "thank", "hello", "hi", "yes", "no", "what",
    "with", "for", "is", "that", "this", "have",
]);
static ES_VOCAB: Lazy<Vec<&'static str>> = Lazy::new(|| vec![
    "usted", "gracias", "hola", "por", "favor", "sí", "si", "no", "qué", "que",
    "con", "para", "está", "esta", "es", "eso",
]);
static FR_VOCAB: Lazy<Vec<&'static str>> = Lazy::new(|| vec![
    "vous", "merci", "bonjour", "salut", "oui", "non", "quoi", "avec", "pour",
    "est", "cela", "bien",
]);

fn tokenize(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Scores `tokens` against the four lexicons and returns the strict-majority
/// winner, or `None` on a tie / zero score (spec §4.G Language persistence step 3).
fn score_against_lexicons(tokens: &[String]) -> Option<&'static str> {
    let score = |vocab: &[&str]| tokens.iter().filter(|t| vocab.contains(&t.as_str())).count();
    let scores = [
        ("pt", score(&PT_VOCAB)),
        ("en", score(&EN_VOCAB)),
        ("es", score(&ES_VOCAB)),
        ("fr", score(&FR_VOCAB)),
    ];
    let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let winners: Vec<&str> = scores.iter().filter(|(_, s)| *s == max).map(|(lang, _)| *lang).collect();
    if winners.len() == 1 {
        Some(winners[0])
    } else {
        None
    }
}

/// Detects the language of a single message: explicit request, then orthographic
/// hint (ã/õ -> pt), then lexicon scoring (spec §4.G steps 1-3).
pub fn detect_language_simple(message: &str) -> Option<&'static str> {
    for (pattern, lang) in EXPLICIT_REQUEST_PATTERNS.iter() {
        if pattern.is_match(message) {
            return Some(lang);
        }
    }
    if message.contains('ã') || message.contains('õ') {
        return Some("pt");
    }
    let tokens = tokenize(message);
    score_against_lexicons(&tokens)
}

/// Current-message detection first; else scan history most-recent-first for a
/// confident detection; else default to "pt" (spec §4.G steps 4-5).
pub fn infer_conversation_language(current_message: &str, history_newest_first: &[String]) -> &'static str {
    if let Some(lang) = detect_language_simple(current_message) {
        return lang;
    }
    for message in history_newest_first {
        if let Some(lang) = detect_language_simple(message) {
            return lang;
        }
    }
    "pt"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_request_wins_over_lexicon() {
        assert_eq!(detect_language_simple("please speak english obrigado"), Some("en"));
    }

    #[test]
    fn orthographic_hint_detects_portuguese() {
        assert_eq!(detect_language_simple("não sei"), Some("pt"));
    }

    #[test]
    fn lexicon_scoring_picks_majority() {
        assert_eq!(detect_language_simple("hello thanks you please"), Some("en"));
    }

    #[test]
    fn tie_or_empty_returns_none() {
        assert_eq!(detect_language_simple("1234 ???"), None);
    }

    #[test]
    fn falls_back_to_history_then_portuguese_default() {
        assert_eq!(infer_conversation_language("1234", &["hello thanks you please".to_string()]), "en");
        assert_eq!(infer_conversation_language("1234", &["???".to_string()]), "pt");
    }
}
