use once_cell::sync::Lazy;
use regex::Regex;

/// 2-80 chars, extended-Latin letters/spaces/apostrophe/hyphen, must not look like
/// a URL, mention or raw jid (spec §4.G name validation rule).
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-zÀ-ÖØ-öø-ÿ][A-Za-zÀ-ÖØ-öø-ÿ'’\- ]{1,79}$").unwrap()
});

pub fn validate_name(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let len = trimmed.chars().count();
    if !(2..=80).contains(&len) {
        return None;
    }
    if !NAME_PATTERN.is_match(trimmed) {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if lower.contains("http") || lower.contains('@') || lower.contains("s.whatsapp.net") {
        return None;
    }
    Some(trimmed.to_string())
}

static EXPLICIT_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)meu nome (?:é|eh) ([a-zà-öø-ÿ' -]{2,80})").unwrap(),
        Regex::new(r"(?i)me chamo ([a-zà-öø-ÿ' -]{2,80})").unwrap(),
        Regex::new(r"(?i)my name is ([a-zà-öø-ÿ' -]{2,80})").unwrap(),
        Regex::new(r"(?i)call me ([a-zà-öø-ÿ' -]{2,80})").unwrap(),
        Regex::new(r"(?i)me llamo ([a-zà-öø-ÿ' -]{2,80})").unwrap(),
        Regex::new(r"(?i)je m'appelle ([a-zà-öø-ÿ' -]{2,80})").unwrap(),
    ]
});

/// Matches "my name is X"/"me chamo X"/etc across pt/en/es/fr, then runs the
/// captured candidate through `validate_name` (spec §4.G trigger 2).
pub fn extract_explicit_name(message: &str) -> Option<String> {
    for pattern in EXPLICIT_NAME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(message) {
            if let Some(candidate) = caps.get(1) {
                // take only the first "word group" before trailing punctuation/sentence
                let raw = candidate.as_str().split(|c: char| c == '.' || c == ',' || c == '!' || c == '?').next().unwrap_or("");
                if let Some(valid) = validate_name(raw) {
                    return Some(valid);
                }
            }
        }
    }
    None
}

static DENIAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)esse não é meu nome").unwrap(),
        Regex::new(r"(?i)não é meu nome").unwrap(),
        Regex::new(r"(?i)that'?s not my name").unwrap(),
        Regex::new(r"(?i)don'?t call me").unwrap(),
        Regex::new(r"(?i)ese no es mi nombre").unwrap(),
        Regex::new(r"(?i)ce n'est pas mon nom").unwrap(),
    ]
});

/// Matches denial phrases across pt/en/es/fr (spec §4.G trigger 1).
pub fn is_name_denial(message: &str) -> bool {
    DENIAL_PATTERNS.iter().any(|p| p.is_match(message))
}

static BOT_ASKED_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)como (posso|devo) te chamar").unwrap(),
        Regex::new(r"(?i)qual (é|eh) o seu nome").unwrap(),
        Regex::new(r"(?i)what should i call you").unwrap(),
        Regex::new(r"(?i)what('?s| is) your name").unwrap(),
        Regex::new(r"(?i)¿cómo te llamas").unwrap(),
        Regex::new(r"(?i)comment tu t'appelles").unwrap(),
    ]
});

/// True iff the bot's last outbound message looks like a "what should I call
/// you?" prompt (spec §4.G trigger 3, `_last_bot_asked_name`).
pub fn bot_asked_for_name(last_bot_message: &str) -> bool {
    BOT_ASKED_NAME_PATTERNS.iter().any(|p| p.is_match(last_bot_message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_plain_name() {
        assert_eq!(validate_name("Maria"), Some("Maria".to_string()));
        assert_eq!(validate_name("Jean-Luc"), Some("Jean-Luc".to_string()));
        assert_eq!(validate_name("O'Brien"), Some("O'Brien".to_string()));
    }

    #[test]
    fn rejects_too_short_or_too_long() {
        assert_eq!(validate_name("A"), None);
        assert_eq!(validate_name(&"A".repeat(81)), None);
    }

    #[test]
    fn rejects_urls_and_mentions() {
        assert_eq!(validate_name("http://evil.com"), None);
        assert_eq!(validate_name("user@x"), None);
        assert_eq!(validate_name("5511999999999s.whatsapp.net"), None);
    }

    #[test]
    fn rejects_bare_http_substring_without_protocol_prefix() {
        assert_eq!(validate_name("Http Anderson"), None);
    }

    #[test]
    fn extracts_portuguese_explicit_name() {
        assert_eq!(extract_explicit_name("Oi, me chamo Maria"), Some("Maria".to_string()));
    }

    #[test]
    fn extracts_english_explicit_name() {
        assert_eq!(extract_explicit_name("hey, my name is John"), Some("John".to_string()));
    }

    #[test]
    fn detects_denial() {
        assert!(is_name_denial("desculpa, esse não é meu nome"));
        assert!(is_name_denial("that's not my name"));
        assert!(!is_name_denial("tudo bem"));
    }

    #[test]
    fn detects_bot_asking_for_name() {
        assert!(bot_asked_for_name("Como posso te chamar?"));
        assert!(bot_asked_for_name("What should I call you?"));
        assert!(!bot_asked_for_name("Tudo bem, e você?"));
    }
}
