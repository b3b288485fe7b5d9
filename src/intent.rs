//! Keyword fallback for spotting image requests without an AI call.
//!
//! A message that no pattern matches still reaches the model, which can call
//! the image tool itself.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::cmp::Reverse;

pub const STYLE_SUFFIX: &str = "high quality, detailed, digital art style";
pub const DEFAULT_PROMPT: &str = "a beautiful artistic image, high quality";

/// Request phrasings, Indonesian first. Any single match is enough.
pub const IMAGE_REQUEST_PATTERNS: &[&str] = &[
    r"\b(buat|buatkan|buatin|bikin|bikinkan|bikinin)\s+(aku\s+|saya\s+)?(sebuah\s+|satu\s+)?(gambar|foto|ilustrasi|lukisan)\b",
    r"\b(gambarkan|gambarin)\b",
    r"\b(generate|generatekan)\s+(sebuah\s+)?(gambar|foto)\b",
    r"\b(tolong\s+)?gambar(kan)?\s+(aku\s+|saya\s+)?(sebuah|seekor|satu)\b",
    r"\b(generate|create|make|produce|render)\s+(me\s+)?(an?\s+|some\s+)?(image|picture|photo|illustration|drawing|painting|artwork)s?\b",
    r"\bdraw\s+(me\s+)?(an?|the|some)\b",
    r"\bpaint\s+(me\s+)?(an?|the)\b",
    r"\b(image|picture|photo)\s+of\b",
];

/// Politeness markers and filler stripped from the derived prompt.
pub const FILLER_PATTERNS: &[&str] = &[
    r"\b(tolong|dong|deh|ya|yah|yuk|coba|mohon)\b",
    r"\b(untuk|buat)\s+(aku|saya|ku)\b",
    r"\b(please|pls|plz|kindly)\b",
    r"\b(can|could|would)\s+you\b",
    r"\bfor\s+me\b",
];

static LEADING_CONNECTOR: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"^(of|about|showing|with|tentang|berupa|dari|yang)\b")
        .case_insensitive(true)
        .build()
        .expect("connector pattern is valid")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static BUILTIN: Lazy<IntentClassifier> = Lazy::new(|| {
    IntentClassifier::new(IMAGE_REQUEST_PATTERNS, FILLER_PATTERNS)
        .expect("built-in intent patterns are valid")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageIntent {
    pub is_image_request: bool,
    pub prompt: Option<String>,
}

impl ImageIntent {
    fn none() -> Self {
        Self {
            is_image_request: false,
            prompt: None,
        }
    }
}

/// Pattern-driven classifier. The pattern lists are data, so a different
/// set can be swapped in and tested on its own.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    patterns: Vec<Regex>,
    fillers: Vec<Regex>,
}

impl IntentClassifier {
    pub fn new(patterns: &[&str], fillers: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: compile(patterns)?,
            fillers: compile(fillers)?,
        })
    }

    /// The built-in Indonesian + English pattern set.
    pub fn builtin() -> &'static IntentClassifier {
        &BUILTIN
    }

    pub fn is_image_request(&self, message: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(message))
    }

    pub fn classify(&self, message: &str) -> ImageIntent {
        if !self.is_image_request(message) {
            return ImageIntent::none();
        }
        ImageIntent {
            is_image_request: true,
            prompt: Some(self.extract_prompt(message)),
        }
    }

    /// Strip the leading request phrase and filler, then add the style suffix.
    /// Later phrases that happen to match a pattern belong to the subject.
    pub fn extract_prompt(&self, message: &str) -> String {
        let mut text = message.to_string();
        let request = self
            .patterns
            .iter()
            .filter_map(|re| re.find(message))
            .min_by_key(|m| (m.start(), Reverse(m.end())));
        if let Some(request) = request {
            text.replace_range(request.range(), " ");
        }
        for re in &self.fillers {
            text = re.replace_all(&text, " ").into_owned();
        }

        let mut subject = tidy(&text);
        loop {
            let stripped = tidy(&LEADING_CONNECTOR.replace(&subject, ""));
            if stripped == subject {
                break;
            }
            subject = stripped;
        }

        if subject.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            format!("{subject}, {STYLE_SUFFIX}")
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

/// Classify with the built-in pattern set.
pub fn classify(message: &str) -> ImageIntent {
    BUILTIN.classify(message)
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect()
}

fn tidy(text: &str) -> String {
    WHITESPACE
        .replace_all(text, " ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ':' | ';' | '!' | '?' | '-'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indonesian_request_is_detected_and_cleaned() {
        let intent = classify("buatkan gambar kucing lucu");
        assert!(intent.is_image_request);
        let prompt = intent.prompt.unwrap();
        assert_eq!(prompt, "kucing lucu, high quality, detailed, digital art style");
        assert!(!prompt.contains("buatkan gambar"));
    }

    #[test]
    fn matching_ignores_case() {
        assert!(classify("Tolong BUATKAN GAMBAR pemandangan gunung dong").is_image_request);
        assert_eq!(
            classify("Tolong BUATKAN GAMBAR pemandangan gunung dong").prompt.as_deref(),
            Some("pemandangan gunung, high quality, detailed, digital art style")
        );
    }

    #[test]
    fn english_phrasings() {
        let intent = classify("Please generate an image of a red car for me");
        assert_eq!(
            intent.prompt.as_deref(),
            Some("a red car, high quality, detailed, digital art style")
        );
        assert!(classify("draw me a dragon").is_image_request);
        assert!(classify("Can you create a picture of the sea?").is_image_request);
    }

    #[test]
    fn later_request_words_stay_in_the_subject() {
        let intent = classify("Please generate an image of a cat holding a photo of a dog");
        assert_eq!(
            intent.prompt.as_deref(),
            Some("a cat holding a photo of a dog, high quality, detailed, digital art style")
        );
    }

    #[test]
    fn each_builtin_pattern_matches_its_phrasing() {
        let cases = [
            ("buatkan gambar kucing", "kucing"),
            ("gambarkan pemandangan", "pemandangan"),
            ("generatekan gambar rumah", "rumah"),
            ("tolong gambar seekor kucing", "kucing"),
            ("create an image of a car", "a car"),
            ("draw me a dragon", "dragon"),
            ("paint me a sunset", "sunset"),
            ("photo of the beach", "the beach"),
        ];
        assert_eq!(cases.len(), IMAGE_REQUEST_PATTERNS.len());

        for (pattern, (text, subject)) in IMAGE_REQUEST_PATTERNS.iter().zip(cases) {
            let single = IntentClassifier::new(&[*pattern], &[]).unwrap();
            assert!(single.is_image_request(text), "{pattern} should match {text:?}");
            assert_eq!(
                single.extract_prompt(text),
                format!("{subject}, {STYLE_SUFFIX}"),
                "{pattern}"
            );
            assert!(classify(text).is_image_request, "{text}");
        }
    }

    #[test]
    fn bare_request_falls_back_to_default_prompt() {
        let intent = classify("bikin gambar dong");
        assert!(intent.is_image_request);
        assert_eq!(intent.prompt.as_deref(), Some(DEFAULT_PROMPT));
    }

    #[test]
    fn ordinary_questions_are_not_image_requests() {
        for text in [
            "halo, apa kabar?",
            "what projects have you built?",
            "skill apa saja yang kamu punya",
            "",
        ] {
            assert_eq!(classify(text), ImageIntent::none(), "{text}");
        }
    }

    #[test]
    fn custom_pattern_sets_replace_the_builtin_one() {
        let classifier = IntentClassifier::new(&[r"\bsketch\b"], &[]).unwrap();
        assert!(classifier.is_image_request("sketch a lighthouse"));
        assert!(!classifier.is_image_request("buatkan gambar kucing"));
        assert_eq!(
            classifier.extract_prompt("sketch a lighthouse"),
            "a lighthouse, high quality, detailed, digital art style"
        );
    }

    #[test]
    fn invalid_patterns_are_reported() {
        assert!(IntentClassifier::new(&["(unclosed"], &[]).is_err());
    }
}
