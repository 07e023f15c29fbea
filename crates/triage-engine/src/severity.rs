/// Rule-based severity classification of a single message.
///
/// Rules, first match wins:
/// 1. a detected symptom from the severe-symptom set
/// 2. a severe intensity keyword or warning-sign phrase in the message
/// 3. a moderate intensity keyword or phrase in the message
/// 4. otherwise mild
///
/// Keyword occurrences immediately preceded by the word "no" or "sin" are ignored, so
/// "sin dificultad para respirar" does not escalate.
use crate::model::SeverityLevel;
use crate::symptoms::Symptom;

/// Symptoms that are severe on their own.
pub const SEVERE_SYMPTOMS: &[&str] = &["dificultad para respirar", "dolor en el pecho"];

pub const SEVERE_KEYWORDS: &[&str] = &[
    "intenso",
    "fuerte",
    "insoportable",
    "severo",
    "grave",
    "agudo",
    "no puedo",
    "muy mal",
    "terrible",
    "horrible",
    "desesperante",
];

/// Warning signs that are severe even though the detector has no symptom for them.
pub const SEVERE_PHRASES: &[&str] = &[
    "desvanecimiento",
    "desmayo",
    "desmayé",
    "confusión",
    "pérdida de conciencia",
    "convulsión",
    "convulsiones",
];

pub const MODERATE_KEYWORDS: &[&str] = &["molesto", "persistente", "constante", "regular", "moderado"];

pub const MODERATE_PHRASES: &[&str] = &[
    "fiebre alta",
    "vómito persistente",
    "deshidratación",
    "dolor intenso",
    "dolor fuerte",
];

const NEGATORS: &[&str] = &["no ", "sin "];

/// Classify one message. Stateless: nothing carries over between messages.
pub fn classify_severity(symptoms: &[Symptom], raw_message: &str) -> SeverityLevel {
    let lower = raw_message.to_lowercase();

    let severe_symptom = symptoms.iter().any(|s| {
        SEVERE_SYMPTOMS.contains(&s.name()) && !negated_everywhere(&lower, s.keywords())
    });
    if severe_symptom {
        return SeverityLevel::Severe;
    }

    if SEVERE_KEYWORDS
        .iter()
        .chain(SEVERE_PHRASES)
        .any(|k| mentions(&lower, k))
    {
        return SeverityLevel::Severe;
    }

    if MODERATE_KEYWORDS
        .iter()
        .chain(MODERATE_PHRASES)
        .any(|k| mentions(&lower, k))
    {
        return SeverityLevel::Moderate;
    }

    SeverityLevel::Mild
}

/// At least one occurrence of `keyword` in `text` is not negated.
fn mentions(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword)
        .any(|(idx, _)| !is_negated(text, idx))
}

/// Some keyword occurs in `text` and every occurrence is negated. A symptom with no
/// textual evidence at all is not considered negated.
fn negated_everywhere(text: &str, keywords: &[&str]) -> bool {
    let mut seen = false;
    for keyword in keywords {
        for (idx, _) in text.match_indices(keyword) {
            if !is_negated(text, idx) {
                return false;
            }
            seen = true;
        }
    }
    seen
}

/// The text before byte offset `idx` ends with a standalone negator word.
fn is_negated(text: &str, idx: usize) -> bool {
    let before = &text[..idx];
    NEGATORS.iter().any(|neg| {
        before
            .strip_suffix(neg)
            .is_some_and(|rest| rest.chars().next_back().map_or(true, |c| !c.is_alphanumeric()))
    })
}
