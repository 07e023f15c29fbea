/// Spanish symptom dictionary and free-text detector.
///
/// Matching is plain substring containment on the lower-cased message: no word
/// boundaries, no stemming, no accent folding. The dictionary carries accented and
/// unaccented variants itself where they matter. Substring matching over-detects (for
/// example "mareo" inside "mareos") and that behaviour is kept as-is.
use std::fmt;

use serde::{Serialize, Serializer};

struct SymptomEntry {
    name: &'static str,
    keywords: &'static [&'static str],
}

/// Canonical symptoms in detection order.
const DICTIONARY: &[SymptomEntry] = &[
    SymptomEntry {
        name: "dolor de cabeza",
        keywords: &["dolor de cabeza", "cefalea", "migraña", "jaqueca"],
    },
    SymptomEntry {
        name: "fiebre",
        keywords: &["fiebre", "temperatura", "calentura", "febril"],
    },
    SymptomEntry {
        name: "tos",
        keywords: &["tos", "tosiendo", "toser"],
    },
    SymptomEntry {
        name: "dolor abdominal",
        keywords: &[
            "dolor de estómago",
            "dolor abdominal",
            "dolor de barriga",
            "dolor en el abdomen",
        ],
    },
    SymptomEntry {
        name: "dificultad para respirar",
        keywords: &["dificultad para respirar", "falta de aire", "ahogo", "disnea"],
    },
    SymptomEntry {
        name: "náuseas",
        keywords: &["náuseas", "ganas de vomitar", "mareo"],
    },
    SymptomEntry {
        name: "mareos",
        keywords: &["mareos", "vértigo", "mareado"],
    },
    SymptomEntry {
        name: "dolor muscular",
        keywords: &["dolor muscular", "dolor en los músculos", "mialgia"],
    },
    SymptomEntry {
        name: "fatiga",
        keywords: &["fatiga", "cansancio", "agotamiento", "debilidad"],
    },
    SymptomEntry {
        name: "dolor de garganta",
        keywords: &["dolor de garganta", "garganta irritada", "faringitis"],
    },
    SymptomEntry {
        name: "congestión nasal",
        keywords: &["congestión nasal", "nariz tapada", "rinitis"],
    },
    SymptomEntry {
        name: "diarrea",
        keywords: &["diarrea", "deposiciones líquidas"],
    },
    SymptomEntry {
        name: "vómitos",
        keywords: &["vómitos", "vomitar", "vómito"],
    },
    SymptomEntry {
        name: "dolor en el pecho",
        keywords: &["dolor en el pecho", "dolor torácico", "opresión en el pecho"],
    },
];

/// A canonical symptom name from the fixed dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symptom {
    index: usize,
}

impl Symptom {
    /// Look up a canonical symptom name (exact match).
    pub fn from_name(name: &str) -> Option<Symptom> {
        DICTIONARY
            .iter()
            .position(|e| e.name == name)
            .map(|index| Symptom { index })
    }

    pub fn name(&self) -> &'static str {
        DICTIONARY[self.index].name
    }

    /// Phrases whose presence in a message indicates this symptom.
    pub fn keywords(&self) -> &'static [&'static str] {
        DICTIONARY[self.index].keywords
    }

    /// Every symptom, in dictionary order.
    pub fn all() -> impl Iterator<Item = Symptom> {
        (0..DICTIONARY.len()).map(|index| Symptom { index })
    }
}

impl fmt::Display for Symptom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Symptom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Symptoms mentioned in `message`, each at most once, in dictionary order.
pub fn detect_symptoms(message: &str) -> Vec<Symptom> {
    let lower = message.to_lowercase();
    Symptom::all()
        .filter(|s| s.keywords().iter().any(|k| lower.contains(k)))
        .collect()
}
