use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use triage_engine::{classify_severity, detect_symptoms, SeverityLevel};

use crate::guidance::{contextual_reply, GuidanceRequest, GuidanceService, GuidanceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Generated,
    Template,
    Conversational,
}

impl From<GuidanceSource> for ReplySource {
    fn from(source: GuidanceSource) -> Self {
        match source {
            GuidanceSource::Generated => ReplySource::Generated,
            GuidanceSource::Template => ReplySource::Template,
        }
    }
}

/// Outcome of triaging one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriageAssessment {
    /// Canonical symptom names in dictionary order.
    pub symptoms: Vec<String>,
    pub severity: SeverityLevel,
    pub urgent_care: bool,
    /// Fixed advice for the severity level; absent when no symptom was detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    pub reply: String,
    pub reply_source: ReplySource,
}

#[derive(Clone)]
pub struct TriageService {
    guidance: GuidanceService,
}

impl TriageService {
    pub fn new(guidance: GuidanceService) -> Self {
        Self { guidance }
    }

    /// Detect, classify once, then reply with guidance or a conversational answer.
    pub async fn assess(&self, message: &str, user_name: Option<&str>) -> TriageAssessment {
        let user_name = user_name.map(str::trim).filter(|n| !n.is_empty());
        let symptoms = detect_symptoms(message);
        let severity = classify_severity(&symptoms, message);
        info!(
            symptoms = symptoms.len(),
            severity = %severity,
            "message triaged"
        );

        if symptoms.is_empty() {
            return TriageAssessment {
                symptoms: Vec::new(),
                severity,
                urgent_care: severity == SeverityLevel::Severe,
                recommendation: None,
                reply: contextual_reply(message, user_name),
                reply_source: ReplySource::Conversational,
            };
        }

        let request = GuidanceRequest {
            symptoms: symptoms.clone(),
            severity,
            user_name: user_name.map(str::to_string),
        };
        let guidance = self.guidance.guidance(&request).await;

        TriageAssessment {
            symptoms: symptoms.iter().map(|s| s.name().to_string()).collect(),
            severity,
            urgent_care: severity == SeverityLevel::Severe,
            recommendation: Some(severity.recommendation().to_string()),
            reply: guidance.text,
            reply_source: guidance.source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TriageService {
        TriageService::new(GuidanceService::template_only())
    }

    #[tokio::test]
    async fn fever_and_headache_is_mild_with_template_guidance() {
        let a = service()
            .assess("tengo mucha fiebre y dolor de cabeza", Some("Ana"))
            .await;
        assert_eq!(a.symptoms, vec!["dolor de cabeza", "fiebre"]);
        assert_eq!(a.severity, SeverityLevel::Mild);
        assert!(!a.urgent_care);
        assert_eq!(a.reply_source, ReplySource::Template);
        assert!(a.reply.starts_with("Hola Ana."));
        assert_eq!(
            a.recommendation.as_deref(),
            Some(SeverityLevel::Mild.recommendation())
        );
    }

    #[tokio::test]
    async fn breathing_difficulty_needs_urgent_care() {
        let a = service().assess("siento dificultad para respirar", None).await;
        assert_eq!(a.severity, SeverityLevel::Severe);
        assert!(a.urgent_care);
    }

    #[tokio::test]
    async fn negated_breathing_difficulty_is_not_urgent() {
        let a = service()
            .assess("tengo tos pero sin dificultad para respirar", None)
            .await;
        assert_eq!(a.symptoms, vec!["tos", "dificultad para respirar"]);
        assert_eq!(a.severity, SeverityLevel::Mild);
        assert!(!a.urgent_care);
    }

    #[tokio::test]
    async fn greeting_gets_a_conversational_reply() {
        let a = service().assess("hola", Some(" Ana ")).await;
        assert!(a.symptoms.is_empty());
        assert_eq!(a.reply_source, ReplySource::Conversational);
        assert!(a.recommendation.is_none());
        assert!(a.reply.starts_with("Hola Ana,"));
    }

    #[tokio::test]
    async fn severe_wording_without_symptoms_still_flags_urgency() {
        let a = service().assess("me siento muy mal", None).await;
        assert!(a.symptoms.is_empty());
        assert!(a.urgent_care);
    }

    #[test]
    fn assessment_wire_shape() {
        let a = TriageAssessment {
            symptoms: vec!["tos".to_string()],
            severity: SeverityLevel::Moderate,
            urgent_care: false,
            recommendation: None,
            reply: "x".to_string(),
            reply_source: ReplySource::Generated,
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["severity"], "moderate");
        assert_eq!(v["urgentCare"], false);
        assert_eq!(v["replySource"], "generated");
        assert!(v.get("recommendation").is_none());
    }
}
