/// Care guidance for a triaged message.
///
/// [`GuidanceService`] asks the configured chat model first ([`LlmGuidance`]) and falls
/// back to a deterministic Spanish template ([`TemplateGuidance`]) on any failure. The
/// caller always gets text.
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use triage_engine::{SeverityLevel, Symptom};
use vitalcol_common::openai::{ChatCompletionRequest, Message, OpenAiClient, OpenAiClientError};

use crate::rate_limit::{RateLimited, RateLimiter};

const TEMPERATURE: f32 = 0.6;
const MAX_TOKENS: u32 = 500;
const TOP_P: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceRequest {
    pub symptoms: Vec<Symptom>,
    pub severity: SeverityLevel,
    pub user_name: Option<String>,
}

impl GuidanceRequest {
    fn symptom_list(&self) -> String {
        self.symptoms
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Guidance {
    pub text: String,
    pub source: GuidanceSource,
}

#[derive(Debug, thiserror::Error)]
pub enum GuidanceError {
    #[error("no text-generation host configured")]
    NotConfigured,

    #[error(transparent)]
    RateLimited(#[from] RateLimited),

    #[error(transparent)]
    Client(#[from] OpenAiClientError),

    #[error("text-generation host returned no content")]
    EmptyResponse,
}

/// Guidance generated by an OpenAI-compatible chat model.
#[derive(Clone)]
pub struct LlmGuidance {
    client: Arc<OpenAiClient>,
    model: String,
    limiter: Option<RateLimiter>,
}

impl LlmGuidance {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, limiter: Option<RateLimiter>) -> Self {
        Self {
            client,
            model: model.into(),
            limiter,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, request: &GuidanceRequest) -> Result<String, GuidanceError> {
        if !self.client.config().is_configured() {
            return Err(GuidanceError::NotConfigured);
        }
        if let Some(limiter) = &self.limiter {
            limiter.check().await?;
        }

        let chat = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(system_prompt(request)),
                Message::user(recommendation_prompt(request)),
            ],
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
            top_p: Some(TOP_P),
        };
        let response = self.client.chat_completions(chat, None).await?;
        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "guidance generated"
            );
        }
        response
            .first_content()
            .map(str::to_string)
            .ok_or(GuidanceError::EmptyResponse)
    }
}

pub fn system_prompt(request: &GuidanceRequest) -> String {
    format!(
        "Eres un asistente médico virtual especializado en triaje y orientación médica en Colombia.\n\n\
INSTRUCCIONES IMPORTANTES:\n\
- Responde SIEMPRE en español\n\
- Sé empático, profesional y conciso\n\
- Proporciona información médica general, NO diagnósticos específicos\n\
- Recomienda consultar profesionales médicos cuando sea apropiado\n\
- Mantén un tono cálido pero profesional\n\
- Si no tienes información suficiente, recomienda consultar un médico\n\
- Enfócate en orientación y primeros auxilios básicos\n\
- Usa el nombre del usuario cuando esté disponible para personalizar la experiencia\n\n\
CONTEXTO: recomendación médica; síntomas: {}; gravedad: {}; usuario: {}\n\n\
Responde de manera útil y profesional.",
        request.symptom_list(),
        request.severity.label_es(),
        request.user_name.as_deref().unwrap_or("usuario"),
    )
}

pub fn recommendation_prompt(request: &GuidanceRequest) -> String {
    let subject = match request.user_name.as_deref() {
        Some(name) => format!("El usuario {name}"),
        None => "El usuario".to_string(),
    };
    format!(
        "{} presenta los siguientes síntomas: {}.\n\n\
La gravedad estimada es {}.\n\n\
Como asistente médico virtual especializado, proporciona una recomendación médica completa y \
profesional que incluya:\n\n\
1. **Evaluación inicial**: Breve explicación de lo que podrían indicar estos síntomas\n\
2. **Cuidados inmediatos**: Qué puede hacer ahora mismo para aliviar los síntomas\n\
3. **Cuándo buscar atención médica**: Señales de alarma y cuándo acudir al médico\n\
4. **Medidas preventivas**: Cómo evitar que empeore la situación\n\
5. **Recomendaciones generales**: Estilo de vida y cuidados adicionales\n\n\
IMPORTANTE:\n\
- Estructura la respuesta con títulos y viñetas\n\
- Personaliza usando el nombre del usuario cuando sea apropiado\n\
- Mantén un tono empático pero profesional\n\
- La respuesta debe ser informativa pero no debe reemplazar el consejo médico profesional\n\
- Enfatiza cuándo es necesario buscar atención médica profesional",
        subject,
        request.symptom_list(),
        request.severity.label_es(),
    )
}

struct CareTips {
    symptom: &'static str,
    title: &'static str,
    immediate: &'static [&'static str],
    seek_care: &'static [&'static str],
}

const CARE_TIPS: &[CareTips] = &[
    CareTips {
        symptom: "fiebre",
        title: "Fiebre",
        immediate: &[
            "Mantente hidratado bebiendo abundante agua",
            "Descansa en un lugar fresco y ventilado",
            "Usa ropa ligera y cómoda",
        ],
        seek_care: &[
            "Si la fiebre supera los 39°C",
            "Si persiste por más de 3 días",
            "Si hay signos de deshidratación",
        ],
    },
    CareTips {
        symptom: "dolor de cabeza",
        title: "Dolor de cabeza",
        immediate: &[
            "Descansa en un lugar tranquilo y oscuro",
            "Aplica compresas frías en la frente",
            "Evita ruidos fuertes y luces brillantes",
        ],
        seek_care: &[
            "Si el dolor es súbito e intenso",
            "Si hay cambios en la visión",
            "Si persiste por más de 48 horas",
        ],
    },
    CareTips {
        symptom: "tos",
        title: "Tos",
        immediate: &[
            "Mantente hidratado con líquidos tibios",
            "Usa miel para calmar la garganta",
            "Evita irritantes como humo y polvo",
        ],
        seek_care: &[
            "Si la tos persiste por más de 2 semanas",
            "Si hay sangre en el esputo",
            "Si se acompaña de fiebre alta",
        ],
    },
    CareTips {
        symptom: "dolor abdominal",
        title: "Dolor abdominal",
        immediate: &[
            "Evita alimentos sólidos temporalmente",
            "Toma pequeños sorbos de agua",
            "Descansa en una posición cómoda",
        ],
        seek_care: &[
            "Si el dolor es intenso y súbito",
            "Si se acompaña de vómito persistente",
            "Si hay sangre en vómito o heces",
        ],
    },
    CareTips {
        symptom: "dificultad para respirar",
        title: "Dificultad para respirar",
        immediate: &[
            "Mantente calmado y en posición erguida",
            "Afloja la ropa ajustada",
            "Respira lenta y profundamente",
        ],
        seek_care: &[
            "Llama al 123 si es severa",
            "Dirígete al hospital más cercano",
            "No conduzcas, pide ayuda",
        ],
    },
];

const GENERAL_TIPS: &[&str] = &[
    "Descansa y mantente hidratado",
    "Monitorea la evolución de tus síntomas",
    "Evita automedicarte sin supervisión médica",
];

const CLOSING: &str =
    "Esta orientación no reemplaza la valoración de un profesional de la salud.";

/// Deterministic guidance built only from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGuidance;

impl TemplateGuidance {
    pub fn render(&self, request: &GuidanceRequest) -> String {
        let mut out = String::new();
        match request.user_name.as_deref() {
            Some(name) => out.push_str(&format!("Hola {name}. ")),
            None => out.push_str("Hola. "),
        }
        if request.symptoms.is_empty() {
            out.push_str("No identifiqué síntomas específicos en tu mensaje.");
        } else {
            out.push_str(&format!(
                "Según lo que me cuentas, presentas: {}.",
                request.symptom_list()
            ));
        }
        out.push_str(&format!(
            " La gravedad estimada es {}.\n\n{}\n",
            request.severity.label_es(),
            request.severity.recommendation()
        ));

        let mut any_tips = false;
        for tips in CARE_TIPS {
            if !request.symptoms.iter().any(|s| s.name() == tips.symptom) {
                continue;
            }
            any_tips = true;
            out.push_str(&format!("\n**{}**\nCuidados inmediatos:\n", tips.title));
            push_bullets(&mut out, tips.immediate);
            out.push_str("Cuándo buscar atención médica:\n");
            push_bullets(&mut out, tips.seek_care);
        }
        if !any_tips {
            out.push_str("\nMientras tanto:\n");
            push_bullets(&mut out, GENERAL_TIPS);
        }

        out.push('\n');
        out.push_str(CLOSING);
        out
    }
}

fn push_bullets(out: &mut String, items: &[&str]) {
    for item in items {
        out.push_str("• ");
        out.push_str(item);
        out.push('\n');
    }
}

/// Generated guidance with a template fallback.
#[derive(Clone)]
pub struct GuidanceService {
    primary: Option<LlmGuidance>,
    fallback: TemplateGuidance,
}

impl GuidanceService {
    pub fn new(primary: Option<LlmGuidance>) -> Self {
        Self {
            primary,
            fallback: TemplateGuidance,
        }
    }

    pub fn template_only() -> Self {
        Self::new(None)
    }

    pub async fn guidance(&self, request: &GuidanceRequest) -> Guidance {
        if let Some(primary) = &self.primary {
            match primary.generate(request).await {
                Ok(text) => {
                    return Guidance {
                        text,
                        source: GuidanceSource::Generated,
                    }
                }
                Err(e) => warn!(error = %e, model = primary.model(), "guidance generation failed, using template"),
            }
        }
        Guidance {
            text: self.fallback.render(request),
            source: GuidanceSource::Template,
        }
    }
}

/// Reply for a message in which no symptom was detected.
pub fn contextual_reply(message: &str, user_name: Option<&str>) -> String {
    let lower = message.to_lowercase();
    let name = user_name.map(str::trim).filter(|n| !n.is_empty());
    let suffix = name.map(|n| format!(" {n}")).unwrap_or_default();
    let comma_suffix = name.map(|n| format!(", {n}")).unwrap_or_default();

    if ["hola", "buenos", "buenas"].iter().any(|k| lower.contains(k)) {
        return format!(
            "Hola{suffix}, ¿en qué puedo ayudarte hoy? Puedes contarme sobre cualquier síntoma o \
             consulta médica que tengas."
        );
    }
    if lower.contains("gracias") {
        return format!(
            "De nada{comma_suffix}. Estoy aquí para ayudarte con cualquier consulta médica que tengas."
        );
    }
    if ["cómo estás", "como estas"].iter().any(|k| lower.contains(k)) {
        return format!(
            "Estoy bien, gracias por preguntar. Lo importante es cómo te sientes tú{comma_suffix}. \
             ¿Hay algo específico sobre tu salud que te preocupe?"
        );
    }
    if ["qué puedes hacer", "que puedes hacer", "ayuda"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return "Puedo ayudarte con orientación médica general, evaluar síntomas y recomendarte \
                centros médicos cercanos. ¿Tienes algún síntoma o consulta específica?"
            .to_string();
    }
    let opening = match name {
        Some(n) => format!("{n}, estoy"),
        None => "Estoy".to_string(),
    };
    format!(
        "{opening} aquí para ayudarte con consultas médicas. ¿Tienes algún síntoma específico que \
         te preocupe o alguna pregunta sobre salud?"
    )
}
