//! AI writing operations: opening draft, revision chat, title suggestions and
//! the structured chapter-one workflow.
//!
//! Every call goes through `ProviderGateway`; this module only builds prompts
//! and normalizes what comes back.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::prompts::{
    chat_system, generate_prompt, titles_prompt, workflow_prompt, CHAT_CONTEXT_PREFIX,
    CHAT_TEMPERATURE, GENERATE_SYSTEM, GENERATE_TEMPERATURE, TITLES_SYSTEM, TITLES_TEMPERATURE,
    WORKFLOW_SYSTEM, WORKFLOW_TEMPERATURE,
};
use crate::errors::AppError;
use crate::providers::{ChatMessage, Generated, PromptRequest, ProviderGateway};

pub const DEFAULT_TOPIC: &str = "Makalah Tanpa Judul";
pub const DEFAULT_STYLE: &str = "ilmiah ringkas";
pub const DEFAULT_WORKFLOW_TOPIC: &str = "Topik Umum";
const MAX_TOPIC_CHARS: usize = 200;
const MAX_STYLE_CHARS: usize = 100;
const MAX_TITLES: usize = 3;

pub const EMPTY_TOPIC_MESSAGE: &str = "Topik kosong";
pub const NO_TITLES_MESSAGE: &str = "Tidak ada judul dihasilkan";
pub const INVALID_WORKFLOW_JSON_MESSAGE: &str = "Model tidak mengembalikan JSON yang valid";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowVariables {
    pub var1: String,
    pub var2: String,
    pub var3: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuangLingkup {
    pub subjek: String,
    pub objek: String,
    pub metode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bab1 {
    pub latar_belakang: String,
    pub identifikasi_permasalahan: String,
    pub persoalan: Vec<String>,
    pub ruang_lingkup: RuangLingkup,
}

/// Structured result of the paper workflow. Missing fields deserialize empty
/// so a partially filled answer still reaches the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowOutput {
    pub variables: WorkflowVariables,
    pub title: String,
    pub question: String,
    pub issues: Vec<String>,
    pub bab1: Bab1,
}

impl WorkflowOutput {
    /// Renders chapter one as markdown-lite text, skipping empty sections.
    /// Falls back to the top-level question and issues when the chapter
    /// leaves them out.
    pub fn to_bab1_text(&self) -> String {
        let mut parts = Vec::new();

        if !self.bab1.latar_belakang.is_empty() {
            parts.push(format!(
                "# BAB I — Pendahuluan\n\n## A. Latar Belakang\n{}",
                self.bab1.latar_belakang
            ));
        }

        let question = if self.bab1.identifikasi_permasalahan.is_empty() {
            &self.question
        } else {
            &self.bab1.identifikasi_permasalahan
        };
        if !question.is_empty() {
            parts.push(format!("## B. Identifikasi Permasalahan\n{question}"));
        }

        let issues = if self.bab1.persoalan.is_empty() {
            &self.issues
        } else {
            &self.bab1.persoalan
        };
        if !issues.is_empty() {
            let numbered: Vec<String> = issues
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{}. {s}", i + 1))
                .collect();
            parts.push(format!("## C. Persoalan-persoalan\n{}", numbered.join("\n")));
        }

        let rl = &self.bab1.ruang_lingkup;
        if !(rl.subjek.is_empty() && rl.objek.is_empty() && rl.metode.is_empty()) {
            let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
            parts.push(format!(
                "## D. Ruang Lingkup\n- Subjek: {}\n- Objek: {}\n- Metode: {}",
                or_dash(&rl.subjek),
                or_dash(&rl.objek),
                or_dash(&rl.metode)
            ));
        }

        parts.join("\n\n")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

/// Writes the opening draft for `topic`.
///
/// A missing or empty topic falls back to the default; a topic made only of
/// whitespace is rejected.
pub async fn generate_draft(
    gateway: &ProviderGateway,
    topic: Option<&str>,
    style: Option<&str>,
) -> Result<Generated, AppError> {
    let topic = match topic {
        None | Some("") => DEFAULT_TOPIC.to_string(),
        Some(t) if t.trim().is_empty() => {
            return Err(AppError::Validation(EMPTY_TOPIC_MESSAGE.to_string()))
        }
        Some(t) => truncate_chars(t, MAX_TOPIC_CHARS),
    };
    let style = match style.filter(|s| !s.is_empty()) {
        Some(s) => truncate_chars(s, MAX_STYLE_CHARS),
        None => DEFAULT_STYLE.to_string(),
    };

    let request = PromptRequest::single(
        GENERATE_SYSTEM,
        generate_prompt(&topic, &style),
        GENERATE_TEMPERATURE,
    );
    let generated = gateway.generate(&request).await?;
    info!(
        provider = %generated.provider,
        chars = generated.text.len(),
        "Draft generated"
    );
    Ok(generated)
}

/// Revision chat. The current document is appended as the final user turn.
pub async fn chat_revise(
    gateway: &ProviderGateway,
    messages: Vec<ChatMessage>,
    context: &str,
    topic: &str,
) -> Result<Generated, AppError> {
    let mut conversation = messages;
    conversation.push(ChatMessage::user(format!("{CHAT_CONTEXT_PREFIX}{context}")));

    let request = PromptRequest {
        system: chat_system(topic),
        messages: conversation,
        temperature: CHAT_TEMPERATURE,
        max_tokens: None,
    };
    Ok(gateway.generate(&request).await?)
}

/// Up to three title suggestions for a non-empty topic.
pub async fn suggest_titles(gateway: &ProviderGateway, topic: &str) -> Result<Vec<String>, AppError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(AppError::Validation(EMPTY_TOPIC_MESSAGE.to_string()));
    }

    let request = PromptRequest::single(TITLES_SYSTEM, titles_prompt(topic), TITLES_TEMPERATURE);
    let generated = gateway.generate(&request).await?;

    let titles = parse_titles(&generated.text);
    if titles.is_empty() {
        warn!(provider = %generated.provider, "Title suggestion returned no usable lines");
        return Err(provider_error(NO_TITLES_MESSAGE, &generated));
    }
    Ok(titles)
}

/// Runs the structured workflow and parses the JSON answer.
pub async fn run_workflow(
    gateway: &ProviderGateway,
    topic: Option<&str>,
) -> Result<WorkflowOutput, AppError> {
    let topic = topic
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_WORKFLOW_TOPIC);

    let request = PromptRequest::single(WORKFLOW_SYSTEM, workflow_prompt(topic), WORKFLOW_TEMPERATURE);
    let generated = gateway.generate(&request).await?;

    match parse_workflow(&generated.text) {
        Some(output) => {
            info!(
                provider = %generated.provider,
                issues = output.issues.len(),
                "Workflow completed"
            );
            Ok(output)
        }
        None => {
            warn!(provider = %generated.provider, "Workflow answer was not valid JSON");
            Err(provider_error(INVALID_WORKFLOW_JSON_MESSAGE, &generated))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Normalizers
// ────────────────────────────────────────────────────────────────────────────

/// One title per non-empty line, with leading bullets and numbering removed.
pub fn parse_titles(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '*' | '.' | ')')
            })
            .trim()
            .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_TITLES)
        .collect()
}

/// Parses the workflow answer, tolerating code fences and prose around the
/// JSON object.
pub fn parse_workflow(text: &str) -> Option<WorkflowOutput> {
    let stripped = strip_json_fences(text);
    if let Ok(output) = serde_json::from_str(stripped) {
        return Some(output);
    }
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&stripped[start..=end]).ok()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn provider_error(message: &str, generated: &Generated) -> AppError {
    AppError::Provider {
        message: message.to_string(),
        provider: Some(generated.provider.as_str().to_string()),
        model: Some(generated.model.clone()),
    }
}
