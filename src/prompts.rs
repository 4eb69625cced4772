//! Построение системного промпта для имитации стиля.
//!
//! The composer turns a fingerprint, a few raw samples and the tail of the
//! dialogue into one instruction block. Sample selection is random on purpose
//! so repeated calls do not see the same examples.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::integrations::GenerationRequest;
use crate::session::DialogueTurn;
use crate::style::StyleFingerprint;

/// Style examples shown to the model per call.
pub const STYLE_EXAMPLES: usize = 2;

/// Dialogue turns shown to the model per call.
pub const HISTORY_TURNS: usize = 2;

/// Keyword preview is cut to this many chars.
pub const KEYWORD_PREVIEW_CHARS: usize = 50;

/// Phrases the model must not fall back to.
pub const BANNED_FILLERS: [&str; 2] = ["Что ты хотел?", "Повторяю"];

/// What the model should say when it does not understand.
pub const CONFUSION_REPLIES: [&str; 2] = ["Че?", "Не понял"];

/// Stop on newline so replies stay single-line.
pub const STOP_SEQUENCE: &str = "\n";

/// Inputs for one prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub target: &'a str,
    pub fingerprint: &'a StyleFingerprint,
    pub samples: &'a [String],
    pub history: &'a [DialogueTurn],
    pub input: &'a str,
}

/// Instruction block plus the user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
    /// Examples that were sampled into the instructions.
    pub examples: Vec<String>,
}

impl ComposedPrompt {
    /// Attach generation limits.
    pub fn into_request(self, max_tokens: u32, temperature: f32) -> GenerationRequest {
        GenerationRequest {
            system: self.system,
            user: self.user,
            max_tokens,
            temperature,
            stop: vec![STOP_SEQUENCE.to_string()],
        }
    }
}

/// Keywords joined with commas and cut to [`KEYWORD_PREVIEW_CHARS`].
pub fn keyword_preview(fingerprint: &StyleFingerprint) -> String {
    fingerprint
        .keywords
        .join(", ")
        .chars()
        .take(KEYWORD_PREVIEW_CHARS)
        .collect()
}

/// Build the instruction block.
pub fn compose<R: Rng + ?Sized>(request: &PromptRequest<'_>, rng: &mut R) -> ComposedPrompt {
    let examples: Vec<String> = request
        .samples
        .choose_multiple(rng, STYLE_EXAMPLES)
        .cloned()
        .collect();

    let examples_block = if examples.is_empty() {
        "Нет данных".to_string()
    } else {
        examples
            .iter()
            .map(|e| format!("- {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let start = request.history.len().saturating_sub(HISTORY_TURNS);
    let dialogue_block = if start == request.history.len() {
        "(пусто)".to_string()
    } else {
        request.history[start..]
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let system = format!(
        r#"Ты точно имитируешь {target}. Правила:
1. Отвечай КОРОТКО ({max_len} символов максимум)
2. Используй характерные слова: {keywords}
3. Избегай общих фраз ("{filler_a}", "{filler_b}")
4. Если не понял вопрос — скажи "{confused_a}" или "{confused_b}"
5. Никогда не повторяй фразы дословно из примеров

Примеры стиля:
{examples}

Текущий диалог:
{dialogue}

Задача: ответь на "{input}" как {target}. Только 1 предложение!"#,
        target = request.target,
        max_len = request.fingerprint.average_length,
        keywords = keyword_preview(request.fingerprint),
        filler_a = BANNED_FILLERS[0],
        filler_b = BANNED_FILLERS[1],
        confused_a = CONFUSION_REPLIES[0],
        confused_b = CONFUSION_REPLIES[1],
        examples = examples_block,
        dialogue = dialogue_block,
        input = request.input,
    );

    ComposedPrompt {
        system,
        user: request.input.to_string(),
        examples,
    }
}
