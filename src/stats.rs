//! Per-target statistics report: message counts, mean length, frequent words.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;

/// Words shown per target.
pub const TOP_WORDS: usize = 5;

const SEPARATOR: &str = "====================================";

/// ASCII punctuation plus typographic quotes and dashes.
static PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[!-/:-@\[-`{-~—«»”“‘’]").expect("valid punctuation regex"));

/// Function words and chat fillers that say nothing about a person.
static STATS_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "в", "на", "с", "и", "не", "я", "ты", "он", "она", "оно", "мы", "вы", "они", "что",
        "как", "а", "ну", "же", "то", "это", "вот", "бы", "но", "или", "да", "блять", "сука",
        "пиздец", "хуй", "ебать", "бля", "хули", "мда", "пон", "окей", "ок", "нахуй", "нихуя",
        "ебаный", "епта", "че", "мне", "тебе", "его", "ее", "нас", "вас", "их", "мой", "твой",
        "свой", "себе", "меня", "тебя", "за", "по", "у", "из", "до", "от", "к", "про", "для",
        "со", "под", "над", "без", "если", "когда", "тоже", "так", "нет", "еще", "уже", "там",
        "тут", "все", "всё", "вообще", "просто", "типо", "этот", "эта", "эти", "тот", "та",
        "те", "где", "кто", "какой", "какая", "какое", "какие", "который", "которая", "о",
        "ж", "ль", "ли", "разве", "спс", "пж", "хз", "лол",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStats {
    pub target: String,
    pub message_count: usize,
    /// Mean length in chars, rounded half to even.
    pub average_length: usize,
    pub top_words: Vec<(String, usize)>,
}

impl TargetStats {
    pub fn compute(target: &str, messages: &[String]) -> Self {
        let message_count = messages.len();
        let average_length = if message_count == 0 {
            0
        } else {
            let total: usize = messages.iter().map(|m| m.chars().count()).sum();
            (total as f64 / message_count as f64).round_ties_even() as usize
        };

        Self {
            target: target.to_string(),
            message_count,
            average_length,
            top_words: top_words(messages, TOP_WORDS),
        }
    }
}

/// Most frequent informative words; ties keep first-seen order.
pub fn top_words(messages: &[String], n: usize) -> Vec<(String, usize)> {
    let joined = messages.join(" ").to_lowercase();
    let cleaned = PUNCTUATION_RE.replace_all(&joined, "");

    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, word) in cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && !STATS_STOP_WORDS.contains(w))
        .enumerate()
    {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(n)
        .map(|(word, count, _)| (word.to_string(), count))
        .collect()
}

/// Plain-text report over every stored target. `None` when nothing is stored.
pub fn render_report(user_label: &str, data: &BTreeMap<String, Vec<String>>) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    let mut out = String::new();
    let _ = writeln!(out, "📊 Статистика для пользователя @{}", user_label);
    let _ = writeln!(out, "{}\n", SEPARATOR);
    let _ = writeln!(out, "Общее количество сохраненных профилей: {}\n", data.len());

    let mut total = 0;
    for (target, messages) in data {
        let stats = TargetStats::compute(target, messages);
        total += stats.message_count;

        let words = if stats.message_count == 0 {
            "Нет сообщений".to_string()
        } else if stats.top_words.is_empty() {
            "Нет данных (после фильтрации)".to_string()
        } else {
            stats
                .top_words
                .iter()
                .map(|(word, count)| format!("\"{}\" ({})", word, count))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let _ = writeln!(out, "--- Профиль: {} ---", stats.target);
        let _ = writeln!(out, "Сообщений сохранено: {}", stats.message_count);
        let _ = writeln!(out, "Средняя длина сообщения: {} симв.", stats.average_length);
        let _ = writeln!(
            out,
            "Топ-5 частых слов (без стоп-слов, >1 буквы): {}\n",
            words
        );
    }

    let _ = writeln!(out, "{}", SEPARATOR);
    let _ = writeln!(out, "Всего сообщений по всем профилям: {}", total);
    Some(out)
}
