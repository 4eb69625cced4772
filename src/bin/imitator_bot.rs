//! Imitator Bot (Rust)
//!
//! Telegram бот, который учится стилю общения по HTML-экспорту чата и
//! отвечает в стиле выбранного участника.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use style_imitator::commands::reply::generator_from_config;
use style_imitator::config::StorageBackend;
use style_imitator::{
    metrics, Config, Error, Imitator, MemoryProfileStore, MySqlProfileStore, ProfileStore, Reply,
};
use teloxide::dispatching::UpdateFilterExt;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message, MessageId, User,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Button labels are cut to this many chars.
const MAX_BUTTON_NAME: usize = 30;
const MAX_CONFIRM_NAME: usize = 25;

const MAIN_MENU_TEXT: &str = "Главное меню:";
const PROFILES_TEXT: &str = "👤 Управление профилями:\nВыберите профиль для имитации или удаления.";
const NO_PROFILES_TEXT: &str = "👤 Управление профилями:\nУ вас пока нет сохраненных профилей.";

#[derive(Clone)]
struct AppState {
    imitator: Arc<Imitator>,
}

/// Inline-button payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Back,
    ImitateOther,
    UploadOther,
    ManageProfiles,
    Stats,
    ClearData,
    ClearDataConfirm,
    ExitImitation,
    DeleteCancel,
    NoProfiles,
    SelectTarget(String),
    DeleteRequest(String),
    DeleteConfirm(String),
}

impl Action {
    fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "back" | "back_to_main_menu" => Action::Back,
            "imitate_other" => Action::ImitateOther,
            "upload_other" => Action::UploadOther,
            "manage_profiles" => Action::ManageProfiles,
            "stats" => Action::Stats,
            "clear_data" => Action::ClearData,
            "clear_data_confirm" => Action::ClearDataConfirm,
            "exit_imitation" => Action::ExitImitation,
            "del_cancel" => Action::DeleteCancel,
            "no_profiles" | "no_targets_uploaded" => Action::NoProfiles,
            other => {
                let (ctor, name): (fn(String) -> Action, &str) =
                    if let Some(name) = other.strip_prefix("target_") {
                        (Action::SelectTarget, name)
                    } else if let Some(name) = other.strip_prefix("del_req_") {
                        (Action::DeleteRequest, name)
                    } else if let Some(name) = other.strip_prefix("del_conf_") {
                        (Action::DeleteConfirm, name)
                    } else {
                        return None;
                    };
                if name.is_empty() {
                    return None;
                }
                ctor(name.to_string())
            }
        };
        Some(action)
    }
}

fn shorten(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let head: String = name.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn main_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("👥 Имитировать", "imitate_other")],
        vec![InlineKeyboardButton::callback(
            "👤 Управление профилями",
            "manage_profiles",
        )],
        vec![InlineKeyboardButton::callback("📊 Статистика", "stats")],
        vec![InlineKeyboardButton::callback(
            "🧹 Очистить все данные",
            "clear_data",
        )],
    ])
}

fn targets_keyboard(participants: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = participants
        .iter()
        .map(|name| {
            vec![InlineKeyboardButton::callback(
                shorten(name, MAX_BUTTON_NAME),
                format!("target_{}", name),
            )]
        })
        .collect();
    if rows.is_empty() {
        rows.push(vec![InlineKeyboardButton::callback(
            "Нет участников для выбора",
            "no_targets_uploaded",
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Назад в меню", "back")]);
    InlineKeyboardMarkup::new(rows)
}

fn profiles_keyboard(targets: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = targets
        .iter()
        .map(|target| {
            vec![
                InlineKeyboardButton::callback(
                    format!("🎯 {}", shorten(target, MAX_BUTTON_NAME)),
                    format!("target_{}", target),
                ),
                InlineKeyboardButton::callback("🗑️ Удалить", format!("del_req_{}", target)),
            ]
        })
        .collect();
    if rows.is_empty() {
        rows.push(vec![InlineKeyboardButton::callback(
            "Нет сохраненных профилей",
            "no_profiles",
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "⬅️ Назад в меню",
        "back_to_main_menu",
    )]);
    InlineKeyboardMarkup::new(rows)
}

fn delete_confirm_keyboard(target: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("✅ Да, удалить {}", shorten(target, MAX_CONFIRM_NAME)),
            format!("del_conf_{}", target),
        )],
        vec![InlineKeyboardButton::callback("❌ Отмена", "del_cancel")],
    ])
}

fn exit_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🚪 Выйти из режима имитации",
        "exit_imitation",
    )]])
}

fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "⬅️ Назад",
        "back",
    )]])
}

/// Name the platform knows the user by: full name, then username, then id.
fn owner_name(user: &User) -> String {
    let mut name = user.first_name.clone();
    if let Some(last) = user.last_name.as_deref().filter(|l| !l.is_empty()) {
        name.push(' ');
        name.push_str(last);
    }
    if name.trim().is_empty() {
        if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
            return username.to_string();
        }
        return format!("User_{}", user.id.0);
    }
    name
}

fn user_label(user: &User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| format!("user_{}", user.id.0))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("style_imitator=info".parse()?)
                .add_directive("imitator_bot=info".parse()?),
        )
        .init();

    let config = Config::new();
    if config.bot_token.is_empty() {
        bail!("TELEGRAM_BOT_TOKEN not set (config.yml telegram.bot_token or environment)");
    }

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let store: Arc<dyn ProfileStore> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(MemoryProfileStore::new()),
        StorageBackend::Mysql => Arc::new(
            MySqlProfileStore::connect(&config.mysql)
                .await
                .context("Failed to prepare MySQL profile store")?,
        ),
    };
    let generator = Arc::new(generator_from_config(&config)?);

    let state = AppState {
        imitator: Arc::new(Imitator::new(
            store,
            generator,
            config.imitation_settings(),
        )),
    };

    info!(backend = ?config.storage_backend, model = %config.llm.model, "Starting Imitator Bot...");

    let bot = Bot::new(config.bot_token.clone());

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let state = state.clone();
            move |bot, msg| handle_message(bot, state.clone(), msg)
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = state.clone();
            move |bot, query| handle_callback(bot, state.clone(), query)
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, state: AppState, msg: Message) -> ResponseResult<()> {
    if msg.document().is_some() {
        return handle_document(bot, state, msg).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.trim() == "/start" {
        bot.send_message(
            msg.chat.id,
            "👋 Привет! Я могу имитировать стиль общения.\n\
             Загрузи экспорт чата или перейди к управлению профилями:",
        )
        .reply_markup(main_keyboard())
        .await?;
        return Ok(());
    }

    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0);

    match state.imitator.reply(user_id, text).await {
        Ok(Reply::Generated(reply)) => {
            bot.send_message(msg.chat.id, reply)
                .reply_to_message_id(msg.id)
                .reply_markup(exit_keyboard())
                .await?;
        }
        Ok(Reply::StateReset(notice)) => {
            bot.send_message(msg.chat.id, notice)
                .reply_to_message_id(msg.id)
                .reply_markup(main_keyboard())
                .await?;
        }
        Ok(Reply::NotImitating) => {
            bot.send_message(msg.chat.id, "Выберите действие в меню:")
                .reply_markup(main_keyboard())
                .await?;
        }
        Err(err) => {
            error!(user_id, "Reply failed: {}", err);
            bot.send_message(msg.chat.id, "⚠️ Произошла ошибка при генерации ответа.")
                .reply_markup(exit_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn handle_document(bot: Bot, state: AppState, msg: Message) -> ResponseResult<()> {
    let (Some(doc), Some(user)) = (msg.document(), msg.from()) else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let settings = state.imitator.settings();

    if u64::from(doc.file.size) > settings.max_upload_bytes {
        warn!(user_id, size = doc.file.size, "Export too large");
        bot.send_message(msg.chat.id, "❌ Размер файла превышает лимит в 20MB или неизвестен.")
            .reply_to_message_id(msg.id)
            .await?;
        return Ok(());
    }
    let filename = doc.file_name.clone().unwrap_or_default();
    if !filename.to_lowercase().ends_with(".html") {
        warn!(user_id, filename = %filename, "Export is not HTML");
        bot.send_message(msg.chat.id, "❌ Пожалуйста, отправьте HTML-экспорт из Telegram.")
            .reply_to_message_id(msg.id)
            .await?;
        return Ok(());
    }

    let processing = bot
        .send_message(msg.chat.id, "⏳ Обрабатываю файл...")
        .reply_to_message_id(msg.id)
        .await?;

    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut bytes = Vec::with_capacity(doc.file.size as usize);
    if let Err(err) = bot.download_file(&file.path, &mut bytes).await {
        error!(user_id, "Failed to download export: {}", err);
        bot.edit_message_text(
            msg.chat.id,
            processing.id,
            "❌ Не удалось скачать файл. Попробуйте еще раз.",
        )
        .await?;
        return Ok(());
    }
    info!(user_id, bytes = bytes.len(), "Export downloaded");

    let owner = owner_name(user);
    let report = match state
        .imitator
        .ingest_transcript(user_id, &owner, &bytes, &filename)
        .await
    {
        Ok(report) => report,
        Err(err) => {
            error!(user_id, "Failed to ingest export: {}", err);
            bot.edit_message_text(
                msg.chat.id,
                processing.id,
                "❌ В файле не найдено сообщений или возникла ошибка при обработке.",
            )
            .await?;
            return Ok(());
        }
    };

    if report.is_empty() {
        bot.edit_message_text(
            msg.chat.id,
            processing.id,
            "❌ В файле не найдено сообщений или возникла ошибка при обработке.",
        )
        .await?;
        return Ok(());
    }

    let mut text = if report.owner_messages > 0 {
        format!(
            "✅ Загружено и сохранено {} ваших сообщений.\n",
            report.owner_messages
        )
    } else {
        "✅ Файл обработан. Ваши сообщения не найдены/сохранены.\n".to_string()
    };

    let markup = if report.saved_participants > 0 {
        text.push_str(&format!(
            "✅ Сохранено/обновлено {} профилей других участников.\n\
             👥 Выберите человека для имитации (из только что загруженных):",
            report.saved_participants
        ));
        targets_keyboard(&report.participants)
    } else {
        text.push_str(
            "🤷‍♂️ Других участников не найдено/сохранено из этого файла. \
             Вы можете управлять ранее сохраненными профилями в меню.",
        );
        main_keyboard()
    };

    bot.edit_message_text(msg.chat.id, processing.id, text)
        .reply_markup(markup)
        .await?;
    Ok(())
}

async fn handle_callback(bot: Bot, state: AppState, query: CallbackQuery) -> ResponseResult<()> {
    let Some(action) = query.data.as_deref().and_then(Action::parse) else {
        bot.answer_callback_query(query.id.clone())
            .text("Ошибка: неверный формат данных.")
            .show_alert(true)
            .await?;
        return Ok(());
    };
    let Some(message) = query.message.as_ref() else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat.id;
    let message_id = message.id;
    let user_id = query.from.id.0 as i64;
    let imitator = &state.imitator;
    let cancelled = action == Action::DeleteCancel;

    match action {
        Action::Back => {
            edit(&bot, chat_id, message_id, MAIN_MENU_TEXT, main_keyboard()).await;
            bot.answer_callback_query(query.id.clone()).await?;
        }
        Action::ImitateOther => {
            let markup = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    "📁 Загрузить новый чат",
                    "upload_other",
                )],
                vec![InlineKeyboardButton::callback(
                    "👤 Управление профилями",
                    "manage_profiles",
                )],
                vec![InlineKeyboardButton::callback("⬅️ Назад", "back")],
            ]);
            edit(
                &bot,
                chat_id,
                message_id,
                "Что вы хотите сделать?\n\
                 📁 - Загрузить новый чат для добавления/обновления профилей.\n\
                 👤 - Выбрать или удалить уже сохраненный профиль для имитации.",
                markup,
            )
            .await;
            bot.answer_callback_query(query.id.clone()).await?;
        }
        Action::UploadOther => {
            let markup = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
                "⬅️ Назад",
                "imitate_other",
            )]]);
            edit(
                &bot,
                chat_id,
                message_id,
                "📤 Отправьте экспорт чата в HTML формате.\n\
                 Найденные профили (ваш и других участников) будут сохранены или обновлены.",
                markup,
            )
            .await;
            bot.answer_callback_query(query.id.clone()).await?;
        }
        Action::ManageProfiles | Action::DeleteCancel => {
            let targets = imitator.list_targets(user_id).await;
            let text = if targets.is_empty() {
                NO_PROFILES_TEXT
            } else {
                PROFILES_TEXT
            };
            edit(&bot, chat_id, message_id, text, profiles_keyboard(&targets)).await;
            let answer = bot.answer_callback_query(query.id.clone());
            if cancelled {
                answer.text("Удаление отменено.").await?;
            } else {
                answer.await?;
            }
        }
        Action::Stats => {
            let label = user_label(&query.from);
            match imitator.statistics_report(user_id, &label).await {
                None => {
                    edit(
                        &bot,
                        chat_id,
                        message_id,
                        "📊 Нет сохраненных данных для статистики.",
                        main_keyboard(),
                    )
                    .await;
                    bot.answer_callback_query(query.id.clone()).await?;
                }
                Some(report) => {
                    let file = InputFile::memory(report.into_bytes())
                        .file_name(format!("stats_{}.txt", label));
                    if let Err(err) = bot
                        .send_document(chat_id, file)
                        .caption(format!("📊 Ваша статистика (@{}) в TXT", label))
                        .reply_markup(back_keyboard())
                        .await
                    {
                        error!(user_id, "Failed to send statistics: {}", err);
                        bot.answer_callback_query(query.id.clone())
                            .text("Произошла ошибка при отправке статистики")
                            .show_alert(true)
                            .await?;
                        return Ok(());
                    }
                    if let Err(err) = bot.delete_message(chat_id, message_id).await {
                        warn!(user_id, "Failed to delete menu message: {}", err);
                    }
                    bot.answer_callback_query(query.id.clone()).await?;
                }
            }
        }
        Action::ClearData => {
            let markup = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    "✅ Да, удалить всё",
                    "clear_data_confirm",
                )],
                vec![InlineKeyboardButton::callback("❌ Отмена", "back")],
            ]);
            edit(
                &bot,
                chat_id,
                message_id,
                "❓ Вы уверены, что хотите удалить ВСЕ свои сохраненные профили и данные?\n\
                 ❗️ Это действие необратимо!",
                markup,
            )
            .await;
            bot.answer_callback_query(query.id.clone()).await?;
        }
        Action::ClearDataConfirm => {
            let text = if imitator.clear_all(user_id).await {
                "🧹 Все ваши данные и профили удалены."
            } else {
                "❌ Ошибка очистки данных в базе."
            };
            edit(&bot, chat_id, message_id, text, main_keyboard()).await;
            bot.answer_callback_query(query.id.clone())
                .text("Данные удалены.")
                .await?;
        }
        Action::ExitImitation => {
            imitator.exit_imitation(user_id).await;
            if let Err(err) = bot
                .edit_message_text(chat_id, message_id, "Режим имитации выключен.")
                .await
            {
                warn!(user_id, "Failed to edit exit message: {}", err);
                bot.send_message(chat_id, "Режим имитации выключен.").await?;
            }
            bot.send_message(chat_id, MAIN_MENU_TEXT)
                .reply_markup(main_keyboard())
                .await?;
            bot.answer_callback_query(query.id.clone())
                .text("Вы вышли из режима имитации.")
                .await?;
        }
        Action::NoProfiles => {
            bot.answer_callback_query(query.id.clone()).await?;
        }
        Action::SelectTarget(target) => match imitator.select_target(user_id, &target).await {
            Ok(selected) => {
                edit(
                    &bot,
                    chat_id,
                    message_id,
                    &format!(
                        "✅ Выбран стиль {}.\nНапишите что-нибудь для имитации:",
                        selected.target
                    ),
                    exit_keyboard(),
                )
                .await;
                bot.answer_callback_query(query.id.clone()).await?;
            }
            Err(err) => {
                let alert = match &err {
                    Error::InsufficientData {
                        target,
                        found,
                        required,
                    } => format!(
                        "⚠️ Недостаточно данных ({}/{}) для имитации стиля {}. \
                         Загрузите больше сообщений этого профиля.",
                        found, required, target
                    ),
                    _ => format!(
                        "❌ Ошибка: Нет сохраненных сообщений для {}. \
                         Возможно, профиль был удален или поврежден.",
                        target
                    ),
                };
                warn!(user_id, target = %target, "Target selection refused: {}", err);
                bot.answer_callback_query(query.id.clone())
                    .text(alert)
                    .show_alert(true)
                    .await?;
            }
        },
        Action::DeleteRequest(target) => {
            edit(
                &bot,
                chat_id,
                message_id,
                &format!(
                    "Вы уверены, что хотите удалить профиль\n'{}'?\n\n\
                     ❗️ Это действие необратимо и удалит все сохраненные сообщения и стиль для этого профиля.",
                    target
                ),
                delete_confirm_keyboard(&target),
            )
            .await;
            bot.answer_callback_query(query.id.clone()).await?;
        }
        Action::DeleteConfirm(target) => {
            if imitator.delete_target(user_id, &target).await {
                bot.answer_callback_query(query.id.clone())
                    .text(format!("Профиль '{}' удален.", target))
                    .await?;
                let targets = imitator.list_targets(user_id).await;
                let mut text = format!("✅ Профиль '{}' удален.\n\n👤 Управление профилями:", target);
                if targets.is_empty() {
                    text.push_str("\nУ вас больше нет сохраненных профилей.");
                }
                edit(&bot, chat_id, message_id, &text, profiles_keyboard(&targets)).await;
            } else {
                bot.answer_callback_query(query.id.clone())
                    .text(
                        "❌ Не удалось удалить профиль. Возможно, он уже был удален или произошла ошибка БД.",
                    )
                    .show_alert(true)
                    .await?;
                let targets = imitator.list_targets(user_id).await;
                edit(
                    &bot,
                    chat_id,
                    message_id,
                    "👤 Управление профилями:",
                    profiles_keyboard(&targets),
                )
                .await;
            }
        }
    }

    Ok(())
}

/// Edit a menu message in place, sending a fresh one when editing fails.
async fn edit(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    markup: InlineKeyboardMarkup,
) {
    if let Err(err) = bot
        .edit_message_text(chat_id, message_id, text)
        .reply_markup(markup.clone())
        .await
    {
        warn!("Failed to edit message, sending a new one: {}", err);
        if let Err(err) = bot.send_message(chat_id, text).reply_markup(markup).await {
            error!("Failed to send menu message: {}", err);
        }
    }
}
