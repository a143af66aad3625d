mod callback;
mod error;
mod sheets;
mod survey;

use std::collections::HashMap;
use std::sync::Arc;

use dotenv::dotenv;
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, User},
};
use tokio::sync::RwLock;

use callback::CallbackAction;
use error::BotError;
use sheets::http::GoogleSheets;
use sheets::table::{RowTable, SheetSchema};
use sheets::{spreadsheet_id_from_url, SheetsTransport};
use survey::grid::{self, QUESTION_SHEET};
use survey::results;
use survey::session::{QuizSession, Step};
use survey::store::SurveyStore;
use survey::Question;

type SurveyDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SessionStorage = std::sync::Arc<ErasedStorage<State>>;
/// Survey name -> transport of the document it was loaded from, so results
/// land in the same spreadsheet the questions came from.
type SurveyLinks = Arc<RwLock<HashMap<String, Arc<dyn SheetsTransport>>>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    AwaitingReady,
    ChoosingSurvey,
    TakingSurvey {
        session: QuizSession,
    },
}

const STUDENTS_SHEET: &str = "Students";
const TEACHERS_SHEET: &str = "Teachers";
const ROLE_COLUMN: &str = "Role";
const STUDENT_ROLE: &str = "student";
const DEFAULT_SCAN_LIMIT: usize = 1000;

const GREETING_TEXT: &str =
    "Привет! Я бот для прохождения тестов. Отправь /ready, когда будешь готов получить тест.";
const HELP_TEXT: &str = "Отправь /ready, когда будешь готов получить тест. Преподаватель может загрузить тест командой /load <ссылка на таблицу>";
const READY_BUTTON: &str = "Готов получить тест";
const READY_PROMPT: &str = "Нажмите кнопку ниже, чтобы получить тест";
const CHOOSE_SURVEY: &str = "Выберите тест";
const NO_SURVEYS: &str = "Пока нет загруженных тестов. Ожидайте сообщения о начале теста";
const USE_BUTTONS: &str = "Используйте кнопки под сообщением";
const SURVEY_MISSING: &str = "Тест не найден. Обратитесь к преподавателю";
const RESULTS_FAILED: &str = "Не удалось сохранить результаты теста. Сообщите преподавателю";
const SERVICE_UNAVAILABLE: &str = "Сервис временно недоступен, попробуйте позже";
const TEACHERS_ONLY: &str = "Загружать тесты может только преподаватель";
const LOAD_USAGE: &str = "Пришлите ссылку на таблицу с тестом: /load <ссылка>";
const LOAD_FAILED: &str = "Не удалось загрузить тест из таблицы";

fn roster_schema() -> SheetSchema {
    SheetSchema::new()
        .sheet(STUDENTS_SHEET, ["ID", "Name", "Role"])
        .sheet(TEACHERS_SHEET, ["ID", "Name", "Role"])
}

#[tokio::main]
async fn main() {
    dotenv().expect("Failed to load .env file");
    pretty_env_logger::init();
    log::info!("Starting survey bot...");

    let bot = Bot::from_env();

    let sheets_token =
        std::env::var("SHEETS_ACCESS_TOKEN").expect("SHEETS_ACCESS_TOKEN is not set");
    let spreadsheet_id = std::env::var("SPREADSHEET_ID").unwrap_or_default();
    let surveys_dir = std::env::var("SURVEYS_DIR").unwrap_or_else(|_| "surveys".to_string());
    let scan_limit = std::env::var("ROW_SCAN_LIMIT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_SCAN_LIMIT);

    println!("Establishing connection to the database...");
    let storage: SessionStorage = SqliteStorage::open("db.sqlite", Json)
        .await
        .unwrap()
        .erase();
    println!("Connection established");

    let main_sheets = Arc::new(GoogleSheets::new(spreadsheet_id.clone(), sheets_token.clone()));
    let roster = Arc::new(RowTable::new(main_sheets, roster_schema(), scan_limit));

    if spreadsheet_id.is_empty() {
        let id = roster
            .provision_spreadsheet("Учебные тесты")
            .await
            .expect("Failed to provision a spreadsheet");
        log::info!("Created new spreadsheet at https://docs.google.com/spreadsheets/d/{id}/edit#gid=0");
    } else {
        log::info!("Open existing spreadsheet at https://docs.google.com/spreadsheets/d/{spreadsheet_id}/edit#gid=0");
    }

    let store = Arc::new(SurveyStore::new(surveys_dir));
    let links: SurveyLinks = Arc::new(RwLock::new(HashMap::new()));

    let roster_for_start = roster.clone();
    let roster_for_messages = roster.clone();
    let store_for_messages = store.clone();
    let links_for_messages = links.clone();
    let store_for_menu = store.clone();
    let store_for_begin = store.clone();
    let links_for_begin = links.clone();
    let store_for_answer = store.clone();
    let links_for_answer = links.clone();

    Dispatcher::builder(
        bot,
        dptree::entry()
            .branch(
                Update::filter_message()
                    .enter_dialogue::<Message, ErasedStorage<State>, State>()
                    .branch(dptree::case![State::Start].endpoint(
                        move |bot: Bot, dialogue: SurveyDialogue, msg: Message| {
                            start(roster_for_start.clone(), bot, dialogue, msg)
                        },
                    ))
                    .branch(dptree::case![State::AwaitingReady].endpoint(
                        move |bot: Bot, msg: Message| {
                            awaiting_ready(
                                roster_for_messages.clone(),
                                store_for_messages.clone(),
                                links_for_messages.clone(),
                                sheets_token.clone(),
                                bot,
                                msg,
                            )
                        },
                    ))
                    .branch(dptree::case![State::ChoosingSurvey].endpoint(hint_use_buttons))
                    .branch(
                        dptree::case![State::TakingSurvey { session }].endpoint(hint_use_buttons),
                    ),
            )
            .branch(
                Update::filter_callback_query()
                    .enter_dialogue::<CallbackQuery, ErasedStorage<State>, State>()
                    .branch(dptree::case![State::AwaitingReady].endpoint(
                        move |bot: Bot, dialogue: SurveyDialogue, q: CallbackQuery| {
                            ready_pressed(store_for_menu.clone(), bot, dialogue, q)
                        },
                    ))
                    .branch(dptree::case![State::ChoosingSurvey].endpoint(
                        move |bot: Bot, dialogue: SurveyDialogue, q: CallbackQuery| {
                            begin_survey(
                                store_for_begin.clone(),
                                links_for_begin.clone(),
                                bot,
                                dialogue,
                                q,
                            )
                        },
                    ))
                    .branch(dptree::case![State::TakingSurvey { session }].endpoint(
                        move |bot: Bot,
                              dialogue: SurveyDialogue,
                              session: QuizSession,
                              q: CallbackQuery| {
                            answer_submitted(
                                store_for_answer.clone(),
                                links_for_answer.clone(),
                                bot,
                                dialogue,
                                session,
                                q,
                            )
                        },
                    )),
            ),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

async fn start(
    roster: Arc<RowTable>,
    bot: Bot,
    dialogue: SurveyDialogue,
    msg: Message,
) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if let Err(e) = register_student(&roster, user).await {
        log::error!("Failed to register user {}: {e}", user.id);
        bot.send_message(msg.chat.id, SERVICE_UNAVAILABLE).await?;
        return Ok(());
    }
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    dialogue.update(State::AwaitingReady).await?;
    Ok(())
}

async fn register_student(roster: &RowTable, user: &User) -> Result<(), BotError> {
    let key = user.id.to_string();
    let known = roster.get_row(STUDENTS_SHEET, &key).await?;
    if known.is_empty() {
        roster
            .upsert_row(
                STUDENTS_SHEET,
                &[key, user.full_name(), STUDENT_ROLE.to_string()],
            )
            .await?;
    }
    Ok(())
}

async fn is_student(roster: &RowTable, key: &str) -> Result<bool, BotError> {
    let row = roster.get_row(STUDENTS_SHEET, key).await?;
    Ok(row.get(ROLE_COLUMN).map(String::as_str) == Some(STUDENT_ROLE))
}

async fn is_teacher(roster: &RowTable, key: &str) -> Result<bool, BotError> {
    let row = roster.get_row(TEACHERS_SHEET, key).await?;
    Ok(!row.is_empty())
}

async fn awaiting_ready(
    roster: Arc<RowTable>,
    store: Arc<SurveyStore>,
    links: SurveyLinks,
    sheets_token: String,
    bot: Bot,
    msg: Message,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };

    if text == "/ready" {
        match is_student(&roster, &user.id.to_string()).await {
            Ok(true) => {
                let keyboard = InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::callback(READY_BUTTON, callback::READY),
                ]]);
                bot.send_message(msg.chat.id, READY_PROMPT)
                    .reply_markup(keyboard)
                    .await?;
            }
            Ok(false) => {
                log::debug!("Ignoring /ready from non-student {}", user.id);
            }
            Err(e) => {
                log::error!("Role lookup failed for {}: {e}", user.id);
                bot.send_message(msg.chat.id, SERVICE_UNAVAILABLE).await?;
            }
        }
    } else if let Some(link) = text.strip_prefix("/load") {
        match is_teacher(&roster, &user.id.to_string()).await {
            Ok(true) => {
                load_survey(roster, store, links, sheets_token, bot, msg.chat.id, link.trim())
                    .await?;
            }
            Ok(false) => {
                bot.send_message(msg.chat.id, TEACHERS_ONLY).await?;
            }
            Err(e) => {
                log::error!("Role lookup failed for {}: {e}", user.id);
                bot.send_message(msg.chat.id, SERVICE_UNAVAILABLE).await?;
            }
        }
    } else {
        bot.send_message(msg.chat.id, HELP_TEXT).await?;
    }
    Ok(())
}

async fn load_survey(
    roster: Arc<RowTable>,
    store: Arc<SurveyStore>,
    links: SurveyLinks,
    sheets_token: String,
    bot: Bot,
    chat_id: ChatId,
    link: &str,
) -> HandlerResult {
    let Some(id) = spreadsheet_id_from_url(link) else {
        bot.send_message(chat_id, LOAD_USAGE).await?;
        return Ok(());
    };
    let source: Arc<dyn SheetsTransport> = Arc::new(GoogleSheets::new(id, sheets_token));
    match grid::ingest(source.as_ref(), QUESTION_SHEET).await {
        Ok(survey) => {
            store.save(&survey)?;
            links.write().await.insert(survey.name.clone(), source);
            log::info!("Loaded survey {:?} with {} questions", survey.name, survey.len());
            bot.send_message(
                chat_id,
                format!("Тест \"{}\" загружен ({} вопросов)", survey.name, survey.len()),
            )
            .await?;
            notify_students(&roster, &bot, &survey.name).await;
        }
        Err(e) => {
            log::error!("Survey ingestion failed: {e}");
            bot.send_message(chat_id, LOAD_FAILED).await?;
        }
    }
    Ok(())
}

/// Tells every registered student a new survey can be taken. One student's
/// delivery failure must not hide the survey from the rest.
async fn notify_students(roster: &RowTable, bot: &Bot, survey_name: &str) {
    let ids = match roster.first_column(STUDENTS_SHEET).await {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("Failed to read the student roster: {e}");
            return;
        }
    };
    let text = format!("Доступен новый тест \"{survey_name}\". Отправьте /ready, чтобы пройти его");
    for id in ids {
        let Ok(chat) = id.parse::<i64>() else {
            log::warn!("Skipping roster entry with a non-numeric id {id:?}");
            continue;
        };
        if let Err(e) = bot.send_message(ChatId(chat), &text).await {
            log::warn!("Failed to notify student {id}: {e}");
        }
    }
}

async fn hint_use_buttons(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, USE_BUTTONS).await?;
    Ok(())
}

async fn ready_pressed(
    store: Arc<SurveyStore>,
    bot: Bot,
    dialogue: SurveyDialogue,
    q: CallbackQuery,
) -> HandlerResult {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    if let Some(message) = q.message.as_ref() {
        match CallbackAction::parse(data) {
            Ok(CallbackAction::Ready) => {
                let surveys = store.list()?;
                if surveys.is_empty() {
                    bot.edit_message_text(message.chat.id, message.id, NO_SURVEYS)
                        .await?;
                } else {
                    let keyboard = InlineKeyboardMarkup::new(surveys.iter().map(|name| {
                        vec![InlineKeyboardButton::callback(
                            name.clone(),
                            CallbackAction::begin(name, 0),
                        )]
                    }));
                    bot.edit_message_text(message.chat.id, message.id, CHOOSE_SURVEY)
                        .reply_markup(keyboard)
                        .await?;
                    dialogue.update(State::ChoosingSurvey).await?;
                }
            }
            Ok(other) => log::debug!("Ignoring callback {other:?} before the ready button"),
            Err(e) => log::warn!("{e}"),
        }
    }
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn begin_survey(
    store: Arc<SurveyStore>,
    links: SurveyLinks,
    bot: Bot,
    dialogue: SurveyDialogue,
    q: CallbackQuery,
) -> HandlerResult {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    if let Some(message) = q.message.as_ref() {
        match CallbackAction::parse(data) {
            Ok(CallbackAction::Begin { survey, index }) => {
                start_survey(
                    &store,
                    &links,
                    &bot,
                    &dialogue,
                    message,
                    q.from.full_name(),
                    &survey,
                    index,
                )
                .await?;
            }
            Ok(other) => log::debug!("Ignoring callback {other:?} while choosing a survey"),
            Err(e) => log::warn!("{e}"),
        }
    }
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn answer_submitted(
    store: Arc<SurveyStore>,
    links: SurveyLinks,
    bot: Bot,
    dialogue: SurveyDialogue,
    mut session: QuizSession,
    q: CallbackQuery,
) -> HandlerResult {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    if let Some(message) = q.message.as_ref() {
        match CallbackAction::parse(data) {
            Ok(CallbackAction::Answer { survey, index, chosen })
                if survey == session.survey_name =>
            {
                let loaded = match store.load(&survey) {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        log::error!("Survey {survey:?} disappeared mid-session: {e}");
                        bot.edit_message_text(message.chat.id, message.id, SURVEY_MISSING)
                            .await?;
                        dialogue.update(State::AwaitingReady).await?;
                        bot.answer_callback_query(q.id).await?;
                        return Ok(());
                    }
                };
                match session.advance(&loaded, index, Some(&chosen)) {
                    Ok(Step::Ask {
                        question,
                        reply_index,
                    }) => {
                        ask_question(&bot, message, &survey, question, reply_index).await?;
                        dialogue.update(State::TakingSurvey { session }).await?;
                    }
                    Ok(Step::Finished { summary }) => {
                        finish_session(&links, &bot, message, &session, &summary).await?;
                        dialogue.update(State::AwaitingReady).await?;
                    }
                    Err(e) => log::warn!("Rejected answer callback: {e}"),
                }
            }
            // a tap on a stale survey menu restarts with a fresh session
            Ok(CallbackAction::Begin { survey, index }) => {
                start_survey(
                    &store,
                    &links,
                    &bot,
                    &dialogue,
                    message,
                    q.from.full_name(),
                    &survey,
                    index,
                )
                .await?;
            }
            Ok(other) => log::debug!("Ignoring callback {other:?} mid-survey"),
            Err(e) => log::warn!("{e}"),
        }
    }
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn start_survey(
    store: &SurveyStore,
    links: &SurveyLinks,
    bot: &Bot,
    dialogue: &SurveyDialogue,
    message: &Message,
    student: String,
    name: &str,
    index: usize,
) -> HandlerResult {
    let survey = match store.load(name) {
        Ok(survey) => survey,
        Err(e) => {
            log::error!("Survey {name:?} unavailable: {e}");
            bot.edit_message_text(message.chat.id, message.id, SURVEY_MISSING)
                .await?;
            dialogue.update(State::AwaitingReady).await?;
            return Ok(());
        }
    };
    let mut session = QuizSession::new(student, name);
    match session.advance(&survey, index, None) {
        Ok(Step::Ask {
            question,
            reply_index,
        }) => {
            ask_question(bot, message, name, question, reply_index).await?;
            dialogue.update(State::TakingSurvey { session }).await?;
        }
        Ok(Step::Finished { summary }) => {
            finish_session(links, bot, message, &session, &summary).await?;
            dialogue.update(State::AwaitingReady).await?;
        }
        Err(e) => log::warn!("Rejected survey start: {e}"),
    }
    Ok(())
}

async fn ask_question(
    bot: &Bot,
    message: &Message,
    survey_name: &str,
    question: &Question,
    reply_index: usize,
) -> HandlerResult {
    let keyboard = InlineKeyboardMarkup::new(question.options().map(|option| {
        vec![InlineKeyboardButton::callback(
            option.to_string(),
            CallbackAction::answer(survey_name, reply_index, option),
        )]
    }));
    bot.edit_message_text(message.chat.id, message.id, question.prompt())
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn finish_session(
    links: &SurveyLinks,
    bot: &Bot,
    message: &Message,
    session: &QuizSession,
    summary: &str,
) -> HandlerResult {
    bot.edit_message_text(
        message.chat.id,
        message.id,
        format!("Вы прошли тест на {summary}"),
    )
    .await?;
    log::info!(
        "{} (chat {}) passed survey {:?} with {summary}",
        session.student,
        message.chat.id,
        session.survey_name
    );

    let transport = links.read().await.get(&session.survey_name).cloned();
    match transport {
        Some(transport) => {
            if let Err(e) = results::record(transport.as_ref(), session).await {
                log::error!("Failed to record results for {:?}: {e}", session.survey_name);
                bot.send_message(message.chat.id, RESULTS_FAILED).await?;
            }
        }
        None => {
            log::error!(
                "No spreadsheet registered for survey {:?}; results not recorded",
                session.survey_name
            );
            bot.send_message(message.chat.id, RESULTS_FAILED).await?;
        }
    }
    Ok(())
}
