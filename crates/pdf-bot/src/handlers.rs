//! Routing of incoming updates to sessions and the dispatcher

use crate::telegram::{
    BotClient, CallbackQuery, ChatOutbox, Document, Message, PhotoSize, Update, action_keyboard,
};
use pdf_bot_runtime::{Action, Dispatcher, FileKind, Outcome, SessionError, UserId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const WELCOME: &str =
    "Welcome! Send me PDF files or images.\nChoose an action using the buttons below:";
const CHOOSE_ACTION: &str = "Choose an action using the buttons below:";
const SPLIT_PROMPT: &str = "To split a PDF, send the command with the page number, e.g. /split 3";
const CLEARED: &str = "Cleared all your uploaded files.";
const INVALID_PDF: &str = "Please send a valid PDF file.";
const IMAGE_RECEIVED: &str = "Image received!";
const PDF_UPLOAD_FAILED: &str =
    "Oops! Something went wrong while processing your PDF. Please try again.";
const IMAGE_UPLOAD_FAILED: &str =
    "Oops! Something went wrong while processing your image. Please try again.";

const PDF_MIME: &str = "application/pdf";
const FALLBACK_PDF_NAME: &str = "document.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    /// `/split <n>`; `None` when the argument is missing or not a number
    Split(Option<usize>),
    Clear,
    Help,
}

/// Parse a `/command [arg]` message, accepting the `/command@botname` form.
///
/// Returns `None` for plain text and commands the bot does not know.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut words = text.trim().strip_prefix('/')?.split_whitespace();
    let head = words.next()?;
    let name = head.split_once('@').map_or(head, |(name, _)| name);

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "split" => Some(Command::Split(words.next().and_then(parse_page_number))),
        "clear" => Some(Command::Clear),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Digits only: signs and other characters are rejected
fn parse_page_number(arg: &str) -> Option<usize> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    arg.parse().ok()
}

/// Name an uploaded PDF is staged under (before the user prefix).
///
/// Directory components are dropped and a `.pdf` extension is added when
/// missing, so the file is recognized as a PDF later.
pub fn staged_pdf_name(file_name: Option<&str>) -> String {
    let base = file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_PDF_NAME);

    if FileKind::Pdf.matches(base) {
        base.to_string()
    } else {
        format!("{base}.pdf")
    }
}

/// Highest-resolution variant of an uploaded photo
pub fn largest_photo(photos: &[PhotoSize]) -> Option<&PhotoSize> {
    photos.iter().max_by_key(|photo| photo.area())
}

enum Staging {
    Recorded,
    Refused(SessionError),
}

pub struct Handler<C> {
    api: Arc<C>,
    dispatcher: Arc<Dispatcher>,
}

impl<C: BotClient> Handler<C> {
    pub fn new(api: Arc<C>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { api, dispatcher }
    }

    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let result = if let Some(query) = update.callback_query {
            self.on_callback(query).await
        } else if let Some(message) = update.message {
            self.on_message(message).await
        } else {
            Ok(())
        };

        if let Err(e) = result {
            log::warn!("Update {} not fully handled: {:#}", update_id, e);
        }
    }

    async fn on_message(&self, message: Message) -> anyhow::Result<()> {
        let Some(user) = message.from.as_ref().map(|from| UserId(from.id)) else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        if let Some(document) = message.document {
            return self.on_document(user, chat_id, document).await;
        }
        if let Some(photo) = largest_photo(&message.photo) {
            return self.on_photo(user, chat_id, photo).await;
        }
        match message.text.as_deref().and_then(parse_command) {
            Some(command) => self.on_command(user, chat_id, command).await,
            None => Ok(()),
        }
    }

    async fn on_command(&self, user: UserId, chat_id: i64, command: Command) -> anyhow::Result<()> {
        log::debug!("User {}: {:?}", user, command);
        match command {
            Command::Start => {
                self.dispatcher.store().reset(user).await;
                self.api
                    .send_message(chat_id, WELCOME, Some(&action_keyboard()))
                    .await?;
            }
            Command::Split(at) => {
                self.dispatch(user, chat_id, Action::Split { at }).await;
            }
            Command::Clear => {
                self.dispatch(user, chat_id, Action::Clear).await;
                self.api.send_message(chat_id, CLEARED, None).await?;
            }
            Command::Help => self.send_actions(chat_id).await?,
        }
        Ok(())
    }

    async fn on_document(&self, user: UserId, chat_id: i64, document: Document) -> anyhow::Result<()> {
        if document.mime_type.as_deref() != Some(PDF_MIME) {
            self.api.send_message(chat_id, INVALID_PDF, None).await?;
            return Ok(());
        }

        let shown = document.file_name.as_deref().unwrap_or(FALLBACK_PDF_NAME);
        let path = self.dispatcher.work_dir().join(format!(
            "{}_{}",
            user,
            staged_pdf_name(document.file_name.as_deref())
        ));

        match self
            .stage(user, &document.file_id, document.file_size, path)
            .await
        {
            Ok(Staging::Recorded) => {
                log::info!("User {}: staged PDF {}", user, shown);
                self.api
                    .send_message(chat_id, &format!("PDF received: {shown}"), None)
                    .await?;
                self.send_actions(chat_id).await?;
            }
            Ok(Staging::Refused(reason)) => {
                self.api.send_message(chat_id, &reason.to_string(), None).await?;
            }
            Err(e) => {
                log::error!("Error in handle_document for user {}: {:#}", user, e);
                self.api.send_message(chat_id, PDF_UPLOAD_FAILED, None).await?;
            }
        }
        Ok(())
    }

    async fn on_photo(&self, user: UserId, chat_id: i64, photo: &PhotoSize) -> anyhow::Result<()> {
        let path = self
            .dispatcher
            .work_dir()
            .join(format!("{}_img_{}.jpg", user, photo.file_unique_id));

        match self.stage(user, &photo.file_id, photo.file_size, path).await {
            Ok(Staging::Recorded) => {
                log::info!(
                    "User {}: staged image {}x{}",
                    user,
                    photo.width,
                    photo.height
                );
                self.api.send_message(chat_id, IMAGE_RECEIVED, None).await?;
                self.send_actions(chat_id).await?;
            }
            Ok(Staging::Refused(reason)) => {
                self.api.send_message(chat_id, &reason.to_string(), None).await?;
            }
            Err(e) => {
                log::error!("Error in handle_photo for user {}: {:#}", user, e);
                self.api.send_message(chat_id, IMAGE_UPLOAD_FAILED, None).await?;
            }
        }
        Ok(())
    }

    /// Download a file into the working directory and record it.
    ///
    /// The session stays locked for the whole download, so an action
    /// triggered meanwhile sees either none or all of the upload.
    async fn stage(
        &self,
        user: UserId,
        file_id: &str,
        declared_size: Option<u64>,
        path: PathBuf,
    ) -> anyhow::Result<Staging> {
        let staged = self.stage_locked(user, file_id, declared_size, path).await;
        self.dispatcher.store().release(user);
        staged
    }

    async fn stage_locked(
        &self,
        user: UserId,
        file_id: &str,
        declared_size: Option<u64>,
        path: PathBuf,
    ) -> anyhow::Result<Staging> {
        let mut session = self.dispatcher.store().lock(user).await;
        if let Err(reason) = session.ensure_capacity(declared_size) {
            return Ok(Staging::Refused(reason));
        }

        let size = match self.api.download_file(file_id, &path).await {
            Ok(size) => size,
            Err(e) => {
                remove_partial(&path).await;
                return Err(e);
            }
        };
        if let Err(reason) = session.ensure_capacity(Some(size)) {
            remove_partial(&path).await;
            return Ok(Staging::Refused(reason));
        }

        session.record(path)?;
        Ok(Staging::Recorded)
    }

    async fn on_callback(&self, query: CallbackQuery) -> anyhow::Result<()> {
        if let Err(e) = self.api.answer_callback_query(&query.id).await {
            log::warn!("Failed to answer callback {}: {:#}", query.id, e);
        }

        let user = UserId(query.from.id);
        let (chat_id, message_id) = match &query.message {
            Some(message) => (message.chat.id, Some(message.message_id)),
            // Private chats share the user's id
            None => (query.from.id, None),
        };

        let Some(data) = query.data.as_deref() else {
            return Ok(());
        };
        let action = match data.parse::<Action>() {
            Ok(action) => action,
            Err(e) => {
                log::warn!("User {}: {}", user, e);
                return Ok(());
            }
        };

        match action {
            Action::Split { .. } => self.replace_text(chat_id, message_id, SPLIT_PROMPT).await,
            Action::Clear => {
                self.dispatch(user, chat_id, Action::Clear).await;
                self.replace_text(chat_id, message_id, CLEARED).await
            }
            other => {
                self.dispatch(user, chat_id, other).await;
                Ok(())
            }
        }
    }

    async fn dispatch(&self, user: UserId, chat_id: i64, action: Action) -> Outcome {
        let outbox = ChatOutbox::new(self.api.clone(), chat_id);
        self.dispatcher.dispatch(user, action, &outbox).await
    }

    async fn send_actions(&self, chat_id: i64) -> anyhow::Result<()> {
        self.api
            .send_message(chat_id, CHOOSE_ACTION, Some(&action_keyboard()))
            .await?;
        Ok(())
    }

    /// Edit the keyboard message in place, or send a new one if it is gone
    async fn replace_text(&self, chat_id: i64, message_id: Option<i64>, text: &str) -> anyhow::Result<()> {
        match message_id {
            Some(message_id) => self.api.edit_message_text(chat_id, message_id, text).await,
            None => self.api.send_message(chat_id, text, None).await,
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Error deleting file {}: {}", path.display(), e),
    }
}
