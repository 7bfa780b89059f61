//! Telegram Bot API client over long polling

mod types;

pub use types::*;

use anyhow::Context;
use pdf_bot_runtime::{Action, Outbox};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

/// Extra time allowed on top of the long-poll timeout before the request is abandoned
const POLL_GRACE: Duration = Duration::from_secs(10);

/// The Bot API calls update handling needs
pub trait BotClient: Send + Sync + 'static {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Replace the text of a message the bot sent earlier
    fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn answer_callback_query(
        &self,
        callback_query_id: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Download a file by its `file_id` to `dest`, returning its size in bytes
    fn download_file(
        &self,
        file_id: &str,
        dest: &Path,
    ) -> impl Future<Output = anyhow::Result<u64>> + Send;

    fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn send_photo(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

pub struct BotApi {
    token: String,
    client: reqwest::Client,
}

impl BotApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", API_BASE, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<T> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await?;
        read_response(method, resp).await
    }

    async fn upload<T: DeserializeOwned>(&self, method: &str, form: Form) -> anyhow::Result<T> {
        let resp = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .send()
            .await?;
        read_response(method, resp).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> anyhow::Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .timeout(timeout + POLL_GRACE)
            .json(&body)
            .send()
            .await?;
        read_response("getUpdates", resp).await
    }
}

impl BotClient for BotApi {
    async fn download_file(&self, file_id: &str, dest: &Path) -> anyhow::Result<u64> {
        let file: File = self
            .call("getFile", &serde_json::json!({ "file_id": file_id }))
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| anyhow::anyhow!("Missing file_path in getFile response"))?;

        let resp = self.client.get(self.file_url(&file_path)).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("Failed to download file from Telegram: {}", resp.status());
        }

        let bytes = resp.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        log::debug!(
            "Downloaded {} ({} bytes) to {}",
            file_id,
            bytes.len(),
            dest.display()
        );
        Ok(bytes.len() as u64)
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        let _: Message = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        // Returns the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({ "callback_query_id": callback_query_id });
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let _: Message = self.upload("sendDocument", form).await?;
        log::info!("Document sent to {}: {}", chat_id, file_name);
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, path: &Path, caption: &str) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("page.jpg")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let _: Message = self.upload("sendPhoto", form).await?;
        Ok(())
    }
}

async fn read_response<T: DeserializeOwned>(
    method: &str,
    resp: reqwest::Response,
) -> anyhow::Result<T> {
    let status = resp.status();
    let body: ApiResponse<T> = resp
        .json()
        .await
        .with_context(|| format!("Telegram {method} returned an unreadable response ({status})"))?;
    unwrap_response(method, body)
}

fn unwrap_response<T>(method: &str, body: ApiResponse<T>) -> anyhow::Result<T> {
    match body {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => anyhow::bail!(
            "Telegram {} failed: {}",
            method,
            description.as_deref().unwrap_or("no description")
        ),
    }
}

/// One button per row, in [`Action::all`] order
pub fn action_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: Action::all()
            .into_iter()
            .map(|action| {
                vec![InlineKeyboardButton {
                    text: action.label().to_string(),
                    callback_data: action.token().to_string(),
                }]
            })
            .collect(),
    }
}

/// Replies to a single chat
pub struct ChatOutbox<C> {
    api: Arc<C>,
    chat_id: i64,
}

impl<C: BotClient> ChatOutbox<C> {
    pub fn new(api: Arc<C>, chat_id: i64) -> Self {
        Self { api, chat_id }
    }
}

impl<C: BotClient> Outbox for ChatOutbox<C> {
    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        self.api.send_message(self.chat_id, text, None).await
    }

    async fn send_document(&self, path: &Path, file_name: &str) -> anyhow::Result<()> {
        self.api.send_document(self.chat_id, path, file_name).await
    }

    async fn send_photo(&self, path: &Path, caption: &str) -> anyhow::Result<()> {
        self.api.send_photo(self.chat_id, path, caption).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_has_one_button_per_row() {
        let keyboard = action_keyboard();
        let labels: Vec<_> = keyboard
            .inline_keyboard
            .iter()
            .map(|row| {
                assert_eq!(row.len(), 1);
                (row[0].text.as_str(), row[0].callback_data.as_str())
            })
            .collect();

        assert_eq!(
            labels,
            vec![
                ("Merge PDFs", "merge"),
                ("Split PDF", "split"),
                ("Compress PDF", "compress"),
                ("PDF to Images", "pdf2img"),
                ("Images to PDF", "img2pdf"),
                ("Clear Files", "clear"),
            ]
        );
    }

    #[test]
    fn test_unwrap_response() {
        let ok: ApiResponse<bool> = serde_json::from_str(r#"{"ok":true,"result":true}"#).unwrap();
        assert!(unwrap_response("answerCallbackQuery", ok).unwrap());

        let failed: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        )
        .unwrap();
        let error = unwrap_response("sendMessage", failed).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Telegram sendMessage failed: Bad Request: chat not found"
        );
    }

    #[test]
    fn test_urls() {
        let api = BotApi::new("123:abc");
        assert_eq!(
            api.api_url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
        assert_eq!(
            api.file_url("documents/file_1.pdf"),
            "https://api.telegram.org/file/bot123:abc/documents/file_1.pdf"
        );
    }
}
