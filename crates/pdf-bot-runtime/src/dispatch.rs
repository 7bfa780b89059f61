//! Running actions against a user's session
//!
//! [`Dispatcher::run`] is the business logic: it reads the session, checks
//! preconditions and performs exactly one transformation, returning the
//! files to deliver. [`Dispatcher::dispatch`] wraps it with the session
//! lock, delivery through an [`Outbox`], error reporting and the
//! unconditional session clear.

use crate::action::*;
use crate::outbox::{Outbox, deliver};
use crate::session::{Session, SessionStore, UserId};
use pdf_ops::{Rasterizer, split_bounds};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sent instead of an empty page range when the PDF cannot be split
pub const SINGLE_PAGE_SPLIT: &str =
    "This PDF has only one page, so it cannot be split. Page number must be between 1 and 0";

pub struct Dispatcher {
    store: Arc<SessionStore>,
    work_dir: PathBuf,
    rasterizer: Arc<dyn Rasterizer>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<SessionStore>,
        work_dir: impl Into<PathBuf>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self {
            store,
            work_dir: work_dir.into(),
            rasterizer,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run `action` for `user` and report the result through `outbox`.
    ///
    /// Rejections leave the session alone. Once a transformation has run,
    /// the session is cleared whether it succeeded or not.
    pub async fn dispatch<O: Outbox>(&self, user: UserId, action: Action, outbox: &O) -> Outcome {
        let outcome = self.dispatch_locked(user, action, outbox).await;
        self.store.release(user);
        outcome
    }

    async fn dispatch_locked<O: Outbox>(
        &self,
        user: UserId,
        action: Action,
        outbox: &O,
    ) -> Outcome {
        let mut session = self.store.lock(user).await;

        let Some(operation) = action.operation() else {
            let cleared = session.clear().await;
            log::info!("User {}: cleared {} staged files", user, cleared);
            return Outcome::Cleared { cleared };
        };

        let result = match self.run(user, action, &session).await {
            Ok(deliveries) => deliver(outbox, deliveries).await.map_err(|e| e.to_string()),
            Err(ActionError::Rejected(message)) => {
                log::debug!("User {}: {} rejected: {}", user, action, message);
                send_or_log(outbox, &message).await;
                return Outcome::Rejected { message };
            }
            Err(ActionError::Pdf(e)) => Err(e.to_string()),
        };

        let cleared = session.clear().await;

        match result {
            Ok(delivered) => {
                log::info!(
                    "User {}: {} done, {} deliveries, {} staged files removed",
                    user,
                    action,
                    delivered,
                    cleared
                );
                Outcome::Completed { delivered, cleared }
            }
            Err(error) => {
                log::error!("User {}: {} failed: {}", user, action, error);
                let message = format!("{}: {}", operation.failure_prefix(), error);
                send_or_log(outbox, &message).await;
                Outcome::Failed { message, cleared }
            }
        }
    }

    /// Check preconditions and perform one transformation.
    ///
    /// Outputs are written to the working directory as `{user}_{operation}`
    /// files; the session itself is not modified. [`Action::Clear`] runs
    /// nothing here.
    pub async fn run(&self, user: UserId, action: Action, session: &Session) -> Result<Vec<Delivery>> {
        let Some(operation) = action.operation() else {
            return Ok(Vec::new());
        };

        let (kind, minimum) = operation.input_requirement();
        let missing = || ActionError::Rejected(operation.missing_input_message().to_string());

        let inputs = session.snapshot(kind);
        if inputs.len() < minimum {
            return Err(missing());
        }
        let latest = || session.latest(kind).ok_or_else(missing);

        match operation {
            Operation::Merge => self.merge(user, &inputs).await,
            Operation::Split { at } => self.split(user, latest()?, at).await,
            Operation::Compress => self.compress(user, latest()?).await,
            Operation::PdfToImages => self.pdf_to_images(user, latest()?).await,
            Operation::ImagesToPdf => self.images_to_pdf(user, &inputs).await,
        }
    }

    fn output_path(&self, user: UserId, name: &str) -> PathBuf {
        self.work_dir.join(format!("{user}_{name}.pdf"))
    }

    async fn merge(&self, user: UserId, inputs: &[PathBuf]) -> Result<Vec<Delivery>> {
        let output = self.output_path(user, "merged");
        pdf_ops::merge_pdfs(inputs, &output).await?;
        Ok(vec![Delivery::Document {
            path: output,
            file_name: "merged.pdf",
        }])
    }

    async fn split(&self, user: UserId, input: &Path, at: Option<usize>) -> Result<Vec<Delivery>> {
        let Some(at) = at else {
            return Err(ActionError::Rejected(
                "Usage: /split <page_number>".to_string(),
            ));
        };

        let doc = pdf_ops::load_pdf(input).await?;
        let total = doc.get_pages().len();
        if total < 2 {
            return Err(ActionError::Rejected(SINGLE_PAGE_SPLIT.to_string()));
        }
        let bounds = split_bounds(total);
        if !bounds.contains(&at) {
            return Err(ActionError::Rejected(format!(
                "Page number must be between {} and {}",
                bounds.start(),
                bounds.end()
            )));
        }

        let (head, tail) =
            tokio::task::spawn_blocking(move || pdf_ops::split_document(&doc, at))
                .await
                .map_err(pdf_ops::PdfOpsError::from)??;

        let first = self.output_path(user, "part1");
        let second = self.output_path(user, "part2");
        pdf_ops::save_pdf(head, &first).await?;
        pdf_ops::save_pdf(tail, &second).await?;

        Ok(vec![
            Delivery::Document {
                path: first,
                file_name: "part1.pdf",
            },
            Delivery::Document {
                path: second,
                file_name: "part2.pdf",
            },
        ])
    }

    async fn compress(&self, user: UserId, input: &Path) -> Result<Vec<Delivery>> {
        let output = self.output_path(user, "compressed");
        let result = pdf_ops::compress_pdf(input, &output).await?;
        log::debug!(
            "User {}: compressed {} -> {} bytes",
            user,
            result.input_bytes,
            result.output_bytes
        );
        Ok(vec![Delivery::Document {
            path: output,
            file_name: "compressed.pdf",
        }])
    }

    async fn pdf_to_images(&self, user: UserId, input: &Path) -> Result<Vec<Delivery>> {
        let pages = pdf_ops::rasterize_pdf(
            self.rasterizer.clone(),
            input,
            &self.work_dir,
            user.to_string(),
        )
        .await?;

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(index, path)| Delivery::Photo {
                path,
                caption: format!("Page {}", index + 1),
            })
            .collect())
    }

    async fn images_to_pdf(&self, user: UserId, inputs: &[PathBuf]) -> Result<Vec<Delivery>> {
        let output = self.output_path(user, "images_to_pdf");
        pdf_ops::images_to_pdf(inputs, &output).await?;
        Ok(vec![Delivery::Document {
            path: output,
            file_name: "images_to_pdf.pdf",
        }])
    }
}

async fn send_or_log<O: Outbox>(outbox: &O, text: &str) {
    if let Err(e) = outbox.send_text(text).await {
        log::warn!("Failed to send message: {}", e);
    }
}
