//! Output side of a chat: where replies and result files go

use crate::action::Delivery;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;

/// Sink for replies to the chat an update came from
pub trait Outbox: Send + Sync {
    fn send_text(&self, text: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Send a file as a document attachment named `file_name`
    fn send_document(
        &self,
        path: &Path,
        file_name: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn send_photo(
        &self,
        path: &Path,
        caption: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Send deliveries in order, deleting each file right after it is sent.
///
/// Stops at the first failed send; files not yet sent are deleted too.
/// Returns how many deliveries succeeded.
pub async fn deliver<O: Outbox>(outbox: &O, deliveries: Vec<Delivery>) -> anyhow::Result<usize> {
    let mut pending = deliveries.into_iter();
    let mut delivered = 0;
    let mut failure = None;

    for delivery in pending.by_ref() {
        let sent = match &delivery {
            Delivery::Document { path, file_name } => outbox.send_document(path, file_name).await,
            Delivery::Photo { path, caption } => outbox.send_photo(path, caption).await,
        };
        remove_output(delivery.path()).await;

        match sent {
            Ok(()) => delivered += 1,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    for delivery in pending {
        remove_output(delivery.path()).await;
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(delivered),
    }
}

async fn remove_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Error deleting output {}: {}", path.display(), e),
    }
}
