//! Session state and action dispatch for the PDF bot.
//!
//! Transport-independent: replies go through the [`Outbox`] trait, so the
//! same dispatcher serves the Telegram front end and the tests.

mod action;
mod dispatch;
mod outbox;
mod session;

pub use action::{Action, ActionError, Delivery, Operation, Outcome, UnknownAction};
pub use dispatch::{Dispatcher, SINGLE_PAGE_SPLIT};
pub use outbox::{Outbox, deliver};
pub use session::{
    Session, SessionError, SessionGuard, SessionLimits, SessionStore, UserId, format_size,
};

// Re-export types from the operations crate
pub use pdf_ops::{FileKind, PdfOpsError, Rasterizer, UnavailableRasterizer};
