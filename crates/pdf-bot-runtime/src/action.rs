use pdf_ops::{FileKind, PdfOpsError};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Document operations a user can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Merge,
    /// Split after page `at`. `None` when no valid page number was given.
    Split {
        at: Option<usize>,
    },
    Compress,
    PdfToImages,
    ImagesToPdf,
    Clear,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(token: &str) -> std::result::Result<Self, Self::Err> {
        match token.trim() {
            "merge" => Ok(Action::Merge),
            "split" => Ok(Action::Split { at: None }),
            "compress" => Ok(Action::Compress),
            "pdf2img" | "pdf-to-images" => Ok(Action::PdfToImages),
            "img2pdf" | "images-to-pdf" => Ok(Action::ImagesToPdf),
            "clear" => Ok(Action::Clear),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl Action {
    /// Callback token carried by the action's keyboard button
    pub fn token(self) -> &'static str {
        match self {
            Action::Merge => "merge",
            Action::Split { .. } => "split",
            Action::Compress => "compress",
            Action::PdfToImages => "pdf2img",
            Action::ImagesToPdf => "img2pdf",
            Action::Clear => "clear",
        }
    }

    /// Button label
    pub fn label(self) -> &'static str {
        match self {
            Action::Merge => "Merge PDFs",
            Action::Split { .. } => "Split PDF",
            Action::Compress => "Compress PDF",
            Action::PdfToImages => "PDF to Images",
            Action::ImagesToPdf => "Images to PDF",
            Action::Clear => "Clear Files",
        }
    }

    /// Every action in keyboard order
    pub fn all() -> [Action; 6] {
        [
            Action::Merge,
            Action::Split { at: None },
            Action::Compress,
            Action::PdfToImages,
            Action::ImagesToPdf,
            Action::Clear,
        ]
    }

    /// The transformation this action runs; `None` for [`Action::Clear`]
    pub fn operation(self) -> Option<Operation> {
        match self {
            Action::Merge => Some(Operation::Merge),
            Action::Split { at } => Some(Operation::Split { at }),
            Action::Compress => Some(Operation::Compress),
            Action::PdfToImages => Some(Operation::PdfToImages),
            Action::ImagesToPdf => Some(Operation::ImagesToPdf),
            Action::Clear => None,
        }
    }
}

/// Actions that consume staged files and produce output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Merge,
    Split { at: Option<usize> },
    Compress,
    PdfToImages,
    ImagesToPdf,
}

impl Operation {
    /// Kind of staged file consumed and how many are needed
    pub fn input_requirement(self) -> (FileKind, usize) {
        match self {
            Operation::Merge => (FileKind::Pdf, 2),
            Operation::Split { .. } | Operation::Compress | Operation::PdfToImages => {
                (FileKind::Pdf, 1)
            }
            Operation::ImagesToPdf => (FileKind::Image, 1),
        }
    }

    /// Message sent when the session does not satisfy [`Operation::input_requirement`]
    pub fn missing_input_message(self) -> &'static str {
        match self {
            Operation::Merge => "Please upload at least two PDF files to merge.",
            Operation::Split { .. } => "Please upload a PDF file to split.",
            Operation::Compress => "Please upload a PDF file to compress.",
            Operation::PdfToImages => "Please upload a PDF file to convert to images.",
            Operation::ImagesToPdf => "Please upload images to convert to PDF.",
        }
    }

    /// Prefix of the message reporting a failed transformation
    pub fn failure_prefix(self) -> &'static str {
        match self {
            Operation::Merge => "Error merging PDFs",
            Operation::Split { .. } => "Error splitting PDF",
            Operation::Compress => "Error compressing PDF",
            Operation::PdfToImages => "Error converting PDF to images",
            Operation::ImagesToPdf => "Error converting images to PDF",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Split { at: Some(at) } => write!(f, "split@{at}"),
            other => f.write_str(other.token()),
        }
    }
}

/// Why an action produced no result
#[derive(Error, Debug)]
pub enum ActionError {
    /// Input validation failed; the session is left as it was
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Pdf(#[from] PdfOpsError),
}

pub type Result<T> = std::result::Result<T, ActionError>;

/// One file to hand back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Document {
        path: PathBuf,
        file_name: &'static str,
    },
    Photo {
        path: PathBuf,
        caption: String,
    },
}

impl Delivery {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Delivery::Document { path, .. } | Delivery::Photo { path, .. } => path,
        }
    }
}

/// How a dispatched action ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Validation failed; nothing ran and the session is untouched
    Rejected { message: String },
    /// Transformation ran and every result was delivered
    Completed { delivered: usize, cleared: usize },
    /// Transformation or delivery failed; the session was still cleared
    Failed { message: String, cleared: usize },
    /// The user asked to drop their staged files
    Cleared { cleared: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        assert_eq!("merge".parse::<Action>(), Ok(Action::Merge));
        assert_eq!("split".parse::<Action>(), Ok(Action::Split { at: None }));
        assert_eq!("compress".parse::<Action>(), Ok(Action::Compress));
        assert_eq!("pdf2img".parse::<Action>(), Ok(Action::PdfToImages));
        assert_eq!("pdf-to-images".parse::<Action>(), Ok(Action::PdfToImages));
        assert_eq!("img2pdf".parse::<Action>(), Ok(Action::ImagesToPdf));
        assert_eq!("images-to-pdf".parse::<Action>(), Ok(Action::ImagesToPdf));
        assert_eq!("clear".parse::<Action>(), Ok(Action::Clear));
        assert_eq!(
            "explode".parse::<Action>(),
            Err(UnknownAction("explode".to_string()))
        );
    }

    #[test]
    fn test_tokens_round_trip_through_keyboard() {
        for action in Action::all() {
            assert_eq!(action.token().parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn test_requirements() {
        let requirement = |action: Action| action.operation().map(Operation::input_requirement);
        assert_eq!(requirement(Action::Merge), Some((FileKind::Pdf, 2)));
        assert_eq!(requirement(Action::Compress), Some((FileKind::Pdf, 1)));
        assert_eq!(requirement(Action::ImagesToPdf), Some((FileKind::Image, 1)));
        assert_eq!(requirement(Action::Clear), None);
    }

    #[test]
    fn test_split_operation_keeps_page_number() {
        assert_eq!(
            Action::Split { at: Some(4) }.operation(),
            Some(Operation::Split { at: Some(4) })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Action::Split { at: Some(3) }.to_string(), "split@3");
        assert_eq!(Action::PdfToImages.to_string(), "pdf2img");
    }
}
