//! Email provider implementations.
//!
//! Each provider implements [`Mailer`](crate::Mailer) for single sends and
//! [`BulkMailer`](crate::BulkMailer) for batches.
//!
//! ## Available Providers
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`MailjetMailer`] | `mailjet` | Mailjet Send API v3.1 |
//! | [`LocalMailer`] | (none) | In-memory capture for dev/testing |
//! | [`LoggerMailer`] | (none) | Logs emails without sending |

#[cfg(feature = "mailjet")]
mod mailjet;
#[cfg(feature = "mailjet")]
pub use mailjet::{MailjetConnector, MailjetMailer};

mod local;
pub use local::LocalMailer;

mod logger;
pub use logger::LoggerMailer;
