pub mod backend;
pub mod envelope;
pub mod webhook;

pub use backend::{Backend, HttpBackend, SKIP_WARNING_HEADER};
pub use envelope::{extract_items, extract_records};
pub use webhook::{HttpWebhooks, Webhooks};
