pub mod alerts;
pub mod client;
pub mod link;
pub mod users;

pub use alerts::{fetcher_for, Alert, AlertFetcher, AlertSourceKind};
pub use client::{ClientSettings, GithubClient};
pub use users::Contact;
