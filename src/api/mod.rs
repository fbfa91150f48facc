mod client;

pub use client::{RemoteSource, WpClient, DEFAULT_PER_PAGE};
