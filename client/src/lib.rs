pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod events;
pub mod gateway;
pub mod http;
pub mod model;


pub use cache::{Cache, CacheError};
pub use client::{Client, ClientBuilder, ClientError};
pub use config::ClientConfig;
pub use events::{Event, Listeners, WaitError};
pub use http::{HttpClient, HttpError};
