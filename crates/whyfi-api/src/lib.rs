// whyfi-api: Async HTTP clients for the text-completion and speed-test services

pub mod completion;
pub mod error;
pub mod speed;
pub mod transport;

pub use completion::CompletionClient;
pub use error::Error;
pub use speed::{SpeedClient, Transfer};
pub use transport::TransportConfig;
