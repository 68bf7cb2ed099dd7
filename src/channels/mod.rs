pub mod chunker;
pub mod message;
pub mod traits;

pub use chunker::split_for_transport;
pub use message::{Attachment, InboundEvent};
pub use traits::{ChatGateway, DEFAULT_MAX_MESSAGE_LENGTH};
