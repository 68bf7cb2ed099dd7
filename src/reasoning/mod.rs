pub mod response;
pub mod traits;

pub use response::{
    Citation, ContentBlock, Message, MessageRole, ReasoningResponse, StopReason, Usage,
};
pub use traits::{ReasoningRequest, ReasoningService};
