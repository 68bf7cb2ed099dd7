pub mod memory;
pub mod traits;

pub use memory::InMemoryMessageStore;
pub use traits::{MessageStore, StoredMessage};
