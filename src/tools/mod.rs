pub mod document;
pub mod registry;
pub mod traits;
pub mod types;

pub use document::{DocumentCommand, DocumentSandbox, DocumentTool, MEMORY_ROOT, MemorySandbox};
pub use registry::{ToolHandler, ToolRegistry};
pub use traits::{LocalTool, RemoteTool};
pub use types::{ToolResult, ToolSpec};
