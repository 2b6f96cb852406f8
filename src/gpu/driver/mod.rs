pub mod binds;
pub mod command;
pub mod layout;
pub mod types;

pub use command::{CommandBuffer, Device};
pub use layout::{BindingKind, LayoutBinding, PipelineLayoutDesc, PushBlock};
pub use types::*;
