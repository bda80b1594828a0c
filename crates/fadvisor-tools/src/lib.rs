//! Tool framework for fadvisor
//!
//! The analytics engine does not know who calls it. Front ends and the
//! (external) LLM router reach the engine's operations through the
//! [`Tool`] trait: JSON parameters in, JSON result out. A [`ToolRegistry`]
//! collects the tools and dispatches calls by name.

pub mod error;
pub mod registry;
pub mod tool;

pub use error::{Error, Result};
pub use registry::{ToolDefinition, ToolRegistry};
pub use tool::Tool;
