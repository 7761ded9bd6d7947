//! doclink - workflow document import linker and tool command-line adapter

pub mod config;
pub mod document;
pub mod error;
pub mod job;
pub mod linker;
pub mod server;

pub use config::DoclinkConfig;
pub use document::{render, Mapping, Node, OutputFormat, Scalar};
pub use error::{DoclinkError, FixSuggestion, Result};
pub use job::{CommandLineToolLibrary, JobLibrary};
pub use linker::{link, resolve, ImportBase, LinkOptions, Linker};
pub use server::{AppContext, ExitCodePolicy};
