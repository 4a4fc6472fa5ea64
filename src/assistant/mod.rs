pub mod action;
pub mod executor;
pub mod interpreter;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod report;

pub use action::{ActionKind, ActionRecord, GroupFilter, TopicFilter};
pub use executor::{ActionExecutor, BatchResult, BatchStep, StepOutcome};
pub use interpreter::{Execution, Interpreter};
pub use provider::{build_provider, CompletionProvider, ProviderKind};
