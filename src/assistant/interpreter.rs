//! Command Interpreter: free text -> completion -> action records -> execution.

use std::sync::Arc;

use tracing::{debug, info};

use crate::assistant::action::ActionRecord;
use crate::assistant::executor::{ActionExecutor, BatchResult, StepOutcome};
use crate::assistant::parser::parse_actions;
use crate::assistant::prompt::SYSTEM_PROMPT;
use crate::assistant::provider::CompletionProvider;
use crate::error::{KconduitError, Result};

/// A single record runs on its own; two or more run as a batch.
#[derive(Debug, Clone)]
pub enum Execution {
    Single { record: ActionRecord, outcome: StepOutcome },
    Batch(BatchResult),
}

pub struct Interpreter {
    provider: Arc<dyn CompletionProvider>,
    executor: ActionExecutor,
}

impl Interpreter {
    pub fn new(provider: Arc<dyn CompletionProvider>, executor: ActionExecutor) -> Self {
        Self { provider, executor }
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    pub fn set_provider(&mut self, provider: Arc<dyn CompletionProvider>) {
        self.provider = provider;
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Provider errors abort this request only.
    pub async fn interpret(&self, free_text: &str) -> Result<Vec<ActionRecord>> {
        debug!(provider = %self.provider.name(), model = %self.provider.model(), "Sending request to completion provider");
        let raw = self.provider.complete(SYSTEM_PROMPT, free_text).await?;

        let actions = parse_actions(&raw);
        if actions.is_empty() {
            debug!("No valid JSON commands found in response");
            return Err(KconduitError::NoActionsFound);
        }

        info!(count = actions.len(), "Found actions in response");
        Ok(actions)
    }

    pub async fn run(&self, free_text: &str) -> Result<Execution> {
        let mut actions = self.interpret(free_text).await?;

        if actions.len() == 1 {
            let record = actions.remove(0);
            info!(action = %record.kind(), "Executing action");
            let outcome = self.executor.execute(&record).await;
            return Ok(Execution::Single { record, outcome });
        }

        Ok(Execution::Batch(self.executor.execute_batch(actions).await))
    }
}
