//! A command: declared surface (`CommandSpec`) + executable behavior.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bind::ResolvedInvocation;
use crate::config::AppConfig;
use crate::registry::{CommandSource, Registry};
use crate::schema::{CommandSpec, OptionSpec};
use crate::utils::output::OutputSink;
use crate::utils::prompt::Prompter;

/// What the app should do once a command body returns.
pub enum Outcome {
    Done,
    /// Register `source` and dispatch it with `tokens` (dynamic registration).
    Delegate {
        source: CommandSource,
        tokens: Vec<String>,
    },
}

/// Capabilities a command body may use.
pub struct CommandContext<'a> {
    pub config: &'a AppConfig,
    pub registry: &'a Registry,
    pub globals: &'a [OptionSpec],
    pub sink: &'a dyn OutputSink,
    pub prompter: &'a dyn Prompter,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn exec(
        &self,
        invocation: &ResolvedInvocation,
        ctx: &CommandContext<'_>,
    ) -> anyhow::Result<Outcome>;
}

pub struct Command {
    pub spec: CommandSpec,
    pub handler: Arc<dyn CommandHandler>,
    /// File the command was loaded from, if any.
    pub origin: Option<PathBuf>,
}

impl Command {
    pub fn new(spec: CommandSpec, handler: impl CommandHandler + 'static) -> Self {
        Self {
            spec,
            handler: Arc::new(handler),
            origin: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("spec", &self.spec)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Handler built from an async closure; handy for embedding code and tests.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(ResolvedInvocation) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send,
{
    async fn exec(
        &self,
        invocation: &ResolvedInvocation,
        _ctx: &CommandContext<'_>,
    ) -> anyhow::Result<Outcome> {
        (self.0)(invocation.clone()).await?;
        Ok(Outcome::Done)
    }
}
