/*!
`exec.rs`

Built-in `exec` command: run a command manifest directly from a file path.

  <bin> exec ./deploy.yaml prod --tag=v2

The manifest is handed back to the dispatcher as `Outcome::Delegate`, which
registers it (dynamic registration) and dispatches it with every token except
the file path itself.
*/

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::bind::ResolvedInvocation;
use crate::command::{Command, CommandContext, CommandHandler, Outcome};
use crate::registry::CommandSource;
use crate::schema::{ArgumentSpec, CommandSpec, Mode};

struct ExecCommand;

#[async_trait]
impl CommandHandler for ExecCommand {
    async fn exec(&self, invocation: &ResolvedInvocation, _ctx: &CommandContext<'_>) -> Result<Outcome> {
        let raw = invocation.argument_str("filepath").unwrap_or_default();
        let path = PathBuf::from(&raw);
        if !path.is_file() {
            bail!("\"{raw}\" not exists in current directory");
        }

        let mut tokens = invocation.tokens.clone();
        if let Some(pos) = tokens.iter().position(|t| *t == raw) {
            tokens.remove(pos);
        }
        tracing::debug!(path = %path.display(), ?tokens, "delegating to manifest");
        Ok(Outcome::Delegate {
            source: CommandSource::Path(path),
            tokens,
        })
    }
}

pub fn exec_command() -> Command {
    let spec = CommandSpec {
        name: "exec".to_string(),
        aliases: Vec::new(),
        description: "Run a command manifest file directly".to_string(),
        example: Some("exec ./commands/deploy.yaml prod".to_string()),
        show: true,
        arguments: vec![ArgumentSpec {
            name: "filepath".to_string(),
            mode: Mode::Required,
            description: "Command manifest file path (.yaml, .yml, .json)".to_string(),
            default: None,
        }],
        options: Vec::new(),
    };
    Command::new(spec, ExecCommand)
}
