/*!
app.rs - dispatcher: registry + configuration + output / prompt capabilities.

Lifecycle:
  App::new(config)      registry bound to `config.commands_dir`
  App::bootstrap()      validate config, scan commands_dir, register built-ins
                        (`help` through the internal path, `exec` normally)
  App::run(argv)        resolve argv[0], bind the rest, execute

Exit codes:
  0  success, global help, command usage (`--help`)
  1  the command body returned an error ("exec error :" + cause chain)
  2  configuration / resolution / binding failure (help or usage first)

A command body may return `Outcome::Delegate`; the delegated source is
registered and dispatched in the same loop with the tokens it handed back.
*/

use std::sync::Arc;

use crate::bind::{Binding, bind};
use crate::cmd::{exec_command, global_help_lines, help_command, usage_lines};
use crate::command::{Command, CommandContext, Outcome};
use crate::config::AppConfig;
use crate::error::{CliError, EXIT_EXECUTION};
use crate::registry::{self, CommandSource, Registry};
use crate::schema::{CommandSpec, OptionSpec};
use crate::utils::format::{Role, color};
use crate::utils::output::{OutputSink, TerminalSink};
use crate::utils::prompt::{Prompter, StdinPrompter};

pub struct App {
    config: AppConfig,
    registry: Registry,
    globals: Vec<OptionSpec>,
    sink: Arc<dyn OutputSink>,
    prompter: Arc<dyn Prompter>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let registry = Registry::with_commands_dir(config.commands_dir.clone());
        let globals = config.global_options();
        Self {
            config,
            registry,
            globals,
            sink: Arc::new(TerminalSink::default()),
            prompter: Arc::new(StdinPrompter),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn globals(&self) -> &[OptionSpec] {
        &self.globals
    }

    /// Dynamic registration for embedding code.
    pub fn register(&mut self, source: impl Into<CommandSource>) -> Result<Arc<Command>, CliError> {
        self.registry.register(source)
    }

    pub fn bootstrap(&mut self) -> Result<(), CliError> {
        self.config.validate()?;

        if let Some(dir) = self.config.commands_dir.clone() {
            if dir.is_dir() {
                let count = self.registry.scan(&dir)?;
                tracing::debug!(dir = %dir.display(), count, "scanned commands directory");
            } else {
                tracing::warn!(dir = %dir.display(), "commands dir does not exist");
            }
        }

        self.registry.register_internal(help_command());
        match self.registry.register(exec_command()) {
            Ok(_) => {}
            Err(CliError::DuplicateCommand { name }) => {
                tracing::warn!(name = %name, "built-in exec command shadowed");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Bootstrap, then dispatch `argv` (program name already stripped).
    pub async fn start(&mut self, argv: Vec<String>) -> i32 {
        if let Err(e) = self.bootstrap() {
            self.report(&e.to_string());
            return e.exit_code();
        }
        self.run(argv).await
    }

    pub async fn run(&mut self, argv: Vec<String>) -> i32 {
        let Some((token, rest)) = argv.split_first() else {
            self.print_help();
            return 0;
        };
        if token == "-h" || token == "--help" {
            self.print_help();
            return 0;
        }

        let command = match self.registry.resolve(token, self.prompter.as_ref()) {
            Ok(command) => command,
            Err(e @ CliError::UnknownCommand { .. }) => {
                self.print_help();
                self.report(&e.to_string());
                return e.exit_code();
            }
            Err(e) => {
                self.report(&e.to_string());
                return e.exit_code();
            }
        };
        self.exec(command, rest.to_vec()).await
    }

    /// Bind `tokens` against `command` and run it.
    pub async fn exec(&mut self, mut command: Arc<Command>, mut tokens: Vec<String>) -> i32 {
        loop {
            let invocation = match bind(&command.spec, &tokens, &self.globals) {
                Ok(Binding::Help) => {
                    self.print_usage(&command.spec);
                    return 0;
                }
                Ok(Binding::Invocation(invocation)) => invocation,
                Err(e) => {
                    if e.wants_usage() {
                        self.print_usage(&command.spec);
                    }
                    self.report(&e.to_string());
                    return e.exit_code();
                }
            };
            if invocation.flag("quiet") {
                self.sink.set_quiet(true);
            }

            tracing::debug!(command = %command.spec.name, "dispatching");
            let outcome = {
                let ctx = CommandContext {
                    config: &self.config,
                    registry: &self.registry,
                    globals: &self.globals,
                    sink: self.sink.as_ref(),
                    prompter: self.prompter.as_ref(),
                };
                command.handler.exec(&invocation, &ctx).await
            };

            match outcome {
                Ok(Outcome::Done) => return 0,
                Ok(Outcome::Delegate { source, tokens: next }) => match self.adopt(source) {
                    Ok(delegate) => {
                        command = delegate;
                        tokens = next;
                    }
                    Err(e) => {
                        self.report(&e.to_string());
                        return e.exit_code();
                    }
                },
                Err(e) => {
                    self.report("exec error :");
                    self.report(&format!("{e:?}"));
                    return EXIT_EXECUTION;
                }
            }
        }
    }

    /// Register a delegated source; a manifest already loaded from the same file is reused.
    fn adopt(&mut self, source: CommandSource) -> Result<Arc<Command>, CliError> {
        let command = registry::load(source)?;
        if let Some(existing) = self.registry.get(command.name())
            && existing.origin.is_some()
            && existing.origin == command.origin
        {
            return Ok(existing);
        }
        self.registry.register(command)
    }

    pub fn print_help(&self) {
        let lines = global_help_lines(&self.config, &self.registry, &self.globals, self.sink.style());
        self.sink.print_lines(&lines);
    }

    fn report(&self, message: &str) {
        self.sink
            .error(&color(Role::Error, message, self.sink.style()));
    }

    fn print_usage(&self, spec: &CommandSpec) {
        self.sink.print_lines(&usage_lines(spec, self.sink.style()));
    }
}
