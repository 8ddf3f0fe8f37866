/*!
registry.rs - command registry and resolver.

Registration:
  - `register(source)`           duplicate name / alias -> DuplicateCommand
  - `register_internal(command)` bootstrap path; silently overwrites
  - `CommandSource`              Instance | Constructor | Path, turned into a
                                 `Command` by `load()` before insertion
  - `scan(dir)`                  eager registration of every manifest in a directory

Resolution (`resolve`), first hit wins:
  1. exact name
  2. exact alias
  3. `<commands_dir>/<token>.{yaml,yml,json}` loaded and registered on demand
  4. substring match over names
       none -> UnknownCommand
       one  -> "Did you mean ...?" confirm (no -> UnknownCommand)
       many -> select one
     Step 4 only prompts when the prompter is interactive; otherwise it fails
     with AmbiguousCommand.

Entries are never removed. Lookups hand out `Arc<Command>`, so resolving the
same name twice yields the same instance.
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::Command;
use crate::config::CommandGroup;
use crate::error::CliError;
use crate::manifest;
use crate::utils::prompt::Prompter;

/// Manifest file extensions, in lookup priority order.
pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Anything that can become a registered command.
pub enum CommandSource {
    Instance(Command),
    Constructor(fn() -> Command),
    Path(PathBuf),
}

impl From<Command> for CommandSource {
    fn from(c: Command) -> Self {
        CommandSource::Instance(c)
    }
}

impl From<PathBuf> for CommandSource {
    fn from(p: PathBuf) -> Self {
        CommandSource::Path(p)
    }
}

/// Turn a source into a concrete command.
pub fn load(source: CommandSource) -> Result<Command, CliError> {
    let command = match source {
        CommandSource::Instance(c) => c,
        CommandSource::Constructor(ctor) => ctor(),
        CommandSource::Path(path) => manifest::load_command(&path)?,
    };
    if command.spec.name.trim().is_empty() {
        return Err(CliError::schema(
            &command.spec.name,
            "the command name cannot be empty",
        ));
    }
    Ok(command)
}

/// Result of the side-effect-free part of resolution.
#[derive(Debug, Clone)]
pub enum Lookup {
    Exact(Arc<Command>),
    Alias(Arc<Command>),
    /// Substring candidates in registration order (possibly empty).
    Candidates(Vec<Arc<Command>>),
}

/// Command names partitioned for the global help screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelpListing {
    pub commands: Vec<String>,
    pub groups: Vec<(String, Vec<String>)>,
    /// Longest listed name, for column alignment.
    pub name_width: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    commands: Vec<Arc<Command>>,
    index: HashMap<String, usize>,
    commands_dir: Option<PathBuf>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands_dir(dir: Option<PathBuf>) -> Self {
        Self {
            commands_dir: dir,
            ..Self::default()
        }
    }

    pub fn commands_dir(&self) -> Option<&Path> {
        self.commands_dir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.spec.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.index.get(name).map(|&i| Arc::clone(&self.commands[i]))
    }

    /// Command loaded from the manifest at `path`, if any.
    pub fn by_origin(&self, path: &Path) -> Option<Arc<Command>> {
        self.commands
            .iter()
            .find(|c| c.origin.as_deref() == Some(path))
            .cloned()
    }

    /// Insert a command; name and aliases must not clash with anything registered.
    pub fn register(&mut self, source: impl Into<CommandSource>) -> Result<Arc<Command>, CliError> {
        let command = load(source.into())?;
        let spec = &command.spec;
        if self.index.contains_key(&spec.name) {
            return Err(CliError::DuplicateCommand {
                name: spec.name.clone(),
            });
        }
        for existing in &self.commands {
            let clash = std::iter::once(&spec.name)
                .chain(spec.aliases.iter())
                .find(|n| existing.spec.answers_to(n));
            if let Some(name) = clash {
                return Err(CliError::DuplicateCommand { name: name.clone() });
            }
        }
        Ok(self.insert(command))
    }

    /// Bootstrap registration: replaces an existing entry of the same name.
    pub fn register_internal(&mut self, command: Command) -> Arc<Command> {
        if let Some(&i) = self.index.get(&command.spec.name) {
            let command = Arc::new(command);
            self.commands[i] = Arc::clone(&command);
            return command;
        }
        self.insert(command)
    }

    fn insert(&mut self, command: Command) -> Arc<Command> {
        tracing::debug!(command = %command.spec.name, origin = ?command.origin, "registered command");
        let command = Arc::new(command);
        self.index
            .insert(command.spec.name.clone(), self.commands.len());
        self.commands.push(Arc::clone(&command));
        command
    }

    /// Register every manifest directly inside `dir`, sorted by file name.
    /// Returns the number of commands added.
    pub fn scan(&mut self, dir: &Path) -> Result<usize, CliError> {
        let entries = std::fs::read_dir(dir).map_err(|e| CliError::Load {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_manifest(p))
            .collect();
        files.sort();
        for file in &files {
            self.register(CommandSource::Path(file.clone()))?;
        }
        Ok(files.len())
    }

    /// Exact, alias, then substring candidates. No side effects.
    pub fn lookup(&self, token: &str) -> Lookup {
        if let Some(command) = self.get(token) {
            return Lookup::Exact(command);
        }
        if let Some(command) = self
            .commands
            .iter()
            .find(|c| c.spec.aliases.iter().any(|a| a == token))
        {
            return Lookup::Alias(Arc::clone(command));
        }
        Lookup::Candidates(
            self.commands
                .iter()
                .filter(|c| !token.is_empty() && c.spec.name.contains(token))
                .cloned()
                .collect(),
        )
    }

    /// Manifest path for `token` under the commands directory, if one exists.
    pub fn find_on_disk(&self, token: &str) -> Option<PathBuf> {
        let dir = self.commands_dir.as_ref()?;
        if token.is_empty() || token.starts_with('.') || token.contains(['/', '\\']) {
            return None;
        }
        MANIFEST_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{token}.{ext}")))
            .find(|p| p.is_file())
    }

    /// Resolve an invocation token to exactly one command.
    pub fn resolve(&mut self, token: &str, prompter: &dyn Prompter) -> Result<Arc<Command>, CliError> {
        let candidates = match self.lookup(token) {
            Lookup::Exact(command) => {
                tracing::debug!(token, "exact match");
                return Ok(command);
            }
            Lookup::Alias(command) => {
                tracing::debug!(token, command = %command.spec.name, "alias match");
                return Ok(command);
            }
            Lookup::Candidates(candidates) => candidates,
        };

        if let Some(path) = self.find_on_disk(token) {
            if let Some(command) = self.by_origin(&path) {
                tracing::debug!(token, command = %command.spec.name, "already loaded from disk");
                return Ok(command);
            }
            tracing::debug!(token, path = %path.display(), "lazy loading command");
            return self.register(CommandSource::Path(path));
        }

        let names: Vec<String> = candidates.iter().map(|c| c.spec.name.clone()).collect();
        match candidates.len() {
            0 => Err(CliError::UnknownCommand {
                name: token.to_string(),
            }),
            _ if !prompter.is_interactive() => Err(CliError::AmbiguousCommand {
                token: token.to_string(),
                candidates: names,
            }),
            1 => {
                let question = format!("Did you mean \"{}\" command?", names[0]);
                if prompter.confirm(&question, true)? {
                    Ok(Arc::clone(&candidates[0]))
                } else {
                    Err(CliError::UnknownCommand {
                        name: token.to_string(),
                    })
                }
            }
            _ => {
                let question =
                    format!("Command \"{token}\" is ambiguous. Did you mean one of these?");
                let chosen = prompter.select(&question, &names)?;
                self.get(&chosen).ok_or(CliError::UnknownCommand { name: chosen })
            }
        }
    }

    /// Partition names for help: `sort` first, remaining visible commands by
    /// name, then `groups`. `help` appears exactly once.
    pub fn list_for_help(&self, sort: &[String], groups: &[CommandGroup]) -> HelpListing {
        let known = |name: &str| name == "help" || self.get(name).is_some();
        let mut seen: Vec<String> = Vec::new();

        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for group in groups {
            let mut members = Vec::new();
            for name in &group.commands {
                if known(name) && !seen.contains(name) {
                    seen.push(name.clone());
                    members.push(name.clone());
                }
            }
            if !members.is_empty() {
                grouped.push((group.title.clone(), members));
            }
        }

        let mut listed: Vec<String> = Vec::new();
        let mut visible: Vec<&String> = self
            .commands
            .iter()
            .filter(|c| c.spec.show)
            .map(|c| &c.spec.name)
            .collect();
        visible.sort();
        for name in sort.iter().chain(visible) {
            if known(name) && !seen.contains(name) {
                seen.push(name.clone());
                listed.push(name.clone());
            }
        }
        if !seen.iter().any(|n| n == "help") {
            listed.push("help".to_string());
        }

        let name_width = listed
            .iter()
            .chain(grouped.iter().flat_map(|(_, m)| m.iter()))
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0);

        HelpListing {
            commands: listed,
            groups: grouped,
            name_width,
        }
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MANIFEST_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
