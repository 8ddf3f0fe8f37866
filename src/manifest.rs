//! Disk-backed commands: a JSON / YAML manifest declaring a command surface
//! plus one behavior.
//!
//! load_command(path) -> Command (spec from the manifest, ManifestHandler body)
//! Behaviors (exactly one per manifest):
//!   run:   "<command line>"              spawned once
//!   steps: [{ name, run, next? }]        driven through a Workflow
//!   jobs:  ["<command line>", ...]       driven through the TaskPool
//! Command lines are split with shell-words, then `{name}` placeholders are
//! filled from bound arguments / options and `{@}` expands to the remaining
//! positionals.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use shell_words::split as shell_split;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use crate::bind::ResolvedInvocation;
use crate::command::{Command, CommandContext, CommandHandler, Outcome};
use crate::config::read_structured;
use crate::error::{CliError, JobError};
use crate::pool::{TaskPool, available_parallelism, job};
use crate::schema::{CommandSpec, Mode};
use crate::utils::format::{Role, color, emoji, table};
use crate::utils::output::OutputSink;
use crate::workflow::{Next, Workflow, WorkflowContext};

/* ---- Manifest Schema ---- */

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ArgumentManifest {
    pub name: String,
    pub mode: Option<String>,
    #[serde(alias = "desc")]
    pub description: String,
    pub default: Option<Value>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OptionManifest {
    pub name: String,
    pub short: Option<String>,
    pub mode: Option<String>,
    #[serde(alias = "desc")]
    pub description: String,
    pub default: Option<Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StepManifest {
    pub name: String,
    pub run: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CommandManifest {
    pub name: String,
    #[serde(alias = "aliases")]
    pub alias: Option<OneOrMany>,
    #[serde(alias = "desc")]
    pub description: String,
    pub example: Option<String>,
    pub show: Option<bool>,
    #[serde(alias = "args")]
    pub arguments: Vec<ArgumentManifest>,
    pub options: Vec<OptionManifest>,
    pub run: Option<String>,
    pub steps: Vec<StepManifest>,
    pub jobs: Vec<String>,
    pub concurrency: Option<usize>,
}

/// What a manifest command does when invoked.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Shell(String),
    Steps(Vec<(String, String, Option<String>)>),
    Jobs { lines: Vec<String>, concurrency: usize },
}

/* ---- Loading ---- */

/// Read the manifest at `path` and turn it into a registrable command.
pub fn load_command(path: &Path) -> Result<Command, CliError> {
    let load_err = |message: String| CliError::Load {
        path: path.display().to_string(),
        message,
    };
    let manifest: CommandManifest = read_structured(path).map_err(|e| load_err(format!("{e:#}")))?;
    let spec = manifest.to_spec()?;
    let behavior = manifest.behavior().map_err(|e| load_err(format!("{e:#}")))?;
    tracing::debug!(command = %spec.name, path = %path.display(), "loaded manifest");

    let mut command = Command::new(spec, ManifestHandler { behavior });
    command.origin = Some(path.to_path_buf());
    Ok(command)
}

impl CommandManifest {
    pub fn to_spec(&self) -> Result<CommandSpec, CliError> {
        let mut spec = CommandSpec::new(self.name.trim())?.describe(self.description.clone());
        if let Some(aliases) = self.alias.clone() {
            for a in aliases.into_vec() {
                spec = spec.alias(a);
            }
        }
        if let Some(example) = &self.example {
            spec = spec.example(example.clone());
        }
        if self.show == Some(false) {
            spec = spec.hidden();
        }
        for arg in &self.arguments {
            let mode = normalize_mode(&self.name, &arg.name, arg.mode.as_deref());
            spec.declare_argument(&arg.name, &arg.description, mode, arg.default.clone())?;
        }
        for opt in &self.options {
            let mode = normalize_mode(&self.name, &opt.name, opt.mode.as_deref());
            spec.declare_option(
                &opt.name,
                opt.short.as_deref(),
                &opt.description,
                mode,
                opt.default.clone(),
            )?;
        }
        Ok(spec)
    }

    pub fn behavior(&self) -> Result<Behavior> {
        let declared = [self.run.is_some(), !self.steps.is_empty(), !self.jobs.is_empty()]
            .iter()
            .filter(|b| **b)
            .count();
        if declared != 1 {
            bail!("exactly one of \"run\", \"steps\" or \"jobs\" must be declared");
        }

        if let Some(line) = &self.run {
            return Ok(Behavior::Shell(line.clone()));
        }

        if !self.steps.is_empty() {
            let names: Vec<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
            for (i, step) in self.steps.iter().enumerate() {
                if step.name.trim().is_empty() {
                    bail!("step #{i} has no name");
                }
                if names[..i].contains(&step.name.as_str()) {
                    bail!("step name duplication \"{}\"", step.name);
                }
                if let Some(next) = &step.next
                    && !names.contains(&next.as_str())
                {
                    bail!("step \"{}\" jumps to unknown step \"{next}\"", step.name);
                }
            }
            return Ok(Behavior::Steps(
                self.steps
                    .iter()
                    .map(|s| (s.name.clone(), s.run.clone(), s.next.clone()))
                    .collect(),
            ));
        }

        Ok(Behavior::Jobs {
            lines: self.jobs.clone(),
            concurrency: self.concurrency.unwrap_or_else(available_parallelism),
        })
    }
}

/// Unknown mode strings fall back to optional.
fn normalize_mode(command: &str, field: &str, raw: Option<&str>) -> Mode {
    match raw {
        None => Mode::Optional,
        Some(s) => Mode::from_str_ci(s).unwrap_or_else(|| {
            tracing::warn!(command, field, mode = s, "unknown mode; using optional");
            Mode::Optional
        }),
    }
}

/* ---- Command Lines ---- */

/// Shell-split `template` and fill placeholders word by word.
pub fn render_line(
    template: &str,
    values: &HashMap<String, String>,
    remaining: &[String],
) -> Result<Vec<String>> {
    let words = shell_split(template.trim())
        .with_context(|| format!("Failed to parse command line \"{template}\""))?;
    let mut out = Vec::with_capacity(words.len());
    for word in words {
        if word == "{@}" {
            out.extend(remaining.iter().cloned());
        } else {
            out.push(substitute(&word, values));
        }
    }
    if out.is_empty() {
        bail!("No tokens produced when parsing command line \"{template}\"");
    }
    Ok(out)
}

/// Replace `{key}` with its value; unknown keys stay verbatim.
fn substitute(word: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(word.len());
    let mut rest = word;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after
            .find('}')
            .and_then(|close| values.get(&after[..close]).map(|v| (close, v)))
        {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Spawn `words[0]` with the rest as arguments; a non-zero exit is an error.
pub async fn run_words(words: &[String], quiet: bool) -> Result<()> {
    let Some((program, args)) = words.split_first() else {
        bail!("No tokens produced when parsing command line");
    };
    tracing::debug!(program = %program, ?args, "spawning");
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args);
    if quiet {
        cmd.stdout(Stdio::null());
    }
    let status = cmd
        .status()
        .await
        .with_context(|| format!("Failed to spawn \"{program}\""))?;
    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        bail!(
            "The command \"{}\" exited with code \"{}\"",
            shell_words::join(words),
            code
        );
    }
    Ok(())
}

/* ---- Handler ---- */

pub struct ManifestHandler {
    behavior: Behavior,
}

/// Workflow data for `steps` manifests.
#[derive(Debug, Clone, Default)]
struct StepRun {
    values: HashMap<String, String>,
    remaining: Vec<String>,
    quiet: bool,
}

impl StepRun {
    async fn exec(&self, line: &str) -> Result<()> {
        let words = render_line(line, &self.values, &self.remaining)?;
        run_words(&words, self.quiet).await
    }
}

#[async_trait]
impl CommandHandler for ManifestHandler {
    async fn exec(
        &self,
        invocation: &ResolvedInvocation,
        ctx: &CommandContext<'_>,
    ) -> Result<Outcome> {
        let run = StepRun {
            values: invocation.placeholders(),
            remaining: invocation.remaining.clone(),
            quiet: ctx.sink.is_quiet(),
        };
        match &self.behavior {
            Behavior::Shell(line) => run.exec(line).await?,
            Behavior::Steps(steps) => run_steps(&invocation.command, steps, run, ctx.sink).await?,
            Behavior::Jobs { lines, concurrency } => {
                run_jobs(lines, *concurrency, &run, ctx.sink).await?
            }
        }
        Ok(Outcome::Done)
    }
}

async fn run_steps(
    name: &str,
    steps: &[(String, String, Option<String>)],
    run: StepRun,
    sink: &dyn OutputSink,
) -> Result<()> {
    let mut workflow = Workflow::new(name);
    for (step, line, next) in steps {
        let line = line.clone();
        let next = next.clone().map(Next::Goto).unwrap_or_default();
        workflow = workflow.step(step.clone(), move |state: &mut StepRun| {
            let line = line.clone();
            let next = next.clone();
            async move {
                state.exec(&line).await?;
                Ok(next)
            }
            .boxed()
        });
    }

    let mut ctx = WorkflowContext::new(run);
    let outcome = workflow.start(&mut ctx).await;
    sink.print(&step_summary(&ctx, sink));
    outcome.map_err(anyhow::Error::from)
}

fn step_summary(ctx: &WorkflowContext<StepRun>, sink: &dyn OutputSink) -> String {
    let rows: Vec<Vec<String>> = ctx
        .step_names()
        .iter()
        .filter_map(|name| ctx.record(name))
        .map(|r| {
            let style = sink.style();
            let (tag, role, text) = match r.succeeded {
                Some(true) => ("success", Role::Success, "ok"),
                Some(false) => ("error", Role::Error, "failed"),
                None => ("warn", Role::Warning, "running"),
            };
            let status = format!("{} {}", emoji(tag, style), color(role, text, style))
                .trim_start()
                .to_string();
            let elapsed = r
                .elapsed()
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_default();
            vec![r.step_name.clone(), status, elapsed]
        })
        .collect();
    table(&["STEP", "STATUS", "ELAPSED"], &rows, sink.style())
}

async fn run_jobs(
    lines: &[String],
    concurrency: usize,
    run: &StepRun,
    sink: &dyn OutputSink,
) -> Result<()> {
    let mut jobs = Vec::with_capacity(lines.len());
    for line in lines {
        let words = render_line(line, &run.values, &run.remaining)?;
        let quiet = run.quiet;
        jobs.push(job(move || async move { run_words(&words, quiet).await }));
    }
    let total = jobs.len();
    let results = TaskPool::new(concurrency).run(jobs).await;

    let failed: Vec<&JobError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    for e in &failed {
        sink.error(&e.to_string());
    }
    if !failed.is_empty() {
        bail!("{} of {} jobs failed", failed.len(), total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::{Binding, bind};
    use crate::config::AppConfig;
    use crate::registry::Registry;
    use crate::schema::global_options;
    use crate::utils::output::BufferSink;
    use crate::utils::prompt::ScriptedPrompter;
    use serde_json::json;

    fn write(dir: &tempfile::TempDir, file: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(file);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn invoke(command: &Command, tokens: &[&str]) -> ResolvedInvocation {
        let tokens: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        match bind(&command.spec, &tokens, &global_options()).unwrap() {
            Binding::Invocation(inv) => inv,
            Binding::Help => panic!("unexpected help"),
        }
    }

    async fn exec(command: &Command, tokens: &[&str], sink: &BufferSink) -> Result<Outcome> {
        let config = AppConfig::new("test", "0.0.0");
        let registry = Registry::new();
        let globals = global_options();
        let prompter = ScriptedPrompter::non_interactive();
        let ctx = CommandContext {
            config: &config,
            registry: &registry,
            globals: &globals,
            sink,
            prompter: &prompter,
        };
        let inv = invoke(command, tokens);
        command.handler.exec(&inv, &ctx).await
    }

    #[test]
    fn yaml_manifest_to_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "deploy.yaml",
            r#"
name: deploy
alias: d
desc: Deploy the app
example: deploy prod
args:
  - name: env
    mode: REQUIRED
  - name: region
    mode: sometimes
    default: eu
options:
  - name: tag
    short: t
    default: latest
run: echo {env} {region} {tag}
"#,
        );
        let command = load_command(&path).unwrap();
        let spec = &command.spec;
        assert_eq!(spec.name, "deploy");
        assert_eq!(spec.aliases, vec!["d"]);
        assert_eq!(spec.description, "Deploy the app");
        assert_eq!(spec.example.as_deref(), Some("deploy prod"));
        assert_eq!(spec.arguments[0].mode, Mode::Required);
        assert_eq!(spec.arguments[1].mode, Mode::Optional);
        assert_eq!(spec.arguments[1].default, Some(json!("eu")));
        assert_eq!(spec.options[0].short.as_deref(), Some("t"));
        assert_eq!(command.origin.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn json_manifest_with_alias_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "serve.json",
            r#"{"name":"serve","aliases":["s","up"],"show":false,"jobs":["true"],"concurrency":2}"#,
        );
        let command = load_command(&path).unwrap();
        assert_eq!(command.spec.aliases, vec!["s", "up"]);
        assert!(!command.spec.show);
    }

    #[test]
    fn behavior_must_be_unique() {
        let dir = tempfile::tempdir().unwrap();
        let both = write(&dir, "both.yaml", "name: both\nrun: 'true'\njobs: ['true']\n");
        assert!(matches!(load_command(&both), Err(CliError::Load { .. })));
        let none = write(&dir, "none.yaml", "name: none\n");
        let err = load_command(&none).unwrap_err();
        assert!(err.to_string().contains("exactly one of"));
    }

    #[test]
    fn step_jump_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "flow.yaml",
            "name: flow\nsteps:\n  - name: a\n    run: 'true'\n    next: z\n",
        );
        let err = load_command(&path).unwrap_err();
        assert!(err.to_string().contains("unknown step \"z\""));
    }

    #[test]
    fn schema_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "bad.yaml",
            "name: bad\nrun: 'true'\noptions:\n  - name: host\n    short: h\n",
        );
        assert!(matches!(load_command(&path), Err(CliError::Schema { .. })));
    }

    #[test]
    fn placeholders_fill_per_word() {
        let mut values = HashMap::new();
        values.insert("env".to_string(), "prod env".to_string());
        values.insert("tag".to_string(), "v2".to_string());
        let remaining = vec!["x".to_string(), "y".to_string()];
        let words = render_line(
            "deploy --env={env} 'image:{tag}' {missing} {@}",
            &values,
            &remaining,
        )
        .unwrap();
        assert_eq!(
            words,
            vec!["deploy", "--env=prod env", "image:v2", "{missing}", "x", "y"]
        );
        assert!(render_line("  ", &values, &remaining).is_err());
        assert!(render_line("echo 'open", &values, &remaining).is_err());
    }

    #[tokio::test]
    async fn shell_exit_code_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ok = load_command(&write(&dir, "ok.yaml", "name: ok\nrun: 'true'\n")).unwrap();
        let sink = BufferSink::new();
        assert!(matches!(exec(&ok, &[], &sink).await, Ok(Outcome::Done)));

        let fail = load_command(&write(
            &dir,
            "fail.yaml",
            "name: fail\nrun: sh -c 'exit {code}'\nargs:\n  - name: code\n",
        ))
        .unwrap();
        let err = exec(&fail, &["3"], &sink).await.err().unwrap();
        assert!(err.to_string().contains("exited with code \"3\""));
    }

    #[tokio::test]
    async fn steps_follow_jumps() {
        let dir = tempfile::tempdir().unwrap();
        let command = load_command(&write(
            &dir,
            "flow.yaml",
            r#"
name: flow
steps:
  - name: first
    run: "true"
    next: third
  - name: second
    run: "false"
  - name: third
    run: "true"
"#,
        ))
        .unwrap();
        let sink = BufferSink::new();
        exec(&command, &[], &sink).await.unwrap();
        let out = sink.contents();
        assert!(out.contains("first"));
        assert!(out.contains("third"));
        assert!(!out.contains("second"));
    }

    #[tokio::test]
    async fn failed_step_fails_command() {
        let dir = tempfile::tempdir().unwrap();
        let command = load_command(&write(
            &dir,
            "flow.yaml",
            "name: flow\nsteps:\n  - name: a\n    run: 'false'\n  - name: b\n    run: 'true'\n",
        ))
        .unwrap();
        let sink = BufferSink::new();
        let err = exec(&command, &[], &sink).await.err().unwrap();
        assert!(err.to_string().contains("\"a\" failed"));
        assert!(sink.contents().contains("failed"));
    }

    #[tokio::test]
    async fn jobs_settle_before_failing() {
        let dir = tempfile::tempdir().unwrap();
        let command = load_command(&write(
            &dir,
            "batch.yaml",
            "name: batch\nconcurrency: 2\njobs:\n  - 'true'\n  - 'false'\n  - 'true'\n",
        ))
        .unwrap();
        let sink = BufferSink::new();
        let err = exec(&command, &[], &sink).await.err().unwrap();
        assert_eq!(err.to_string(), "1 of 3 jobs failed");
        assert_eq!(sink.errors().len(), 1);
        assert!(sink.errors()[0].contains("job #1"));
    }
}
