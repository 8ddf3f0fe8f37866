/*!
`help.rs`

Built-in `help` command and the two screens it shares with the dispatcher.

Global help (`<bin>`, `<bin> -h`, `<bin> help`):

  <name> v<version> <description>

  Usage:
    <bin> <command> [options] [<arguments>]

  Global Options:
    -h, --help     Display this help message
   *--profile      (required options carry a `*`)

  Available commands:
    build     [b] Build the project
    help          Print help information

  <group title>
    ...

Command usage (`<bin> <command> --help`, `<bin> help <command>`):
  Description / Usage / aliases / Example / Options / Arguments.

Both screens are returned as lines and written through the output sink.
*/

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::bind::ResolvedInvocation;
use crate::command::{Command, CommandContext, CommandHandler, Outcome};
use crate::config::AppConfig;
use crate::registry::{Lookup, Registry};
use crate::schema::{ArgumentSpec, CommandSpec, Mode, OptionSpec};
use crate::utils::format::{Role, StyleOptions, color, fixed};

/* ---- Global Help ---- */

pub fn global_help_lines(
    config: &AppConfig,
    registry: &Registry,
    globals: &[OptionSpec],
    style: &StyleOptions,
) -> Vec<String> {
    let mut lines = vec![String::new()];

    let mut header = color(Role::Accent, &config.name, style);
    if !config.version.is_empty() {
        header.push(' ');
        header.push_str(&color(Role::Primary, format!("v{}", config.version), style));
    }
    if !config.description.is_empty() {
        header.push(' ');
        header.push_str(&config.description);
    }
    lines.push(header);
    lines.push(String::new());

    lines.push(color(Role::Heading, "Usage:", style));
    lines.push(format!(
        "{} <command> [options] [<arguments>]",
        color(Role::Primary, format!("  {}", config.bin_name()), style)
    ));
    lines.push(String::new());

    if !globals.is_empty() {
        lines.push(color(Role::Heading, "Global Options:", style));
        let width = globals.iter().map(|o| o.label().len()).max().unwrap_or(0) + 4;
        for opt in globals {
            lines.push(flag_row(&opt.label(), opt.mode, &opt.description, width, style));
        }
        lines.push(String::new());
    }

    lines.push(color(Role::Heading, "Available commands:", style));
    let listing = registry.list_for_help(&config.commands_sort, &config.commands_group);
    let width = listing.name_width.max(4) + 6;
    for name in &listing.commands {
        lines.push(command_row(registry, name, width, style));
    }
    lines.push(String::new());
    for (title, members) in &listing.groups {
        lines.push(title.clone());
        for name in members {
            lines.push(command_row(registry, name, width, style));
        }
        lines.push(String::new());
    }
    lines
}

fn command_row(registry: &Registry, name: &str, width: usize, style: &StyleOptions) -> String {
    let mut row = color(Role::Primary, fixed(&format!("  {name}"), width), style);
    let Some(command) = registry.get(name) else {
        return row.trim_end().to_string();
    };
    if !command.spec.aliases.is_empty() {
        row.push_str(&color(
            Role::Dim,
            format!("[{}] ", command.spec.aliases.join("|")),
            style,
        ));
    }
    row.push_str(&command.spec.description);
    row.trim_end().to_string()
}

/// ` *` marker for required entries, two spaces otherwise.
fn flag_row(label: &str, mode: Mode, description: &str, width: usize, style: &StyleOptions) -> String {
    let marker = if mode.is_required() {
        format!(" {}", color(Role::Error, "*", style))
    } else {
        "  ".to_string()
    };
    let row = format!(
        "{marker}{}{description}",
        color(Role::Primary, fixed(label, width), style)
    );
    row.trim_end().to_string()
}

/* ---- Command Usage ---- */

/// `name [options] [--] [required] <optional>`
pub fn usage_line(spec: &CommandSpec) -> String {
    let mut parts = vec![spec.name.clone()];
    if !spec.options.is_empty() {
        parts.push("[options]".to_string());
    }
    if spec.arguments.iter().any(|a| a.mode.is_required()) {
        parts.push("[--]".to_string());
    }
    for arg in &spec.arguments {
        parts.push(match arg.mode {
            Mode::Required => format!("[{}]", arg.name),
            Mode::Optional => format!("<{}>", arg.name),
        });
    }
    parts.join(" ")
}

pub fn usage_lines(spec: &CommandSpec, style: &StyleOptions) -> Vec<String> {
    let mut lines = vec![String::new()];

    if !spec.description.is_empty() {
        lines.push(color(Role::Heading, "Description:", style));
        lines.push(format!("  {}", spec.description));
        lines.push(String::new());
    }

    lines.push(color(Role::Heading, "Usage:", style));
    lines.push(format!("  {}", color(Role::Primary, usage_line(spec), style)));
    for alias in &spec.aliases {
        lines.push(format!("  {}", color(Role::Primary, alias, style)));
    }
    lines.push(String::new());

    if let Some(example) = &spec.example {
        lines.push(color(Role::Heading, "Example:", style));
        lines.push(format!("  {example}"));
        lines.push(String::new());
    }

    let arg_width = spec.arguments.iter().map(|a| a.name.len()).max().unwrap_or(0);
    let opt_width = spec.options.iter().map(|o| o.label().len()).max().unwrap_or(0);
    let width = arg_width.max(opt_width) + 4;

    if !spec.options.is_empty() {
        lines.push(color(Role::Heading, "Options:", style));
        for opt in &spec.options {
            let description = with_default(&opt.description, opt.default.as_ref());
            lines.push(flag_row(&opt.label(), opt.mode, &description, width, style));
        }
        lines.push(String::new());
    }

    if !spec.arguments.is_empty() {
        lines.push(color(Role::Heading, "Arguments:", style));
        for arg in &spec.arguments {
            // a required argument never falls back to its default
            let default = if arg.mode.is_required() { None } else { arg.default.as_ref() };
            let description = with_default(&arg.description, default);
            lines.push(flag_row(&arg.name, arg.mode, &description, width, style));
        }
        lines.push(String::new());
    }
    lines
}

fn with_default(description: &str, default: Option<&Value>) -> String {
    match default {
        Some(Value::Null) | Some(Value::Bool(false)) | None => description.to_string(),
        Some(v) => format!("{description} [default: {v}]").trim_start().to_string(),
    }
}

/* ---- Command ---- */

struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn exec(&self, invocation: &ResolvedInvocation, ctx: &CommandContext<'_>) -> Result<Outcome> {
        let style = ctx.sink.style();
        let target = invocation
            .argument_str("command")
            .and_then(|name| match ctx.registry.lookup(&name) {
                Lookup::Exact(c) | Lookup::Alias(c) => Some(c),
                Lookup::Candidates(_) => None,
            });
        let lines = match target {
            Some(command) => usage_lines(&command.spec, style),
            None => global_help_lines(ctx.config, ctx.registry, ctx.globals, style),
        };
        ctx.sink.print_lines(&lines);
        Ok(Outcome::Done)
    }
}

pub fn help_command() -> Command {
    let spec = CommandSpec {
        name: "help".to_string(),
        aliases: Vec::new(),
        description: "Print help information".to_string(),
        example: None,
        show: true,
        arguments: vec![ArgumentSpec {
            name: "command".to_string(),
            mode: Mode::Optional,
            description: "Show the usage of this command".to_string(),
            default: None,
        }],
        options: Vec::new(),
    };
    Command::new(spec, HelpCommand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FnHandler;
    use crate::config::CommandGroup;
    use serde_json::json;

    fn noop(spec: CommandSpec) -> Command {
        Command::new(spec, FnHandler(|_| async { Ok(()) }))
    }

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.register(noop(
            CommandSpec::new("build")
                .unwrap()
                .describe("Build the project")
                .alias("b"),
        ))
        .unwrap();
        r.register(noop(CommandSpec::new("deploy").unwrap().describe("Ship it")))
            .unwrap();
        r.register(noop(CommandSpec::new("internal").unwrap().hidden()))
            .unwrap();
        r.register_internal(help_command());
        r
    }

    #[test]
    fn global_help_layout() {
        let mut config = AppConfig::new("demo", "1.2.0");
        config.description = "Demo tool".into();
        config.commands_group = vec![CommandGroup {
            title: "Release".into(),
            commands: vec!["deploy".into()],
        }];
        let mut globals = config.global_options();
        let mut profile = OptionSpec::new("profile", Some("p"), "Config profile");
        profile.mode = Mode::Required;
        globals.push(profile);

        let lines = global_help_lines(&config, &registry(), &globals, &StyleOptions::plain());
        assert_eq!(lines[1], "demo v1.2.0 Demo tool");
        assert!(lines.contains(&"  demo <command> [options] [<arguments>]".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("  -h, --help") && l.ends_with("Display this help message")));
        assert!(lines.iter().any(|l| l.starts_with(" *-p, --profile")));
        assert!(lines.iter().any(|l| l.contains("build") && l.contains("[b] Build the project")));
        assert!(!lines.iter().any(|l| l.contains("internal")));

        let release = lines.iter().position(|l| l == "Release").unwrap();
        assert!(lines[release + 1].contains("deploy"));
        let help_rows = lines.iter().filter(|l| l.trim_start().starts_with("help ")).count();
        assert_eq!(help_rows, 1);
    }

    #[test]
    fn usage_screen() {
        let spec = CommandSpec::new("deploy")
            .unwrap()
            .describe("Ship it")
            .alias("d")
            .example("deploy prod --tag=v2")
            .argument("env", "Target environment", Mode::Required, Some(json!("ignored")))
            .unwrap()
            .argument("region", "Region", Mode::Optional, Some(json!("eu")))
            .unwrap()
            .option("tag", Some("t"), "Image tag", Mode::Required, None)
            .unwrap();
        let lines = usage_lines(&spec, &StyleOptions::plain());

        assert_eq!(usage_line(&spec), "deploy [options] [--] [env] <region>");
        assert!(lines.contains(&"  Ship it".to_string()));
        assert!(lines.contains(&"  d".to_string()));
        assert!(lines.contains(&"  deploy prod --tag=v2".to_string()));
        assert!(lines.iter().any(|l| l.starts_with(" *-t, --tag") && l.ends_with("Image tag")));
        assert!(lines.iter().any(|l| l.starts_with(" *env") && l.ends_with("Target environment")));
        assert!(lines.iter().any(|l| l.starts_with("  region") && l.ends_with("[default: \"eu\"]")));
    }

    #[test]
    fn usage_without_arguments() {
        let spec = CommandSpec::new("status").unwrap();
        let lines = usage_lines(&spec, &StyleOptions::plain());
        assert!(lines.contains(&"  status".to_string()));
        assert!(!lines.iter().any(|l| l == "Options:" || l == "Arguments:"));
    }
}
