/*!
schema.rs - declared surface of a command.

Types:
  - Mode          required | optional
  - ArgumentSpec  positional, bound in declaration order
  - OptionSpec    `--name` / `-s`, optional single-character short form
  - CommandSpec   name + aliases + description + ordered arguments / options

Declaration checks (raised as `CliError::Schema`):
  - empty argument / option name
  - duplicate argument name, duplicate option name
  - option short form colliding with another short form or with the
    reserved `h` (help) / `q` (quiet)
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::CliError;

/// Short forms owned by the global `--help` / `--quiet` options.
pub const RESERVED_SHORTS: &[&str] = &["h", "q"];

/// Whether a declared argument / option must be supplied.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Required,
    #[default]
    Optional,
}

impl Mode {
    /// Case-insensitive parser used for manifest values.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Some(Mode::Required),
            "optional" => Some(Mode::Optional),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Mode::Required)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Required => "required",
            Mode::Optional => "optional",
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<Value>,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, short: Option<&str>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: short.map(str::to_string),
            mode: Mode::Optional,
            description: description.into(),
            default: None,
        }
    }

    /// `-h, --help`
    pub fn help() -> Self {
        Self::new("help", Some("h"), "Display this help message")
    }

    /// `-q, --quiet`
    pub fn quiet() -> Self {
        Self::new("quiet", Some("q"), "Do not output any message").with_default(Value::Bool(false))
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Flag label as shown in usage tables: `-s, --name` or `--name`.
    pub fn label(&self) -> String {
        match &self.short {
            Some(s) => format!("-{s}, --{}", self.name),
            None => format!("--{}", self.name),
        }
    }

    /// True when `token` is this option's long name or short form.
    pub fn answers_to(&self, token: &str) -> bool {
        self.name == token || self.short.as_deref() == Some(token)
    }
}

/// The options every command accepts, in help display order.
pub fn global_options() -> Vec<OptionSpec> {
    vec![OptionSpec::help(), OptionSpec::quiet()]
}

/// Identity and declared surface of one command.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub example: Option<String>,
    /// Listed in the global help screen (still resolvable when false).
    pub show: bool,
    pub arguments: Vec<ArgumentSpec>,
    pub options: Vec<OptionSpec>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Result<Self, CliError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CliError::schema(
                &name,
                "the command name cannot be empty",
            ));
        }
        Ok(Self {
            name,
            aliases: Vec::new(),
            description: String::new(),
            example: None,
            show: true,
            arguments: Vec::new(),
            options: Vec::new(),
        })
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !alias.is_empty() && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show = false;
        self
    }

    /// Append a positional argument.
    pub fn declare_argument(
        &mut self,
        name: &str,
        description: &str,
        mode: Mode,
        default: Option<Value>,
    ) -> Result<&mut Self, CliError> {
        if name.trim().is_empty() {
            return Err(CliError::schema(
                &self.name,
                "the argument name cannot be empty",
            ));
        }
        if self.arguments.iter().any(|a| a.name == name) {
            return Err(CliError::schema(
                &self.name,
                format!("argument name duplication \"{name}\""),
            ));
        }
        self.arguments.push(ArgumentSpec {
            name: name.to_string(),
            mode,
            description: description.to_string(),
            default,
        });
        Ok(self)
    }

    /// Append an option; `short` must be a single character when given.
    pub fn declare_option(
        &mut self,
        name: &str,
        short: Option<&str>,
        description: &str,
        mode: Mode,
        default: Option<Value>,
    ) -> Result<&mut Self, CliError> {
        if name.trim().is_empty() {
            return Err(CliError::schema(
                &self.name,
                "the option name cannot be empty",
            ));
        }
        if self.options.iter().any(|o| o.name == name) {
            return Err(CliError::schema(
                &self.name,
                format!("option name duplication \"{name}\""),
            ));
        }
        let short = short.map(str::trim).filter(|s| !s.is_empty());
        if let Some(s) = short {
            if s.chars().count() != 1 || s == "-" {
                return Err(CliError::schema(
                    &self.name,
                    format!("option short name -{s} for {name} must be a single character"),
                ));
            }
            let taken = RESERVED_SHORTS.contains(&s)
                || self.options.iter().any(|o| o.short.as_deref() == Some(s));
            if taken {
                return Err(CliError::schema(
                    &self.name,
                    format!("option short name duplication -{s} for {name} option"),
                ));
            }
        }
        self.options.push(OptionSpec {
            name: name.to_string(),
            short: short.map(str::to_string),
            mode,
            description: description.to_string(),
            default,
        });
        Ok(self)
    }

    /// Chaining form of [`CommandSpec::declare_argument`].
    pub fn argument(
        mut self,
        name: &str,
        description: &str,
        mode: Mode,
        default: Option<Value>,
    ) -> Result<Self, CliError> {
        self.declare_argument(name, description, mode, default)?;
        Ok(self)
    }

    /// Chaining form of [`CommandSpec::declare_option`].
    pub fn option(
        mut self,
        name: &str,
        short: Option<&str>,
        description: &str,
        mode: Mode,
        default: Option<Value>,
    ) -> Result<Self, CliError> {
        self.declare_option(name, short, description, mode, default)?;
        Ok(self)
    }

    /// Exact name or alias match.
    pub fn answers_to(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }
}
