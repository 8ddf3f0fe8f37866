/*!
bind.rs - turn raw argv tokens into a `ResolvedInvocation`.

Tokenizer rules (simple tokenized argv, no shell quoting):
  --name           boolean true
  --no-name        boolean false
  --name=value     value
  -s / -s=value    short form, mapped to its long name
  -abc             grouped shorts, each true
  --               everything after is positional
  -, -5, -1.5      positional

Values only attach through `=`; a bare flag never swallows the next token.
Tokens that round-trip exactly through an integer or float parse bind as
JSON numbers, everything else as strings.

Binding order:
  1. tokenize (declared shorts + reserved `h`/`q` act as aliases)
  2. `help` present -> `Binding::Help` (caller renders usage, exit 0)
  3. global options
  4. command options (collision with a global -> DuplicateOption)
  5. positional arguments in declaration order
  6. leftover positionals kept in `remaining`
*/

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::CliError;
use crate::schema::{CommandSpec, OptionSpec};

/* ---- Tokenizer ---- */

/// Flags and positionals split out of one argv slice.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedArgv {
    pub flags: HashMap<String, Value>,
    pub positionals: Vec<String>,
}

/// Split `tokens` into flags and positionals. `aliases` maps short forms to long names.
pub fn tokenize(tokens: &[String], aliases: &HashMap<String, String>) -> ParsedArgv {
    let mut parsed = ParsedArgv::default();
    let canonical = |key: &str| -> String {
        aliases
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    };

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        if token == "--" {
            parsed.positionals.extend(iter.by_ref().cloned());
            break;
        }
        if let Some(long) = token.strip_prefix("--") {
            if let Some((key, raw)) = long.split_once('=') {
                parsed.flags.insert(canonical(key), coerce_token(raw));
            } else if let Some(negated) = long.strip_prefix("no-") {
                parsed.flags.insert(canonical(negated), Value::Bool(false));
            } else {
                parsed.flags.insert(canonical(long), Value::Bool(true));
            }
            continue;
        }
        if let Some(short) = token.strip_prefix('-')
            && !short.is_empty()
            && !looks_numeric(short)
        {
            let (letters, value) = match short.split_once('=') {
                Some((letters, raw)) => (letters, Some(coerce_token(raw))),
                None => (short, None),
            };
            let chars: Vec<char> = letters.chars().collect();
            for (i, c) in chars.iter().enumerate() {
                let key = canonical(&c.to_string());
                let is_last = i + 1 == chars.len();
                let val = match (&value, is_last) {
                    (Some(v), true) => v.clone(),
                    _ => Value::Bool(true),
                };
                parsed.flags.insert(key, val);
            }
            continue;
        }
        parsed.positionals.push(token.clone());
    }
    parsed
}

fn looks_numeric(s: &str) -> bool {
    s.parse::<f64>().is_ok()
}

/// Numbers only when the text survives a parse/print round trip ("007", "1.10" stay strings).
pub fn coerce_token(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>()
        && n.to_string() == raw
    {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
        && f.to_string() == raw
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/* ---- Resolved Invocation ---- */

/// Bound values for one concrete execution of a command.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResolvedInvocation {
    pub command: String,
    pub arguments: Map<String, Value>,
    pub options: Map<String, Value>,
    /// Positional tokens left after every declared argument was bound.
    pub remaining: Vec<String>,
    /// The raw tokens this invocation was bound from.
    #[serde(skip)]
    pub tokens: Vec<String>,
}

impl ResolvedInvocation {
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name).filter(|v| !v.is_null())
    }

    /// Truthiness of an option (absent, null, false, "" and 0 are false).
    pub fn flag(&self, name: &str) -> bool {
        match self.option(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(_) => true,
            None => false,
        }
    }

    /// Argument rendered as plain text (strings unquoted).
    pub fn argument_str(&self, name: &str) -> Option<String> {
        self.argument(name).map(render_value)
    }

    /// Every bound argument and option rendered as text, options last.
    pub fn placeholders(&self) -> HashMap<String, String> {
        self.arguments
            .iter()
            .chain(self.options.iter())
            .map(|(k, v)| (k.clone(), render_value(v)))
            .collect()
    }
}

/// Plain-text rendering of a bound value; null renders empty.
pub fn render_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/* ---- Binding ---- */

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// `--help` / `-h` was given; nothing else was bound.
    Help,
    Invocation(ResolvedInvocation),
}

/// Bind `tokens` against `spec`, with `globals` applying to every command.
pub fn bind(
    spec: &CommandSpec,
    tokens: &[String],
    globals: &[OptionSpec],
) -> Result<Binding, CliError> {
    let mut aliases: HashMap<String, String> = HashMap::new();
    for opt in globals.iter().chain(spec.options.iter()) {
        if let Some(s) = &opt.short {
            aliases.entry(s.clone()).or_insert_with(|| opt.name.clone());
        }
    }
    let parsed = tokenize(tokens, &aliases);
    tracing::trace!(command = %spec.name, ?parsed, "tokenized argv");

    if parsed.flags.get("help").is_some_and(|v| v.as_bool() != Some(false)) {
        return Ok(Binding::Help);
    }

    let mut invocation = ResolvedInvocation {
        command: spec.name.clone(),
        tokens: tokens.to_vec(),
        ..Default::default()
    };

    for opt in globals {
        let value = bind_option(spec, opt, &parsed)?;
        invocation.options.insert(opt.name.clone(), value);
    }

    for opt in &spec.options {
        let collides = globals.iter().any(|g| {
            g.name == opt.name
                || opt
                    .short
                    .as_deref()
                    .is_some_and(|s| g.answers_to(s))
        });
        if collides {
            return Err(CliError::DuplicateOption {
                command: spec.name.clone(),
                option: opt.name.clone(),
            });
        }
        let value = bind_option(spec, opt, &parsed)?;
        invocation.options.insert(opt.name.clone(), value);
    }

    let mut positionals = parsed.positionals.into_iter();
    for arg in &spec.arguments {
        let value = match positionals.next() {
            Some(token) => coerce_token(&token),
            None if arg.mode.is_required() => {
                return Err(CliError::MissingArgument {
                    command: spec.name.clone(),
                    name: arg.name.clone(),
                });
            }
            None => arg.default.clone().unwrap_or(Value::Null),
        };
        invocation.arguments.insert(arg.name.clone(), value);
    }
    invocation.remaining = positionals.collect();

    Ok(Binding::Invocation(invocation))
}

fn bind_option(
    spec: &CommandSpec,
    opt: &OptionSpec,
    parsed: &ParsedArgv,
) -> Result<Value, CliError> {
    match parsed.flags.get(&opt.name) {
        Some(v) => Ok(v.clone()),
        None if opt.mode.is_required() => Err(CliError::MissingOption {
            command: spec.name.clone(),
            name: opt.name.clone(),
        }),
        None => Ok(opt.default.clone().unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Mode, global_options};
    use serde_json::json;

    fn argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn deploy_spec() -> CommandSpec {
        CommandSpec::new("deploy")
            .unwrap()
            .argument("env", "target environment", Mode::Required, None)
            .unwrap()
            .argument("region", "", Mode::Optional, Some(json!("eu-west")))
            .unwrap()
            .option("tag", Some("t"), "", Mode::Optional, Some(json!("latest")))
            .unwrap()
            .option("force", Some("f"), "", Mode::Optional, Some(json!(false)))
            .unwrap()
    }

    fn invocation(binding: Binding) -> ResolvedInvocation {
        match binding {
            Binding::Invocation(inv) => inv,
            Binding::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn tokenize_forms() {
        let mut aliases = HashMap::new();
        aliases.insert("t".to_string(), "tag".to_string());
        let p = tokenize(
            &argv("a --x=1 --y --no-z -t=v2 -ab b -- --c -d"),
            &aliases,
        );
        assert_eq!(p.flags.get("x"), Some(&json!(1)));
        assert_eq!(p.flags.get("y"), Some(&json!(true)));
        assert_eq!(p.flags.get("z"), Some(&json!(false)));
        assert_eq!(p.flags.get("tag"), Some(&json!("v2")));
        assert_eq!(p.flags.get("a"), Some(&json!(true)));
        assert_eq!(p.flags.get("b"), Some(&json!(true)));
        assert_eq!(p.positionals, argv("a b --c -d"));
    }

    #[test]
    fn negative_numbers_are_positional() {
        let p = tokenize(&argv("-5 - -1.5"), &HashMap::new());
        assert!(p.flags.is_empty());
        assert_eq!(p.positionals, argv("-5 - -1.5"));
    }

    #[test]
    fn coerce_keeps_lossy_text() {
        assert_eq!(coerce_token("42"), json!(42));
        assert_eq!(coerce_token("2.5"), json!(2.5));
        assert_eq!(coerce_token("007"), json!("007"));
        assert_eq!(coerce_token("1.10"), json!("1.10"));
        assert_eq!(coerce_token("abc"), json!("abc"));
    }

    #[test]
    fn defaults_when_no_flags() {
        let inv = invocation(bind(&deploy_spec(), &argv("prod"), &global_options()).unwrap());
        assert_eq!(inv.argument("env"), Some(&json!("prod")));
        assert_eq!(inv.argument("region"), Some(&json!("eu-west")));
        assert_eq!(inv.option("tag"), Some(&json!("latest")));
        assert_eq!(inv.option("force"), Some(&json!(false)));
        assert!(!inv.flag("quiet"));
        assert!(inv.remaining.is_empty());
    }

    #[test]
    fn supplied_values_override_defaults() {
        let inv = invocation(
            bind(
                &deploy_spec(),
                &argv("prod us-east --tag=v2 -f -q extra more"),
                &global_options(),
            )
            .unwrap(),
        );
        assert_eq!(inv.argument_str("region").as_deref(), Some("us-east"));
        assert_eq!(inv.option("tag"), Some(&json!("v2")));
        assert!(inv.flag("force"));
        assert!(inv.flag("quiet"));
        assert_eq!(inv.remaining, argv("extra more"));
    }

    #[test]
    fn help_short_circuits_before_validation() {
        let b = bind(&deploy_spec(), &argv("-h"), &global_options()).unwrap();
        assert_eq!(b, Binding::Help);
        let b = bind(&deploy_spec(), &argv("--help"), &global_options()).unwrap();
        assert_eq!(b, Binding::Help);
    }

    #[test]
    fn missing_required_argument() {
        let err = bind(&deploy_spec(), &[], &global_options()).unwrap_err();
        assert!(matches!(err, CliError::MissingArgument { ref name, .. } if name == "env"));
    }

    #[test]
    fn missing_required_option() {
        let spec = CommandSpec::new("push")
            .unwrap()
            .option("remote", Some("r"), "", Mode::Required, Some(json!("origin")))
            .unwrap();
        let err = bind(&spec, &[], &global_options()).unwrap_err();
        assert!(matches!(err, CliError::MissingOption { ref name, .. } if name == "remote"));

        let inv = invocation(bind(&spec, &argv("-r=upstream"), &global_options()).unwrap());
        assert_eq!(inv.option("remote"), Some(&json!("upstream")));
    }

    #[test]
    fn required_global_option_enforced() {
        let mut globals = global_options();
        let mut profile = OptionSpec::new("profile", Some("p"), "");
        profile.mode = Mode::Required;
        globals.push(profile);
        let err = bind(&deploy_spec(), &argv("prod"), &globals).unwrap_err();
        assert!(matches!(err, CliError::MissingOption { ref name, .. } if name == "profile"));
    }

    #[test]
    fn option_named_like_global_collides() {
        let spec = CommandSpec::new("run")
            .unwrap()
            .option("quiet", None, "", Mode::Optional, None)
            .unwrap();
        let err = bind(&spec, &[], &global_options()).unwrap_err();
        match err {
            CliError::DuplicateOption { command, option } => {
                assert_eq!(command, "run");
                assert_eq!(option, "quiet");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn required_argument_default_ignored() {
        let spec = CommandSpec::new("cat")
            .unwrap()
            .argument("file", "", Mode::Required, Some(json!("unused")))
            .unwrap();
        assert!(bind(&spec, &[], &global_options()).is_err());
    }
}
