use clap::Parser;
use std::path::PathBuf;

use cli_tool::{App, AppConfig, utils};

/// cli-tool - command runner for JSON / YAML command manifests
///
/// Layout:
///   cli-tool [launcher flags] <command> [options] [--] [arguments]
///
/// Launcher flags (must precede the command):
///   -v / -vv              Increase diagnostic verbosity (stderr)
///   --config PATH         App config file (.json, .yaml, .yml)
///   --commands-dir DIR    Manifest directory (or CLI_TOOL_COMMANDS_DIR env)
///
/// Everything from the command token onwards is handled by the dispatcher:
///   cli-tool                     global help
///   cli-tool <command> --help    command usage
///   cli-tool exec ./deploy.yaml prod
///
/// Exit codes: 0 success / help, 1 command failed, 2 invalid invocation.
#[derive(Parser, Debug)]
#[command(
    name = "cli-tool",
    author,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// App config file (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding command manifests
    #[arg(long = "commands-dir", value_name = "DIR")]
    commands_dir: Option<PathBuf>,

    /// Command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    argv: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let quiet = cli.argv.iter().any(|a| a == "-q" || a == "--quiet");
    utils::init_logging(utils::derive_level(cli.verbose, quiet));

    let mut config = match &cli.config {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(e.exit_code());
            }
        },
        None => {
            let mut config = AppConfig::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            config.description = env!("CARGO_PKG_DESCRIPTION").to_string();
            config
        }
    };

    // flag > env > file
    config.apply_env();
    if let Some(dir) = cli.commands_dir {
        config.commands_dir = Some(dir);
    }

    let code = App::new(config).start(cli.argv).await;
    std::process::exit(code);
}
