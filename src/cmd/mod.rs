/*!
Built-in commands.

  src/cmd/
    mod.rs     (this file)
    help.rs    help command + global help / usage screens
    exec.rs    exec command (run a manifest by path)

Conventions:
  - Each module exposes one constructor returning a ready `Command`.
  - Screens are rendered to lines; printing goes through the output sink.
*/

pub mod exec;
pub mod help;

pub use exec::exec_command;
pub use help::{global_help_lines, help_command, usage_line, usage_lines};
