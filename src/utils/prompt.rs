/*!
prompt.rs - interactive questions used during command disambiguation.

  - Prompter          trait (is_interactive / confirm / select)
  - StdinPrompter     numbered-list selection on stdin, interactive only
                      when stdin is a terminal
  - ScriptedPrompter  canned answers, for tests and non-terminal embedding

Callers must check `is_interactive()` before asking; a non-interactive
prompter is never expected to block.
*/

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;

use crate::error::CliError;

pub trait Prompter: Send + Sync {
    fn is_interactive(&self) -> bool;

    /// Yes/no question; an empty answer picks `default`.
    fn confirm(&self, message: &str, default: bool) -> Result<bool, CliError>;

    /// Pick one of `choices`; returns the chosen entry.
    fn select(&self, message: &str, choices: &[String]) -> Result<String, CliError>;
}

/// Reads answers from stdin, writes questions to stdout.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_line(&self) -> Result<String, CliError> {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| CliError::Prompt(e.to_string()))?;
        Ok(line.trim().to_string())
    }
}

impl Prompter for StdinPrompter {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool, CliError> {
        let hint = if default { "Y/n" } else { "y/N" };
        print!("{message} ({hint}) ");
        let _ = io::stdout().flush();
        let answer = self.read_line()?;
        Ok(parse_confirm(&answer, default))
    }

    fn select(&self, message: &str, choices: &[String]) -> Result<String, CliError> {
        if choices.is_empty() {
            return Err(CliError::Prompt(
                "at least one choice must be selectable".into(),
            ));
        }
        println!("{message}");
        for (i, c) in choices.iter().enumerate() {
            println!("  [{}] {}", i + 1, c);
        }
        print!("Enter number (1-{}): ", choices.len());
        let _ = io::stdout().flush();
        let answer = self.read_line()?;
        pick_choice(&answer, choices)
            .ok_or_else(|| CliError::Prompt(format!("invalid selection: {answer}")))
    }
}

/// y / yes / n / no, case-insensitive; anything else keeps `default`.
pub fn parse_confirm(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// 1-based number or exact choice text.
pub fn pick_choice(answer: &str, choices: &[String]) -> Option<String> {
    let trimmed = answer.trim();
    if let Ok(idx) = trimmed.parse::<usize>()
        && idx >= 1
        && idx <= choices.len()
    {
        return Some(choices[idx - 1].clone());
    }
    choices.iter().find(|c| c.as_str() == trimmed).cloned()
}

/// Answers questions from a queue and records what was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    interactive: bool,
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// A prompter that reports a terminal and replays `answers` in order.
    pub fn interactive<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            interactive: true,
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// A prompter that reports no terminal.
    pub fn non_interactive() -> Self {
        Self::default()
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next_answer(&self, message: &str) -> Result<String, CliError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
        self.answers
            .lock()
            .map_err(|e| CliError::Prompt(e.to_string()))?
            .pop_front()
            .ok_or_else(|| CliError::Prompt(format!("no scripted answer for: {message}")))
    }
}

impl Prompter for ScriptedPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool, CliError> {
        let answer = self.next_answer(message)?;
        Ok(parse_confirm(&answer, default))
    }

    fn select(&self, message: &str, choices: &[String]) -> Result<String, CliError> {
        let answer = self.next_answer(message)?;
        pick_choice(&answer, choices)
            .ok_or_else(|| CliError::Prompt(format!("invalid selection: {answer}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_answers() {
        assert!(parse_confirm("", true));
        assert!(!parse_confirm("", false));
        assert!(parse_confirm("YES", false));
        assert!(!parse_confirm("n", true));
    }

    #[test]
    fn pick_by_number_or_name() {
        let choices = vec!["build".to_string(), "builder".to_string()];
        assert_eq!(pick_choice("2", &choices).as_deref(), Some("builder"));
        assert_eq!(pick_choice(" build ", &choices).as_deref(), Some("build"));
        assert_eq!(pick_choice("3", &choices), None);
        assert_eq!(pick_choice("bui", &choices), None);
    }

    #[test]
    fn scripted_replays_in_order() {
        let p = ScriptedPrompter::interactive(["y", "1"]);
        assert!(p.confirm("first?", false).unwrap());
        let pick = p.select("second?", &["a".to_string()]).unwrap();
        assert_eq!(pick, "a");
        assert_eq!(p.asked(), vec!["first?".to_string(), "second?".to_string()]);
        assert!(p.confirm("third?", true).is_err());
    }
}
