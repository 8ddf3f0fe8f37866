/*!
format.rs

Formatting primitives for human output (help screens, usage, step summaries).

  - StyleOptions::detect() / StyleOptions::plain()
  - color(role, text, &StyleOptions) -> String
  - emoji(tag, &StyleOptions) -> &'static str
  - fixed(text, width) -> String          left-aligned fixed-width column
  - table(headers, rows, &StyleOptions) -> String

Nothing here prints; callers hand the strings to an `OutputSink`.
Color is disabled by NO_COLOR, emoji by NO_EMOJI.
*/

use std::borrow::Cow;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
        }
    }

    /// No color, no emoji. Used for captured output.
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    /// Command names, flag labels.
    Primary,
    /// Section titles ("Usage:", "Options:").
    Heading,
    /// Application name in the help header.
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "32",       // green
        Role::Heading => "33",       // yellow
        Role::Accent => "38;5;213",  // magenta/pink
        Role::Success => "38;5;82",  // bright green
        Role::Warning => "38;5;214", // orange
        Role::Error => "38;5;196",   // red
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "error" => "✖",
        "warn" => "⚠",
        "info" => "ℹ",
        "clock" => "⏱",
        _ => "",
    }
}

/// Pad `text` with spaces to `width` display columns (never truncates).
pub fn fixed(text: &str, width: usize) -> String {
    let len = display_width(text);
    if len >= width {
        return text.to_string();
    }
    format!("{text}{}", " ".repeat(width - len))
}

/* -------------------------------------------------------------------------- */
/* Table Rendering                                                             */
/* -------------------------------------------------------------------------- */

/// Left-aligned columns separated by two spaces, a dashed rule under the
/// header. Cells are never cut; the last column is not padded.
pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let render = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| fixed(cell, w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(
        headers
            .iter()
            .map(|h| color(Role::Heading, h, style))
            .collect(),
    )];
    let rule = widths.iter().map(|&w| "-".repeat(w)).collect::<Vec<_>>();
    lines.push(color(Role::Dim, rule.join("  "), style));
    for row in rows {
        let cells = (0..headers.len())
            .map(|c| row.get(c).cloned().unwrap_or_default())
            .collect();
        lines.push(render(cells));
    }
    lines.join("\n")
}

/* -------------------------------------------------------------------------- */
/* ANSI / Width Utilities                                                      */
/* -------------------------------------------------------------------------- */

pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    // ESC '[' ... final letter
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for skipped in chars.by_ref() {
                if skipped.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

pub fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                       */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_basic() {
        let style = StyleOptions::plain();
        let t = table(
            &["STEP", "STATUS"],
            &[
                vec!["fetch".into(), "ok".into()],
                vec!["compile".into(), "failed".into()],
            ],
            &style,
        );
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[0].trim_end(), "STEP     STATUS");
        assert_eq!(lines[1], "-------  ------");
        assert_eq!(lines[3], "compile  failed");
    }

    #[test]
    fn test_table_keeps_long_cells() {
        let style = StyleOptions::plain();
        let long = "x".repeat(150);
        let t = table(&["STEP", "ELAPSED"], &[vec!["a".into(), long.clone()]], &style);
        assert_eq!(t.lines().nth(2), Some(format!("a     {long}").as_str()));
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fixed("ab", 4), "ab  ");
        assert_eq!(fixed("abcdef", 4), "abcdef");
        let colored = color(Role::Primary, "ab", &StyleOptions { use_color: true, use_emoji: false });
        assert_eq!(display_width(&fixed(&colored, 4)), 4);
    }

    #[test]
    fn test_strip_ansi() {
        let colored = "\x1b[31mRED\x1b[0m";
        assert_eq!(strip_ansi(colored), "RED");
    }

    #[test]
    fn plain_style_has_no_escape_codes() {
        let style = StyleOptions::plain();
        assert_eq!(color(Role::Error, "x", &style), "x");
        assert_eq!(emoji("success", &style), "");
    }
}
