//! Statement-level parsing for QuillScript source.
//!
//! QuillScript is line oriented: every statement is one physical line,
//! blocks are brace delimited, and a block header carries its opening
//! `{` on the same line. This module turns raw source into normalized
//! [`Statement`]s, classifies each statement into a [`Command`], and
//! extracts nested block bodies.

/// One normalized statement: trimmed text plus its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub text: String,
}

/// Typed read modes for the input commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Text,
    Int,
    Float,
}

/// Closed set of statement commands. Names that are not part of the
/// fixed vocabulary (module members, user functions, class names,
/// typos) come through as `Bare` and are resolved by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read(ReadMode),
    Print,
    NumVar,
    Compute,
    FileRead,
    FileWrite,
    If,
    Else,
    Repeat,
    ForEach,
    StrVar,
    BoolVar,
    ListDecl,
    ListAppend,
    ListLength,
    ListGet,
    FuncDef,
    Return,
    ClassDef,
    MethodCall { target: String, method: String },
    Bare(String),
}

/// A dispatched statement: the command plus its raw argument tokens.
/// `call_style` records whether the statement used the `name(a, b)`
/// form; some commands re-read the original statement text instead of
/// relying on these tokens (assignment right-hand sides, conditions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub command: Command,
    pub args: Vec<String>,
    pub call_style: bool,
}

/// Split raw file content into normalized statements. Everything from
/// the first `;` or `#` to end of line is discarded, then the line is
/// trimmed; blank results are dropped. Line numbers are 1-based.
pub fn split_source(source: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let cut = raw
            .find(|c| c == ';' || c == '#')
            .map_or(raw, |pos| &raw[..pos]);
        let text = cut.trim();
        if !text.is_empty() {
            statements.push(Statement {
                line: index + 1,
                text: text.to_string(),
            });
        }
    }
    statements
}

/// Classify one statement into a command plus raw argument tokens.
///
/// Call style is tried first: an identifier (dots allowed, for method
/// calls) immediately followed by a parenthesized region spanning to
/// the end of the line. Otherwise the statement splits on whitespace
/// into at most four tokens: the command and up to three arguments.
pub fn dispatch(text: &str) -> Dispatched {
    if let Some((name, raw_args)) = match_call(text) {
        let args = split_call_args(raw_args);
        let command = classify(name);
        return Dispatched {
            command,
            args,
            call_style: true,
        };
    }

    let mut tokens = split_plain(text);
    let name = if tokens.is_empty() {
        String::new()
    } else {
        tokens.remove(0)
    };
    Dispatched {
        command: classify(&name),
        args: tokens,
        call_style: false,
    }
}

/// Whitespace split with at most four resulting tokens: runs of
/// whitespace collapse, and everything past the third boundary stays
/// one piece.
fn split_plain(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text.trim();
    while out.len() < 3 && !rest.is_empty() {
        match rest.find(char::is_whitespace) {
            Some(pos) => {
                out.push(rest[..pos].to_string());
                rest = rest[pos..].trim_start();
            }
            None => {
                out.push(rest.to_string());
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

fn classify(name: &str) -> Command {
    match name {
        "read" => Command::Read(ReadMode::Text),
        "read_int" => Command::Read(ReadMode::Int),
        "read_float" => Command::Read(ReadMode::Float),
        "print" => Command::Print,
        "numvar" => Command::NumVar,
        "compute" => Command::Compute,
        "read_file" => Command::FileRead,
        "write_file" => Command::FileWrite,
        "if" => Command::If,
        "else" => Command::Else,
        "repeat" => Command::Repeat,
        "foreach" => Command::ForEach,
        "strvar" => Command::StrVar,
        "boolvar" => Command::BoolVar,
        "list" => Command::ListDecl,
        "append" => Command::ListAppend,
        "length" => Command::ListLength,
        "get" => Command::ListGet,
        "func" => Command::FuncDef,
        "return" => Command::Return,
        "class" => Command::ClassDef,
        _ => match name.split_once('.') {
            Some((target, method)) if !target.is_empty() && !method.is_empty() => {
                Command::MethodCall {
                    target: target.to_string(),
                    method: method.to_string(),
                }
            }
            _ => Command::Bare(name.to_string()),
        },
    }
}

/// Match the `name(args)` call form: identifier characters (letters,
/// digits, `_`, `.`) directly followed by `(`, with the closing `)`
/// ending the statement.
fn match_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    if open == 0 || !text.ends_with(')') {
        return None;
    }
    let name = &text[..open];
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some((name, &text[open + 1..text.len() - 1]))
}

/// Split a raw argument region on commas that are not inside double
/// quotes. An empty region yields no arguments.
pub fn split_call_args(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                pieces.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    pieces.push(current.trim().to_string());
    pieces
}

/// Extract a brace-delimited block body.
///
/// The opening delimiter is assumed already consumed by the caller at
/// `start - 1` (block headers carry their `{` on the header line), so
/// scanning begins at depth 1. Statements containing `{` increase the
/// depth and belong to the body; the statement that brings the depth
/// back to zero is excluded. Returns the body and the index just past
/// the closing statement. An unterminated block returns whatever was
/// collected together with the end index.
pub fn extract_block(statements: &[Statement], start: usize) -> (Vec<Statement>, usize) {
    let mut body = Vec::new();
    let mut depth = 1usize;
    let mut i = start;
    while i < statements.len() {
        let text = statements[i].text.as_str();
        if text.contains('{') {
            depth += 1;
            body.push(statements[i].clone());
        } else if text.contains('}') {
            depth -= 1;
            if depth == 0 {
                return (body, i + 1);
            }
            body.push(statements[i].clone());
        } else {
            body.push(statements[i].clone());
        }
        i += 1;
    }
    (body, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(lines: &[&str]) -> Vec<Statement> {
        lines
            .iter()
            .enumerate()
            .map(|(i, text)| Statement {
                line: i + 1,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_split_source_strips_comments_and_terminators() {
        let source = "print x  # trailing comment\n\n   \nnumvar y = 1;\n# whole line\nprint y";
        let result = split_source(source);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], Statement { line: 1, text: "print x".into() });
        assert_eq!(result[1], Statement { line: 4, text: "numvar y = 1".into() });
        assert_eq!(result[2], Statement { line: 6, text: "print y".into() });
    }

    #[test]
    fn test_dispatch_call_style() {
        let d = dispatch("print(\"hello, world\", x)");
        assert_eq!(d.command, Command::Print);
        assert!(d.call_style);
        assert_eq!(d.args, vec!["\"hello, world\"".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_dispatch_plain_keeps_at_most_three_args() {
        let d = dispatch("numvar x = 2 + 3 * 4");
        assert_eq!(d.command, Command::NumVar);
        assert!(!d.call_style);
        // The tail past the third token is re-joined into one piece;
        // assignment commands re-read the statement text anyway.
        assert_eq!(d.args, vec!["x".to_string(), "=".to_string(), "2 + 3 * 4".to_string()]);
    }

    #[test]
    fn test_dispatch_method_call() {
        let d = dispatch("p.move(1, 2)");
        assert_eq!(
            d.command,
            Command::MethodCall { target: "p".into(), method: "move".into() }
        );
        assert_eq!(d.args, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_dispatch_unknown_name_is_bare() {
        let d = dispatch("frobnicate x");
        assert_eq!(d.command, Command::Bare("frobnicate".into()));
    }

    #[test]
    fn test_func_header_is_not_call_style() {
        // The space before the function name keeps the header out of
        // the call form; the engine parses the parameter list itself.
        let d = dispatch("func add(a, b) {");
        assert_eq!(d.command, Command::FuncDef);
        assert!(!d.call_style);
    }

    #[test]
    fn test_split_call_args_respects_quotes() {
        assert_eq!(
            split_call_args("\"a, b\", 3, x"),
            vec!["\"a, b\"".to_string(), "3".to_string(), "x".to_string()]
        );
        assert!(split_call_args("   ").is_empty());
    }

    #[test]
    fn test_extract_block_simple() {
        let s = stmts(&["repeat 2 {", "print x", "}", "print done"]);
        let (body, resume) = extract_block(&s, 1);
        assert_eq!(body.len(), 1);
        assert_eq!(body[0], Statement { line: 2, text: "print x".into() });
        assert_eq!(resume, 3);
    }

    #[test]
    fn test_extract_block_nested_resumes_past_outermost_close() {
        // Loop containing a nested loop containing a nested loop: the
        // resume index must land past the outermost closing brace.
        let s = stmts(&[
            "repeat 2 {",
            "repeat 3 {",
            "repeat 4 {",
            "print x",
            "}",
            "}",
            "}",
            "print done",
        ]);
        let (body, resume) = extract_block(&s, 1);
        assert_eq!(resume, 7);
        assert_eq!(body.len(), 5);
        assert_eq!(body[0].text, "repeat 3 {");
        assert_eq!(body[4].text, "}");
    }

    #[test]
    fn test_extract_block_header_content_stays_out_of_body() {
        // The header's own `{` belongs to the caller, so none of the
        // header text leaks into the body.
        let s = stmts(&["repeat 3 {", "append totals n", "}"]);
        let (body, resume) = extract_block(&s, 1);
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].text, "append totals n");
        assert_eq!(resume, 3);
    }

    #[test]
    fn test_extract_block_unterminated_returns_collected() {
        let s = stmts(&["repeat 3 {", "print x", "print y"]);
        let (body, resume) = extract_block(&s, 1);
        assert_eq!(body.len(), 2);
        assert_eq!(resume, 3);
    }
}
