//! The QuillScript execution engine.
//!
//! A single interpreter owns all program state: one flat variable
//! environment, the list table, and the function and class tables.
//! Scoping is dynamic and flat by design: a function or method call
//! overlays its bindings onto the shared environment and the prior
//! full mapping is restored on exit. There is no lexical nesting and
//! no closure capture.

pub mod errors;
pub mod value;

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};

use crate::expr;
use crate::modules::{self, Member};
use crate::parser::{self, Command, ReadMode, Statement};

pub use errors::RuntimeError;
pub use value::{ClassDef, FunctionDef, Instance, Value};

/// Reserved variable holding the most recent function return value.
pub const RETURN_SLOT: &str = "_ret";
/// Reserved loop variable bound to the current element in `foreach`.
pub const LOOP_ITEM: &str = "_item";

enum Flow {
    Next,
    Jump(usize),
    Return(Value),
}

pub struct Interpreter {
    variables: HashMap<String, Value>,
    lists: HashMap<String, Vec<Value>>,
    functions: HashMap<String, FunctionDef>,
    classes: HashMap<String, ClassDef>,
    input: Box<dyn BufRead>,
    /// Everything printed, one line per entry, errors included.
    /// Mirrors stdout/stderr so tests can assert on a run's output.
    output: Vec<String>,
    trace: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_input(Box::new(BufReader::new(io::stdin())))
    }

    /// Build an interpreter reading external input from `input`
    /// instead of stdin.
    pub fn with_input(input: Box<dyn BufRead>) -> Self {
        Self {
            variables: HashMap::new(),
            lists: HashMap::new(),
            functions: HashMap::new(),
            classes: HashMap::new(),
            input,
            output: Vec::new(),
            trace: false,
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Captured output lines (regular prints and error reports).
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    /// Split source into statements and run them as the top-level
    /// block. Returns the value of an explicit top-level `return`.
    pub fn run_source(&mut self, source: &str) -> Option<Value> {
        let statements = parser::split_source(source);
        self.run_block(&statements, None)
    }

    /// Execute a block of statements. `overlay`, when present, is
    /// merged into the shared environment for the duration of the
    /// block and the prior full mapping is restored afterwards.
    pub fn run_block(
        &mut self,
        statements: &[Statement],
        overlay: Option<HashMap<String, Value>>,
    ) -> Option<Value> {
        let saved = overlay.as_ref().map(|_| self.variables.clone());
        if let Some(bindings) = overlay {
            self.variables.extend(bindings);
        }

        let mut result = None;
        let mut i = 0;
        while i < statements.len() {
            let stmt = &statements[i];
            if self.trace {
                eprintln!("[trace] line {}: {}", stmt.line, stmt.text);
            }
            match self.exec(statements, i) {
                Ok(Flow::Next) => i += 1,
                Ok(Flow::Jump(next)) => i = next,
                Ok(Flow::Return(value)) => {
                    result = Some(value);
                    break;
                }
                Err(err) => {
                    self.report(stmt, &err);
                    i += 1;
                }
            }
        }

        if let Some(saved) = saved {
            self.variables = saved;
        }
        result
    }

    fn exec(&mut self, statements: &[Statement], i: usize) -> Result<Flow, RuntimeError> {
        let stmt = &statements[i];
        let parsed = parser::dispatch(&stmt.text);
        let args = &parsed.args;

        match parsed.command {
            Command::Read(mode) => {
                let name = first_arg(args, "read needs a variable name")?.to_string();
                self.read_into(stmt, &name, mode)?;
                Ok(Flow::Next)
            }

            Command::Print => {
                let line = args
                    .iter()
                    .map(|raw| self.resolve_or_literal(raw).to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.emit(line);
                Ok(Flow::Next)
            }

            Command::NumVar => {
                let name = first_arg(args, "numvar needs a variable name")?.to_string();
                let value = if args.len() >= 2 && args[1] == "=" {
                    let rhs = rhs_of(&stmt.text);
                    self.eval_or_false(stmt, rhs)
                } else {
                    Value::Int(0)
                };
                self.variables.insert(name, value);
                Ok(Flow::Next)
            }

            Command::Compute => {
                let name = first_arg(args, "compute needs a variable name")?.to_string();
                if !stmt.text.contains('=') {
                    return Err(RuntimeError::Malformed(
                        "compute needs 'name = expression'".into(),
                    ));
                }
                let value = self.eval_or_false(stmt, rhs_of(&stmt.text));
                self.variables.insert(name, value);
                Ok(Flow::Next)
            }

            Command::FileRead => {
                let name = first_arg(args, "read_file needs a variable name")?.to_string();
                let path = unquote(args.get(1).ok_or_else(|| {
                    RuntimeError::Malformed("read_file needs a path".into())
                })?);
                let content = fs::read_to_string(&path).map_err(|err| {
                    RuntimeError::Resource(format!("file read failed for '{}': {}", path, err))
                })?;
                self.variables.insert(name, Value::Str(content));
                Ok(Flow::Next)
            }

            Command::FileWrite => {
                let name = first_arg(args, "write_file needs a variable name")?;
                let path = unquote(args.get(1).ok_or_else(|| {
                    RuntimeError::Malformed("write_file needs a path".into())
                })?);
                let text = self
                    .variables
                    .get(name)
                    .map(Value::to_string)
                    .unwrap_or_default();
                fs::write(&path, text).map_err(|err| {
                    RuntimeError::Resource(format!("file write failed for '{}': {}", path, err))
                })?;
                Ok(Flow::Next)
            }

            Command::If => {
                let condition = stmt.text.strip_prefix("if").unwrap_or("").trim();
                if self.eval_or_false(stmt, condition).is_truthy() {
                    // True branch falls through; the paired `else` is a
                    // no-op marker when reached by normal execution.
                    Ok(Flow::Next)
                } else {
                    Ok(Flow::Jump(skip_to_else(statements, i)))
                }
            }

            Command::Else => Ok(Flow::Next),

            Command::Repeat => {
                let token = first_arg(args, "repeat needs a count")?;
                let count = self.resolve_or_literal(token).as_int().ok_or_else(|| {
                    RuntimeError::Resource(format!("repeat count '{}' is not a number", token))
                })?;
                let (body, resume) = parser::extract_block(statements, i + 1);
                // Bindings persist across iterations: the environment
                // is shared, not reset per pass.
                for _ in 0..count.max(0) {
                    self.run_block(&body, None);
                }
                Ok(Flow::Jump(resume))
            }

            Command::ForEach => {
                let name = first_arg(args, "foreach needs a list name")?.to_string();
                let (body, resume) = parser::extract_block(statements, i + 1);
                match self.lists.get(&name).cloned() {
                    Some(items) => {
                        for item in items {
                            let mut overlay = HashMap::new();
                            overlay.insert(LOOP_ITEM.to_string(), item);
                            self.run_block(&body, Some(overlay));
                        }
                    }
                    None => {
                        self.report(
                            stmt,
                            &RuntimeError::Resource(format!("list not found: {}", name)),
                        );
                    }
                }
                Ok(Flow::Jump(resume))
            }

            Command::StrVar => {
                let name = first_arg(args, "strvar needs a variable name")?.to_string();
                let literal = first_quoted(&stmt.text).unwrap_or_default();
                self.variables.insert(name, Value::Str(literal));
                Ok(Flow::Next)
            }

            Command::BoolVar => {
                let name = first_arg(args, "boolvar needs a variable name")?.to_string();
                let value = args
                    .last()
                    .map(|raw| self.resolve_arg(raw))
                    .unwrap_or(Value::Absent);
                self.variables.insert(name, Value::Bool(value.is_truthy()));
                Ok(Flow::Next)
            }

            Command::ListDecl => {
                let name = first_arg(args, "list needs a name")?.to_string();
                self.lists.insert(name, Vec::new());
                Ok(Flow::Next)
            }

            Command::ListAppend => {
                let name = first_arg(args, "append needs a list name")?.to_string();
                let value = args
                    .get(1)
                    .map(|raw| self.resolve_or_literal(raw))
                    .ok_or_else(|| RuntimeError::Malformed("append needs a value".into()))?;
                let items = self
                    .lists
                    .get_mut(&name)
                    .ok_or_else(|| RuntimeError::Resource(format!("list not found: {}", name)))?;
                items.push(value);
                Ok(Flow::Next)
            }

            Command::ListLength => {
                let name = first_arg(args, "length needs a list name")?;
                let len = self.lists.get(name).map_or(0, Vec::len);
                self.emit(len.to_string());
                Ok(Flow::Next)
            }

            Command::ListGet => {
                let name = first_arg(args, "get needs a list name")?.to_string();
                let token = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Malformed("get needs an index".into()))?;
                let index = self.resolve_or_literal(token).as_int().ok_or_else(|| {
                    RuntimeError::Malformed(format!("index '{}' is not an integer", token))
                })?;
                let items = self
                    .lists
                    .get(&name)
                    .ok_or_else(|| RuntimeError::Resource(format!("list not found: {}", name)))?;
                // Negative indexes count from the end.
                let actual = if index < 0 {
                    index + items.len() as i64
                } else {
                    index
                };
                let element = usize::try_from(actual)
                    .ok()
                    .and_then(|idx| items.get(idx))
                    .ok_or_else(|| {
                        RuntimeError::Resource(format!(
                            "index {} out of range for list '{}'",
                            index, name
                        ))
                    })?;
                let line = element.to_string();
                self.emit(line);
                Ok(Flow::Next)
            }

            Command::FuncDef => {
                let (def, resume) = parse_function(statements, i)?;
                self.functions.insert(def.name.clone(), def);
                Ok(Flow::Jump(resume))
            }

            Command::Return => {
                let value = args
                    .first()
                    .map(|raw| self.resolve_or_literal(raw))
                    .unwrap_or(Value::Absent);
                self.variables
                    .insert(RETURN_SLOT.to_string(), value.clone());
                Ok(Flow::Return(value))
            }

            Command::ClassDef => {
                let resume = self.define_class(statements, i, args)?;
                Ok(Flow::Jump(resume))
            }

            Command::MethodCall { target, method } => {
                // Module members shadow instance methods: `time.sleep(0)`
                // is a host call, not a lookup on a `time` variable.
                let dotted = format!("{}.{}", target, method);
                if let Some(member) = modules::lookup(&dotted) {
                    self.call_module(member, args)?;
                } else {
                    self.call_method(&target, &method, args)?;
                }
                Ok(Flow::Next)
            }

            Command::Bare(name) => self.exec_bare(&name, args),
        }
    }

    /// Commands without a fixed keyword: module members, user
    /// functions, class instantiation, or nothing at all.
    fn exec_bare(&mut self, name: &str, args: &[String]) -> Result<Flow, RuntimeError> {
        if let Some(member) = modules::bare(name) {
            self.call_module(member, args)?;
            return Ok(Flow::Next);
        }

        if let Some(func) = self.functions.get(name).cloned() {
            let resolved = self.resolve_args(args);
            let overlay: HashMap<String, Value> =
                func.params.iter().cloned().zip(resolved).collect();
            let ret = self.run_block(&func.body, Some(overlay));
            self.variables
                .insert(RETURN_SLOT.to_string(), ret.unwrap_or(Value::Absent));
            return Ok(Flow::Next);
        }

        if let Some(class) = self.classes.get(name).cloned() {
            let target = first_arg(args, "instantiation needs a target variable")?.to_string();
            let instance = Instance {
                class_name: class.name.clone(),
                attrs: class.attributes.clone(),
            };
            self.variables.insert(target, Value::Instance(instance));
            return Ok(Flow::Next);
        }

        Err(RuntimeError::UnknownCommand(name.to_string()))
    }

    fn call_module(&mut self, member: Member, args: &[String]) -> Result<(), RuntimeError> {
        match member {
            Member::Sleep => {
                let token = first_arg(args, "sleep needs a seconds argument")?;
                let seconds = self.resolve_or_literal(token).as_number().ok_or_else(|| {
                    RuntimeError::Resource(format!("sleep argument '{}' is not numeric", token))
                })?;
                modules::sleep(seconds);
            }
            Member::Constant(x) => {
                self.emit(Value::Float(x).to_string());
            }
            Member::Math(f) => {
                let target = first_arg(args, "math call needs a target variable")?.to_string();
                let source = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Malformed("math call needs an operand".into()))?;
                let x = self.resolve_or_literal(source).as_number().ok_or_else(|| {
                    RuntimeError::Resource(format!("math operand '{}' is not numeric", source))
                })?;
                self.variables.insert(target, Value::Float(f.apply(x)));
            }
        }
        Ok(())
    }

    fn call_method(
        &mut self,
        target: &str,
        method: &str,
        args: &[String],
    ) -> Result<(), RuntimeError> {
        let not_found = || RuntimeError::MethodNotFound {
            target: target.to_string(),
            method: method.to_string(),
        };
        let instance = match self.variables.get(target) {
            Some(Value::Instance(inst)) => inst.clone(),
            _ => return Err(not_found()),
        };
        let def = self
            .classes
            .get(&instance.class_name)
            .and_then(|class| class.methods.get(method))
            .cloned()
            .ok_or_else(not_found)?;

        // The method sees the instance's attributes as variables, plus
        // its positional parameters; overlay-and-restore applies as
        // for any call.
        let mut overlay = instance.attrs;
        for (param, value) in def.params.iter().zip(self.resolve_args(args)) {
            overlay.insert(param.clone(), value);
        }
        let ret = self.run_block(&def.body, Some(overlay));
        self.variables
            .insert(RETURN_SLOT.to_string(), ret.unwrap_or(Value::Absent));
        Ok(())
    }

    fn define_class(
        &mut self,
        statements: &[Statement],
        i: usize,
        args: &[String],
    ) -> Result<usize, RuntimeError> {
        let name = first_arg(args, "class needs a name")?
            .trim_end_matches('{')
            .trim()
            .to_string();
        if name.is_empty() {
            return Err(RuntimeError::Malformed("class needs a name".into()));
        }

        let (body, resume) = parser::extract_block(statements, i + 1);
        let mut attributes = HashMap::new();
        let mut methods = HashMap::new();
        let mut j = 0;
        while j < body.len() {
            let inner = &body[j];
            if matches!(parser::dispatch(&inner.text).command, Command::FuncDef) {
                match parse_function(&body, j) {
                    Ok((def, next)) => {
                        methods.insert(def.name.clone(), def);
                        j = next;
                    }
                    Err(err) => {
                        self.report(inner, &err);
                        j += 1;
                    }
                }
            } else if let Some((attr, rhs)) = inner.text.split_once('=') {
                attributes.insert(attr.trim().to_string(), self.resolve_arg(rhs.trim()));
                j += 1;
            } else {
                self.report(
                    inner,
                    &RuntimeError::Malformed(format!(
                        "'{}' is neither an attribute default nor a method",
                        inner.text
                    )),
                );
                j += 1;
            }
        }

        self.classes.insert(
            name.clone(),
            ClassDef {
                name,
                attributes,
                methods,
            },
        );
        Ok(resume)
    }

    fn read_into(
        &mut self,
        stmt: &Statement,
        name: &str,
        mode: ReadMode,
    ) -> Result<(), RuntimeError> {
        let prompt = match mode {
            ReadMode::Text => format!("{}: ", name),
            ReadMode::Int => format!("{} (int): ", name),
            ReadMode::Float => format!("{} (float): ", name),
        };
        print!("{}", prompt);
        let _ = io::stdout().flush();

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let raw = line.trim_end_matches(['\n', '\r']).to_string();

        let value = match mode {
            ReadMode::Text => Value::Str(raw),
            ReadMode::Int => match raw.trim().parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => {
                    self.report(
                        stmt,
                        &RuntimeError::InputCoercion {
                            expected: "int",
                            raw: raw.clone(),
                        },
                    );
                    Value::Str(raw)
                }
            },
            ReadMode::Float => match raw.trim().parse::<f64>() {
                Ok(x) => Value::Float(x),
                Err(_) => {
                    self.report(
                        stmt,
                        &RuntimeError::InputCoercion {
                            expected: "float",
                            raw: raw.clone(),
                        },
                    );
                    Value::Str(raw)
                }
            },
        };
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolve one raw argument token to a value: quoted string, float
    /// or integer literal, boolean keyword, `module.member`, then a
    /// variable lookup; unknown names yield `Absent`.
    pub fn resolve_arg(&self, raw: &str) -> Value {
        let piece = raw.trim();
        if piece.len() >= 2 && piece.starts_with('"') && piece.ends_with('"') {
            return Value::Str(piece[1..piece.len() - 1].to_string());
        }
        if is_float_literal(piece) {
            if let Ok(x) = piece.parse::<f64>() {
                return Value::Float(x);
            }
        }
        if is_int_literal(piece) {
            if let Ok(n) = piece.parse::<i64>() {
                return Value::Int(n);
            }
        }
        if piece.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if piece.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if piece.contains('.') {
            return match modules::lookup(piece) {
                Some(Member::Constant(x)) => Value::Float(x),
                Some(_) => Value::FunctionRef(piece.to_string()),
                None => Value::Absent,
            };
        }
        self.variables.get(piece).cloned().unwrap_or(Value::Absent)
    }

    pub fn resolve_args(&self, tokens: &[String]) -> Vec<Value> {
        tokens.iter().map(|raw| self.resolve_arg(raw)).collect()
    }

    /// Like [`resolve_arg`], but an unresolvable token falls back to
    /// its own literal text.
    fn resolve_or_literal(&self, raw: &str) -> Value {
        match self.resolve_arg(raw) {
            Value::Absent => Value::Str(raw.trim().to_string()),
            value => value,
        }
    }

    /// Evaluate expression text; any failure is reported and yields
    /// `Bool(false)`, never an error to the caller.
    fn eval_or_false(&mut self, stmt: &Statement, text: &str) -> Value {
        let outcome = {
            let vars = &self.variables;
            expr::evaluate(text, &|name| {
                vars.get(name)
                    .cloned()
                    .or_else(|| modules::constant(name))
            })
        };
        match outcome {
            Ok(value) => value,
            Err(cause) => {
                self.report(
                    stmt,
                    &RuntimeError::Expression {
                        expr: text.to_string(),
                        cause,
                    },
                );
                Value::Bool(false)
            }
        }
    }

    fn emit(&mut self, line: String) {
        println!("{}", line);
        self.output.push(line);
    }

    fn report(&mut self, stmt: &Statement, err: &RuntimeError) {
        let line = format!("[error] line {}: {} -> {}", stmt.line, stmt.text, err);
        eprintln!("{}", line);
        self.output.push(line);
    }
}

/// Forward scan for the `else` paired with a false condition at `i`.
/// Nested conditionals are tracked by depth so an inner `else` cannot
/// match the outer `if`. Returns the index just past the matching
/// `else`, or the block end if there is none.
fn skip_to_else(statements: &[Statement], i: usize) -> usize {
    let mut depth = 0usize;
    let mut j = i + 1;
    while j < statements.len() {
        match parser::dispatch(&statements[j].text).command {
            Command::If => depth += 1,
            Command::Else => {
                if depth == 0 {
                    return j + 1;
                }
                depth -= 1;
            }
            _ => {}
        }
        j += 1;
    }
    statements.len()
}

/// Parse a `func name(a, b) {` header at `i` and extract its body.
fn parse_function(
    statements: &[Statement],
    i: usize,
) -> Result<(FunctionDef, usize), RuntimeError> {
    let header = &statements[i].text;
    let open = header
        .find('(')
        .ok_or_else(|| RuntimeError::Malformed("func needs a parameter list".into()))?;
    let close = header
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| RuntimeError::Malformed("func needs a parameter list".into()))?;
    let name = header[..open]
        .trim_start_matches("func")
        .trim()
        .to_string();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(RuntimeError::Malformed("func needs a name".into()));
    }
    let params: Vec<String> = header[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    let (body, resume) = parser::extract_block(statements, i + 1);
    Ok((FunctionDef { name, params, body }, resume))
}

fn first_arg<'a>(args: &'a [String], missing: &str) -> Result<&'a str, RuntimeError> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| RuntimeError::Malformed(missing.to_string()))
}

/// Everything after the first `=`, trimmed; assignment commands read
/// their right-hand side from the statement text rather than the
/// token split.
fn rhs_of(text: &str) -> &str {
    text.split_once('=').map_or("", |(_, rhs)| rhs.trim())
}

fn first_quoted(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let len = rest.find('"')?;
    Some(rest[..len].to_string())
}

fn unquote(raw: &str) -> String {
    let piece = raw.trim();
    if piece.len() >= 2 && piece.starts_with('"') && piece.ends_with('"') {
        piece[1..piece.len() - 1].to_string()
    } else {
        piece.to_string()
    }
}

fn is_float_literal(piece: &str) -> bool {
    let digits = piece.strip_prefix('-').unwrap_or(piece);
    match digits.split_once('.') {
        Some((whole, frac)) => {
            !whole.is_empty()
                && !frac.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn is_int_literal(piece: &str) -> bool {
    let digits = piece.strip_prefix('-').unwrap_or(piece);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(source: &str) -> Interpreter {
        run_with_input(source, "")
    }

    fn run_with_input(source: &str, input: &str) -> Interpreter {
        let mut interp = Interpreter::with_input(Box::new(Cursor::new(input.to_string())));
        interp.run_source(source);
        interp
    }

    fn error_count(interp: &Interpreter) -> usize {
        interp
            .output()
            .iter()
            .filter(|line| line.starts_with("[error]"))
            .count()
    }

    #[test]
    fn test_assignment_respects_precedence() {
        let interp = run("numvar x = 2 + 3 * 4\nprint x");
        assert_eq!(interp.output(), ["14"]);
        assert_eq!(interp.variable("x"), Some(&Value::Int(14)));
    }

    #[test]
    fn test_bare_numvar_binds_zero() {
        let interp = run("numvar x\nprint x");
        assert_eq!(interp.output(), ["0"]);
    }

    #[test]
    fn test_counted_loop_bindings_persist() {
        let source = "numvar total = 0\n\
                      list totals\n\
                      repeat 3 {\n\
                      compute total = total + 1\n\
                      append totals total\n\
                      }\n\
                      length totals\n\
                      get totals 2";
        let interp = run(source);
        assert_eq!(interp.output(), ["3", "3"]);
        assert_eq!(interp.variable("total"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_list_get_out_of_range_is_recoverable() {
        let source = "list xs\n\
                      append xs 10\n\
                      get xs 5\n\
                      print after";
        let interp = run(source);
        assert_eq!(error_count(&interp), 1);
        assert_eq!(interp.output().last().map(String::as_str), Some("after"));
    }

    #[test]
    fn test_list_get_reads_second_element() {
        let source = "list xs\nappend xs 10\nappend xs 20\nappend xs 30\nget xs 1";
        let interp = run(source);
        assert_eq!(interp.output(), ["20"]);
    }

    #[test]
    fn test_function_call_sets_return_slot() {
        let source = "func add(a, b) {\n\
                      compute s = a + b\n\
                      return s\n\
                      }\n\
                      add(3, 4)\n\
                      print _ret";
        let interp = run(source);
        assert_eq!(interp.output(), ["7"]);
        assert_eq!(interp.variable("_ret"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_call_overlay_is_restored() {
        // Dynamic flat scoping: the prior full mapping comes back
        // after the call, so in-call writes do not leak out.
        let source = "numvar x = 1\n\
                      func shadow(x) {\n\
                      compute x = x + 100\n\
                      numvar leaked = 9\n\
                      return x\n\
                      }\n\
                      shadow(5)\n\
                      print x";
        let interp = run(source);
        assert_eq!(interp.output(), ["1"]);
        assert_eq!(interp.variable("leaked"), None);
        assert_eq!(interp.variable("_ret"), Some(&Value::Int(105)));
    }

    #[test]
    fn test_print_unbound_falls_back_to_token() {
        let interp = run("print hello");
        assert_eq!(interp.output(), ["hello"]);
    }

    #[test]
    fn test_unrecognized_command_logs_once_and_continues() {
        let interp = run("frobnicate x\nprint ok");
        assert_eq!(error_count(&interp), 1);
        assert!(interp.output()[0].contains("unrecognized command 'frobnicate'"));
        assert_eq!(interp.output().last().map(String::as_str), Some("ok"));
    }

    #[test]
    fn test_false_condition_skips_to_else() {
        let source = "numvar x = 1\n\
                      if x greater 5\n\
                      print big\n\
                      else\n\
                      print small";
        let interp = run(source);
        assert_eq!(interp.output(), ["small"]);
    }

    #[test]
    fn test_true_condition_falls_through_past_else() {
        // Legacy semantics: `else` is a no-op marker, so after a true
        // condition the else branch executes as well.
        let source = "numvar x = 9\n\
                      if x greater 5\n\
                      print big\n\
                      else\n\
                      print small";
        let interp = run(source);
        assert_eq!(interp.output(), ["big", "small"]);
    }

    #[test]
    fn test_else_skip_tracks_nested_conditionals() {
        let source = "numvar x = 1\n\
                      if x greater 5\n\
                      if x greater 2\n\
                      print inner\n\
                      else\n\
                      print inner_else\n\
                      else\n\
                      print outer_else";
        let interp = run(source);
        assert_eq!(interp.output(), ["outer_else"]);
    }

    #[test]
    fn test_read_int_success() {
        let interp = run_with_input("read_int n\nprint n", "42\n");
        assert_eq!(interp.output(), ["42"]);
        assert_eq!(interp.variable("n"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_read_int_coercion_failure_keeps_raw_text() {
        let interp = run_with_input("read_int n", "forty-two\n");
        assert_eq!(error_count(&interp), 1);
        assert_eq!(interp.variable("n"), Some(&Value::Str("forty-two".into())));
    }

    #[test]
    fn test_strvar_extracts_quoted_literal() {
        let interp = run("strvar greeting \"hello there\"\nprint greeting");
        assert_eq!(interp.output(), ["hello there"]);
        let interp = run("strvar empty\nprint _");
        assert_eq!(interp.variable("empty"), Some(&Value::Str(String::new())));
    }

    #[test]
    fn test_boolvar_binds_truth_value() {
        let interp = run("boolvar yes true\nboolvar no false");
        assert_eq!(interp.variable("yes"), Some(&Value::Bool(true)));
        assert_eq!(interp.variable("no"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_foreach_binds_loop_item() {
        let source = "list xs\n\
                      append xs 1\n\
                      append xs 2\n\
                      foreach xs {\n\
                      print _item\n\
                      }";
        let interp = run(source);
        assert_eq!(interp.output(), ["1", "2"]);
    }

    #[test]
    fn test_foreach_missing_list_reports_and_skips_block() {
        let source = "foreach nope {\nprint never\n}\nprint after";
        let interp = run(source);
        assert_eq!(error_count(&interp), 1);
        assert_eq!(interp.output().last().map(String::as_str), Some("after"));
        assert!(!interp.output().iter().any(|l| l == "never"));
    }

    #[test]
    fn test_math_module_commands() {
        let interp = run("numvar x = 9\nsqrt r x\nprint r\npi");
        assert_eq!(interp.output()[0], "3");
        assert_eq!(interp.output()[1], std::f64::consts::PI.to_string());
    }

    #[test]
    fn test_dotted_module_statement_forms() {
        // `module.member(...)` in command position is a host call, not
        // a method lookup on a variable.
        let interp = run("time.sleep(0)\nmath.pi()\nmath.sqrt(r, 16)\nprint r");
        assert_eq!(error_count(&interp), 0);
        assert_eq!(interp.output()[0], std::f64::consts::PI.to_string());
        assert_eq!(interp.output()[1], "4");
    }

    #[test]
    fn test_list_get_negative_index_counts_from_end() {
        let source = "list xs\n\
                      append xs 10\n\
                      append xs 20\n\
                      append xs 30\n\
                      get xs -1\n\
                      get xs -4";
        let interp = run(source);
        assert_eq!(interp.output()[0], "30");
        assert_eq!(error_count(&interp), 1);
    }

    #[test]
    fn test_expression_failure_yields_false() {
        let source = "numvar x = what + 1\nprint x";
        let interp = run(source);
        assert_eq!(error_count(&interp), 1);
        assert_eq!(interp.variable("x"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_class_definition_and_method_call() {
        let source = "class Point {\n\
                      x = 3\n\
                      y = 4\n\
                      func norm() {\n\
                      compute sq = x * x + y * y\n\
                      sqrt n sq\n\
                      return n\n\
                      }\n\
                      }\n\
                      Point p\n\
                      p.norm()\n\
                      print _ret";
        let interp = run(source);
        assert_eq!(interp.output(), ["5"]);
        match interp.variable("p") {
            Some(Value::Instance(inst)) => {
                assert_eq!(inst.class_name, "Point");
                assert_eq!(inst.attrs.get("x"), Some(&Value::Int(3)));
            }
            other => panic!("expected instance, found {other:?}"),
        }
    }

    #[test]
    fn test_method_on_non_object_reports_dispatch_error() {
        let interp = run("numvar q = 1\nq.wiggle()\nprint after");
        assert_eq!(error_count(&interp), 1);
        assert_eq!(interp.output().last().map(String::as_str), Some("after"));
    }

    #[test]
    fn test_return_does_not_unwind_loop_iterations() {
        // A `return` inside a repeat body ends that iteration's block
        // run only; remaining iterations still execute.
        let source = "numvar total = 0\n\
                      repeat 3 {\n\
                      compute total = total + 1\n\
                      return total\n\
                      }\n\
                      print total";
        let interp = run(source);
        assert_eq!(interp.output(), ["3"]);
        assert_eq!(interp.variable("_ret"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_nested_blocks_resume_after_outermost_close() {
        let source = "numvar n = 0\n\
                      repeat 2 {\n\
                      if n less 100\n\
                      repeat 2 {\n\
                      compute n = n + 1\n\
                      }\n\
                      }\n\
                      print n";
        let interp = run(source);
        assert_eq!(interp.output(), ["4"]);
    }
}
