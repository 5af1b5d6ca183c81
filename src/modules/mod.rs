//! Host module bindings.
//!
//! Scripts reach the host through a fixed, read-only table of
//! `module.member` names: a timing module with a blocking sleep and a
//! math module with the constant pi plus the unary sqrt/sin/cos/tan
//! functions. Members are also dispatchable by their bare name as
//! statement commands (`sleep 2`, `sqrt r x`, `pi`).

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::interpreter::Value;

/// Unary math host functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Sqrt,
    Sin,
    Cos,
    Tan,
}

impl MathFn {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            MathFn::Sqrt => x.sqrt(),
            MathFn::Sin => x.sin(),
            MathFn::Cos => x.cos(),
            MathFn::Tan => x.tan(),
        }
    }
}

/// One entry of the module table: a constant or a host callable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Member {
    Constant(f64),
    Math(MathFn),
    Sleep,
}

static MODULES: Lazy<HashMap<&'static str, Member>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("time.sleep", Member::Sleep);
    table.insert("math.pi", Member::Constant(std::f64::consts::PI));
    table.insert("math.sqrt", Member::Math(MathFn::Sqrt));
    table.insert("math.sin", Member::Math(MathFn::Sin));
    table.insert("math.cos", Member::Math(MathFn::Cos));
    table.insert("math.tan", Member::Math(MathFn::Tan));
    table
});

/// Look up a dotted `module.member` name.
pub fn lookup(dotted: &str) -> Option<Member> {
    MODULES.get(dotted).copied()
}

/// Look up a member by its bare name, as used in command position.
pub fn bare(name: &str) -> Option<Member> {
    MODULES.iter().find_map(|(key, member)| {
        match key.split_once('.') {
            Some((_, member_name)) if member_name == name => Some(*member),
            _ => None,
        }
    })
}

/// Resolve a dotted name to a substitutable constant value, if it
/// names one. Callables do not substitute into expressions.
pub fn constant(dotted: &str) -> Option<Value> {
    match lookup(dotted)? {
        Member::Constant(x) => Some(Value::Float(x)),
        Member::Math(_) | Member::Sleep => None,
    }
}

/// Blocking sleep-by-seconds host call.
pub fn sleep(seconds: f64) {
    if seconds > 0.0 {
        thread::sleep(Duration::from_secs_f64(seconds));
    }
}
