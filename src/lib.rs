pub mod expr;
pub mod interpreter;
pub mod modules;
pub mod parser;
