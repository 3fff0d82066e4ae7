pub(crate) mod lexer;
pub mod parser;
