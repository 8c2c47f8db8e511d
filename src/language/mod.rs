pub mod compiler;
pub mod decls;
pub mod parser;
pub mod span;
pub mod typecheck;
pub mod types;
