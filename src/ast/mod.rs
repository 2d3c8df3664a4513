/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the AST structure
///
/// Submodules:
/// - ast: Program, bodies and local declarations
/// - expressions: Definitions for the expression variants
/// - statements: Definitions for statement and routine declaration variants
/// - types: The type system and its compatibility relation
pub mod ast;
pub mod expressions;
pub mod statements;
pub mod types;

#[cfg(test)]
mod tests;
