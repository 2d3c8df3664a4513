use crate::Span;

use super::statements::{BlockStmt, Header, LabelDeclStmt, RoutineDeclStmt, Stmt, VarDeclStmt};

/// Root of a parsed compilation unit: `program name; body.`
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub body: Body,
    pub span: Span,
}

/// Local declarations followed by the statement block they scope over.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub locals: Vec<Local>,
    pub block: BlockStmt,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Local {
    Variables(VarDeclStmt),
    Labels(LabelDeclStmt),
    Routine(RoutineDeclStmt),
    /// `forward` header without a body.
    Forward(Header),
}

/// Identifies the statement a label is attached to by its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtRef(pub Span);

impl Program {
    pub fn new(name: &str, locals: Vec<Local>, body: Vec<Stmt>) -> Self {
        Program {
            name: name.to_string(),
            body: Body::new(locals, body),
            span: Span::null(),
        }
    }
}

impl Body {
    pub fn new(locals: Vec<Local>, body: Vec<Stmt>) -> Self {
        Body {
            locals,
            block: BlockStmt {
                body,
                span: Span::null(),
            },
            span: Span::null(),
        }
    }
}

impl Local {
    pub fn variables(names: &[&str], ty: super::types::Type) -> Self {
        Local::Variables(VarDeclStmt::new(names, ty))
    }

    pub fn labels(names: &[&str]) -> Self {
        Local::Labels(LabelDeclStmt::new(names))
    }

    pub fn routine(header: Header, locals: Vec<Local>, body: Vec<Stmt>) -> Self {
        Local::Routine(RoutineDeclStmt {
            header,
            body: Body::new(locals, body),
            span: Span::null(),
        })
    }

    pub fn forward(header: Header) -> Self {
        Local::Forward(header)
    }

    pub fn as_variables(&self) -> Option<&VarDeclStmt> {
        match self {
            Local::Variables(var_decl_stmt) => Some(var_decl_stmt),
            _ => None,
        }
    }
}
