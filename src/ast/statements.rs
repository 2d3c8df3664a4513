use std::fmt::Display;

use crate::Span;

use super::{
    expressions::{CallExpr, Expr},
    types::Type,
};

/// Statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty(Span),
    /// `target := value`
    Assign(AssignStmt),
    /// `target ^:= value`: stores the value `value` points to into `target`.
    DerefAssign(AssignStmt),
    Block(BlockStmt),
    Call(CallStmt),
    If(IfStmt),
    While(WhileStmt),
    /// `label: stmt`
    Labeled(LabeledStmt),
    Goto(GotoStmt),
    Return(Span),
    /// `new p` or `new [n] p`
    New(NewStmt),
    /// `dispose p` or `dispose [] p`
    Dispose(DisposeStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallStmt {
    pub call: CallExpr,
    /// Filled in by the type checker: the callee's return type, or
    /// `Type::Procedure`.
    pub ty: Option<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub consequent: Box<Stmt>,
    pub alternate: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStmt {
    pub label: String,
    pub stmt: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GotoStmt {
    pub label: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStmt {
    pub target: Expr,
    /// Element count of the bracketed form.
    pub size: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisposeStmt {
    pub target: Expr,
    /// `dispose [] p`
    pub array_form: bool,
    pub span: Span,
}

impl Stmt {
    pub fn get_span(&self) -> &Span {
        match self {
            Stmt::Empty(span) | Stmt::Return(span) => span,
            Stmt::Assign(stmt) | Stmt::DerefAssign(stmt) => &stmt.span,
            Stmt::Block(stmt) => &stmt.span,
            Stmt::Call(stmt) => &stmt.span,
            Stmt::If(stmt) => &stmt.span,
            Stmt::While(stmt) => &stmt.span,
            Stmt::Labeled(stmt) => &stmt.span,
            Stmt::Goto(stmt) => &stmt.span,
            Stmt::New(stmt) => &stmt.span,
            Stmt::Dispose(stmt) => &stmt.span,
        }
    }
}

// CONSTRUCTORS

impl Stmt {
    pub fn empty() -> Self {
        Stmt::Empty(Span::null())
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign(AssignStmt {
            target,
            value,
            span: Span::null(),
        })
    }

    pub fn deref_assign(target: Expr, value: Expr) -> Self {
        Stmt::DerefAssign(AssignStmt {
            target,
            value,
            span: Span::null(),
        })
    }

    pub fn block(body: Vec<Stmt>) -> Self {
        Stmt::Block(BlockStmt {
            body,
            span: Span::null(),
        })
    }

    pub fn call(routine: &str, arguments: Vec<Expr>) -> Self {
        Stmt::Call(CallStmt {
            call: CallExpr {
                routine: routine.to_string(),
                arguments,
            },
            ty: None,
            span: Span::null(),
        })
    }

    pub fn if_then(condition: Expr, consequent: Stmt) -> Self {
        Stmt::If(IfStmt {
            condition,
            consequent: Box::new(consequent),
            alternate: None,
            span: Span::null(),
        })
    }

    pub fn if_else(condition: Expr, consequent: Stmt, alternate: Stmt) -> Self {
        Stmt::If(IfStmt {
            condition,
            consequent: Box::new(consequent),
            alternate: Some(Box::new(alternate)),
            span: Span::null(),
        })
    }

    pub fn while_do(condition: Expr, body: Stmt) -> Self {
        Stmt::While(WhileStmt {
            condition,
            body: Box::new(body),
            span: Span::null(),
        })
    }

    pub fn labeled(label: &str, stmt: Stmt) -> Self {
        Stmt::Labeled(LabeledStmt {
            label: label.to_string(),
            stmt: Box::new(stmt),
            span: Span::null(),
        })
    }

    pub fn goto(label: &str) -> Self {
        Stmt::Goto(GotoStmt {
            label: label.to_string(),
            span: Span::null(),
        })
    }

    pub fn ret() -> Self {
        Stmt::Return(Span::null())
    }

    pub fn new_single(target: Expr) -> Self {
        Stmt::New(NewStmt {
            target,
            size: None,
            span: Span::null(),
        })
    }

    pub fn new_array(size: Expr, target: Expr) -> Self {
        Stmt::New(NewStmt {
            target,
            size: Some(size),
            span: Span::null(),
        })
    }

    pub fn dispose(target: Expr) -> Self {
        Stmt::Dispose(DisposeStmt {
            target,
            array_form: false,
            span: Span::null(),
        })
    }

    pub fn dispose_array(target: Expr) -> Self {
        Stmt::Dispose(DisposeStmt {
            target,
            array_form: true,
            span: Span::null(),
        })
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stmt::Empty(_) => Ok(()),
            Stmt::Assign(stmt) => write!(f, "{} := {}", stmt.target, stmt.value),
            Stmt::DerefAssign(stmt) => write!(f, "{} ^:= {}", stmt.target, stmt.value),
            Stmt::Block(_) => write!(f, "begin ... end"),
            Stmt::Call(stmt) => {
                let arguments = stmt
                    .call
                    .arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<String>>();
                write!(f, "{}({})", stmt.call.routine, arguments.join(", "))
            }
            Stmt::If(stmt) => write!(f, "if {} then ...", stmt.condition),
            Stmt::While(stmt) => write!(f, "while {} do ...", stmt.condition),
            Stmt::Labeled(stmt) => write!(f, "{}: {}", stmt.label, stmt.stmt),
            Stmt::Goto(stmt) => write!(f, "goto {}", stmt.label),
            Stmt::Return(_) => write!(f, "return"),
            Stmt::New(stmt) => match &stmt.size {
                Some(size) => write!(f, "new [{}] {}", size, stmt.target),
                None => write!(f, "new {}", stmt.target),
            },
            Stmt::Dispose(stmt) => match stmt.array_form {
                true => write!(f, "dispose [] {}", stmt.target),
                false => write!(f, "dispose {}", stmt.target),
            },
        }
    }
}

// DECLARATIONS

/// `var a, b: integer;`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmt {
    pub names: Vec<String>,
    pub ty: Type,
    pub span: Span,
}

/// `label l1, l2;`
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDeclStmt {
    pub names: Vec<String>,
    pub span: Span,
}

/// One formal group: `var a, b: integer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formal {
    pub names: Vec<String>,
    pub by_reference: bool,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutineKind {
    Procedure,
    Function(Type),
}

/// Routine signature, shared by forward declarations and definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub kind: RoutineKind,
    pub name: String,
    pub formals: Vec<Formal>,
    pub span: Span,
}

impl Header {
    pub fn procedure(name: &str, formals: Vec<Formal>) -> Self {
        Header {
            kind: RoutineKind::Procedure,
            name: name.to_string(),
            formals,
            span: Span::null(),
        }
    }

    pub fn function(name: &str, formals: Vec<Formal>, return_type: Type) -> Self {
        Header {
            kind: RoutineKind::Function(return_type),
            name: name.to_string(),
            formals,
            span: Span::null(),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, RoutineKind::Function(_))
    }

    /// The symbol type of the routine: its return type, or `Type::Procedure`.
    pub fn return_type(&self) -> Type {
        match &self.kind {
            RoutineKind::Procedure => Type::Procedure,
            RoutineKind::Function(ty) => ty.clone(),
        }
    }

    pub fn arity(&self) -> usize {
        self.formals.iter().map(|formal| formal.names.len()).sum()
    }

    /// Signature text compared when a forward declaration is resolved.
    pub fn signature(&self) -> String {
        let formals = self
            .formals
            .iter()
            .map(|formal| formal.to_string())
            .collect::<Vec<String>>()
            .join("; ");
        match &self.kind {
            RoutineKind::Procedure => format!("procedure {}({})", self.name, formals),
            RoutineKind::Function(ty) => format!("function {}({}): {}", self.name, formals, ty),
        }
    }
}

impl Formal {
    pub fn by_value(names: &[&str], ty: Type) -> Self {
        Formal {
            names: names.iter().map(|name| name.to_string()).collect(),
            by_reference: false,
            ty,
            span: Span::null(),
        }
    }

    pub fn by_reference(names: &[&str], ty: Type) -> Self {
        Formal {
            names: names.iter().map(|name| name.to_string()).collect(),
            by_reference: true,
            ty,
            span: Span::null(),
        }
    }
}

impl Display for Formal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.by_reference {
            write!(f, "var ")?;
        }
        write!(f, "{}: {}", self.names.join(", "), self.ty)
    }
}

/// A routine definition with its body.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDeclStmt {
    pub header: Header,
    pub body: super::ast::Body,
    pub span: Span,
}

impl VarDeclStmt {
    pub fn new(names: &[&str], ty: Type) -> Self {
        VarDeclStmt {
            names: names.iter().map(|name| name.to_string()).collect(),
            ty,
            span: Span::null(),
        }
    }
}

impl LabelDeclStmt {
    pub fn new(names: &[&str]) -> Self {
        LabelDeclStmt {
            names: names.iter().map(|name| name.to_string()).collect(),
            span: Span::null(),
        }
    }
}
