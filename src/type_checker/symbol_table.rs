//! Scoped symbol table.
//!
//! A stack of scopes, each with its own symbols, offsets, labels and
//! allocation records. Forward declarations move from forward to defined
//! here, and a scope cannot close while one of its forwards is unresolved.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::{
    ast::{
        ast::StmtRef,
        statements::{Formal, Header},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position, MK_ERROR,
};

/// How far `new` allocations are visible to `dispose` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationTracking {
    /// Only the scope that performed the allocation sees it.
    #[default]
    ScopeLocal,
    /// Allocations are visible along the whole scope chain, and a closing
    /// scope hands its records for outer names to the enclosing scope.
    Propagated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineInfo {
    pub is_function: bool,
    pub formals: Vec<Formal>,
    pub forward: bool,
    pub from_library: bool,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable { by_reference: bool },
    Routine(RoutineInfo),
    Label { bound: Option<StmtRef> },
}

impl SymbolKind {
    pub fn describe(&self) -> &str {
        match self {
            SymbolKind::Variable { .. } => "variable",
            SymbolKind::Routine(info) if info.is_function => "function",
            SymbolKind::Routine(_) => "procedure",
            SymbolKind::Label { .. } => "label",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Current static type. `dispose` rebinds it to `Type::Nil`.
    pub ty: Type,
    /// Type the symbol was declared with.
    pub declared: Type,
    pub offset: u32,
    pub allocated_via_new: bool,
}

impl Symbol {
    pub fn routine(&self) -> Option<&RoutineInfo> {
        match &self.kind {
            SymbolKind::Routine(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, SymbolKind::Label { .. })
    }
}

#[derive(Debug)]
pub struct Scope {
    symbols: Vec<Symbol>,
    lookup: HashMap<String, usize>,
    next_offset: u32,
    allocated: HashSet<String>,
    owner: Option<String>,
}

impl Scope {
    pub fn new(owner: Option<String>, offset: u32) -> Self {
        Scope {
            symbols: vec![],
            lookup: HashMap::new(),
            next_offset: offset,
            allocated: HashSet::new(),
            owner,
        }
    }

    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        ty: Type,
        current_position: Position,
    ) -> Result<&mut Symbol, Error> {
        if self.lookup.contains_key(name) {
            return Err(MK_ERROR!(
                ErrorImpl::DuplicateDeclaration,
                current_position,
                name: name.to_string()
            ));
        }

        let index = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            declared: ty.clone(),
            ty,
            offset: self.next_offset,
            allocated_via_new: false,
        });
        self.lookup.insert(name.to_string(), index);
        self.next_offset += 1;

        Ok(&mut self.symbols[index])
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.lookup.get(name).map(|index| &self.symbols[*index])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        match self.lookup.get(name) {
            Some(index) => Some(&mut self.symbols[*index]),
            None => None,
        }
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn next_offset(&self) -> u32 {
        self.next_offset
    }

    pub fn unresolved_forwards(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|symbol| matches!(symbol.routine(), Some(info) if info.forward))
            .map(|symbol| symbol.name.clone())
            .collect()
    }
}

/// Variable an allocation target such as `a[i]^` is rooted at.
fn root_name(target: &str) -> &str {
    target
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or(target)
}

/// Stack of lexical scopes, innermost last.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    allocation_tracking: AllocationTracking,
}

impl SymbolTable {
    pub fn new(allocation_tracking: AllocationTracking) -> Self {
        SymbolTable {
            scopes: vec![],
            allocation_tracking,
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pushes a scope owned by `owner` (a routine name, or `None` for the
    /// library and program scopes). Offsets continue from the enclosing scope.
    pub fn open_scope(&mut self, owner: Option<&str>) {
        let offset = self.scopes.last().map(Scope::next_offset).unwrap_or(0);
        trace!("opening scope {} for {:?} at offset {}", self.scopes.len(), owner, offset);
        self.scopes.push(Scope::new(owner.map(String::from), offset));
    }

    /// Pops the innermost scope. Every routine still forward declared in it
    /// is reported in one error.
    pub fn close_scope(&mut self, current_position: Position) -> Result<Scope, Error> {
        let scope = match self.scopes.pop() {
            Some(scope) => scope,
            None => {
                return Err(MK_ERROR!(
                    ErrorImpl::LoweringInvariant,
                    current_position,
                    detail: String::from("closing a scope that was never opened")
                ))
            }
        };
        trace!("closed scope {} ({} symbols)", self.scopes.len(), scope.symbols.len());

        if self.allocation_tracking == AllocationTracking::Propagated {
            if let Some(enclosing) = self.scopes.last_mut() {
                let outer = scope
                    .allocated
                    .iter()
                    .filter(|target| scope.get(root_name(target)).is_none())
                    .cloned();
                enclosing.allocated.extend(outer);
            }
        }

        let routines = scope.unresolved_forwards();
        if !routines.is_empty() {
            return Err(MK_ERROR!(
                ErrorImpl::UnresolvedForwardDeclaration,
                current_position,
                routines: routines
            ));
        }
        Ok(scope)
    }

    pub fn has_unresolved_forward(&self) -> bool {
        self.scopes
            .last()
            .map(|scope| !scope.unresolved_forwards().is_empty())
            .unwrap_or(false)
    }

    fn current(&mut self, current_position: &Position) -> Result<&mut Scope, Error> {
        match self.scopes.last_mut() {
            Some(scope) => Ok(scope),
            None => Err(MK_ERROR!(
                ErrorImpl::LoweringInvariant,
                current_position.clone(),
                detail: String::from("declaration outside of any scope")
            )),
        }
    }

    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        ty: Type,
        current_position: Position,
    ) -> Result<&mut Symbol, Error> {
        let scope = self.current(&current_position)?;
        scope.declare(name, kind, ty, current_position)
    }

    pub fn declare_variable(
        &mut self,
        name: &str,
        ty: Type,
        by_reference: bool,
        current_position: Position,
    ) -> Result<(), Error> {
        self.declare(
            name,
            SymbolKind::Variable { by_reference },
            ty,
            current_position,
        )?;
        Ok(())
    }

    fn declare_header(
        &mut self,
        header: &Header,
        forward: bool,
        from_library: bool,
        current_position: Position,
    ) -> Result<(), Error> {
        let info = RoutineInfo {
            is_function: header.is_function(),
            formals: header.formals.clone(),
            forward,
            from_library,
            signature: header.signature(),
        };
        self.declare(
            &header.name,
            SymbolKind::Routine(info),
            header.return_type(),
            current_position,
        )?;
        Ok(())
    }

    /// Declares a routine that is defined right away.
    pub fn declare_routine(&mut self, header: &Header, current_position: Position) -> Result<(), Error> {
        self.declare_header(header, false, false, current_position)
    }

    pub fn declare_library_routine(&mut self, header: &Header) -> Result<(), Error> {
        self.declare_header(header, false, true, header.span.start.clone())
    }

    pub fn declare_forward_routine(
        &mut self,
        header: &Header,
        current_position: Position,
    ) -> Result<(), Error> {
        debug!("forward declaring {}", header.signature());
        self.declare_header(header, true, false, current_position)
    }

    /// Moves a forward declared routine to the defined state.
    ///
    /// Returns `Ok(false)` when `header` names no routine of the current
    /// scope, so the caller declares it instead.
    pub fn resolve_forward(&mut self, header: &Header, current_position: Position) -> Result<bool, Error> {
        let scope = self.current(&current_position)?;
        let symbol = match scope.get_mut(&header.name) {
            Some(symbol) => symbol,
            None => return Ok(false),
        };

        match &mut symbol.kind {
            SymbolKind::Routine(info) if info.forward => {
                let defined = header.signature();
                if info.signature != defined {
                    return Err(MK_ERROR!(
                        ErrorImpl::ForwardSignatureMismatch,
                        current_position,
                        routine: header.name.clone(),
                        declared: info.signature.clone(),
                        defined: defined
                    ));
                }
                debug!("resolved forward declaration of {}", header.name);
                info.forward = false;
                Ok(true)
            }
            _ => Err(MK_ERROR!(
                ErrorImpl::DuplicateDeclaration,
                current_position,
                name: header.name.clone()
            )),
        }
    }

    /// Innermost symbol named `name`, with the index of the scope holding it.
    pub fn find_with_depth(&self, name: &str) -> Option<(usize, &Symbol)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.get(name).map(|symbol| (depth, symbol)))
    }

    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.find_with_depth(name).map(|(_, symbol)| symbol)
    }

    pub fn lookup(&self, name: &str, current_position: Position) -> Result<&Symbol, Error> {
        match self.find(name) {
            Some(symbol) => Ok(symbol),
            None => Err(MK_ERROR!(
                ErrorImpl::UnknownIdentifier,
                current_position,
                name: name.to_string()
            )),
        }
    }

    pub fn lookup_mut(&mut self, name: &str, current_position: Position) -> Result<&mut Symbol, Error> {
        match self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name)) {
            Some(symbol) => Ok(symbol),
            None => Err(MK_ERROR!(
                ErrorImpl::UnknownIdentifier,
                current_position,
                name: name.to_string()
            )),
        }
    }

    pub fn lookup_in_current(&self, name: &str) -> Option<&Symbol> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }

    /// Rebinds the current static type of `name`.
    pub fn rebind_type(&mut self, name: &str, ty: Type, current_position: Position) -> Result<(), Error> {
        let symbol = self.lookup_mut(name, current_position)?;
        trace!("rebinding {} from {} to {}", name, symbol.ty, ty);
        symbol.ty = ty;
        Ok(())
    }

    /// Records that `target` (an l-value rendered as text) was created by
    /// `new` in the current scope.
    pub fn mark_allocated(&mut self, target: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.allocated.insert(target.to_string());
        }
        if let Some(symbol) = self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(target)) {
            symbol.allocated_via_new = true;
        }
    }

    /// Forgets the allocation of `target` wherever it is visible.
    pub fn unmark_allocated(&mut self, target: &str) {
        match self.allocation_tracking {
            AllocationTracking::ScopeLocal => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.allocated.remove(target);
                }
            }
            AllocationTracking::Propagated => {
                for scope in self.scopes.iter_mut() {
                    scope.allocated.remove(target);
                }
            }
        }
    }

    pub fn is_allocated(&self, target: &str) -> bool {
        match self.allocation_tracking {
            AllocationTracking::ScopeLocal => self
                .scopes
                .last()
                .map(|scope| scope.allocated.contains(target))
                .unwrap_or(false),
            AllocationTracking::Propagated => self
                .scopes
                .iter()
                .any(|scope| scope.allocated.contains(target)),
        }
    }

    /// Name of the routine whose body is being analyzed, if any.
    pub fn enclosing_routine_name(&self) -> Option<&str> {
        self.scopes.last().and_then(Scope::owner)
    }

    /// Symbol of the enclosing routine, found outside its own body scope so
    /// that locals cannot shadow it.
    pub fn enclosing_routine(&self) -> Option<&Symbol> {
        let owner = self.enclosing_routine_name()?;
        let body = self.scopes.len().checked_sub(1)?;
        self.scopes[..body]
            .iter()
            .rev()
            .find_map(|scope| scope.get(owner))
    }

    pub fn declare_label(&mut self, name: &str, current_position: Position) -> Result<(), Error> {
        self.declare(
            name,
            SymbolKind::Label { bound: None },
            Type::LabelMarker,
            current_position,
        )?;
        Ok(())
    }

    /// Whether `name` is a label of the current scope.
    pub fn is_label(&self, name: &str) -> bool {
        self.lookup_in_current(name)
            .map(Symbol::is_label)
            .unwrap_or(false)
    }

    pub fn bind_label(&mut self, name: &str, stmt: StmtRef, current_position: Position) -> Result<(), Error> {
        let scope = self.current(&current_position)?;
        match scope.get_mut(name) {
            Some(Symbol {
                kind: SymbolKind::Label { bound },
                ..
            }) => {
                if bound.is_some() {
                    return Err(MK_ERROR!(
                        ErrorImpl::LabelAlreadyBound,
                        current_position,
                        label: name.to_string()
                    ));
                }
                *bound = Some(stmt);
                Ok(())
            }
            _ => Err(MK_ERROR!(
                ErrorImpl::UndeclaredLabel,
                current_position,
                label: name.to_string()
            )),
        }
    }

    pub fn label_is_bound(&self, name: &str) -> bool {
        matches!(
            self.lookup_in_current(name),
            Some(Symbol {
                kind: SymbolKind::Label { bound: Some(_) },
                ..
            })
        )
    }
}
