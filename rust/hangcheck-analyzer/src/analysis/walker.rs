//! Branch-sensitive completion walker.
//!
//! Decides whether every path through a scope invokes one of a set of
//! completion handles. Only `if`/`else` has branch semantics: a completion
//! found anywhere inside a loop, `switch` or `try` counts for the enclosing
//! scope. Passing a handle to another call, or a nested function that would
//! complete if invoked, both count as completion.
//!
//! Each analysis is a fold over [`BranchRecord`] values. Nested scopes and
//! branch arms are analyzed by fresh recursive calls and only their boolean
//! verdicts flow back, so sibling analyses never share state.

use crate::analysis::ast::{CallExpr, Expr, Function};
use crate::analysis::bindings::BindingTable;
use crate::analysis::handles::HandleSet;
use crate::analysis::visit::{Node, Shape};
use thiserror::Error;

pub const DEFAULT_MAX_DEPTH: usize = 512;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisFault {
    #[error("analysis exceeded depth limit {limit} at line {line}, col {col}")]
    DepthExceeded { limit: usize, line: usize, col: usize },
    #[error("analysis panicked: {0}")]
    Panicked(String),
}

/// Branch state of one scope analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchRecord {
    /// The straight-line path already completes
    pub was_completed: bool,
    pub has_branches: bool,
    /// Every branch point seen so far completes on all arms
    pub all_branches_completed: bool,
}

impl Default for BranchRecord {
    fn default() -> Self {
        Self { was_completed: false, has_branches: false, all_branches_completed: true }
    }
}

impl BranchRecord {
    pub fn completed(self) -> Self {
        Self { was_completed: true, ..self }
    }

    /// Fold in a branch point whose arms did (`true`) or did not all complete.
    pub fn branch(self, arms_completed: bool) -> Self {
        Self {
            has_branches: true,
            all_branches_completed: self.all_branches_completed && arms_completed,
            ..self
        }
    }

    pub fn is_always_completed(self) -> bool {
        self.was_completed || (self.has_branches && self.all_branches_completed)
    }
}

/// How the walker treats a nested function literal
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionEntry {
    /// Analyze the body as its own scope with this handle set; completion
    /// there completes the enclosing scope
    Analyze(HandleSet),
    /// Walk into the literal as ordinary nested code
    Descend,
    /// A handle is redeclared: record a failed branch and skip the literal
    Shadowed,
}

/// Completion predicate and shadow policy of one discovery variant.
pub trait CompletionRule {
    fn is_completion_call(&self, call: &CallExpr, handles: &HandleSet, bindings: &BindingTable) -> bool;

    fn enter_function(&self, func: &Function, handles: &HandleSet, bindings: &BindingTable) -> FunctionEntry;
}

pub struct CompletionWalker<'a, R: CompletionRule + ?Sized> {
    bindings: &'a BindingTable,
    rule: &'a R,
    max_depth: usize,
}

impl<'a, R: CompletionRule + ?Sized> CompletionWalker<'a, R> {
    pub fn new(bindings: &'a BindingTable, rule: &'a R) -> Self {
        Self { bindings, rule, max_depth: DEFAULT_MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether every path through `scope` completes one of `handles`.
    pub fn analyze(&self, scope: Node<'_>, handles: &HandleSet) -> Result<bool, AnalysisFault> {
        self.verdict(scope, handles, 0)
    }

    fn verdict(&self, scope: Node<'_>, handles: &HandleSet, depth: usize) -> Result<bool, AnalysisFault> {
        let record = self.visit(scope, handles, BranchRecord::default(), depth)?;
        Ok(record.is_always_completed())
    }

    fn visit(
        &self,
        node: Node<'_>,
        handles: &HandleSet,
        record: BranchRecord,
        depth: usize,
    ) -> Result<BranchRecord, AnalysisFault> {
        // nothing later in this scope can change the verdict
        if record.was_completed {
            return Ok(record);
        }
        if depth > self.max_depth {
            let span = node.span();
            return Err(AnalysisFault::DepthExceeded { limit: self.max_depth, line: span.line, col: span.col });
        }

        match node.shape() {
            Shape::If(stmt) => {
                let arms_completed = self.verdict(Node::Stmt(&stmt.consequent), handles, depth + 1)?
                    && match &stmt.alternate {
                        Some(alt) => self.verdict(Node::Stmt(alt), handles, depth + 1)?,
                        None => false,
                    };
                Ok(record.branch(arms_completed))
            }
            Shape::Call(call) => {
                if self.rule.is_completion_call(call, handles, self.bindings) || self.escapes(call, handles) {
                    Ok(record.completed())
                } else {
                    self.descend(node, handles, record, depth)
                }
            }
            Shape::Function(func) => match self.rule.enter_function(func, handles, self.bindings) {
                FunctionEntry::Analyze(inner) => {
                    if self.verdict(Node::Body(&func.body), &inner, depth + 1)? {
                        Ok(record.completed())
                    } else {
                        Ok(record)
                    }
                }
                FunctionEntry::Descend => self.descend(node, handles, record, depth),
                FunctionEntry::Shadowed => Ok(record.branch(false)),
            },
            Shape::Other => self.descend(node, handles, record, depth),
        }
    }

    fn descend(
        &self,
        node: Node<'_>,
        handles: &HandleSet,
        record: BranchRecord,
        depth: usize,
    ) -> Result<BranchRecord, AnalysisFault> {
        node.children()
            .into_iter()
            .try_fold(record, |rec, child| self.visit(child, handles, rec, depth))
    }

    /// A live handle passed as a bare argument delegates the obligation.
    fn escapes(&self, call: &CallExpr, handles: &HandleSet) -> bool {
        call.args.iter().any(|arg| match arg {
            Expr::Ident(ident) => handles.refers_to(ident, self.bindings),
            _ => false,
        })
    }
}
