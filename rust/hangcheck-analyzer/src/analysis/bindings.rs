//! Binding resolution: maps every identifier occurrence to the declaration
//! it denotes.
//!
//! The table is built once per program. Declarations are registered before
//! a scope's statements are walked (`var` and parameters into the enclosing
//! function scope, `let`/`const`/`class`/function declarations into the
//! enclosing block), so references resolve regardless of source order.
//! Names that are never declared resolve to one implicit global binding per
//! name.

use crate::analysis::ast::*;
use crate::analysis::tokens::Span;
use std::collections::HashMap;

/// Unique identifier for a declaration. Two `let x` in different scopes get
/// different ids even though they share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Param,
    Function,
    Class,
    CatchParam,
    /// Never declared in the program
    Global,
}

#[derive(Debug, Clone)]
pub struct BindingInfo {
    pub id: BindingId,
    pub name: String,
    pub kind: BindingKind,
    /// Span of the first declaring occurrence; dummy for globals
    pub span: Span,
}

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, BindingId>,
    is_function: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<BindingInfo>,
    /// Indexed by `IdentId`
    resolved: Vec<Option<BindingId>>,
    globals: HashMap<String, BindingId>,
}

impl BindingTable {
    pub fn build(program: &Program) -> Self {
        let mut binder = Binder {
            table: BindingTable {
                bindings: Vec::new(),
                resolved: vec![None; program.ident_count as usize],
                globals: HashMap::new(),
            },
            scopes: Vec::new(),
        };
        binder.bind_program(program);
        binder.table
    }

    pub fn binding_of(&self, ident: &Ident) -> Option<BindingId> {
        self.resolved.get(ident.id.0 as usize).copied().flatten()
    }

    /// Whether two occurrences denote the same declaration.
    pub fn same_binding(&self, a: &Ident, b: &Ident) -> bool {
        matches!((self.binding_of(a), self.binding_of(b)), (Some(x), Some(y)) if x == y)
    }

    pub fn info(&self, id: BindingId) -> Option<&BindingInfo> {
        self.bindings.get(id.0 as usize)
    }

    /// A declaring occurrence shadows `handle` when it carries the handle's
    /// name but introduces a different binding.
    pub fn is_shadowed_by(&self, handle: BindingId, decl: &Ident) -> bool {
        match self.info(handle) {
            Some(info) => info.name == decl.name && self.binding_of(decl) != Some(handle),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum PatternMode {
    /// Identifiers were registered during hoisting; only defaults and computed keys are walked
    Declared,
    /// Assignment targets: identifiers are references
    Reference,
}

struct Binder {
    table: BindingTable,
    scopes: Vec<Scope>,
}

impl Binder {
    // ── Scope management ──

    fn push_scope(&mut self, is_function: bool) {
        self.scopes.push(Scope { names: HashMap::new(), is_function });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn new_binding(&mut self, name: &str, kind: BindingKind, span: Span) -> BindingId {
        let id = BindingId(self.table.bindings.len() as u32);
        self.table.bindings.push(BindingInfo { id, name: name.to_string(), kind, span });
        id
    }

    fn record(&mut self, ident: &Ident, id: BindingId) {
        if let Some(slot) = self.table.resolved.get_mut(ident.id.0 as usize) {
            *slot = Some(id);
        }
    }

    /// Register a declaring occurrence. `var`-like kinds land in the nearest
    /// function scope; redeclaring a name in the same scope reuses its binding.
    fn declare(&mut self, ident: &Ident, kind: BindingKind) {
        let function_level = matches!(kind, BindingKind::Var | BindingKind::Param);
        let idx = if function_level {
            self.scopes.iter().rposition(|s| s.is_function).unwrap_or(0)
        } else {
            self.scopes.len().saturating_sub(1)
        };
        let existing = self.scopes.get(idx).and_then(|s| s.names.get(&ident.name).copied());
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.new_binding(&ident.name, kind, ident.span);
                if let Some(scope) = self.scopes.get_mut(idx) {
                    scope.names.insert(ident.name.clone(), id);
                }
                id
            }
        };
        self.record(ident, id);
    }

    fn declare_pattern(&mut self, pattern: &Pattern, kind: BindingKind) {
        let mut idents = Vec::new();
        pattern.collect_idents(&mut idents);
        for ident in idents {
            self.declare(ident, kind);
        }
    }

    fn resolve(&mut self, ident: &Ident) {
        let found = self.scopes.iter().rev().find_map(|s| s.names.get(&ident.name).copied());
        let id = match found {
            Some(id) => id,
            None => match self.table.globals.get(&ident.name) {
                Some(id) => *id,
                None => {
                    let id = self.new_binding(&ident.name, BindingKind::Global, Span::dummy());
                    self.table.globals.insert(ident.name.clone(), id);
                    id
                }
            },
        };
        self.record(ident, id);
    }

    // ── Declaration passes ──

    /// Register `var` declarations of a function body, descending into
    /// nested statements but not nested functions.
    fn hoist_vars(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.hoist_vars_stmt(stmt);
        }
    }

    fn hoist_vars_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) if decl.kind == VarKind::Var => self.declare_var_decl(decl),
            Stmt::If(i) => {
                self.hoist_vars_stmt(&i.consequent);
                if let Some(alt) = &i.alternate {
                    self.hoist_vars_stmt(alt);
                }
            }
            Stmt::Block(b) => self.hoist_vars(&b.body),
            Stmt::For(f) => {
                if let Some(ForInit::Var(decl)) = &f.init {
                    if decl.kind == VarKind::Var {
                        self.declare_var_decl(decl);
                    }
                }
                self.hoist_vars_stmt(&f.body);
            }
            Stmt::ForIn(f) => {
                if let ForInit::Var(decl) = &f.left {
                    if decl.kind == VarKind::Var {
                        self.declare_var_decl(decl);
                    }
                }
                self.hoist_vars_stmt(&f.body);
            }
            Stmt::While(w) => self.hoist_vars_stmt(&w.body),
            Stmt::DoWhile(d) => self.hoist_vars_stmt(&d.body),
            Stmt::Switch(s) => {
                for case in &s.cases {
                    self.hoist_vars(&case.body);
                }
            }
            Stmt::Try(t) => {
                self.hoist_vars(&t.block.body);
                if let Some(h) = &t.handler {
                    self.hoist_vars(&h.body.body);
                }
                if let Some(f) = &t.finalizer {
                    self.hoist_vars(&f.body);
                }
            }
            Stmt::Labeled(l) => self.hoist_vars_stmt(&l.body),
            _ => {}
        }
    }

    fn declare_var_decl(&mut self, decl: &VarDecl) {
        let kind = match decl.kind {
            VarKind::Var => BindingKind::Var,
            VarKind::Let => BindingKind::Let,
            VarKind::Const => BindingKind::Const,
        };
        for d in &decl.declarators {
            self.declare_pattern(&d.pattern, kind);
        }
    }

    /// Register the block-scoped declarations of one statement list.
    fn declare_lexical<'s>(&mut self, stmts: impl IntoIterator<Item = &'s Stmt>) {
        for stmt in stmts {
            match stmt {
                Stmt::Var(decl) if decl.kind != VarKind::Var => self.declare_var_decl(decl),
                Stmt::Function(f) => {
                    if let Some(name) = &f.name {
                        self.declare(name, BindingKind::Function);
                    }
                }
                Stmt::Class(c) => {
                    if let Some(name) = &c.name {
                        self.declare(name, BindingKind::Class);
                    }
                }
                _ => {}
            }
        }
    }

    // ── Walk ──

    fn bind_program(&mut self, program: &Program) {
        self.push_scope(true);
        self.hoist_vars(&program.body);
        self.declare_lexical(&program.body);
        for stmt in &program.body {
            self.walk_stmt(stmt);
        }
        self.pop_scope();
    }

    fn walk_block(&mut self, stmts: &[Stmt]) {
        self.push_scope(false);
        self.declare_lexical(stmts);
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
        self.pop_scope();
    }

    fn walk_var_decl(&mut self, decl: &VarDecl) {
        for d in &decl.declarators {
            self.walk_pattern(&d.pattern, PatternMode::Declared);
            if let Some(init) = &d.init {
                self.walk_expr(init);
            }
        }
    }

    fn walk_for_init(&mut self, init: &ForInit) {
        match init {
            ForInit::Var(decl) => {
                if decl.kind != VarKind::Var {
                    self.declare_var_decl(decl);
                }
                self.walk_var_decl(decl);
            }
            ForInit::Expr(expr) => self.walk_expr(expr),
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.walk_var_decl(decl),
            Stmt::Function(f) => self.walk_function(f, false),
            Stmt::Class(c) => self.walk_class(c, false),
            Stmt::If(i) => {
                self.walk_expr(&i.test);
                self.walk_stmt(&i.consequent);
                if let Some(alt) = &i.alternate {
                    self.walk_stmt(alt);
                }
            }
            Stmt::Block(b) => self.walk_block(&b.body),
            Stmt::Expr(e) => self.walk_expr(&e.expr),
            Stmt::Return(r) => {
                if let Some(arg) = &r.arg {
                    self.walk_expr(arg);
                }
            }
            Stmt::Throw(t) => self.walk_expr(&t.arg),
            Stmt::For(f) => {
                self.push_scope(false);
                if let Some(init) = &f.init {
                    self.walk_for_init(init);
                }
                if let Some(test) = &f.test {
                    self.walk_expr(test);
                }
                if let Some(update) = &f.update {
                    self.walk_expr(update);
                }
                self.walk_stmt(&f.body);
                self.pop_scope();
            }
            Stmt::ForIn(f) => {
                self.push_scope(false);
                self.walk_for_init(&f.left);
                self.walk_expr(&f.right);
                self.walk_stmt(&f.body);
                self.pop_scope();
            }
            Stmt::While(w) => {
                self.walk_expr(&w.test);
                self.walk_stmt(&w.body);
            }
            Stmt::DoWhile(d) => {
                self.walk_stmt(&d.body);
                self.walk_expr(&d.test);
            }
            Stmt::Switch(s) => {
                self.walk_expr(&s.discriminant);
                self.push_scope(false);
                self.declare_lexical(s.cases.iter().flat_map(|c| c.body.iter()));
                for case in &s.cases {
                    if let Some(test) = &case.test {
                        self.walk_expr(test);
                    }
                    for stmt in &case.body {
                        self.walk_stmt(stmt);
                    }
                }
                self.pop_scope();
            }
            Stmt::Try(t) => {
                self.walk_block(&t.block.body);
                if let Some(h) = &t.handler {
                    self.push_scope(false);
                    if let Some(param) = &h.param {
                        self.declare_pattern(param, BindingKind::CatchParam);
                        self.walk_pattern(param, PatternMode::Declared);
                    }
                    self.walk_block(&h.body.body);
                    self.pop_scope();
                }
                if let Some(f) = &t.finalizer {
                    self.walk_block(&f.body);
                }
            }
            Stmt::Labeled(l) => self.walk_stmt(&l.body),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
        }
    }

    fn walk_function(&mut self, func: &Function, is_expression: bool) {
        let named_expression = is_expression && func.name.is_some();
        if named_expression {
            self.push_scope(false);
            if let Some(name) = &func.name {
                self.declare(name, BindingKind::Function);
            }
        }
        self.push_scope(true);
        for param in &func.params {
            self.declare_pattern(param, BindingKind::Param);
        }
        if let FunctionBody::Block(block) = &func.body {
            self.hoist_vars(&block.body);
            self.declare_lexical(&block.body);
        }
        for param in &func.params {
            self.walk_pattern(param, PatternMode::Declared);
        }
        match &func.body {
            FunctionBody::Block(block) => {
                for stmt in &block.body {
                    self.walk_stmt(stmt);
                }
            }
            FunctionBody::Expr(expr) => self.walk_expr(expr),
        }
        self.pop_scope();
        if named_expression {
            self.pop_scope();
        }
    }

    fn walk_class(&mut self, class: &Class, is_expression: bool) {
        if let Some(sup) = &class.super_class {
            self.walk_expr(sup);
        }
        let named_expression = is_expression && class.name.is_some();
        if named_expression {
            self.push_scope(false);
            if let Some(name) = &class.name {
                self.declare(name, BindingKind::Class);
            }
        }
        for member in &class.members {
            match member {
                ClassMember::Method { key, func, .. } => {
                    self.walk_key(key);
                    self.walk_function(func, false);
                }
                ClassMember::Field { key, value, .. } => {
                    self.walk_key(key);
                    if let Some(v) = value {
                        self.walk_expr(v);
                    }
                }
            }
        }
        if named_expression {
            self.pop_scope();
        }
    }

    fn walk_key(&mut self, key: &PropKey) {
        if let PropKey::Computed(expr) = key {
            self.walk_expr(expr);
        }
    }

    fn walk_pattern(&mut self, pattern: &Pattern, mode: PatternMode) {
        match pattern {
            Pattern::Ident(ident) => {
                if mode == PatternMode::Reference {
                    self.resolve(ident);
                }
            }
            Pattern::Object { props, .. } => {
                for prop in props {
                    if let Some(key) = &prop.key {
                        self.walk_key(key);
                    }
                    self.walk_pattern(&prop.value, mode);
                }
            }
            Pattern::Array { elems, .. } => {
                for elem in elems.iter().flatten() {
                    self.walk_pattern(elem, mode);
                }
            }
            Pattern::Assign { target, value, .. } => {
                self.walk_pattern(target, mode);
                self.walk_expr(value);
            }
            Pattern::Rest { arg, .. } => self.walk_pattern(arg, mode),
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.resolve(ident),
            Expr::Number(..)
            | Expr::Str(..)
            | Expr::Template(..)
            | Expr::Bool(..)
            | Expr::Null(_)
            | Expr::This(_)
            | Expr::Super(_) => {}
            Expr::Array(items, _) => {
                for item in items.iter().flatten() {
                    self.walk_expr(item);
                }
            }
            Expr::Object(props, _) => {
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue { key, value, .. } => {
                            self.walk_key(key);
                            self.walk_expr(value);
                        }
                        ObjectProp::Shorthand(ident) => self.resolve(ident),
                        ObjectProp::Method { key, func } => {
                            self.walk_key(key);
                            self.walk_function(func, false);
                        }
                        ObjectProp::Spread(e, _) => self.walk_expr(e),
                    }
                }
            }
            Expr::Function(func) => self.walk_function(func, true),
            Expr::Class(class) => self.walk_class(class, true),
            Expr::Call(c) => {
                self.walk_expr(&c.callee);
                for arg in &c.args {
                    self.walk_expr(arg);
                }
            }
            Expr::New(n) => {
                self.walk_expr(&n.callee);
                for arg in &n.args {
                    self.walk_expr(arg);
                }
            }
            Expr::Member(m) => self.walk_expr(&m.object),
            Expr::Index(i) => {
                self.walk_expr(&i.object);
                self.walk_expr(&i.index);
            }
            Expr::Unary(u) => self.walk_expr(&u.arg),
            Expr::Update(u) => self.walk_expr(&u.arg),
            Expr::Binary(b) => {
                self.walk_expr(&b.left);
                self.walk_expr(&b.right);
            }
            Expr::Conditional(c) => {
                self.walk_expr(&c.test);
                self.walk_expr(&c.consequent);
                self.walk_expr(&c.alternate);
            }
            Expr::Assign(a) => {
                match &a.target {
                    AssignTarget::Pattern(p) => self.walk_pattern(p, PatternMode::Reference),
                    AssignTarget::Expr(e) => self.walk_expr(e),
                }
                self.walk_expr(&a.value);
            }
            Expr::Sequence(items, _) => {
                for item in items {
                    self.walk_expr(item);
                }
            }
            Expr::Spread(inner, _) => self.walk_expr(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lexer::Lexer;
    use crate::analysis::parser::Parser;
    use crate::analysis::visit::Node;

    fn parse(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().expect("lex failed");
        Parser::new(tokens).parse_program().expect("parse failed")
    }

    /// Every identifier occurrence in the program, in source order.
    fn occurrences(program: &Program) -> Vec<&Ident> {
        fn collect<'a>(node: Node<'a>, out: &mut Vec<&'a Ident>) {
            match node {
                Node::Expr(Expr::Ident(i)) | Node::Pattern(Pattern::Ident(i)) => out.push(i),
                Node::Expr(Expr::Object(props, _)) => {
                    for prop in props {
                        if let ObjectProp::Shorthand(i) = prop {
                            out.push(i);
                        }
                    }
                }
                Node::Function(f) | Node::Stmt(Stmt::Function(f)) => out.extend(f.name.iter()),
                Node::Class(c) => out.extend(c.name.iter()),
                _ => {}
            }
            for child in node.children() {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        collect(Node::Stmts(&program.body), &mut out);
        out.sort_by_key(|i| i.id.0);
        out
    }

    /// Binding of the `n`th occurrence (0-based) of `name`.
    fn nth(table: &BindingTable, occ: &[&Ident], name: &str, n: usize) -> BindingId {
        let ident = occ.iter().filter(|i| i.name == name).nth(n).expect("no such occurrence");
        table.binding_of(ident).expect("unresolved occurrence")
    }

    #[test]
    fn closure_reference_resolves_to_outer_param() {
        let prog = parse("new Promise(function (resolve) { setTimeout(function () { resolve(); }); });");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        assert_eq!(nth(&table, &occ, "resolve", 0), nth(&table, &occ, "resolve", 1));
        assert_eq!(table.info(nth(&table, &occ, "resolve", 0)).map(|i| i.kind), Some(BindingKind::Param));
    }

    #[test]
    fn parameter_shadows_outer_binding() {
        let prog = parse("var d = 1; xs.forEach(function (d) { d.resolve(); }); d;");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        let outer = nth(&table, &occ, "d", 0);
        assert_ne!(outer, nth(&table, &occ, "d", 1));
        assert_eq!(nth(&table, &occ, "d", 1), nth(&table, &occ, "d", 2));
        assert_eq!(outer, nth(&table, &occ, "d", 3));
        assert!(table.is_shadowed_by(outer, occ.iter().filter(|i| i.name == "d").nth(1).copied().expect("param")));
    }

    #[test]
    fn sibling_functions_get_distinct_bindings() {
        let prog = parse("function a(x) { x(); }\nfunction b(x) { x(); }");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        assert_ne!(nth(&table, &occ, "x", 0), nth(&table, &occ, "x", 2));
        assert!(!table.same_binding(occ[2], occ[5]));
    }

    #[test]
    fn var_is_hoisted_and_redeclaration_reuses_binding() {
        let prog = parse("function f() { use(v); if (c) { var v = 1; } var v; }");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        let first = nth(&table, &occ, "v", 0);
        assert_eq!(first, nth(&table, &occ, "v", 1));
        assert_eq!(first, nth(&table, &occ, "v", 2));
        assert_eq!(table.info(first).map(|i| i.kind), Some(BindingKind::Var));
    }

    #[test]
    fn let_is_block_scoped() {
        let prog = parse("let a = 1; { let a = 2; a; } a;");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        let outer = nth(&table, &occ, "a", 0);
        let inner = nth(&table, &occ, "a", 1);
        assert_ne!(outer, inner);
        assert_eq!(inner, nth(&table, &occ, "a", 2));
        assert_eq!(outer, nth(&table, &occ, "a", 3));
    }

    #[test]
    fn catch_param_and_named_function_expression() {
        let prog = parse("var e; try { x() } catch (e) { e; }\nvar g = function fact(n) { return fact(n); }; fact;");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        assert_ne!(nth(&table, &occ, "e", 0), nth(&table, &occ, "e", 1));
        assert_eq!(nth(&table, &occ, "e", 1), nth(&table, &occ, "e", 2));
        assert_eq!(nth(&table, &occ, "fact", 0), nth(&table, &occ, "fact", 1));
        // outside the expression its name is an undeclared global
        let outside = nth(&table, &occ, "fact", 2);
        assert_ne!(nth(&table, &occ, "fact", 0), outside);
        assert_eq!(table.info(outside).map(|i| i.kind), Some(BindingKind::Global));
    }

    #[test]
    fn undeclared_names_share_one_global() {
        let prog = parse("function a() { $.x(); } function b() { $.y(); }");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        assert_eq!(nth(&table, &occ, "$", 0), nth(&table, &occ, "$", 1));
    }

    #[test]
    fn shorthand_and_assignment_targets_are_references() {
        let prog = parse("var d; d = make(); ({ d }); [d] = pair;");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        let decl = nth(&table, &occ, "d", 0);
        for n in 1..4 {
            assert_eq!(decl, nth(&table, &occ, "d", n));
        }
    }

    #[test]
    fn arrow_destructured_params_bind_locally() {
        let prog = parse("var a; const f = ({ a }, [b = a]) => a + b;");
        let table = BindingTable::build(&prog);
        let occ = occurrences(&prog);
        let outer = nth(&table, &occ, "a", 0);
        let param = nth(&table, &occ, "a", 1);
        assert_ne!(outer, param);
        assert_eq!(param, nth(&table, &occ, "a", 2));
        assert_eq!(param, nth(&table, &occ, "a", 3));
    }
}
