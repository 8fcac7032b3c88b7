//! Uniform borrowed view over syntax nodes.
//!
//! Both the outer rule traversal and the completion walker move through the
//! tree as [`Node`] values. [`Node::shape`] classifies a node into the few
//! kinds the completion walker gives special meaning to; everything else is
//! [`Shape::Other`] and is walked through [`Node::children`].

use crate::analysis::ast::*;
use crate::analysis::tokens::Span;

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    /// A statement list: program body, block body, switch case body
    Stmts(&'a [Stmt]),
    Body(&'a FunctionBody),
    Pattern(&'a Pattern),
    Class(&'a Class),
    Function(&'a Function),
}

/// Node kinds with dedicated completion semantics
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    If(&'a IfStmt),
    Call(&'a CallExpr),
    Function(&'a Function),
    Other,
}

impl<'a> Node<'a> {
    pub fn shape(self) -> Shape<'a> {
        match self {
            Node::Stmt(Stmt::If(stmt)) => Shape::If(stmt),
            Node::Expr(Expr::Call(call)) => Shape::Call(call),
            Node::Function(func) => Shape::Function(func),
            _ => Shape::Other,
        }
    }

    pub fn span(self) -> Span {
        match self {
            Node::Stmt(s) => s.span(),
            Node::Expr(e) => e.span(),
            Node::Stmts(list) => match (list.first(), list.last()) {
                (Some(first), Some(last)) => first.span().merge(last.span()),
                _ => Span::dummy(),
            },
            Node::Body(b) => b.span(),
            Node::Pattern(p) => p.span(),
            Node::Class(c) => c.span,
            Node::Function(f) => f.span,
        }
    }

    /// Direct children in source order.
    pub fn children(self) -> Vec<Node<'a>> {
        let mut out = Vec::new();
        match self {
            Node::Stmt(stmt) => stmt_children(stmt, &mut out),
            Node::Expr(expr) => expr_children(expr, &mut out),
            Node::Stmts(list) => out.extend(list.iter().map(Node::Stmt)),
            Node::Body(FunctionBody::Block(block)) => out.push(Node::Stmts(&block.body)),
            Node::Body(FunctionBody::Expr(expr)) => out.push(Node::Expr(expr)),
            Node::Pattern(pattern) => pattern_children(pattern, &mut out),
            Node::Class(class) => {
                if let Some(sup) = &class.super_class {
                    out.push(Node::Expr(sup));
                }
                for member in &class.members {
                    match member {
                        ClassMember::Method { key, func, .. } => {
                            key_child(key, &mut out);
                            function_parts(func, &mut out);
                        }
                        ClassMember::Field { key, value, .. } => {
                            key_child(key, &mut out);
                            out.extend(value.iter().map(Node::Expr));
                        }
                    }
                }
            }
            Node::Function(func) => function_parts(func, &mut out),
        }
        out
    }
}

/// Parameters and body as plain children. Only function expressions and
/// arrows are wrapped in [`Node::Function`]; declarations and methods are
/// walked through like any other nested code.
fn function_parts<'a>(func: &'a Function, out: &mut Vec<Node<'a>>) {
    out.extend(func.params.iter().map(Node::Pattern));
    out.push(Node::Body(&func.body));
}

fn var_children<'a>(decl: &'a VarDecl, out: &mut Vec<Node<'a>>) {
    for d in &decl.declarators {
        out.push(Node::Pattern(&d.pattern));
        out.extend(d.init.iter().map(Node::Expr));
    }
}

fn for_init_child<'a>(init: &'a ForInit, out: &mut Vec<Node<'a>>) {
    match init {
        ForInit::Var(decl) => var_children(decl, out),
        ForInit::Expr(expr) => out.push(Node::Expr(expr)),
    }
}

fn key_child<'a>(key: &'a PropKey, out: &mut Vec<Node<'a>>) {
    if let PropKey::Computed(expr) = key {
        out.push(Node::Expr(expr));
    }
}

fn stmt_children<'a>(stmt: &'a Stmt, out: &mut Vec<Node<'a>>) {
    match stmt {
        Stmt::Var(decl) => var_children(decl, out),
        Stmt::Function(func) => function_parts(func, out),
        Stmt::Class(class) => out.push(Node::Class(class)),
        Stmt::If(i) => {
            out.push(Node::Expr(&i.test));
            out.push(Node::Stmt(&i.consequent));
            out.extend(i.alternate.iter().map(|s| Node::Stmt(s)));
        }
        Stmt::Block(block) => out.push(Node::Stmts(&block.body)),
        Stmt::Expr(e) => out.push(Node::Expr(&e.expr)),
        Stmt::Return(r) => out.extend(r.arg.iter().map(Node::Expr)),
        Stmt::Throw(t) => out.push(Node::Expr(&t.arg)),
        Stmt::For(f) => {
            if let Some(init) = &f.init {
                for_init_child(init, out);
            }
            out.extend(f.test.iter().map(Node::Expr));
            out.extend(f.update.iter().map(Node::Expr));
            out.push(Node::Stmt(&f.body));
        }
        Stmt::ForIn(f) => {
            for_init_child(&f.left, out);
            out.push(Node::Expr(&f.right));
            out.push(Node::Stmt(&f.body));
        }
        Stmt::While(w) => {
            out.push(Node::Expr(&w.test));
            out.push(Node::Stmt(&w.body));
        }
        Stmt::DoWhile(d) => {
            out.push(Node::Stmt(&d.body));
            out.push(Node::Expr(&d.test));
        }
        Stmt::Switch(s) => {
            out.push(Node::Expr(&s.discriminant));
            for case in &s.cases {
                out.extend(case.test.iter().map(Node::Expr));
                out.push(Node::Stmts(&case.body));
            }
        }
        Stmt::Try(t) => {
            out.push(Node::Stmts(&t.block.body));
            if let Some(handler) = &t.handler {
                out.extend(handler.param.iter().map(Node::Pattern));
                out.push(Node::Stmts(&handler.body.body));
            }
            if let Some(fin) = &t.finalizer {
                out.push(Node::Stmts(&fin.body));
            }
        }
        Stmt::Labeled(l) => out.push(Node::Stmt(&l.body)),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
    }
}

fn expr_children<'a>(expr: &'a Expr, out: &mut Vec<Node<'a>>) {
    match expr {
        Expr::Ident(_)
        | Expr::Number(..)
        | Expr::Str(..)
        | Expr::Template(..)
        | Expr::Bool(..)
        | Expr::Null(_)
        | Expr::This(_)
        | Expr::Super(_) => {}
        Expr::Array(items, _) => out.extend(items.iter().flatten().map(Node::Expr)),
        Expr::Object(props, _) => {
            for prop in props {
                match prop {
                    ObjectProp::KeyValue { key, value, .. } => {
                        key_child(key, out);
                        out.push(Node::Expr(value));
                    }
                    ObjectProp::Shorthand(_) => {}
                    ObjectProp::Method { key, func } => {
                        key_child(key, out);
                        function_parts(func, out);
                    }
                    ObjectProp::Spread(e, _) => out.push(Node::Expr(e)),
                }
            }
        }
        Expr::Function(func) => out.push(Node::Function(func)),
        Expr::Class(class) => out.push(Node::Class(class)),
        Expr::Call(c) => {
            out.push(Node::Expr(&c.callee));
            out.extend(c.args.iter().map(Node::Expr));
        }
        Expr::New(n) => {
            out.push(Node::Expr(&n.callee));
            out.extend(n.args.iter().map(Node::Expr));
        }
        Expr::Member(m) => out.push(Node::Expr(&m.object)),
        Expr::Index(i) => {
            out.push(Node::Expr(&i.object));
            out.push(Node::Expr(&i.index));
        }
        Expr::Unary(u) => out.push(Node::Expr(&u.arg)),
        Expr::Update(u) => out.push(Node::Expr(&u.arg)),
        Expr::Binary(b) => {
            out.push(Node::Expr(&b.left));
            out.push(Node::Expr(&b.right));
        }
        Expr::Conditional(c) => {
            out.push(Node::Expr(&c.test));
            out.push(Node::Expr(&c.consequent));
            out.push(Node::Expr(&c.alternate));
        }
        Expr::Assign(a) => {
            match &a.target {
                AssignTarget::Pattern(p) => out.push(Node::Pattern(p)),
                AssignTarget::Expr(e) => out.push(Node::Expr(e)),
            }
            out.push(Node::Expr(&a.value));
        }
        Expr::Sequence(items, _) => out.extend(items.iter().map(Node::Expr)),
        Expr::Spread(inner, _) => out.push(Node::Expr(inner)),
    }
}

fn pattern_children<'a>(pattern: &'a Pattern, out: &mut Vec<Node<'a>>) {
    match pattern {
        Pattern::Ident(_) => {}
        Pattern::Object { props, .. } => {
            for prop in props {
                if let Some(key) = &prop.key {
                    key_child(key, out);
                }
                out.push(Node::Pattern(&prop.value));
            }
        }
        Pattern::Array { elems, .. } => out.extend(elems.iter().flatten().map(Node::Pattern)),
        Pattern::Assign { target, value, .. } => {
            out.push(Node::Pattern(target));
            out.push(Node::Expr(value));
        }
        Pattern::Rest { arg, .. } => out.push(Node::Pattern(arg)),
    }
}
