//! `var d = $.Deferred()`: every path through the block owning `d` must call
//! `d.resolve()` or `d.reject()`.

use crate::analysis::ast::{AssignExpr, AssignTarget, CallExpr, Declarator, Expr, Function, Ident, Pattern};
use crate::analysis::bindings::BindingTable;
use crate::analysis::config::{ConfigError, DeferredConfig};
use crate::analysis::handles::HandleSet;
use crate::analysis::rules::RuleContext;
use crate::analysis::tokens::Span;
use crate::analysis::visit::Node;
use crate::analysis::walker::{AnalysisFault, CompletionRule, CompletionWalker, FunctionEntry};
use crate::diagnostics::{Diagnostic, RuleId};
use regex::Regex;
use tracing::debug;

pub const DEFERRED_MESSAGE: &str =
    "A Deferred was found that appears to not have resolve or reject invoked on all code paths";

#[derive(Debug, Clone)]
pub struct DeferredRule {
    factories: Vec<String>,
    aliases: Vec<String>,
    completion_ops: Regex,
}

impl DeferredRule {
    pub fn new(config: &DeferredConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            factories: config.factories.clone(),
            aliases: config.aliases.clone(),
            completion_ops: config.completion_regex()?,
        })
    }

    /// `Alias.factory()`, e.g. `$.Deferred()` or `Q.defer()`.
    pub fn is_factory_call(&self, expr: &Expr) -> bool {
        let Expr::Call(call) = expr else {
            return false;
        };
        let Expr::Member(member) = &*call.callee else {
            return false;
        };
        self.factories.iter().any(|f| *f == member.property)
            && member.object.dotted_path().is_some_and(|path| self.aliases.contains(&path))
    }

    /// `var d = $.Deferred()`; `scope` is the statement list holding the declaration.
    pub fn visit_declarator(
        &self,
        decl: &Declarator,
        scope: Node<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Diagnostic>, AnalysisFault> {
        let (Pattern::Ident(ident), Some(init)) = (&decl.pattern, &decl.init) else {
            return Ok(None);
        };
        if !self.is_factory_call(init) {
            return Ok(None);
        }
        self.check(ident, decl.span, scope, ctx)
    }

    /// `d = $.Deferred()`; `scope` is the statement list holding the assignment.
    pub fn visit_assign(
        &self,
        assign: &AssignExpr,
        scope: Node<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Diagnostic>, AnalysisFault> {
        if assign.op != "=" {
            return Ok(None);
        }
        let AssignTarget::Pattern(Pattern::Ident(ident)) = &assign.target else {
            return Ok(None);
        };
        if !self.is_factory_call(&assign.value) {
            return Ok(None);
        }
        self.check(ident, assign.span, scope, ctx)
    }

    fn check(
        &self,
        handle: &Ident,
        anchor: Span,
        scope: Node<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<Diagnostic>, AnalysisFault> {
        let handles = HandleSet::from_idents([handle], ctx.bindings);
        let completes = CompletionWalker::new(ctx.bindings, self)
            .with_max_depth(ctx.max_depth)
            .analyze(scope, &handles)?;
        debug!(name = %handle.name, line = anchor.line, col = anchor.col, completes, "deferred");
        if completes {
            return Ok(None);
        }
        let text = anchor.text(ctx.source).unwrap_or(handle.name.as_str());
        let message = format!("{}: {}", DEFERRED_MESSAGE, text);
        Ok(Some(Diagnostic::new(RuleId::DeferredMustComplete, message, anchor, ctx.source)))
    }
}

impl CompletionRule for DeferredRule {
    /// `handle.resolve(...)` / `handle.reject(...)`
    fn is_completion_call(&self, call: &CallExpr, handles: &HandleSet, bindings: &BindingTable) -> bool {
        let Expr::Member(member) = &*call.callee else {
            return false;
        };
        self.completion_ops.is_match(&member.property)
            && member.object.as_ident().is_some_and(|ident| handles.refers_to(ident, bindings))
    }

    fn enter_function(&self, func: &Function, handles: &HandleSet, bindings: &BindingTable) -> FunctionEntry {
        if handles.is_shadowed_by(&func.param_idents(), bindings) {
            FunctionEntry::Shadowed
        } else {
            FunctionEntry::Descend
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ast::{Program, Stmt};
    use crate::analysis::lexer::Lexer;
    use crate::analysis::parser::Parser;

    fn parse(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().expect("lex failed");
        Parser::new(tokens).parse_program().expect("parse failed")
    }

    fn rule() -> DeferredRule {
        DeferredRule::new(&DeferredConfig::default()).expect("default config is valid")
    }

    /// Run the declarator rule on the first statement, with the program body as scope.
    fn run(src: &str) -> Option<Diagnostic> {
        let prog = parse(src);
        let bindings = BindingTable::build(&prog);
        let ctx = RuleContext { source: src, bindings: &bindings, max_depth: 512 };
        let Stmt::Var(decl) = &prog.body[0] else { panic!("expected declaration first") };
        rule()
            .visit_declarator(&decl.declarators[0], Node::Stmts(&prog.body), &ctx)
            .expect("analysis failed")
    }

    #[test]
    fn factory_calls_need_alias_and_factory() {
        let prog = parse("$.Deferred(); jQuery.Deferred(); Q.defer(); $.ajax(); My.Deferred(); Deferred();");
        let r = rule();
        let matched: Vec<bool> = prog
            .body
            .iter()
            .map(|s| match s {
                Stmt::Expr(e) => r.is_factory_call(&e.expr),
                _ => false,
            })
            .collect();
        assert_eq!(matched, vec![true, true, true, false, false, false]);
    }

    #[test]
    fn if_else_settles_without_diagnostic() {
        assert!(run("var d = $.Deferred(); if (x) { d.resolve(); } else { d.reject(); }").is_none());
    }

    #[test]
    fn never_settled_deferred_reports_source_text() {
        let diag = run("var d = $.Deferred(); return_later(d.promise());").expect("diagnostic");
        assert_eq!(diag.rule, RuleId::DeferredMustComplete);
        assert_eq!(diag.message, format!("{}: d = $.Deferred()", DEFERRED_MESSAGE));
        assert_eq!(diag.offset, 4);
    }

    #[test]
    fn shadowing_parameter_fails_the_scope() {
        let src = "var d = $.Deferred(); items.forEach(function (d) { d.resolve(); });";
        assert!(run(src).is_some());
        // settled elsewhere in the same scope
        let src = "var d = $.Deferred(); items.forEach(function (d) { d.resolve(); }); d.resolve();";
        assert!(run(src).is_none());
    }

    #[test]
    fn closures_are_walked_as_nested_code() {
        assert!(run("var d = $.Deferred(); setTimeout(function () { d.resolve(); }, 5);").is_none());
        assert!(run("var d = $.Deferred(); setTimeout(function () { if (a) { d.resolve(); } }, 5);").is_some());
    }

    #[test]
    fn completion_ops_follow_config() {
        let prog = parse("var d = Q.defer(); d.notify();");
        let src = "var d = Q.defer(); d.notify();";
        let bindings = BindingTable::build(&prog);
        let ctx = RuleContext { source: src, bindings: &bindings, max_depth: 512 };
        let Stmt::Var(decl) = &prog.body[0] else { panic!("expected declaration") };
        let config = DeferredConfig { completion_ops: "^(resolve|reject|notify)$".to_string(), ..DeferredConfig::default() };
        let custom = DeferredRule::new(&config).expect("valid pattern");
        let scope = Node::Stmts(&prog.body);
        assert!(custom.visit_declarator(&decl.declarators[0], scope, &ctx).expect("ok").is_none());
        assert!(rule().visit_declarator(&decl.declarators[0], scope, &ctx).expect("ok").is_some());
    }

    #[test]
    fn assignment_form_is_recognized() {
        let src = "var d; d = $.Deferred();";
        let prog = parse(src);
        let bindings = BindingTable::build(&prog);
        let ctx = RuleContext { source: src, bindings: &bindings, max_depth: 512 };
        let Stmt::Expr(stmt) = &prog.body[1] else { panic!("expected expression statement") };
        let Expr::Assign(assign) = &stmt.expr else { panic!("expected assignment") };
        let diag = rule()
            .visit_assign(assign, Node::Stmts(&prog.body), &ctx)
            .expect("ok")
            .expect("diagnostic");
        assert_eq!(diag.message, format!("{}: d = $.Deferred()", DEFERRED_MESSAGE));
    }
}
