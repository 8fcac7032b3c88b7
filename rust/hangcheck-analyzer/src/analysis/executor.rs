//! `new Promise((resolve, reject) => ...)`: every path through the executor
//! must call `resolve` or `reject`.

use crate::analysis::ast::{CallExpr, Expr, Function, NewExpr, Pattern};
use crate::analysis::bindings::BindingTable;
use crate::analysis::config::ExecutorConfig;
use crate::analysis::handles::HandleSet;
use crate::analysis::rules::RuleContext;
use crate::analysis::visit::Node;
use crate::analysis::walker::{AnalysisFault, CompletionRule, CompletionWalker, FunctionEntry};
use crate::diagnostics::{Diagnostic, RuleId};
use tracing::debug;

pub const EXECUTOR_MESSAGE: &str =
    "A Promise was found that appears to not have resolve or reject invoked on all code paths";

#[derive(Debug, Clone)]
pub struct ExecutorRule {
    constructors: Vec<String>,
}

impl ExecutorRule {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self { constructors: config.constructors.clone() }
    }

    /// The executor literal of a matching `new` and the handles it declares.
    /// Only the first two parameters count, and only plain identifiers.
    pub fn recognize<'p>(&self, new: &'p NewExpr, bindings: &BindingTable) -> Option<(&'p Function, HandleSet)> {
        let callee = new.callee.dotted_path()?;
        if !self.constructors.iter().any(|c| *c == callee) {
            return None;
        }
        let Some(Expr::Function(func)) = new.args.first() else {
            return None;
        };
        if func.params.is_empty() {
            return None;
        }
        let handles = HandleSet::from_idents(func.params.iter().take(2).filter_map(Pattern::as_ident), bindings);
        Some((func, handles))
    }

    /// Analyze one `new` expression; `Some` when the executor can finish
    /// without settling.
    pub fn visit_new(&self, new: &NewExpr, ctx: &RuleContext<'_>) -> Result<Option<Diagnostic>, AnalysisFault> {
        let Some((func, handles)) = self.recognize(new, ctx.bindings) else {
            return Ok(None);
        };
        let completes = CompletionWalker::new(ctx.bindings, self)
            .with_max_depth(ctx.max_depth)
            .analyze(Node::Body(&func.body), &handles)?;
        debug!(line = new.span.line, col = new.span.col, handles = handles.len(), completes, "promise executor");
        if completes {
            return Ok(None);
        }
        Ok(Some(Diagnostic::new(RuleId::PromiseMustComplete, EXECUTOR_MESSAGE, new.span, ctx.source)))
    }
}

impl CompletionRule for ExecutorRule {
    fn is_completion_call(&self, call: &CallExpr, handles: &HandleSet, bindings: &BindingTable) -> bool {
        call.callee.as_ident().is_some_and(|ident| handles.refers_to(ident, bindings))
    }

    fn enter_function(&self, func: &Function, handles: &HandleSet, bindings: &BindingTable) -> FunctionEntry {
        FunctionEntry::Analyze(handles.without_shadowed(&func.param_idents(), bindings))
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

    fn first_new(prog: &Program) -> &NewExpr {
        match &prog.body[0] {
            Stmt::Expr(stmt) => match &stmt.expr {
                Expr::New(new) => new,
                other => panic!("expected new expression, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    fn run(src: &str) -> Option<Diagnostic> {
        let prog = parse(src);
        let bindings = BindingTable::build(&prog);
        let ctx = RuleContext { source: src, bindings: &bindings, max_depth: 512 };
        ExecutorRule::new(&ExecutorConfig::default())
            .visit_new(first_new(&prog), &ctx)
            .expect("analysis failed")
    }

    #[test]
    fn recognizes_first_two_identifier_params() {
        let prog = parse("new Promise(function (resolve, reject, extra) {});");
        let bindings = BindingTable::build(&prog);
        let rule = ExecutorRule::new(&ExecutorConfig::default());
        let (_, handles) = rule.recognize(first_new(&prog), &bindings).expect("recognized");
        let names: Vec<_> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["resolve", "reject"]);
    }

    #[test]
    fn destructured_and_defaulted_params_are_not_handles() {
        let prog = parse("new Promise(({ ok }, reject = noop) => {});");
        let bindings = BindingTable::build(&prog);
        let rule = ExecutorRule::new(&ExecutorConfig::default());
        let (_, handles) = rule.recognize(first_new(&prog), &bindings).expect("recognized");
        assert!(handles.is_empty());
    }

    #[test]
    fn ignores_other_constructors_and_non_literal_executors() {
        let prog = parse("new Map(function (a) {});");
        let bindings = BindingTable::build(&prog);
        let rule = ExecutorRule::new(&ExecutorConfig::default());
        assert!(rule.recognize(first_new(&prog), &bindings).is_none());
        assert!(run("new Promise(executor);").is_none());
        assert!(run("new Promise(() => {});").is_none());
    }

    #[test]
    fn configured_constructor_paths_match() {
        let prog = parse("new Ember.RSVP.Promise(function (resolve) {});");
        let bindings = BindingTable::build(&prog);
        let config = ExecutorConfig { constructors: vec!["Ember.RSVP.Promise".to_string()], ..ExecutorConfig::default() };
        assert!(ExecutorRule::new(&config).recognize(first_new(&prog), &bindings).is_some());
    }

    #[test]
    fn if_else_settles_without_diagnostic() {
        assert!(run("new Promise(function (resolve, reject) { if (c) { resolve(1); } else { reject(e); } });").is_none());
    }

    #[test]
    fn missing_else_anchors_on_new_expression() {
        let src = "new Promise(function (resolve, reject) { if (c) { resolve(1); } });";
        let diag = run(src).expect("diagnostic");
        assert_eq!(diag.rule, RuleId::PromiseMustComplete);
        assert_eq!(diag.message, EXECUTOR_MESSAGE);
        assert_eq!(diag.offset, 0);
        assert_eq!(diag.width, src.len() - 1);
    }

    #[test]
    fn handle_passed_along_counts_as_settled() {
        assert!(run("new Promise(function (resolve) { doSomethingAsync(resolve); });").is_none());
        assert!(run("new Promise(function (resolve) { var f = function (cb) { cb(); }; f(resolve); });").is_none());
    }

    #[test]
    fn inner_parameter_with_handle_name_is_not_the_handle() {
        let src = "new Promise(function (resolve) { [1].forEach(function (resolve) { resolve(); }); });";
        assert!(run(src).is_some());
    }

    #[test]
    fn same_name_outside_the_executor_is_not_the_handle() {
        let src = "new Promise(function (resolve) { other(); });\nfunction resolve() {}";
        assert!(run(src).is_some());
    }
}
