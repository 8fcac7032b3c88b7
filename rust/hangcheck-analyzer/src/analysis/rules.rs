//! Rule runner: one outer pass over the program that hands each recognized
//! construct to its rule.
//!
//! Every construct is analyzed behind its own fault boundary. A depth fault
//! or a panic inside one analysis becomes an `analysis-fault` diagnostic on
//! that construct and the pass moves on to its siblings.

use std::panic::{self, AssertUnwindSafe};

use crate::analysis::ast::{Expr, FunctionBody, Program, Stmt};
use crate::analysis::bindings::BindingTable;
use crate::analysis::config::{AnalyzerConfig, ConfigError};
use crate::analysis::deferred::DeferredRule;
use crate::analysis::executor::ExecutorRule;
use crate::analysis::tokens::Span;
use crate::analysis::visit::Node;
use crate::analysis::walker::AnalysisFault;
use crate::diagnostics::{Diagnostic, RuleId};
use tracing::{debug, warn};

/// What a rule needs to analyze one construct.
pub struct RuleContext<'a> {
    pub source: &'a str,
    pub bindings: &'a BindingTable,
    pub max_depth: usize,
}

/// The enabled rules, built once from an [`AnalyzerConfig`].
#[derive(Debug, Clone)]
pub struct Rules {
    pub executor: Option<ExecutorRule>,
    pub deferred: Option<DeferredRule>,
    pub max_depth: usize,
}

impl Rules {
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let executor = config.executor.enabled.then(|| ExecutorRule::new(&config.executor));
        let deferred = if config.deferred.enabled { Some(DeferredRule::new(&config.deferred)?) } else { None };
        Ok(Self { executor, deferred, max_depth: config.max_depth })
    }
}

/// Run every enabled rule over `program`. Diagnostics come back sorted by offset.
pub fn check_program(program: &Program, source: &str, rules: &Rules) -> Vec<Diagnostic> {
    let bindings = BindingTable::build(program);
    let ctx = RuleContext { source, bindings: &bindings, max_depth: rules.max_depth };
    let mut diagnostics = Vec::new();

    let root = Node::Stmts(&program.body);
    // (node, nearest enclosing statement list or expression body)
    let mut stack = vec![(root, root)];
    while let Some((node, scope)) = stack.pop() {
        match node {
            Node::Expr(Expr::New(new)) => {
                if let Some(rule) = &rules.executor {
                    record(&mut diagnostics, new.span, &ctx, || rule.visit_new(new, &ctx));
                }
            }
            Node::Expr(Expr::Assign(assign)) => {
                if let Some(rule) = &rules.deferred {
                    record(&mut diagnostics, assign.span, &ctx, || rule.visit_assign(assign, scope, &ctx));
                }
            }
            Node::Stmt(Stmt::Var(decl)) => {
                if let Some(rule) = &rules.deferred {
                    for declarator in &decl.declarators {
                        record(&mut diagnostics, declarator.span, &ctx, || {
                            rule.visit_declarator(declarator, scope, &ctx)
                        });
                    }
                }
            }
            _ => {}
        }

        let inner = match node {
            Node::Stmts(_) | Node::Body(FunctionBody::Expr(_)) => node,
            _ => scope,
        };
        stack.extend(node.children().into_iter().rev().map(|child| (child, inner)));
    }

    diagnostics.sort_by_key(|d| d.offset);
    debug!(count = diagnostics.len(), bindings = bindings.len(), "checked program");
    diagnostics
}

fn record<F>(out: &mut Vec<Diagnostic>, anchor: Span, ctx: &RuleContext<'_>, run: F)
where
    F: FnOnce() -> Result<Option<Diagnostic>, AnalysisFault>,
{
    match guarded(run) {
        Ok(Some(diag)) => out.push(diag),
        Ok(None) => {}
        Err(fault) => {
            warn!(line = anchor.line, col = anchor.col, %fault, "analysis fault");
            out.push(Diagnostic::new(RuleId::AnalysisFault, fault.to_string(), anchor, ctx.source));
        }
    }
}

/// Run one analysis, turning a panic into [`AnalysisFault::Panicked`].
pub fn guarded<T, F>(run: F) -> Result<T, AnalysisFault>
where
    F: FnOnce() -> Result<T, AnalysisFault>,
{
    panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|panic_val| {
        let msg = if let Some(s) = panic_val.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = panic_val.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "internal analysis error".to_string()
        };
        Err(AnalysisFault::Panicked(msg))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lexer::Lexer;
    use crate::analysis::parser::Parser;

    fn check_with(src: &str, config: &AnalyzerConfig) -> Vec<Diagnostic> {
        let tokens = Lexer::new(src).tokenize().expect("lex failed");
        let program = Parser::new(tokens).parse_program().expect("parse failed");
        let rules = Rules::from_config(config).expect("valid config");
        check_program(&program, src, &rules)
    }

    fn check(src: &str) -> Vec<Diagnostic> {
        check_with(src, &AnalyzerConfig::default())
    }

    fn rule_ids(diags: &[Diagnostic]) -> Vec<RuleId> {
        diags.iter().map(|d| d.rule).collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let src = r#"
            var p = new Promise(function (resolve, reject) {
                if (ok) { resolve(1); } else { reject(new Error("no")); }
            });
            function load() {
                var d = $.Deferred();
                fetch(url, function () { d.resolve(); });
                return d.promise();
            }
        "#;
        assert!(check(src).is_empty());
    }

    #[test]
    fn both_rules_report_sorted_by_offset() {
        let src = "function f() { var d = $.Deferred(); return d; }\nnew Promise((resolve) => { if (a) { resolve(); } });";
        let diags = check(src);
        assert_eq!(rule_ids(&diags), vec![RuleId::DeferredMustComplete, RuleId::PromiseMustComplete]);
        assert!(diags[0].offset < diags[1].offset);
        assert_eq!(diags[1].line, 2);
    }

    #[test]
    fn deferred_scope_is_the_enclosing_block() {
        // resolved after the block that owns it; the block alone never settles
        let src = "var d; { d = $.Deferred(); } d.resolve();";
        assert_eq!(rule_ids(&check(src)), vec![RuleId::DeferredMustComplete]);
        let src = "{ var d = $.Deferred(); d.reject(); }";
        assert!(check(src).is_empty());
    }

    #[test]
    fn top_level_deferred_is_scoped_to_the_program() {
        let src = "var d = $.Deferred();\nif (a) { d.resolve(); } else { d.reject(); }";
        assert!(check(src).is_empty());
        let src = "var d = $.Deferred();\nif (a) { d.resolve(); }";
        assert_eq!(rule_ids(&check(src)), vec![RuleId::DeferredMustComplete]);
    }

    #[test]
    fn expression_bodied_arrow_is_a_scope() {
        let src = "var make = () => d = $.Deferred();";
        let diags = check(src);
        assert_eq!(rule_ids(&diags), vec![RuleId::DeferredMustComplete]);
        assert!(diags[0].message.ends_with(": d = $.Deferred()"));
    }

    #[test]
    fn nested_promises_are_each_checked() {
        let src = "new Promise(function (resolve) { new Promise(function (inner) { other(); }); resolve(); });";
        let diags = check(src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].offset, src.find("new Promise(function (inner)").expect("inner present"));
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let src = "var d = $.Deferred(); new Promise(function (r) {});";
        let mut config = AnalyzerConfig::default();
        config.deferred.enabled = false;
        assert_eq!(rule_ids(&check_with(src, &config)), vec![RuleId::PromiseMustComplete]);
        config.executor.enabled = false;
        assert!(check_with(src, &config).is_empty());
    }

    #[test]
    fn depth_fault_is_isolated_to_its_construct() {
        let src = "new Promise(function (r) { if (a) { if (b) { if (c) { r(); } } } });\nvar d = $.Deferred();";
        let config = AnalyzerConfig { max_depth: 2, ..AnalyzerConfig::default() };
        let diags = check_with(src, &config);
        assert_eq!(rule_ids(&diags), vec![RuleId::AnalysisFault, RuleId::DeferredMustComplete]);
        assert!(diags[0].message.contains("depth limit 2"));
        assert_eq!(diags[0].offset, 0);
    }

    #[test]
    fn guarded_captures_panics() {
        let fault = guarded::<(), _>(|| panic!("boom")).unwrap_err();
        assert_eq!(fault, AnalysisFault::Panicked("boom".to_string()));
        let fault = guarded::<(), _>(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(fault, AnalysisFault::Panicked("code 7".to_string()));
        assert_eq!(guarded(|| Ok(3)), Ok(3));
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let mut config = AnalyzerConfig::default();
        config.deferred.completion_ops = "[".to_string();
        assert!(Rules::from_config(&config).is_err());
    }
}
