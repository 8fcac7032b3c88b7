use crate::analysis::tokens::Span;
use serde::{Deserialize, Serialize};

/// Identity of one identifier occurrence, assigned by the parser in source order.
/// The binder maps each occurrence to the declaration it denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub id: IdentId,
    pub span: Span,
}

/// A complete parsed source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
    /// Number of identifier occurrences; every `IdentId` is below this bound
    pub ident_count: u32,
}

// ── Statements ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Var(VarDecl),
    Function(Function),
    Class(Class),
    If(IfStmt),
    Block(Block),
    Expr(ExprStmt),
    Return(ReturnStmt),
    Throw(ThrowStmt),
    For(ForStmt),
    ForIn(ForInStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    Switch(SwitchStmt),
    Try(TryStmt),
    Break(JumpStmt),
    Continue(JumpStmt),
    Labeled(LabeledStmt),
    Empty(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Var(v) => v.span,
            Stmt::Function(f) => f.span,
            Stmt::Class(c) => c.span,
            Stmt::If(i) => i.span,
            Stmt::Block(b) => b.span,
            Stmt::Expr(e) => e.span,
            Stmt::Return(r) => r.span,
            Stmt::Throw(t) => t.span,
            Stmt::For(f) => f.span,
            Stmt::ForIn(f) => f.span,
            Stmt::While(w) => w.span,
            Stmt::DoWhile(d) => d.span,
            Stmt::Switch(s) => s.span,
            Stmt::Try(t) => t.span,
            Stmt::Break(j) | Stmt::Continue(j) => j.span,
            Stmt::Labeled(l) => l.span,
            Stmt::Empty(s) => *s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub test: Expr,
    pub consequent: Box<Stmt>,
    pub alternate: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub arg: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowStmt {
    pub arg: Expr,
    pub span: Span,
}

/// Left side of a `for` head: a declaration or an arbitrary expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStmt {
    pub init: Option<ForInit>,
    pub test: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// `for (x in obj)` and `for (x of iterable)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForInStmt {
    pub left: ForInit,
    pub right: Expr,
    pub body: Box<Stmt>,
    pub is_of: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStmt {
    pub test: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub test: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for the `default:` clause
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStmt {
    pub block: Block,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpStmt {
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledStmt {
    pub label: String,
    pub body: Box<Stmt>,
    pub span: Span,
}

// ── Functions and classes ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: Option<Ident>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
    pub span: Span,
}

impl Function {
    /// Every name bound by the parameter list, including destructured ones.
    pub fn param_idents(&self) -> Vec<&Ident> {
        let mut out = Vec::new();
        for p in &self.params {
            p.collect_idents(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FunctionBody {
    Block(Block),
    /// Concise arrow body: `x => expr`
    Expr(Box<Expr>),
}

impl FunctionBody {
    pub fn span(&self) -> Span {
        match self {
            FunctionBody::Block(b) => b.span,
            FunctionBody::Expr(e) => e.span(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub name: Option<Ident>,
    pub super_class: Option<Box<Expr>>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassMember {
    Method { key: PropKey, func: Function, is_static: bool },
    Field { key: PropKey, value: Option<Expr>, is_static: bool, span: Span },
}

// ── Patterns ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    Ident(Ident),
    Object { props: Vec<PatternProp>, span: Span },
    Array { elems: Vec<Option<Pattern>>, span: Span },
    /// `target = default`
    Assign { target: Box<Pattern>, value: Box<Expr>, span: Span },
    /// `...target`
    Rest { arg: Box<Pattern>, span: Span },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Ident(i) => i.span,
            Pattern::Object { span, .. }
            | Pattern::Array { span, .. }
            | Pattern::Assign { span, .. }
            | Pattern::Rest { span, .. } => *span,
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Pattern::Ident(i) => Some(i),
            _ => None,
        }
    }

    pub fn collect_idents<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Pattern::Ident(i) => out.push(i),
            Pattern::Object { props, .. } => {
                for p in props { p.value.collect_idents(out); }
            }
            Pattern::Array { elems, .. } => {
                for e in elems.iter().flatten() { e.collect_idents(out); }
            }
            Pattern::Assign { target, .. } => target.collect_idents(out),
            Pattern::Rest { arg, .. } => arg.collect_idents(out),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternProp {
    /// `None` for an object rest element (`{ ...rest }`)
    pub key: Option<PropKey>,
    pub value: Pattern,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropKey {
    Named(String, Span),
    Computed(Box<Expr>),
}

// ── Expressions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Ident(Ident),
    Number(f64, Span),
    Str(String, Span),
    Template(String, Span),
    Bool(bool, Span),
    Null(Span),
    This(Span),
    Super(Span),
    /// Array literal; `None` entries are holes
    Array(Vec<Option<Expr>>, Span),
    Object(Vec<ObjectProp>, Span),
    Function(Box<Function>),
    Class(Box<Class>),
    Call(CallExpr),
    New(NewExpr),
    Member(MemberExpr),
    Index(IndexExpr),
    Unary(UnaryExpr),
    Update(UpdateExpr),
    Binary(BinaryExpr),
    Conditional(ConditionalExpr),
    Assign(AssignExpr),
    Sequence(Vec<Expr>, Span),
    Spread(Box<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(i) => i.span,
            Expr::Number(_, s)
            | Expr::Str(_, s)
            | Expr::Template(_, s)
            | Expr::Bool(_, s)
            | Expr::Null(s)
            | Expr::This(s)
            | Expr::Super(s)
            | Expr::Array(_, s)
            | Expr::Object(_, s)
            | Expr::Sequence(_, s)
            | Expr::Spread(_, s) => *s,
            Expr::Function(f) => f.span,
            Expr::Class(c) => c.span,
            Expr::Call(c) => c.span,
            Expr::New(n) => n.span,
            Expr::Member(m) => m.span,
            Expr::Index(i) => i.span,
            Expr::Unary(u) => u.span,
            Expr::Update(u) => u.span,
            Expr::Binary(b) => b.span,
            Expr::Conditional(c) => c.span,
            Expr::Assign(a) => a.span,
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Expr::Ident(i) => Some(i),
            _ => None,
        }
    }

    /// Dotted path text for `a`, `a.b`, `this.a.b`; `None` for anything computed.
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Ident(i) => Some(i.name.clone()),
            Expr::This(_) => Some("this".to_string()),
            Expr::Member(m) if !m.optional => {
                m.object.dotted_path().map(|base| format!("{}.{}", base, m.property))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectProp {
    KeyValue { key: PropKey, value: Expr, span: Span },
    /// `{ a }`, a reference to the binding `a`
    Shorthand(Ident),
    /// Methods, getters and setters
    Method { key: PropKey, func: Function },
    Spread(Expr, Span),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub property: String,
    pub property_span: Span,
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexExpr {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpr {
    /// `!`, `-`, `+`, `~`, `typeof`, `void`, `delete` or `await`
    pub op: String,
    pub arg: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExpr {
    pub op: String,
    pub prefix: bool,
    pub arg: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpr {
    /// Arithmetic, comparison and logical operators alike
    pub op: String,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalExpr {
    pub test: Box<Expr>,
    pub consequent: Box<Expr>,
    pub alternate: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignExpr {
    /// `=` or a compound operator such as `+=`
    pub op: String,
    pub target: AssignTarget,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignTarget {
    /// Identifier or destructuring target; its identifiers are references
    Pattern(Pattern),
    /// Member or index target such as `this.d` or `a[i]`
    Expr(Box<Expr>),
}

impl AssignTarget {
    pub fn span(&self) -> Span {
        match self {
            AssignTarget::Pattern(p) => p.span(),
            AssignTarget::Expr(e) => e.span(),
        }
    }
}
