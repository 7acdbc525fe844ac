//! The AST contract of §6: a closed tree of node kinds standing in for the
//! externally-supplied front-end (tokenizer + parser are out of scope per
//! §1). Builder helpers below exist only so tests and the CLI's JSON
//! ingestion have a concrete type to construct/deserialize.

use compact_str::CompactString;
use facet::Facet;

/// A source position, attached to a node for `BadSyntax` reporting.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

/// One formal parameter: `{name, type-expr}`.
#[derive(Facet, Clone, Debug, PartialEq)]
pub struct FormalParam {
    pub name: CompactString,
    pub type_expr: Box<Node>,
}

/// One `var`/`const`-style value-spec child of a `generic-declaration`.
#[derive(Facet, Clone, Debug, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<CompactString>,
    pub type_expr: Option<Box<Node>>,
    pub values: Vec<Node>,
}

/// Operator of a [`NodeKind::UnaryExpression`]; only `Receive` is
/// concurrency-visible, the rest exist so the variant is genuinely closed.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum UnaryOp {
    Receive,
    Not,
    Negate,
    AddressOf,
    Deref,
}

/// The closed set of AST node kinds (spec §6), plus `SpawnStatement` — not
/// named in §6's list, but required by §4.2's emission table to tell a
/// spawn of a named procedure apart from a plain call and from a spawn of
/// an anonymous literal.
#[derive(Facet, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum NodeKind {
    ProgramFile {
        decls: Vec<Node>,
    },
    GenericDeclaration {
        specs: Vec<ValueSpec>,
    },
    ProcedureDeclaration {
        name: CompactString,
        formals: Vec<FormalParam>,
        body: Option<Vec<Node>>,
    },
    BlockStatement {
        stmts: Vec<Node>,
    },
    AssignmentStatement {
        lhs: Vec<Node>,
        rhs: Vec<Node>,
    },
    DeclarationStatement {
        decl: Box<Node>,
    },
    SendStatement {
        channel: Box<Node>,
        value: Box<Node>,
    },
    ExpressionStatement {
        expr: Box<Node>,
    },
    CallExpression {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    UnaryExpression {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Identifier {
        name: CompactString,
    },
    ChannelType {
        element_type: Box<Node>,
    },
    ProcedureType,
    IfStatement {
        init: Option<Box<Node>>,
        cond: Box<Node>,
        then_body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },
    SwitchStatement {
        init: Option<Box<Node>>,
        tag: Option<Box<Node>>,
        cases: Vec<Node>,
    },
    TypeSwitchStatement {
        init: Option<Box<Node>>,
        assign: Box<Node>,
        cases: Vec<Node>,
    },
    SelectStatement {
        cases: Vec<Node>,
    },
    ForStatement {
        init: Option<Box<Node>>,
        cond: Option<Box<Node>>,
        post: Option<Box<Node>>,
        body: Vec<Node>,
    },
    ForRangeStatement {
        key: Option<Box<Node>>,
        value: Option<Box<Node>>,
        range_expr: Box<Node>,
        body: Vec<Node>,
    },
    /// `select` branch. `comm = None` marks the (silently-dropped) default
    /// clause per §9.
    CommunicationClause {
        comm: Option<Box<Node>>,
        body: Vec<Node>,
    },
    /// `switch`/`type-switch` branch. Empty `values` marks a default case.
    CaseClause {
        values: Vec<Node>,
        body: Vec<Node>,
    },
    /// `SpawnStatement` — see the module-level doc comment.
    SpawnStatement {
        target: Box<Node>,
        args: Vec<Node>,
    },
    ProcedureLiteral {
        formals: Vec<FormalParam>,
        body: Vec<Node>,
    },
    BadDeclaration,
    BadExpression,
    BadStatement,
}

/// A node: its kind plus the source position the front-end attached to it.
#[derive(Facet, Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Pos,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            pos: Pos::default(),
        }
    }

    pub fn at(kind: NodeKind, pos: Pos) -> Self {
        Self { kind, pos }
    }

    pub fn is_bad(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::BadDeclaration | NodeKind::BadExpression | NodeKind::BadStatement
        )
    }

    // -- constructor helpers, used by tests and by callers building a tree
    // in-process rather than deserializing one ------------------------

    pub fn program_file(decls: Vec<Node>) -> Self {
        Self::new(NodeKind::ProgramFile { decls })
    }

    pub fn procedure(
        name: impl Into<CompactString>,
        formals: Vec<FormalParam>,
        body: Option<Vec<Node>>,
    ) -> Self {
        Self::new(NodeKind::ProcedureDeclaration {
            name: name.into(),
            formals,
            body,
        })
    }

    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self::new(NodeKind::Identifier { name: name.into() })
    }

    pub fn block(stmts: Vec<Node>) -> Self {
        Self::new(NodeKind::BlockStatement { stmts })
    }

    pub fn assign(lhs: Vec<Node>, rhs: Vec<Node>) -> Self {
        Self::new(NodeKind::AssignmentStatement { lhs, rhs })
    }

    pub fn decl(specs: Vec<ValueSpec>) -> Self {
        Self::new(NodeKind::DeclarationStatement {
            decl: Box::new(Self::new(NodeKind::GenericDeclaration { specs })),
        })
    }

    pub fn send(channel: Node, value: Node) -> Self {
        Self::new(NodeKind::SendStatement {
            channel: Box::new(channel),
            value: Box::new(value),
        })
    }

    pub fn expr_stmt(expr: Node) -> Self {
        Self::new(NodeKind::ExpressionStatement { expr: Box::new(expr) })
    }

    pub fn call(callee: Node, args: Vec<Node>) -> Self {
        Self::new(NodeKind::CallExpression {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn recv(operand: Node) -> Self {
        Self::new(NodeKind::UnaryExpression {
            op: UnaryOp::Receive,
            operand: Box::new(operand),
        })
    }

    pub fn channel_type(element_type: Node) -> Self {
        Self::new(NodeKind::ChannelType {
            element_type: Box::new(element_type),
        })
    }

    pub fn procedure_type() -> Self {
        Self::new(NodeKind::ProcedureType)
    }

    pub fn if_stmt(
        init: Option<Node>,
        cond: Node,
        then_body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    ) -> Self {
        Self::new(NodeKind::IfStatement {
            init: init.map(Box::new),
            cond: Box::new(cond),
            then_body,
            else_body,
        })
    }

    pub fn switch_stmt(init: Option<Node>, tag: Option<Node>, cases: Vec<Node>) -> Self {
        Self::new(NodeKind::SwitchStatement {
            init: init.map(Box::new),
            tag: tag.map(Box::new),
            cases,
        })
    }

    pub fn select_stmt(cases: Vec<Node>) -> Self {
        Self::new(NodeKind::SelectStatement { cases })
    }

    pub fn for_stmt(
        init: Option<Node>,
        cond: Option<Node>,
        post: Option<Node>,
        body: Vec<Node>,
    ) -> Self {
        Self::new(NodeKind::ForStatement {
            init: init.map(Box::new),
            cond: cond.map(Box::new),
            post: post.map(Box::new),
            body,
        })
    }

    pub fn for_range_stmt(
        key: Option<Node>,
        value: Option<Node>,
        range_expr: Node,
        body: Vec<Node>,
    ) -> Self {
        Self::new(NodeKind::ForRangeStatement {
            key: key.map(Box::new),
            value: value.map(Box::new),
            range_expr: Box::new(range_expr),
            body,
        })
    }

    pub fn comm_clause(comm: Option<Node>, body: Vec<Node>) -> Self {
        Self::new(NodeKind::CommunicationClause {
            comm: comm.map(Box::new),
            body,
        })
    }

    pub fn case_clause(values: Vec<Node>, body: Vec<Node>) -> Self {
        Self::new(NodeKind::CaseClause { values, body })
    }

    pub fn spawn(target: Node, args: Vec<Node>) -> Self {
        Self::new(NodeKind::SpawnStatement {
            target: Box::new(target),
            args,
        })
    }

    pub fn procedure_literal(formals: Vec<FormalParam>, body: Vec<Node>) -> Self {
        Self::new(NodeKind::ProcedureLiteral { formals, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_nodes_are_recognized() {
        assert!(Node::new(NodeKind::BadStatement).is_bad());
        assert!(Node::new(NodeKind::BadExpression).is_bad());
        assert!(Node::new(NodeKind::BadDeclaration).is_bad());
        assert!(!Node::ident("x").is_bad());
    }

    #[test]
    fn procedure_builder_round_trips_fields() {
        let p = Node::procedure(
            "greeter",
            vec![FormalParam {
                name: "c".into(),
                type_expr: Box::new(Node::channel_type(Node::ident("string"))),
            }],
            Some(vec![Node::send(Node::ident("c"), Node::ident("\"hi\""))]),
        );
        match p.kind {
            NodeKind::ProcedureDeclaration { name, formals, body } => {
                assert_eq!(name, "greeter");
                assert_eq!(formals.len(), 1);
                assert!(body.is_some());
            }
            _ => panic!("expected ProcedureDeclaration"),
        }
    }
}
