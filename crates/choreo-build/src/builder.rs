//! The statement-directed Scope FSA builder (spec §4.2).
//!
//! One [`ProcBuilder`] per procedure body, consuming `choreo_ast::Node`
//! siblings in source order and emitting transitions via the FSA kernel's
//! sentinel API. Only nodes with concurrency-visible semantics produce a
//! transition; everything else collapses into the implicit ε-step of
//! simply not emitting anything, matching `peeps-waitgraph`'s one-
//! ingest-method-per-node-kind structure.

use std::collections::BTreeMap;

use compact_str::CompactString;
use tracing::{debug, trace};

use choreo_ast::{FormalParam, Node, NodeKind, UnaryOp, ValueSpec};
use choreo_fsa::{Fsa, Move, Payload, StateId, StateRef, Transition};
use choreo_types::{ActualArg, ChannelMetadata, Error, FormalArg, FormalKind, SourcePos};

use crate::record::{File, Procedure};

fn ident_name(node: &Node) -> Option<CompactString> {
    match &node.kind {
        NodeKind::Identifier { name } => Some(name.clone()),
        _ => None,
    }
}

/// Recognizes `make(chan T)` / `make(chan T, capacity)`; returns the
/// element type name and whether a capacity argument made it asynchronous.
/// Per §9, `make` used on a non-channel-type argument (slices, maps) must
/// not be mistaken for a channel declaration — the check is on the
/// argument's node *kind* (`ChannelType`), not on the callee name alone.
fn make_channel_info(node: &Node) -> Option<(CompactString, bool)> {
    let NodeKind::CallExpression { callee, args } = &node.kind else {
        return None;
    };
    if ident_name(callee).as_deref() != Some("make") {
        return None;
    }
    let first = args.first()?;
    let NodeKind::ChannelType { element_type } = &first.kind else {
        return None;
    };
    let elem = ident_name(element_type).unwrap_or_else(|| "unknown".into());
    Some((elem, args.len() > 1))
}

/// Channel declarations introduced by one `generic-declaration` value-spec,
/// whether via an explicit `chan T` type or a `make(chan T, ...)` initializer.
fn channel_decls_from_value_spec(spec: &ValueSpec) -> Vec<ChannelMetadata> {
    if let Some(te) = &spec.type_expr {
        if let NodeKind::ChannelType { element_type } = &te.kind {
            let elem = ident_name(element_type).unwrap_or_else(|| "unknown".into());
            return spec
                .names
                .iter()
                .map(|n| ChannelMetadata::new(n.clone(), elem.clone(), false))
                .collect();
        }
    }
    spec.names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            let value = spec.values.get(i)?;
            let (elem, asynchronous) = make_channel_info(value)?;
            Some(ChannelMetadata::new(name.clone(), elem, asynchronous))
        })
        .collect()
}

fn collect_actuals(args: &[Node]) -> Vec<ActualArg> {
    args.iter()
        .enumerate()
        .filter_map(|(i, a)| ident_name(a).map(|n| ActualArg::new(i, n)))
        .collect()
}

fn bad_syntax(file_name: &str, pos: choreo_ast::Pos, message: impl Into<String>) -> Error {
    Error::BadSyntax {
        message: message.into(),
        at: Some(SourcePos {
            file: file_name.to_string(),
            line: pos.line,
            column: pos.column,
        }),
    }
}

struct ProcBuilder<'a> {
    file_name: &'a str,
    proc_name: CompactString,
    globals: &'a BTreeMap<CompactString, ChannelMetadata>,
    local_channels: &'a mut BTreeMap<CompactString, ChannelMetadata>,
    fsa: &'a mut Fsa,
}

impl<'a> ProcBuilder<'a> {
    fn bad_syntax(&self, pos: choreo_ast::Pos, message: impl Into<String>) -> Error {
        bad_syntax(self.file_name, pos, message)
    }

    fn is_known_channel(&self, name: &str) -> bool {
        self.local_channels.contains_key(name) || self.globals.contains_key(name)
    }

    /// The channel name referenced by a channel-expr, falling back to a
    /// fixed placeholder for anything more complex than a bare identifier
    /// — the analyzer does no alias analysis beyond syntactic identifier
    /// matching (§1 Non-goals), so it does not attempt to resolve one.
    fn channel_label(&self, node: &Node) -> CompactString {
        ident_name(node).unwrap_or_else(|| "<complex-channel-expr>".into())
    }

    fn emit(&mut self, mv: Move, label: impl Into<CompactString>) -> Result<(StateId, StateId), Error> {
        self.fsa
            .add_transition(StateRef::Current, StateRef::New, Transition::new(mv, label))
    }

    fn emit_recv(&mut self, operand: &Node) -> Result<(), Error> {
        let label = self.channel_label(operand);
        trace!(channel = %label, "recv");
        self.emit(Move::Recv, label)?;
        Ok(())
    }

    fn emit_send(&mut self, channel: &Node) -> Result<(), Error> {
        let label = self.channel_label(channel);
        trace!(channel = %label, "send");
        self.emit(Move::Send, label)?;
        Ok(())
    }

    fn walk_call(&mut self, callee: &Node, args: &[Node]) -> Result<(), Error> {
        let label = ident_name(callee).unwrap_or_else(|| "<complex-callee-expr>".into());
        let actuals = collect_actuals(args);
        debug!(callee = %label, arity = actuals.len(), "call");
        self.fsa.add_transition(
            StateRef::Current,
            StateRef::New,
            Transition::with_payload(Move::Call, label, Payload::actuals(actuals)),
        )?;
        Ok(())
    }

    fn walk_spawn(&mut self, target: &Node, args: &[Node]) -> Result<(), Error> {
        let actuals = collect_actuals(args);
        let label = match &target.kind {
            NodeKind::Identifier { name } => name.clone(),
            NodeKind::ProcedureLiteral { .. } => {
                format!("anonymous-{}", self.proc_name).into()
            }
            _ => {
                return Err(self.bad_syntax(
                    target.pos,
                    "spawn target must be an identifier or a procedure literal",
                ))
            }
        };
        debug!(target = %label, arity = actuals.len(), "spawn");
        self.fsa.add_transition(
            StateRef::Current,
            StateRef::New,
            Transition::with_payload(Move::Spawn, label, Payload::actuals(actuals)),
        )?;
        Ok(())
    }

    fn walk_expr(&mut self, node: &Node) -> Result<(), Error> {
        match &node.kind {
            NodeKind::UnaryExpression {
                op: UnaryOp::Receive,
                operand,
            } => self.emit_recv(operand),
            NodeKind::CallExpression { callee, args } => self.walk_call(callee, args),
            NodeKind::BadExpression => Err(self.bad_syntax(node.pos, "malformed expression")),
            _ => Ok(()),
        }
    }

    fn walk_value_spec(&mut self, spec: &ValueSpec) {
        for decl in channel_decls_from_value_spec(spec) {
            self.local_channels.insert(decl.name.clone(), decl);
        }
    }

    fn walk_decl(&mut self, decl: &Node) -> Result<(), Error> {
        match &decl.kind {
            NodeKind::GenericDeclaration { specs } => {
                for spec in specs {
                    self.walk_value_spec(spec);
                }
                Ok(())
            }
            _ => Err(self.bad_syntax(
                decl.pos,
                "declaration-statement must wrap a generic-declaration",
            )),
        }
    }

    fn walk_assignment(&mut self, lhs: &[Node], rhs: &[Node]) -> Result<(), Error> {
        if rhs.len() != 1 {
            // multi-value assignment without a single RHS expression to
            // classify; no data-flow tracking is attempted (§1 Non-goals)
            return Ok(());
        }
        let value = &rhs[0];
        if let Some((elem, asynchronous)) = make_channel_info(value) {
            if let Some(name) = lhs.first().and_then(ident_name) {
                self.local_channels
                    .insert(name.clone(), ChannelMetadata::new(name, elem, asynchronous));
            }
            return Ok(());
        }
        match &value.kind {
            NodeKind::UnaryExpression {
                op: UnaryOp::Receive,
                operand,
            } => self.emit_recv(operand),
            NodeKind::CallExpression { callee, args } => self.walk_call(callee, args),
            _ => Ok(()),
        }
    }

    fn walk_block(&mut self, stmts: &[Node]) -> Result<(), Error> {
        for s in stmts {
            self.walk_stmt(s)?;
        }
        Ok(())
    }

    fn walk_if(
        &mut self,
        init: Option<&Node>,
        cond: &Node,
        then_body: &[Node],
        else_body: Option<&[Node]>,
    ) -> Result<(), Error> {
        if let Some(i) = init {
            self.walk_stmt(i)?;
        }
        self.walk_expr(cond)?;

        let branch = self.fsa.cursor();
        let (_, then_start) = self.fsa.add_transition(
            StateRef::Id(branch),
            StateRef::New,
            Transition::new(Move::Epsilon, "if-block-start"),
        )?;
        self.fsa.set_cursor(then_start)?;
        self.walk_block(then_body)?;
        let post_then = self.fsa.cursor();
        let (_, merge) = self.fsa.add_transition(
            StateRef::Id(post_then),
            StateRef::New,
            Transition::new(Move::Epsilon, "if-block-end"),
        )?;

        if let Some(eb) = else_body {
            self.fsa.set_cursor(branch)?;
            let (_, else_start) = self.fsa.add_transition(
                StateRef::Id(branch),
                StateRef::New,
                Transition::new(Move::Epsilon, "else-block-start"),
            )?;
            self.fsa.set_cursor(else_start)?;
            self.walk_block(eb)?;
            let post_else = self.fsa.cursor();
            self.fsa.add_transition(
                StateRef::Id(post_else),
                StateRef::Id(merge),
                Transition::new(Move::Epsilon, "else-block-end"),
            )?;
        } else {
            self.fsa.add_transition(
                StateRef::Id(branch),
                StateRef::Id(merge),
                Transition::new(Move::Epsilon, "if-block-skip"),
            )?;
        }

        self.fsa.set_cursor(merge)?;
        Ok(())
    }

    fn walk_switch_like(
        &mut self,
        prefix: &str,
        init: Option<&Node>,
        discriminant: Option<&Node>,
        cases: &[Node],
    ) -> Result<(), Error> {
        if let Some(i) = init {
            self.walk_stmt(i)?;
        }
        if let Some(d) = discriminant {
            self.walk_expr(d)?;
        }

        let branch = self.fsa.cursor();
        let mut merge: Option<StateId> = None;
        for (i, case) in cases.iter().enumerate() {
            let body = match &case.kind {
                NodeKind::CaseClause { body, .. } => body,
                _ => return Err(self.bad_syntax(case.pos, "switch case must be a case-clause")),
            };
            self.fsa.set_cursor(branch)?;
            let (_, case_start) = self.fsa.add_transition(
                StateRef::Id(branch),
                StateRef::New,
                Transition::new(Move::Epsilon, format!("{prefix}-case-{i}-start")),
            )?;
            self.fsa.set_cursor(case_start)?;
            self.walk_block(body)?;
            let post = self.fsa.cursor();
            let end_label = format!("{prefix}-case-{i}-end");
            merge = Some(match merge {
                None => {
                    let (_, m) = self.fsa.add_transition(
                        StateRef::Id(post),
                        StateRef::New,
                        Transition::new(Move::Epsilon, end_label),
                    )?;
                    m
                }
                Some(m) => {
                    self.fsa.add_transition(
                        StateRef::Id(post),
                        StateRef::Id(m),
                        Transition::new(Move::Epsilon, end_label),
                    )?;
                    m
                }
            });
        }
        if let Some(m) = merge {
            self.fsa.set_cursor(m)?;
        }
        Ok(())
    }

    fn walk_select(&mut self, cases: &[Node]) -> Result<(), Error> {
        let branch = self.fsa.cursor();
        let mut merge: Option<StateId> = None;
        for (i, case) in cases.iter().enumerate() {
            let (comm, body) = match &case.kind {
                NodeKind::CommunicationClause { comm, body } => (comm, body),
                _ => {
                    return Err(self.bad_syntax(case.pos, "select case must be a communication-clause"))
                }
            };
            // Default clause: source behavior silently drops it (§9); no
            // transitions at all are emitted for this case.
            let Some(comm_stmt) = comm.as_deref() else {
                continue;
            };
            self.fsa.set_cursor(branch)?;
            let (_, case_start) = self.fsa.add_transition(
                StateRef::Id(branch),
                StateRef::New,
                Transition::new(Move::Epsilon, format!("select-case-{i}-start")),
            )?;
            self.fsa.set_cursor(case_start)?;
            self.walk_stmt(comm_stmt)?;
            self.walk_block(body)?;
            let post = self.fsa.cursor();
            let end_label = format!("select-case-{i}-end");
            merge = Some(match merge {
                None => {
                    let (_, m) = self.fsa.add_transition(
                        StateRef::Id(post),
                        StateRef::New,
                        Transition::new(Move::Epsilon, end_label),
                    )?;
                    m
                }
                Some(m) => {
                    self.fsa.add_transition(
                        StateRef::Id(post),
                        StateRef::Id(m),
                        Transition::new(Move::Epsilon, end_label),
                    )?;
                    m
                }
            });
        }
        if let Some(m) = merge {
            self.fsa.set_cursor(m)?;
        }
        Ok(())
    }

    fn walk_for(
        &mut self,
        init: Option<&Node>,
        cond: Option<&Node>,
        post: Option<&Node>,
        body: &[Node],
    ) -> Result<(), Error> {
        if let Some(i) = init {
            self.walk_stmt(i)?;
        }
        if let Some(c) = cond {
            self.walk_expr(c)?;
        }
        let fork = self.fsa.cursor();
        let (_, body_start) = self.fsa.add_transition(
            StateRef::Id(fork),
            StateRef::New,
            Transition::new(Move::Epsilon, "for-iteration-start"),
        )?;
        self.fsa.set_cursor(body_start)?;
        self.walk_block(body)?;
        if let Some(p) = post {
            self.walk_stmt(p)?;
        }
        let post_cursor = self.fsa.cursor();
        self.fsa.add_transition(
            StateRef::Id(post_cursor),
            StateRef::Id(fork),
            Transition::new(Move::Epsilon, "for-iteration-end"),
        )?;
        self.fsa.set_cursor(fork)?;
        let (_, exit) = self.fsa.add_transition(
            StateRef::Id(fork),
            StateRef::New,
            Transition::new(Move::Epsilon, "for-iteration-skip"),
        )?;
        self.fsa.set_cursor(exit)?;
        Ok(())
    }

    fn walk_for_range(&mut self, range_expr: &Node, body: &[Node]) -> Result<(), Error> {
        let fork = self.fsa.cursor();
        let known_channel = ident_name(range_expr).filter(|n| self.is_known_channel(n));
        let (_, body_start) = match known_channel {
            Some(name) => self.fsa.add_transition(
                StateRef::Id(fork),
                StateRef::New,
                Transition::new(Move::Recv, name),
            )?,
            None => self.fsa.add_transition(
                StateRef::Id(fork),
                StateRef::New,
                Transition::new(Move::Epsilon, "for-iteration-start"),
            )?,
        };
        self.fsa.set_cursor(body_start)?;
        self.walk_block(body)?;
        let post_cursor = self.fsa.cursor();
        self.fsa.add_transition(
            StateRef::Id(post_cursor),
            StateRef::Id(fork),
            Transition::new(Move::Epsilon, "for-iteration-end"),
        )?;
        self.fsa.set_cursor(fork)?;
        let (_, exit) = self.fsa.add_transition(
            StateRef::Id(fork),
            StateRef::New,
            Transition::new(Move::Epsilon, "for-iteration-skip"),
        )?;
        self.fsa.set_cursor(exit)?;
        Ok(())
    }

    fn walk_stmt(&mut self, node: &Node) -> Result<(), Error> {
        match &node.kind {
            NodeKind::BadStatement | NodeKind::BadExpression | NodeKind::BadDeclaration => {
                Err(self.bad_syntax(node.pos, "malformed node"))
            }
            NodeKind::BlockStatement { stmts } => self.walk_block(stmts),
            NodeKind::DeclarationStatement { decl } => self.walk_decl(decl),
            NodeKind::AssignmentStatement { lhs, rhs } => self.walk_assignment(lhs, rhs),
            NodeKind::SendStatement { channel, .. } => self.emit_send(channel),
            NodeKind::ExpressionStatement { expr } => self.walk_expr(expr),
            NodeKind::SpawnStatement { target, args } => self.walk_spawn(target, args),
            NodeKind::IfStatement {
                init,
                cond,
                then_body,
                else_body,
            } => self.walk_if(init.as_deref(), cond, then_body, else_body.as_deref()),
            NodeKind::SwitchStatement { init, tag, cases } => {
                self.walk_switch_like("switch", init.as_deref(), tag.as_deref(), cases)
            }
            NodeKind::TypeSwitchStatement { init, assign, cases } => {
                self.walk_switch_like("type-switch", init.as_deref(), Some(assign.as_ref()), cases)
            }
            NodeKind::SelectStatement { cases } => self.walk_select(cases),
            NodeKind::ForStatement {
                init,
                cond,
                post,
                body,
            } => self.walk_for(init.as_deref(), cond.as_deref(), post.as_deref(), body),
            NodeKind::ForRangeStatement {
                range_expr, body, ..
            } => self.walk_for_range(range_expr, body),
            _ => Ok(()),
        }
    }
}

fn build_procedure(
    name: &str,
    formals: &[FormalParam],
    body: &[Node],
    globals: &BTreeMap<CompactString, ChannelMetadata>,
    file_name: &str,
) -> Result<Procedure, Error> {
    let span = tracing::info_span!("build_procedure", procedure = %name);
    let _enter = span.enter();

    let mut proc = Procedure::new(name);
    for (i, f) in formals.iter().enumerate() {
        let kind = match &f.type_expr.kind {
            NodeKind::ChannelType { .. } => FormalKind::Channel,
            NodeKind::ProcedureType => FormalKind::Procedure,
            // non-channel, non-procedure formals (plain data) are not
            // inlinable and play no part in §4.3a's specialization
            _ => continue,
        };
        proc.inlinable_args.insert(
            f.name.clone(),
            FormalArg {
                position: i,
                name: f.name.clone(),
                kind,
            },
        );
        if let (FormalKind::Channel, NodeKind::ChannelType { element_type }) =
            (kind, &f.type_expr.kind)
        {
            let elem = ident_name(element_type).unwrap_or_else(|| "unknown".into());
            proc.local_channels
                .insert(f.name.clone(), ChannelMetadata::new(f.name.clone(), elem, false));
        }
    }

    let Procedure {
        local_channels,
        scope_fsa,
        ..
    } = &mut proc;
    let mut builder = ProcBuilder {
        file_name,
        proc_name: name.into(),
        globals,
        local_channels,
        fsa: scope_fsa,
    };
    builder.walk_block(body)?;
    let end = builder.fsa.cursor();
    let (_, accepting) = builder.fsa.add_transition(
        StateRef::Id(end),
        StateRef::New,
        Transition::new(Move::Epsilon, format!("func-{name}-return")),
    )?;
    builder.fsa.mark_accepting(accepting)?;

    Ok(proc)
}

/// Builds the `File` record for a whole program-file (spec §4.2's entry
/// point): collects global channel declarations and builds one `Procedure`
/// per `procedure-declaration`.
pub fn build_file(program: &Node, file_name: &str) -> Result<File, Error> {
    let NodeKind::ProgramFile { decls } = &program.kind else {
        return Err(bad_syntax(file_name, program.pos, "root node must be a program-file"));
    };

    let mut file = File::new();
    for decl in decls {
        match &decl.kind {
            NodeKind::GenericDeclaration { specs } => {
                for spec in specs {
                    for channel in channel_decls_from_value_spec(spec) {
                        file.global_channels.insert(channel.name.clone(), channel);
                    }
                }
            }
            NodeKind::DeclarationStatement { decl: inner } => match &inner.kind {
                NodeKind::GenericDeclaration { specs } => {
                    for spec in specs {
                        for channel in channel_decls_from_value_spec(spec) {
                            file.global_channels.insert(channel.name.clone(), channel);
                        }
                    }
                }
                _ => {
                    return Err(bad_syntax(
                        file_name,
                        decl.pos,
                        "top-level declaration-statement must wrap a generic-declaration",
                    ))
                }
            },
            NodeKind::ProcedureDeclaration { name, formals, body } => {
                let body_stmts: &[Node] = body.as_deref().unwrap_or(&[]);
                let procedure = build_procedure(name, formals, body_stmts, &file.global_channels, file_name)?;
                file.procedures.insert(name.clone(), procedure);
            }
            NodeKind::BadDeclaration => {
                return Err(bad_syntax(file_name, decl.pos, "malformed top-level declaration"))
            }
            _ => {}
        }
    }
    Ok(file)
}
