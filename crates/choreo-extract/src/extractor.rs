//! The local-view extractor (spec §4.3): inlines `Call` transitions with
//! the callee's specialized Scope FSA, recurses on `Spawn` transitions to
//! discover further routines, and determinizes each result.
//!
//! Grounded on `peeps-waitgraph`'s recursive graph-walk style; the
//! resolution loop below is a worklist over one FSA's own transitions,
//! mirroring `detect.rs`'s explicit-worklist idiom rather than recursing
//! through the call stack on the FSA itself (recursion is reserved for
//! descending into freshly spawned routines, which is a different FSA).

use std::collections::BTreeMap;
use std::sync::Arc;

use compact_str::CompactString;
use tracing::{debug, info_span};

use choreo_build::File;
use choreo_build::Procedure;
use choreo_fsa::{determinize, Fsa, Move, StateId, StateRef, Transition, ViewRef};
use choreo_types::{ActualArg, Error, FormalKind};

use crate::view::{LocalView, RunContext};

/// 4.3a formal→actual specialization: deep-copies `callee`'s Scope FSA and
/// rewrites every `Send`/`Recv` label that names a `Channel`-kind formal to
/// the actual channel name passed at the call/spawn site. `Procedure`-kind
/// actuals are recognized and counted toward arity but never rewritten —
/// no transition kind in §3 carries a callee-selectable procedure value to
/// rewrite into.
fn specialize(callee: &Procedure, actuals: &[ActualArg]) -> Result<Fsa, Error> {
    if actuals.len() != callee.inlinable_args.len() {
        return Err(Error::ArityMismatch {
            callee: callee.name.to_string(),
            expected: callee.inlinable_args.len(),
            actual: actuals.len(),
        });
    }

    let formals_by_position: BTreeMap<usize, _> = callee
        .inlinable_args
        .values()
        .map(|f| (f.position, f))
        .collect();

    let mut renames: BTreeMap<CompactString, CompactString> = BTreeMap::new();
    for actual in actuals {
        if let Some(formal) = formals_by_position.get(&actual.position) {
            if formal.kind == FormalKind::Channel {
                renames.insert(formal.name.clone(), actual.name.clone());
            }
        }
    }

    let mut fsa = callee.scope_fsa.copy();
    if !renames.is_empty() {
        rewrite_channel_labels(&mut fsa, &renames)?;
    }
    Ok(fsa)
}

fn rewrite_channel_labels(
    fsa: &mut Fsa,
    renames: &BTreeMap<CompactString, CompactString>,
) -> Result<(), Error> {
    let mut to_remove = Vec::new();
    let mut to_add = Vec::new();
    fsa.for_each_transition(|from, to, t| {
        if matches!(t.mv, Move::Send | Move::Recv) {
            if let Some(renamed) = renames.get(t.label.as_str()) {
                to_remove.push((from, to, t.mv, t.label.clone()));
                let mut rewritten = t.clone();
                rewritten.label = renamed.clone();
                to_add.push((from, to, rewritten));
            }
        }
    });
    for (from, to, mv, label) in to_remove {
        fsa.remove_transition(from, to, mv, &label);
    }
    for (from, to, t) in to_add {
        fsa.add_transition(StateRef::Id(from), StateRef::Id(to), t)?;
    }
    Ok(())
}

fn resolve_call(file: &File, fsa: &mut Fsa, from: StateId, to: StateId, t: &Transition) -> Result<(), Error> {
    let actuals = t.payload.as_ref().map(|p| p.actuals.clone()).unwrap_or_default();
    match file.procedures.get(t.label.as_str()) {
        None => {
            debug!(callee = %t.label, "unresolved callee, rewriting to epsilon");
            fsa.remove_transition(from, to, Move::Call, &t.label);
            fsa.add_transition(
                StateRef::Id(from),
                StateRef::Id(to),
                Transition::new(Move::Epsilon, "unknown-function-call"),
            )?;
        }
        Some(callee) => {
            debug!(callee = %t.label, "inlining call");
            let specialized = specialize(callee, &actuals)?;
            fsa.inline(from, to, &specialized)?;
        }
    }
    Ok(())
}

fn resolve_spawn(
    file: &File,
    t: &Transition,
    ctx: &mut RunContext,
    discovered: &mut Vec<LocalView>,
) -> Result<Transition, Error> {
    let target_name = t.label.as_str();
    let target = file
        .procedures
        .get(target_name)
        .ok_or_else(|| Error::UnresolvedSpawn {
            target: target_name.to_string(),
        })?;
    let actuals = t.payload.as_ref().map(|p| p.actuals.clone()).unwrap_or_default();
    let specialized = specialize(target, &actuals)?;

    let mut nested = extract_view(file, target_name, specialized, ctx)?;
    let spawned_view = nested.remove(0);
    let view_ref = ViewRef {
        name: spawned_view.name.clone(),
        fsa: Arc::new(spawned_view.fsa.clone()),
    };
    discovered.push(spawned_view);
    discovered.append(&mut nested);

    let mut payload = t.payload.clone().unwrap_or_default();
    payload.view_ref = Some(view_ref);
    Ok(Transition::with_payload(Move::Spawn, t.label.clone(), payload))
}

/// Drives one fixed point of Call/Spawn resolution over `fsa`. A `Spawn`
/// transition counts as resolved once its payload carries a `view_ref`;
/// an anonymous-literal spawn (label prefixed `anonymous-`) is treated as
/// already resolved without ever looking it up — the chosen answer to
/// §9's open question, opaque rather than body-parsing.
fn resolve_pass(
    file: &File,
    fsa: &mut Fsa,
    ctx: &mut RunContext,
    discovered: &mut Vec<LocalView>,
) -> Result<(), Error> {
    loop {
        let next: Option<(StateId, StateId, Transition)> = {
            let mut found = None;
            fsa.for_each_transition(|from, to, t| {
                if found.is_some() {
                    return;
                }
                let unresolved = match t.mv {
                    Move::Call => true,
                    Move::Spawn => {
                        let opaque = t.label.starts_with("anonymous-");
                        let already_done =
                            t.payload.as_ref().map(|p| p.view_ref.is_some()).unwrap_or(false);
                        !opaque && !already_done
                    }
                    _ => false,
                };
                if unresolved {
                    found = Some((from, to, t.clone()));
                }
            });
            found
        };
        let Some((from, to, t)) = next else {
            break;
        };
        match t.mv {
            Move::Call => resolve_call(file, fsa, from, to, &t)?,
            Move::Spawn => {
                let resolved = resolve_spawn(file, &t, ctx, discovered)?;
                fsa.remove_transition(from, to, Move::Spawn, &t.label);
                fsa.add_transition(StateRef::Id(from), StateRef::Id(to), resolved)?;
            }
            _ => unreachable!("resolve_pass only flags Call/Spawn transitions as unresolved"),
        }
    }
    Ok(())
}

/// Runs the algorithm of §4.3 over an already-specialized `base_fsa`:
/// claims the ordinal-suffixed name first, then resolves every `Call`/
/// `Spawn` (descending into any spawned procedure's own `extract_view`
/// before returning), determinizes, and returns `[current_view,
/// ...discovered]`.
fn extract_view(
    file: &File,
    proc_name: &str,
    base_fsa: Fsa,
    ctx: &mut RunContext,
) -> Result<Vec<LocalView>, Error> {
    let span = info_span!("extract_view", procedure = %proc_name);
    let _enter = span.enter();

    let ordinal = ctx.next_ordinal();
    let name = format!("{proc_name} ({ordinal})");

    let mut fsa = base_fsa;
    let mut discovered = Vec::new();
    resolve_pass(file, &mut fsa, ctx, &mut discovered)?;

    let determinized = determinize(&fsa);
    debug!(view = %name, states = determinized.states().len(), "local view extracted");

    let mut views = vec![LocalView {
        name,
        fsa: determinized,
    }];
    views.extend(discovered);
    Ok(views)
}

/// §4.3 step 1: starting from the entry procedure, deep-copy its Scope
/// FSA with no specialization and run the extraction algorithm over it.
pub fn extract_local_views(file: &File, entry: &str) -> Result<Vec<LocalView>, Error> {
    let entry_proc = file
        .procedures
        .get(entry)
        .ok_or_else(|| Error::MissingEntry {
            name: entry.to_string(),
        })?;
    let mut ctx = RunContext::new();
    extract_view(file, entry, entry_proc.scope_fsa.copy(), &mut ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use choreo_ast::{FormalParam, Node, ValueSpec};

    fn ch_type(name: &str) -> Node {
        Node::channel_type(Node::ident(name))
    }

    fn make(elem: &str) -> Node {
        Node::call(Node::ident("make"), vec![ch_type(elem)])
    }

    fn make_buffered(elem: &str, cap: &str) -> Node {
        Node::call(Node::ident("make"), vec![ch_type(elem), Node::ident(cap)])
    }

    // S1 — single send/receive.
    #[test]
    fn s1_single_send_receive_yields_two_local_views() {
        let greeter = Node::procedure(
            "greeter",
            vec![FormalParam {
                name: "c".into(),
                type_expr: Box::new(ch_type("string")),
            }],
            Some(vec![Node::send(Node::ident("c"), Node::ident("\"hi\""))]),
        );
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::assign(vec![Node::ident("c")], vec![make("string")]),
                Node::spawn(Node::ident("greeter"), vec![Node::ident("c")]),
                Node::expr_stmt(Node::recv(Node::ident("c"))),
            ]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![greeter, main]), "s1.go").unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        assert_eq!(views.len(), 2);
        assert!(views[0].name.starts_with("main ("));
        assert!(views.iter().any(|v| v.name.starts_with("greeter (")));
    }

    // S2 — buffered worker pool.
    #[test]
    fn s2_buffered_worker_pool_yields_three_local_views() {
        let worker = Node::procedure(
            "worker",
            vec![
                FormalParam {
                    name: "in".into(),
                    type_expr: Box::new(ch_type("int")),
                },
                FormalParam {
                    name: "out".into(),
                    type_expr: Box::new(ch_type("int")),
                },
            ],
            Some(vec![Node::for_stmt(
                None,
                None,
                None,
                vec![
                    Node::assign(vec![Node::ident("v")], vec![Node::recv(Node::ident("in"))]),
                    Node::send(Node::ident("out"), Node::ident("v")),
                ],
            )]),
        );
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::assign(vec![Node::ident("in")], vec![make_buffered("int", "10")]),
                Node::assign(vec![Node::ident("out")], vec![make_buffered("int", "10")]),
                Node::spawn(Node::ident("worker"), vec![Node::ident("in"), Node::ident("out")]),
                Node::spawn(Node::ident("worker"), vec![Node::ident("in"), Node::ident("out")]),
                Node::for_stmt(
                    None,
                    None,
                    None,
                    vec![
                        Node::send(Node::ident("in"), Node::ident("1")),
                        Node::expr_stmt(Node::recv(Node::ident("out"))),
                    ],
                ),
            ]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![worker, main]), "s2.go").unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        assert_eq!(views.len(), 3);
    }

    // S3 — select with two sources.
    #[test]
    fn s3_select_yields_three_local_views() {
        let resp = Node::procedure(
            "resp",
            vec![FormalParam {
                name: "c".into(),
                type_expr: Box::new(ch_type("int")),
            }],
            Some(vec![Node::send(Node::ident("c"), Node::ident("1"))]),
        );
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::assign(vec![Node::ident("a")], vec![make("int")]),
                Node::assign(vec![Node::ident("b")], vec![make("int")]),
                Node::spawn(Node::ident("resp"), vec![Node::ident("a")]),
                Node::spawn(Node::ident("resp"), vec![Node::ident("b")]),
                Node::select_stmt(vec![
                    Node::comm_clause(Some(Node::expr_stmt(Node::recv(Node::ident("a")))), vec![]),
                    Node::comm_clause(Some(Node::expr_stmt(Node::recv(Node::ident("b")))), vec![]),
                ]),
            ]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![resp, main]), "s3.go").unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        assert_eq!(views.len(), 3);
    }

    // S4 — range over channel.
    #[test]
    fn s4_range_over_spawned_channel_recv_shows_up_in_main_view() {
        let sender = Node::procedure(
            "sender",
            vec![FormalParam {
                name: "c".into(),
                type_expr: Box::new(ch_type("int")),
            }],
            Some(vec![Node::for_stmt(
                None,
                None,
                None,
                vec![Node::send(Node::ident("c"), Node::ident("1"))],
            )]),
        );
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::assign(vec![Node::ident("c")], vec![make("int")]),
                Node::spawn(Node::ident("sender"), vec![Node::ident("c")]),
                Node::for_range_stmt(None, None, Node::ident("c"), vec![]),
            ]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![sender, main]), "s4.go").unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        assert_eq!(views.len(), 2);
        let main_view = views.iter().find(|v| v.name.starts_with("main (")).unwrap();
        let mut recvs = Vec::new();
        main_view
            .fsa
            .for_each_transition(|_, _, t| {
                if t.mv == Move::Recv {
                    recvs.push(t.label.to_string());
                }
            });
        assert!(recvs.contains(&"c".to_string()));
    }

    // S5 — call inlining with formal→actual.
    #[test]
    fn s5_call_inlining_renames_formal_to_actual() {
        let g = Node::procedure(
            "g",
            vec![],
            Some(vec![Node::send(Node::ident("errc"), Node::ident("1"))]),
        );
        let f = Node::procedure(
            "f",
            vec![FormalParam {
                name: "channel".into(),
                type_expr: Box::new(ch_type("int")),
            }],
            Some(vec![
                Node::expr_stmt(Node::recv(Node::ident("channel"))),
                Node::expr_stmt(Node::call(Node::ident("g"), vec![])),
            ]),
        );
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::assign(vec![Node::ident("ch")], vec![make("int")]),
                Node::expr_stmt(Node::call(Node::ident("f"), vec![Node::ident("ch")])),
            ]),
        );
        let errc_decl = Node::decl(vec![ValueSpec {
            names: vec!["errc".into()],
            type_expr: Some(Box::new(ch_type("string"))),
            values: vec![],
        }]);
        let file = choreo_build::build_file(
            &Node::program_file(vec![errc_decl, g, f, main]),
            "s5.go",
        )
        .unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        // f and g are inlined, not spawned: no separate local views appear
        assert_eq!(views.len(), 1);
        let mut labels = Vec::new();
        views[0]
            .fsa
            .for_each_transition(|_, _, t| labels.push((t.mv, t.label.to_string())));
        assert!(labels.contains(&(Move::Recv, "ch".to_string())));
        assert!(labels.contains(&(Move::Send, "errc".to_string())));
        assert!(!labels.iter().any(|(mv, label)| *mv == Move::Recv && label == "channel"));
    }

    // S6 — unresolved call vs spawn.
    #[test]
    fn s6_unresolved_spawn_fails_before_any_view_is_produced() {
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::expr_stmt(Node::call(Node::ident("externalLog"), vec![])),
                Node::spawn(Node::ident("ghost"), vec![]),
            ]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![main]), "s6.go").unwrap();
        let err = extract_local_views(&file, "main").unwrap_err();
        assert!(matches!(err, Error::UnresolvedSpawn { target } if target == "ghost"));
    }

    #[test]
    fn unresolved_call_alone_is_recovered_as_epsilon() {
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![Node::expr_stmt(Node::call(Node::ident("externalLog"), vec![]))]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![main]), "s6b.go").unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        assert_eq!(views.len(), 1);
        let mut has_call = false;
        views[0].fsa.for_each_transition(|_, _, t| {
            if t.mv == Move::Call {
                has_call = true;
            }
        });
        assert!(!has_call);
    }

    #[test]
    fn arity_mismatch_on_call_site_fails() {
        let f = Node::procedure(
            "f",
            vec![
                FormalParam {
                    name: "a".into(),
                    type_expr: Box::new(ch_type("int")),
                },
                FormalParam {
                    name: "b".into(),
                    type_expr: Box::new(ch_type("int")),
                },
            ],
            Some(vec![]),
        );
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![
                Node::assign(vec![Node::ident("x")], vec![make("int")]),
                Node::expr_stmt(Node::call(Node::ident("f"), vec![Node::ident("x")])),
            ]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![f, main]), "arity.go").unwrap();
        let err = extract_local_views(&file, "main").unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }

    #[test]
    fn missing_entry_procedure_fails() {
        let file = choreo_build::build_file(&Node::program_file(vec![]), "empty.go").unwrap();
        let err = extract_local_views(&file, "main").unwrap_err();
        assert!(matches!(err, Error::MissingEntry { .. }));
    }

    #[test]
    fn anonymous_spawn_is_opaque_and_does_not_fail_or_add_a_view() {
        let main = Node::procedure(
            "main",
            vec![],
            Some(vec![Node::spawn(
                Node::procedure_literal(vec![], vec![Node::send(Node::ident("c"), Node::ident("1"))]),
                vec![],
            )]),
        );
        let file = choreo_build::build_file(&Node::program_file(vec![main]), "anon.go").unwrap();
        let views = extract_local_views(&file, "main").unwrap();
        assert_eq!(views.len(), 1);
    }
}
