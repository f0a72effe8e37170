//! Lowering from the combinator AST to a flat FSM program (component C).
//!
//! Every instruction this module emits carries a relative jump offset
//! (never an absolute index), matching `composer_fsm::Program::chain`'s
//! pure-concatenation contract: a compiled sub-program's internal offsets
//! are never rewritten once built, only concatenated or, at the two or
//! three new instructions a construct introduces itself, computed by hand
//! from the already-known lengths of its compiled children.

use composer_core::Json;
use composer_fsm::{
    ActionInstr, Choice, ExitInstr, FunctionInstr, Instruction, Literal, LetInstr, PassInstr,
    PopInstr, Program, PushInstr, TryInstr,
};
use indexmap::IndexMap;

use crate::ast::{ConditionalOptions, Node, RetainOptions};

/// Compile a node tree into a flat FSM program. `path` is the diagnostic
/// path of `node` itself; children get `path` extended with a suffix
/// (`.test`, `.0`, `.body`, ...).
pub fn compile(node: &Node, path: &str) -> Program {
    match node {
        Node::Action { name } => Program::single(Instruction::Action(ActionInstr {
            name: name.clone(),
            path: path.to_string(),
            next: None,
        })),
        Node::Function { exec } => Program::single(Instruction::Function(FunctionInstr {
            exec: exec.clone(),
            path: path.to_string(),
            next: None,
        })),
        Node::Literal { value } => Program::single(Instruction::Literal(Literal {
            value: value.clone(),
            path: path.to_string(),
            next: None,
        })),
        Node::Sequence { children } => compile_sequence(children, path),
        Node::If {
            test,
            consequent,
            alternate,
            options,
        } => compile_if(test, consequent, alternate, *options, path),
        Node::While { test, body, options } => {
            let test_prog = compile(test, &format!("{path}.test"));
            let body_prog = compile(body, &format!("{path}.body"));
            assemble_while(test_prog, body_prog, options.nosave, path)
        }
        Node::DoWhile { body, test, options } => {
            let first_pass = compile(body, &format!("{path}.body"));
            let test_prog = compile(test, &format!("{path}.test"));
            let loop_body = compile(body, &format!("{path}.body"));
            first_pass.chain(assemble_while(test_prog, loop_body, options.nosave, path))
        }
        Node::Try { body, handler } => compile_try(body, handler, path),
        Node::Finally { body, finalizer } => compile_finally(body, finalizer, path),
        Node::Let { declarations, body } => compile_let(declarations, body, path),
        Node::Retain { body, options } => compile_retain(body, options, path),
    }
}

fn path_pass(path: &str) -> Instruction {
    Instruction::Pass(PassInstr {
        path: path.to_string(),
        next: None,
    })
}

fn compile_sequence(children: &[Node], path: &str) -> Program {
    if children.is_empty() {
        return Program::single(path_pass(path));
    }
    let mut iter = children.iter().enumerate();
    let (i0, first) = iter.next().expect("non-empty checked above");
    let mut program = compile(first, &format!("{path}.{i0}"));
    for (i, child) in iter {
        program = program.chain(compile(child, &format!("{path}.{i}")));
    }
    program
}

fn compile_let(declarations: &IndexMap<String, Json>, body: &Node, path: &str) -> Program {
    let enter = Instruction::Let(LetInstr {
        declarations: declarations.clone(),
        path: path.to_string(),
        next: None,
    });
    let exit = Instruction::Exit(ExitInstr {
        path: path.to_string(),
        next: None,
    });
    Program::single(enter)
        .chain(compile(body, &format!("{path}.body")))
        .chain(Program::single(exit))
}

/// Patch the `next` of a program's final instruction to a hand-computed
/// offset (relative to that instruction's own position).
fn patch_tail(program: &mut Program, offset: i32) {
    if let Some(last) = program.0.last_mut() {
        last.set_next(offset);
    }
}

/// Shared by `if`/`while`: when `nosave` is false, branches run against
/// the params that were current before the test ran, not the test's own
/// result. A `push`/`pop` pair around the test achieves that; `nosave`
/// skips it and lets the test's output flow straight into the branch.
fn guard_len(nosave: bool) -> i32 {
    if nosave { 0 } else { 1 }
}

fn compile_if(test: &Node, consequent: &Node, alternate: &Node, options: ConditionalOptions, path: &str) -> Program {
    let mut test_prog = compile(test, &format!("{path}.test"));
    let mut consequent_prog = compile(consequent, &format!("{path}.consequent"));
    let mut alternate_prog = compile(alternate, &format!("{path}.alternate"));

    // The test always falls straight through onto the `Choice` that
    // follows it; only `Choice` itself ever branches on the test's result.
    patch_tail(&mut test_prog, 1);

    let p = guard_len(options.nosave);
    let consequent_block_len = p + consequent_prog.len() as i32;
    // The alternate block carries a trailing `pass` as a stable join point,
    // matching the same sentinel `while`'s exit branch uses.
    let alternate_block_len = p + alternate_prog.len() as i32 + 1;

    patch_tail(&mut consequent_prog, alternate_block_len);
    // The alternate falls through onto that same trailing `pass`.
    patch_tail(&mut alternate_prog, 1);

    let mut out = Vec::new();
    if !options.nosave {
        out.push(Instruction::Push(PushInstr {
            field: None,
            path: path.to_string(),
            next: Some(1),
        }));
    }
    out.extend(test_prog.into_vec());
    out.push(Instruction::Choice(Choice {
        then: 1,
        else_: consequent_block_len + 1,
        path: path.to_string(),
    }));
    if !options.nosave {
        out.push(Instruction::Pop(PopInstr {
            collect: false,
            path: path.to_string(),
            next: Some(1),
        }));
    }
    out.extend(consequent_prog.into_vec());
    if !options.nosave {
        out.push(Instruction::Pop(PopInstr {
            collect: false,
            path: path.to_string(),
            next: Some(1),
        }));
    }
    out.extend(alternate_prog.into_vec());
    out.push(path_pass(path));
    Program::new(out)
}

/// Build `test_prog` / `body_prog` into a `while(test){body}` loop,
/// optionally wrapped in a push/pop guard so the test's own side effects
/// on `params` don't leak into the next body iteration. The loop exits
/// onto a trailing `pass` join point.
fn assemble_while(mut test_prog: Program, mut body_prog: Program, nosave: bool, path: &str) -> Program {
    let p = guard_len(nosave);
    let t = test_prog.len() as i32;
    let b = body_prog.len() as i32;

    // The test always falls straight through onto the `Choice` that
    // follows it.
    patch_tail(&mut test_prog, 1);
    patch_tail(&mut body_prog, -(2 * p + t + b));

    let mut out = Vec::new();
    if !nosave {
        out.push(Instruction::Push(PushInstr {
            field: None,
            path: path.to_string(),
            next: Some(1),
        }));
    }
    out.extend(test_prog.into_vec());
    out.push(Instruction::Choice(Choice {
        then: 1,
        else_: p + b + 1,
        path: path.to_string(),
    }));
    if !nosave {
        out.push(Instruction::Pop(PopInstr {
            collect: false,
            path: path.to_string(),
            next: Some(1),
        }));
    }
    out.extend(body_prog.into_vec());
    // The exit path never ran the loop body's own pop, so it needs its
    // own: the guard pushed once per test, and every test that returns
    // false must still be balanced by a matching pop before the loop's
    // join point (testable property #3).
    if !nosave {
        out.push(Instruction::Pop(PopInstr {
            collect: false,
            path: path.to_string(),
            next: Some(1),
        }));
    }
    out.push(path_pass(path));
    Program::new(out)
}

/// `try`/`finally` share a shape: a `Try` guard whose catch target is the
/// first instruction after the body (the start of `handler`/`finalizer`),
/// reached on the failure path by the catch jump. They differ in what the
/// success path's `Exit` does: `try`'s handler only runs on error, so
/// `Exit` must skip over it onto the trailing `pass`; `finally`'s
/// finalizer runs on both paths, so `Exit` falls through into it.
fn compile_try(body: &Node, handler: &Node, path: &str) -> Program {
    let body_prog = compile(body, &format!("{path}.body"));
    let handler_prog = compile(handler, &format!("{path}.handler"));
    let skip_handler = handler_prog.len() as i32 + 1;
    let mut out = assemble_guarded(body_prog, handler_prog, skip_handler, path).into_vec();
    out.push(path_pass(path));
    Program::new(out)
}

fn compile_finally(body: &Node, finalizer: &Node, path: &str) -> Program {
    let body_prog = compile(body, &format!("{path}.body"));
    let finalizer_prog = compile(finalizer, &format!("{path}.finalizer"));
    assemble_guarded(body_prog, finalizer_prog, 1, path)
}

fn assemble_guarded(mut body_prog: Program, landing_prog: Program, exit_next: i32, path: &str) -> Program {
    let b = body_prog.len() as i32;
    let mut out = Vec::with_capacity(body_prog.len() + landing_prog.len() + 2);
    out.push(Instruction::Try(TryInstr {
        catch: b + 2,
        path: path.to_string(),
        next: Some(1),
    }));
    // A non-throwing body must fall through onto `Exit`, not terminate.
    patch_tail(&mut body_prog, 1);
    out.extend(body_prog.into_vec());
    out.push(Instruction::Exit(ExitInstr {
        path: path.to_string(),
        next: Some(exit_next),
    }));
    out.extend(landing_prog.into_vec());
    Program::new(out)
}

/// `retain` is a push/pop pair around `body`; `catch: true` additionally
/// wraps `body` in a `Try` whose (implicit) handler is the pop itself, so
/// a thrown error lands at the same merge point a successful result
/// would.
fn compile_retain(body: &Node, options: &RetainOptions, path: &str) -> Program {
    let mut body_prog = compile(body, &format!("{path}.body"));
    let filter_prog = options.filter.as_ref().map(|f| compile(f, &format!("{path}.filter")));

    let mut out = Vec::new();
    out.push(Instruction::Push(PushInstr {
        field: options.field.clone(),
        path: path.to_string(),
        next: Some(1),
    }));

    if options.catch {
        let b = body_prog.len() as i32;
        out.push(Instruction::Try(TryInstr {
            catch: b + 2,
            path: path.to_string(),
            next: Some(1),
        }));
        // A non-throwing body must fall through onto `Exit`, not terminate.
        patch_tail(&mut body_prog, 1);
        out.extend(body_prog.into_vec());
        out.push(Instruction::Exit(ExitInstr {
            path: path.to_string(),
            next: Some(1),
        }));
    } else {
        out.extend(body_prog.into_vec());
    }

    out.push(Instruction::Pop(PopInstr {
        collect: true,
        path: path.to_string(),
        next: filter_prog.as_ref().map(|_| 1),
    }));

    if let Some(filter_prog) = filter_prog {
        out.extend(filter_prog.into_vec());
    }
    Program::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{action, function, if_, let_, literal, retain, sequence, try_, while_};

    fn validated(program: Program) -> Program {
        program.validate().expect("compiled program must validate");
        program
    }

    #[test]
    fn empty_sequence_compiles_to_pass() {
        let comp = sequence(Vec::new()).unwrap();
        let program = validated(compile(&comp.node, ""));
        assert_eq!(program.len(), 1);
        assert!(matches!(program.as_slice()[0], Instruction::Pass(_)));
    }

    #[test]
    fn sequence_chains_two_actions() {
        let comp = sequence(vec![action("/_/a").unwrap(), action("/_/b").unwrap()]).unwrap();
        let program = validated(compile(&comp.node, ""));
        assert_eq!(program.len(), 2);
        assert_eq!(program.as_slice()[0].next(), Some(1));
        assert_eq!(program.as_slice()[1].next(), None);
    }

    #[test]
    fn if_compiles_with_push_pop_guard() {
        let comp = if_(
            function("params.ok"),
            action("/_/yes").unwrap(),
            action("/_/no").unwrap(),
            false,
        )
        .unwrap();
        let program = validated(compile(&comp.node, ""));
        assert!(matches!(program.as_slice()[0], Instruction::Push(_)));
        assert!(program.as_slice().iter().any(|i| matches!(i, Instruction::Choice(_))));
    }

    #[test]
    fn if_nosave_skips_guard() {
        let comp = if_(
            function("params.ok"),
            action("/_/yes").unwrap(),
            action("/_/no").unwrap(),
            true,
        )
        .unwrap();
        let program = validated(compile(&comp.node, ""));
        assert!(program.as_slice().iter().all(|i| !matches!(i, Instruction::Push(_) | Instruction::Pop(_))));
    }

    #[test]
    fn while_back_jump_lands_on_first_instruction() {
        let comp = while_(function("params.count > 0"), action("/_/step").unwrap(), false).unwrap();
        let program = validated(compile(&comp.node, ""));
        let last = program.as_slice().last().unwrap();
        let offset = last.next().expect("loop body falls back to the test");
        assert!(offset < 0);
    }

    #[test]
    fn try_catch_lands_handler_on_exit_skip() {
        let comp = try_(action("/_/risky").unwrap(), action("/_/recover").unwrap()).unwrap();
        let program = validated(compile(&comp.node, ""));
        let Instruction::Try(t) = &program.as_slice()[0] else {
            panic!("expected leading Try instruction")
        };
        let handler_index = t.catch as usize;
        match &program.as_slice()[handler_index] {
            Instruction::Action(a) => assert_eq!(a.name, "/_/recover"),
            other => panic!("expected handler action at catch target, got {other:?}"),
        }
    }

    #[test]
    fn retain_wraps_body_in_push_pop() {
        let comp = retain(action("/_/echo").unwrap(), None, false, None).unwrap();
        let program = validated(compile(&comp.node, ""));
        assert!(matches!(program.as_slice()[0], Instruction::Push(_)));
        assert!(matches!(program.as_slice().last().unwrap(), Instruction::Pop(_)));
    }

    #[test]
    fn let_wraps_body_in_enter_exit() {
        let mut decls = IndexMap::new();
        decls.insert("x".to_string(), serde_json::json!(1));
        let comp = let_(decls, literal(serde_json::json!(null))).unwrap();
        let program = validated(compile(&comp.node, ""));
        assert!(matches!(program.as_slice()[0], Instruction::Let(_)));
        assert!(matches!(program.as_slice().last().unwrap(), Instruction::Exit(_)));
    }
}
