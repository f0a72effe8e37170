//! The stack-machine interpreter that steps a compiled program: one host
//! invocation in, one `Outcome` out.

mod error;
mod eval;
mod frame;
mod outcome;
mod tracer;

pub use error::{RuntimeError, encode_error};
pub use eval::{DeclarativeEvaluator, EvalError, EvalOutcome, InlineEvaluator, is_truthy};
pub use frame::Frame;
pub use outcome::Outcome;
pub use tracer::{NoopTracer, PrintTracer, Tracer};

use composer_core::Json;
use composer_fsm::{Instruction, Program};
use indexmap::IndexMap;

/// The conductor's full continuation: where it is, and its frame stack.
/// JSON-serializable by construction, so it can round-trip through a host's
/// own persistence between suspend and resume.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Resume {
    pub state: Option<usize>,
    pub stack: Vec<Frame>,
}

struct RuntimeState {
    params: Json,
    state: Option<usize>,
    stack: Vec<Frame>,
}

/// Steps `program` once from `input`, returning either a terminal result
/// or a suspension request. `input` is the host invocation's raw JSON
/// object, optionally carrying a `$resume` field from a prior suspension.
pub fn step(
    program: &Program,
    input: Json,
    evaluator: &dyn InlineEvaluator,
    tracer: &mut dyn Tracer,
) -> Result<Outcome, RuntimeError> {
    let mut rt = restore(input)?;
    inspect(&mut rt, tracer);

    while let Some(current) = rt.state {
        let ins = program
            .as_slice()
            .get(current)
            .ok_or_else(|| RuntimeError::InternalError(format!("state {current} out of bounds")))?;
        tracer.trace_step(current, ins);

        rt.state = ins.next().map(|offset| (current as i64 + offset as i64) as usize);

        match ins {
            Instruction::Pass(_) => {
                inspect(&mut rt, tracer);
            }
            Instruction::Action(a) => {
                tracer.trace_suspend(&a.name, &rt.params);
                return Ok(Outcome::Suspend {
                    action: a.name.clone(),
                    params: rt.params,
                    resume_state: rt.state,
                    resume_stack: serde_json::to_value(&rt.stack)
                        .map_err(|e| RuntimeError::InternalError(e.to_string()))?,
                });
            }
            Instruction::Literal(lit) => {
                rt.params = lit.value.clone();
                inspect(&mut rt, tracer);
            }
            Instruction::Function(f) => {
                run_function(&mut rt, &f.exec.code, evaluator)?;
                inspect(&mut rt, tracer);
            }
            Instruction::Choice(c) => {
                let truthy = rt.params.get("value").map(is_truthy).unwrap_or(false);
                let offset = if truthy { c.then } else { c.else_ };
                rt.state = Some((current as i64 + offset as i64) as usize);
            }
            Instruction::Try(t) => {
                let target = (current as i64 + t.catch as i64) as usize;
                rt.stack.push(Frame::Catch { catch: target });
            }
            Instruction::Let(l) => {
                rt.stack.push(Frame::Let {
                    declarations: l.declarations.clone(),
                });
            }
            Instruction::Exit(_) => {
                if rt.stack.pop().is_none() {
                    return Err(RuntimeError::InternalError("exit on empty stack".to_string()));
                }
            }
            Instruction::Push(p) => {
                let snapshot = match &p.field {
                    Some(field) => rt.params.get(field).cloned().unwrap_or(Json::Null),
                    None => rt.params.clone(),
                };
                rt.stack.push(Frame::Save { params: snapshot });
            }
            Instruction::Pop(p) => {
                let Some(Frame::Save { params: saved }) = rt.stack.pop() else {
                    return Err(RuntimeError::InternalError("pop on a non-save frame or empty stack".to_string()));
                };
                rt.params = if p.collect {
                    serde_json::json!({ "params": saved, "result": rt.params })
                } else {
                    saved
                };
            }
        }
    }

    tracer.trace_terminal(&rt.params);
    Ok(terminal_outcome(rt.params))
}

fn terminal_outcome(params: Json) -> Outcome {
    match params.get("error") {
        Some(_) => Outcome::Failure { error: params },
        None => Outcome::Success { params },
    }
}

fn restore(input: Json) -> Result<RuntimeState, RuntimeError> {
    let resume = input.get("$resume").cloned();
    let mut params = input;
    if let Json::Object(map) = &mut params {
        map.remove("$resume");
    }

    match resume {
        None => Ok(RuntimeState {
            params,
            state: Some(0),
            stack: Vec::new(),
        }),
        Some(token) => {
            let resume: Resume = serde_json::from_value(token)
                .map_err(|e| RuntimeError::BadResume(e.to_string()))?;
            Ok(RuntimeState {
                params,
                state: resume.state,
                stack: resume.stack,
            })
        }
    }
}

/// If params carries an `error` field, truncate to just that field and
/// unwind to the nearest catch frame (or terminate if none exists).
/// Non-object params never carry an error, so they pass through
/// untouched — e.g. a bare `literal(42)` terminates as `{params: 42}`,
/// not wrapped in any intermediate shape.
fn inspect(rt: &mut RuntimeState, tracer: &mut dyn Tracer) {
    let Json::Object(map) = &rt.params else {
        return;
    };
    let Some(error) = map.get("error").cloned() else {
        return;
    };

    rt.params = serde_json::json!({ "error": error });

    let target = rt
        .stack
        .iter()
        .rposition(|frame| matches!(frame, Frame::Catch { .. }));

    match target {
        Some(index) => {
            let Frame::Catch { catch } = rt.stack[index] else {
                unreachable!()
            };
            rt.stack.truncate(index);
            rt.state = Some(catch);
            tracer.trace_unwind(Some(catch));
        }
        None => {
            rt.state = None;
            tracer.trace_unwind(None);
        }
    }
}

/// Collects every let-bound name visible on the stack, bottom-up so
/// inner frames shadow outer ones once flattened.
fn collect_env(stack: &[Frame]) -> IndexMap<String, Json> {
    let mut env = IndexMap::new();
    for frame in stack {
        if let Frame::Let { declarations } = frame {
            for (k, v) in declarations {
                env.insert(k.clone(), v.clone());
            }
        }
    }
    env
}

/// Writes each name in `env` back to the topmost `Let` frame that
/// declares it, leaving names nothing declares untouched.
fn write_back_env(stack: &mut [Frame], env: IndexMap<String, Json>) {
    for (name, value) in env {
        for frame in stack.iter_mut().rev() {
            if let Frame::Let { declarations } = frame {
                if let Some(slot) = declarations.get_mut(&name) {
                    *slot = value;
                    break;
                }
            }
        }
    }
}

fn run_function(rt: &mut RuntimeState, code: &str, evaluator: &dyn InlineEvaluator) -> Result<(), RuntimeError> {
    let env = collect_env(&rt.stack);
    match evaluator.evaluate(code, &rt.params, &env) {
        Ok(EvalOutcome { value, env }) => {
            if let Some(v) = value {
                rt.params = v;
            }
            write_back_env(&mut rt.stack, env);
        }
        Err(EvalError(thrown)) => {
            rt.params = serde_json::json!({ "error": thrown });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_compiler::compile;
    use composer_fsm::Program;
    use indexmap::IndexMap;

    fn prog(node: &composer_compiler::Node) -> Program {
        let p = compile(node, "");
        p.validate().expect("compiled program must validate");
        p
    }

    #[test]
    fn sequence_plus_literal_and_function() {
        let comp = composer_compiler::seq(vec![
            composer_compiler::literal(serde_json::json!(3)),
            composer_compiler::function("x => ({value: x.value+1})"),
        ])
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success {
            params: serde_json::json!({"value": 4.0}),
        });
    }

    #[test]
    fn if_branches_on_wrapped_value() {
        let comp = composer_compiler::if_(
            composer_compiler::function("p => ({value: p.n>0})"),
            composer_compiler::literal(serde_json::json!("pos")),
            composer_compiler::literal(serde_json::json!("neg")),
            false,
        )
        .unwrap();
        let program = prog(&comp.node);

        let pos = step(&program, serde_json::json!({"n": 5}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(pos, Outcome::Success { params: serde_json::json!("pos") });

        let neg = step(&program, serde_json::json!({"n": -1}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(neg, Outcome::Success { params: serde_json::json!("neg") });
    }

    #[test]
    fn try_catches_thrown_error() {
        let comp = composer_compiler::try_(
            composer_compiler::function("p => ({error:'x'})"),
            composer_compiler::function("p => ({value:'caught'})"),
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success {
            params: serde_json::json!({"value": "caught"}),
        });
    }

    #[test]
    fn try_falls_through_exit_without_running_handler_on_success() {
        let comp = composer_compiler::try_(
            composer_compiler::literal(serde_json::json!("ok")),
            composer_compiler::literal(serde_json::json!("handled")),
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success { params: serde_json::json!("ok") });
    }

    #[test]
    fn finally_runs_finalizer_on_success_too() {
        let comp = composer_compiler::finally(
            composer_compiler::literal(serde_json::json!("ok")),
            composer_compiler::function("() => ({value: 'finalized'})"),
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success {
            params: serde_json::json!({"value": "finalized"}),
        });
    }

    #[test]
    fn finally_runs_finalizer_on_error_and_reraises() {
        let comp = composer_compiler::finally(
            composer_compiler::function("p => ({error:'x'})"),
            composer_compiler::function("p => p"),
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Failure { error: serde_json::json!({"error": "x"}) });
    }

    #[test]
    fn retain_with_catch_preserves_input_alongside_error_result() {
        let comp = composer_compiler::retain(
            composer_compiler::function("p => ({error:'bang'})"),
            None,
            true,
            None,
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({"k": 1}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success {
            params: serde_json::json!({"params": {"k": 1}, "result": {"error": "bang"}}),
        });
    }

    #[test]
    fn retain_with_catch_on_a_non_throwing_body_still_merges_result() {
        let comp = composer_compiler::retain(
            composer_compiler::function("p => ({value: p.n+1})"),
            None,
            true,
            None,
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({"n": 1}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success {
            params: serde_json::json!({"params": {"n": 1}, "result": {"value": 2.0}}),
        });
    }

    #[test]
    fn retry_runs_body_exactly_three_times_then_returns_last_error() {
        let comp = composer_compiler::retry(2, vec![composer_compiler::function("() => ({error:'no'})")]).unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Failure { error: serde_json::json!({"error": "no"}) });
    }

    #[test]
    fn retry_stops_as_soon_as_the_body_succeeds() {
        // `tries` is a let-bound counter separate from retry's own
        // internal `count`: it decrements once per attempt, failing the
        // first time and succeeding the second. A working
        // `retain{catch:true}` merge is what lets the dowhile condition
        // see `result.error` turn undefined and stop looping instead of
        // running a third time.
        let body = composer_compiler::function("(tries-- > 0 && {error: 'no'}) || {value: 'done'}");
        let mut decls = IndexMap::new();
        decls.insert("tries".to_string(), serde_json::json!(1));
        let comp = composer_compiler::let_(decls, composer_compiler::retry(2, vec![body]).unwrap()).unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success { params: serde_json::json!({"value": "done"}) });
    }

    #[test]
    fn while_loop_runs_to_completion_through_the_step_loop() {
        let comp = composer_compiler::while_(
            composer_compiler::function("p => ({value: p.n > 0, n: p.n})"),
            composer_compiler::function("p => ({n: p.n - 1})"),
            false,
        )
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({"n": 3}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success { params: serde_json::json!({"n": 0.0}) });
    }

    #[test]
    fn if_as_a_non_tail_sequence_element_falls_through_to_its_sibling() {
        let comp = composer_compiler::seq(vec![
            composer_compiler::if_(
                composer_compiler::literal(serde_json::json!({"value": true})),
                composer_compiler::literal(serde_json::json!("branch")),
                composer_compiler::literal(serde_json::json!("branch")),
                false,
            )
            .unwrap(),
            composer_compiler::literal(serde_json::json!("after")),
        ])
        .unwrap();
        let program = prog(&comp.node);
        let outcome = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(outcome, Outcome::Success { params: serde_json::json!("after") });
    }

    #[test]
    fn action_suspends_and_resumes_to_a_literal() {
        let comp = composer_compiler::seq(vec![
            composer_compiler::action("/_/echo").unwrap(),
            composer_compiler::literal(serde_json::json!(42)),
        ])
        .unwrap();
        let program = prog(&comp.node);

        let first = step(&program, serde_json::json!({}), &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        let Outcome::Suspend { action, resume_state, resume_stack, .. } = first else {
            panic!("expected a suspension");
        };
        assert_eq!(action, "/_/echo");

        let resumed_input = serde_json::json!({
            "$resume": {"state": resume_state, "stack": resume_stack},
        });
        let second = step(&program, resumed_input, &DeclarativeEvaluator, &mut NoopTracer).unwrap();
        assert_eq!(second, Outcome::Success { params: serde_json::json!(42) });
    }
}
