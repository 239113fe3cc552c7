//! Tests for `async def`, `await`, and `asyncio.gather`.

mod common;

use common::{complete, expect_os_call, resume, start, ModuleBuilder};
use pretty_assertions::assert_eq;
use torpor::{BinaryOpKind, Object, Opcode, OsFunction};

/// Registers `async def constant(): return '<value>'`.
fn add_constant_coroutine(m: &mut ModuleBuilder, name: &str, value: &str) -> torpor::FunctionId {
    let mut body = torpor::CodeBuilder::new();
    let value_id = m.pb.intern_str(value);
    let index = body.const_str(value_id);
    body.emit_u16(Opcode::LoadConst, index);
    body.emit(Opcode::Return);
    m.pb.add_function(name, &[], vec![], body.build(), true)
}

#[test]
fn gather_returns_results_in_argument_order() {
    // await asyncio.gather(slow(), fast())
    let mut m = ModuleBuilder::new();
    let slow = add_constant_coroutine(&mut m, "slow", "slow");
    let fast = add_constant_coroutine(&mut m, "fast", "fast");
    m.load_global("asyncio");
    m.attr("gather");
    let slow_const = m.cb.const_function(slow);
    m.cb.emit_u16(Opcode::LoadConst, slow_const);
    m.call(0);
    let fast_const = m.cb.const_function(fast);
    m.cb.emit_u16(Opcode::LoadConst, fast_const);
    m.call(0);
    m.call(2);
    m.cb.emit(Opcode::Await);
    m.ret();

    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![Object::String("slow".to_owned()), Object::String("fast".to_owned())])
    );
}

#[test]
fn empty_gather_returns_empty_list() {
    // await asyncio.gather()
    let mut m = ModuleBuilder::new();
    m.load_global("asyncio");
    m.attr("gather");
    m.call(0);
    m.cb.emit(Opcode::Await);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::List(vec![]));
}

#[test]
fn await_coroutine_directly() {
    // async def bump(x): return x + 1
    // await bump(41)
    let mut m = ModuleBuilder::new();
    let mut body = torpor::CodeBuilder::new();
    let x_id = m.pb.intern_str("x");
    let x_slot = body.add_local(x_id);
    body.emit_u16(Opcode::LoadLocal, x_slot);
    let one = body.const_int(1);
    body.emit_u16(Opcode::LoadConst, one);
    body.emit_binary(BinaryOpKind::Add);
    body.emit(Opcode::Return);
    let bump = m.pb.add_function("bump", &[x_id], vec![], body.build(), true);

    let bump_const = m.cb.const_function(bump);
    m.cb.emit_u16(Opcode::LoadConst, bump_const);
    m.load_int(41);
    m.call(1);
    m.cb.emit(Opcode::Await);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(42));
}

#[test]
fn calling_async_function_does_not_execute_it() {
    // bump(1) without await -> a coroutine object, not 2.
    let mut m = ModuleBuilder::new();
    let mut body = torpor::CodeBuilder::new();
    let x_id = m.pb.intern_str("x");
    let x_slot = body.add_local(x_id);
    body.emit_u16(Opcode::LoadLocal, x_slot);
    body.emit(Opcode::Return);
    let bump = m.pb.add_function("bump", &[x_id], vec![], body.build(), true);
    let bump_const = m.cb.const_function(bump);
    m.cb.emit_u16(Opcode::LoadConst, bump_const);
    m.load_int(1);
    m.call(1);
    m.ret();
    match complete(start(m.finish())) {
        Object::Repr(repr) => assert!(repr.starts_with("<coroutine object bump at 0x"), "got {repr}"),
        other => panic!("expected coroutine repr, got {other:?}"),
    }
}

#[test]
fn host_calls_interleave_round_robin_across_tasks() {
    // async def worker(a, b):
    //     os.getenv(a)
    //     os.getenv(b)
    //     return b
    // await asyncio.gather(worker('a1', 'a2'), worker('b1', 'b2'))
    let mut m = ModuleBuilder::new();
    let os_slot = m.global("os");
    let getenv_id = m.pb.intern_str("getenv");
    let getenv_operand = u16::try_from(getenv_id.index()).unwrap();

    let a_id = m.pb.intern_str("a");
    let b_id = m.pb.intern_str("b");
    let mut body = torpor::CodeBuilder::new();
    let a_slot = body.add_local(a_id);
    let b_slot = body.add_local(b_id);
    for slot in [a_slot, b_slot] {
        body.emit_u16(Opcode::LoadGlobal, os_slot);
        body.emit_u16(Opcode::LoadAttr, getenv_operand);
        body.emit_u16(Opcode::LoadLocal, slot);
        body.emit_u8(Opcode::CallFunction, 1);
        body.emit(Opcode::PopTop);
    }
    body.emit_u16(Opcode::LoadLocal, b_slot);
    body.emit(Opcode::Return);
    let worker = m.pb.add_function("worker", &[a_id, b_id], vec![], body.build(), true);

    m.load_global("asyncio");
    m.attr("gather");
    let worker_const = m.cb.const_function(worker);
    m.cb.emit_u16(Opcode::LoadConst, worker_const);
    m.load_str("a1");
    m.load_str("a2");
    m.call(2);
    m.cb.emit_u16(Opcode::LoadConst, worker_const);
    m.load_str("b1");
    m.load_str("b2");
    m.call(2);
    m.call(2);
    m.cb.emit(Opcode::Await);
    m.ret();

    let mut observed = Vec::new();
    let mut progress = start(m.finish());
    let result = loop {
        match progress {
            p @ torpor::RunProgress::OsCall { .. } => {
                let (function, args, state) = expect_os_call(p);
                assert_eq!(function, OsFunction::Getenv);
                let Object::String(key) = &args[0] else {
                    panic!("expected string key, got {:?}", args[0]);
                };
                observed.push(key.clone());
                progress = resume(state, Object::String(format!("val:{key}")));
            }
            done => break complete(done),
        }
    };

    // Round-robin in registration order: each suspension rotates the queue.
    assert_eq!(observed, vec!["a1", "b1", "a2", "b2"]);
    // Results stay in argument order regardless of completion order.
    assert_eq!(
        result,
        Object::List(vec![Object::String("a2".to_owned()), Object::String("b2".to_owned())])
    );
}

#[test]
fn task_exception_propagates_to_awaiter() {
    // async def ok(): return 'ok'
    // async def boom(): raise ValueError('bad')
    // try:
    //     await asyncio.gather(ok(), boom())
    // except ValueError:
    //     'caught'
    let mut m = ModuleBuilder::new();
    let ok = add_constant_coroutine(&mut m, "ok", "ok");

    let value_error_slot = m.global("ValueError");
    let mut body = torpor::CodeBuilder::new();
    body.emit_u16(Opcode::LoadGlobal, value_error_slot);
    let bad_id = m.pb.intern_str("bad");
    let bad_const = body.const_str(bad_id);
    body.emit_u16(Opcode::LoadConst, bad_const);
    body.emit_u8(Opcode::CallFunction, 1);
    body.emit_u8(Opcode::Raise, 1);
    let boom = m.pb.add_function("boom", &[], vec![], body.build(), true);

    let try_start = m.cb.here();
    m.load_global("asyncio");
    m.attr("gather");
    let ok_const = m.cb.const_function(ok);
    m.cb.emit_u16(Opcode::LoadConst, ok_const);
    m.call(0);
    let boom_const = m.cb.const_function(boom);
    m.cb.emit_u16(Opcode::LoadConst, boom_const);
    m.call(0);
    m.call(2);
    m.cb.emit(Opcode::Await);
    let try_end = m.cb.here();
    let past = m.cb.emit_jump(Opcode::Jump);
    let handler = m.cb.here();
    m.cb.emit(Opcode::DupTop);
    m.load_global("ValueError");
    m.cb.emit(Opcode::ExcMatch);
    let no_match = m.cb.emit_jump(Opcode::PopJumpIfFalse);
    m.cb.emit(Opcode::PopTop);
    m.load_str("caught");
    let done = m.cb.emit_jump(Opcode::Jump);
    m.cb.bind(no_match);
    m.cb.emit_u8(Opcode::Raise, 1);
    m.cb.bind(past);
    m.cb.bind(done);
    m.ret();
    m.cb.add_exception_handler(try_start, try_end, handler, 0);

    assert_eq!(complete(start(m.finish())), Object::String("caught".to_owned()));
}

#[test]
fn gather_rejects_non_awaitables_when_reached() {
    // await asyncio.gather(42) -> TypeError at scheduling time.
    let mut m = ModuleBuilder::new();
    m.load_global("asyncio");
    m.attr("gather");
    m.load_int(42);
    m.call(1);
    m.cb.emit(Opcode::Await);
    m.ret();
    let error = torpor::Runner::new(m.finish())
        .start(vec![], torpor::NoLimitTracker, &mut torpor::NoPrint)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "TypeError: An asyncio.Future, a coroutine or an awaitable is required"
    );
}

#[test]
fn awaiting_a_coroutine_twice_is_an_error() {
    // c = noop(); await c; await c
    let mut m = ModuleBuilder::new();
    let noop = add_constant_coroutine(&mut m, "noop", "done");
    let noop_const = m.cb.const_function(noop);
    m.cb.emit_u16(Opcode::LoadConst, noop_const);
    m.call(0);
    m.store_global("c");
    m.load_global("c");
    m.cb.emit(Opcode::Await);
    m.cb.emit(Opcode::PopTop);
    m.load_global("c");
    m.cb.emit(Opcode::Await);
    m.ret();
    let error = torpor::Runner::new(m.finish())
        .start(vec![], torpor::NoLimitTracker, &mut torpor::NoPrint)
        .unwrap_err();
    assert_eq!(error.to_string(), "RuntimeError: cannot reuse already awaited coroutine");
}

#[test]
fn gather_repr_matches_python() {
    // repr(asyncio.gather)
    let mut m = ModuleBuilder::new();
    m.load_global("repr");
    m.load_global("asyncio");
    m.attr("gather");
    m.call(1);
    m.ret();
    match complete(start(m.finish())) {
        Object::String(repr) => {
            assert!(repr.starts_with("<function gather at 0x"), "got {repr}");
            assert!(repr.ends_with('>'));
        }
        other => panic!("expected string, got {other:?}"),
    }
}
