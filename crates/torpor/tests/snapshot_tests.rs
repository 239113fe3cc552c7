//! Serialization of runners and suspended state.

mod common;

use common::{complete, expect_os_call, resume, start, ModuleBuilder};
use pretty_assertions::assert_eq;
use torpor::{CollectStringPrint, NoLimitTracker, Object, OsFunction, Runner, Snapshot};

#[test]
fn runner_round_trips_through_postcard() {
    let mut m = ModuleBuilder::new();
    m.load_int(40);
    m.load_int(2);
    m.cb.emit_binary(torpor::BinaryOpKind::Add);
    m.ret();
    let runner = Runner::new(m.finish());
    let bytes = runner.dump().unwrap();
    let restored = Runner::load(&bytes).unwrap();
    let result = restored
        .run(vec![], NoLimitTracker, &mut CollectStringPrint::new())
        .unwrap();
    assert_eq!(result, Object::Int(42));
}

#[test]
fn suspended_state_survives_dump_and_load() {
    // Suspend at Path('/tmp/x').read_text(), serialize the snapshot, restore
    // it, and resume the restored copy.
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/tmp/x");
    m.call(1);
    m.attr("read_text");
    m.call(0);
    m.ret();

    let (function, _, state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::ReadText);

    let bytes = state.dump().unwrap();
    drop(state);
    let restored: Snapshot<NoLimitTracker> = Snapshot::load(&bytes).unwrap();
    let done = resume(restored, Object::String("from disk".to_owned()));
    assert_eq!(complete(done), Object::String("from disk".to_owned()));
}

#[test]
fn suspended_state_preserves_partial_evaluation() {
    // 'a' + Path('/f').read_text() + 'z' — the pending concatenation state
    // must survive serialization.
    let mut m = ModuleBuilder::new();
    m.load_str("a");
    m.load_global("Path");
    m.load_str("/f");
    m.call(1);
    m.attr("read_text");
    m.call(0);
    m.cb.emit_binary(torpor::BinaryOpKind::Add);
    m.load_str("z");
    m.cb.emit_binary(torpor::BinaryOpKind::Add);
    m.ret();

    let (_, _, state) = expect_os_call(start(m.finish()));
    let bytes = state.dump().unwrap();
    let restored: Snapshot<NoLimitTracker> = Snapshot::load(&bytes).unwrap();
    let done = resume(restored, Object::String("MID".to_owned()));
    assert_eq!(complete(done), Object::String("aMIDz".to_owned()));
}
