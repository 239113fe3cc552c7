//! Tests for the OS-call suspension protocol.
//!
//! Each program is assembled through the builder (the compiler front end is
//! external to this crate); comments show the Python being encoded.

mod common;

use common::{complete, expect_os_call, resume, start, ModuleBuilder};
use pretty_assertions::assert_eq;
use torpor::{
    file_stat, CollectStringPrint, ExcType, Exception, NoLimitTracker, Object, Opcode, OsFunction, Program, Runner,
};

/// `Path('<path>').<method>()` as a one-expression module.
fn path_method_program(path: &str, method: &str) -> Program {
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str(path);
    m.call(1);
    m.attr(method);
    m.call(0);
    m.ret();
    m.finish()
}

#[test]
fn path_exists_yields_os_call() {
    let progress = start(path_method_program("/tmp/test.txt", "exists"));
    let (function, args, state) = expect_os_call(progress);
    assert_eq!(function, OsFunction::Exists);
    assert_eq!(args, vec![Object::Path("/tmp/test.txt".to_owned())]);
    let done = resume(state, Object::Bool(true));
    assert!(!done.is_os_function());
    assert_eq!(complete(done), Object::Bool(true));
}

#[test]
fn every_path_method_maps_to_its_function() {
    let cases = [
        ("exists", OsFunction::Exists),
        ("is_file", OsFunction::IsFile),
        ("is_dir", OsFunction::IsDir),
        ("stat", OsFunction::Stat),
        ("read_text", OsFunction::ReadText),
        ("read_bytes", OsFunction::ReadBytes),
        ("iterdir", OsFunction::Iterdir),
    ];
    for (method, expected) in cases {
        let progress = start(path_method_program("/tmp/x", method));
        let (function, args, _state) = expect_os_call(progress);
        assert_eq!(function, expected, "method {method}");
        assert_eq!(args[0], Object::Path("/tmp/x".to_owned()));
    }
}

#[test]
fn progress_reports_os_call_kind() {
    let progress = start(path_method_program("/tmp/x", "exists"));
    assert!(progress.is_os_function());
}

#[test]
fn path_concatenation_yields_joined_path() {
    // base = Path('/home'); (base / 'user' / 'file.txt').exists()
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/home");
    m.call(1);
    m.store_global("base");
    m.load_global("base");
    m.load_str("user");
    m.cb.emit_binary(torpor::BinaryOpKind::TrueDiv);
    m.load_str("file.txt");
    m.cb.emit_binary(torpor::BinaryOpKind::TrueDiv);
    m.attr("exists");
    m.call(0);
    m.ret();
    let (function, args, _state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::Exists);
    assert_eq!(args[0], Object::Path("/home/user/file.txt".to_owned()));
}

#[test]
fn chained_calls_follow_the_branch_taken() {
    // p = Path('/tmp/t')
    // p.read_text() if p.exists() else 'nf'
    fn program() -> Program {
        let mut m = ModuleBuilder::new();
        m.load_global("Path");
        m.load_str("/tmp/t");
        m.call(1);
        m.store_global("p");
        m.load_global("p");
        m.attr("exists");
        m.call(0);
        let else_branch = m.cb.emit_jump(Opcode::PopJumpIfFalse);
        m.load_global("p");
        m.attr("read_text");
        m.call(0);
        let end = m.cb.emit_jump(Opcode::Jump);
        m.cb.bind(else_branch);
        m.load_str("nf");
        m.cb.bind(end);
        m.ret();
        m.finish()
    }

    // exists -> True: a second snapshot for read_text, then its value.
    let (function, _, state) = expect_os_call(start(program()));
    assert_eq!(function, OsFunction::Exists);
    let (function, args, state) = expect_os_call(resume(state, Object::Bool(true)));
    assert_eq!(function, OsFunction::ReadText);
    assert_eq!(args[0], Object::Path("/tmp/t".to_owned()));
    assert_eq!(complete(resume(state, Object::String("hi".to_owned()))), Object::String("hi".to_owned()));

    // exists -> False: complete directly after one snapshot.
    let (_, _, state) = expect_os_call(start(program()));
    assert_eq!(complete(resume(state, Object::Bool(false))), Object::String("nf".to_owned()));
}

#[test]
fn stat_round_trip() {
    // info = Path('/f').stat()
    // (info.st_mode, info.st_size, info[6])
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/f");
    m.call(1);
    m.attr("stat");
    m.call(0);
    m.store_global("info");
    m.load_global("info");
    m.attr("st_mode");
    m.load_global("info");
    m.attr("st_size");
    m.load_global("info");
    m.load_int(6);
    m.cb.emit(Opcode::LoadSubscr);
    m.cb.emit_u16(Opcode::BuildTuple, 3);
    m.ret();

    let (function, args, state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::Stat);
    assert_eq!(args[0], Object::Path("/f".to_owned()));
    let result = complete(resume(state, file_stat(1024, 0o100_644, 0.0)));
    assert_eq!(
        result,
        Object::Tuple(vec![Object::Int(0o100_644), Object::Int(1024), Object::Int(1024)])
    );
}

#[test]
fn write_text_passes_payload_after_path() {
    // Path('/tmp/out.txt').write_text('data')
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/tmp/out.txt");
    m.call(1);
    m.attr("write_text");
    m.load_str("data");
    m.call(1);
    m.ret();
    let (function, args, state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::WriteText);
    assert_eq!(
        args,
        vec![Object::Path("/tmp/out.txt".to_owned()), Object::String("data".to_owned())]
    );
    assert_eq!(complete(resume(state, Object::Int(4))), Object::Int(4));
}

#[test]
fn iterdir_result_is_iterable() {
    // entries = Path('/tmp').iterdir()
    // len(entries)
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/tmp");
    m.call(1);
    m.attr("iterdir");
    m.call(0);
    m.store_global("entries");
    m.load_global("len");
    m.load_global("entries");
    m.call(1);
    m.ret();
    let (function, _, state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::Iterdir);
    let entries = Object::List(vec![
        Object::String("/tmp/a".to_owned()),
        Object::String("/tmp/b".to_owned()),
        Object::String("/tmp/c".to_owned()),
    ]);
    assert_eq!(complete(resume(state, entries)), Object::Int(3));
}

#[test]
fn getenv_carries_key_and_default() {
    // os.getenv('PATH')
    let mut m = ModuleBuilder::new();
    m.load_global("os");
    m.attr("getenv");
    m.load_str("PATH");
    m.call(1);
    m.ret();
    let (function, args, state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::Getenv);
    assert_eq!(args, vec![Object::String("PATH".to_owned()), Object::None]);
    assert_eq!(
        complete(resume(state, Object::String("/usr/bin".to_owned()))),
        Object::String("/usr/bin".to_owned())
    );

    // os.getenv('MISSING', 'fallback')
    let mut m = ModuleBuilder::new();
    m.load_global("os");
    m.attr("getenv");
    m.load_str("MISSING");
    m.load_str("fallback");
    m.call(2);
    m.ret();
    let (function, args, _state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::Getenv);
    assert_eq!(
        args,
        vec![Object::String("MISSING".to_owned()), Object::String("fallback".to_owned())]
    );
}

#[test]
fn fast_path_without_handler_reports_not_implemented() {
    let runner = Runner::new(path_method_program("/tmp/test.txt", "exists"));
    let error = runner
        .run(vec![], NoLimitTracker, &mut CollectStringPrint::new())
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "NotImplementedError: OS function 'Path.exists' not implemented with standard execution"
    );
}

#[test]
fn handler_loop_drives_to_completion() {
    // 'Content: ' + Path('/tmp/hello.txt').read_text()
    let mut m = ModuleBuilder::new();
    m.load_str("Content: ");
    m.load_global("Path");
    m.load_str("/tmp/hello.txt");
    m.call(1);
    m.attr("read_text");
    m.call(0);
    m.cb.emit_binary(torpor::BinaryOpKind::Add);
    m.ret();

    let mut handler = |function: OsFunction, _args: &[Object], _kwargs: &[(Object, Object)]| match function {
        OsFunction::ReadText => Ok(Object::String("Hello!".to_owned())),
        other => Err(Exception::new(ExcType::NotImplementedError, format!("unexpected {other}"))),
    };
    let result = Runner::new(m.finish())
        .run_with_handlers(
            vec![],
            NoLimitTracker,
            &mut CollectStringPrint::new(),
            Some(&mut handler),
            None,
        )
        .unwrap();
    assert_eq!(result, Object::String("Content: Hello!".to_owned()));
}

#[test]
fn handler_loop_without_os_raises_inside_interpreter() {
    let error = Runner::new(path_method_program("/tmp/test.txt", "exists"))
        .run_with_handlers(vec![], NoLimitTracker, &mut CollectStringPrint::new(), None, None)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "NotImplementedError: OS function 'Path.exists' not implemented"
    );
}

#[test]
fn host_exception_is_catchable_in_script() {
    // try:
    //     Path('/gone').read_text()
    // except OSError:
    //     'missing'
    let mut m = ModuleBuilder::new();
    let try_start = m.cb.here();
    m.load_global("Path");
    m.load_str("/gone");
    m.call(1);
    m.attr("read_text");
    m.call(0);
    let try_end = m.cb.here();
    let past_handler = m.cb.emit_jump(Opcode::Jump);
    let handler = m.cb.here();
    // handler: exception on stack; match OSError, else re-raise.
    m.cb.emit(Opcode::DupTop);
    m.load_global("OSError");
    m.cb.emit(Opcode::ExcMatch);
    let no_match = m.cb.emit_jump(Opcode::PopJumpIfFalse);
    m.cb.emit(Opcode::PopTop);
    m.load_str("missing");
    let done = m.cb.emit_jump(Opcode::Jump);
    m.cb.bind(no_match);
    m.cb.emit_u8(Opcode::Raise, 1);
    m.cb.bind(past_handler);
    m.cb.bind(done);
    m.ret();
    m.cb.add_exception_handler(try_start, try_end, handler, 0);

    let (function, _, state) = expect_os_call(start(m.finish()));
    assert_eq!(function, OsFunction::ReadText);
    let progress = state
        .resume(
            Exception::new(ExcType::FileNotFoundError, "no such file"),
            &mut CollectStringPrint::new(),
        )
        .unwrap();
    assert_eq!(complete(progress), Object::String("missing".to_owned()));
}

#[test]
fn external_function_call_suspends_with_name_and_args() {
    // fetch(41) + 1, with `fetch` declared external.
    let mut m = ModuleBuilder::new();
    let (_ext_id, slot) = m.pb.declare_external("fetch");
    m.cb.emit_u16(Opcode::LoadGlobal, slot);
    m.load_int(41);
    m.call(1);
    m.load_int(1);
    m.cb.emit_binary(torpor::BinaryOpKind::Add);
    m.ret();

    let progress = start(m.finish());
    match progress {
        torpor::RunProgress::FunctionCall {
            function_name,
            args,
            state,
            ..
        } => {
            assert_eq!(function_name, "fetch");
            assert_eq!(args, vec![Object::Int(41)]);
            let done = state.resume(Object::Int(100), &mut CollectStringPrint::new()).unwrap();
            assert_eq!(complete(done), Object::Int(101));
        }
        other => panic!("expected FunctionCall, got {other:?}"),
    }
}

#[test]
fn path_pure_surface_needs_no_host() {
    // str(Path('/a') / 'b' / 'c')
    let mut m = ModuleBuilder::new();
    m.load_global("str");
    m.load_global("Path");
    m.load_str("/a");
    m.call(1);
    m.load_str("b");
    m.cb.emit_binary(torpor::BinaryOpKind::TrueDiv);
    m.load_str("c");
    m.cb.emit_binary(torpor::BinaryOpKind::TrueDiv);
    m.call(1);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("/a/b/c".to_owned()));

    // Path('/a/b').parts
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/a/b");
    m.call(1);
    m.attr("parts");
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![
            Object::String("/".to_owned()),
            Object::String("a".to_owned()),
            Object::String("b".to_owned()),
        ])
    );

    // Path('/a/b/c.txt').parent.name
    let mut m = ModuleBuilder::new();
    m.load_global("Path");
    m.load_str("/a/b/c.txt");
    m.call(1);
    m.attr("parent");
    m.attr("name");
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("b".to_owned()));
}
