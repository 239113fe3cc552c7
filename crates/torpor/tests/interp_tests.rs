//! Interpreter semantics: arithmetic, containers, control flow, builtins,
//! shadowing, and the error taxonomy.

mod common;

use common::{complete, run, start, ModuleBuilder};
use pretty_assertions::assert_eq;
use torpor::{
    BinaryOpKind, CollectStringPrint, CompareOpKind, NoLimitTracker, Object, Opcode, Runner,
};

#[test]
fn arithmetic_follows_python_rules() {
    // 2 + 3 * 4
    let mut m = ModuleBuilder::new();
    m.load_int(2);
    m.load_int(3);
    m.load_int(4);
    m.cb.emit_binary(BinaryOpKind::Mul);
    m.cb.emit_binary(BinaryOpKind::Add);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(14));

    // 7 / 2 -> float
    let mut m = ModuleBuilder::new();
    m.load_int(7);
    m.load_int(2);
    m.cb.emit_binary(BinaryOpKind::TrueDiv);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Float(3.5));

    // -7 // 2 floors toward negative infinity
    let mut m = ModuleBuilder::new();
    m.load_int(-7);
    m.load_int(2);
    m.cb.emit_binary(BinaryOpKind::FloorDiv);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(-4));

    // -7 % 2 takes the divisor's sign
    let mut m = ModuleBuilder::new();
    m.load_int(-7);
    m.load_int(2);
    m.cb.emit_binary(BinaryOpKind::Mod);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(1));

    // 1 + 2.5 widens to float
    let mut m = ModuleBuilder::new();
    m.load_int(1);
    m.load_float(2.5);
    m.cb.emit_binary(BinaryOpKind::Add);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Float(3.5));
}

#[test]
fn integer_overflow_promotes_to_bignum() {
    // (2 ** 62) * 4
    let mut m = ModuleBuilder::new();
    m.load_int(2);
    m.load_int(62);
    m.cb.emit_binary(BinaryOpKind::Pow);
    m.load_int(4);
    m.cb.emit_binary(BinaryOpKind::Mul);
    m.ret();
    let expected: num_bigint::BigInt = num_bigint::BigInt::from(2).pow(64);
    assert_eq!(complete(start(m.finish())), Object::BigInt(expected));
}

#[test]
fn division_by_zero_messages() {
    let mut m = ModuleBuilder::new();
    m.load_int(1);
    m.load_int(0);
    m.cb.emit_binary(BinaryOpKind::TrueDiv);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "ZeroDivisionError: division by zero");

    let mut m = ModuleBuilder::new();
    m.load_int(1);
    m.load_int(0);
    m.cb.emit_binary(BinaryOpKind::Mod);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "ZeroDivisionError: integer division or modulo by zero");
}

#[test]
fn negative_shift_raises_value_error() {
    let mut m = ModuleBuilder::new();
    m.load_int(1);
    m.load_int(-1);
    m.cb.emit_binary(BinaryOpKind::LShift);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "ValueError: negative shift count");
}

#[test]
fn string_operations() {
    // 'ab' + 'cd'
    let mut m = ModuleBuilder::new();
    m.load_str("ab");
    m.load_str("cd");
    m.cb.emit_binary(BinaryOpKind::Add);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("abcd".to_owned()));

    // 'ab' * 3
    let mut m = ModuleBuilder::new();
    m.load_str("ab");
    m.load_int(3);
    m.cb.emit_binary(BinaryOpKind::Mul);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("ababab".to_owned()));

    // 'x=%s y=%d' % ('a', 2)
    let mut m = ModuleBuilder::new();
    m.load_str("x=%s y=%d");
    m.load_str("a");
    m.load_int(2);
    m.cb.emit_u16(Opcode::BuildTuple, 2);
    m.cb.emit_binary(BinaryOpKind::Mod);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("x=a y=2".to_owned()));

    // 'str' + 1 -> TypeError
    let mut m = ModuleBuilder::new();
    m.load_str("str");
    m.load_int(1);
    m.cb.emit_binary(BinaryOpKind::Add);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(
        error.to_string(),
        "TypeError: unsupported operand type(s) for +: 'str' and 'int'"
    );

    // 'ell' in 'hello'
    let mut m = ModuleBuilder::new();
    m.load_str("ell");
    m.load_str("hello");
    m.cb.emit_compare(CompareOpKind::In);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Bool(true));

    // 'Hi'.lower()
    let mut m = ModuleBuilder::new();
    m.load_str("Hi");
    m.attr("lower");
    m.call(0);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("hi".to_owned()));
}

#[test]
fn for_loop_accumulates_over_range() {
    // total = 0
    // for i in range(5):
    //     total = total + i
    // total
    let mut m = ModuleBuilder::new();
    m.load_int(0);
    m.store_global("total");
    m.load_global("range");
    m.load_int(5);
    m.call(1);
    m.cb.emit(Opcode::GetIter);
    let loop_top = m.cb.here();
    let exit = m.cb.emit_jump(Opcode::ForIter);
    m.store_global("i");
    m.load_global("total");
    m.load_global("i");
    m.cb.emit_binary(BinaryOpKind::Add);
    m.store_global("total");
    m.cb.emit_jump_back(Opcode::Jump, loop_top);
    m.cb.bind(exit);
    m.load_global("total");
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(10));
}

#[test]
fn builtin_shadowing_follows_assignment() {
    // int = 42
    // result = []
    // for int in range(3):
    //     result.append(int)
    // (int, result)
    let mut m = ModuleBuilder::new();
    m.load_int(42);
    m.store_global("int");
    m.cb.emit_u16(Opcode::BuildList, 0);
    m.store_global("result");
    m.load_global("range");
    m.load_int(3);
    m.call(1);
    m.cb.emit(Opcode::GetIter);
    let loop_top = m.cb.here();
    let exit = m.cb.emit_jump(Opcode::ForIter);
    m.store_global("int");
    m.load_global("result");
    m.attr("append");
    m.load_global("int");
    m.call(1);
    m.cb.emit(Opcode::PopTop);
    m.cb.emit_jump_back(Opcode::Jump, loop_top);
    m.cb.bind(exit);
    m.load_global("int");
    m.load_global("result");
    m.cb.emit_u16(Opcode::BuildTuple, 2);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![
            Object::Int(2),
            Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(2)]),
        ])
    );
}

#[test]
fn builtin_usable_until_shadowed() {
    // int('7') before any assignment to `int`
    let mut m = ModuleBuilder::new();
    m.load_global("int");
    m.load_str("7");
    m.call(1);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(7));
}

#[test]
fn containers_and_subscripts() {
    // d = {'a': 1}; d['b'] = 2; (d['a'], d['b'], len(d))
    let mut m = ModuleBuilder::new();
    m.load_str("a");
    m.load_int(1);
    m.cb.emit_u16(Opcode::BuildDict, 1);
    m.store_global("d");
    m.load_int(2);
    m.load_global("d");
    m.load_str("b");
    m.cb.emit(Opcode::StoreSubscr);
    m.load_global("d");
    m.load_str("a");
    m.cb.emit(Opcode::LoadSubscr);
    m.load_global("d");
    m.load_str("b");
    m.cb.emit(Opcode::LoadSubscr);
    m.load_global("len");
    m.load_global("d");
    m.call(1);
    m.cb.emit_u16(Opcode::BuildTuple, 3);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![Object::Int(1), Object::Int(2), Object::Int(2)])
    );
}

#[test]
fn missing_key_and_index_errors() {
    let mut m = ModuleBuilder::new();
    m.cb.emit_u16(Opcode::BuildDict, 0);
    m.load_str("missing");
    m.cb.emit(Opcode::LoadSubscr);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "KeyError: 'missing'");

    let mut m = ModuleBuilder::new();
    m.load_int(9);
    m.cb.emit_u16(Opcode::BuildList, 1);
    m.load_int(5);
    m.cb.emit(Opcode::LoadSubscr);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "IndexError: list index out of range");
}

#[test]
fn sorted_is_stable_and_accepts_key_and_reverse() {
    // sorted([3, 1, 2])
    let mut m = ModuleBuilder::new();
    m.load_global("sorted");
    m.load_int(3);
    m.load_int(1);
    m.load_int(2);
    m.cb.emit_u16(Opcode::BuildList, 3);
    m.call(1);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
    );

    // def neg(x): return 0 - x
    // sorted([1, 3, 2], key=neg)
    let mut m = ModuleBuilder::new();
    let x_id = m.pb.intern_str("x");
    let mut body = torpor::CodeBuilder::new();
    let x_slot = body.add_local(x_id);
    let zero = body.const_int(0);
    body.emit_u16(Opcode::LoadConst, zero);
    body.emit_u16(Opcode::LoadLocal, x_slot);
    body.emit_binary(BinaryOpKind::Sub);
    body.emit(Opcode::Return);
    let neg = m.pb.add_function("neg", &[x_id], vec![], body.build(), false);

    m.load_global("sorted");
    m.load_int(1);
    m.load_int(3);
    m.load_int(2);
    m.cb.emit_u16(Opcode::BuildList, 3);
    let neg_const = m.cb.const_function(neg);
    m.cb.emit_u16(Opcode::LoadConst, neg_const);
    let key_id = m.pb.intern_str("key");
    let kw = m.cb.add_kw_names(vec![key_id]);
    m.cb.emit_call_kw(2, kw);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![Object::Int(3), Object::Int(2), Object::Int(1)])
    );

    // sorted(['bb', 'a'], reverse=True)
    let mut m = ModuleBuilder::new();
    m.load_global("sorted");
    m.load_str("bb");
    m.load_str("a");
    m.cb.emit_u16(Opcode::BuildList, 2);
    m.load_bool(true);
    let reverse_id = m.pb.intern_str("reverse");
    let kw = m.cb.add_kw_names(vec![reverse_id]);
    m.cb.emit_call_kw(2, kw);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![Object::String("bb".to_owned()), Object::String("a".to_owned())])
    );
}

#[test]
fn map_filter_zip_enumerate() {
    // def double(x): return x * 2
    // list(map(double, [1, 2, 3]))
    let mut m = ModuleBuilder::new();
    let x_id = m.pb.intern_str("x");
    let mut body = torpor::CodeBuilder::new();
    let x_slot = body.add_local(x_id);
    body.emit_u16(Opcode::LoadLocal, x_slot);
    let two = body.const_int(2);
    body.emit_u16(Opcode::LoadConst, two);
    body.emit_binary(BinaryOpKind::Mul);
    body.emit(Opcode::Return);
    let double = m.pb.add_function("double", &[x_id], vec![], body.build(), false);

    m.load_global("list");
    m.load_global("map");
    let double_const = m.cb.const_function(double);
    m.cb.emit_u16(Opcode::LoadConst, double_const);
    m.load_int(1);
    m.load_int(2);
    m.load_int(3);
    m.cb.emit_u16(Opcode::BuildList, 3);
    m.call(2);
    m.call(1);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![Object::Int(2), Object::Int(4), Object::Int(6)])
    );

    // list(zip([1, 2, 3], ['a', 'b']))  — stops at the shortest
    let mut m = ModuleBuilder::new();
    m.load_global("list");
    m.load_global("zip");
    m.load_int(1);
    m.load_int(2);
    m.load_int(3);
    m.cb.emit_u16(Opcode::BuildList, 3);
    m.load_str("a");
    m.load_str("b");
    m.cb.emit_u16(Opcode::BuildList, 2);
    m.call(2);
    m.call(1);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![
            Object::Tuple(vec![Object::Int(1), Object::String("a".to_owned())]),
            Object::Tuple(vec![Object::Int(2), Object::String("b".to_owned())]),
        ])
    );

    // list(enumerate(['x', 'y'], 1))
    let mut m = ModuleBuilder::new();
    m.load_global("list");
    m.load_global("enumerate");
    m.load_str("x");
    m.load_str("y");
    m.cb.emit_u16(Opcode::BuildList, 2);
    m.load_int(1);
    m.call(2);
    m.call(1);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::List(vec![
            Object::Tuple(vec![Object::Int(1), Object::String("x".to_owned())]),
            Object::Tuple(vec![Object::Int(2), Object::String("y".to_owned())]),
        ])
    );
}

#[test]
fn try_except_catches_matching_type() {
    // try:
    //     raise ValueError('boom')
    // except ValueError as e:
    //     str(e)
    let mut m = ModuleBuilder::new();
    let try_start = m.cb.here();
    m.load_global("ValueError");
    m.load_str("boom");
    m.call(1);
    m.cb.emit_u8(Opcode::Raise, 1);
    let try_end = m.cb.here();
    let handler = m.cb.here();
    m.cb.emit(Opcode::DupTop);
    m.load_global("ValueError");
    m.cb.emit(Opcode::ExcMatch);
    let no_match = m.cb.emit_jump(Opcode::PopJumpIfFalse);
    m.store_global("e");
    m.load_global("str");
    m.load_global("e");
    m.call(1);
    let done = m.cb.emit_jump(Opcode::Jump);
    m.cb.bind(no_match);
    m.cb.emit_u8(Opcode::Raise, 1);
    m.cb.bind(done);
    m.ret();
    m.cb.add_exception_handler(try_start, try_end, handler, 0);
    assert_eq!(complete(start(m.finish())), Object::String("boom".to_owned()));
}

#[test]
fn unhandled_exception_surfaces_with_type_and_message() {
    let mut m = ModuleBuilder::new();
    m.load_global("ValueError");
    m.load_str("boom");
    m.call(1);
    m.cb.emit_u8(Opcode::Raise, 1);
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.exc_type(), torpor::ExcType::ValueError);
    assert_eq!(error.to_string(), "ValueError: boom");
}

#[test]
fn name_errors() {
    let mut m = ModuleBuilder::new();
    m.load_global("definitely_not_a_builtin");
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "NameError: name 'definitely_not_a_builtin' is not defined");
}

#[test]
fn hash_agrees_with_equality() {
    // hash(1) == hash(1.0) == hash(True) is required by the hash law.
    let mut m = ModuleBuilder::new();
    m.load_global("hash");
    m.load_int(1);
    m.call(1);
    m.load_global("hash");
    m.load_float(1.0);
    m.call(1);
    m.cb.emit_compare(CompareOpKind::Eq);
    m.load_global("hash");
    m.load_int(1);
    m.call(1);
    m.load_global("hash");
    m.load_bool(true);
    m.call(1);
    m.cb.emit_compare(CompareOpKind::Eq);
    m.cb.emit_binary(BinaryOpKind::BitAnd);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Bool(true));
}

#[test]
fn hashing_a_list_is_a_type_error() {
    let mut m = ModuleBuilder::new();
    m.load_global("hash");
    m.cb.emit_u16(Opcode::BuildList, 0);
    m.call(1);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "TypeError: unhashable type: 'list'");
}

#[test]
fn repr_of_nested_containers() {
    // repr([1, 'a', (2,)])
    let mut m = ModuleBuilder::new();
    m.load_global("repr");
    m.load_int(1);
    m.load_str("a");
    m.load_int(2);
    m.cb.emit_u16(Opcode::BuildTuple, 1);
    m.cb.emit_u16(Opcode::BuildList, 3);
    m.call(1);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("[1, 'a', (2,)]".to_owned()));
}

#[test]
fn print_writes_through_the_writer() {
    // print('a', 1)
    let mut m = ModuleBuilder::new();
    m.load_global("print");
    m.load_str("a");
    m.load_int(1);
    m.call(2);
    m.ret();
    let mut out = CollectStringPrint::new();
    Runner::new(m.finish()).run(vec![], NoLimitTracker, &mut out).unwrap();
    assert_eq!(out.output(), "a 1\n");
}

#[test]
fn inputs_fill_declared_slots() {
    // input x; x * 10
    let mut m = ModuleBuilder::new();
    let x_slot = m.pb.declare_input("x");
    m.cb.emit_u16(Opcode::LoadGlobal, x_slot);
    m.load_int(10);
    m.cb.emit_binary(BinaryOpKind::Mul);
    m.ret();
    let result = Runner::new(m.finish())
        .run(vec![Object::Int(4)], NoLimitTracker, &mut CollectStringPrint::new())
        .unwrap();
    assert_eq!(result, Object::Int(40));
}

#[test]
fn set_literals_deduplicate() {
    // len({1, 2, 1})
    let mut m = ModuleBuilder::new();
    m.load_global("len");
    m.load_int(1);
    m.load_int(2);
    m.load_int(1);
    m.cb.emit_u16(Opcode::BuildSet, 3);
    m.call(1);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(2));
}

#[test]
fn float_nan_compares_unequal_to_itself() {
    // float('nan') == float('nan')
    let mut m = ModuleBuilder::new();
    m.load_global("float");
    m.load_str("nan");
    m.call(1);
    m.load_global("float");
    m.load_str("nan");
    m.call(1);
    m.cb.emit_compare(CompareOpKind::Eq);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Bool(false));
}
