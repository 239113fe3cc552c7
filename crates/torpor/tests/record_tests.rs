//! Record types: construction, frozen/mutable discipline, hashing, repr,
//! and bound methods.

mod common;

use common::{complete, run, start, ModuleBuilder};
use pretty_assertions::assert_eq;
use torpor::{BinaryOpKind, CodeBuilder, ConstValue, Object, Opcode, RecordTypeId};

/// Registers `@dataclass(frozen=...) class Point: x; y` and returns its id.
fn add_point(m: &mut ModuleBuilder, frozen: bool) -> RecordTypeId {
    m.pb.add_record_type("Point", frozen, &[("x", None), ("y", None)], &[])
}

/// Emits `Point(<x>, <y>)` from a record-type constant.
fn construct_point(m: &mut ModuleBuilder, point: RecordTypeId, x: i64, y: i64) {
    let point_const = m.cb.const_record_type(point);
    m.cb.emit_u16(Opcode::LoadConst, point_const);
    m.load_int(x);
    m.load_int(y);
    m.call(2);
}

#[test]
fn field_access_and_repr() {
    // p = Point(1, 2); (p.x, p.y, repr(p))
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.store_global("p");
    m.load_global("p");
    m.attr("x");
    m.load_global("p");
    m.attr("y");
    m.load_global("repr");
    m.load_global("p");
    m.call(1);
    m.cb.emit_u16(Opcode::BuildTuple, 3);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![
            Object::Int(1),
            Object::Int(2),
            Object::String("Point(x=1, y=2)".to_owned()),
        ])
    );
}

#[test]
fn string_fields_are_quoted_in_repr() {
    // repr(Tag('alpha'))
    let mut m = ModuleBuilder::new();
    let tag = m.pb.add_record_type("Tag", true, &[("label", None)], &[]);
    m.load_global("repr");
    let tag_const = m.cb.const_record_type(tag);
    m.cb.emit_u16(Opcode::LoadConst, tag_const);
    m.load_str("alpha");
    m.call(1);
    m.call(1);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::String("Tag(label='alpha')".to_owned()));
}

#[test]
fn keyword_construction_and_defaults() {
    // Sized(width=3) with height defaulting to 4 -> (3, 4)
    let mut m = ModuleBuilder::new();
    let sized = m.pb.add_record_type(
        "Sized",
        true,
        &[("width", None), ("height", Some(ConstValue::Int(4)))],
        &[],
    );
    let sized_const = m.cb.const_record_type(sized);
    m.cb.emit_u16(Opcode::LoadConst, sized_const);
    m.load_int(3);
    let width_id = m.pb.intern_str("width");
    let kw = m.cb.add_kw_names(vec![width_id]);
    m.cb.emit_call_kw(1, kw);
    m.store_global("s");
    m.load_global("s");
    m.attr("width");
    m.load_global("s");
    m.attr("height");
    m.cb.emit_u16(Opcode::BuildTuple, 2);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![Object::Int(3), Object::Int(4)])
    );
}

#[test]
fn missing_field_is_a_type_error() {
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    let point_const = m.cb.const_record_type(point);
    m.cb.emit_u16(Opcode::LoadConst, point_const);
    m.load_int(1);
    m.call(1);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "TypeError: Point() missing required argument: 'y'");
}

#[test]
fn frozen_assignment_raises_attribute_error_subclass() {
    // p = Point(1, 2)
    // try:
    //     p.x = 10
    // except AttributeError:
    //     'frozen'
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.store_global("p");
    let try_start = m.cb.here();
    m.load_int(10);
    m.load_global("p");
    m.store_attr("x");
    m.load_none();
    let try_end = m.cb.here();
    let past = m.cb.emit_jump(Opcode::Jump);
    let handler = m.cb.here();
    m.cb.emit(Opcode::DupTop);
    m.load_global("AttributeError");
    m.cb.emit(Opcode::ExcMatch);
    let no_match = m.cb.emit_jump(Opcode::PopJumpIfFalse);
    m.cb.emit(Opcode::PopTop);
    m.load_str("frozen");
    let done = m.cb.emit_jump(Opcode::Jump);
    m.cb.bind(no_match);
    m.cb.emit_u8(Opcode::Raise, 1);
    m.cb.bind(past);
    m.cb.bind(done);
    m.ret();
    m.cb.add_exception_handler(try_start, try_end, handler, 0);
    assert_eq!(complete(start(m.finish())), Object::String("frozen".to_owned()));
}

#[test]
fn frozen_assignment_message_is_canonical() {
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.store_global("p");
    m.load_int(10);
    m.load_global("p");
    m.store_attr("x");
    m.load_none();
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.exc_type(), torpor::ExcType::FrozenInstanceError);
    assert_eq!(error.to_string(), "FrozenInstanceError: cannot assign to field 'x'");

    // Undeclared attributes raise the same error on frozen records.
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.store_global("p");
    m.load_int(10);
    m.load_global("p");
    m.store_attr("color");
    m.load_none();
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "FrozenInstanceError: cannot assign to field 'color'");
}

#[test]
fn equal_frozen_records_hash_equal_and_deduplicate() {
    // a = Point(1, 2); b = Point(1, 2)
    // (a == b, hash(a) == hash(b), len({a, b}))
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.store_global("a");
    construct_point(&mut m, point, 1, 2);
    m.store_global("b");
    m.load_global("a");
    m.load_global("b");
    m.cb.emit_compare(torpor::CompareOpKind::Eq);
    m.load_global("hash");
    m.load_global("a");
    m.call(1);
    m.load_global("hash");
    m.load_global("b");
    m.call(1);
    m.cb.emit_compare(torpor::CompareOpKind::Eq);
    m.load_global("len");
    m.load_global("a");
    m.load_global("b");
    m.cb.emit_u16(Opcode::BuildSet, 2);
    m.call(1);
    m.cb.emit_u16(Opcode::BuildTuple, 3);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![Object::Bool(true), Object::Bool(true), Object::Int(1)])
    );
}

#[test]
fn records_of_different_types_never_compare_equal() {
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    let other = m.pb.add_record_type("Vec2", true, &[("x", None), ("y", None)], &[]);
    construct_point(&mut m, point, 1, 2);
    let other_const = m.cb.const_record_type(other);
    m.cb.emit_u16(Opcode::LoadConst, other_const);
    m.load_int(1);
    m.load_int(2);
    m.call(2);
    m.cb.emit_compare(torpor::CompareOpKind::Eq);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Bool(false));
}

#[test]
fn mutable_records_accept_new_attributes_but_reject_hash() {
    // m = Point(1, 2)  (mutable)
    // m.x = 10; m.color = 'red'; (m.x, m.color, repr(m))
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, false);
    construct_point(&mut m, point, 1, 2);
    m.store_global("p");
    m.load_int(10);
    m.load_global("p");
    m.store_attr("x");
    m.load_str("red");
    m.load_global("p");
    m.store_attr("color");
    m.load_global("p");
    m.attr("x");
    m.load_global("p");
    m.attr("color");
    m.load_global("repr");
    m.load_global("p");
    m.call(1);
    m.cb.emit_u16(Opcode::BuildTuple, 3);
    m.ret();
    // Extra attributes never appear in repr.
    assert_eq!(
        complete(start(m.finish())),
        Object::Tuple(vec![
            Object::Int(10),
            Object::String("red".to_owned()),
            Object::String("Point(x=10, y=2)".to_owned()),
        ])
    );

    // hash(mutable) -> TypeError: unhashable type: 'Point'
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, false);
    m.load_global("hash");
    construct_point(&mut m, point, 1, 2);
    m.call(1);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "TypeError: unhashable type: 'Point'");
}

#[test]
fn missing_attribute_message_names_the_type() {
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.attr("z");
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "AttributeError: 'Point' object has no attribute 'z'");
}

#[test]
fn methods_bind_their_receiver() {
    // class Point: def moved(self, dx): return Point(self.x + dx, self.y)
    // p = Point(1, 2)
    // p.moved(5).x
    let mut m = ModuleBuilder::new();
    let self_id = m.pb.intern_str("self");
    let dx_id = m.pb.intern_str("dx");
    let x_operand = u16::try_from(m.pb.intern_str("x").index()).unwrap();
    let y_operand = u16::try_from(m.pb.intern_str("y").index()).unwrap();

    // The method body needs the record-type id before the type exists, so
    // register the type first with an empty method table replaced below.
    // The method constructs a sibling record type: its body is compiled
    // before the owning type's method table is registered.
    let mut body = CodeBuilder::new();
    let self_slot = body.add_local(self_id);
    let dx_slot = body.add_local(dx_id);
    let point = m.pb.add_record_type("Point", true, &[("x", None), ("y", None)], &[]);
    let point_const = body.const_record_type(point);
    body.emit_u16(Opcode::LoadConst, point_const);
    body.emit_u16(Opcode::LoadLocal, self_slot);
    body.emit_u16(Opcode::LoadAttr, x_operand);
    body.emit_u16(Opcode::LoadLocal, dx_slot);
    body.emit_binary(BinaryOpKind::Add);
    body.emit_u16(Opcode::LoadLocal, self_slot);
    body.emit_u16(Opcode::LoadAttr, y_operand);
    body.emit_u8(Opcode::CallFunction, 2);
    body.emit(Opcode::Return);
    let moved = m
        .pb
        .add_function("moved", &[self_id, dx_id], vec![], body.build(), false);
    let point = m
        .pb
        .add_record_type("PointM", true, &[("x", None), ("y", None)], &[("moved", moved)]);

    let point_const = m.cb.const_record_type(point);
    m.cb.emit_u16(Opcode::LoadConst, point_const);
    m.load_int(1);
    m.load_int(2);
    m.call(2);
    m.attr("moved");
    m.load_int(5);
    m.call(1);
    m.attr("x");
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(6));
}

#[test]
fn bound_method_is_a_first_class_value() {
    // p = PointM(1, 2); f = p.moved; f(5).x
    let mut m = ModuleBuilder::new();
    let self_id = m.pb.intern_str("self");
    let dx_id = m.pb.intern_str("dx");
    let x_operand = u16::try_from(m.pb.intern_str("x").index()).unwrap();

    let mut body = CodeBuilder::new();
    let self_slot = body.add_local(self_id);
    let dx_slot = body.add_local(dx_id);
    body.emit_u16(Opcode::LoadLocal, self_slot);
    body.emit_u16(Opcode::LoadAttr, x_operand);
    body.emit_u16(Opcode::LoadLocal, dx_slot);
    body.emit_binary(BinaryOpKind::Add);
    body.emit(Opcode::Return);
    let shifted = m
        .pb
        .add_function("shifted", &[self_id, dx_id], vec![], body.build(), false);
    let point = m
        .pb
        .add_record_type("PointM", true, &[("x", None), ("y", None)], &[("shifted", shifted)]);

    let point_const = m.cb.const_record_type(point);
    m.cb.emit_u16(Opcode::LoadConst, point_const);
    m.load_int(1);
    m.load_int(2);
    m.call(2);
    m.attr("shifted");
    m.store_global("f");
    m.load_global("f");
    m.load_int(5);
    m.call(1);
    m.ret();
    assert_eq!(complete(start(m.finish())), Object::Int(6));
}

#[test]
fn calling_a_field_value_is_a_type_error() {
    // point = Point(1, 2); point.x()
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.attr("x");
    m.call(0);
    m.ret();
    let error = run(m.finish()).unwrap_err();
    assert_eq!(error.to_string(), "TypeError: 'int' object is not callable");
}

#[test]
fn records_cross_the_boundary_as_record_objects() {
    let mut m = ModuleBuilder::new();
    let point = add_point(&mut m, true);
    construct_point(&mut m, point, 1, 2);
    m.ret();
    assert_eq!(
        complete(start(m.finish())),
        Object::Record {
            name: "Point".to_owned(),
            fields: vec![("x".to_owned(), Object::Int(1)), ("y".to_owned(), Object::Int(2))],
            frozen: true,
        }
    );
}
