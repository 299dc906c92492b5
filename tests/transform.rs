use pretty_assertions::assert_eq;

use shapeshift::codegen::{wrap, HelperRegistry};
use shapeshift::ir::{AttributeExpr as A, PrimitiveKind as P, TypeTable, TAG_EXTERNAL};
use shapeshift::{collect_helpers, transform, transform_with, Direction, Request, TransformError};

// ---- fixtures ---- //

fn string() -> A { A::primitive(P::String) }
fn int() -> A { A::primitive(P::Int) }
fn uint() -> A { A::primitive(P::UInt) }

/// `{a: optional string, b: required int}` as two distinct user types.
fn simple_pair(types: &mut TypeTable) -> (A, A) {
    let fields = || A::object([("a", string()), ("b", int())]).with_required(["b"]);
    (types.user_type("Src", fields()), types.user_type("Tgt", fields()))
}

/// Mixed object: primitives, an array, a map and a nested user type.
fn mixed_pair(types: &mut TypeTable) -> (A, A) {
    let ut = types.user_type("UserType", A::object([("IntField", int())]));
    let fields = |ut: &A| {
        A::object([
            ("String", string()),
            ("Int", int()),
            ("Array", A::array(uint())),
            ("Map", A::map(uint(), int())),
            ("UT", ut.clone()),
        ])
        .with_required(["String", "Array", "UT"])
    };
    let source = types.user_type("SourceType", fields(&ut));
    let target = types.user_type("TargetType", fields(&ut));
    (source, target)
}

fn run(types: &TypeTable, source: &A, target: &A, direction: Direction) -> shapeshift::Transform {
    transform(types, &Request::new(source, target, direction)).unwrap()
}

// ---- objects ---- //

#[test]
fn simple_object_marshal() {
    let mut types = TypeTable::new();
    let (src, tgt) = simple_pair(&mut types);
    let out = run(&types, &src, &tgt, Direction::Marshal);
    assert_eq!(out.code, "target := &Tgt{\n\tA: source.A,\n\tB: source.B,\n}");
    assert!(out.helpers.is_empty());
}

#[test]
fn simple_object_unmarshal_dereferences_required() {
    let mut types = TypeTable::new();
    let (src, tgt) = simple_pair(&mut types);
    let out = run(&types, &src, &tgt, Direction::Unmarshal);
    assert_eq!(out.code, "target := &Tgt{\n\tA: source.A,\n\tB: *source.B,\n}");
}

#[test]
fn simple_object_to_proto_defers_optional() {
    let mut types = TypeTable::new();
    let (src, tgt) = simple_pair(&mut types);
    let out = run(&types, &src, &tgt, Direction::ToProto);
    assert_eq!(
        out.code,
        "target := &Tgt{\n\tB: int32(source.B),\n}\nif source.A != nil {\n\ttarget.A = *source.A\n}"
    );
    assert!(out.helpers.is_empty());
}

#[test]
fn simple_object_from_proto_takes_address() {
    let mut types = TypeTable::new();
    let (src, tgt) = simple_pair(&mut types);
    let out = run(&types, &src, &tgt, Direction::FromProto);
    assert_eq!(out.code, "target := &Tgt{\n\tA: &source.A,\n\tB: int(source.B),\n}");
}

#[test]
fn assignment_without_declaration() {
    let mut types = TypeTable::new();
    let (src, tgt) = simple_pair(&mut types);
    let request = Request::new(&src, &tgt, Direction::Marshal).vars("in", "out").declare_new(false);
    let out = transform(&types, &request).unwrap();
    assert_eq!(out.code, "out = &Tgt{\n\tA: in.A,\n\tB: in.B,\n}");
}

#[test]
fn mixed_object_to_proto() {
    let mut types = TypeTable::new();
    let (src, tgt) = mixed_pair(&mut types);
    let out = run(&types, &src, &tgt, Direction::ToProto);
    assert_eq!(out.code, "\
target := &TargetType{
\tString_: source.String,
}
if source.Int != nil {
\ttarget.Int = int32(*source.Int)
}
target.Array = make([]uint32, len(source.Array))
for i, val := range source.Array {
\ttarget.Array[i] = uint32(val)
}
if source.Map != nil {
\ttarget.Map = make(map[uint32]int32, len(source.Map))
\tfor key, val := range source.Map {
\t\ttk := uint32(key)
\t\ttv := int32(val)
\t\ttarget.Map[tk] = tv
\t}
}
target.UT = userTypeToUserTypeProtoBuf(source.UT)");
    assert_eq!(out.helpers.len(), 1);
    let helper = &out.helpers[0];
    assert_eq!(helper.name, "userTypeToUserTypeProtoBuf");
    assert_eq!(helper.render(), "\
func userTypeToUserTypeProtoBuf(v *UserType) *UserType {
\tif v == nil {
\t\treturn nil
\t}
\tres := &UserType{}
\tif v.IntField != nil {
\t\tres.IntField = int32(*v.IntField)
\t}
\treturn res
}
");
}

#[test]
fn mixed_object_from_proto() {
    let mut types = TypeTable::new();
    let (src, tgt) = mixed_pair(&mut types);
    let out = run(&types, &src, &tgt, Direction::FromProto);
    assert_eq!(out.code, "\
intptr := int(source.Int)
target := &TargetType{
\tString: source.String_,
\tInt: &intptr,
}
target.Array = make([]uint, len(source.Array))
for i, val := range source.Array {
\ttarget.Array[i] = uint(val)
}
if source.Map != nil {
\ttarget.Map = make(map[uint]int, len(source.Map))
\tfor key, val := range source.Map {
\t\ttk := uint(key)
\t\ttv := int(val)
\t\ttarget.Map[tk] = tv
\t}
}
target.UT = userTypeProtoBufToUserType(source.UT)");
    assert_eq!(out.helpers[0].code, "if v == nil {\n\treturn nil\n}\nintFieldptr := int(v.IntField)\nres := &UserType{\n\tIntField: &intFieldptr,\n}\n");
}

#[test]
fn mapped_field_names_are_used_per_side() {
    let mut types = TypeTable::new();
    let src = types.user_type("S", A::object([("id:user_id", string())]).with_required(["id"]));
    let tgt = types.user_type("T", A::object([("id", string())]).with_required(["id"]));
    let out = run(&types, &src, &tgt, Direction::Marshal);
    assert_eq!(out.code, "target := &T{\n\tID: source.UserID,\n}");
    let out = run(&types, &tgt, &src, Direction::ToProto);
    assert_eq!(out.code, "target := &S{\n\tUserId: source.ID,\n}");
}

#[test]
fn fields_on_one_side_only_are_skipped() {
    let mut types = TypeTable::new();
    let src = types.user_type("S", A::object([("a", string()), ("extra", int())]).with_required(["a"]));
    let tgt = types.user_type("T", A::object([("a", string()), ("missing", int())]).with_required(["a"]));
    let out = run(&types, &src, &tgt, Direction::Marshal);
    assert_eq!(out.code, "target := &T{\n\tA: source.A,\n}");
}

// ---- defaults ---- //

#[test]
fn unmarshal_backfills_defaults() {
    let mut types = TypeTable::new();
    let src = types.user_type("S", A::object([("a", string().with_default("foo"))]));
    let tgt = types.user_type("T", A::object([("a", string().with_default("foo"))]));
    let out = run(&types, &src, &tgt, Direction::Unmarshal);
    assert_eq!(out.code, "\
target := &T{}
if source.A != nil {
\ttarget.A = *source.A
}
if source.A == nil {
\ttarget.A = \"foo\"
}");
}

#[test]
fn marshal_backfills_when_source_may_be_absent() {
    let mut types = TypeTable::new();
    let src = types.user_type("S", A::object([("n", int())]));
    let tgt = types.user_type("T", A::object([("n", int().with_default(1))]));
    let out = run(&types, &src, &tgt, Direction::Marshal);
    assert_eq!(out.code, "\
target := &T{}
if source.N != nil {
\ttarget.N = *source.N
}
if source.N == nil {
\ttarget.N = 1
}");
}

#[test]
fn composite_defaults_are_backfilled() {
    let mut types = TypeTable::new();
    let tags = || A::array(string());
    let src = types.user_type("S", A::object([("tags", tags())]));
    let tgt = types.user_type("T", A::object([("tags", tags().with_default(shapeshift::ir::Literal::Array(vec!["x".into()])))]));
    let out = run(&types, &src, &tgt, Direction::FromProto);
    assert_eq!(out.code, "\
target := &T{}
if source.Tags != nil {
\ttarget.Tags = make([]string, len(source.Tags))
\tfor i, val := range source.Tags {
\t\ttarget.Tags[i] = val
\t}
}
if source.Tags == nil {
\ttarget.Tags = []string{\"x\"}
}");
}

// ---- collections ---- //

#[test]
fn nested_arrays_use_distinct_loop_variables() {
    let types = TypeTable::new();
    let nested = A::array(A::array(A::array(int())));
    let out = run(&types, &nested, &nested, Direction::Marshal);
    assert_eq!(out.code, "\
target := make([][][]int, len(source))
for i, val := range source {
\ttarget[i] = make([][]int, len(val))
\tfor j, val := range val {
\t\ttarget[i][j] = make([]int, len(val))
\t\tfor k, val := range val {
\t\t\ttarget[i][j][k] = val
\t\t}
\t}
}");
}

#[test]
fn nested_maps_use_suffixed_scratch_names() {
    let types = TypeTable::new();
    let nested = A::map(string(), A::map(string(), int()));
    let out = run(&types, &nested, &nested, Direction::Marshal);
    assert_eq!(out.code, "\
target := make(map[string]map[string]int, len(source))
for key, val := range source {
\ttk := key
\ttv := make(map[string]int, len(val))
\tfor key, val := range val {
\t\ttkb := key
\t\ttvb := val
\t\ttv[tkb] = tvb
\t}
\ttarget[tk] = tv
}");
}

// ---- recursion and helpers ---- //

#[test]
fn recursive_elements_share_one_helper() {
    let mut types = TypeTable::new();
    let x = types.declare("X");
    types.define(x, A::object([("self", A::user(x))]));
    let list = A::array(A::user(x));
    let out = run(&types, &list, &list, Direction::Marshal);
    assert_eq!(out.code, "\
target := make([]*X, len(source))
for i, val := range source {
\ttarget[i] = marshalXToX(val)
}");
    assert_eq!(out.helpers.len(), 1);
    assert_eq!(out.helpers[0].render(), "\
func marshalXToX(v *X) *X {
\tif v == nil {
\t\treturn nil
\t}
\tres := &X{}
\tif v.Self != nil {
\t\tres.Self = marshalXToX(v.Self)
\t}
\treturn res
}
");
}

#[test]
fn top_level_user_type_is_inlined() {
    let mut types = TypeTable::new();
    let x = types.declare("Node");
    types.define(x, A::object([("next", A::user(x)), ("value", int())]).with_required(["value"]));
    let node = A::user(x);
    let out = run(&types, &node, &node, Direction::Unmarshal);
    assert_eq!(out.code, "\
target := &Node{
\tValue: *source.Value,
}
if source.Next != nil {
\ttarget.Next = unmarshalNodeToNode(source.Next)
}");
    assert_eq!(out.helpers.len(), 1);
}

#[test]
fn helpers_are_emitted_once_per_type_pair() {
    let mut types = TypeTable::new();
    let item = types.user_type("Item", A::object([("name", string())]));
    let holder = types.user_type("Holder", A::object([
        ("first", item.clone()),
        ("all", A::array(item.clone())),
        ("by_name", A::map(string(), item.clone())),
    ]));
    for direction in Direction::ALL {
        let helpers = collect_helpers(&types, &Request::new(&holder, &holder, direction)).unwrap();
        assert_eq!(helpers.len(), 1, "{direction}");
    }
}

#[test]
fn helper_nil_check_does_not_depend_on_field_order() {
    let mut types = TypeTable::new();
    let item = types.user_type("Item", A::object([("name", string())]));
    let required_first = types.user_type("Holder", A::object([
        ("first", item.clone()),
        ("all", A::array(item.clone())),
    ]).with_required(["first"]));
    let list_first = types.user_type("Holder", A::object([
        ("all", A::array(item.clone())),
        ("first", item.clone()),
    ]).with_required(["first"]));
    let a = run(&types, &required_first, &required_first, Direction::Unmarshal);
    let b = run(&types, &list_first, &list_first, Direction::Unmarshal);
    assert!(a.code.contains("\ttarget.All[i] = unmarshalItemToItem(val)\n"), "{}", a.code);
    assert_eq!(a.helpers.len(), 1);
    assert_eq!(a.helpers[0].code, "if v == nil {\n\treturn nil\n}\nres := &Item{\n\tName: v.Name,\n}\n");
    assert_eq!(a.helpers, b.helpers);
}

#[test]
fn helpers_returning_anonymous_structs_return_zero_values() {
    let mut types = TypeTable::new();
    let item = types.user_type("Item", A::object([("name", string())]));
    let source = A::array(item);
    let target = A::array(A::object([("name", string())]));
    let out = run(&types, &source, &target, Direction::Marshal);
    assert_eq!(out.code, "\
target := make([]struct { Name *string }, len(source))
for i, val := range source {
\ttarget[i] = marshalItemToObject(val)
}");
    assert_eq!(out.helpers[0].render(), "\
func marshalItemToObject(v *Item) struct { Name *string } {
\tif v == nil {
\t\treturn struct { Name *string }{}
\t}
\tres := struct { Name *string }{
\t\tName: v.Name,
\t}
\treturn res
}
");
}

#[test]
fn collected_helpers_match_transform_helpers() {
    let mut types = TypeTable::new();
    let (src, tgt) = mixed_pair(&mut types);
    for direction in Direction::ALL {
        let request = Request::new(&src, &tgt, direction);
        let out = transform(&types, &request).unwrap();
        assert_eq!(collect_helpers(&types, &request).unwrap(), out.helpers);
    }
}

#[test]
fn transform_is_deterministic() {
    let mut types = TypeTable::new();
    let (src, tgt) = mixed_pair(&mut types);
    for direction in Direction::ALL {
        let first = run(&types, &src, &tgt, direction);
        let second = run(&types, &src, &tgt, direction);
        assert_eq!(first, second);
    }
}

#[test]
fn shared_registry_deduplicates_across_requests() {
    let mut types = TypeTable::new();
    let (src, tgt) = mixed_pair(&mut types);
    let mut registry = HelperRegistry::new();
    let request = Request::new(&src, &tgt, Direction::Marshal);
    transform_with(&types, &request, &mut registry).unwrap();
    transform_with(&types, &request.clone().vars("a", "b"), &mut registry).unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn external_types_get_a_suffix() {
    let mut types = TypeTable::new();
    let ext = types.user_type("Money", A::object([("amount", int())])).with_tag(TAG_EXTERNAL, "true");
    let holder = types.user_type("Order", A::object([("total", ext)]).with_required(["total"]));
    let out = run(&types, &holder, &holder, Direction::Marshal);
    assert_eq!(out.helpers[0].name, "marshalMoneyExtToMoneyExt");
}

#[test]
fn same_named_types_are_ambiguous() {
    let mut types = TypeTable::new();
    let a = types.user_type("User", A::object([("name", string())]));
    let b = types.user_type("User", A::object([("name", string())]));
    let holder = types.user_type("Holder", A::object([("a", a), ("b", b)]));
    let err = transform(&types, &Request::new(&holder, &holder, Direction::Marshal)).unwrap_err();
    assert!(matches!(err, TransformError::AmbiguousHelper { ref name, .. } if name == "marshalUserToUser"));
}

// ---- wrapping ---- //

#[test]
fn to_proto_wraps_top_level_arrays() {
    let mut types = TypeTable::new();
    let list = A::array(int());
    let wrapper = wrap::wrap(&mut types, "IntList", list.clone());
    let out = run(&types, &list, &wrapper, Direction::ToProto);
    assert_eq!(out.code, "\
target := &IntList{}
target.Field = make([]int32, len(source))
for i, val := range source {
\ttarget.Field[i] = int32(val)
}");
}

#[test]
fn from_proto_unwraps_top_level_arrays() {
    let mut types = TypeTable::new();
    let list = A::array(int());
    let wrapper = wrap::wrap(&mut types, "IntList", list.clone());
    let out = run(&types, &wrapper, &list, Direction::FromProto);
    assert_eq!(out.code, "\
target := make([]int, len(source.Field))
for i, val := range source.Field {
\ttarget[i] = int(val)
}");
}

#[test]
fn wrapped_fields_are_initialised_in_place() {
    let mut types = TypeTable::new();
    let list = A::array(int());
    let wrapper = wrap::wrap(&mut types, "IntList", list.clone());
    let src = types.user_type("S", A::object([("ids", list)]));
    let tgt = types.user_type("T", A::object([("ids", wrapper)]));
    let out = run(&types, &src, &tgt, Direction::ToProto);
    assert_eq!(out.code, "\
target := &T{}
if source.Ids != nil {
\ttarget.Ids = &IntList{}
\ttarget.Ids.Field = make([]int32, len(source.Ids))
\tfor i, val := range source.Ids {
\t\ttarget.Ids.Field[i] = int32(val)
\t}
}");
}

#[test]
fn second_mismatch_after_wrapping_is_fatal() {
    let mut types = TypeTable::new();
    let wrapper = wrap::wrap(&mut types, "IntList", A::array(int()));
    let err = transform(&types, &Request::new(&string(), &wrapper, Direction::ToProto)).unwrap_err();
    let mismatch = err.as_shape_mismatch().expect("shape mismatch");
    assert!(mismatch.after_wrap);
}

#[test]
fn service_directions_never_wrap() {
    let mut types = TypeTable::new();
    let list = A::array(int());
    let wrapper = wrap::wrap(&mut types, "IntList", list.clone());
    let err = transform(&types, &Request::new(&list, &wrapper, Direction::Marshal)).unwrap_err();
    let mismatch = err.as_shape_mismatch().expect("shape mismatch");
    assert!(!mismatch.after_wrap);
    assert_eq!(mismatch.target_desc, "IntList");
}

#[test]
fn mismatch_reports_the_field_path() {
    let mut types = TypeTable::new();
    let src = types.user_type("S", A::object([("items", A::array(A::object([("tags", A::array(string()))])))]));
    let tgt = types.user_type("T", A::object([("items", A::array(A::object([("tags", A::map(string(), string()))])))]));
    let err = transform(&types, &Request::new(&src, &tgt, Direction::Marshal)).unwrap_err();
    assert_eq!(err.as_shape_mismatch().unwrap().path, "S.items[*].tags");
}

// ---- primitives ---- //

#[test]
fn named_primitive_targets_are_converted() {
    let mut types = TypeTable::new();
    let email = types.user_type("Email", string());
    let out = transform(&types, &Request::new(&string(), &email, Direction::Unmarshal).packages("", "svc")).unwrap();
    assert_eq!(out.code, "target := svc.Email(source)");
}

#[test]
fn floats_are_never_cast() {
    let types = TypeTable::new();
    let f32 = A::primitive(P::Float32);
    let f64 = A::primitive(P::Float64);
    let out = run(&types, &f32, &f64, Direction::Marshal);
    assert_eq!(out.code, "target := source");
    let out = run(&types, &int(), &A::primitive(P::Int64), Direction::Marshal);
    assert_eq!(out.code, "target := int64(source)");
}

#[test]
fn round_trip_assigns_every_field() {
    let mut types = TypeTable::new();
    let fields = || {
        A::object([("a", string()), ("b", int()), ("c", A::primitive(P::Boolean)), ("d", A::primitive(P::UInt64))])
            .with_required(["a", "b"])
    };
    let svc = types.user_type("Svc", fields());
    let pb = types.user_type("Pb", fields());
    let there = run(&types, &svc, &pb, Direction::ToProto);
    assert_eq!(there.code, "\
target := &Pb{
\tA: source.A,
\tB: int32(source.B),
}
if source.C != nil {
\ttarget.C = *source.C
}
if source.D != nil {
\ttarget.D = *source.D
}");
    let back = run(&types, &pb, &svc, Direction::FromProto);
    assert_eq!(back.code, "\
target := &Svc{
\tA: source.A,
\tB: int(source.B),
\tC: &source.C,
\tD: &source.D,
}");
}
