use super::*;
use crate::compiler::ast::builder::*;
use crate::compiler::common::ConstantValue;
use crate::compiler::sanitize::{SanitizeOptions, Sanitizer};

use pretty_assertions::assert_eq;

fn vec2() -> ExpressionType {
    ExpressionType::vec(2, PrimitiveType::Float32)
}
fn vec3() -> ExpressionType {
    ExpressionType::vec(3, PrimitiveType::Float32)
}
fn vec4() -> ExpressionType {
    ExpressionType::vec(4, PrimitiveType::Float32)
}

fn generate_with(root: Stmt, options: &SanitizeOptions) -> String {
    let ast = Sanitizer::apply(root, options).unwrap();
    LangWriter::new().generate(&ast, &Environment::default()).unwrap()
}
fn generate(root: Stmt) -> String {
    generate_with(root, &SanitizeOptions::default())
}

#[test]
fn test_struct() {
    let root = multi(vec![
        declare_struct("Light", Some(StructLayout::Std140), vec![
            member("position", vec3()),
        ]),
    ]);
    assert_eq!(generate(root), "[layout(std140)]\nstruct Light\n{\n\tposition: vec3<f32>\n}");
}

#[test]
fn test_struct_member_attributes() {
    let root = multi(vec![
        declare_struct("VertOut", None, vec![
            builtin_member("position", vec4(), BuiltinEntry::VertexPosition),
            location_member("uv", vec2(), 0),
        ]),
    ]);
    assert_eq!(generate(root), r#"
struct VertOut
{
	[builtin(position)] position: vec4<f32>,
	[location(0)] uv: vec2<f32>
}
"#.trim());
}

#[test]
fn test_unsigned_type_names() {
    let root = multi(vec![
        declare_function("count", vec![parameter("n", ExpressionType::u32())], ExpressionType::u32(), vec![
            declare_variable("m", ExpressionType::vec(2, PrimitiveType::UInt32), None),
            return_value(identifier("n")),
        ]),
    ]);
    assert_eq!(generate(root), "fn count(n: ui32) -> ui32\n{\n\tlet m: vec2<ui32>;\n\treturn n;\n}");
}

#[test]
fn test_entry_function() {
    let root = multi(vec![
        entry_function(ShaderStageType::Fragment, "main", vec![], ExpressionType::NoType, vec![
            discard(),
        ]),
    ]);
    assert_eq!(generate(root), "[entry(frag)]\nfn main()\n{\n\tdiscard;\n}");
}

#[test]
fn test_swizzle() {
    let root = multi(vec![
        declare_function("f", vec![parameter("v", vec3())], ExpressionType::f32(), vec![
            return_value(swizzle(identifier("v"), &[SwizzleComponent::First])),
        ]),
        declare_function("g", vec![parameter("v", vec3())], vec4(), vec![
            return_value(swizzle(identifier("v"), &[
                SwizzleComponent::Third,
                SwizzleComponent::Third,
                SwizzleComponent::Second,
                SwizzleComponent::First,
            ])),
        ]),
    ]);
    assert_eq!(generate(root), r#"
fn f(v: vec3<f32>) -> f32
{
	return v.x;
}
fn g(v: vec3<f32>) -> vec4<f32>
{
	return v.zzyx;
}
"#.trim());
}

#[test]
fn test_conditional_statement() {
    let root = multi(vec![
        declare_option("UseShadows", ExpressionType::bool(), Some(constant(ConstantValue::Bool(false)))),
        entry_function(ShaderStageType::Fragment, "main", vec![], ExpressionType::NoType, vec![
            conditional("UseShadows", discard()),
        ]),
    ]);
    assert_eq!(generate(root), r#"
option UseShadows: bool = false;
[entry(frag)]
fn main()
{
	[opt(UseShadows)]discard;
}
"#.trim());
}

#[test]
fn test_removed_option_declaration() {
    let root = multi(vec![
        declare_option("UseShadows", ExpressionType::bool(), None),
        entry_function(ShaderStageType::Vertex, "main", vec![], ExpressionType::NoType, vec![
            conditional("UseShadows", return_void()),
        ]),
    ]);
    let options = SanitizeOptions {
        remove_option_declaration: true,
        ..Default::default()
    };
    assert_eq!(generate_with(root, &options), "[entry(vert)]\nfn main()\n{\n\t[opt(UseShadows)]return;\n}");
}

#[test]
fn test_branch() {
    let root = multi(vec![
        declare_function("f", vec![parameter("a", ExpressionType::f32()), parameter("b", ExpressionType::f32())], ExpressionType::f32(), vec![
            branch_chain(vec![
                (binary(BinaryType::CompGt, identifier("a"), identifier("b")), return_value(identifier("a"))),
                (binary(BinaryType::CompLt, identifier("a"), constant(ConstantValue::F32(-1.0))), return_value(unary(UnaryType::Minus, identifier("a")))),
            ], Some(return_value(constant(ConstantValue::F32(0.0))))),
        ]),
    ]);
    assert_eq!(generate(root), r#"
fn f(a: f32, b: f32) -> f32
{
	if (a > b)
	{
		return a;
	}
	else if (a < (-1.0))
	{
		return -a;
	}
	else
	{
		return 0.0;
	}
}
"#.trim());
}

#[test]
fn test_branch_without_else() {
    let root = multi(vec![
        declare_function("f", vec![parameter("a", ExpressionType::bool())], ExpressionType::NoType, vec![
            branch(unary(UnaryType::LogicalNot, identifier("a")), discard(), None),
            return_void(),
        ]),
    ]);
    assert_eq!(generate(root), r#"
fn f(a: bool)
{
	if (!a)
	{
		discard;
	}
	return;
}
"#.trim());
}

#[test]
fn test_module() {
    let root = multi(vec![
        declare_struct("Data", Some(StructLayout::Std140), vec![
            member("color", vec4()),
        ]),
        declare_external(vec![
            external_var("data", ExpressionType::uniform(ExpressionType::named("Data")), Some(0)),
            external_var("tex", ExpressionType::sampler(ImageType::Dim2D, PrimitiveType::Float32), Some(1)),
        ]),
        declare_option("UseTexture", ExpressionType::bool(), None),
        declare_function("shade", vec![parameter("uv", vec2())], vec4(), vec![
            declare_variable("base", ExpressionType::NoType, Some(access_member(identifier("data"), &["color"]))),
            no_op(),
            return_value(select_opt(
                "UseTexture",
                binary(BinaryType::Multiply, identifier("base"), intrinsic(IntrinsicType::SampleTexture, vec![identifier("tex"), identifier("uv")])),
                identifier("base"),
            )),
        ]),
    ]);
    assert_eq!(generate(root), r#"
[layout(std140)]
struct Data
{
	color: vec4<f32>
}
external
{
	[binding(0)] data: uniform<Data>,
	[binding(1)] tex: sampler2D<f32>
}
option UseTexture: bool;
fn shade(uv: vec2<f32>) -> vec4<f32>
{
	let base: vec4<f32> = data.color;
	return select_opt(UseTexture, base * (texture(tex, uv)), base);
}
"#.trim());
}

#[test]
fn test_expressions() {
    let root = multi(vec![
        declare_function("f", vec![parameter("v", vec3()), parameter("m", ExpressionType::mat(3, 3))], ExpressionType::NoType, vec![
            declare_variable("a", vec4(), Some(cast(vec4(), vec![identifier("v"), constant(ConstantValue::F32(1.0))]))),
            declare_variable("b", ExpressionType::f32(), None),
            expression(assign(identifier("b"), intrinsic(IntrinsicType::DotProduct, vec![identifier("v"), identifier("v")]))),
            expression(assign(identifier("v"), binary(BinaryType::Multiply, identifier("m"), binary(BinaryType::Add, identifier("v"), constant(ConstantValue::Vec3F32([1.0, 2.0, 0.5])))))),
        ]),
    ]);
    assert_eq!(generate(root), r#"
fn f(v: vec3<f32>, m: mat3<f32>)
{
	let a: vec4<f32> = vec4<f32>(v, 1.0);
	let b: f32;
	b = dot(v, v);
	v = m * (v + (vec3<f32>(1.0, 2.0, 0.5)));
}
"#.trim());
}

#[test]
fn test_empty_function() {
    let root = multi(vec![
        declare_function("f", vec![], ExpressionType::NoType, vec![]),
    ]);
    assert_eq!(generate(root), "fn f()\n{\n\t\n}");
}

#[test]
fn test_deterministic() {
    let make = || multi(vec![
        declare_struct("Light", None, vec![member("position", vec3())]),
        declare_function("f", vec![parameter("l", ExpressionType::named("Light"))], vec3(), vec![
            return_value(access_member(identifier("l"), &["position"])),
        ]),
    ]);
    assert_eq!(generate(make()), generate(make()));
}

#[test]
fn test_unsanitized_input() {
    let ast = SanitizedAst {
        root: multi(vec![expression(identifier("x"))]),
        options: vec![],
        structs: vec![],
        entry_points: vec![],
    };
    let mut writer = LangWriter::new();
    let err = writer.generate(&ast, &Environment::default()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<InternalError>(),
        Some(&InternalError::UnsanitizedNode("identifier")),
    );
    assert!(writer.state.is_none());
}

#[test]
fn test_unregistered_variable() {
    let ast = SanitizedAst {
        root: multi(vec![expression(variable(3))]),
        options: vec![],
        structs: vec![],
        entry_points: vec![],
    };
    let err = LangWriter::new().generate(&ast, &Environment::default()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<InternalError>(),
        Some(&InternalError::UnregisteredIndex { kind: "variable", index: 3 }),
    );
}

#[test]
fn test_writer_is_reusable() {
    let root = multi(vec![
        declare_function("f", vec![parameter("a", ExpressionType::f32())], ExpressionType::NoType, vec![]),
    ]);
    let ast = Sanitizer::apply(root, &SanitizeOptions::default()).unwrap();
    let mut writer = LangWriter::new();
    let a = writer.generate(&ast, &Environment::default()).unwrap();
    let b = writer.generate(&ast, &Environment::default()).unwrap();
    assert_eq!(a, b);
}
