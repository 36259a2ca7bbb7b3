//! A small textured-quad shader pair, built with the AST helpers.
use crate::compiler::ast::builder::*;
use crate::compiler::ast::*;
use crate::compiler::common::ConstantValue;

pub fn sample_module() -> Stmt {
    let float = PrimitiveType::Float32;
    let vec2 = ExpressionType::vec(2, float);
    let vec3 = ExpressionType::vec(3, float);
    let vec4 = ExpressionType::vec(4, float);

    multi(vec![
        declare_struct("ViewerData", Some(StructLayout::Std140), vec![
            member("projectionMatrix", ExpressionType::mat(4, 4)),
            member("viewMatrix", ExpressionType::mat(4, 4)),
        ]),
        declare_struct("VertIn", None, vec![
            location_member("pos", vec3.clone(), 0),
            location_member("uv", vec2.clone(), 1),
        ]),
        declare_struct("VertOut", None, vec![
            builtin_member("position", vec4.clone(), BuiltinEntry::VertexPosition),
            location_member("uv", vec2.clone(), 0),
        ]),
        declare_struct("FragIn", None, vec![
            location_member("uv", vec2, 0),
        ]),
        declare_struct("FragOut", None, vec![
            location_member("color", vec4.clone(), 0),
        ]),
        declare_external(vec![
            external_var("viewerData", ExpressionType::uniform(ExpressionType::named("ViewerData")), Some(0)),
            external_var("tex", ExpressionType::sampler(ImageType::Dim2D, float), Some(1)),
        ]),
        declare_option("HasTexture", ExpressionType::bool(), Some(constant(ConstantValue::Bool(true)))),
        entry_function(ShaderStageType::Vertex, "vert_main", vec![parameter("input", ExpressionType::named("VertIn"))], ExpressionType::named("VertOut"), vec![
            declare_variable("output", ExpressionType::named("VertOut"), None),
            expression(assign(
                access_member(identifier("output"), &["position"]),
                binary(
                    BinaryType::Multiply,
                    binary(
                        BinaryType::Multiply,
                        access_member(identifier("viewerData"), &["projectionMatrix"]),
                        access_member(identifier("viewerData"), &["viewMatrix"]),
                    ),
                    cast(vec4.clone(), vec![
                        access_member(identifier("input"), &["pos"]),
                        constant(ConstantValue::F32(1.0)),
                    ]),
                ),
            )),
            expression(assign(
                access_member(identifier("output"), &["uv"]),
                access_member(identifier("input"), &["uv"]),
            )),
            return_value(identifier("output")),
        ]),
        entry_function(ShaderStageType::Fragment, "frag_main", vec![parameter("input", ExpressionType::named("FragIn"))], ExpressionType::named("FragOut"), vec![
            declare_variable("output", ExpressionType::named("FragOut"), None),
            expression(assign(
                access_member(identifier("output"), &["color"]),
                select_opt(
                    "HasTexture",
                    intrinsic(IntrinsicType::SampleTexture, vec![
                        identifier("tex"),
                        access_member(identifier("input"), &["uv"]),
                    ]),
                    constant(ConstantValue::Vec4F32([1.0, 1.0, 1.0, 1.0])),
                ),
            )),
            branch(
                binary(
                    BinaryType::CompLt,
                    swizzle(access_member(identifier("output"), &["color"]), &[SwizzleComponent::Fourth]),
                    constant(ConstantValue::F32(0.5)),
                ),
                discard(),
                None,
            ),
            return_value(identifier("output")),
        ]),
    ])
}
