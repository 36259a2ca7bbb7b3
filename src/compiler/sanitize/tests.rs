use super::*;
use crate::compiler::ast::builder::*;

use pretty_assertions::assert_eq;

fn vec3() -> ExpressionType {
    ExpressionType::vec(3, PrimitiveType::Float32)
}

fn light_struct() -> Stmt {
    declare_struct("Light", Some(StructLayout::Std140), vec![
        member("position", vec3()),
        member("intensity", ExpressionType::f32()),
    ])
}

fn sanitize_default(root: Stmt) -> Result<SanitizedAst> {
    Sanitizer::apply(root, &SanitizeOptions::default())
}

fn semantic_error(root: Stmt) -> SemanticError {
    let err = sanitize_default(root).unwrap_err();
    err.downcast_ref::<SemanticError>()
        .unwrap_or_else(|| panic!("expected a semantic error, got: {err}"))
        .clone()
}

fn function_body(ast: &SanitizedAst, i: usize) -> &StmtDeclareFunction {
    let root = ast.root.as_multi().unwrap();
    root.statements[i].as_declare_function().unwrap()
}

#[test]
fn test_swizzle_type() {
    let root = multi(vec![
        declare_function("f", vec![parameter("v", vec3())], ExpressionType::f32(), vec![
            return_value(swizzle(identifier("v"), &[SwizzleComponent::First])),
        ]),
    ]);
    let ast = sanitize_default(root).unwrap();
    let func = function_body(&ast, 0);
    let ret = func.statements[0].as_return().unwrap();
    let expr = ret.return_expr.as_ref().unwrap();
    assert_eq!(expr.ty, Some(ExpressionType::f32()));

    let inner = expr.as_swizzle().unwrap();
    assert_eq!(inner.expr.kind, ExprKind::Variable(ExprVariable { variable_index: 0 }));
    assert_eq!(inner.expr.ty, Some(vec3()));
}

#[test]
fn test_swizzle_duplicates() {
    let root = multi(vec![
        declare_function("f", vec![parameter("v", vec3())], ExpressionType::vec(4, PrimitiveType::Float32), vec![
            return_value(swizzle(identifier("v"), &[
                SwizzleComponent::Third,
                SwizzleComponent::Third,
                SwizzleComponent::First,
                SwizzleComponent::Second,
            ])),
        ]),
    ]);
    sanitize_default(root).unwrap();
}

#[test]
fn test_swizzle_out_of_range() {
    let root = multi(vec![
        declare_function("f", vec![parameter("v", ExpressionType::vec(2, PrimitiveType::Float32))], ExpressionType::f32(), vec![
            return_value(swizzle(identifier("v"), &[SwizzleComponent::Third])),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::SwizzleOutOfRange { component: 2, count: 2 });
}

#[test]
fn test_undeclared_identifier() {
    let root = multi(vec![
        declare_function("main", vec![], ExpressionType::NoType, vec![
            expression(identifier("foo")),
        ]),
    ]);
    let err = sanitize_default(root).unwrap_err();
    assert!(err.to_string().contains("foo"));
    assert_eq!(
        err.downcast_ref::<SemanticError>(),
        Some(&SemanticError::UndeclaredIdentifier { name: "foo".to_string() }),
    );
}

#[test]
fn test_duplicate_declaration() {
    let root = multi(vec![
        declare_function("f", vec![], ExpressionType::NoType, vec![
            declare_variable("a", ExpressionType::f32(), None),
            declare_variable("a", ExpressionType::i32(), None),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::DuplicateDeclaration { name: "a".to_string() });
}

#[test]
fn test_shadowing_in_nested_scope() {
    let root = multi(vec![
        declare_function("f", vec![parameter("a", ExpressionType::f32())], ExpressionType::NoType, vec![
            branch(
                constant(ConstantValue::Bool(true)),
                multi(vec![declare_variable("a", ExpressionType::i32(), None)]),
                None,
            ),
            expression(assign(identifier("a"), constant(ConstantValue::F32(1.0)))),
        ]),
    ]);
    sanitize_default(root).unwrap();
}

#[test]
fn test_variable_indices_are_unique() {
    let root = multi(vec![
        light_struct(),
        declare_external(vec![
            external_var("light", ExpressionType::uniform(ExpressionType::named("Light")), Some(0)),
            external_var("tex", ExpressionType::sampler(ImageType::Dim2D, PrimitiveType::Float32), Some(1)),
        ]),
        declare_function("f", vec![parameter("a", ExpressionType::f32()), parameter("b", ExpressionType::f32())], ExpressionType::NoType, vec![
            declare_variable("c", ExpressionType::f32(), None),
        ]),
        declare_function("g", vec![], ExpressionType::NoType, vec![
            declare_variable("c", ExpressionType::f32(), None),
        ]),
    ]);
    let ast = sanitize_default(root).unwrap();
    let statements = &ast.root.as_multi().unwrap().statements;

    assert_eq!(statements[0].as_declare_struct().unwrap().struct_index, Some(0));
    assert_eq!(statements[1].as_declare_external().unwrap().var_index, Some(0));

    let f = statements[2].as_declare_function().unwrap();
    assert_eq!(f.func_index, Some(0));
    assert_eq!(f.var_index, Some(2));
    assert_eq!(f.statements[0].as_declare_variable().unwrap().var_index, Some(4));

    let g = statements[3].as_declare_function().unwrap();
    assert_eq!(g.func_index, Some(1));
    assert_eq!(g.var_index, Some(5));
    assert_eq!(g.statements[0].as_declare_variable().unwrap().var_index, Some(5));
}

#[test]
fn test_member_access_resolution() {
    let root = multi(vec![
        light_struct(),
        declare_external(vec![
            external_var("light", ExpressionType::uniform(ExpressionType::named("Light")), Some(0)),
        ]),
        declare_function("f", vec![], ExpressionType::f32(), vec![
            return_value(access_member(identifier("light"), &["intensity"])),
        ]),
    ]);
    let ast = sanitize_default(root).unwrap();
    assert_eq!(ast.structs.len(), 1);
    assert_eq!(ast.structs[0].name, "Light");

    let f = function_body(&ast, 2);
    let expr = f.statements[0].as_return().unwrap().return_expr.as_ref().unwrap();
    let access = expr.as_access_index().unwrap();
    assert_eq!(access.member_indices, vec![1]);
    assert_eq!(expr.ty, Some(ExpressionType::f32()));
    assert_eq!(access.expr.ty, Some(ExpressionType::uniform(ExpressionType::structure(0))));
}

#[test]
fn test_unknown_member() {
    let root = multi(vec![
        light_struct(),
        declare_function("f", vec![parameter("l", ExpressionType::named("Light"))], ExpressionType::f32(), vec![
            return_value(access_member(identifier("l"), &["color"])),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::UnknownMember {
        struct_name: "Light".to_string(),
        member: "color".to_string(),
    });
}

#[test]
fn test_member_index_out_of_range() {
    let root = multi(vec![
        light_struct(),
        declare_function("f", vec![parameter("l", ExpressionType::named("Light"))], ExpressionType::f32(), vec![
            return_value(access_index(identifier("l"), vec![2])),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::MemberIndexOutOfRange {
        struct_name: "Light".to_string(),
        index: 2,
    });
}

#[test]
fn test_binary_type_rules() {
    let mat4 = ExpressionType::mat(4, 4);
    let vec4 = ExpressionType::vec(4, PrimitiveType::Float32);
    let root = multi(vec![
        declare_function("f", vec![
            parameter("m", mat4.clone()),
            parameter("v", vec4.clone()),
            parameter("s", ExpressionType::f32()),
        ], vec4.clone(), vec![
            declare_variable("a", ExpressionType::NoType, Some(binary(BinaryType::Multiply, identifier("m"), identifier("v")))),
            declare_variable("b", ExpressionType::NoType, Some(binary(BinaryType::Multiply, identifier("v"), identifier("s")))),
            declare_variable("c", ExpressionType::NoType, Some(binary(BinaryType::CompLt, identifier("s"), constant(ConstantValue::F32(0.5))))),
            declare_variable("d", ExpressionType::NoType, Some(binary(BinaryType::Multiply, identifier("m"), identifier("m")))),
            return_value(binary(BinaryType::Add, identifier("a"), identifier("b"))),
        ]),
    ]);
    let ast = sanitize_default(root).unwrap();
    let f = function_body(&ast, 0);
    let ty = |i: usize| f.statements[i].as_declare_variable().unwrap().var_type.clone();
    assert_eq!(ty(0), vec4);
    assert_eq!(ty(1), vec4);
    assert_eq!(ty(2), ExpressionType::bool());
    assert_eq!(ty(3), mat4);
}

#[test]
fn test_binary_type_mismatch() {
    let root = multi(vec![
        declare_function("f", vec![parameter("a", ExpressionType::f32()), parameter("b", ExpressionType::i32())], ExpressionType::NoType, vec![
            expression(binary(BinaryType::Add, identifier("a"), identifier("b"))),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::TypeMismatch {
        node: "binary expression",
        expected: "f32".to_string(),
        found: "i32".to_string(),
    });
}

#[test]
fn test_cast_arity() {
    let vec4 = ExpressionType::vec(4, PrimitiveType::Float32);
    let ok = multi(vec![
        declare_function("f", vec![parameter("v", vec3())], vec4.clone(), vec![
            return_value(cast(vec4.clone(), vec![identifier("v"), constant(ConstantValue::F32(1.0))])),
        ]),
    ]);
    sanitize_default(ok).unwrap();

    let bad = multi(vec![
        declare_function("f", vec![parameter("v", vec3())], vec4.clone(), vec![
            return_value(cast(vec4, vec![identifier("v")])),
        ]),
    ]);
    assert_eq!(semantic_error(bad), SemanticError::ArityMismatch {
        node: "cast expression",
        expected: 4,
        found: 3,
    });
}

#[test]
fn test_intrinsic_types() {
    let root = multi(vec![
        declare_external(vec![
            external_var("tex", ExpressionType::sampler(ImageType::Dim2D, PrimitiveType::Float32), Some(0)),
        ]),
        declare_function("f", vec![parameter("a", vec3()), parameter("uv", ExpressionType::vec(2, PrimitiveType::Float32))], ExpressionType::NoType, vec![
            declare_variable("c", ExpressionType::NoType, Some(intrinsic(IntrinsicType::CrossProduct, vec![identifier("a"), identifier("a")]))),
            declare_variable("d", ExpressionType::NoType, Some(intrinsic(IntrinsicType::DotProduct, vec![identifier("a"), identifier("a")]))),
            declare_variable("l", ExpressionType::NoType, Some(intrinsic(IntrinsicType::Length, vec![identifier("a")]))),
            declare_variable("t", ExpressionType::NoType, Some(intrinsic(IntrinsicType::SampleTexture, vec![identifier("tex"), identifier("uv")]))),
        ]),
    ]);
    let ast = sanitize_default(root).unwrap();
    let f = function_body(&ast, 1);
    let ty = |i: usize| f.statements[i].as_declare_variable().unwrap().var_type.clone();
    assert_eq!(ty(0), vec3());
    assert_eq!(ty(1), ExpressionType::f32());
    assert_eq!(ty(2), ExpressionType::f32());
    assert_eq!(ty(3), ExpressionType::vec(4, PrimitiveType::Float32));
}

#[test]
fn test_intrinsic_rejections() {
    let call = |intrinsic_type: IntrinsicType, args: &[&str]| {
        let args = args.iter().map(|x| identifier(x)).collect();
        semantic_error(multi(vec![
            declare_function("f", vec![
                parameter("s", ExpressionType::f32()),
                parameter("a", ExpressionType::vec(2, PrimitiveType::Float32)),
                parameter("b", vec3()),
                parameter("c", ExpressionType::vec(4, PrimitiveType::Float32)),
            ], ExpressionType::NoType, vec![
                declare_variable("r", ExpressionType::NoType, Some(intrinsic(intrinsic_type, args))),
            ]),
        ]))
    };

    assert_eq!(call(IntrinsicType::CrossProduct, &["a", "a"]), SemanticError::TypeMismatch {
        node: "intrinsic call",
        expected: "vec3<f32>".to_string(),
        found: "vec2<f32>".to_string(),
    });
    assert_eq!(call(IntrinsicType::DotProduct, &["b", "c"]), SemanticError::TypeMismatch {
        node: "intrinsic call",
        expected: "vec3<f32>".to_string(),
        found: "vec4<f32>".to_string(),
    });
    assert_eq!(call(IntrinsicType::Length, &["s"]), SemanticError::TypeMismatch {
        node: "intrinsic call",
        expected: "a float vector".to_string(),
        found: "f32".to_string(),
    });
    assert_eq!(call(IntrinsicType::DotProduct, &["b"]), SemanticError::ArityMismatch {
        node: "intrinsic call",
        expected: 2,
        found: 1,
    });
    assert_eq!(call(IntrinsicType::Length, &["b", "b"]), SemanticError::ArityMismatch {
        node: "intrinsic call",
        expected: 1,
        found: 2,
    });
}

#[test]
fn test_sample_coordinate_mismatch() {
    let root = multi(vec![
        declare_external(vec![
            external_var("tex", ExpressionType::sampler(ImageType::Cubemap, PrimitiveType::Float32), Some(0)),
        ]),
        declare_function("f", vec![parameter("uv", ExpressionType::vec(2, PrimitiveType::Float32))], ExpressionType::NoType, vec![
            expression(intrinsic(IntrinsicType::SampleTexture, vec![identifier("tex"), identifier("uv")])),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::TypeMismatch {
        node: "intrinsic call",
        expected: "vec3<f32>".to_string(),
        found: "vec2<f32>".to_string(),
    });
}

#[test]
fn test_assign_requires_lvalue() {
    let root = multi(vec![
        declare_function("f", vec![parameter("a", ExpressionType::f32())], ExpressionType::NoType, vec![
            expression(assign(
                binary(BinaryType::Add, identifier("a"), identifier("a")),
                constant(ConstantValue::F32(0.0)),
            )),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::NotAssignable { node: "binary expression" });
}

#[test]
fn test_return_type_checked() {
    let root = multi(vec![
        declare_function("f", vec![], ExpressionType::f32(), vec![
            return_void(),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::TypeMismatch {
        node: "return statement",
        expected: "f32".to_string(),
        found: "()".to_string(),
    });
}

#[test]
fn test_misplaced_statements() {
    let err = semantic_error(multi(vec![
        declare_variable("a", ExpressionType::f32(), None),
    ]));
    assert!(matches!(err, SemanticError::Misplaced { node: "variable declaration", .. }));

    let err = semantic_error(multi(vec![discard()]));
    assert!(matches!(err, SemanticError::Misplaced { node: "discard statement", .. }));

    let err = semantic_error(multi(vec![
        expression(constant(ConstantValue::F32(1.0))),
    ]));
    assert!(matches!(err, SemanticError::Misplaced { node: "expression statement", .. }));

    let err = semantic_error(multi(vec![
        branch(constant(ConstantValue::Bool(true)), no_op(), None),
    ]));
    assert!(matches!(err, SemanticError::Misplaced { node: "branch statement", .. }));

    let err = semantic_error(multi(vec![
        declare_function("f", vec![], ExpressionType::NoType, vec![
            declare_external(vec![]),
        ]),
    ]));
    assert!(matches!(err, SemanticError::Misplaced { node: "external declaration", .. }));
}

#[test]
fn test_external_must_be_uniform_or_sampler() {
    let root = multi(vec![
        declare_external(vec![external_var("x", ExpressionType::f32(), Some(0))]),
    ]);
    assert!(matches!(semantic_error(root), SemanticError::TypeMismatch { node: "external declaration", .. }));
}

#[test]
fn test_uniform_requires_std140() {
    let root = multi(vec![
        declare_struct("Plain", None, vec![member("a", vec3())]),
        declare_external(vec![
            external_var("plain", ExpressionType::uniform(ExpressionType::named("Plain")), Some(0)),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::MissingLayout { struct_name: "Plain".to_string() });

    let root = multi(vec![
        declare_struct("Inner", None, vec![member("a", vec3())]),
        declare_struct("Outer", Some(StructLayout::Std140), vec![
            member("inner", ExpressionType::named("Inner")),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::MissingLayout { struct_name: "Inner".to_string() });

    // Plain structs are still fine outside uniform blocks.
    let root = multi(vec![
        declare_struct("Plain", None, vec![member("a", vec3())]),
        declare_function("f", vec![parameter("p", ExpressionType::named("Plain"))], ExpressionType::NoType, vec![]),
    ]);
    assert!(sanitize_default(root).is_ok());
}

#[test]
fn test_duplicate_struct_member() {
    let root = multi(vec![
        declare_struct("S", None, vec![
            member("a", ExpressionType::f32()),
            member("a", ExpressionType::i32()),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::DuplicateDeclaration { name: "S.a".to_string() });
}

#[test]
fn test_duplicate_entry_point() {
    let root = multi(vec![
        entry_function(ShaderStageType::Fragment, "a", vec![], ExpressionType::NoType, vec![]),
        entry_function(ShaderStageType::Fragment, "b", vec![], ExpressionType::NoType, vec![]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::DuplicateEntryPoint("fragment"));
}

#[test]
fn test_entry_points_recorded() {
    let root = multi(vec![
        declare_function("helper", vec![], ExpressionType::NoType, vec![]),
        entry_function(ShaderStageType::Vertex, "vert", vec![], ExpressionType::NoType, vec![]),
        entry_function(ShaderStageType::Fragment, "frag", vec![], ExpressionType::NoType, vec![]),
    ]);
    let ast = sanitize_default(root).unwrap();
    assert_eq!(ast.entry_points, vec![
        EntryPointDescription { stage: ShaderStageType::Vertex, func_index: 1, name: "vert".to_string() },
        EntryPointDescription { stage: ShaderStageType::Fragment, func_index: 2, name: "frag".to_string() },
    ]);
}

fn option_module() -> Stmt {
    multi(vec![
        declare_option("UseShadows", ExpressionType::bool(), Some(constant(ConstantValue::Bool(true)))),
        declare_function("f", vec![parameter("a", ExpressionType::f32())], ExpressionType::f32(), vec![
            conditional("UseShadows", expression(assign(identifier("a"), constant(ConstantValue::F32(0.0))))),
            return_value(select_opt("UseShadows", identifier("a"), constant(ConstantValue::F32(1.0)))),
        ]),
    ])
}

#[test]
fn test_options_deferred() {
    let ast = sanitize_default(option_module()).unwrap();
    assert_eq!(ast.options, vec![OptionDescription {
        index: 0,
        name: "UseShadows".to_string(),
        ty: ExpressionType::bool(),
        default_value: Some(ConstantValue::Bool(true)),
    }]);

    let statements = &ast.root.as_multi().unwrap().statements;
    assert_eq!(statements[0].as_declare_option().unwrap().opt_index, Some(0));

    let f = function_body(&ast, 1);
    assert_eq!(f.statements[0].as_conditional().unwrap().option_index, Some(0));
    let ret = f.statements[1].as_return().unwrap().return_expr.as_ref().unwrap();
    assert_eq!(ret.as_conditional().unwrap().option_index, Some(0));
    assert_eq!(ret.ty, Some(ExpressionType::f32()));
}

#[test]
fn test_remove_option_declaration() {
    let options = SanitizeOptions {
        remove_option_declaration: true,
        ..Default::default()
    };
    let ast = Sanitizer::apply(option_module(), &options).unwrap();
    let statements = &ast.root.as_multi().unwrap().statements;
    assert!(statements[0].is_no_op());
    // Still usable by conditionals.
    assert_eq!(ast.options.len(), 1);
}

#[test]
fn test_options_resolved() {
    let options = SanitizeOptions {
        remove_option_declaration: false,
        conditional_resolution: ConditionalResolution::Resolve(
            [("UseShadows".to_string(), false)].into_iter().collect(),
        ),
    };
    let ast = Sanitizer::apply(option_module(), &options).unwrap();
    let f = function_body(&ast, 1);
    assert!(f.statements[0].is_no_op());
    let ret = f.statements[1].as_return().unwrap().return_expr.as_ref().unwrap();
    assert_eq!(ret.as_constant().map(|x| x.value), Some(ConstantValue::F32(1.0)));
}

#[test]
fn test_options_resolved_from_initializer() {
    let options = SanitizeOptions {
        remove_option_declaration: false,
        conditional_resolution: ConditionalResolution::Resolve(HashMap::new()),
    };
    let ast = Sanitizer::apply(option_module(), &options).unwrap();
    let f = function_body(&ast, 1);
    assert!(f.statements[0].as_expression().is_some());
    let ret = f.statements[1].as_return().unwrap().return_expr.as_ref().unwrap();
    assert!(ret.as_variable().is_some());
}

#[test]
fn test_undeclared_option() {
    let root = multi(vec![
        declare_function("f", vec![], ExpressionType::NoType, vec![
            conditional("Missing", discard()),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::UndeclaredIdentifier { name: "Missing".to_string() });
}

#[test]
fn test_function_name_misused() {
    let root = multi(vec![
        declare_function("g", vec![], ExpressionType::NoType, vec![]),
        declare_function("f", vec![], ExpressionType::NoType, vec![
            expression(identifier("g")),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::UnexpectedSymbol {
        name: "g".to_string(),
        expected: "variable",
        found: "function",
    });

    let root = multi(vec![
        declare_function("g", vec![], ExpressionType::NoType, vec![]),
        declare_function("f", vec![parameter("p", ExpressionType::named("g"))], ExpressionType::NoType, vec![]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::UnexpectedSymbol {
        name: "g".to_string(),
        expected: "struct",
        found: "function",
    });

    let root = multi(vec![
        declare_function("g", vec![], ExpressionType::NoType, vec![]),
        declare_function("g", vec![], ExpressionType::NoType, vec![]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::DuplicateDeclaration { name: "g".to_string() });
}

#[test]
fn test_option_used_as_variable() {
    let root = multi(vec![
        declare_option("Flag", ExpressionType::bool(), None),
        declare_function("f", vec![], ExpressionType::bool(), vec![
            return_value(identifier("Flag")),
        ]),
    ]);
    assert_eq!(semantic_error(root), SemanticError::UnexpectedSymbol {
        name: "Flag".to_string(),
        expected: "variable",
        found: "option",
    });
}

#[test]
fn test_deterministic() {
    let a = sanitize_default(option_module()).unwrap();
    let b = sanitize_default(option_module()).unwrap();
    assert_eq!(a, b);
}
