use super::*;
use compiler::Compiler;
use compiler::ast::builder::*;
use compiler::ast::ExpressionType;
use compiler::common::SemanticError;
use compiler::sanitize::{ConditionalResolution, SanitizeOptions};
use compiler::writer::{Environment, SpirvVersion};
use demo::sample_module;
use pretty_assertions::assert_eq;

const DEMO_SOURCE: &'static str = r#"
[layout(std140)]
struct ViewerData
{
	projectionMatrix: mat4<f32>,
	viewMatrix: mat4<f32>
}
struct VertIn
{
	[location(0)] pos: vec3<f32>,
	[location(1)] uv: vec2<f32>
}
struct VertOut
{
	[builtin(position)] position: vec4<f32>,
	[location(0)] uv: vec2<f32>
}
struct FragIn
{
	[location(0)] uv: vec2<f32>
}
struct FragOut
{
	[location(0)] color: vec4<f32>
}
external
{
	[binding(0)] viewerData: uniform<ViewerData>,
	[binding(1)] tex: sampler2D<f32>
}
option HasTexture: bool = true;
[entry(vert)]
fn vert_main(input: VertIn) -> VertOut
{
	let output: VertOut;
	output.position = (viewerData.projectionMatrix * viewerData.viewMatrix) * (vec4<f32>(input.pos, 1.0));
	output.uv = input.uv;
	return output;
}
[entry(frag)]
fn frag_main(input: FragIn) -> FragOut
{
	let output: FragOut;
	output.color = select_opt(HasTexture, texture(tex, input.uv), vec4<f32>(1.0, 1.0, 1.0, 1.0));
	if ((output.color.w) < (0.5))
	{
		discard;
	}
	return output;
}
"#;

fn resolve(values: &[(&str, bool)]) -> SanitizeOptions {
    let values = values.iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect();
    SanitizeOptions {
        conditional_resolution: ConditionalResolution::Resolve(values),
        ..Default::default()
    }
}

#[test]
fn test_compile_demo_lang() {
    let code = Compiler::compile_lang(sample_module(), &SanitizeOptions::default(), &Environment::default()).unwrap();
    assert_eq!(code, DEMO_SOURCE.trim());
}

#[test]
fn test_compile_demo_lang_resolved() {
    let mut options = resolve(&[("HasTexture", false)]);
    options.remove_option_declaration = true;
    let code = Compiler::compile_lang(sample_module(), &options, &Environment::default()).unwrap();
    assert!(!code.contains("select_opt"));
    assert!(!code.contains("option HasTexture"));
    assert!(code.contains("\toutput.color = vec4<f32>(1.0, 1.0, 1.0, 1.0);\n"));

    let options = resolve(&[("HasTexture", true)]);
    let code = Compiler::compile_lang(sample_module(), &options, &Environment::default()).unwrap();
    assert!(code.contains("\toutput.color = texture(tex, input.uv);\n"));
}

#[test]
fn test_compile_demo_spirv() {
    let spirv = Compiler::compile_spirv(sample_module(), &SanitizeOptions::default(), &Environment::default()).unwrap();
    let words = spirv.to_words();
    assert_eq!(words[0], 0x07230203);
    assert_eq!(words[1], 0x00010000);
    assert_eq!(words[3], spirv.header.bound);

    let dis = spirv.disassemble();
    assert!(dis.contains("OpCapability Shader"));
    assert!(dis.contains("OpEntryPoint Vertex"));
    assert!(dis.contains("OpEntryPoint Fragment"));
    assert!(dis.contains("OpSpecConstantTrue"));
    assert!(dis.contains("OpMatrixTimesMatrix"));
    assert!(dis.contains("OpMatrixTimesVector"));
    assert!(dis.contains("OpImageSampleImplicitLod"));
    assert!(dis.contains("OpKill"));
}

#[test]
fn test_entry_interface_lists_globals_from_1_4() {
    fn interface_lengths(version: SpirvVersion) -> Vec<usize> {
        let env = Environment { spirv_version: version };
        let binary = Compiler::compile_spirv(sample_module(), &SanitizeOptions::default(), &env).unwrap();
        binary.instrs.iter()
            .filter(|x| x.opcode == spirv::Op::EntryPoint)
            .map(|x| x.operands.len())
            .collect()
    }
    // "vert_main" and "frag_main" both take three words.
    assert_eq!(interface_lengths(SpirvVersion::new(1, 0)), vec![2 + 3 + 4, 2 + 3 + 2]);
    assert_eq!(interface_lengths(SpirvVersion::new(1, 4)), vec![2 + 3 + 6, 2 + 3 + 4]);
}

#[test]
fn test_compile_deterministic() {
    let options = SanitizeOptions::default();
    let env = Environment::default();
    let a = Compiler::compile_lang(sample_module(), &options, &env).unwrap();
    let b = Compiler::compile_lang(sample_module(), &options, &env).unwrap();
    assert_eq!(a, b);
    let a = Compiler::compile_spirv(sample_module(), &options, &env).unwrap();
    let b = Compiler::compile_spirv(sample_module(), &options, &env).unwrap();
    assert_eq!(a.to_bytes(), b.to_bytes());
}

#[test]
fn test_compile_undeclared_identifier() {
    let make = || multi(vec![
        declare_function("f", vec![], ExpressionType::NoType, vec![
            expression(identifier("foo")),
        ]),
    ]);
    let options = SanitizeOptions::default();
    let env = Environment::default();

    let err = Compiler::compile_lang(make(), &options, &env).unwrap_err();
    assert_eq!(
        err.downcast_ref::<SemanticError>(),
        Some(&SemanticError::UndeclaredIdentifier { name: "foo".to_string() }),
    );
    let err = Compiler::compile_spirv(make(), &options, &env).unwrap_err();
    assert!(err.to_string().contains("foo"));
}
