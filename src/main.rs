use std::{io::{self, Write}, fs, collections::HashMap};
use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};

use rshaderc::compiler::Compiler;
use rshaderc::compiler::sanitize::{ConditionalResolution, SanitizeOptions};
use rshaderc::compiler::writer::{Environment, SpirvVersion};
use rshaderc::demo::sample_module;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Lang,
    Spirv,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compiles the bundled demo shader module", long_about = None)]
struct Arguments {
    #[arg(short, long, value_enum, default_value_t = Backend::Lang)]
    backend: Backend,
    /// Drop option declarations from the output.
    #[arg(long)]
    remove_options: bool,
    /// Fix an option at compile time, e.g. `HasTexture=false`.
    #[arg(long = "option", value_parser = parse_option)]
    options: Vec<(String, bool)>,
    #[arg(long, value_parser = parse_version, default_value = "1.0")]
    spirv_version: SpirvVersion,
    #[arg(short, long)]
    output: Option<String>,
}

fn parse_option(x: &str) -> Result<(String, bool)> {
    let (name, value) = x.split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=true|false, found `{}`", x))?;
    Ok((name.to_string(), value.parse()?))
}
fn parse_version(x: &str) -> Result<SpirvVersion> {
    let (major, minor) = x.split_once('.')
        .ok_or_else(|| anyhow!("expected MAJOR.MINOR, found `{}`", x))?;
    Ok(SpirvVersion::new(major.parse()?, minor.parse()?))
}

fn open_output(path: &str) -> Result<io::BufWriter<fs::File>> {
    let f = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(io::BufWriter::new(f))
}

fn main() -> Result<()> {
    let args = Arguments::parse();

    let conditional_resolution = if args.options.is_empty() {
        ConditionalResolution::Deferred
    } else {
        ConditionalResolution::Resolve(args.options.into_iter().collect::<HashMap<_, _>>())
    };
    let options = SanitizeOptions {
        remove_option_declaration: args.remove_options,
        conditional_resolution,
    };
    let env = Environment {
        spirv_version: args.spirv_version,
    };

    match args.backend {
        Backend::Lang => {
            let code = Compiler::compile_lang(sample_module(), &options, &env)?;
            match args.output {
                Some(path) => open_output(&path)?.write_all(code.as_bytes())?,
                None => println!("{}", code),
            }
        }
        Backend::Spirv => {
            let spirv = Compiler::compile_spirv(sample_module(), &options, &env)?;
            let path = args.output.unwrap_or_else(|| "demo.spv".to_string());
            open_output(&path)?.write_all(&spirv.to_bytes())?;
        }
    }
    Ok(())
}
