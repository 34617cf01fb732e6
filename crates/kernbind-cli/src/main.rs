use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use kernbind_opt::{CompileContext, PassManager, PassOptions, SamplerMap};

/// kernbind: descriptor binding for OpenCL C kernel IR
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input IR text file
    input: PathBuf,

    /// Literal sampler map file
    #[arg(long)]
    sampler_map: Option<PathBuf>,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Prove which helper parameters always receive one bound resource
    #[arg(long)]
    direct_resource_access: bool,

    /// Rewrite proven parameters to call their accessor directly
    #[arg(long, requires = "direct_resource_access")]
    rewrite_direct_access: bool,

    /// Trace discriminant to index mappings
    #[arg(long)]
    show_discriminants: bool,

    /// Trace descriptor set and binding assignments
    #[arg(long)]
    show_descriptors: bool,

    /// Trace direct resource access verdicts
    #[arg(long = "show-dra")]
    show_direct_access: bool,

    /// Run the passes without producing output
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read the IR.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;
    let mut module = kernbind_parser::parse(&source)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("failed to parse {}", cli.input.display()))?;

    // 2. Read the sampler map, if any.
    let sampler_map = match &cli.sampler_map {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            kernbind_parser::parse_sampler_map(&text)
                .map_err(|e| miette::miette!("{e}"))
                .wrap_err_with(|| format!("invalid sampler map {}", path.display()))?
        }
        None => SamplerMap::new(),
    };

    // 3. Bind descriptors.
    let options = PassOptions {
        direct_resource_access: cli.direct_resource_access,
        rewrite_direct_access: cli.rewrite_direct_access,
        show_discriminants: cli.show_discriminants,
        show_descriptors: cli.show_descriptors,
        show_direct_access: cli.show_direct_access,
    };
    let mut ctx = CompileContext::new(options.clone(), sampler_map);
    PassManager::standard(&options)
        .run(&mut module, &mut ctx)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("descriptor binding failed")?;

    if let Some(report) = &ctx.allocation {
        log::debug!(
            "{} literal sampler(s), {} kernel argument(s), {} descriptor set(s)",
            report.literal_samplers.len(),
            report.arguments.len(),
            ctx.descriptors.next_set()
        );
    }

    // 4. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 5. Write the bound module.
    let text = kernbind_ir::dump_module(&module);
    match &cli.output {
        Some(path) => std::fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }

    Ok(())
}
