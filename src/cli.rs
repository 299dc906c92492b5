//! CLI: design documents → (go | helpers)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use shapeshift::codegen::{append_helpers, HelperDescriptor, HelperRegistry};
use shapeshift::design::{Design, DesignRequest};
use shapeshift::{Direction, TransformError};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate Go conversion code between the shapes declared in design documents
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the conversion statements of each request followed by its helper functions
    Go(GoOut),
    /// print the helper descriptors of each request as JSON
    Helpers(HelpersOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more design documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// only process the request with this name
    #[arg(long)]
    request: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct GoOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// thread one helper registry through all requests of a document
    #[arg(long)]
    shared_registry: bool,

    /// output .go file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct HelpersOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(Serialize, Debug)]
struct HelperReport<'a> {
    design: String,
    request: &'a str,
    direction: Direction,
    helpers: Vec<HelperDescriptor>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_designs(&self) -> anyhow::Result<Vec<(PathBuf, Design)>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut designs = Vec::with_capacity(source_paths.len());
        for source_path in source_paths {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read design file {}", source_path.display()))?;
            let design = Design::parse(&source)
                .with_context(|| format!("invalid design file {}", source_path.display()))?;
            info!(path = %source_path.display(), requests = design.requests.len(), "loaded design");
            designs.push((source_path, design));
        }
        Ok(designs)
    }

    fn selected<'d>(&self, design: &'d Design) -> Vec<&'d DesignRequest> {
        design.requests.iter()
            .filter(|r| self.request.as_ref().is_none_or(|name| &r.name == name))
            .collect()
    }

    fn ensure_matched(&self, matched: usize) -> anyhow::Result<()> {
        match &self.request {
            Some(name) if matched == 0 => bail!("no request named `{name}` in the given designs"),
            _ => Ok(()),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Go(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let settings = &target.input_settings;
                let designs = settings.load_designs()?;
                let mut sections = Vec::new();
                let mut matched = 0;
                for (path, design) in &designs {
                    let requests = settings.selected(design);
                    if requests.is_empty() {
                        continue;
                    }
                    matched += requests.len();
                    let section = render_go(design, &requests, target.shared_registry)
                        .with_context(|| format!("failed to generate code for {}", path.display()))?;
                    sections.push(section);
                }
                settings.ensure_matched(matched)?;
                write_output(target.out.as_deref(), &sections.join("\n"))
            }
            Command::Helpers(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let settings = &target.input_settings;
                let designs = settings.load_designs()?;
                let mut reports = Vec::new();
                for (path, design) in &designs {
                    for request in settings.selected(design) {
                        let helpers = shapeshift::collect_helpers(&design.types, &request.as_request())
                            .with_context(|| format!("request `{}` in {}", request.name, path.display()))?;
                        reports.push(HelperReport {
                            design: path.display().to_string(),
                            request: &request.name,
                            direction: request.direction,
                            helpers,
                        });
                    }
                }
                settings.ensure_matched(reports.len())?;
                let json = serde_json::to_string_pretty(&reports).context("failed to serialize helpers")?;
                write_output(target.out.as_deref(), &json)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Statements of every request, then each distinct helper once.
fn render_go(design: &Design, requests: &[&DesignRequest], shared: bool) -> Result<String, TransformError> {
    let (codes, helpers) = if shared {
        let mut registry = HelperRegistry::new();
        let mut codes = Vec::with_capacity(requests.len());
        for request in requests {
            codes.push(shapeshift::transform_with(&design.types, &request.as_request(), &mut registry)?);
        }
        (codes, registry.into_helpers())
    } else {
        let transforms = requests
            .par_iter()
            .map(|request| shapeshift::transform(&design.types, &request.as_request()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut codes = Vec::with_capacity(transforms.len());
        let mut helpers = Vec::new();
        for transform in transforms {
            codes.push(transform.code);
            helpers = append_helpers(helpers, transform.helpers);
        }
        (codes, helpers)
    };
    let mut out = String::new();
    for (request, code) in requests.iter().zip(codes) {
        out.push_str(&format!(
            "// {}: {} -> {} ({})\n{code}\n\n",
            request.name,
            design.types.describe(&request.source),
            design.types.describe(&request.target),
            request.direction,
        ));
    }
    for helper in &helpers {
        out.push_str(&helper.render());
        out.push('\n');
    }
    Ok(out.trim_end().to_string())
}

fn write_output(out: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, format!("{content}\n"))
                .with_context(|| format!("failed to write {}", out.display()))?;
            eprintln!("✅ wrote {}", out.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
