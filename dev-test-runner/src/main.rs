//! Runs every fixture design through the generator and checks the
//! properties callers rely on: determinism, one helper per name, and
//! agreement between `transform` and `collect_helpers`.
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use serde::Serialize;

use shapeshift::design::{Design, DesignRequest};

#[derive(Serialize, Debug)]
struct Failure {
    design: String,
    request: String,
    reason: String,
}

fn fixture_pattern() -> String {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("fixtures");
    format!("{}/*.json", root.display())
}

fn check_request(design: &Design, request: &DesignRequest) -> Result<usize, String> {
    let req = request.as_request();
    let first = shapeshift::transform(&design.types, &req).map_err(|e| e.to_string())?;
    let second = shapeshift::transform(&design.types, &req).map_err(|e| e.to_string())?;
    if first != second {
        return Err("output differs between two identical runs".to_string());
    }
    let mut names = BTreeSet::new();
    for helper in &first.helpers {
        if !names.insert(helper.name.as_str()) {
            return Err(format!("helper {} emitted twice", helper.name));
        }
    }
    let collected = shapeshift::collect_helpers(&design.types, &req).map_err(|e| e.to_string())?;
    if collected != first.helpers {
        return Err("collect_helpers disagrees with transform".to_string());
    }
    Ok(first.helpers.len())
}

fn main() -> ExitCode {
    let pattern = fixture_pattern();
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect::<Vec<_>>(),
        Err(error) => {
            eprintln!("❌ invalid fixture pattern {pattern}: {error}");
            return ExitCode::FAILURE;
        }
    };
    let mut failures = Vec::new();
    let mut passed = 0;
    for path in paths {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let design = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|src| Design::parse(&src).map_err(|e| e.to_string()));
        let design = match design {
            Ok(design) => design,
            Err(reason) => {
                eprintln!("❌ {name}: {reason}");
                failures.push(Failure { design: name, request: String::new(), reason });
                continue;
            }
        };
        for request in &design.requests {
            match check_request(&design, request) {
                Ok(helpers) => {
                    passed += 1;
                    eprintln!("✅ {name} {} ({} helpers)", request.name.green(), helpers);
                }
                Err(reason) => {
                    eprintln!("❌ {name} {}: {reason}", request.name.red());
                    failures.push(Failure { design: name.clone(), request: request.name.clone(), reason });
                }
            }
        }
    }
    eprintln!("—— {passed} passed, {} failed ——", failures.len());
    if failures.is_empty() {
        return ExitCode::SUCCESS;
    }
    if let Ok(report) = serde_json::to_string_pretty(&failures) {
        println!("{report}");
    }
    ExitCode::FAILURE
}
