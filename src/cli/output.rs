//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{OutputFormat, PikeArgs};
use crate::error::Result;
use crate::query::ResultDefinition;

/// Print a command result in the selected format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &PikeArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
            }
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(result)?),
    }
    Ok(())
}

/// Print search hits one per line, then facet counts.
pub fn output_search(result: &ResultDefinition, args: &PikeArgs) -> Result<()> {
    if args.output_format == OutputFormat::Json {
        return output_result("", result, args);
    }

    println!("{} hits", result.total_hits);
    for document in &result.documents {
        let score = document.score.map(|s| format!("{s:.4}")).unwrap_or_default();
        let engine = document.engine.as_deref().map(|e| format!("[{e}] ")).unwrap_or_default();
        println!(
            "{engine}{} {score} {}",
            document.identity,
            serde_json::to_string(&document.fields)?
        );
    }
    for (dim, labels) in &result.facets {
        println!("{dim}:");
        for facet in labels {
            println!("  {} ({})", facet.label, facet.count);
        }
    }
    for function in &result.functions {
        println!(
            "{}({}) = {}",
            function.function.name(),
            function.field,
            function.value.as_ref().map_or("none".to_string(), |v| v.to_string())
        );
    }
    if args.verbosity() > 1 {
        println!("timer: {}", serde_json::to_string(&result.timer)?);
    }
    Ok(())
}
