//! Command implementations for the pike CLI.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::analysis::catalog::AnalyzerCatalog;
use crate::cli::args::*;
use crate::cli::output::{output_result, output_search};
use crate::config::ManagerConfig;
use crate::document::document::Document;
use crate::error::{PikeError, Result};
use crate::index::IndexEngine;
use crate::manager::IndexManager;
use crate::query::{Operator, QueryDefinition, SortDirection, SortField};
use crate::schema::FieldDeclaration;

#[derive(Debug, Serialize)]
struct WriteSummary {
    index: String,
    documents: usize,
    version: u64,
    duration_ms: u64,
}

#[derive(Debug, Serialize)]
struct DeleteSummary {
    index: String,
    deleted: u64,
}

/// Execute a CLI command.
pub fn execute_command(args: PikeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)?,
        None => ManagerConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_directory = dir.clone();
    }
    let manager = IndexManager::open(config)?;

    let outcome = match &args.command {
        Command::Schema(schema_args) => schema(&manager, schema_args, &args),
        Command::Index(index_args) => index(&manager, index_args, &args),
        Command::Search(search_args) => search(&manager, search_args, &args),
        Command::Status(status_args) => status(&manager, status_args, &args),
        Command::Delete(delete_args) => delete(&manager, delete_args, &args),
    };
    manager.close();
    outcome
}

fn existing(manager: &IndexManager, name: &str) -> Result<Arc<IndexEngine>> {
    manager
        .get(name)
        .ok_or_else(|| PikeError::not_found(format!("index {name}")))
}

fn schema(manager: &IndexManager, args: &SchemaArgs, cli_args: &PikeArgs) -> Result<()> {
    let engine = manager.get_or_create(&args.index)?;
    if let Some(path) = &args.analyzers {
        let catalog: AnalyzerCatalog = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        engine.update_analyzers(catalog)?;
    }
    if let Some(path) = &args.fields {
        let declarations: Vec<FieldDeclaration> =
            serde_json::from_str(&std::fs::read_to_string(path)?)?;
        engine.update_schema(declarations)?;
    }
    output_result(
        &format!("Schema of {}", args.index),
        &engine.field_map().declarations(),
        cli_args,
    )
}

/// Documents from a JSON array or from JSON lines.
fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim_start().starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(&content)?;
        return values.iter().map(Document::from_json).collect();
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            let value: Value = serde_json::from_str(line).map_err(|e| {
                PikeError::document(format!("line {}: {e}", number + 1))
            })?;
            Document::from_json(&value)
        })
        .collect()
}

fn index(manager: &IndexManager, args: &IndexArgs, cli_args: &PikeArgs) -> Result<()> {
    let engine = manager.get_or_create(&args.index)?;
    let documents = read_documents(&args.file)?;
    let started = Instant::now();

    for batch in documents.chunks(args.batch_size.max(1)) {
        if args.values_only {
            engine.update_values(batch)?;
        } else {
            engine.write(batch)?;
        }
        if cli_args.verbosity() > 1 {
            eprintln!("committed {} documents", batch.len());
        }
    }

    output_result(
        "Documents written",
        &WriteSummary {
            index: args.index.clone(),
            documents: documents.len(),
            version: engine.version(),
            duration_ms: started.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

fn parse_sort(value: &str) -> Result<SortField> {
    let (field, direction) = match value.rsplit_once(':') {
        Some((field, "asc")) => (field, Some(SortDirection::Asc)),
        Some((field, "desc")) => (field, Some(SortDirection::Desc)),
        Some((_, other)) => {
            return Err(PikeError::query(format!("Unknown sort direction: {other}")));
        }
        None => (value, None),
    };
    Ok(SortField {
        field: field.to_string(),
        direction,
    })
}

fn search(manager: &IndexManager, args: &SearchArgs, cli_args: &PikeArgs) -> Result<()> {
    let mut definition = match &args.definition {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => QueryDefinition::new(),
    };
    if let Some(text) = &args.query {
        definition.query_string = Some(text.clone());
    }
    if args.field.is_some() {
        definition.default_field = args.field.clone();
    }
    if args.and {
        definition.default_operator = Operator::And;
    }
    if args.rows.is_some() {
        definition.rows = args.rows;
    }
    if args.start > 0 {
        definition.start = args.start;
    }
    for sort in &args.sort {
        definition.sort.push(parse_sort(sort)?);
    }
    for dim in &args.facets {
        definition = definition.facet(dim.clone(), 10);
    }

    let names = args.index_names();
    let result = match names.as_slice() {
        [name] => existing(manager, name)?.search(&definition)?,
        _ => {
            let federation = manager.federation(&names.join(","));
            for name in &names {
                if !federation.engine_names().iter().any(|n| n == name) {
                    federation.register(existing(manager, name)?)?;
                }
            }
            federation.search(&definition)?
        }
    };
    output_search(&result, cli_args)
}

fn status(manager: &IndexManager, args: &StatusArgs, cli_args: &PikeArgs) -> Result<()> {
    match &args.index {
        Some(name) => output_result("Index status", &existing(manager, name)?.status()?, cli_args),
        None => {
            let statuses = manager
                .list()
                .iter()
                .map(|name| existing(manager, name)?.status())
                .collect::<Result<Vec<_>>>()?;
            output_result("Indexes", &statuses, cli_args)
        }
    }
}

fn delete(manager: &IndexManager, args: &DeleteArgs, cli_args: &PikeArgs) -> Result<()> {
    if args.drop {
        if !manager.delete(&args.index)? {
            return Err(PikeError::not_found(format!("index {}", args.index)));
        }
        return output_result(
            "Index deleted",
            &DeleteSummary {
                index: args.index.clone(),
                deleted: 0,
            },
            cli_args,
        );
    }

    let engine = existing(manager, &args.index)?;
    let deleted = if args.all {
        engine.delete_all()?
    } else {
        engine.delete(&args.ids)?
    };
    output_result(
        "Documents deleted",
        &DeleteSummary {
            index: args.index.clone(),
            deleted,
        },
        cli_args,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("price:desc").unwrap(), SortField::desc("price"));
        assert_eq!(parse_sort("name:asc").unwrap(), SortField::asc("name"));
        assert!(parse_sort("$score").unwrap().is_score());
        assert!(parse_sort("price:up").is_err());
    }

    #[test]
    fn test_read_documents_formats() {
        let dir = tempfile::TempDir::new().unwrap();
        let lines = dir.path().join("docs.jsonl");
        std::fs::write(&lines, "{\"$id$\": \"1\", \"title\": \"a\"}\n\n{\"title\": \"b\"}\n").unwrap();
        assert_eq!(read_documents(&lines).unwrap().len(), 2);

        let array = dir.path().join("docs.json");
        std::fs::write(&array, r#"[{"title": "a"}]"#).unwrap();
        assert_eq!(read_documents(&array).unwrap().len(), 1);

        std::fs::write(&lines, "{\"title\": \"a\"}\nnot json\n").unwrap();
        assert!(read_documents(&lines).is_err());
    }
}
