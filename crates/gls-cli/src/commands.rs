use anyhow::Context;
use colored::Colorize;
use gls_store::{FileStore, KeyValueStore, StoreConfig, StoredValue, ValueKind};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let dir = config.data_dir.display().to_string();
    let mut store =
        FileStore::open(config).with_context(|| format!("failed to open store in {dir}"))?;

    match cli.command {
        Command::Save(args) => cmd_save(&mut store, args),
        Command::Load(args) => cmd_load(&store, args, &cli.format),
        Command::Delete(args) => cmd_delete(&mut store, args),
        Command::List(_) => cmd_list(&store, &cli.format),
        Command::Info(_) => cmd_info(&store, &cli.format),
    }?;

    store.close()?;
    Ok(())
}

/// Config file (or environment defaults), then `--dir` on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let config = match &cli.config {
        Some(path) => StoreConfig::from_toml_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => StoreConfig::from_env(),
    };
    Ok(match &cli.dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn parse_value(kind: ValueArg, raw: &str) -> anyhow::Result<StoredValue> {
    Ok(match kind {
        ValueArg::Number => StoredValue::Number(
            raw.parse::<f64>()
                .with_context(|| format!("not a number: {raw:?}"))?,
        ),
        ValueArg::String => StoredValue::Text(raw.to_string()),
        ValueArg::Bool => StoredValue::Bool(
            raw.parse::<bool>()
                .with_context(|| format!("not a bool: {raw:?}"))?,
        ),
        ValueArg::Json => StoredValue::Object(
            serde_json::from_str(raw).with_context(|| format!("not valid JSON: {raw:?}"))?,
        ),
    })
}

fn cmd_save(store: &mut FileStore, args: SaveArgs) -> anyhow::Result<()> {
    let value = parse_value(args.kind, &args.value)?;
    let kind = value.kind();
    store.save(&args.key, value)?;
    println!("{} Saved {} ({})", "✓".green().bold(), args.key.bold(), kind.to_string().cyan());
    Ok(())
}

fn cmd_load(store: &FileStore, args: LoadArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let value = store.load(&args.key)?;
    match format {
        OutputFormat::Text => match &value {
            StoredValue::Object(v) => println!("{}", serde_json::to_string_pretty(v)?),
            other => println!("{other}"),
        },
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "key": args.key,
                "kind": value.kind(),
                "value": value.to_json(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn cmd_delete(store: &mut FileStore, args: DeleteArgs) -> anyhow::Result<()> {
    if store.delete(&args.key)? {
        println!("Deleted {}", args.key.yellow());
    } else {
        println!("{} not present", args.key.yellow());
    }
    Ok(())
}

fn cmd_list(store: &FileStore, format: &OutputFormat) -> anyhow::Result<()> {
    let keys = store.keys();
    match format {
        OutputFormat::Text => {
            if keys.is_empty() {
                println!("No keys stored.");
            }
            for (key, kind) in &keys {
                println!("  {:<8} {}", kind.to_string().cyan(), key);
            }
        }
        OutputFormat::Json => {
            let doc: Vec<_> = keys
                .iter()
                .map(|(key, kind)| serde_json::json!({ "key": key, "kind": kind }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn cmd_info(store: &FileStore, format: &OutputFormat) -> anyhow::Result<()> {
    let count = |kind: ValueKind| store.keys().iter().filter(|(_, k)| *k == kind).count();
    let (numbers, texts, bools, objects) = (
        count(ValueKind::Number),
        count(ValueKind::Text),
        count(ValueKind::Bool),
        count(ValueKind::Object),
    );

    match format {
        OutputFormat::Text => {
            println!("Data directory: {}", store.data_dir().display().to_string().bold());
            println!("Index: {}", store.index_path().display());
            println!(
                "Keys: {} ({} numbers, {} text, {} bools, {} objects)",
                store.len().to_string().bold(),
                numbers,
                texts,
                bools,
                objects
            );
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "data_dir": store.data_dir(),
                "index": store.index_path(),
                "keys": store.len(),
                "numbers": numbers,
                "text": texts,
                "bools": bools,
                "objects": objects,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
