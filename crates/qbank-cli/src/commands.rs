use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use qbank_server::{QbankServer, ServerConfig};
use qbank_store::{KeyedObjectStore, Namespace, StoreConfig};
use serde_json::Value;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Namespaces => cmd_namespaces(&format),
        Command::Serve(args) => cmd_serve(args).await,
        command => {
            let store = open_store(cli.config.as_deref()).await?;
            match command {
                Command::Get(args) => cmd_get(&store, args, &format),
                Command::Set(args) => cmd_set(&store, args).await,
                Command::Replace(args) => cmd_replace(&store, args).await,
                Command::Clear(args) => cmd_clear(&store, args).await,
                Command::Color(args) => cmd_color(&store, args, &format),
                Command::Namespaces | Command::Serve(_) => Ok(()),
            }
        }
    }
}

async fn open_store(config: Option<&Path>) -> anyhow::Result<KeyedObjectStore> {
    let config = match config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("cannot read config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    let store = config.build()?;
    if store.is_mirrored() {
        store
            .load_remote()
            .await
            .context("cannot load state from the storage server")?;
    }
    Ok(store)
}

fn render(value: &Value, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => value.to_string(),
        OutputFormat::Text => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
    }
}

fn parse_json(text: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).with_context(|| format!("not valid JSON: {text}"))
}

fn cmd_namespaces(format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let names: Vec<&str> = Namespace::ALL.iter().map(|ns| ns.as_str()).collect();
            println!("{}", Value::from(names));
        }
        OutputFormat::Text => {
            for ns in Namespace::ALL {
                let kind = if ns.is_scalar() { "string" } else { "object" };
                let place = if ns.is_local_only() { "local" } else { "synced" };
                println!("{:<10} {:<7} {}", ns.as_str().bold(), kind, place.dimmed());
            }
        }
    }
    Ok(())
}

fn cmd_get(store: &KeyedObjectStore, args: GetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ns: Namespace = args.namespace.parse()?;
    if ns.is_scalar() {
        println!("{}", store.get_color()?);
        return Ok(());
    }
    match args.key {
        Some(key) => match store.get_entry(ns, &key)? {
            Some(value) => println!("{}", render(&value, format)),
            None => println!("{}[{}] {}", ns, key.yellow(), "(not set)".dimmed()),
        },
        None => println!("{}", render(&Value::Object(store.get_object(ns)?), format)),
    }
    Ok(())
}

async fn cmd_set(store: &KeyedObjectStore, args: SetArgs) -> anyhow::Result<()> {
    let ns: Namespace = args.namespace.parse()?;
    let value = parse_json(&args.value)?;
    store.set_sub_key(ns, &args.key, &value)?.wait().await;
    println!("{} Set {}[{}]", "✓".green().bold(), ns, args.key.yellow());
    Ok(())
}

async fn cmd_replace(store: &KeyedObjectStore, args: ReplaceArgs) -> anyhow::Result<()> {
    let ns: Namespace = args.namespace.parse()?;
    let Value::Object(map) = parse_json(&args.value)? else {
        bail!("{ns} must be replaced with a JSON object");
    };
    let count = map.len();
    store.replace_namespace(ns, map)?.wait().await;
    println!("{} Replaced {} ({} entries)", "✓".green().bold(), ns.to_string().bold(), count);
    Ok(())
}

async fn cmd_clear(store: &KeyedObjectStore, args: ClearArgs) -> anyhow::Result<()> {
    let ns: Namespace = args.namespace.parse()?;
    match &args.key {
        Some(key) => {
            store.clear_sub_key(ns, key)?.wait().await;
            println!("{} Cleared {}[{}]", "✓".green().bold(), ns, key.yellow());
        }
        None => {
            store.clear_namespace(ns)?.wait().await;
            println!("{} Cleared {}", "✓".green().bold(), ns.to_string().bold());
        }
    }
    Ok(())
}

fn cmd_color(store: &KeyedObjectStore, args: ColorArgs, format: &OutputFormat) -> anyhow::Result<()> {
    if args.clear {
        store.clear_color()?;
        println!("{} Color cleared", "✓".green().bold());
    } else if let Some(color) = &args.value {
        store.save_color(color)?;
        println!("{} Color set to {}", "✓".green().bold(), color.bold());
    } else {
        let color = store.get_color()?;
        match format {
            OutputFormat::Json => println!("{}", Value::from(color)),
            OutputFormat::Text if color.is_empty() => println!("{}", "(not set)".dimmed()),
            OutputFormat::Text => println!("{color}"),
        }
    }
    Ok(())
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address: {bind}"))?;
    }
    if args.data.is_some() {
        config.data_path = args.data;
    }
    println!(
        "qbank storage server on {} ({})",
        config.bind_addr.to_string().bold(),
        config
            .data_path
            .as_ref()
            .map_or_else(|| "in memory".to_string(), |p| p.display().to_string())
    );
    QbankServer::new(config).serve().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    fn local_config(dir: &Path) -> std::path::PathBuf {
        let config = dir.join("qbank.toml");
        let state = dir.join("state.json");
        std::fs::write(
            &config,
            format!(
                "app_prefix = \"test\"\n[backend]\nmode = \"local\"\npath = {:?}\n",
                state.display().to_string()
            ),
        )
        .unwrap();
        config
    }

    async fn run(args: &[&str]) -> anyhow::Result<()> {
        run_command(Cli::try_parse_from(args).unwrap()).await
    }

    #[test]
    fn render_formats() {
        let value = json!({"a": 1});
        assert_eq!(render(&value, &OutputFormat::Json), r#"{"a":1}"#);
        assert!(render(&value, &OutputFormat::Text).contains('\n'));
    }

    #[tokio::test]
    async fn set_and_clear_through_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());
        let config = config.to_str().unwrap();

        run(&["qbank", "-c", config, "set", "mastery", "0,2", "3"]).await.unwrap();
        run(&["qbank", "-c", config, "set", "mastery", "0,5", "5"]).await.unwrap();
        run(&["qbank", "-c", config, "clear", "mastery", "0,2"]).await.unwrap();
        run(&["qbank", "-c", config, "color", "#FF0000"]).await.unwrap();
        run(&["qbank", "-c", config, "get", "mastery"]).await.unwrap();

        let store = open_store(Some(Path::new(config))).await.unwrap();
        assert_eq!(
            Value::Object(store.get_object(Namespace::Mastery).unwrap()),
            json!({"0,5": 5})
        );
        assert_eq!(store.get_color().unwrap(), "#FF0000");
    }

    #[tokio::test]
    async fn replace_requires_object() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());
        let config = config.to_str().unwrap();
        assert!(run(&["qbank", "-c", config, "replace", "notes", "[1]"]).await.is_err());
        assert!(run(&["qbank", "-c", config, "set", "notes", "k", "{bad"]).await.is_err());
        assert!(run(&["qbank", "-c", config, "get", "bogus"]).await.is_err());
    }

    #[tokio::test]
    async fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(open_store(Some(&missing)).await.is_err());
    }
}
