use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use palette_config::{AppConfig, LoggingConfig, StoreConfig, StoreKind};
use palette_core::{
    required_fields, validate_config, AdapterRegistry, BackendConfig, BackendType,
    ConnectionManager, ConnectionStore, EntityKind, ManagerSettings, Patch, ProbeOutcome,
    RestoreOutcome,
};
use palette_firestore_adapter::FirestoreAdapterFactory;
use palette_kv_store::UnifiedKeyValueStore;
use palette_supabase_adapter::SupabaseAdapterFactory;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "palette")]
#[command(about = "Palette storage backend manager", long_about = None)]
struct Cli {
    /// Path to configuration directory
    #[arg(short, long, default_value = "config", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BackendArgs {
    /// Backend type (firebase, supabase, mongodb, postgresql, mysql, sqlite, airtable, notion)
    #[arg(short = 't', long = "type")]
    backend_type: BackendType,

    /// JSON or YAML file holding the backend settings
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Single setting, may be repeated; applied after --file
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List backend types and the fields they require
    Backends,

    /// Check a backend configuration without connecting
    Validate(BackendArgs),

    /// Try a backend configuration without saving it
    Test(BackendArgs),

    /// Connect, save the configuration and make it active
    Connect {
        /// Unique name for the saved configuration
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// List saved connection configurations
    Saved,

    /// Mark a saved configuration as the active one
    Activate { name: String },

    /// Remove a saved configuration
    Forget { name: String },

    /// Work with records on the active connection
    Records {
        #[command(subcommand)]
        action: RecordAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Palettes,
    Collections,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Palettes => EntityKind::Palettes,
            KindArg::Collections => EntityKind::Collections,
        }
    }
}

#[derive(Subcommand)]
enum RecordAction {
    /// List every record of a kind
    List { kind: KindArg },

    Get { kind: KindArg, id: String },

    /// Create a record from a JSON object
    Create {
        kind: KindArg,
        #[arg(long)]
        json: String,
    },

    /// Merge a JSON object into a record
    Update {
        kind: KindArg,
        id: String,
        #[arg(long)]
        json: String,
    },

    Delete { kind: KindArg, id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let app_config = AppConfig::load(&cli.config_dir)?;
    init_tracing(&app_config.logging)?;

    let command = match cli.command {
        Commands::Backends => return list_backends(),
        Commands::Validate(args) => return validate(&args),
        other => other,
    };

    let manager = build_manager(&app_config).await?;
    let outcome = run(command, &manager).await;
    manager.disconnect_all().await;
    outcome
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = match logging.level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout is reserved for command output
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn build_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(FirestoreAdapterFactory));
    registry.register(Arc::new(SupabaseAdapterFactory));
    info!("Available backends: {:?}", registry.list_supported());
    registry
}

async fn build_store(config: &StoreConfig) -> anyhow::Result<UnifiedKeyValueStore> {
    let store = match config.kind {
        StoreKind::Memory => UnifiedKeyValueStore::in_memory(),
        StoreKind::File => {
            info!("Using file-based connection store in {}", config.dir.display());
            UnifiedKeyValueStore::from_dir(&config.dir)
        }
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("store.database_url is required for the postgres store"))?;
            info!("Using PostgreSQL connection store");
            UnifiedKeyValueStore::from_postgres(url).await?
        }
    };
    Ok(store)
}

async fn build_manager(app_config: &AppConfig) -> anyhow::Result<ConnectionManager> {
    let kv = build_store(&app_config.store).await?;
    let settings = ManagerSettings {
        operation_timeout: app_config.registry.operation_timeout(),
    };
    Ok(ConnectionManager::with_settings(
        Arc::new(build_registry()),
        ConnectionStore::new(Arc::new(kv)),
        settings,
    ))
}

async fn run(command: Commands, manager: &ConnectionManager) -> anyhow::Result<()> {
    match command {
        Commands::Backends | Commands::Validate(_) => Ok(()),

        Commands::Test(args) => {
            let config = backend_config(&args)?;
            let probe = manager.test_connection(args.backend_type, &config).await?;
            println!("✓ {} configuration works", args.backend_type);
            print_probe(probe);
            Ok(())
        }

        Commands::Connect { name, backend } => {
            let config = backend_config(&backend)?;
            let id = manager
                .connect_to_backend(config, backend.backend_type, &name)
                .await?;
            println!("✓ Connected to '{}' ({})", name, backend.backend_type);
            println!("  connection id: {}", id);
            Ok(())
        }

        Commands::Saved => {
            let records = manager.saved_connections().await?;
            println!("Saved connections: {}", records.len());
            for record in records {
                let marker = if record.is_active { "●" } else { "○" };
                println!(
                    "  {} {} ({}) last used {}",
                    marker,
                    record.name,
                    record.backend_type,
                    record.last_used.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }

        Commands::Activate { name } => {
            if !manager.activate_saved(&name).await? {
                bail!("No saved connection named '{}'", name);
            }
            println!("✓ '{}' is now the active connection", name);
            Ok(())
        }

        Commands::Forget { name } => {
            if !manager.forget_saved(&name).await? {
                bail!("No saved connection named '{}'", name);
            }
            println!("✓ Removed '{}'", name);
            Ok(())
        }

        Commands::Records { action } => {
            restore(manager).await?;
            run_records(action, manager).await
        }
    }
}

async fn restore(manager: &ConnectionManager) -> anyhow::Result<()> {
    match manager.restore_active().await {
        RestoreOutcome::Restored(id) => {
            info!("Reconnected active configuration as {}", id);
            Ok(())
        }
        RestoreOutcome::NoActiveRecord => {
            bail!("No active connection; run `palette connect` first")
        }
        RestoreOutcome::Failed { name, error } => bail!(
            "Could not reconnect to '{}': {}; run `palette connect` to set up a working connection",
            name,
            error
        ),
    }
}

async fn run_records(action: RecordAction, manager: &ConnectionManager) -> anyhow::Result<()> {
    let handle = manager.current_adapter().await?;

    match action {
        RecordAction::List { kind } => {
            let kind = EntityKind::from(kind);
            let records = handle.get_all(kind).await?;
            println!("{}: {}", kind, records.len());
            for record in records {
                let name = record
                    .attribute("name")
                    .and_then(Value::as_str)
                    .unwrap_or("-");
                println!("  • {} {}", record.id, name);
            }
        }
        RecordAction::Get { kind, id } => {
            let kind = EntityKind::from(kind);
            match handle.get_by_id(kind, &id).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => bail!("{} '{}' not found", kind.label(), id),
            }
        }
        RecordAction::Create { kind, json } => {
            let id = handle.create(kind.into(), parse_object(&json)?).await?;
            println!("✓ Created {}", id);
        }
        RecordAction::Update { kind, id, json } => {
            let patch = Patch::from(parse_object(&json)?);
            handle.update(kind.into(), &id, &patch).await?;
            println!("✓ Updated {}", id);
        }
        RecordAction::Delete { kind, id } => {
            handle.delete(kind.into(), &id).await?;
            println!("✓ Deleted {}", id);
        }
    }
    Ok(())
}

fn list_backends() -> anyhow::Result<()> {
    let registry = build_registry();
    for backend_type in BackendType::ALL {
        let status = if registry.is_supported(backend_type) {
            "supported"
        } else {
            "not yet supported"
        };
        println!("{} ({})", backend_type, status);
        println!("  required: {}", required_fields(backend_type).join(", "));
    }
    Ok(())
}

fn validate(args: &BackendArgs) -> anyhow::Result<()> {
    let config = backend_config(args)?;
    let report = validate_config(args.backend_type, &config);
    if report.valid {
        println!("✓ {} configuration is valid", args.backend_type);
        return Ok(());
    }

    println!("✗ {} configuration has problems:", args.backend_type);
    for error in &report.errors {
        println!("  • {}", error);
    }
    bail!("{} validation error(s)", report.errors.len())
}

fn print_probe(probe: ProbeOutcome) {
    match probe {
        ProbeOutcome::Accessible => println!("  palettes readable"),
        ProbeOutcome::PermissionDenied => {
            println!("  ⚠ reachable, but reading palettes is denied by access rules")
        }
        ProbeOutcome::CollectionMissing => {
            println!("  ⚠ reachable, palettes storage not created yet")
        }
    }
}

fn backend_config(args: &BackendArgs) -> anyhow::Result<BackendConfig> {
    let mut config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => BackendConfig::new(),
    };
    for pair in &args.set {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", pair))?;
        config.insert(key.trim(), value.trim());
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> anyhow::Result<BackendConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
    };
    Ok(BackendConfig::try_from(value)?)
}

fn parse_object(json: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str(json).context("Invalid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Expected a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(file: Option<PathBuf>, set: &[&str]) -> BackendArgs {
        BackendArgs {
            backend_type: BackendType::Supabase,
            file,
            set: set.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_set_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("supabase.yaml");
        std::fs::write(&path, "url: https://old.supabase.co\nanonKey: anon\n").unwrap();

        let config =
            backend_config(&args(Some(path), &["url = https://new.supabase.co"])).unwrap();
        assert_eq!(config.text("url").as_deref(), Some("https://new.supabase.co"));
        assert_eq!(config.text("anonKey").as_deref(), Some("anon"));
    }

    #[test]
    fn test_malformed_set_is_rejected() {
        assert!(backend_config(&args(None, &["url"])).is_err());
    }

    #[test]
    fn test_parse_object_requires_object() {
        assert!(parse_object("[1]").is_err());
        assert_eq!(
            parse_object(r#"{"name":"Sunset"}"#).unwrap().get("name"),
            Some(&Value::String("Sunset".to_string()))
        );
    }

    #[test]
    fn test_cli_parses_connect() {
        let cli = Cli::try_parse_from([
            "palette", "connect", "--name", "prod", "--type", "supabase", "--set",
            "url=https://x.supabase.co", "--set", "anonKey=k",
        ])
        .unwrap();
        match cli.command {
            Commands::Connect { name, backend } => {
                assert_eq!(name, "prod");
                assert_eq!(backend.backend_type, BackendType::Supabase);
                assert_eq!(backend.set.len(), 2);
            }
            _ => panic!("expected connect"),
        }
    }
}
