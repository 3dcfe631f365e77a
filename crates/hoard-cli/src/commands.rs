use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use colored::Colorize;
use hoard_promote::Promoter;
use hoard_registry::{BlobStoreManager, BlobStoreRegistry, ManagerSettings, StoreHandle};
use hoard_store::{
    BlobStore, Headers, BLOB_NAME_HEADER, CONTENT_TYPE_HEADER, CREATED_BY_HEADER, FILE_SECTION,
    FILE_TYPE, MEMORY_SECTION, MEMORY_TYPE, PATH_KEY, VOLUME_KEY,
};
use hoard_types::{BlobId, BlobStoreConfiguration, GroupAttributes};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::*;

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ManagerSettings> {
    match path {
        Some(path) => ManagerSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(ManagerSettings::default()),
    }
}

pub fn run_command(cli: Cli, settings: ManagerSettings) -> anyhow::Result<()> {
    let (manager, report) =
        BlobStoreManager::open(settings).context("opening the blob store registry")?;
    debug!(loaded = report.loaded.len(), failed = report.failed.len(), "registry opened");
    for (name, err) in &report.failed {
        warn!(store = %name, error = %err, "blob store was not restored");
    }

    let format = cli.format;
    let result = match cli.command {
        Command::List => cmd_list(&manager, format),
        Command::Show(args) => cmd_show(&manager, args, format),
        Command::CreateFile(args) => cmd_create_file(&manager, args, format),
        Command::CreateMemory(args) => cmd_create_memory(&manager, args, format),
        Command::CreateGroup(args) => cmd_create_group(&manager, args, format),
        Command::Delete(args) => cmd_delete(&manager, args, format),
        Command::Promote(args) => cmd_promote(&manager, args, format),
        Command::Put(args) => cmd_put(&manager, args, format),
        Command::Get(args) => cmd_get(&manager, args, format),
    };
    manager.shutdown();
    result
}

// ---------------------------------------------------------------------------
// Output views
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MemberView {
    name: String,
    live: bool,
}

#[derive(Serialize)]
struct StoreView {
    name: String,
    #[serde(rename = "type")]
    store_type: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fill_policy: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<MemberView>,
    attributes: BTreeMap<String, BTreeMap<String, String>>,
}

impl StoreView {
    fn of(handle: &StoreHandle) -> Self {
        let config = handle.configuration();
        let (fill_policy, members) = match handle.as_group() {
            Some(group) => (
                Some(group.fill_policy_type().to_string()),
                group
                    .member_statuses()
                    .into_iter()
                    .map(|m| MemberView {
                        name: m.name,
                        live: m.live,
                    })
                    .collect(),
            ),
            None => (None, Vec::new()),
        };
        Self {
            name: config.name.clone(),
            store_type: config.store_type.clone(),
            state: handle.store().state().to_string(),
            fill_policy,
            members,
            attributes: config.attributes.clone(),
        }
    }

    fn print_text(&self) {
        println!("{} ({}) {}", self.name.bold(), self.store_type.cyan(), self.state.dimmed());
        if let Some(policy) = &self.fill_policy {
            println!("  Fill policy: {}", policy.yellow());
        }
        for member in &self.members {
            let mark = if member.live { "✓".green() } else { "✗".red() };
            println!("  {} {}", mark, member.name);
        }
        for (section, values) in &self.attributes {
            for (key, value) in values {
                println!("  {}.{} = {}", section, key, value);
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn registered(manager: &BlobStoreManager, name: &str) -> anyhow::Result<StoreHandle> {
    manager
        .get(name)
        .with_context(|| format!("blob store {name} is not registered"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_list(manager: &BlobStoreManager, format: OutputFormat) -> anyhow::Result<()> {
    let views: Vec<StoreView> = manager
        .list()
        .iter()
        .filter_map(|name| manager.get(name))
        .map(|handle| StoreView::of(&handle))
        .collect();
    match format {
        OutputFormat::Json => print_json(&views),
        OutputFormat::Text => {
            if views.is_empty() {
                println!("No blob stores registered.");
            }
            for view in &views {
                println!("{} {} ({})", "•".dimmed(), view.name.bold(), view.store_type.cyan());
            }
            Ok(())
        }
    }
}

fn cmd_show(
    manager: &BlobStoreManager,
    args: ShowArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let view = StoreView::of(&registered(manager, &args.name)?);
    match format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            view.print_text();
            Ok(())
        }
    }
}

fn create(
    manager: &BlobStoreManager,
    config: BlobStoreConfiguration,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let name = config.name.clone();
    let handle = manager
        .create(config)
        .with_context(|| format!("creating blob store {name}"))?;
    let view = StoreView::of(&handle);
    match format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            println!(
                "{} Registered {} ({})",
                "✓".green().bold(),
                view.name.bold(),
                view.store_type.cyan()
            );
            Ok(())
        }
    }
}

fn cmd_create_file(
    manager: &BlobStoreManager,
    args: CreateFileArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = BlobStoreConfiguration::new(args.name, FILE_TYPE).with_attribute(
        FILE_SECTION,
        PATH_KEY,
        args.path.display().to_string(),
    );
    create(manager, config, format)
}

fn cmd_create_memory(
    manager: &BlobStoreManager,
    args: CreateMemoryArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let volume = args.volume.unwrap_or_else(|| args.name.clone());
    let config = BlobStoreConfiguration::new(args.name, MEMORY_TYPE)
        .with_attribute(MEMORY_SECTION, VOLUME_KEY, volume);
    create(manager, config, format)
}

fn cmd_create_group(
    manager: &BlobStoreManager,
    args: CreateGroupArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = GroupAttributes::new(args.members, args.fill_policy)
        .into_configuration(args.name)
        .context("building group configuration")?;
    create(manager, config, format)
}

fn cmd_delete(
    manager: &BlobStoreManager,
    args: DeleteArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    manager
        .delete(&args.name)
        .with_context(|| format!("deleting blob store {}", args.name))?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "deleted": args.name })),
        OutputFormat::Text => {
            println!("{} Unregistered {} (data kept)", "✓".green().bold(), args.name.bold());
            Ok(())
        }
    }
}

fn cmd_promote(
    manager: &Arc<BlobStoreManager>,
    args: PromoteArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let promoter = Promoter::new(Arc::clone(manager) as Arc<dyn BlobStoreRegistry>);
    let (_, report) = match promoter.promote_with_report(&args.name) {
        Ok(done) => done,
        Err(err) => {
            warn!(source = %args.name, error = %err, "promotion failed");
            if err.is_irrecoverable() {
                eprintln!(
                    "{} rollback was incomplete; check the registry before retrying",
                    "error:".red().bold()
                );
            }
            return Err(err).with_context(|| format!("promoting {}", args.name));
        }
    };
    info!(
        promotion_id = %report.promotion_id,
        source = %report.source,
        promoted = %report.promoted,
        "promotion complete"
    );
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!(
                "{} Promoted {} → group over {}",
                "✓".green().bold(),
                report.source.bold(),
                report.promoted.yellow()
            );
            println!("  Promotion: {}", report.promotion_id.to_string().dimmed());
            for step in &report.steps {
                let phase = step.phase.to_string();
                println!("  {} {} ({:?})", phase.cyan(), step.store, step.elapsed);
            }
            Ok(())
        }
    }
}

fn cmd_put(manager: &BlobStoreManager, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let handle = registered(manager, &args.store)?;
    let data = if args.file.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("reading standard input")?;
        buf
    } else {
        fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?
    };

    let mut headers = Headers::new();
    headers.insert(CREATED_BY_HEADER.to_string(), "hoard-cli".to_string());
    let blob_name = args.blob_name.or_else(|| {
        args.file
            .file_name()
            .filter(|_| args.file.as_os_str() != "-")
            .map(|n| n.to_string_lossy().into_owned())
    });
    if let Some(blob_name) = blob_name {
        headers.insert(BLOB_NAME_HEADER.to_string(), blob_name);
    }
    if let Some(content_type) = args.content_type {
        headers.insert(CONTENT_TYPE_HEADER.to_string(), content_type);
    }

    let size = data.len();
    let id = handle
        .store()
        .put(Bytes::from(data), headers)
        .with_context(|| format!("writing to {}", args.store))?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "store": args.store,
            "id": id.to_hex(),
            "size": size,
        })),
        OutputFormat::Text => {
            println!("{} {} ({} bytes)", "✓".green().bold(), id.to_hex().yellow(), size);
            Ok(())
        }
    }
}

fn cmd_get(manager: &BlobStoreManager, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let handle = registered(manager, &args.store)?;
    let id = BlobId::from_hex(&args.id).context("parsing blob id")?;
    let blob = handle
        .store()
        .fetch(&id)
        .with_context(|| format!("reading from {}", args.store))?;

    if let Some(path) = &args.output {
        fs::write(path, &blob.data).with_context(|| format!("writing {}", path.display()))?;
    }
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "store": args.store,
            "id": blob.id.to_hex(),
            "size": blob.size(),
            "headers": blob.headers,
        })),
        OutputFormat::Text if args.output.is_some() => {
            println!("{} {} bytes", "✓".green().bold(), blob.size());
            Ok(())
        }
        OutputFormat::Text => {
            io::stdout().write_all(&blob.data).context("writing standard output")?;
            Ok(())
        }
    }
}
