use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use locode_core::config::{
    delimiter_from_env_value, shared_from_env_value, store_path_from_env_value,
};
use locode_core::{
    validate_segment, Actor, ClonedRecord, CodeStore, CompiledFormat, CoreConfig, Delimiter,
    FamilyDraft, FamilyId, FormatDraft, NonEmptyText, SegmentDraft, SegmentFilter, SegmentId,
    SegmentInstance, SegmentUpdate,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "locode")]
#[command(about = "Location code formats and hierarchies")]
struct Cli {
    /// Path of the YAML store file
    #[arg(long, global = true, env = "LOCODE_STORE")]
    store: Option<String>,
    /// User recorded on created and updated records
    #[arg(long, global = true, env = "LOCODE_USER", default_value = "locode")]
    user: String,
    #[command(subcommand)]
    command: Commands,
}

/// Selects a family by owning project and name.
#[derive(Args)]
struct FamilyRef {
    /// Project owning the family
    project: String,
    /// Family name
    family: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a delimiter
    CheckDelimiter { delimiter: String },
    /// Compile a format definition and show its tokens
    CheckFormat {
        definition: String,
        #[arg(long)]
        delimiter: Option<String>,
    },
    /// Check a segment against a format definition
    CheckSegment {
        segment: String,
        definition: String,
        #[arg(long)]
        delimiter: Option<String>,
    },
    /// Manage format families
    #[command(subcommand)]
    Family(FamilyCommands),
    /// Manage the formats of a family
    #[command(subcommand)]
    Format(FormatCommands),
    /// Manage segments
    #[command(subcommand)]
    Segment(SegmentCommands),
    /// Print the segment tree of a family
    Tree {
        #[command(flatten)]
        family: FamilyRef,
        #[arg(long)]
        json: bool,
    },
    /// Show which format of a family a segment resolves to
    Match {
        #[command(flatten)]
        family: FamilyRef,
        segment: String,
    },
}

#[derive(Subcommand)]
enum FamilyCommands {
    Create {
        #[command(flatten)]
        family: FamilyRef,
        #[arg(long)]
        description: Option<String>,
        /// Defaults to LOCODE_DELIMITER, then ":"
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        shared: Option<bool>,
    },
    List {
        /// Only list families of this project
        #[arg(long)]
        project: Option<String>,
    },
    /// Copy a shared family and its formats into another project
    Clone {
        #[command(flatten)]
        source: FamilyRef,
        /// Project receiving the copy
        target: String,
    },
    /// Delete a family with all of its formats and segments
    Delete {
        #[command(flatten)]
        family: FamilyRef,
    },
}

#[derive(Subcommand)]
enum FormatCommands {
    Add {
        #[command(flatten)]
        family: FamilyRef,
        definition: String,
        /// Defaults to after the last format
        #[arg(long)]
        order: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        #[command(flatten)]
        family: FamilyRef,
    },
    Remove {
        #[command(flatten)]
        family: FamilyRef,
        definition: String,
    },
}

#[derive(Subcommand)]
enum SegmentCommands {
    Add {
        #[command(flatten)]
        family: FamilyRef,
        segment: String,
        /// Path of the parent segment
        #[arg(long)]
        parent: Option<String>,
        /// Definition of the format to bind; resolved from the family when omitted
        #[arg(long)]
        format: Option<String>,
    },
    /// Create every missing segment of a delimited path
    Chain {
        #[command(flatten)]
        family: FamilyRef,
        path: String,
    },
    Move {
        #[command(flatten)]
        family: FamilyRef,
        path: String,
        /// Path of the new parent; the segment becomes a root when omitted
        #[arg(long)]
        to: Option<String>,
    },
    Rename {
        #[command(flatten)]
        family: FamilyRef,
        path: String,
        value: String,
    },
    /// Delete a segment and everything below it
    Delete {
        #[command(flatten)]
        family: FamilyRef,
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("locode=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CoreConfig::new(
        delimiter_from_env_value(std::env::var("LOCODE_DELIMITER").ok())?,
        shared_from_env_value(std::env::var("LOCODE_SHARED").ok())?,
        store_path_from_env_value(cli.store),
    );
    let user = NonEmptyText::new(&cli.user).context("--user cannot be blank")?;

    match cli.command {
        Commands::CheckDelimiter { delimiter } => {
            let delimiter = Delimiter::parse(Some(&delimiter))?;
            println!("valid delimiter '{delimiter}'");
        }
        Commands::CheckFormat {
            definition,
            delimiter,
        } => {
            let delimiter = resolve_delimiter(&config, delimiter)?;
            let compiled = CompiledFormat::compile(&definition, &delimiter)?;
            let tokens: Vec<String> = compiled.tokens().iter().map(|t| t.to_string()).collect();
            println!(
                "valid format '{compiled}', {} characters: {}",
                compiled.segment_length(),
                tokens.join(" ")
            );
        }
        Commands::CheckSegment {
            segment,
            definition,
            delimiter,
        } => {
            let delimiter = resolve_delimiter(&config, delimiter)?;
            validate_segment(&segment, &definition, &delimiter)?;
            println!("'{segment}' conforms to '{definition}'");
        }
        Commands::Family(command) => run_family(command, &config, user)?,
        Commands::Format(command) => run_format(command, &config, user)?,
        Commands::Segment(command) => run_segment(command, &config, user)?,
        Commands::Tree { family, json } => {
            let store = CodeStore::load_or_default(config.store_path())?;
            let id = find_family(&store, &family)?;
            if json {
                let roots: Vec<_> = store
                    .roots(id)
                    .into_iter()
                    .map(|s| tree_json(&store, s))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&roots)?);
            } else {
                for root in store.roots(id) {
                    print_tree(&store, root);
                }
            }
        }
        Commands::Match { family, segment } => {
            let store = CodeStore::load_or_default(config.store_path())?;
            let registry = store.registry(find_family(&store, &family)?)?;
            let found = registry.get_format_for_segment(&segment)?;
            println!("'{segment}' matches '{}'", found.compiled);
            for (first, second) in registry.overlapping() {
                tracing::warn!(%first, %second, "formats overlap; the first in family order wins");
            }
        }
    }

    Ok(())
}

fn resolve_delimiter(config: &CoreConfig, value: Option<String>) -> anyhow::Result<Delimiter> {
    Ok(match value {
        Some(value) => Delimiter::parse(Some(&value))?,
        None => config.default_delimiter().clone(),
    })
}

/// The CLI user acts with authority over the project named on the command line.
fn actor_for(user: NonEmptyText, project: &str) -> anyhow::Result<(Actor, NonEmptyText)> {
    let project = NonEmptyText::new(project).context("project cannot be blank")?;
    Ok((Actor::new(user).with_project(project.clone()), project))
}

fn find_family(store: &CodeStore, family: &FamilyRef) -> anyhow::Result<FamilyId> {
    let project = NonEmptyText::new(&family.project).context("project cannot be blank")?;
    store
        .family_by_name(&project, &family.family)
        .map(|f| f.id)
        .with_context(|| {
            format!(
                "no family '{}' in project '{}'",
                family.family, family.project
            )
        })
}

fn find_segment(store: &CodeStore, family: FamilyId, path: &str) -> anyhow::Result<SegmentId> {
    let filter = SegmentFilter::Family(family).and(SegmentFilter::path(path));
    store
        .query(&filter)
        .first()
        .map(|s| s.id)
        .with_context(|| format!("no segment at '{path}'"))
}

fn print_tree(store: &CodeStore, segment: &SegmentInstance) {
    let format = store
        .format(segment.format)
        .map(|f| f.char_definition.as_str())
        .unwrap_or("?");
    println!(
        "{}{}  [{}]  {}",
        "  ".repeat(segment.level),
        segment.segment,
        format,
        segment.path
    );
    for child in store.children(segment.id) {
        print_tree(store, child);
    }
}

fn tree_json(store: &CodeStore, segment: &SegmentInstance) -> serde_json::Value {
    let format = store
        .format(segment.format)
        .map(|f| f.char_definition.clone())
        .unwrap_or_default();
    let children: Vec<_> = store
        .children(segment.id)
        .into_iter()
        .map(|c| tree_json(store, c))
        .collect();
    json!({
        "id": segment.id.to_string(),
        "segment": segment.segment,
        "path": segment.path,
        "level": segment.level,
        "format": format,
        "children": children,
    })
}

fn run_family(
    command: FamilyCommands,
    config: &CoreConfig,
    user: NonEmptyText,
) -> anyhow::Result<()> {
    let mut store = CodeStore::load_or_default(config.store_path())?;

    match command {
        FamilyCommands::Create {
            family,
            description,
            delimiter,
            shared,
        } => {
            let (actor, project) = actor_for(user, &family.project)?;
            let draft = FamilyDraft {
                project,
                name: family.family,
                description,
                shared: shared.unwrap_or(config.default_shared()),
                delimiter: Some(resolve_delimiter(config, delimiter)?),
            };
            let id = store.create_family(draft, &actor)?;
            println!("created family {id}");
        }
        FamilyCommands::List { project } => {
            for family in store.families() {
                if project.as_deref().is_some_and(|p| p != family.project.as_str()) {
                    continue;
                }
                println!(
                    "{}/{}  delimiter '{}'  shared: {}  formats: {}",
                    family.project,
                    family.name,
                    family.delimiter,
                    family.shared,
                    store.formats(family.id).len()
                );
            }
            return Ok(());
        }
        FamilyCommands::Clone { source, target } => {
            let source_id = find_family(&store, &source)?;
            let (actor, target) = actor_for(user, &target)?;
            let cloned = store.clone_family(&target, source_id, &actor)?;
            if cloned.is_empty() {
                println!("{target} already has family '{}'", source.family);
            }
            for record in cloned {
                match record {
                    ClonedRecord::Family(id) => println!("created family {id}"),
                    ClonedRecord::Format(id) => println!("created format {id}"),
                }
            }
        }
        FamilyCommands::Delete { family } => {
            let id = find_family(&store, &family)?;
            let report = store.delete_family(id)?;
            for format in &report.formats {
                println!("{}: {} segment(s)", format.char_definition, format.paths.len());
                for path in &format.paths {
                    println!("  {path}");
                }
            }
            println!("deleted family '{}'", report.name);
        }
    }

    store.save(config.store_path())?;
    Ok(())
}

fn run_format(
    command: FormatCommands,
    config: &CoreConfig,
    user: NonEmptyText,
) -> anyhow::Result<()> {
    let mut store = CodeStore::load_or_default(config.store_path())?;

    match command {
        FormatCommands::Add {
            family,
            definition,
            order,
            description,
        } => {
            let id = find_family(&store, &family)?;
            let (actor, _) = actor_for(user, &family.project)?;
            let order = match order {
                Some(order) => order,
                None => u32::try_from(store.formats(id).len())?,
            };
            let draft = FormatDraft {
                char_definition: definition,
                segment_order: order,
                description,
            };
            let format = store.add_format(id, draft, &actor)?;
            println!("added format {format}");
        }
        FormatCommands::List { family } => {
            let id = find_family(&store, &family)?;
            for format in store.formats(id) {
                println!(
                    "{:>3}  {}  ({} characters, {} segment(s))",
                    format.segment_order,
                    format.char_definition,
                    format.segment_length,
                    store.format_usage(format.id)
                );
            }
            return Ok(());
        }
        FormatCommands::Remove { family, definition } => {
            let id = find_family(&store, &family)?;
            let Some(format) = store.registry(id)?.find_by_definition(&definition).map(|f| f.id)
            else {
                bail!("family '{}' has no format '{definition}'", family.family);
            };
            store.remove_format(format)?;
            println!("removed format '{definition}'");
        }
    }

    store.save(config.store_path())?;
    Ok(())
}

fn run_segment(
    command: SegmentCommands,
    config: &CoreConfig,
    user: NonEmptyText,
) -> anyhow::Result<()> {
    let mut store = CodeStore::load_or_default(config.store_path())?;

    match command {
        SegmentCommands::Add {
            family,
            segment,
            parent,
            format,
        } => {
            let id = find_family(&store, &family)?;
            let (actor, _) = actor_for(user, &family.project)?;
            let parent = parent
                .map(|p| find_segment(&store, id, &p))
                .transpose()?;
            let format = match format {
                Some(definition) => Some(
                    store
                        .registry(id)?
                        .find_by_definition(&definition)
                        .map(|f| f.id)
                        .with_context(|| format!("no format '{definition}'"))?,
                ),
                None => None,
            };
            let created = store.create_segment(
                id,
                SegmentDraft {
                    segment,
                    parent,
                    format,
                },
                &actor,
            )?;
            println!("created {}", store.segment(created)?.path);
        }
        SegmentCommands::Chain { family, path } => {
            let id = find_family(&store, &family)?;
            let (actor, _) = actor_for(user, &family.project)?;
            let delimiter = store.family(id)?.delimiter.clone();
            let values: Vec<&str> = path.split(delimiter.as_str()).collect();
            let nodes = store.create_segment_chain(id, &values, &actor)?;
            if let Some(last) = nodes.last() {
                println!("ensured {}", store.segment(*last)?.path);
            }
        }
        SegmentCommands::Move { family, path, to } => {
            let id = find_family(&store, &family)?;
            let (actor, _) = actor_for(user, &family.project)?;
            let segment = find_segment(&store, id, &path)?;
            let parent = to.map(|p| find_segment(&store, id, &p)).transpose()?;
            let update = SegmentUpdate {
                parent: Some(parent),
                ..Default::default()
            };
            store.update_segment(segment, update, &actor)?;
            println!("moved to {}", store.segment(segment)?.path);
        }
        SegmentCommands::Rename {
            family,
            path,
            value,
        } => {
            let id = find_family(&store, &family)?;
            let (actor, _) = actor_for(user, &family.project)?;
            let segment = find_segment(&store, id, &path)?;
            let update = SegmentUpdate {
                segment: Some(value),
                ..Default::default()
            };
            store.update_segment(segment, update, &actor)?;
            println!("renamed to {}", store.segment(segment)?.path);
        }
        SegmentCommands::Delete { family, path } => {
            let id = find_family(&store, &family)?;
            let segment = find_segment(&store, id, &path)?;
            for deleted in store.delete_segment(segment)? {
                println!("deleted {deleted}");
            }
        }
    }

    store.save(config.store_path())?;
    Ok(())
}
