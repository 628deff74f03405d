use blockform::export::{parse, serialize};
use blockform::prelude::*;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Offline tooling for schema-driven automation documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the automation backend (overrides BLOCKFORM_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Schema cache policy (overrides BLOCKFORM_CACHE_POLICY)
    #[arg(long, value_enum, global = true)]
    cache_policy: Option<PolicyCli>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document between JSON and YAML
    Convert {
        /// Input file; the format is taken from the extension
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = FormatCli::Yaml)]
        to: FormatCli,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render the editor widget tree for a document
    Render {
        /// Catalog file (`{"root": ..., "blocks": {...}}`); the backend is used when omitted
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Automation document to load into the editor
        #[arg(long)]
        document: Option<PathBuf>,
    },
    /// List the blocks available for a category
    Blocks {
        /// One of: variable, trigger, condition, action, result
        category: String,

        /// Only show blocks whose label, name or description contains this text
        #[arg(short, long)]
        query: Option<String>,

        /// Catalog file; the backend is used when omitted
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Run a document in the backend playground
    Execute {
        /// Automation document to run
        document: PathBuf,

        /// Format the document is submitted in
        #[arg(long, value_enum, default_value_t = FormatCli::Yaml)]
        format: FormatCli,

        /// JSON or YAML file holding the playground inputs
        #[arg(long)]
        inputs: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatCli {
    Json,
    Yaml,
}

impl From<FormatCli> for TextFormat {
    fn from(format: FormatCli) -> Self {
        match format {
            FormatCli::Json => TextFormat::Json,
            FormatCli::Yaml => TextFormat::Yaml,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyCli {
    Reuse,
    Refetch,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli);

    let outcome = match cli.command {
        Command::Convert { input, to, output } => convert(&input, to.into(), output.as_deref()),
        Command::Render { catalog, document } => {
            render(config, catalog.as_deref(), document.as_deref()).await
        }
        Command::Blocks {
            category,
            query,
            catalog,
        } => blocks(config, &category, query, catalog.as_deref()).await,
        Command::Execute {
            document,
            format,
            inputs,
        } => execute(config, &document, format.into(), inputs.as_deref()).await,
    };

    if let Err(e) = outcome {
        exit_with_error(&e.to_string());
    }
}

/// Environment settings first, then command-line overrides.
fn build_config(cli: &Cli) -> EditorConfig {
    let mut config = EditorConfig::from_env();
    if let Some(url) = &cli.api_url {
        config = config.with_api_base_url(url.clone());
    }
    if let Some(policy) = cli.cache_policy {
        config = config.with_cache_policy(match policy {
            PolicyCli::Reuse => CachePolicy::Reuse,
            PolicyCli::Refetch => CachePolicy::AlwaysRefetch,
        });
    }
    config
}

fn convert(input: &FsPath, to: TextFormat, output: Option<&FsPath>) -> Result<()> {
    let document = read_document(input)?;
    let text = serialize(to, &document);
    match output {
        Some(path) => {
            fs::write(path, text)?;
            println!("Wrote {} to '{}'", to, path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

async fn render(
    config: EditorConfig,
    catalog: Option<&FsPath>,
    document: Option<&FsPath>,
) -> Result<()> {
    let catalog = open_catalog(&config, catalog)?;
    let document = match document {
        Some(path) => json!({ "root": read_document(path)? }),
        None => Value::Object(Map::new()),
    };

    let start = Instant::now();
    let session = EditorSession::with_document(config, catalog, document);
    let root = session.open_root().await?;
    let widget = root.hydrate().await;

    print!("{}", WidgetOutline::format(&widget));
    println!(
        "\nRendered in {:?} ({} cached schemas)",
        start.elapsed(),
        session.cache().len()
    );
    Ok(())
}

async fn blocks(
    config: EditorConfig,
    category: &str,
    query: Option<String>,
    catalog: Option<&FsPath>,
) -> Result<()> {
    let category: BlockCategory = category.parse()?;
    let catalog = open_catalog(&config, catalog)?;

    let mut picker = BlockPicker::open(catalog.as_ref(), category).await;
    if let Some(error) = picker.error() {
        return Err(error.to_string().into());
    }
    if let Some(query) = query {
        picker.set_query(query);
    }

    let visible = picker.visible();
    println!("{} {} block(s):", visible.len(), category);
    for definition in visible {
        match &definition.description {
            Some(description) => println!(
                "  {:<24} {} - {}",
                definition.name,
                definition.display_label(),
                description
            ),
            None => println!("  {:<24} {}", definition.name, definition.display_label()),
        }
    }
    Ok(())
}

async fn execute(
    config: EditorConfig,
    document: &FsPath,
    format: TextFormat,
    inputs: Option<&FsPath>,
) -> Result<()> {
    let client = ApiClient::new(&config)?;
    let mut request = ExecuteRequest::from_document(&read_document(document)?, format);
    if let Some(path) = inputs {
        match read_document(path)? {
            Value::Object(inputs) => request = request.with_inputs(inputs),
            _ => return Err(format!("inputs in '{}' must be an object", path.display()).into()),
        }
    }

    println!("Executing against {}...", client.base_url());
    let start = Instant::now();
    let response = client.execute(&request).await?;

    if response.executed {
        println!("Executed in {:?}", start.elapsed());
    } else {
        println!("Not executed");
    }
    if let Some(result) = &response.result {
        println!("\n--- Result ---\n{}", to_json(result));
    }
    if let Some(trace) = &response.trace {
        println!("\n--- Trace ---\n{}", to_json(trace));
    }
    if let Some(error) = response.error {
        return Err(error.into());
    }
    Ok(())
}

fn open_catalog(config: &EditorConfig, file: Option<&FsPath>) -> Result<Arc<dyn BlockCatalog>> {
    Ok(match file {
        Some(path) => Arc::new(StaticCatalog::from_json(&read_document(path)?)?),
        None => Arc::new(ApiClient::new(config)?),
    })
}

/// Reads a JSON or YAML file. `.yaml`/`.yml` files are read as YAML,
/// everything else as JSON.
fn read_document(path: &FsPath) -> Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => TextFormat::Yaml,
        _ => TextFormat::Json,
    };
    Ok(parse(format, &text)?)
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
