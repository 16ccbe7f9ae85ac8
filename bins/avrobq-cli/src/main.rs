use anyhow::{Context, Result};
use avrobq_core::{LoaderSpec, Notification, Outcome};
use avrobq_io::{build_sink, loader::Loader, storage::build_reader};
use clap::{ArgGroup, Parser};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Load one Avro CDC export from object storage into BigQuery")]
#[command(group(ArgGroup::new("input").required(true).args(["event", "object"])))]
struct Args {
    /// Loader YAML
    #[arg(short, long)]
    config: PathBuf,
    /// CloudEvent JSON file, `-` for stdin
    #[arg(short, long)]
    event: Option<PathBuf>,
    /// Object name to load, instead of a full event
    #[arg(short, long)]
    object: Option<String>,
}

fn read_notification(args: &Args) -> Result<Notification> {
    if let Some(object) = &args.object {
        return Ok(Notification::for_object(object.clone()));
    }
    let path = args
        .event
        .as_ref()
        .context("one of --event or --object is required")?;
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    };
    Ok(Notification::from_json(&raw)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
    let args = Args::parse();
    let spec = {
        let y = std::fs::read_to_string(&args.config)
            .with_context(|| format!("read {}", args.config.display()))?;
        LoaderSpec::from_yaml(&y)?
    };
    let notification = read_notification(&args)?;

    info!("Starting loader {}", spec.name);
    let reader = build_reader(&spec.source)?;
    let loader = Loader::new(Arc::new(reader), build_sink(&spec.sink));

    match loader.handle(&notification).await {
        Ok(Outcome::Skipped { object }) => info!("Skipped {}", object),
        Ok(Outcome::Inserted { object, rows, row_errors }) => info!(
            "Loaded {} rows from {} ({} rejected)",
            rows,
            object,
            row_errors.len()
        ),
        Err(e) => {
            error!(error = ?e, "Invocation failed");
            return Err(e.into());
        }
    }
    Ok(())
}
