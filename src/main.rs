use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yadisk_relay::{
    config::Config,
    yadisk::{filter, ArchiveAssembler, Listing, TypeFilter},
    web, AppState,
};

const USAGE: &str = "usage:
  yadisk-relay <public_key> [path] [--type <filter>]
  yadisk-relay <public_key> --zip <out.zip> <selection>...

folder selections end with '/'";

enum Command {
    List {
        path: String,
        filter: Option<TypeFilter>,
    },
    Zip {
        out: String,
        selection: Vec<String>,
    },
}

fn parse_args(args: &[String]) -> Result<(String, Command)> {
    let mut args = args.iter().skip(1);
    let key = args.next().ok_or_else(|| anyhow!("{}", USAGE))?.clone();

    let rest: Vec<&String> = args.collect();
    if rest.first().map(|s| s.as_str()) == Some("--zip") {
        let out = rest
            .get(1)
            .ok_or_else(|| anyhow!("--zip needs an output path"))?
            .to_string();
        let selection: Vec<String> = rest[2..].iter().map(|s| s.to_string()).collect();
        if selection.is_empty() {
            return Err(anyhow!("--zip needs at least one selection"));
        }
        return Ok((key, Command::Zip { out, selection }));
    }

    let mut path = String::new();
    let mut filter = None;
    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--type" => {
                let value = iter.next().ok_or_else(|| anyhow!("--type needs a value"))?;
                filter = TypeFilter::parse(Some(value.as_str()));
            }
            "-h" | "--help" => return Err(anyhow!("{}", USAGE)),
            other if path.is_empty() => path = other.to_string(),
            other => return Err(anyhow!("unexpected argument: {}", other)),
        }
    }

    Ok((key, Command::List { path, filter }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yadisk_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (raw_key, command) = parse_args(&args)?;
    let key = web::validate_public_key(&raw_key)?;

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    let state = AppState::new(config)?;

    match command {
        Command::List { path, filter: type_filter } => {
            match filter::list(&state.client, &key, &path, type_filter.as_ref()).await {
                Listing::Items(items) => {
                    for item in items {
                        let marker = if item.is_dir() { "d" } else { "-" };
                        let size = item.size.map(|s| s.to_string()).unwrap_or_default();
                        println!("{} {:>12} {}", marker, size, item.path);
                    }
                }
                Listing::Empty => println!("(no items)"),
                Listing::Failed(reason) => return Err(anyhow!("listing failed: {}", reason)),
            }
        }
        Command::Zip { out, selection } => {
            let assembler = ArchiveAssembler::new(&state.client, state.archive_options());
            let assembled = assembler.assemble(&key, &selection).await?;
            tokio::fs::write(&out, &assembled.bytes)
                .await
                .with_context(|| format!("failed to write {}", out))?;
            println!(
                "wrote {} ({} files, {} skipped, {} bytes)",
                out,
                assembled.written,
                assembled.skipped,
                assembled.bytes.len()
            );
        }
    }

    Ok(())
}
