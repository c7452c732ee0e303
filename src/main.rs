use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use plume::config::{HostConfig, Platform};
use plume::input::{Event, KeySequence, handle_event};
use plume::Editor;

const USAGE: &str = "usage: plume [PACKAGES] [--user DIR] [--platform ID]";

fn parse_args() -> Result<HostConfig, String> {
    let mut config = HostConfig::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--user" => {
                config.user_path = args.next().map(PathBuf::from).ok_or(USAGE)?;
            }
            "--platform" => {
                let id = args.next().ok_or(USAGE)?;
                config.platform = Platform::from_id(&id);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            path => config.packages_path = PathBuf::from(path),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(2);
        }
    };

    let editor = Arc::new(Editor::new(config));
    let packages_path = editor.config().packages_path.clone();

    // Startup: search path first so the host module can be found there
    {
        let editor = Arc::clone(&editor);
        tokio::task::spawn_blocking(move || {
            handle_event(&editor, Event::PackagesPathAdded(packages_path));
            handle_event(&editor, Event::Init);
            editor.scan();
        })
        .await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "get" => match editor.settings().lookup(rest) {
                Some((layer, value)) => println!("{value}  ({layer})"),
                None => println!("{rest}: not set"),
            },
            "bind" => match KeySequence::parse(rest) {
                Some(keys) => match editor.binding(&keys) {
                    Some(binding) => println!("{keys}: {binding}"),
                    None => println!("{keys}: unbound"),
                },
                None => println!("invalid key sequence: {rest}"),
            },
            "changed" => {
                // Reloads block on the engine, so each runs on its own thread
                let editor = Arc::clone(&editor);
                let path = PathBuf::from(rest);
                pending.push(tokio::task::spawn_blocking(move || {
                    handle_event(&editor, Event::FileChanged(path));
                }));
            }
            "scan" => {
                let editor = Arc::clone(&editor);
                let loaded = tokio::task::spawn_blocking(move || editor.scan()).await?;
                println!("{} new package(s)", loaded.len());
            }
            "packages" => {
                for package in editor.packages() {
                    println!("{}  {} plugin(s)", package.name(), package.plugins().len());
                    for plugin in package.plugins() {
                        println!("  {}  {:?}", plugin.qualified_name(), plugin.state());
                    }
                }
            }
            "layers" => {
                for name in editor.settings().snapshot().layer_names() {
                    println!("{name}");
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    for result in futures::future::join_all(pending).await {
        result?;
    }

    Ok(())
}
