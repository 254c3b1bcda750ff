mod config;
mod repl;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use session_core::{
    spawn_observer, HttpCommandTransport, RouteGuard, SessionController, TitleDecorator,
    WindowTitle,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::load_settings, repl::Shell};

#[derive(Parser, Debug)]
#[command(name = "huskey-shell", about = "Interactive front end for a Huskey vault backend")]
struct Args {
    /// Config file to read instead of ./huskey.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    title: Option<String>,
}

/// A terminal has no title bar, so title changes are printed.
struct ConsoleTitle;

impl WindowTitle for ConsoleTitle {
    fn set_title(&mut self, title: &str) {
        println!("[{title}]");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if let Some(title) = args.title {
        settings.window_title = title;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let transport = HttpCommandTransport::new(&settings.backend_url, settings.request_timeout())
        .with_context(|| format!("invalid backend url '{}'", settings.backend_url))?;
    info!(endpoint = %transport.endpoint(), "using vault backend");
    let controller = SessionController::new(Arc::new(transport));

    spawn_observer(
        controller.subscribe(),
        TitleDecorator::new(ConsoleTitle, settings.window_title.clone()),
    );

    println!("{} - type `help` for commands", settings.window_title);
    let shell = Shell::new(controller, RouteGuard::default());
    repl::run(&shell, BufReader::new(tokio::io::stdin())).await
}
