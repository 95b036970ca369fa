//! Command-line host for the storefront API access layer.
mod host;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tienda_core::{
    ApiClient, ApiError, ApiRequest, ClientConfig, Credentials, FileStore, HttpMethod,
    MultipartForm, UreqTransport,
};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::host::TerminalNavigator;

#[derive(Parser)]
#[command(name = "tienda", version, about = "Storefront API client")]
struct Cli {
    /// Optional JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// API base url (overrides config and TIENDA_API_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Credential store file.
    #[arg(long, env = "TIENDA_STORE", default_value = ".tienda-session.json")]
    store: PathBuf,

    /// Path of the page the call is made from.
    #[arg(long, default_value = "/")]
    page: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a session token and roles.
    Login {
        #[arg(long)]
        token: String,
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Search the product catalog.
    Search { term: String },
    /// Call an API endpoint through the dispatcher.
    Call {
        method: String,
        path: String,
        /// Send without authentication.
        #[arg(long)]
        public: bool,
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Replace the default headers.
        #[arg(long = "header", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
        /// JSON request body.
        #[arg(long, conflicts_with_all = ["fields", "files"])]
        json: Option<String>,
        /// Multipart text field.
        #[arg(long = "field", value_parser = parse_pair)]
        fields: Vec<(String, String)>,
        /// Multipart file field, as name=path.
        #[arg(long = "file", value_parser = parse_pair)]
        files: Vec<(String, String)>,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match api_failure(&e) {
                Some(message) => eprintln!("{message}"),
                None => error!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Plain message for a failed API call. The failure router has already
/// logged it, so only errors from outside the dispatcher return `None`.
fn api_failure(e: &anyhow::Error) -> Option<String> {
    match e.downcast_ref::<ApiError>()? {
        ApiError::MissingAuthToken => {
            Some("not logged in: run `tienda login --token <token>` first".to_string())
        }
        api => Some(api.to_string()),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)?.overlay_env(|k| std::env::var(k).ok())?,
        None => ClientConfig::from_env()?,
    };
    Ok(match &cli.base_url {
        Some(url) => config.with_base_url(url.clone()),
        None => config,
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let store = Arc::new(FileStore::new(&cli.store));
    let transport = Arc::new(UreqTransport::new(config.timeout()));
    let client = ApiClient::new(config, transport, store.clone(), Arc::new(TerminalNavigator));

    match cli.command {
        Command::Login { token, roles } => {
            Credentials::new(token, roles).save(&*store, client.config())?;
            eprintln!("session stored in {}", store.path().display());
        }
        Command::Logout => {
            Credentials::clear(&*store, client.config())?;
            eprintln!("session cleared");
        }
        Command::Search { term } => {
            let found = client.search_products(&term)?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        Command::Call {
            method,
            path,
            public,
            query,
            headers,
            json,
            fields,
            files,
        } => {
            let method: HttpMethod = method.parse()?;
            let mut req = ApiRequest::new(method, path);
            if public {
                req = req.public();
            }
            if !query.is_empty() {
                req.query = Some(query);
            }
            if !headers.is_empty() {
                req.headers = Some(headers);
            }
            if let Some(raw) = json {
                let body = serde_json::from_str(&raw).context("--json is not valid JSON")?;
                req = req.json(body);
            } else if !fields.is_empty() || !files.is_empty() {
                req = req.form(build_form(fields, files)?);
            }

            let page = client.page(cli.page);
            let out = client.dispatch(&page, req)?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn build_form(
    fields: Vec<(String, String)>,
    files: Vec<(String, String)>,
) -> anyhow::Result<MultipartForm> {
    let mut form = MultipartForm::new();
    for (name, value) in fields {
        form = form.text(name, value);
    }
    for (name, path) in files {
        let path = PathBuf::from(path);
        let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        form = form.file(name, filename, host::guess_content_type(&path), data);
    }
    Ok(form)
}
