use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use redscout_core::{DepthTier, DiagnosticSink, RedditItem, SearchRequest};
use redscout_local::zai::{validate_endpoint, zai_api_key_from_env, DEFAULT_MODEL};
use redscout_local::{
    core_subject, search_reddit, Interpreter, RelevancePolicy, SearchParams, TracingSink,
    ZaiConfig, ZaiTransport, ZAI_CHAT_URL,
};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "redscout")]
#[command(about = "Find Reddit discussion threads through Z.AI web search", long_about = None)]
struct Cli {
    /// Verbose diagnostics (also enabled by REDSCOUT_DEBUG=1).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search Reddit threads about a topic (json).
    Search(SearchCmd),
    /// Interpret a saved service response offline (json).
    Parse(ParseCmd),
    /// Print the reduced subject of a verbose topic.
    CoreSubject(CoreSubjectCmd),
    /// Diagnose configuration issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    /// Topic to search for.
    topic: String,
    /// Depth tier. Allowed: quick, default, deep (unknown names fall back to default).
    #[arg(long, default_value = "default")]
    depth: String,
    /// Window start (YYYY-MM-DD). Advisory only.
    #[arg(long = "from", default_value = "")]
    from_date: String,
    /// Window end (YYYY-MM-DD). Advisory only.
    #[arg(long = "to", default_value = "")]
    to_date: String,
    /// Model override (default: REDSCOUT_ZAI_MODEL or glm-4.7).
    #[arg(long)]
    model: Option<String>,
    /// Full chat-completions endpoint override (default: REDSCOUT_ZAI_ENDPOINT or the Z.AI endpoint).
    #[arg(long)]
    base_url: Option<String>,
    /// Use this JSON file as the service response instead of calling the network.
    #[arg(long)]
    mock_response: Option<PathBuf>,
    /// Non-numeric relevance handling. Allowed: default, reject
    #[arg(long, default_value = "default")]
    relevance_policy: String,
    /// When nothing is found, search once more with the reduced core subject.
    #[arg(long)]
    narrow_retry: bool,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ParseCmd {
    /// Response JSON file, or `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// Non-numeric relevance handling. Allowed: default, reject
    #[arg(long, default_value = "default")]
    relevance_policy: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct CoreSubjectCmd {
    topic: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Optional `KEY=VALUE` env-file loader, opt-in through `REDSCOUT_ENV_FILE`.
///
/// Never overrides variables already present in the process environment and never logs values.
fn load_env_file() {
    let Ok(p) = std::env::var("REDSCOUT_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// `RUST_LOG` fallback. Verbose raises only this workspace's crates to debug.
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,redscout=debug,redscout_local=debug"
    } else {
        "redscout=info,redscout_local=info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn relevance_policy(name: &str) -> Result<RelevancePolicy> {
    RelevancePolicy::from_name(name)
        .with_context(|| format!("unknown relevance policy `{name}` (allowed: default, reject)"))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&txt).with_context(|| format!("parse JSON from {}", path.display()))
}

fn read_input(input: &str) -> Result<serde_json::Value> {
    if input.trim() == "-" {
        let mut txt = String::new();
        std::io::stdin()
            .read_to_string(&mut txt)
            .context("read stdin")?;
        return serde_json::from_str(&txt).context("parse JSON from stdin");
    }
    read_json(Path::new(input))
}

/// JSON envelope shared by `search` and `parse`.
#[derive(Debug, serde::Serialize)]
struct ItemsPayload<'a> {
    schema_version: u64,
    kind: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<DepthTier>,
    /// Core subject used by `--narrow-retry`, when the re-query ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    narrowed_to: Option<String>,
    count: usize,
    items: &'a [RedditItem],
}

impl<'a> ItemsPayload<'a> {
    fn new(kind: &'static str, items: &'a [RedditItem]) -> Self {
        Self {
            schema_version: 1,
            kind,
            ok: true,
            topic: None,
            depth: None,
            narrowed_to: None,
            count: items.len(),
            items,
        }
    }
}

fn print_items(payload: &ItemsPayload<'_>, output: &str) -> Result<()> {
    match output.to_ascii_lowercase().as_str() {
        "text" => {
            if payload.items.is_empty() {
                println!("no threads found");
            }
            for it in payload.items {
                println!(
                    "{}  r/{}  {}  {:.2}  {}",
                    it.id,
                    it.subreddit,
                    it.date.as_deref().unwrap_or("----------"),
                    it.relevance,
                    it.title
                );
                println!("    {}", it.url);
            }
        }
        _ => println!("{}", serde_json::to_string(payload)?),
    }
    Ok(())
}

async fn run_search(args: SearchCmd, sink: &dyn DiagnosticSink) -> Result<()> {
    let policy = relevance_policy(&args.relevance_policy)?;
    let depth = DepthTier::from_name_lenient(&args.depth);
    let request = SearchRequest::new(args.topic.clone())
        .with_depth(depth)
        .with_window(args.from_date.clone(), args.to_date.clone());

    let mock = match args.mock_response.as_deref() {
        Some(p) => Some(read_json(p)?),
        None => None,
    };

    let params = match ZaiConfig::from_env(args.model.clone(), args.base_url.clone()) {
        Ok(cfg) => cfg.search_params(request),
        // Offline runs never touch the network, so credentials are optional.
        Err(redscout_core::Error::NotConfigured(_)) if mock.is_some() => SearchParams {
            api_key: String::new(),
            model: args
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request,
            base_url: args.base_url.clone(),
        },
        Err(e) => return Err(e.into()),
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("redscout/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let transport = ZaiTransport::new(client);
    let interpreter = Interpreter::new(sink).with_relevance_policy(policy);

    let response = search_reddit(&transport, &params, mock.clone()).await?;
    let mut items = interpreter.interpret(&response)?;

    let mut narrowed_to: Option<String> = None;
    if items.is_empty() && args.narrow_retry {
        let core = core_subject(&args.topic);
        if !core.eq_ignore_ascii_case(args.topic.trim()) {
            tracing::info!(core = %core, "no threads found; retrying with core subject");
            let mut narrowed = params.clone();
            narrowed.request.topic = core.clone();
            let response = search_reddit(&transport, &narrowed, mock).await?;
            items = interpreter.interpret(&response)?;
            narrowed_to = Some(core);
        }
    }

    tracing::info!(
        count = items.len(),
        depth = %depth,
        "reddit search finished"
    );
    let payload = ItemsPayload {
        topic: Some(&args.topic),
        depth: Some(depth),
        narrowed_to,
        ..ItemsPayload::new("search", &items)
    };
    print_items(&payload, &args.output)
}

fn run_parse(args: ParseCmd, sink: &dyn DiagnosticSink) -> Result<()> {
    let policy = relevance_policy(&args.relevance_policy)?;
    let response = read_input(&args.input)?;
    let items = Interpreter::new(sink)
        .with_relevance_policy(policy)
        .interpret(&response)?;
    print_items(&ItemsPayload::new("parse", &items), &args.output)
}

fn run_doctor(args: DoctorCmd, sink: &dyn DiagnosticSink) {
    fn has_env(k: &str) -> bool {
        std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
    }

    let t0 = std::time::Instant::now();
    let api_key_configured = zai_api_key_from_env().is_some();
    let endpoint = std::env::var("REDSCOUT_ZAI_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let model = std::env::var("REDSCOUT_ZAI_MODEL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let mut checks: Vec<serde_json::Value> = Vec::new();
    checks.push(serde_json::json!({
        "name": "zai_api_key",
        "ok": api_key_configured,
        "message": if api_key_configured { "api key is set" } else { "api key is missing" },
        "hint": if api_key_configured { "" } else { "Set REDSCOUT_ZAI_API_KEY (or ZAI_API_KEY)." },
    }));

    let endpoint_err = endpoint
        .as_deref()
        .and_then(|ep| validate_endpoint(ep).err())
        .map(|e| e.to_string());
    let endpoint_ok = endpoint_err.is_none();
    checks.push(serde_json::json!({
        "name": "zai_endpoint",
        "ok": endpoint_ok,
        "message": if endpoint_ok { "endpoint is valid" } else { "endpoint is not a valid http(s) URL" },
        "hint": if endpoint_ok { "" } else { "Fix or unset REDSCOUT_ZAI_ENDPOINT." },
        "error": endpoint_err,
    }));

    let ok = checks
        .iter()
        .all(|c| c["ok"].as_bool().unwrap_or(false));
    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "redscout",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "zai": {
                "api_key": api_key_configured,
                "model": model,
                "endpoint": endpoint.as_deref().unwrap_or(ZAI_CHAT_URL),
                "endpoint_override": endpoint.is_some(),
            },
            "env_file": has_env("REDSCOUT_ENV_FILE"),
            "verbose": sink.verbose(),
        },
        "checks": checks,
    });

    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("redscout {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!(
                "zai: api_key={} model={} endpoint_override={}",
                api_key_configured,
                payload["configured"]["zai"]["model"].as_str().unwrap_or(""),
                endpoint.is_some(),
            );
            println!("checks:");
            if let Some(arr) = payload["checks"].as_array() {
                for c in arr {
                    let name = c["name"].as_str().unwrap_or("?");
                    let ok = c["ok"].as_bool().unwrap_or(false);
                    println!("- {}: {}", name, if ok { "ok" } else { "fail" });
                }
            }
        }
        _ => println!("{payload}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();

    let cli = Cli::parse();
    let sink = if cli.verbose {
        TracingSink::new(true)
    } else {
        TracingSink::from_env()
    };
    init_tracing(sink.verbose());

    match cli.command {
        Commands::Search(args) => run_search(args, &sink).await?,
        Commands::Parse(args) => run_parse(args, &sink)?,
        Commands::CoreSubject(args) => {
            let core = core_subject(&args.topic);
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("{core}"),
                _ => println!(
                    "{}",
                    serde_json::json!({
                        "schema_version": 1,
                        "kind": "core_subject",
                        "ok": true,
                        "topic": args.topic,
                        "core_subject": core,
                    })
                ),
            }
        }
        Commands::Doctor(args) => run_doctor(args, &sink),
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "redscout",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("redscout {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }

    Ok(())
}
