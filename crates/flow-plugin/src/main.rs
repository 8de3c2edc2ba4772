//! Demo plugin binary.
//!
//! Serves a small plugin over standard input and output. Exercises each
//! restriction kind, a context menu, a plugin action and host actions.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use flow_plugin::config::CONFIG_FILE_NAME;
use flow_plugin::{
    ActionRef, Invocation, MenuRef, Output, Param, Plugin, PluginContext, Restriction,
    RuntimeConfig, SearchRequest, SearchResult,
};

/// Command-line arguments for the demo plugin.
#[derive(Parser, Debug)]
#[command(name = "flow-plugin-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the runtime configuration file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Tracing filter, overriding the configuration file
    #[arg(long)]
    log_filter: Option<String>,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,
}

async fn on_init(context: PluginContext) -> anyhow::Result<()> {
    tracing::info!(
        keywords = ?context.metadata().action_keywords,
        "Demo plugin ready"
    );
    Ok(())
}

async fn help(request: SearchRequest) -> anyhow::Result<Vec<SearchResult>> {
    let keyword = request.query.action_keyword().to_string();
    let hints = [
        ("time", "Show the current Unix time"),
        ("greet <name>", "Say hello"),
        ("add <a> <b>", "Add two integers"),
        ("rgb <r> <g> <b>", "Convert a color to hex"),
    ];
    Ok(hints
        .into_iter()
        .map(|(usage, description)| {
            SearchResult::new(format!("{keyword} {usage}").trim().to_string())
                .subtitle(description)
                .autocomplete(format!("{keyword} {}", usage.split(' ').next().unwrap_or(usage)))
                .action(ActionRef::plugin("noop").dont_hide())
        })
        .collect())
}

async fn time(request: SearchRequest) -> anyhow::Result<SearchResult> {
    let seconds = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(SearchResult::new(seconds.to_string())
        .subtitle("Seconds since the Unix epoch")
        .copy_text(seconds.to_string())
        .action(
            request
                .context
                .actions()
                .copy_to_clipboard(&seconds.to_string(), false, true),
        ))
}

async fn greet(request: SearchRequest) -> anyhow::Result<Output> {
    let name = request.query.search().to_string();
    if request.signal.is_cancelled() {
        return Ok(Output::None);
    }
    Ok(SearchResult::new(format!("Hello, {name}!"))
        .subtitle("Press enter to shout it")
        .context_menu(MenuRef::new("greetings").arg(name.as_str()))
        .action(ActionRef::plugin("shout").arg(name))
        .into())
}

async fn add(request: SearchRequest) -> anyhow::Result<SearchResult> {
    let a = request.args.i64("a").unwrap_or_default();
    let b = request.args.i64("b").unwrap_or_default();
    let sum = a.checked_add(b).ok_or_else(|| anyhow::anyhow!("{a} + {b} overflows"))?;
    Ok(SearchResult::new(sum.to_string())
        .subtitle(format!("{a} + {b}"))
        .action(request.context.actions().change_query(&sum.to_string(), false)))
}

async fn rgb(request: SearchRequest) -> anyhow::Result<Output> {
    let channels: Option<Vec<u8>> = ["_1", "_2", "_3"]
        .iter()
        .map(|name| request.args.i64(name).and_then(|v| u8::try_from(v).ok()))
        .collect();
    let Some(channels) = channels else {
        return Ok("Channels must be between 0 and 255".into());
    };
    let hex = format!("#{:02x}{:02x}{:02x}", channels[0], channels[1], channels[2]);
    Ok(SearchResult::new(hex.clone())
        .subtitle("Copy hex color")
        .copy_text(hex.clone())
        .action(request.context.actions().copy_to_clipboard(&hex, false, true))
        .into())
}

async fn greetings(invocation: Invocation) -> anyhow::Result<Vec<String>> {
    let name = invocation.str_arg(0).unwrap_or("stranger");
    Ok(vec![
        format!("Good morning, {name}"),
        format!("Good night, {name}"),
    ])
}

async fn shout(invocation: Invocation) -> anyhow::Result<()> {
    let name = invocation.str_arg(0).unwrap_or("stranger").to_uppercase();
    invocation
        .context
        .api()
        .show_message(&format!("HELLO, {name}!"), "", "")
        .await?;
    Ok(())
}

async fn noop(_: Invocation) -> anyhow::Result<bool> {
    Ok(false)
}

fn build() -> flow_plugin::Result<Plugin> {
    Plugin::builder()
        .on_init(on_init)
        .search("help", Restriction::none(), help)
        .search("time", Restriction::equal_to("time"), time)
        .search(
            "greet",
            Restriction::starts_with("greet ")
                .min_length(1)
                .max_length(40)
                .debounce(Duration::from_millis(150)),
            greet,
        )
        .search_with_params(
            "add",
            Restriction::regex(r"^add (?<a>-?\d+) (?<b>-?\d+)$")?,
            vec![Param::integer("a"), Param::integer("b")],
            add,
        )
        .search_with_params(
            "rgb",
            Restriction::regex(r"^rgb (\d+) (\d+) (\d+)$")?,
            vec![Param::integer("_1"), Param::integer("_2"), Param::integer("_3")],
            rgb,
        )
        .context_menu("greetings", greetings)
        .action("shout", shout)
        .action("noop", noop)
        .build()
}

/// Main entry point for the demo plugin.
///
/// Uses tokio's current_thread runtime; the plugin is I/O bound and talks to
/// a single host.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    run(Args::parse()).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RuntimeConfig::load_or_default(&args.config).await?;
    if let Some(filter) = args.log_filter {
        config.log_filter = filter;
    }
    if args.write_config {
        config.save(&args.config).await?;
        eprintln!("Wrote {}", args.config.display());
        return Ok(());
    }
    flow_plugin::logging::init(&config)?;

    tracing::debug!(config = ?args.config, "Starting demo plugin");
    build()?.serve_stdio(config.max_frame_bytes).await?;
    tracing::debug!("Host closed the connection");
    Ok(())
}
