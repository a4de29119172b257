// ABOUTME: CLI for sanitizing HTML fragments with the htmlfilter library.
// ABOUTME: Reads files or stdin, filters them against a configurable whitelist and writes text or JSON.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use htmlfilter::{parse_allowed_tags, HtmlFilter, RawConfig};
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sanitize untrusted HTML fragments against a tag whitelist.
#[derive(Parser, Debug)]
#[command(name = "htmlfilter")]
#[command(about = "Filter untrusted HTML down to a safe, balanced whitelist", long_about = None)]
struct Args {
    /// Input files. Use "-" (or nothing) to read from stdin.
    inputs: Vec<String>,

    /// Escape unmatched angle brackets instead of repairing them into tags.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Keep HTML comments (escaped) instead of stripping them.
    #[arg(long, default_value_t = false)]
    keep_comments: bool,

    /// JSON configuration document layered over the default whitelist.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replace the tag whitelist, e.g. "p;br;a:href,title".
    #[arg(long, value_name = "SPEC")]
    allow: Option<String>,

    /// Write output to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit JSON records of the form {"input": ..., "output": ...}.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Output compact JSON instead of pretty (with --json).
    #[arg(long, default_value_t = false)]
    compact: bool,

    /// Log filtering decisions to stderr.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let filter = build_filter(&args)?;
    let targets = if args.inputs.is_empty() {
        vec!["-".to_string()]
    } else {
        args.inputs.clone()
    };

    let mut records = Vec::with_capacity(targets.len());
    for target in &targets {
        let input = load_input(target)?;
        let output = filter.filter(&input);
        tracing::debug!(
            input = %target,
            before = input.len(),
            after = output.len(),
            "filtered input"
        );
        records.push((target.as_str(), output));
    }

    let rendered = if args.json {
        let docs: Vec<_> = records
            .iter()
            .map(|(input, output)| json!({ "input": input, "output": output }))
            .collect();
        let doc = if docs.len() == 1 {
            docs[0].clone()
        } else {
            json!(docs)
        };
        let mut text = if args.compact {
            serde_json::to_string(&doc)?
        } else {
            serde_json::to_string_pretty(&doc)?
        };
        text.push('\n');
        text
    } else {
        records
            .into_iter()
            .map(|(_, output)| output)
            .collect::<Vec<_>>()
            .join("\n")
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn build_filter(args: &Args) -> Result<HtmlFilter> {
    let raw = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<RawConfig>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => RawConfig::default(),
    };

    let mut builder = raw.into_builder();
    if args.strict {
        builder = builder.always_make_tags(false);
    }
    if args.keep_comments {
        builder = builder.strip_comments(false);
    }
    if let Some(spec) = &args.allow {
        builder = builder.allowed_tags(parse_allowed_tags(spec));
    }

    let config = builder.build().context("invalid filter configuration")?;
    Ok(HtmlFilter::with_config(config))
}

fn load_input(target: &str) -> Result<String> {
    if target == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }

    fs::read_to_string(target).with_context(|| format!("failed to read {target}"))
}
