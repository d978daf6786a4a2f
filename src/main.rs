use std::fmt;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use ncparse::{Config, Envelope};

#[derive(Debug, Parser)]
#[command(
    name = "ncparse",
    version,
    about = "Convert registrar API markup responses to JSON"
)]
struct Args {
    /// Response files (defaults to stdin)
    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,
    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
    /// Fail on input that had to be kept as raw text
    #[arg(long)]
    strict: bool,
    /// Require an ApiResponse envelope with Status="OK"
    #[arg(long)]
    envelope: bool,
    /// Command the responses must answer, e.g. namecheap.domains.check
    #[arg(long, value_name = "COMMAND", requires = "envelope")]
    command: Option<String>,
    /// Emit {"error": ...} for a failing input instead of aborting
    #[arg(long)]
    continue_on_fail: bool,
    /// Print JSON on a single line
    #[arg(long)]
    compact: bool,
    /// Key for text that shares an element with attributes or children
    #[arg(long, default_value = ncparse::DEFAULT_TEXT_KEY)]
    text_key: String,
    /// Maximum element nesting depth (0 = unlimited)
    #[arg(long, default_value_t = 128)]
    max_depth: u16,
    /// Maximum input size in bytes (0 = unlimited)
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    max_size: usize,
}

/// Per-input processing options
#[derive(Debug)]
struct Options {
    config: Config,
    strict: bool,
    envelope: bool,
    command: Option<String>,
}

#[derive(Debug)]
enum Source {
    Stdin(String),
    File(PathBuf),
}

impl Source {
    fn load(&self) -> Result<String> {
        match self {
            Self::Stdin(buffer) => Ok(buffer.clone()),
            Self::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {}", path.display())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin(_) => write!(f, "<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();

    let args = Args::parse();
    let options = Options {
        config: Config::new(args.max_depth, args.max_size).with_text_key(args.text_key.clone()),
        strict: args.strict,
        envelope: args.envelope,
        command: args.command.clone(),
    };

    let sources = sources(&args.inputs)?;
    let outcomes = run_all(&sources, &options);

    let mut items = Vec::with_capacity(outcomes.len());
    for (source, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            Ok(item) => items.push(item),
            Err(err) if args.continue_on_fail => {
                error!(input = %source, "{err:#}");
                items.push(json!({ "error": format!("{err:#}") }));
            }
            Err(err) => return Err(err),
        }
    }

    let document = match items.pop() {
        Some(item) if items.is_empty() => item,
        Some(item) => {
            items.push(item);
            serde_json::Value::Array(items)
        }
        None => bail!("no input to parse"),
    };

    let mut rendered = if args.compact {
        serde_json::to_string(&document)?
    } else {
        serde_json::to_string_pretty(&document)?
    };
    rendered.push('\n');
    write_output(args.output.as_deref(), rendered.as_bytes())
}

fn sources(inputs: &[PathBuf]) -> Result<Vec<Source>> {
    if !inputs.is_empty() {
        return Ok(inputs.iter().cloned().map(Source::File).collect());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read stdin")?;
    if buffer.trim().is_empty() {
        bail!("no input provided on stdin");
    }
    Ok(vec![Source::Stdin(buffer)])
}

/// Processes every source, one scoped thread per input
fn run_all(sources: &[Source], options: &Options) -> Vec<Result<serde_json::Value>> {
    if let [single] = sources {
        return vec![process(single, options)];
    }
    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| scope.spawn(move || process(source, options)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("parser thread panicked")))
            })
            .collect()
    })
}

fn process(source: &Source, options: &Options) -> Result<serde_json::Value> {
    let content = source.load()?;
    let mut parser = ncparse::Parser::with_config(&content, options.config.clone());

    let value = if options.strict {
        parser
            .parse_strict()
            .with_context(|| format!("failed to parse {source}"))?
    } else {
        let value = parser.parse();
        for degradation in parser.degradations() {
            warn!(input = %source, "{degradation}");
        }
        value
    };

    if options.envelope {
        let envelope = Envelope::from_value_with_text_key(&value, &options.config.text_key)
            .and_then(Envelope::into_result)
            .with_context(|| format!("bad response in {source}"))?;
        if let Some(command) = &options.command {
            envelope
                .expect_command(command)
                .with_context(|| format!("unexpected command in {source}"))?;
        }
    }

    info!(input = %source, "parsed");
    serde_json::to_value(&value).context("failed to serialize parsed value")
}

fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(data).context("failed to write stdout")?;
            Ok(())
        }
    }
}
