//! LinkPreview CLI - turn a URL into summarization-ready text

use clap::{Parser, Subcommand, ValueEnum};
use linkpreview::{
    CacheMode, ExtractedLinkContent, ExtractionRequest, LinkPreview, MarkdownMode, OutputFormat,
    ProgressSink, ScrapeFallbackMode, VideoTranscriptMode,
};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Output format for the preview subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum CliOutput {
    /// Markdown with YAML frontmatter
    #[default]
    Md,
    /// JSON format
    Json,
}

/// LinkPreview - content and transcript resolution for pasted links
#[derive(Parser, Debug)]
#[command(name = "linkpreview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a URL into normalized content plus an optional transcript
    Preview {
        /// URL or local HTML file to resolve
        url: String,

        /// Output format
        #[arg(long, short, default_value = "md")]
        output: CliOutput,

        /// Emit content as markdown instead of plain text
        #[arg(long)]
        markdown: bool,

        /// Skip the cache for this request
        #[arg(long)]
        no_cache: bool,

        /// Skip transcript resolution
        #[arg(long)]
        no_transcripts: bool,

        /// Always use the managed scrape service when one is configured
        #[arg(long)]
        force_scrape: bool,

        /// Maximum characters in the final content
        #[arg(long)]
        max_chars: Option<usize>,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Custom User-Agent
        #[arg(long)]
        user_agent: Option<String>,

        /// Print progress events to stderr as JSON lines
        #[arg(long)]
        progress: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Preview {
            url,
            output,
            markdown,
            no_cache,
            no_transcripts,
            force_scrape,
            max_chars,
            timeout_ms,
            user_agent,
            progress,
        }) => {
            let mut request = ExtractionRequest::new(url);
            if markdown {
                request = request
                    .format(OutputFormat::Markdown)
                    .markdown_mode(MarkdownMode::Auto);
            }
            if no_cache {
                request = request.cache_mode(CacheMode::Bypass);
            }
            if no_transcripts {
                request = request.video_transcripts(VideoTranscriptMode::Off);
            }
            if force_scrape {
                request = request.scrape_fallback(ScrapeFallbackMode::Always);
            }
            if let Some(max) = max_chars {
                request = request.max_chars(max);
            }
            if let Some(ms) = timeout_ms {
                request = request.timeout_ms(ms);
            }

            run_preview(request, output, user_agent, progress).await;
        }
        None => {
            eprintln!("Usage: linkpreview preview <URL>");
            eprintln!("   or: linkpreview --help");
            std::process::exit(1);
        }
    }
}

async fn run_preview(
    request: ExtractionRequest,
    output: CliOutput,
    user_agent: Option<String>,
    progress: bool,
) {
    let mut builder = LinkPreview::builder();
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    if progress {
        let sink: ProgressSink = Arc::new(|event| {
            if let Ok(line) = serde_json::to_string(&event) {
                eprintln!("{}", line);
            }
        });
        builder = builder.progress_sink(sink);
    }

    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match client.preview(request).await {
        Ok(result) => match output {
            CliOutput::Md => writeln_safe(&format_md_with_frontmatter(&result)),
            CliOutput::Json => {
                let json = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                    eprintln!("Error serializing result: {}", e);
                    std::process::exit(1);
                });
                writeln_safe(&json);
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Format a result as markdown with YAML frontmatter
fn format_md_with_frontmatter(result: &ExtractedLinkContent) -> String {
    let mut output = String::new();

    output.push_str("---\n");
    output.push_str(&format!("url: {}\n", result.url));
    if let Some(ref title) = result.title {
        output.push_str(&format!("title: {}\n", title));
    }
    if let Some(ref site) = result.site_name {
        output.push_str(&format!("site_name: {}\n", site));
    }
    if let Some(ref description) = result.description {
        output.push_str(&format!("description: {}\n", description));
    }
    if let Some(source) = result.transcript_source {
        output.push_str(&format!("transcript_source: {}\n", source));
    }
    if let Some(chars) = result.transcript_characters {
        output.push_str(&format!("transcript_characters: {}\n", chars));
    }
    if result.truncated {
        output.push_str("truncated: true\n");
    }
    output.push_str(&format!("word_count: {}\n", result.word_count));
    output.push_str("---\n");
    output.push_str(&result.content);

    output
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
