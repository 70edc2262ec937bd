use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use url::Url;

use ghostframe::proxy::target::ProxyTarget;
use ghostframe::rewrite::wrap::{merge_form_fields, unwrap_url, wrap_url};

#[derive(Parser)]
#[command(name = "ghostframe-cli")]
#[command(about = "Helper CLI for the GhostFrame rewriting proxy", long_about = None)]
struct Cli {
    /// Proxy endpoint path.
    #[arg(short, long, default_value = "/api/proxy")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a link the way the in-page interceptor does
    Wrap {
        /// Link target, absolute or relative to --base
        target: String,
        /// Document base the target resolves against
        #[arg(short, long, default_value = "https://example.com/")]
        base: String,
        /// GET form field merged into the query (name=value, repeatable)
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },
    /// Decode the target out of a wrapped URL
    Unwrap { wrapped: String },
    /// Fetch a target through a running proxy and summarize the response
    Fetch {
        /// Target URL; the scheme defaults to https
        target: String,
        /// Base URL of the running proxy
        #[arg(short, long, default_value = "http://localhost:8080")]
        proxy: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Wrap { target, base, fields } => {
            let base = Url::parse(&base)?;
            let target = if fields.is_empty() {
                target
            } else {
                let mut action = base.join(&target)?;
                let pairs = fields
                    .iter()
                    .map(|f| f.split_once('=').unwrap_or((f.as_str(), "")));
                merge_form_fields(&mut action, pairs);
                action.to_string()
            };
            println!("{}", wrap_url(&cli.endpoint, &base, &target));
        }
        Commands::Unwrap { wrapped } => match unwrap_url(&cli.endpoint, &wrapped) {
            Some(target) => println!("{}", target),
            None => {
                eprintln!("Error: not a wrapped URL for endpoint {}", cli.endpoint);
                std::process::exit(1);
            }
        },
        Commands::Fetch { target, proxy } => {
            let resolved = ProxyTarget::resolve(Some(&target))?;
            let mut url = Url::parse(&proxy)?.join(&cli.endpoint)?;
            url.query_pairs_mut().append_pair("url", resolved.resolved.as_str());

            let res = reqwest::get(url).await?;
            let status = res.status();
            let content_type = res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let headers: Vec<String> = res
                .headers()
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
                .collect();
            let body = res.bytes().await?;

            println!("status: {}", status);
            println!("content-type: {}", content_type);
            println!("bytes: {}", body.len());
            for line in headers {
                println!("  {}", line);
            }
        }
    }

    Ok(())
}
