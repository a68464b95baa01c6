//! Command line entry point.
//!
//! Maps arguments onto [`hget::client::Config`] and [`hget::client::RequestOptions`],
//! runs the request and prints the outcome. All protocol work is in the library.

use std::process;
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::LevelFilter;
use serde_json::{Map, Value};

use hget::client::{Client, Config, RequestOptions, DEFAULT_MAX_REDIRECTS};
use hget::{Error, Response};

#[derive(Parser, Debug)]
#[command(
    name = "hget",
    about = "a non-interactive network retriever",
    disable_version_flag = true
)]
struct Cli {
    /// URL to work with
    #[arg(required_unless_present = "version")]
    url: Option<String>,

    /// Make the operation more talkative
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Show the version number and quit
    #[arg(short = 'v', long)]
    version: bool,

    /// Method used for the request
    #[arg(short = 'M', long, default_value = "GET")]
    method: String,

    /// Data to send in the request
    #[arg(short = 'D', long, default_value = "")]
    data: String,

    /// Send a custom header, as Name:Value (repeatable)
    #[arg(short = 'H', long = "headers", value_name = "NAME:VALUE", action = ArgAction::Append)]
    headers: Vec<String>,

    /// Only send custom headers
    #[arg(long)]
    no_default_headers: bool,

    /// Authorization as scheme/user:pass
    #[arg(short = 'A', long, value_name = "SCHEME/USER:PASS")]
    auth: Option<String>,

    /// Don't follow redirects
    #[arg(short = 'R', long)]
    no_redirect: bool,

    /// Give up after this many redirects
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Connect and read timeout in seconds, 0 to wait forever
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Print the response head as JSON
    #[arg(short = 'j', long)]
    json: bool,

    /// Don't print the response body
    #[arg(short = 'n', long)]
    no_data: bool,

    /// Print markers around headers and body
    #[arg(short = 'm', long)]
    markers: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!(
            "hget {} ({}-{})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        return;
    }

    init_logger(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("hget: {}", e);
        process::exit(1);
    }
}

/// Log to stderr, `RUST_LOG` overrides the defaults.
fn init_logger(verbose: bool) {
    let mut builder = default_logger(verbose);
    builder.parse_env(env_logger::Env::default());

    // Only fails if a logger is already set.
    let _ = builder.try_init();
}

fn default_logger(verbose: bool) -> env_logger::Builder {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("hget", level);
    builder.filter_module("rustls", LevelFilter::Warn);
    builder.format_timestamp(None);

    builder
}

fn run(cli: &Cli) -> Result<(), Error> {
    let timeout = Some(Duration::from_secs(cli.timeout)).filter(|d| !d.is_zero());

    let config = Config {
        follow_redirects: !cli.no_redirect,
        max_redirects: cli.max_redirects,
        connect_timeout: timeout,
        read_timeout: timeout,
        default_headers: !cli.no_default_headers,
        ..Default::default()
    };

    let mut opts = RequestOptions {
        method: cli.method.clone(),
        body: cli.data.clone(),
        auth: cli.auth.clone(),
        ..Default::default()
    };
    for token in &cli.headers {
        opts.header_arg(token)?;
    }

    let url = cli.url.as_deref().unwrap_or_default();
    let response = Client::new(config).run(url, &opts)?;

    print_response(cli, &response);

    Ok(())
}

fn print_response(cli: &Cli, response: &Response) {
    if cli.verbose || cli.json {
        if cli.markers {
            println!("--- headers ---");
        }
        if cli.json {
            println!("{}", head_json(response));
        } else {
            print!("{}", response.head);
        }
    }

    if !cli.no_data {
        if cli.markers {
            println!("--- body ---");
        }
        println!("{}", response.body);
    }
}

fn head_json(response: &Response) -> String {
    let head = &response.head;
    let mut map = Map::new();

    if let Some(code) = head.code {
        map.insert("code".into(), Value::from(code.as_u16()));
    }
    if let Some(status) = &head.status {
        map.insert("status".into(), Value::from(status.as_str()));
    }
    for (name, value) in &head.headers {
        map.insert(name.to_string(), Value::from(value));
    }

    serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_default()
}
