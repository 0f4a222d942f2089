mod output;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use dsfapi_client::{
    CommandConnection, CommandSession, ConnectionConfig, ConnectionError, DEFAULT_SOCKET_PATH,
    HttpEndpointConnection, HttpEndpointOptions, HttpEndpointSocket, HttpEndpointType,
    HttpResponseType, InterceptConnection, InterceptOptions, InterceptionMode,
    SubscribeConnection, SubscribeOptions, SubscriptionMode,
};
use dsfapi_core::{Code, CodeChannel, CodeParseError, MessageType};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::output::{Format, print_intercepted, print_parsed, print_update, print_value};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "dsf",
    version,
    about = "Duet Software Framework client: parse codes offline, or talk to the control server"
)]
struct Cli {
    /// Output mode: "pretty" for terminal output, "json" for one JSON
    /// document per line. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Path of the control server socket.
    #[arg(long, global = true, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// More log output on stderr (-v info, -vv debug, -vvv trace with raw
    /// protocol messages). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    // ── Offline ─────────────────────────────────────────────────────
    /// Parse code lines and print their structure.
    Parse {
        /// Input file, or `-` for stdin.
        file: String,
    },

    /// Rewrite code lines in canonical form.
    Format {
        /// Input file, or `-` for stdin.
        file: String,
        /// Write formatted output back to the file (in-place).
        #[arg(long, short, conflicts_with = "check")]
        write: bool,
        /// Check if the file is already formatted (exit 1 if not).
        #[arg(long, conflicts_with = "write")]
        check: bool,
    },

    // ── Command mode ────────────────────────────────────────────────
    /// Execute a code and print its reply.
    Send {
        /// Code text, e.g. `M115`.
        code: String,
        /// Channel to run the code on.
        #[arg(long, default_value = "SBC")]
        channel: CodeChannel,
    },

    /// Print the object model.
    Model,

    /// Register a custom HTTP endpoint and answer every request with a
    /// fixed body until interrupted.
    Endpoint {
        /// HTTP method (GET, POST, ... or WebSocket).
        #[arg(long, default_value = "GET")]
        method: HttpEndpointType,
        /// First path segment after `/machine/`.
        namespace: String,
        /// Remaining path.
        path: String,
        /// Body sent back for each request.
        #[arg(long, default_value = "")]
        response: String,
        /// How the server should treat the body.
        #[arg(long, value_enum, default_value_t = ResponseKind::Text)]
        response_type: ResponseKind,
        /// Let the server stream uploads to a file first.
        #[arg(long)]
        upload: bool,
    },

    // ── Streaming modes ─────────────────────────────────────────────
    /// Intercept codes; resolve the listed ones after flushing, let the
    /// rest through.
    Intercept {
        /// Interception stage.
        #[arg(long, value_enum, default_value_t = Stage::Pre)]
        mode: Stage,
        /// Codes to resolve, e.g. `M1234`. Repeatable.
        #[arg(long = "resolve", value_name = "CODE")]
        resolve: Vec<String>,
        /// Only intercept these codes. Defaults to the `--resolve` list.
        #[arg(long = "filter", value_name = "CODE")]
        filters: Vec<String>,
        /// Message attached to resolved codes.
        #[arg(long)]
        message: Option<String>,
        /// Also intercept prioritized codes.
        #[arg(long)]
        priority: bool,
        /// Stop after this many codes.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Print object model updates as they arrive.
    Subscribe {
        /// Receive the full model every time instead of patches.
        #[arg(long)]
        full: bool,
        /// Object model path filter. Repeatable.
        #[arg(long = "filter", value_name = "PATH")]
        filters: Vec<String>,
        /// Stop after this many updates.
        #[arg(long)]
        count: Option<usize>,
    },
}

/// Response body type for the `endpoint` command.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResponseKind {
    /// The body is a status code only.
    Status,
    /// Plain text.
    Text,
    /// JSON text.
    Json,
    /// Path of a file to send.
    File,
}

impl From<ResponseKind> for HttpResponseType {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Status => HttpResponseType::StatusCode,
            ResponseKind::Text => HttpResponseType::PlainText,
            ResponseKind::Json => HttpResponseType::Json,
            ResponseKind::File => HttpResponseType::File,
        }
    }
}

/// Interception stage for the `intercept` command.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Stage {
    /// Before internal processing.
    Pre,
    /// Before the firmware runs the code.
    Post,
    /// After the firmware ran the code.
    Executed,
}

impl From<Stage> for InterceptionMode {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Pre => InterceptionMode::Pre,
            Stage::Post => InterceptionMode::Post,
            Stage::Executed => InterceptionMode::Executed,
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = Format::resolve_or_detect(cli.output.as_deref());

    let mut config = ConnectionConfig::with_socket_path(&cli.socket);
    config.trace_io = cli.verbose >= 3;

    match cli.cmd {
        Cmd::Parse { file } => cmd_parse(&file, format)?,
        Cmd::Format { file, write, check } => cmd_format(&file, write, check)?,
        Cmd::Send { code, channel } => cmd_send(config, &code, channel, format)?,
        Cmd::Model => cmd_model(config, format)?,
        Cmd::Endpoint {
            method,
            namespace,
            path,
            response,
            response_type,
            upload,
        } => cmd_endpoint(
            config,
            method,
            &namespace,
            &path,
            response,
            response_type.into(),
            upload,
        )?,
        Cmd::Intercept {
            mode,
            resolve,
            filters,
            message,
            priority,
            count,
        } => {
            let mut options = InterceptOptions::new(mode.into());
            options.priority_codes = priority;
            let filters = if filters.is_empty() { resolve.clone() } else { filters };
            options.filters = (!filters.is_empty()).then_some(filters);
            cmd_intercept(config, options, &resolve, message, count, format)?;
        }
        Cmd::Subscribe {
            full,
            filters,
            count,
        } => {
            let mode = if full {
                SubscriptionMode::Full
            } else {
                SubscriptionMode::Patch
            };
            let mut options = SubscribeOptions::new(mode);
            options.filters = (!filters.is_empty()).then_some(filters);
            cmd_subscribe(config, options, count, format)?;
        }
    }

    Ok(())
}

// ── Offline commands ────────────────────────────────────────────────────

fn cmd_parse(file: &str, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let mut failed = false;
    for (index, line) in input.lines().enumerate() {
        let parsed = Code::parse(line);
        if matches!(parsed, Err(CodeParseError::EmptyLine)) {
            continue;
        }
        failed |= parsed.is_err();
        print_parsed(index + 1, &parsed, format);
    }
    if failed {
        process::exit(1);
    }
    Ok(())
}

fn cmd_format(file: &str, write: bool, check: bool) -> Result<()> {
    if write && file == "-" {
        bail!("--write needs a file, not stdin");
    }
    let input = read_input(file)?;
    let mut formatted = String::with_capacity(input.len());
    let mut failed = false;
    for (index, line) in input.lines().enumerate() {
        match Code::parse(line) {
            Ok(code) => formatted.push_str(&canonical_line(&code)),
            Err(CodeParseError::EmptyLine) => {}
            Err(err) => {
                eprintln!("{file}:{}: {err}", index + 1);
                failed = true;
                formatted.push_str(line);
            }
        }
        formatted.push('\n');
    }

    if check {
        if formatted != input {
            eprintln!("{file} is not formatted");
            process::exit(1);
        }
    } else if write {
        if formatted != input {
            fs::write(file, &formatted).with_context(|| format!("failed to write {file}"))?;
            eprintln!("formatted {file}");
        }
    } else {
        print!("{formatted}");
    }

    if failed {
        process::exit(1);
    }
    Ok(())
}

// ── Command mode ────────────────────────────────────────────────────────

fn cmd_send(config: ConnectionConfig, code: &str, channel: CodeChannel, format: Format) -> Result<()> {
    let mut conn = connect_command(config)?;
    let reply = conn
        .perform_simple_code(code, channel)
        .with_context(|| format!("failed to execute {code}"))?;
    conn.close();
    match format {
        Format::Json => println!("{}", serde_json::to_string(&reply)?),
        Format::Pretty if reply.is_empty() => {}
        Format::Pretty => println!("{}", reply.trim_end()),
    }
    Ok(())
}

fn cmd_model(config: ConnectionConfig, format: Format) -> Result<()> {
    let mut conn = connect_command(config)?;
    let model = conn
        .get_object_model()
        .context("failed to fetch the object model")?;
    conn.close();
    print_value(&model, format)
}

fn cmd_endpoint(
    config: ConnectionConfig,
    method: HttpEndpointType,
    namespace: &str,
    path: &str,
    response: String,
    response_type: HttpResponseType,
    upload: bool,
) -> Result<()> {
    let mut conn = connect_command(config)?;
    let socket_path = conn
        .add_http_endpoint(method, namespace, path, upload)
        .with_context(|| format!("failed to register {method} /machine/{namespace}/{path}"))?;
    info!(socket = %socket_path.display(), "endpoint registered");

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
    let served = runtime.block_on(serve_endpoint(
        method,
        namespace,
        path,
        socket_path,
        response,
        response_type,
    ));

    let removed = conn.remove_http_endpoint(method, namespace, path);
    conn.close();
    served?;
    if !removed.context("failed to remove the endpoint")? {
        warn!("endpoint was already gone");
    }
    Ok(())
}

async fn serve_endpoint(
    method: HttpEndpointType,
    namespace: &str,
    path: &str,
    socket_path: PathBuf,
    response: String,
    response_type: HttpResponseType,
) -> Result<()> {
    let socket =
        HttpEndpointSocket::bind(method, namespace, path, socket_path, HttpEndpointOptions::default())
            .await
            .context("failed to listen on the endpoint socket")?;

    let response = Arc::new(response);
    socket.set_endpoint_handler(move |mut conn: HttpEndpointConnection| {
        let response = Arc::clone(&response);
        async move {
            let request = match conn.read_request().await {
                Ok(request) => request,
                Err(err) => {
                    warn!(error = %err, "could not read request");
                    return;
                }
            };
            info!(
                session = request.session_id,
                body_bytes = request.body.len(),
                "request received"
            );
            if let Err(err) = conn.send_response(200, response.as_str(), response_type).await {
                warn!(error = %err, "could not send response");
            }
        }
    });

    eprintln!("serving {method} /machine/{namespace}/{path}; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    socket.close().await.context("failed to close the endpoint")?;
    Ok(())
}

// ── Streaming modes ─────────────────────────────────────────────────────

fn cmd_intercept(
    config: ConnectionConfig,
    options: InterceptOptions,
    resolve: &[String],
    message: Option<String>,
    count: Option<usize>,
    format: Format,
) -> Result<()> {
    let mut conn = InterceptConnection::connect(config, options)
        .context("failed to open an intercepting connection")?;

    let mut handled = 0;
    while count.is_none_or(|limit| handled < limit) {
        let code = match conn.receive_code() {
            Ok(code) => code,
            Err(ConnectionError::ConnectionClosed) => break,
            Err(err) => return Err(err).context("failed to receive a code"),
        };
        handled += 1;

        let short = code.short_str();
        if !resolve.iter().any(|c| c.eq_ignore_ascii_case(&short)) {
            conn.ignore_code()?;
            print_intercepted(&code, "ignored", format)?;
            continue;
        }

        // Wait until everything queued before the code has run.
        match conn.flush(code.channel) {
            Ok(true) => {
                conn.resolve_code(MessageType::Success, message.clone())?;
                print_intercepted(&code, "resolved", format)?;
            }
            Ok(false) => {
                debug!(code = %short, "flush failed");
                conn.cancel_code()?;
                print_intercepted(&code, "cancelled", format)?;
            }
            Err(err) if !err.is_fatal() => {
                warn!(error = %err, code = %short, "flush failed");
                conn.cancel_code()?;
                print_intercepted(&code, "cancelled", format)?;
            }
            Err(err) => return Err(err).context("connection lost during flush"),
        }
    }
    conn.close();
    Ok(())
}

fn cmd_subscribe(
    config: ConnectionConfig,
    options: SubscribeOptions,
    count: Option<usize>,
    format: Format,
) -> Result<()> {
    let mut conn =
        SubscribeConnection::connect(config, options).context("failed to subscribe")?;

    let mut received = 0;
    while count.is_none_or(|limit| received < limit) {
        let update = match conn.next_update() {
            Ok(update) => update,
            Err(ConnectionError::ConnectionClosed) => break,
            Err(err) => return Err(err).context("failed to receive an update"),
        };
        received += 1;
        print_update(&update, format)?;
    }
    conn.close();
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Route `tracing` output to stderr. `RUST_LOG` overrides `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn connect_command(config: ConnectionConfig) -> Result<CommandConnection> {
    CommandConnection::connect(config).context("failed to connect to the control server")
}

/// Read a file, or stdin for `-`.
fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("failed to read stdin")?;
        Ok(input)
    } else {
        fs::read_to_string(file).with_context(|| format!("failed to read {file}"))
    }
}

/// One formatted line: indentation and line number kept, the rest canonical.
fn canonical_line(code: &Code) -> String {
    let indent = " ".repeat(usize::from(code.indent));
    match code.line_number {
        Some(number) => format!("{indent}N{number} {code}"),
        None => format!("{indent}{code}"),
    }
}
