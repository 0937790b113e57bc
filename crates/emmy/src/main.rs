use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use emmy_core::bootstrap::BootstrapReader;
use emmy_core::config::DEFAULT_PIPE_NAME;
use emmy_core::types::{Address, ProcessId};
use emmy_core::TransportConfig;
use emmy_protocol::{Frame, PipeListener, PipeTransporter, Transporter};
use emmy_utils::{info, init_logging, init_logging_with_level, warn, LogFormat, LogLevel};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Front-end and injector tooling for the Emmy attach layer.
#[derive(Parser, Debug)]
#[command(name = "emmy")]
#[command(version)]
#[command(about = "Front-end and injector tooling for the Emmy attach layer", long_about = None)]
struct Cli
{
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format (pretty or json); overrides EMMY_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Act as the debugger front-end: accept engines and print every frame
    Listen
    {
        /// Pipe name, or a socket path on Unix
        #[arg(default_value = DEFAULT_PIPE_NAME)]
        name: String,
    },
    /// Connect the way the engine does, send one frame, disconnect
    Ping
    {
        /// Pipe name, or a socket path on Unix
        name: String,
        /// Command id of the frame
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        command: i32,
        /// Payload of the frame
        #[arg(short, long, default_value = "ping")]
        message: String,
        /// Connect timeout in milliseconds (default: EMMY_CONNECT_TIMEOUT_MS or 5000)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Read the bootstrap descriptor a loaded engine published
    Descriptor
    {
        /// Process the engine was injected into
        #[arg(long)]
        pid: u32,
        /// Base address the library was observed at (hex format: 0x7ff6... or decimal)
        #[arg(long)]
        base: Address,
    },
}

fn main()
{
    let cli = Cli::parse();

    let logging = match (cli.log_level, cli.log_format) {
        (None, None) => init_logging(),
        (level, format) => {
            init_logging_with_level(level.unwrap_or(LogLevel::Info), format.unwrap_or(LogFormat::Pretty))
        }
    };
    if let Err(e) = logging {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands) -> CliResult<()>
{
    match command {
        Commands::Listen { name } => listen(&name),
        Commands::Ping {
            name,
            command,
            message,
            timeout_ms,
        } => ping(&name, command, &message, timeout_ms.map(Duration::from_millis)),
        Commands::Descriptor { pid, base } => descriptor(ProcessId::from(pid), base),
    }
}

fn listen(name: &str) -> CliResult<()>
{
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_listener(name))
}

async fn run_listener(name: &str) -> CliResult<()>
{
    let mut listener = PipeListener::bind(name)?;
    println!("Listening on {}", listener.endpoint());

    tokio::select! {
        result = serve(&mut listener) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down listener");
            Ok(())
        }
    }
}

/// Accept engines one after another; each is served until it disconnects.
async fn serve(listener: &mut PipeListener) -> CliResult<()>
{
    loop {
        let mut connection = listener.accept().await?;
        println!("Engine connected");

        loop {
            match connection.read_frame().await {
                Ok(Some(frame)) => println!("{}", format_frame(&frame)),
                Ok(None) => {
                    println!("Engine disconnected");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Dropping engine connection");
                    println!("Engine connection lost: {e}");
                    break;
                }
            }
        }
    }
}

fn ping(name: &str, command: i32, message: &str, timeout: Option<Duration>) -> CliResult<()>
{
    let mut config = TransportConfig::from_env()?;
    if let Some(timeout) = timeout {
        config.connect_timeout = timeout;
    }
    let flush_timeout = config.connect_timeout;

    let transporter = PipeTransporter::with_config(config);
    transporter.connect(name)?;
    transporter.send(command, message.as_bytes());
    let delivered = transporter.flush(flush_timeout);
    let status = transporter.stop();

    if !delivered {
        return Err(format!("frame was not delivered to '{name}'").into());
    }
    println!(
        "Sent command {command} ({} bytes) to {name}, stop status {}",
        message.len(),
        status.code()
    );
    Ok(())
}

fn descriptor(pid: ProcessId, base: Address) -> CliResult<()>
{
    info!("Reading bootstrap descriptor of process {}", pid);
    let descriptor = BootstrapReader::open(pid)?.read()?;
    let entry = descriptor.entry_address(base)?;

    println!("Process:        {}", descriptor.process_id);
    println!("Module handle:  {}", descriptor.module_handle);
    println!("Entry offset:   0x{:x}", descriptor.init_entry_offset);
    println!("Entry address:  {entry} (base {base})");
    Ok(())
}

fn format_frame(frame: &Frame) -> String
{
    format!(
        "command={} len={} payload={}",
        frame.command_id,
        frame.payload.len(),
        String::from_utf8_lossy(&frame.payload)
    )
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_ping_arguments()
    {
        let cli = Cli::try_parse_from(["emmy", "ping", "emmy-test", "--command", "-3", "-m", "hello"]).unwrap();
        match cli.command {
            Commands::Ping {
                name,
                command,
                message,
                timeout_ms,
            } => {
                assert_eq!(name, "emmy-test");
                assert_eq!(command, -3);
                assert_eq!(message, "hello");
                assert_eq!(timeout_ms, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_arguments_accept_hex_base()
    {
        let cli = Cli::try_parse_from(["emmy", "--log-level", "debug", "descriptor", "--pid", "42", "--base", "0x7ff6_0000_0000"])
            .unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        match cli.command {
            Commands::Descriptor { pid, base } => {
                assert_eq!(pid, 42);
                assert_eq!(base, Address::new(0x7ff6_0000_0000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_listen_defaults_to_engine_pipe()
    {
        let cli = Cli::try_parse_from(["emmy", "listen"]).unwrap();
        assert!(matches!(cli.command, Commands::Listen { name } if name == DEFAULT_PIPE_NAME));
    }

    #[test]
    fn test_invalid_log_format_rejected()
    {
        assert!(Cli::try_parse_from(["emmy", "--log-format", "xml", "listen"]).is_err());
    }

    #[test]
    fn test_format_frame()
    {
        let frame = Frame::new(7, b"hello".to_vec());
        assert_eq!(format_frame(&frame), "command=7 len=5 payload=hello");
    }
}
