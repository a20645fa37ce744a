//! Tunnel client binary.
//!
//! Usage: l3tun-client [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -t, --test <FILE>    Negotiate a session and exit
//!   -h, --help           Print help information

use std::env;
use std::net::Ipv4Addr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinError;
use tracing::info;

use l3tun::tun::VirtualInterface;
use l3tun::tunnel::forward;
use l3tun::{ClientConfig, SessionNegotiator, RECV_BUFFER_SIZE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-t" | "--test" => {
            if args.len() < 3 {
                eprintln!("Error: --test requires a config file path");
                return Ok(());
            }
            test_connection(&args[2]).await?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_client(&args[2]).await?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"l3tun - SSL-VPN tunnel client

USAGE:
    l3tun-client [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Path to configuration file
    -t, --test <FILE>    Negotiate a session using the config file, then exit
    -h, --help           Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "server_host": "vpn.example.com",
        "server_port": 443,
        "session_token": "<96 hex chars from the authenticator>",
        "insecure_skip_verify": true,
        "tun_name": "l3tun0"
    }}

    insecure_skip_verify must be set: the gateway presents no
    verifiable certificate chain, and the client refuses to dial
    without the explicit acknowledgement.

EXAMPLES:
    Check negotiation without creating the virtual interface:
        l3tun-client --test client.json

    Bring the tunnel up (needs CAP_NET_ADMIN for the interface):
        l3tun-client --config client.json
"#
    );
}

async fn test_connection(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    info!(
        "Testing session negotiation against {}:{}",
        config.server_host, config.server_port
    );

    let negotiator = SessionNegotiator::new(&config);
    let channels = negotiator.negotiate().await?;

    info!(
        "Negotiation succeeded, assigned IP {}",
        Ipv4Addr::from(channels.assigned_ip)
    );

    channels.receive.close().await?;
    channels.send.close().await?;
    info!("Channels closed");

    Ok(())
}

async fn run_client(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let negotiator = SessionNegotiator::new(&config);
    let channels = negotiator.negotiate().await?;

    let interface = VirtualInterface::create(
        &config.tun_name,
        channels.assigned_ip,
        RECV_BUFFER_SIZE as u16,
    )
    .context("virtual interface setup")?;
    info!("tunnel up on {}", interface.name());

    let (tun_reader, tun_writer) = interface.split();

    let mut recv_task = tokio::spawn(forward::recv_loop(channels.receive, tun_writer));
    let mut send_task = tokio::spawn(forward::send_loop(tun_reader, channels.send));

    // Fatal by default: the first forwarder to stop ends the session.
    tokio::select! {
        result = &mut recv_task => {
            send_task.abort();
            task_outcome("receive forwarder", result)
        }
        result = &mut send_task => {
            recv_task.abort();
            task_outcome("send forwarder", result)
        }
        _ = signal::ctrl_c() => {
            info!("shutting down");
            recv_task.abort();
            send_task.abort();
            Ok(())
        }
    }
}

fn task_outcome(
    task: &str,
    result: Result<l3tun::Result<()>, JoinError>,
) -> anyhow::Result<()> {
    match result {
        Ok(Ok(())) => {
            info!("{} finished", task);
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("{} failed: {}", task, e)),
        Err(e) => Err(anyhow::anyhow!("{} panicked: {}", task, e)),
    }
}

fn load_config(path: &str) -> anyhow::Result<ClientConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let config = ClientConfig::from_json(&content)?;
    Ok(config)
}
