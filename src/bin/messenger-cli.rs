use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use udp_messenger::client::{
    sync_send_request, terminate_node, DEFAULT_CLIENT_TIMEOUT, DEFAULT_SERVICE_PORT,
};
use udp_messenger::http::status;
use udp_messenger::{Endpoint, Message, Method};

#[derive(Parser)]
#[command(name = "messenger-cli")]
#[command(about = "Send requests to a UDP messenger node", long_about = None)]
struct Cli {
    /// Address of the target node.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    #[arg(short, long, default_value_t = DEFAULT_SERVICE_PORT)]
    port: u16,

    /// Tag of the target node.
    #[arg(short, long, default_value = "node")]
    tag: String,

    /// Local address replies are received on.
    #[arg(long, default_value = "127.0.0.1")]
    from_ip: String,

    /// Name this client presents (sent as `temp_<name>`).
    #[arg(long, default_value = "cli")]
    name: String,

    /// Reply timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CLIENT_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an arbitrary request
    Request {
        #[arg(short, long, default_value = "GET")]
        method: String,
        path: String,
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// Register a node with the target's directory
    Advertise {
        /// `ip:port` of the node being advertised.
        endpoint: String,
        tag: String,
    },
    /// List the nodes the target knows
    Nodes,
    /// Stop the target node
    Terminate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let host = Endpoint::new(cli.from_ip.as_str(), 0, cli.name.as_str());
    let dest = Endpoint::new(cli.ip.as_str(), cli.port, cli.tag.as_str());
    let timeout = Duration::from_millis(cli.timeout_ms);

    let reply = match cli.command {
        Commands::Request { method, path, body } => {
            let method: Method = method.parse()?;
            let request = Message::request(method, path).with_body(body);
            sync_send_request(request, &host, &dest, timeout).await?
        }
        Commands::Advertise { endpoint, tag } => {
            let entry = Endpoint::parse_url(&endpoint)?.with_tag(tag).entry();
            let request =
                Message::request(Method::Put, "/advertise").with_body(serde_json::to_vec(&entry)?);
            sync_send_request(request, &host, &dest, timeout).await?
        }
        Commands::Nodes => {
            let request = Message::request(Method::Get, "/nodes");
            sync_send_request(request, &host, &dest, timeout).await?
        }
        Commands::Terminate => terminate_node(&dest, timeout).await?,
    };

    print_reply(&reply)
}

fn print_reply(reply: &Message) -> Result<(), Box<dyn std::error::Error>> {
    let code = reply.status().unwrap_or_default();
    let reason = status::reason(code).unwrap_or("UNKNOWN");
    if code == status::REQUEST_TIMEOUT {
        eprintln!("Error: no reply from node ({} {})", code, reason);
        return Ok(());
    }

    println!("{} {}", code, reason);
    if reply.body.is_empty() {
        return Ok(());
    }
    match serde_json::from_slice::<Value>(&reply.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", reply.body_text()),
    }
    Ok(())
}
