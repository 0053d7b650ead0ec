//! `dyad` — a terminal IDE for APL interpreters speaking the RIDE
//! protocol.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use dyad_ride::Client;
use dyad_tui::app::App;
use dyad_tui::config::Config;
use dyad_tui::docs::DocStore;
use dyad_tui::logbuf::ProtocolLog;
use dyad_tui::run;
#[cfg(unix)]
use dyad_tui::service;

mod launch;

#[derive(Parser)]
#[command(name = "dyad", version, about = "Terminal IDE for APL interpreters")]
struct Cli {
    /// Interpreter address (SERVE mode)
    #[arg(long, default_value = "localhost:4502")]
    addr: String,

    /// Append a timestamped protocol log to this file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Execute one expression, print the result and exit
    #[arg(short = 'e', value_name = "EXPR")]
    expr: Option<String>,

    /// Execute expressions from standard input
    #[arg(long)]
    stdin: bool,

    /// Serve expressions over a Unix socket at this path
    #[arg(long, value_name = "PATH")]
    sock: Option<PathBuf>,

    /// Run a link-creation command first: `path` or `ns:path`
    #[arg(long, value_name = "SPEC")]
    link: Option<String>,

    /// Launch the interpreter on a randomized port
    #[arg(short = 'l', long)]
    launch: bool,
}

fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    if cli.expr.is_some() && cli.stdin {
        anyhow::bail!("-e and --stdin are mutually exclusive");
    }

    // Keep the spawned interpreter alive for the whole session; dropping
    // the guard kills it.
    let mut _interpreter = None;
    if cli.launch {
        let spawned = launch::launch_interpreter()?;
        cli.addr = format!("localhost:{}", spawned.port);
        _interpreter = Some(spawned);
    }

    if let Some(expr) = cli.expr.as_deref() {
        let mut client = connect(&cli.addr)?;
        run_link(&mut client, cli.link.as_deref())?;
        print!("{}", client.execute_capture(expr)?);
        return Ok(());
    }

    if cli.stdin {
        let mut client = connect(&cli.addr)?;
        run_link(&mut client, cli.link.as_deref())?;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line.context("read stdin")?;
            if line.trim().is_empty() {
                continue;
            }
            print!("{}", client.execute_capture(line.trim())?);
        }
        return Ok(());
    }

    if let Some(sock_path) = cli.sock.as_deref() {
        #[cfg(unix)]
        {
            let mut client = connect(&cli.addr)?;
            run_link(&mut client, cli.link.as_deref())?;
            return service::serve(client, sock_path);
        }
        #[cfg(not(unix))]
        {
            let _ = sock_path;
            anyhow::bail!("--sock is only supported on Unix platforms");
        }
    }

    // Interactive session.
    let proto_log = match cli.log.as_deref() {
        Some(path) => {
            ProtocolLog::open(path).with_context(|| format!("open {}", path.display()))?
        }
        None => ProtocolLog::default(),
    };

    println!("Connecting to {}...", cli.addr);
    let mut client = connect(&cli.addr)?;
    run_link(&mut client, cli.link.as_deref())?;

    let cfg = Config::load();
    let docs = DocStore::open_default();
    let mut app = App::new(&cfg, &cli.addr, proto_log, docs);
    run::run(&mut app, client)
}

fn connect(addr: &str) -> anyhow::Result<Client> {
    Client::connect(addr).with_context(|| format!("connect to {addr}"))
}

/// `--link ns:path` or `--link path` becomes a `]link.create` command.
fn run_link(client: &mut Client, spec: Option<&str>) -> anyhow::Result<()> {
    let Some(spec) = spec else {
        return Ok(());
    };
    let cmd = match spec.split_once(':') {
        Some((ns, path)) => format!("]link.create {ns} {path}"),
        None => format!("]link.create {spec}"),
    };
    let output = client.execute_capture(&cmd)?;
    if !output.trim().is_empty() {
        println!("{}", output.trim_end());
    }
    Ok(())
}
