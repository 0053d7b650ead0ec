//! Spawning a local interpreter for `--launch`.

use std::net::TcpStream;
use std::process::{Child, Command};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};

/// Kills the spawned interpreter when the session ends.
pub struct Interpreter {
    child: Child,
    pub port: u16,
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Start the interpreter in SERVE mode on a randomized port and wait for
/// it to accept connections.
pub fn launch_interpreter() -> anyhow::Result<Interpreter> {
    let port = random_port();
    let child = Command::new("dyalog")
        .args(["+s", "-q"])
        .env("RIDE_INIT", format!("SERVE:*:{port}"))
        .spawn()
        .context("spawn interpreter (is `dyalog` on PATH?)")?;
    let mut interpreter = Interpreter { child, port };

    let probe = std::net::ToSocketAddrs::to_socket_addrs(&format!("localhost:{port}"))
        .ok()
        .and_then(|mut addrs| addrs.next());
    for _ in 0..50 {
        if let Some(probe) = probe {
            if TcpStream::connect_timeout(&probe, Duration::from_millis(100)).is_ok() {
                return Ok(interpreter);
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    let _ = interpreter.child.kill();
    bail!("interpreter did not start listening on port {port}");
}

fn random_port() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or(0);
    10_000 + (nanos % 50_000) as u16
}
