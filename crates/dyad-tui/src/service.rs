//! Local-socket expression service (`-sock`).
//!
//! Serves newline-delimited expressions over a Unix domain socket and
//! replies with the captured output. The interpreter is single-threaded,
//! so every request is serialized through one mutex.
//!
//! Character-input prompts of type 4 cannot be answered over this
//! service; such a request returns whatever output preceded the prompt.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use dyad_ride::Client;

pub fn serve(client: Client, sock_path: &Path) -> anyhow::Result<()> {
    // A stale socket file from a previous run would block the bind.
    let _ = std::fs::remove_file(sock_path);
    let listener = UnixListener::bind(sock_path)
        .with_context(|| format!("bind {}", sock_path.display()))?;
    println!("Listening on {}", sock_path.display());

    let client = Arc::new(Mutex::new(client));
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(_) => break,
        };
        let client = Arc::clone(&client);
        thread::spawn(move || {
            let reader = match stream.try_clone() {
                Ok(clone) => BufReader::new(clone),
                Err(_) => return,
            };
            let mut writer = stream;
            for line in reader.lines() {
                let Ok(line) = line else {
                    return;
                };
                let expr = line.trim();
                if expr.is_empty() {
                    continue;
                }
                let result = {
                    let mut client = match client.lock() {
                        Ok(client) => client,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    client
                        .execute_capture(expr)
                        .unwrap_or_else(|err| format!("Execute failed: {err}\n"))
                };
                if writer.write_all(result.as_bytes()).is_err() {
                    return;
                }
            }
        });
    }

    let _ = std::fs::remove_file(sock_path);
    Ok(())
}
