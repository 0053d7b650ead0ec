use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::RideError;
use crate::frame::{decode_one, encode};
use crate::message::{args, parse_payload, Incoming, Message};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A connected, handshaken protocol client.
///
/// The interpreter runs in SERVE mode and speaks first. [`Client::connect`]
/// completes the full handshake and drains messages until the interpreter
/// reports a ready prompt, so a returned client can execute immediately.
#[derive(Debug)]
pub struct Client {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    pub fn connect(addr: &str) -> Result<Self, RideError> {
        let mut last_err = None;
        let mut stream = None;
        for candidate in addr
            .to_socket_addrs()
            .map_err(|_| RideError::Unresolvable(addr.to_string()))?
        {
            match TcpStream::connect_timeout(&candidate, CONNECT_TIMEOUT) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(err) => last_err = Some(err),
            }
        }
        let stream = match stream {
            Some(stream) => stream,
            None => {
                return Err(match last_err {
                    Some(err) => RideError::Io(err),
                    None => RideError::Unresolvable(addr.to_string()),
                })
            }
        };
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        let mut client = Self {
            writer: stream,
            reader,
        };
        client.handshake()?;
        Ok(client)
    }

    /// SERVE-mode handshake: the interpreter announces its protocol, we
    /// confirm it, identify ourselves, and wait for the first ready prompt.
    fn handshake(&mut self) -> Result<(), RideError> {
        self.expect_line("SupportedProtocols=2")?;
        self.send_raw("SupportedProtocols=2")?;
        self.send_raw("UsingProtocol=2")?;
        self.expect_line("UsingProtocol=2")?;
        self.send("Identify", json!({"apiVersion": 1, "identity": 1}))?;
        self.send("Connect", json!({"remoteId": 2}))?;

        loop {
            if let Incoming::Command(msg) = self.recv()? {
                if msg.name == "SetPromptType" && args::int(&msg.args, "type").unwrap_or(0) > 0 {
                    return Ok(());
                }
            }
        }
    }

    fn expect_line(&mut self, expected: &'static str) -> Result<(), RideError> {
        match self.recv()? {
            Incoming::Line(line) if line == expected => Ok(()),
            Incoming::Line(line) => Err(RideError::Handshake {
                expected,
                got: line,
            }),
            Incoming::Command(msg) => Err(RideError::Handshake {
                expected,
                got: msg.to_payload(),
            }),
        }
    }

    pub fn send(&mut self, name: &str, args: Value) -> Result<(), RideError> {
        send_message(&mut self.writer, name, args)
    }

    pub fn send_raw(&mut self, payload: &str) -> Result<(), RideError> {
        send_payload(&mut self.writer, payload)
    }

    pub fn recv(&mut self) -> Result<Incoming, RideError> {
        recv_incoming(&mut self.reader)
    }

    /// Split into a write half for the event loop and a read half for the
    /// dedicated reader thread. Neither half takes a lock; the loop is the
    /// only sender and the reader thread the only receiver.
    pub fn split(self) -> (Conn, Reader) {
        (
            Conn {
                writer: self.writer,
            },
            Reader {
                reader: self.reader,
            },
        )
    }

    /// Execute one expression and collect its printed output, returning
    /// when the interpreter reports a ready prompt again.
    ///
    /// Used by the non-interactive paths (`-e`, `-stdin`, the socket
    /// service). Input echoes (type 14) are skipped. Character-input
    /// prompts of type 4 cannot be answered over this path; callers get
    /// whatever output preceded the prompt once the interpreter returns
    /// to a ready state.
    pub fn execute_capture(&mut self, expr: &str) -> Result<String, RideError> {
        self.send("Execute", json!({"text": format!("{expr}\n"), "trace": 0}))?;

        let mut out = String::new();
        loop {
            let Incoming::Command(msg) = self.recv()? else {
                continue;
            };
            match msg.name.as_str() {
                "AppendSessionOutput" => {
                    if args::int(&msg.args, "type") == Some(14) {
                        continue;
                    }
                    if let Some(result) = args::text(&msg.args, "result") {
                        out.push_str(result);
                    }
                }
                "SetPromptType" => {
                    if args::int(&msg.args, "type").unwrap_or(0) > 0 {
                        return Ok(out);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Write half of a split client.
pub struct Conn {
    writer: TcpStream,
}

impl Conn {
    pub fn send(&mut self, name: &str, args: Value) -> Result<(), RideError> {
        send_message(&mut self.writer, name, args)
    }

    /// Best-effort teardown before a reconnect.
    pub fn shutdown(&mut self) {
        let _ = self.writer.shutdown(std::net::Shutdown::Both);
    }
}

/// Read half of a split client; owned by the reader thread.
pub struct Reader {
    reader: BufReader<TcpStream>,
}

impl Reader {
    pub fn recv(&mut self) -> Result<Incoming, RideError> {
        recv_incoming(&mut self.reader)
    }
}

fn send_message(writer: &mut TcpStream, name: &str, args: Value) -> Result<(), RideError> {
    let payload = Message::new(name, args).to_payload();
    debug!(%name, "→ send");
    send_payload(writer, &payload)
}

fn send_payload(writer: &mut TcpStream, payload: &str) -> Result<(), RideError> {
    writer.write_all(&encode(payload))?;
    writer.flush()?;
    Ok(())
}

fn recv_incoming(reader: &mut BufReader<TcpStream>) -> Result<Incoming, RideError> {
    let payload = decode_one(reader)?;
    Ok(parse_payload(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    struct Peer {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
    }

    impl Peer {
        fn send_raw(&mut self, payload: &str) {
            self.writer.write_all(&encode(payload)).unwrap();
        }

        fn send(&mut self, name: &str, args: Value) {
            let payload = Message::new(name, args).to_payload();
            self.send_raw(&payload);
        }

        fn recv(&mut self) -> String {
            decode_one(&mut self.reader).unwrap()
        }
    }

    /// Spawn a scripted interpreter peer on an ephemeral port.
    fn serve<F>(script: F) -> (String, JoinHandle<()>)
    where
        F: FnOnce(Peer) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("read local addr").to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let reader = BufReader::new(stream.try_clone().expect("clone peer stream"));
            script(Peer {
                reader,
                writer: stream,
            });
        });
        (addr, handle)
    }

    fn serve_handshake(mut peer: Peer) -> Peer {
        peer.send_raw("SupportedProtocols=2");
        assert_eq!(peer.recv(), "SupportedProtocols=2");
        assert_eq!(peer.recv(), "UsingProtocol=2");
        peer.send_raw("UsingProtocol=2");
        assert_eq!(
            peer.recv(),
            r#"["Identify",{"apiVersion":1,"identity":1}]"#
        );
        assert_eq!(peer.recv(), r#"["Connect",{"remoteId":2}]"#);
        peer.send("SetPromptType", json!({"type": 1}));
        peer
    }

    #[test]
    fn connect_completes_the_handshake_in_order() {
        let (addr, handle) = serve(|peer| {
            serve_handshake(peer);
        });
        Client::connect(&addr).expect("handshake");
        handle.join().expect("peer script");
    }

    #[test]
    fn connect_waits_through_busy_prompts_for_ready() {
        let (addr, handle) = serve(|mut peer| {
            peer.send_raw("SupportedProtocols=2");
            peer.recv();
            peer.recv();
            peer.send_raw("UsingProtocol=2");
            peer.recv();
            peer.recv();
            peer.send("AppendSessionOutput", json!({"result": "banner\n"}));
            peer.send("SetPromptType", json!({"type": 0}));
            peer.send("SetPromptType", json!({"type": 1}));
        });
        Client::connect(&addr).expect("handshake");
        handle.join().expect("peer script");
    }

    #[test]
    fn connect_rejects_a_protocol_mismatch() {
        let (addr, handle) = serve(|mut peer| {
            peer.send_raw("SupportedProtocols=1");
        });
        let err = Client::connect(&addr).expect_err("mismatch");
        assert!(matches!(err, RideError::Handshake { .. }));
        handle.join().expect("peer script");
    }

    #[test]
    fn execute_capture_skips_the_input_echo() {
        let (addr, handle) = serve(|peer| {
            let mut peer = serve_handshake(peer);
            assert_eq!(
                peer.recv(),
                r#"["Execute",{"text":"1+1\n","trace":0}]"#
            );
            peer.send(
                "AppendSessionOutput",
                json!({"type": 14, "result": "1+1\n"}),
            );
            peer.send("AppendSessionOutput", json!({"result": "2\n"}));
            peer.send("SetPromptType", json!({"type": 1}));
        });
        let mut client = Client::connect(&addr).expect("connect");
        assert_eq!(client.execute_capture("1+1").expect("capture"), "2\n");
        handle.join().expect("peer script");
    }

    #[test]
    fn recv_surfaces_eof_as_a_disconnect() {
        let (addr, handle) = serve(|peer| {
            serve_handshake(peer);
        });
        let mut client = Client::connect(&addr).expect("connect");
        handle.join().expect("peer script");
        let err = client.recv().expect_err("peer closed");
        assert!(err.is_disconnect());
    }
}
