//! Control RPC daemon: the local CLI front-end talks to a running
//! repository process over a loopback TCP socket. Grounded on
//! `original_source/daemon/server.go`'s `Accept` + goroutine-per-connection
//! loop, translated to `std::net::TcpListener` + `std::thread::spawn`
//! since the rest of the core is synchronous (no async runtime
//! dependency anywhere in `brig-core`).

use serde::{Deserialize, Serialize};
use std::{
    io::{self, Read, Write},
    net::{TcpListener, TcpStream},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u32),
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// Per-command timeout (spec.md §6: "5 s per command by default").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A cap well above any realistic request, so a garbled length prefix
/// can't make the server allocate an unbounded buffer.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RpcCommand {
    Add { path: String },
    Cat { path: String },
    Commit { message: String },
    Tag { rev: String, label: String },
    Untag { label: String },
    Reset { path: String, rev: String, force: bool },
    History { path: String },
    Log,
    Diff {
        remote_peer: String,
        local_rev: String,
        remote_rev: String,
        fetch: bool,
    },
    Sync { remote_name: String, fetch: bool },
    Fetch { remote_name: String },
    Become { peer_id: String },
    Whoami,
    RemoteAdd { remote: crate::remote::Remote },
    RemoteRm { name: String },
    RemoteLs,
    RemoteSave,
    RemoteLocate { name: String },
    Ping,
    Quit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RpcResponse {
    Ok,
    Message(String),
    Error(String),
    UnknownCommand,
}

/// Handles a decoded command and produces a response. Implemented by
/// whatever owns the repository handle (the daemon's main loop); kept
/// as a trait so the framing in this module stays testable without a
/// full `CatalogStore`/`PeerChannel` wired up.
pub trait RpcHandler: Send + Sync {
    fn handle(&self, command: RpcCommand) -> RpcResponse;
}

fn read_frame(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(RpcError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload)?;
    Ok(payload)
}

fn write_frame(stream: &mut impl Write, payload: &[u8]) -> Result<()> {
    stream.write_all(&(payload.len() as u32).to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

fn handle_connection(mut stream: TcpStream, handler: Arc<dyn RpcHandler>) {
    let _ = stream.set_read_timeout(Some(DEFAULT_TIMEOUT));

    loop {
        let payload = match read_frame(&mut stream) {
            Ok(p) => p,
            Err(_) => return,
        };

        let response = match rmp_serde::from_slice::<RpcCommand>(&payload) {
            Ok(command) => {
                let is_quit = matches!(command, RpcCommand::Quit);
                let response = handler.handle(command);
                if is_quit {
                    let _ = rmp_serde::to_vec(&response)
                        .map_err(RpcError::from)
                        .and_then(|bytes| write_frame(&mut stream, &bytes));
                    return;
                }
                response
            }
            Err(_) => RpcResponse::UnknownCommand,
        };

        let Ok(bytes) = rmp_serde::to_vec(&response) else {
            return;
        };
        if write_frame(&mut stream, &bytes).is_err() {
            return;
        }
    }
}

/// Accepts connections on `listener` until it errors, spawning one OS
/// thread per connection. Blocks the calling thread; callers run this
/// on a dedicated thread of their own.
pub fn serve(listener: TcpListener, handler: Arc<dyn RpcHandler>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        let handler = handler.clone();
        std::thread::spawn(move || handle_connection(stream, handler));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::TcpStream;

    struct EchoHandler;
    impl RpcHandler for EchoHandler {
        fn handle(&self, command: RpcCommand) -> RpcResponse {
            match command {
                RpcCommand::Ping => RpcResponse::Message("pong".to_string()),
                RpcCommand::Whoami => RpcResponse::Message("local".to_string()),
                RpcCommand::Quit => RpcResponse::Ok,
                _ => RpcResponse::Error("unsupported in test".to_string()),
            }
        }
    }

    fn request(stream: &mut TcpStream, command: &RpcCommand) -> RpcResponse {
        let bytes = rmp_serde::to_vec(command).unwrap();
        write_frame(stream, &bytes).unwrap();
        let response = read_frame(stream).unwrap();
        rmp_serde::from_slice(&response).unwrap()
    }

    #[test]
    fn ping_pong_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || serve(listener, Arc::new(EchoHandler)));

        let mut stream = TcpStream::connect(addr).unwrap();
        let response = request(&mut stream, &RpcCommand::Ping);
        assert!(matches!(response, RpcResponse::Message(m) if m == "pong"));
    }

    #[test]
    fn garbage_bytes_yield_unknown_command() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || serve(listener, Arc::new(EchoHandler)));

        let mut stream = TcpStream::connect(addr).unwrap();
        write_frame(&mut stream, b"not a valid rmp-serde command").unwrap();
        let response = read_frame(&mut stream).unwrap();
        let response: RpcResponse = rmp_serde::from_slice(&response).unwrap();
        assert!(matches!(response, RpcResponse::UnknownCommand));
    }

    #[test]
    fn quit_closes_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || serve(listener, Arc::new(EchoHandler)));

        let mut stream = TcpStream::connect(addr).unwrap();
        let response = request(&mut stream, &RpcCommand::Quit);
        assert!(matches!(response, RpcResponse::Ok));

        let mut buf = [0u8; 1];
        let n = stream.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);
    }
}
