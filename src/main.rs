use mudlink::config::{ClientConfig, ConfigError, DEFAULT_CONFIG_PATH, OutputMode};
use mudlink::errors::{ClientError, ClientResult};
use mudlink::events::SessionStatus;
use mudlink::session::{Session, SessionOptions};
use mudlink::sink::{EventSink, JsonLinesSink, TerminalSink};
use mudlink::vendor::VendorDecoder;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use telnet_negotiation::TelnetStream;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const READ_BUFFER_SIZE: usize = 4096;
/// Quiet time after which held text is shown anyway
const IDLE_FLUSH: Duration = Duration::from_millis(150);

/// Everything the session thread reacts to
enum Inbound {
    Server(Vec<u8>),
    ServerClosed,
    ServerFailed(io::Error),
    /// A line typed by the user
    Line(String),
}

struct Args {
    config_path: String,
    replay: Option<String>,
    target: Option<String>,
}

fn usage_and_exit() -> ! {
    eprintln!("usage: mudlink [--config PATH] [--replay FILE] [HOST[:PORT]]");
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut args = Args {
        config_path: DEFAULT_CONFIG_PATH.to_string(),
        replay: None,
        target: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config_path = it.next().unwrap_or_else(|| usage_and_exit()),
            "--replay" => args.replay = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            "-h" | "--help" => usage_and_exit(),
            _ if arg.starts_with('-') || args.target.is_some() => usage_and_exit(),
            _ => args.target = Some(arg),
        }
    }
    args
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Override host and port from a `HOST[:PORT]` argument
fn apply_target(config: &mut ClientConfig, target: &str) -> Result<(), ConfigError> {
    match target.rsplit_once(':') {
        Some((host, port)) => {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("port".to_string(), port.to_string()))?;
            config.server.host = host.to_string();
        }
        None => config.server.host = target.to_string(),
    }
    Ok(())
}

fn main() -> ClientResult<()> {
    let args = parse_args();

    let mut config = ClientConfig::load_from_file(&args.config_path)?;
    if let Some(target) = &args.target {
        apply_target(&mut config, target)?;
    }
    init_tracing(&config.logging.level);
    debug!(path = %args.config_path, "configuration loaded");

    let mut sink: Box<dyn EventSink> = match config.display.output {
        OutputMode::Terminal => Box::new(TerminalSink::new(io::stdout().lock())),
        OutputMode::Json => Box::new(JsonLinesSink::new(io::stdout().lock())),
    };
    let mut session = Session::new(SessionOptions::from(&config));

    match &args.replay {
        Some(path) => replay(path, &mut session, sink.as_mut()),
        None => run_connection(&config, &mut session, sink.as_mut()),
    }
}

/// Decode a captured byte stream as if it came from a server
fn replay(path: &str, session: &mut Session, sink: &mut dyn EventSink) -> ClientResult<()> {
    let bytes = fs::read(path)?;
    info!(path, bytes = bytes.len(), "replaying capture");

    for chunk in bytes.chunks(READ_BUFFER_SIZE) {
        let reply = session.process(chunk, sink);
        if !reply.is_empty() {
            debug!(bytes = reply.len(), "negotiation reply not sent during replay");
        }
    }
    session.finish(sink);
    session.status(SessionStatus::Closed, sink);
    Ok(())
}

fn run_connection(
    config: &ClientConfig,
    session: &mut Session,
    sink: &mut dyn EventSink,
) -> ClientResult<()> {
    let address = config.address();
    let peer = address.to_socket_addrs()?.next().ok_or_else(|| {
        ClientError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {address}"),
        ))
    })?;

    let stream = match TcpStream::connect_timeout(&peer, config.server.connect_timeout) {
        Ok(stream) => stream,
        Err(e) => {
            error!(%peer, error = %e, "connection failed");
            session.status(SessionStatus::Error { message: e.to_string() }, sink);
            return Err(e.into());
        }
    };
    info!(%peer, "connected");
    session.status(SessionStatus::Connected { peer: peer.to_string() }, sink);

    let (tx, rx) = mpsc::channel();
    spawn_server_reader(stream.try_clone()?, tx.clone());
    spawn_input_reader(tx);

    // The only writer on this connection: replies, user input and vendor
    // requests all go out from this thread, in the order they were produced
    let mut writer = TelnetStream::new(stream);
    if config.vendor.request_client_mode {
        writer.send_raw(VendorDecoder::client_mode_request())?;
    }

    let mut replies_sent = 0;
    let result = loop {
        let message = match rx.recv_timeout(IDLE_FLUSH) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => {
                session.flush_pending(sink);
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        };
        match handle_inbound(message, session, &mut writer, sink) {
            Ok(Some(sent)) => replies_sent += sent,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    session.finish(sink);
    debug!(reply_bytes = replies_sent, "negotiation replies sent");

    match result {
        Ok(()) | Err(ClientError::Disconnected) => {
            info!(%peer, "connection closed");
            session.status(SessionStatus::Closed, sink);
            Ok(())
        }
        Err(e) => {
            error!(%peer, error = %e, "connection lost");
            session.status(SessionStatus::Error { message: e.to_string() }, sink);
            Err(e)
        }
    }
}

/// Act on one message on the session thread. Returns the reply bytes
/// written, or None once the server has closed the connection.
fn handle_inbound<S: Read + Write>(
    message: Inbound,
    session: &mut Session,
    writer: &mut TelnetStream<S>,
    sink: &mut dyn EventSink,
) -> ClientResult<Option<usize>> {
    match message {
        Inbound::Server(chunk) => {
            let reply = session.process(&chunk, sink);
            if !reply.is_empty() {
                writer.send_raw(reply.as_bytes())?;
            }
            Ok(Some(reply.len()))
        }
        Inbound::Line(line) => {
            send_line(writer, &line)?;
            Ok(Some(0))
        }
        Inbound::ServerClosed => Ok(None),
        Inbound::ServerFailed(e) => Err(e.into()),
    }
}

/// Forward raw server chunks to the session thread
fn spawn_server_reader(mut stream: TcpStream, tx: Sender<Inbound>) {
    thread::spawn(move || {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            let message = match stream.read(&mut buffer) {
                Ok(0) => Inbound::ServerClosed,
                Ok(n) => Inbound::Server(buffer[..n].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Inbound::ServerFailed(e),
            };
            let last = !matches!(message, Inbound::Server(_));
            if tx.send(message).is_err() || last {
                break;
            }
        }
    });
}

/// Forward each stdin line to the session thread
fn spawn_input_reader(tx: Sender<Inbound>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if tx.send(Inbound::Line(line)).is_err() {
                debug!("session ended, stopped forwarding input");
                break;
            }
        }
    });
}

/// Send one line, CRLF-terminated. IAC bytes are escaped by the writer.
fn send_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\r\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mudlink::events::SessionEvent;

    /// Socket stand-in that records everything written
    #[derive(Default)]
    struct Wire {
        sent: Vec<u8>,
    }

    impl Read for Wire {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for Wire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_replies_and_input_share_one_writer_in_order() {
        let mut session = Session::default();
        let mut writer = TelnetStream::new(Wire::default());
        let mut events: Vec<SessionEvent> = Vec::new();

        let messages = vec![
            Inbound::Server(vec![255, 253, 24]),
            Inbound::Line("look".to_string()),
            Inbound::Server(vec![255, 251, 3, b'>']),
        ];
        let mut sent = 0;
        for message in messages {
            sent += handle_inbound(message, &mut session, &mut writer, &mut events)
                .unwrap()
                .unwrap();
        }

        let mut expected = vec![255, 251, 24];
        expected.extend_from_slice(b"look\r\n");
        expected.extend_from_slice(&[255, 253, 3]);
        assert_eq!(sent, 6);
        assert_eq!(writer.into_inner().sent, expected);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_server_close_and_failure() {
        let mut session = Session::default();
        let mut writer = TelnetStream::new(Wire::default());
        let mut events: Vec<SessionEvent> = Vec::new();

        let closed = handle_inbound(Inbound::ServerClosed, &mut session, &mut writer, &mut events);
        assert!(matches!(closed, Ok(None)));

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        let failed = handle_inbound(
            Inbound::ServerFailed(reset),
            &mut session,
            &mut writer,
            &mut events,
        );
        assert!(matches!(failed, Err(ClientError::Disconnected)));

        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        let failed = handle_inbound(
            Inbound::ServerFailed(other),
            &mut session,
            &mut writer,
            &mut events,
        );
        assert!(matches!(failed, Err(ClientError::Io(_))));
    }

    #[test]
    fn test_apply_target() {
        let mut config = ClientConfig::default();
        apply_target(&mut config, "game.example:4000").unwrap();
        assert_eq!(config.address(), "game.example:4000");

        assert!(apply_target(&mut config, "game.example:port").is_err());
    }
}
