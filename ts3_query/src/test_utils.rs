//! Scripted ClientQuery endpoint for tests.
//!
//! Binds an ephemeral loopback port, greets every connection with a banner
//! and answers each command line through a caller supplied responder.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::session::{QueryConfig, RetryPolicy};
use crate::transport::Timeouts;

/// Banner sent by a real TeamSpeak 3 client
pub const CLIENT_BANNER: &[&str] = &[
    "TS3 Client",
    "Welcome to the TeamSpeak 3 ClientQuery interface, type \"help\" for a list of commands and \"help <command>\" for information on a specific command.",
    "Use the \"auth\" command to authenticate yourself. Your API Key can be found in the ClientQuery plugin settings.",
    "selected schandlerid=1",
];

/// What the mock sends back for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Lines(Vec<String>),
    /// Close the socket without answering
    Hangup,
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Lines(vec!["error id=0 msg=ok".to_string()])
    }

    /// Body line followed by an ok status
    pub fn data(body: &str) -> Self {
        Reply::Lines(vec![body.to_string(), "error id=0 msg=ok".to_string()])
    }

    pub fn error(id: u32, escaped_message: &str) -> Self {
        Reply::Lines(vec![format!("error id={} msg={}", id, escaped_message)])
    }
}

type Responder = Box<dyn FnMut(&str) -> Reply + Send>;

pub struct MockClientQuery {
    address: String,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
}

impl MockClientQuery {
    /// Start with the regular client banner
    pub fn start<F>(responder: F) -> std::io::Result<Self>
    where
        F: FnMut(&str) -> Reply + Send + 'static,
    {
        Self::start_with_banner(CLIENT_BANNER, responder)
    }

    pub fn start_with_banner<F>(banner: &[&str], responder: F) -> std::io::Result<Self>
    where
        F: FnMut(&str) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?.to_string();

        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let banner: Vec<String> = banner.iter().map(|line| line.to_string()).collect();
        let mut responder: Responder = Box::new(responder);

        {
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                // One client at a time, like the real plugin
                for stream in listener.incoming() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let _ = serve_client(stream, &banner, &commands, &mut responder);
                }
            });
        }

        Ok(Self {
            address,
            commands,
            connections,
            running,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Query config pointed at this mock with fast timeouts and no retry delay
    pub fn config(&self) -> QueryConfig {
        QueryConfig {
            address: self.address.clone(),
            timeouts: Timeouts {
                connect: Duration::from_millis(500),
                read: Duration::from_millis(1000),
                write: Duration::from_millis(1000),
            },
            retry: RetryPolicy {
                attempts: 10,
                delay: Duration::ZERO,
            },
            ..QueryConfig::default()
        }
    }

    /// Every command line received so far, across all connections
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockClientQuery {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Wake the accept loop so it notices the flag
        let _ = TcpStream::connect(&self.address);
    }
}

fn serve_client(
    stream: TcpStream,
    banner: &[String],
    commands: &Mutex<Vec<String>>,
    responder: &mut Responder,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    for line in banner {
        write!(writer, "{}\n\r", line)?;
    }
    writer.flush()?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim().to_string();
        if command.is_empty() {
            continue;
        }
        if let Ok(mut log) = commands.lock() {
            log.push(command.clone());
        }

        match responder(&command) {
            Reply::Lines(lines) => {
                for reply in lines {
                    write!(writer, "{}\n\r", reply)?;
                }
                writer.flush()?;
            }
            Reply::Hangup => return Ok(()),
        }
    }
}
