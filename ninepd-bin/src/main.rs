extern crate clap;
extern crate ninepd;
#[macro_use]
extern crate ninepd_constants;
extern crate tokio;

use clap::{App, Arg};
use ninepd::backend::hostfs::HostBackend;
use ninepd::server::{Server, MAX_MSIZE};
use ninepd_constants::logger::{LogLevel, Logger};
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;

struct StderrLogger {
    level: LogLevel,
}

impl StderrLogger {
    fn new(verbosity: u64) -> StderrLogger {
        let level = match verbosity {
            0 => LogLevel::Normal,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
        StderrLogger { level }
    }

    fn emit(&self, msg: &str) {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "ninepd: {}", msg);
    }
}

impl Logger for StderrLogger {
    fn level(&self) -> LogLevel {
        self.level
    }

    fn fatal(&self, msg: &str) {
        self.emit(msg);
    }

    fn error(&self, msg: &str) {
        self.emit(msg);
    }

    fn message(&self, msg: &str) {
        self.emit(msg);
    }

    fn info(&self, msg: &str) {
        self.emit(msg);
    }

    fn debug(&self, msg: &str) {
        self.emit(msg);
    }

    fn trace(&self, msg: &str) {
        self.emit(msg);
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Turn a listen address of the form "host:port" or ":port" into one that
/// can be bound for the requested network family.  An empty host means the
/// wildcard address of that family.
fn listen_address(ntype: &str, addr: &str) -> Result<String, String> {
    let idx = match addr.rfind(':') {
        Some(idx) => idx,
        None => return Err(format!("address {:?} has no port", addr)),
    };
    let (host, port) = (&addr[..idx], &addr[idx + 1..]);
    if port.is_empty() {
        return Err(format!("address {:?} has no port", addr));
    }
    if !host.is_empty() {
        return Ok(addr.to_string());
    }
    match ntype {
        "tcp" | "tcp4" => Ok(format!("0.0.0.0:{}", port)),
        "tcp6" => Ok(format!("[::]:{}", port)),
        _ => Err(format!("unsupported network type {:?}", ntype)),
    }
}

async fn serve(logger: Arc<StderrLogger>, addr: &str, root: PathBuf) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    message!(logger, "listening on {}", addr);
    loop {
        let (conn, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(logger, "accept: {}", e);
                continue;
            }
        };
        debug!(logger, "accepted connection from {}", peer);
        let logger = logger.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let backend = HostBackend::new(logger.clone(), &root, MAX_MSIZE);
            let (rd, wr) = conn.into_split();
            let mut server = Server::new(logger.clone(), backend, rd, wr);
            match server.run().await {
                Ok(()) => debug!(logger, "session from {} ended", peer),
                Err(e) => debug!(logger, "session from {} died: {}", peer, e),
            }
        });
    }
}

fn main() {
    let matches = App::new("ninepd")
        .about("Serve a directory tree over the 9P2000 protocol")
        .arg(
            Arg::with_name("ntype")
                .long("ntype")
                .takes_value(true)
                .default_value("tcp4")
                .help("Network family to listen on (tcp4 or tcp6)"),
        )
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .takes_value(true)
                .default_value(":5640")
                .help("Network address to listen on"),
        )
        .arg(
            Arg::with_name("root")
                .long("root")
                .takes_value(true)
                .default_value("/")
                .help("Root for all attaches"),
        )
        .arg(
            Arg::with_name("debug")
                .long("debug")
                .short("d")
                .multiple(true)
                .help("Increase trace verbosity"),
        )
        .get_matches();
    let logger = Arc::new(StderrLogger::new(matches.occurrences_of("debug")));
    let root = PathBuf::from(matches.value_of("root").unwrap());
    let addr = match listen_address(
        matches.value_of("ntype").unwrap(),
        matches.value_of("addr").unwrap(),
    ) {
        Ok(addr) => addr,
        Err(e) => {
            logger.fatal(&e);
            process::exit(2);
        }
    };
    let runtime = runtime();
    if let Err(e) = runtime.block_on(serve(logger.clone(), &addr, root)) {
        logger.fatal(&format!("{}", e));
        process::exit(1);
    }
}
