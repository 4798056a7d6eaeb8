//! The per-connection protocol engine.
//!
//! A `Server` owns one byte stream and services it serially: read a frame,
//! dispatch it to the backend, write the reply, repeat.  Replies therefore
//! leave in request order, and by the time a Tflush is read the request it
//! names has already been answered.

use crate::backend::{Backend, Metadata};
use crate::proto::{
    Deserializer, Dir, FileMode, MessageType, OpenMode, Rattach, Rclunk, Rcreate, Rflush, Ropen,
    Rread, Rremove, Rstat, Rversion, Rwalk, Rwrite, Rwstat, Serializer, Tag, Tattach, Tauth,
    Tclunk, Tcreate, Tflush, Topen, Tread, Tremove, Tstat, Tversion, Twalk, Twrite, Twstat,
    HEADER_SIZE,
};
use ninepd_constants::logger::Logger;
use ninepd_constants::Error;
use num_traits::FromPrimitive;
use std::convert::TryInto;
use std::fmt;
use std::io;
use std::marker::Unpin;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

type Result<T> = std::result::Result<T, Error>;

/// The largest message size this server will negotiate.
///
/// This bounds what a client can make us allocate, before as well as after
/// version negotiation.
pub const MAX_MSIZE: u32 = 1024 * 1024;

/// A session-fatal failure.  Protocol-level errors become Rerror replies
/// instead; these are the ones after which the byte stream cannot be
/// resynchronized.
#[derive(Debug)]
pub enum ServerError {
    InvalidSize,
    IOError(io::Error),
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> ServerError {
        ServerError::IOError(e)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize => write!(f, "invalid frame size"),
            Self::IOError(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

struct SessionState {
    versioned: bool,
    msize: usize,
}

pub struct Server<
    T: Backend + Send + Sync + 'static,
    R: AsyncReadExt + Unpin + Send + Sync,
    W: AsyncWriteExt + Unpin + Send + Sync,
> {
    backend: Arc<T>,
    rd: R,
    wr: W,
    state: Arc<RwLock<SessionState>>,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl<
        T: Backend + Send + Sync + 'static,
        R: AsyncReadExt + Unpin + Send + Sync,
        W: AsyncWriteExt + Unpin + Send + Sync,
    > Server<T, R, W>
{
    pub fn new(
        logger: Arc<dyn Logger + Send + Sync>,
        backend: T,
        rd: R,
        wr: W,
    ) -> Server<T, R, W> {
        Self {
            logger,
            backend: Arc::new(backend),
            rd,
            wr,
            state: Arc::new(RwLock::new(SessionState {
                versioned: false,
                msize: MAX_MSIZE as usize + HEADER_SIZE,
            })),
        }
    }

    /// Decode one request, invoke the backend, and encode the reply body.
    /// An Err return becomes an Rerror on the request's tag.
    fn process_message(
        logger: Arc<dyn Logger + Send + Sync>,
        backend: Arc<T>,
        state: Arc<RwLock<SessionState>>,
        msg: MessageType,
        tag: Tag,
        buf: &[u8],
    ) -> Result<Vec<u8>> {
        if msg != MessageType::Tversion && !state.read().unwrap().versioned {
            return Err(Error::NotVersioned(format!("{:?}", msg)));
        }
        let meta = Metadata { tag };
        let d = Deserializer::new(buf);
        let mut s = Serializer::new();
        trace!(logger, "9P: message {:?} {}", msg, tag);
        match msg {
            MessageType::Tversion => {
                let t = Tversion::decode(&d)?;
                let (msize, version) = backend.version(&meta, t.msize, &t.version)?;
                {
                    let mut g = state.write().unwrap();
                    g.versioned = true;
                    g.msize = msize as usize;
                }
                // Version negotiation aborts everything the session had.
                backend.clunk_all(&meta)?;
                Rversion { msize, version }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tauth => {
                let t = Tauth::decode(&d)?;
                trace!(logger, "9P: auth requested for afid {}", t.afid);
                Err(Error::AuthUnsupported)
            }
            MessageType::Tattach => {
                let t = Tattach::decode(&d)?;
                let qid = backend.attach(&meta, t.fid, t.afid, &t.uname, &t.aname)?;
                Rattach { qid }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tflush => {
                let t = Tflush::decode(&d)?;
                backend.flush(&meta, t.oldtag)?;
                Rflush.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Twalk => {
                let t = Twalk::decode(&d)?;
                let names: Vec<&[u8]> = t.wnames.iter().map(|n| n.as_slice()).collect();
                let wqids = backend.walk(&meta, t.fid, t.newfid, &names)?;
                Rwalk { wqids }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Topen => {
                let t = Topen::decode(&d)?;
                // Bits we do not know are ignored, not errors.
                let mode = OpenMode::from_bits_truncate(t.mode);
                let (qid, iounit) = backend.open(&meta, t.fid, mode)?;
                Ropen { qid, iounit }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tcreate => {
                let t = Tcreate::decode(&d)?;
                let perm = FileMode::from_bits_truncate(t.perm);
                let mode = OpenMode::from_bits_truncate(t.mode);
                let (qid, iounit) = backend.create(&meta, t.fid, &t.name, perm, mode)?;
                Rcreate { qid, iounit }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tread => {
                let t = Tread::decode(&d)?;
                // Never promise more than fits in a reply frame.
                let max = state.read().unwrap().msize - HEADER_SIZE - 4;
                let mut data = vec![0u8; std::cmp::min(t.count as usize, max)];
                let count = backend.read(&meta, t.fid, t.offset, &mut data)?;
                data.truncate(count as usize);
                Rread { data }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Twrite => {
                let t = Twrite::decode(&d)?;
                let count = backend.write(&meta, t.fid, t.offset, &t.data)?;
                Rwrite { count }.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tclunk => {
                let t = Tclunk::decode(&d)?;
                backend.clunk(&meta, t.fid)?;
                Rclunk.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tremove => {
                let t = Tremove::decode(&d)?;
                backend.remove(&meta, t.fid)?;
                Rremove.encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Tstat => {
                let t = Tstat::decode(&d)?;
                let dir = backend.stat(&meta, t.fid)?;
                Rstat {
                    stat: dir.to_bytes()?,
                }
                .encode(&mut s)?;
                Ok(s.into_inner())
            }
            MessageType::Twstat => {
                let t = Twstat::decode(&d)?;
                let dir = Dir::from_bytes(&t.stat)?;
                backend.wstat(&meta, t.fid, &dir)?;
                Rwstat.encode(&mut s)?;
                Ok(s.into_inner())
            }
            // R-messages are not requests.
            _ => Err(Error::UnsupportedMessage(msg as u8)),
        }
    }

    async fn send_message(
        &mut self,
        msg: u8,
        tag: Tag,
        body: &[u8],
    ) -> std::result::Result<(), ServerError> {
        let len = (HEADER_SIZE + body.len()) as u32;
        let len = len.to_le_bytes();
        let tag = tag.0.to_le_bytes();
        let prefix = [len[0], len[1], len[2], len[3], msg, tag[0], tag[1]];
        self.wr.write_all(&prefix).await?;
        self.wr.write_all(body).await?;
        Ok(())
    }

    async fn send_error(&mut self, tag: Tag, err: Error) -> std::result::Result<(), ServerError> {
        let mut s = Serializer::new();
        let ename = format!("{}", err);
        let _ = s.write_string(ename.as_bytes());
        trace!(self.logger, "9P: sending error {} {}", tag, ename);
        self.send_message(MessageType::Rerror as u8, tag, &s.into_inner())
            .await
    }

    async fn parse_message(
        &mut self,
        buf: &[u8; HEADER_SIZE],
    ) -> std::result::Result<(), ServerError> {
        let size = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        let msg = MessageType::from_u8(buf[4]);
        let tag = Tag(u16::from_le_bytes(buf[5..7].try_into().unwrap()));
        if size < HEADER_SIZE || size > self.state.read().unwrap().msize {
            return Err(ServerError::InvalidSize);
        }
        let mut v = vec![0u8; size - HEADER_SIZE];
        self.rd.read_exact(&mut v).await?;
        let msg = match msg {
            Some(msg) => {
                trace!(self.logger, "9P: message {:?} size {} {}", msg, size, tag);
                msg
            }
            None => {
                trace!(
                    self.logger,
                    "9P: unknown message {:#04x} size {} {}",
                    buf[4],
                    size,
                    tag
                );
                return self.send_error(tag, Error::UnsupportedMessage(buf[4])).await;
            }
        };
        let logger = self.logger.clone();
        let backend = self.backend.clone();
        let state = self.state.clone();
        // The backend is synchronous; keep its filesystem work off the
        // reactor threads.
        match tokio::task::spawn_blocking(move || {
            Self::process_message(logger, backend, state, msg, tag, &v)
        })
        .await
        .unwrap()
        {
            Ok(body) => {
                trace!(self.logger, "9P: message {:?} ok, sending reply", msg);
                self.send_message(msg as u8 + 1, tag, &body).await
            }
            Err(e) => self.send_error(tag, e).await,
        }
    }

    /// Service the connection until EOF or a fatal error.
    pub async fn run(&mut self) -> std::result::Result<(), ServerError> {
        trace!(self.logger, "9P: starting session");
        loop {
            let mut buf = [0u8; HEADER_SIZE];
            match self.rd.read(&mut buf).await {
                Ok(0) => return Ok(()),
                Ok(HEADER_SIZE) => self.parse_message(&buf).await?,
                Ok(n) => {
                    self.rd.read_exact(&mut buf[n..]).await?;
                    self.parse_message(&buf).await?;
                }
                Err(e) => {
                    trace!(self.logger, "9P: read error: {}", e);
                    return Err(ServerError::IOError(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Server, MAX_MSIZE};
    use crate::backend::hostfs::HostBackend;
    use crate::proto::{
        Deserializer, Dir, MessageType, Rattach, Rcreate, Rerror, Ropen, Rread, Rversion, Rwalk,
        Rwrite, Serializer, Tag, Tattach, Tcreate, Topen, Tread, Tversion, Twalk, Twrite, FID,
        NOFID, NOTAG,
    };
    use ninepd_constants::logger::{LogLevel, Logger};
    use std::convert::TryInto;
    use std::fs;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct TestLogger {}

    impl Logger for TestLogger {
        fn level(&self) -> LogLevel {
            LogLevel::Trace
        }
        fn fatal(&self, _msg: &str) {}
        fn error(&self, _msg: &str) {}
        fn message(&self, _msg: &str) {}
        fn info(&self, _msg: &str) {}
        fn debug(&self, _msg: &str) {}
        fn trace(&self, msg: &str) {
            eprintln!("{}", msg);
        }
    }

    fn start(root: &Path) -> DuplexStream {
        let (client, server_side) = tokio::io::duplex(1 << 20);
        let logger: Arc<dyn Logger + Send + Sync> = Arc::new(TestLogger {});
        let backend = HostBackend::new(logger.clone(), root, MAX_MSIZE);
        let (rd, wr) = tokio::io::split(server_side);
        let mut server = Server::new(logger, backend, rd, wr);
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        client
    }

    async fn send(stream: &mut DuplexStream, msg: MessageType, tag: Tag, body: &[u8]) {
        let len = (7 + body.len()) as u32;
        let mut frame = Vec::with_capacity(7 + body.len());
        frame.extend(&len.to_le_bytes());
        frame.push(msg as u8);
        frame.extend(&tag.0.to_le_bytes());
        frame.extend(body);
        stream.write_all(&frame).await.unwrap();
    }

    async fn recv(stream: &mut DuplexStream) -> (u8, Tag, Vec<u8>) {
        let mut hdr = [0u8; 7];
        stream.read_exact(&mut hdr).await.unwrap();
        let size = u32::from_le_bytes(hdr[0..4].try_into().unwrap()) as usize;
        let mut body = vec![0u8; size - 7];
        stream.read_exact(&mut body).await.unwrap();
        (
            hdr[4],
            Tag(u16::from_le_bytes(hdr[5..7].try_into().unwrap())),
            body,
        )
    }

    async fn negotiate(stream: &mut DuplexStream, msize: u32) -> Rversion {
        let mut s = Serializer::new();
        Tversion {
            msize,
            version: b"9P2000".to_vec(),
        }
        .encode(&mut s)
        .unwrap();
        send(stream, MessageType::Tversion, NOTAG, &s.into_inner()).await;
        let (ty, tag, body) = recv(stream).await;
        assert_eq!(ty, MessageType::Rversion as u8);
        assert_eq!(tag, NOTAG);
        Rversion::decode(&Deserializer::new(&body)).unwrap()
    }

    async fn attach_root(stream: &mut DuplexStream, tag: Tag, aname: &[u8]) -> Rattach {
        let mut s = Serializer::new();
        Tattach {
            fid: FID(0),
            afid: NOFID,
            uname: Vec::new(),
            aname: aname.to_vec(),
        }
        .encode(&mut s)
        .unwrap();
        send(stream, MessageType::Tattach, tag, &s.into_inner()).await;
        let (ty, rtag, body) = recv(stream).await;
        assert_eq!(ty, MessageType::Rattach as u8);
        assert_eq!(rtag, tag);
        Rattach::decode(&Deserializer::new(&body)).unwrap()
    }

    async fn walk(
        stream: &mut DuplexStream,
        tag: Tag,
        fid: FID,
        newfid: FID,
        names: &[&[u8]],
    ) -> Rwalk {
        let mut s = Serializer::new();
        Twalk {
            fid,
            newfid,
            wnames: names.iter().map(|n| n.to_vec()).collect(),
        }
        .encode(&mut s)
        .unwrap();
        send(stream, MessageType::Twalk, tag, &s.into_inner()).await;
        let (ty, rtag, body) = recv(stream).await;
        assert_eq!(ty, MessageType::Rwalk as u8);
        assert_eq!(rtag, tag);
        Rwalk::decode(&Deserializer::new(&body)).unwrap()
    }

    async fn open(stream: &mut DuplexStream, tag: Tag, fid: FID, mode: u8) -> Ropen {
        let mut s = Serializer::new();
        Topen { fid, mode }.encode(&mut s).unwrap();
        send(stream, MessageType::Topen, tag, &s.into_inner()).await;
        let (ty, rtag, body) = recv(stream).await;
        assert_eq!(ty, MessageType::Ropen as u8);
        assert_eq!(rtag, tag);
        Ropen::decode(&Deserializer::new(&body)).unwrap()
    }

    async fn read(stream: &mut DuplexStream, tag: Tag, fid: FID, offset: u64, count: u32) -> Rread {
        let mut s = Serializer::new();
        Tread { fid, offset, count }.encode(&mut s).unwrap();
        send(stream, MessageType::Tread, tag, &s.into_inner()).await;
        let (ty, rtag, body) = recv(stream).await;
        assert_eq!(ty, MessageType::Rread as u8);
        assert_eq!(rtag, tag);
        Rread::decode(&Deserializer::new(&body)).unwrap()
    }

    async fn expect_error(stream: &mut DuplexStream, needle: &str) {
        let (ty, _, body) = recv(stream).await;
        assert_eq!(ty, MessageType::Rerror as u8);
        let e = Rerror::decode(&Deserializer::new(&body)).unwrap();
        let ename = String::from_utf8_lossy(&e.ename).into_owned();
        assert!(
            ename.contains(needle),
            "error {:?} should contain {:?}",
            ename,
            needle
        );
    }

    #[tokio::test]
    async fn version_handshake() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        let r = negotiate(&mut c, 8000).await;
        assert_eq!(r.msize, 8000);
        assert_eq!(r.version, b"9P2000");

        let mut s = Serializer::new();
        Tversion {
            msize: 8000,
            version: b"9P1".to_vec(),
        }
        .encode(&mut s)
        .unwrap();
        send(&mut c, MessageType::Tversion, NOTAG, &s.into_inner()).await;
        expect_error(&mut c, "not supported").await;
    }

    #[tokio::test]
    async fn msize_is_clamped() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        let r = negotiate(&mut c, 64 * 1024 * 1024).await;
        assert_eq!(r.msize, MAX_MSIZE);
    }

    #[tokio::test]
    async fn nothing_before_version() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        let mut s = Serializer::new();
        Tattach {
            fid: FID(0),
            afid: NOFID,
            uname: Vec::new(),
            aname: b"/".to_vec(),
        }
        .encode(&mut s)
        .unwrap();
        send(&mut c, MessageType::Tattach, Tag(1), &s.into_inner()).await;
        expect_error(&mut c, "Tattach not allowed before Tversion").await;
        // The session survives and can still negotiate.
        let r = negotiate(&mut c, 8000).await;
        assert_eq!(r.version, b"9P2000");
    }

    #[tokio::test]
    async fn auth_is_refused() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        let mut s = Serializer::new();
        s.write_u32(1); // afid
        s.write_string(b"user").unwrap();
        s.write_string(b"/").unwrap();
        send(&mut c, MessageType::Tauth, Tag(1), &s.into_inner()).await;
        expect_error(&mut c, "authentication not supported").await;
    }

    #[tokio::test]
    async fn attach_walk_open_read() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("tmp")).unwrap();
        fs::write(root.path().join("tmp/ro"), b"hi").unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        let r = attach_root(&mut c, Tag(1), b"/").await;
        assert_ne!(r.qid.kind & 0x80, 0, "root attaches as a directory");
        let w = walk(&mut c, Tag(2), FID(0), FID(1), &[b"tmp", b"ro"]).await;
        assert_eq!(w.wqids.len(), 2);
        let o = open(&mut c, Tag(3), FID(1), 0).await;
        assert_eq!(o.iounit, 8192);
        let r = read(&mut c, Tag(4), FID(1), 0, 2).await;
        assert_eq!(r.data, b"hi");
        // Reading past the end yields zero bytes, not an error.
        let r = read(&mut c, Tag(5), FID(1), 2, 2).await;
        assert!(r.data.is_empty());
    }

    #[tokio::test]
    async fn clone_walk() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        attach_root(&mut c, Tag(1), b"/").await;
        let w = walk(&mut c, Tag(2), FID(0), FID(2), &[]).await;
        assert!(w.wqids.is_empty());
        // The clone is live: it can be walked onward like the original.
        let w = walk(&mut c, Tag(3), FID(2), FID(3), &[]).await;
        assert!(w.wqids.is_empty());
    }

    #[tokio::test]
    async fn create_write_readback() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        attach_root(&mut c, Tag(1), b"/").await;
        walk(&mut c, Tag(2), FID(0), FID(1), &[]).await;
        let mut s = Serializer::new();
        Tcreate {
            fid: FID(1),
            name: b"note".to_vec(),
            perm: 0o644,
            mode: 2, // ORDWR
        }
        .encode(&mut s)
        .unwrap();
        send(&mut c, MessageType::Tcreate, Tag(3), &s.into_inner()).await;
        let (ty, _, body) = recv(&mut c).await;
        assert_eq!(ty, MessageType::Rcreate as u8);
        let r = Rcreate::decode(&Deserializer::new(&body)).unwrap();
        assert_eq!(r.iounit, 8192);

        let mut s = Serializer::new();
        Twrite {
            fid: FID(1),
            offset: 0,
            data: b"jot".to_vec(),
        }
        .encode(&mut s)
        .unwrap();
        send(&mut c, MessageType::Twrite, Tag(4), &s.into_inner()).await;
        let (ty, _, body) = recv(&mut c).await;
        assert_eq!(ty, MessageType::Rwrite as u8);
        assert_eq!(
            Rwrite::decode(&Deserializer::new(&body)).unwrap().count,
            3
        );
        let r = read(&mut c, Tag(5), FID(1), 0, 16).await;
        assert_eq!(r.data, b"jot");
        assert_eq!(fs::read(root.path().join("note")).unwrap(), b"jot");
    }

    #[tokio::test]
    async fn create_ignores_undefined_perm_bits() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        attach_root(&mut c, Tag(1), b"/").await;
        walk(&mut c, Tag(2), FID(0), FID(1), &[]).await;
        // The sticky bit is not a 9P permission; it is dropped, not an
        // error, and the file is created with the low nine bits.
        let mut s = Serializer::new();
        Tcreate {
            fid: FID(1),
            name: b"sticky".to_vec(),
            perm: 0o1644,
            mode: 1, // OWRITE
        }
        .encode(&mut s)
        .unwrap();
        send(&mut c, MessageType::Tcreate, Tag(3), &s.into_inner()).await;
        let (ty, _, body) = recv(&mut c).await;
        assert_eq!(ty, MessageType::Rcreate as u8);
        Rcreate::decode(&Deserializer::new(&body)).unwrap();
        let md = fs::symlink_metadata(root.path().join("sticky")).unwrap();
        assert_eq!(md.mode() & 0o7777, 0o644);
    }

    #[tokio::test]
    async fn directory_read_paginates() {
        let root = TempDir::new().unwrap();
        let sub = root.path().join("sub");
        fs::create_dir(&sub).unwrap();
        for name in ["one", "two", "three"].iter() {
            fs::write(sub.join(name), b"x").unwrap();
        }
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        attach_root(&mut c, Tag(1), b"/").await;
        walk(&mut c, Tag(2), FID(0), FID(1), &[b"sub"]).await;
        open(&mut c, Tag(3), FID(1), 0).await;

        let mut records = Vec::new();
        let mut offset = 0u64;
        loop {
            let r = read(&mut c, Tag(4), FID(1), offset, 256).await;
            if r.data.is_empty() {
                break;
            }
            offset += r.data.len() as u64;
            records.push(Dir::from_bytes(&r.data).unwrap());
        }
        let names: Vec<Vec<u8>> = records.into_iter().map(|d| d.name).collect();
        let expected: Vec<Vec<u8>> = fs::read_dir(&sub)
            .unwrap()
            .map(|e| e.unwrap().file_name().as_bytes().to_vec())
            .collect();
        assert_eq!(names, expected);
        // One more read keeps returning zero bytes.
        let r = read(&mut c, Tag(5), FID(1), offset, 256).await;
        assert!(r.data.is_empty());
    }

    #[tokio::test]
    async fn root_escape_is_contained() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("etc")).unwrap();
        fs::write(root.path().join("etc/passwd"), b"inside").unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        // "../etc" resolves under the exported root, never to /etc.
        attach_root(&mut c, Tag(1), b"../etc").await;
        let w = walk(&mut c, Tag(2), FID(0), FID(1), &[b"passwd"]).await;
        assert_eq!(w.wqids.len(), 1);
        let o = open(&mut c, Tag(3), FID(1), 0).await;
        assert_eq!(o.qid.kind & 0x80, 0);
        let r = read(&mut c, Tag(4), FID(1), 0, 64).await;
        assert_eq!(r.data, b"inside");
    }

    #[tokio::test]
    async fn unknown_message_type() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        send(&mut c, MessageType::Tversion, NOTAG, &[]).await;
        // An empty Tversion body is a malformed frame, not a dead session.
        expect_error(&mut c, "malformed frame").await;
        negotiate(&mut c, 8000).await;
        // 0xfa is not a message type; the session answers and stays up.
        let frame = [7u32.to_le_bytes().to_vec(), vec![0xfa, 0x01, 0x00]].concat();
        c.write_all(&frame).await.unwrap();
        expect_error(&mut c, "not supported").await;
        attach_root(&mut c, Tag(2), b"/").await;
    }

    #[tokio::test]
    async fn undersized_frame_kills_session() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        let frame = [3u32.to_le_bytes().to_vec(), vec![100, 0x00, 0x00]].concat();
        c.write_all(&frame).await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(c.read(&mut buf).await.unwrap(), 0, "server hung up");
    }

    #[tokio::test]
    async fn oversized_frame_kills_session() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 512).await;
        let frame = [1024u32.to_le_bytes().to_vec(), vec![116, 0x00, 0x00]].concat();
        c.write_all(&frame).await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(c.read(&mut buf).await.unwrap(), 0, "server hung up");
    }

    #[tokio::test]
    async fn flush_answers_immediately() {
        let root = TempDir::new().unwrap();
        let mut c = start(root.path());
        negotiate(&mut c, 8000).await;
        let mut s = Serializer::new();
        s.write_u16(7); // oldtag
        send(&mut c, MessageType::Tflush, Tag(1), &s.into_inner()).await;
        let (ty, tag, _) = recv(&mut c).await;
        assert_eq!(ty, MessageType::Rflush as u8);
        assert_eq!(tag, Tag(1));
    }
}
