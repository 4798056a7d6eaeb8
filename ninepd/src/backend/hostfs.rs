//! The host-filesystem backend.
//!
//! FIDs map to pathnames under a configured root; operations translate to
//! the corresponding system calls.  Every path handed to the OS is formed by
//! lexically cleaning client-supplied names against "/" before joining, so a
//! client cannot escape the exported root no matter how many `..` or leading
//! separators it sends.

use super::{Backend, Metadata};
use crate::proto::{Dir, FileMode, IsUnset, OpenMode, QidType, Tag, FID, NOFID, QID};
use flurry::HashMap;
use ninepd_constants::logger::Logger;
use ninepd_constants::Error;
use std::cmp;
use std::ffi::{CString, OsStr};
use std::fs::{self, File};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileExt, MetadataExt};
use std::os::unix::io::FromRawFd;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

type Result<T> = std::result::Result<T, Error>;

/// iounit advertised on open and create.
pub const DEFAULT_IOUNIT: u32 = 8192;

fn with_error<F: FnOnce() -> i32>(f: F) -> Result<i32> {
    let res = f();
    if res < 0 {
        Err(io::Error::last_os_error().into())
    } else {
        Ok(res)
    }
}

fn einval() -> Error {
    io::Error::from_raw_os_error(libc::EINVAL).into()
}

fn cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| einval())
}

/// Clean `name` as if it were rooted at "/": collapse `.` and `..` and
/// duplicate separators, then return what remains as a relative path.  The
/// result cannot begin with `..`, so joining it under a base path can never
/// ascend past that base.
fn clean_rooted(name: &[u8]) -> PathBuf {
    let mut parts: Vec<&OsStr> = Vec::new();
    for comp in Path::new(OsStr::from_bytes(name)).components() {
        match comp {
            Component::Normal(c) => parts.push(c),
            Component::ParentDir => {
                parts.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    parts.iter().collect()
}

/// Join a cleaned `name` under `base`.
fn join_under(base: &Path, name: &[u8]) -> PathBuf {
    let rel = clean_rooted(name);
    if rel.as_os_str().is_empty() {
        base.to_owned()
    } else {
        base.join(rel)
    }
}

/// Whether `path` is `root` or lies beneath it, byte-wise.
fn is_within(path: &Path, root: &Path) -> bool {
    let path = path.as_os_str().as_bytes();
    let root = root.as_os_str().as_bytes();
    if root == b"/" {
        return path.starts_with(b"/");
    }
    match path.len().cmp(&root.len()) {
        cmp::Ordering::Less => false,
        cmp::Ordering::Equal => path == root,
        cmp::Ordering::Greater => path.starts_with(root) && path[root.len()] == b'/',
    }
}

fn qid_from_metadata(md: &fs::Metadata) -> QID {
    let mut kind = QidType::QTFILE;
    if md.is_dir() {
        kind |= QidType::QTDIR;
    }
    if md.file_type().is_symlink() {
        kind |= QidType::QTSYMLINK;
    }
    // The version moves forward whenever the file is modified; the path is
    // the inode number and survives reopens.
    let millis = md
        .mtime()
        .wrapping_mul(1000)
        .wrapping_add(md.mtime_nsec() / 1_000_000);
    QID {
        kind: kind.bits(),
        version: millis as u32,
        path: md.ino(),
    }
}

fn mode_from_metadata(md: &fs::Metadata) -> u32 {
    let mut mode = md.mode() & 0o777;
    if md.is_dir() {
        mode |= FileMode::DMDIR.bits();
    }
    mode
}

fn dir_from_metadata(md: &fs::Metadata, name: &[u8]) -> Dir {
    Dir {
        kind: 0,
        dev: 0,
        qid: qid_from_metadata(md),
        mode: mode_from_metadata(md),
        atime: md.mtime() as u32,
        mtime: md.mtime() as u32,
        length: md.len(),
        name: name.to_vec(),
        uid: b"root".to_vec(),
        gid: b"root".to_vec(),
        muid: Vec::new(),
    }
}

fn timespec_for(t: u32) -> libc::timespec {
    if t.is_unset() {
        libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        }
    } else {
        libc::timespec {
            tv_sec: t as libc::time_t,
            tv_nsec: 0,
        }
    }
}

/// Streaming state for directory reads.  An entry that did not fit in the
/// client's count is parked in `oflow` and handed out by the next read.
struct DirCursor {
    iter: Option<fs::ReadDir>,
    oflow: Vec<u8>,
}

#[derive(Clone)]
struct OpenHandle {
    file: Arc<File>,
    mode: OpenMode,
    dir: Option<Arc<Mutex<DirCursor>>>,
}

/// What a live FID names.  Cloning is shallow: a walk-clone shares the open
/// OS handle, if any, just as the two FIDs share the underlying file.
#[derive(Clone)]
struct Handle {
    full_path: PathBuf,
    qid: QID,
    open: Option<OpenHandle>,
}

/// A file service over a subtree of the local filesystem.  One instance per
/// session; dropping it reclaims every FID and closes every OS handle.
pub struct HostBackend {
    root: PathBuf,
    max_msize: u32,
    fids: HashMap<FID, Handle>,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl HostBackend {
    pub fn new<P: AsRef<Path>>(
        logger: Arc<dyn Logger + Send + Sync>,
        root: P,
        max_msize: u32,
    ) -> HostBackend {
        Self {
            root: root.as_ref().to_owned(),
            max_msize,
            fids: HashMap::new(),
            logger,
        }
    }

    fn handle(&self, fid: FID) -> Result<Handle> {
        let g = self.fids.guard();
        self.fids.get(&fid, &g).cloned().ok_or(Error::BadFid)
    }

    fn open_file(&self, full_path: &Path, flags: i32, mode: u32) -> Result<File> {
        trace!(
            self.logger,
            "9P open: opening {} flags {:#x} mode {:04o}",
            full_path.display(),
            flags,
            mode
        );
        let c = cstring(full_path)?;
        let fd = with_error(|| unsafe { libc::open(c.as_ptr(), flags, mode as libc::c_uint) })?;
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    fn read_dir_record(
        &self,
        h: &Handle,
        cursor: &Mutex<DirCursor>,
        offset: u64,
        data: &mut [u8],
    ) -> Result<u32> {
        let mut cur = cursor.lock().unwrap();
        if offset == 0 {
            cur.iter = Some(fs::read_dir(&h.full_path)?);
            cur.oflow.clear();
        }
        let record = if cur.oflow.is_empty() {
            let iter = cur.iter.as_mut().ok_or_else(einval)?;
            let entry = match iter.next() {
                Some(entry) => entry?,
                // End of directory.
                None => return Ok(0),
            };
            let path = h.full_path.join(entry.file_name());
            let md = fs::symlink_metadata(&path)?;
            trace!(
                self.logger,
                "9P read: dir entry {}",
                entry.file_name().to_string_lossy()
            );
            dir_from_metadata(&md, entry.file_name().as_bytes()).to_bytes()?
        } else {
            std::mem::take(&mut cur.oflow)
        };
        if record.len() > data.len() {
            // A stat record is never split across replies.  Park it so a
            // retry with a larger count can make progress.
            cur.oflow = record;
            return Err(Error::MalformedFrame);
        }
        data[..record.len()].copy_from_slice(&record);
        Ok(record.len() as u32)
    }
}

impl Backend for HostBackend {
    fn version(&self, _meta: &Metadata, msize: u32, version: &[u8]) -> Result<(u32, Vec<u8>)> {
        if version != b"9P2000" {
            return Err(Error::UnsupportedVersion(
                String::from_utf8_lossy(version).into_owned(),
            ));
        }
        Ok((cmp::min(msize, self.max_msize), b"9P2000".to_vec()))
    }

    fn attach(
        &self,
        _meta: &Metadata,
        fid: FID,
        afid: FID,
        uname: &[u8],
        aname: &[u8],
    ) -> Result<QID> {
        trace!(
            self.logger,
            "9P attach: fid {} afid {} uname {} aname {}",
            fid,
            afid,
            hex::encode(uname),
            hex::encode(aname)
        );
        if afid != NOFID {
            return Err(Error::AuthUnsupported);
        }
        let full_path = join_under(&self.root, aname);
        let md = fs::symlink_metadata(&full_path)?;
        let qid = qid_from_metadata(&md);
        trace!(
            self.logger,
            "9P attach: mounting {} as root: fid {}",
            full_path.display(),
            fid
        );
        let g = self.fids.guard();
        let handle = Handle {
            full_path,
            qid,
            open: None,
        };
        if self.fids.try_insert(fid, handle, &g).is_err() {
            return Err(Error::FidInUse);
        }
        Ok(qid)
    }

    fn walk(&self, _meta: &Metadata, fid: FID, newfid: FID, names: &[&[u8]]) -> Result<Vec<QID>> {
        trace!(
            self.logger,
            "9P walk: fid {} newfid {} components {}",
            fid,
            newfid,
            names.len()
        );
        let h = self.handle(fid)?;
        if names.is_empty() {
            let g = self.fids.guard();
            if newfid != fid && self.fids.contains_key(&newfid, &g) {
                return Err(Error::FidInUse);
            }
            self.fids.insert(newfid, h, &g);
            return Ok(Vec::new());
        }
        let mut full_path = h.full_path;
        let mut qid = h.qid;
        let mut qids = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let next = if *name == b".." {
                // ".." at the exported root is defined to be a no-op.
                match full_path.parent() {
                    Some(p) if full_path != self.root => p.to_owned(),
                    _ => full_path.clone(),
                }
            } else {
                join_under(&full_path, name)
            };
            if !is_within(&next, &self.root) {
                return Err(Error::PermissionDenied);
            }
            trace!(
                self.logger,
                "9P walk: component {} -> {}",
                String::from_utf8_lossy(name),
                next.display()
            );
            match fs::symlink_metadata(&next) {
                Ok(md) => {
                    qid = qid_from_metadata(&md);
                    qids.push(qid);
                    full_path = next;
                }
                Err(e) if i == 0 => return Err(e.into()),
                // A later step failed: report how far we got and leave
                // newfid alone.
                Err(_) => return Ok(qids),
            }
        }
        let g = self.fids.guard();
        if newfid != fid && self.fids.contains_key(&newfid, &g) {
            return Err(Error::FidInUse);
        }
        self.fids.insert(
            newfid,
            Handle {
                full_path,
                qid,
                open: None,
            },
            &g,
        );
        Ok(qids)
    }

    fn open(&self, _meta: &Metadata, fid: FID, mode: OpenMode) -> Result<(QID, u32)> {
        trace!(self.logger, "9P open: fid {} mode {:?}", fid, mode);
        let h = self.handle(fid)?;
        if h.open.is_some() {
            return Err(Error::FidAlreadyOpen);
        }
        if mode.contains(OpenMode::ORCLOSE) {
            // Remove-on-clunk is not honoured.
            debug!(self.logger, "9P open: fid {} requested ORCLOSE; ignored", fid);
        }
        let file = self.open_file(&h.full_path, mode.to_unix(), 0)?;
        let dir = if file.metadata()?.is_dir() {
            Some(Arc::new(Mutex::new(DirCursor {
                iter: None,
                oflow: Vec::new(),
            })))
        } else {
            None
        };
        let qid = h.qid;
        let g = self.fids.guard();
        self.fids.insert(
            fid,
            Handle {
                full_path: h.full_path,
                qid,
                open: Some(OpenHandle {
                    file: Arc::new(file),
                    mode,
                    dir,
                }),
            },
            &g,
        );
        Ok((qid, DEFAULT_IOUNIT))
    }

    fn create(
        &self,
        _meta: &Metadata,
        fid: FID,
        name: &[u8],
        perm: FileMode,
        mode: OpenMode,
    ) -> Result<(QID, u32)> {
        trace!(
            self.logger,
            "9P create: fid {} name {} perm {:?} mode {:?}",
            fid,
            String::from_utf8_lossy(name),
            perm,
            mode
        );
        let h = self.handle(fid)?;
        if h.open.is_some() {
            return Err(Error::FidAlreadyOpen);
        }
        let full_path = join_under(&h.full_path, name);
        if full_path == h.full_path || !is_within(&full_path, &self.root) {
            return Err(einval());
        }
        let unix_perm = perm.bits() & 0o777;
        if perm.contains(FileMode::DMDIR) {
            let c = cstring(&full_path)?;
            with_error(|| unsafe { libc::mkdir(c.as_ptr(), unix_perm as libc::mode_t) })?;
            let md = fs::symlink_metadata(&full_path)?;
            let qid = qid_from_metadata(&md);
            let file = self.open_file(&full_path, libc::O_RDONLY, 0)?;
            let g = self.fids.guard();
            self.fids.insert(
                fid,
                Handle {
                    full_path,
                    qid,
                    open: Some(OpenHandle {
                        file: Arc::new(file),
                        mode,
                        dir: Some(Arc::new(Mutex::new(DirCursor {
                            iter: None,
                            oflow: Vec::new(),
                        }))),
                    }),
                },
                &g,
            );
            return Ok((qid, DEFAULT_IOUNIT));
        }
        // Anything that is not a directory becomes a plain file carrying
        // the low nine permission bits; other perm modifiers are masked.
        let flags = mode.to_unix() | libc::O_CREAT | libc::O_TRUNC;
        let file = self.open_file(&full_path, flags, unix_perm)?;
        let qid = qid_from_metadata(&file.metadata()?);
        let g = self.fids.guard();
        self.fids.insert(
            fid,
            Handle {
                full_path,
                qid,
                open: Some(OpenHandle {
                    file: Arc::new(file),
                    mode,
                    dir: None,
                }),
            },
            &g,
        );
        Ok((qid, DEFAULT_IOUNIT))
    }

    fn read(&self, _meta: &Metadata, fid: FID, offset: u64, data: &mut [u8]) -> Result<u32> {
        trace!(
            self.logger,
            "9P read: fid {} offset {} count {}",
            fid,
            offset,
            data.len()
        );
        let h = self.handle(fid)?;
        let oh = h.open.as_ref().ok_or(Error::FidNotOpen)?;
        match &oh.dir {
            Some(cursor) => self.read_dir_record(&h, cursor, offset, data),
            None => {
                // Zero-length reads pass through; a read at EOF returns zero
                // bytes with no error.
                let n = oh.file.read_at(data, offset)?;
                Ok(n as u32)
            }
        }
    }

    fn write(&self, _meta: &Metadata, fid: FID, offset: u64, data: &[u8]) -> Result<u32> {
        trace!(
            self.logger,
            "9P write: fid {} offset {} bytes {}",
            fid,
            offset,
            data.len()
        );
        let h = self.handle(fid)?;
        let oh = h.open.as_ref().ok_or(Error::FidNotOpen)?;
        trace!(self.logger, "9P write: open mode {:?}", oh.mode);
        // Zero-length writes pass through; the OS is the arbiter of whether
        // the open mode permits writing.
        let n = oh.file.write_at(data, offset)?;
        Ok(n as u32)
    }

    fn clunk(&self, _meta: &Metadata, fid: FID) -> Result<()> {
        trace!(self.logger, "9P clunk: fid {}", fid);
        let g = self.fids.guard();
        self.fids.remove(&fid, &g).ok_or(Error::BadFid)?;
        Ok(())
    }

    fn clunk_all(&self, _meta: &Metadata) -> Result<()> {
        trace!(self.logger, "9P clunk: all fids");
        let g = self.fids.guard();
        self.fids.clear(&g);
        Ok(())
    }

    fn remove(&self, meta: &Metadata, fid: FID) -> Result<()> {
        trace!(self.logger, "9P remove: fid {}", fid);
        let h = self.handle(fid)?;
        self.clunk(meta, fid)?;
        if h.qid.kind & QidType::QTDIR.bits() != 0 {
            fs::remove_dir(&h.full_path)?;
        } else {
            fs::remove_file(&h.full_path)?;
        }
        Ok(())
    }

    fn stat(&self, _meta: &Metadata, fid: FID) -> Result<Dir> {
        trace!(self.logger, "9P stat: fid {}", fid);
        let h = self.handle(fid)?;
        let md = fs::symlink_metadata(&h.full_path)?;
        let name = if h.full_path == self.root {
            b"/".to_vec()
        } else {
            h.full_path
                .file_name()
                .map(|n| n.as_bytes().to_vec())
                .unwrap_or_else(|| b"/".to_vec())
        };
        Ok(dir_from_metadata(&md, &name))
    }

    fn wstat(&self, _meta: &Metadata, fid: FID, dir: &Dir) -> Result<()> {
        trace!(self.logger, "9P wstat: fid {}", fid);
        let h = self.handle(fid)?;
        let mut full_path = h.full_path.clone();
        let mut changed = false;
        if !dir.mode.is_unset() {
            changed = true;
            let mode = dir.mode & 0o777;
            trace!(self.logger, "9P wstat: chmod {:04o}", mode);
            let c = cstring(&full_path)?;
            with_error(|| unsafe { libc::chmod(c.as_ptr(), mode as libc::mode_t) })?;
        }
        if !dir.uid.is_empty() || !dir.gid.is_empty() {
            // Ownership changes are not supported.
            return Err(Error::PermissionDenied);
        }
        if !dir.name.is_empty() {
            changed = true;
            // Cleaning the new name against "/" before joining keeps a
            // rename from escaping the exported root.  An absolute name is
            // reinterpreted as relative to the root.
            let dest = if dir.name.starts_with(b"/") {
                join_under(&self.root, &dir.name)
            } else {
                let parent = full_path.parent().unwrap_or(&self.root).to_owned();
                join_under(&parent, &dir.name)
            };
            if !is_within(&dest, &self.root) {
                return Err(Error::PermissionDenied);
            }
            if dest != full_path {
                trace!(
                    self.logger,
                    "9P wstat: rename {} -> {}",
                    full_path.display(),
                    dest.display()
                );
                fs::rename(&full_path, &dest)?;
                let g = self.fids.guard();
                self.fids.insert(
                    fid,
                    Handle {
                        full_path: dest.clone(),
                        qid: h.qid,
                        open: h.open.clone(),
                    },
                    &g,
                );
                full_path = dest;
            }
        }
        if !dir.length.is_unset() {
            changed = true;
            trace!(self.logger, "9P wstat: truncate to {}", dir.length);
            let c = cstring(&full_path)?;
            with_error(|| unsafe { libc::truncate(c.as_ptr(), dir.length as libc::off_t) })?;
        }
        if !dir.atime.is_unset() || !dir.mtime.is_unset() {
            changed = true;
            let times = [timespec_for(dir.atime), timespec_for(dir.mtime)];
            let c = cstring(&full_path)?;
            with_error(|| unsafe { libc::utimensat(libc::AT_FDCWD, c.as_ptr(), times.as_ptr(), 0) })?;
        }
        if !changed {
            if let Some(oh) = &h.open {
                trace!(self.logger, "9P wstat: nothing specified, syncing");
                let _ = oh.file.sync_all();
            }
        }
        Ok(())
    }

    fn flush(&self, _meta: &Metadata, oldtag: Tag) -> Result<()> {
        // Requests are handled serially, so the request named by oldtag has
        // already been answered by the time we read the flush.
        trace!(self.logger, "9P flush: oldtag {}", oldtag);
        Ok(())
    }
}
