use crate::proto::{Dir, FileMode, OpenMode, Tag, FID, QID};
use ninepd_constants::Error;

type Result<T> = std::result::Result<T, Error>;

pub mod hostfs;

/// Per-request context handed to every backend operation.
pub struct Metadata {
    pub tag: Tag,
}

/// The interface between the dispatcher and a file service.
///
/// One instance serves one session and owns that session's FID table; the
/// dispatcher performs no FID validation of its own.  Implementations other
/// than the host filesystem (in-memory trees, synthetic files) plug in here.
pub trait Backend {
    /// Negotiate the protocol version and maximum message size.
    fn version(&self, meta: &Metadata, msize: u32, version: &[u8]) -> Result<(u32, Vec<u8>)>;
    /// Establish `fid` as a root for this session.
    fn attach(&self, meta: &Metadata, fid: FID, afid: FID, uname: &[u8], aname: &[u8])
        -> Result<QID>;
    /// Walk zero or more path elements from `fid`, installing `newfid` at
    /// the endpoint.  Zero names clones `fid`.
    fn walk(&self, meta: &Metadata, fid: FID, newfid: FID, names: &[&[u8]]) -> Result<Vec<QID>>;
    fn open(&self, meta: &Metadata, fid: FID, mode: OpenMode) -> Result<(QID, u32)>;
    fn create(
        &self,
        meta: &Metadata,
        fid: FID,
        name: &[u8],
        perm: FileMode,
        mode: OpenMode,
    ) -> Result<(QID, u32)>;
    fn read(&self, meta: &Metadata, fid: FID, offset: u64, data: &mut [u8]) -> Result<u32>;
    fn write(&self, meta: &Metadata, fid: FID, offset: u64, data: &[u8]) -> Result<u32>;
    /// Release `fid`.  The open OS handle, if any, goes with it.
    fn clunk(&self, meta: &Metadata, fid: FID) -> Result<()>;
    /// Release every FID in the session.  Used on version negotiation and
    /// session teardown.
    fn clunk_all(&self, meta: &Metadata) -> Result<()>;
    /// Clunk `fid`, then delete the file it names.
    fn remove(&self, meta: &Metadata, fid: FID) -> Result<()>;
    fn stat(&self, meta: &Metadata, fid: FID) -> Result<Dir>;
    /// Apply the specified fields of `dir`; unspecified fields are all-ones
    /// (the empty string, for strings).
    fn wstat(&self, meta: &Metadata, fid: FID, dir: &Dir) -> Result<()>;
    /// Abandon the request identified by `oldtag`, if it is still running.
    fn flush(&self, meta: &Metadata, oldtag: Tag) -> Result<()>;
}
