//! The 9P2000 wire format.
//!
//! Every message is framed as `size[4] type[1] tag[2] payload[size-7]` with
//! all integers little-endian.  Strings are a `u16` length followed by that
//! many bytes of UTF-8 with no terminator.  This module contains the shared
//! data types (tags, FIDs, QIDs, stat records) and one hand-written
//! encode/decode pair per message payload.

use ninepd_constants::Error;
use num_derive::FromPrimitive;
use std::convert::TryInto;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

type Result<T> = std::result::Result<T, Error>;

/// Bytes in the `size[4] type[1] tag[2]` prefix of every message.
pub const HEADER_SIZE: usize = 7;

/// FID value meaning "no FID"; sent as the afid of an unauthenticated attach.
pub const NOFID: FID = FID(u32::MAX);

/// Tag reserved for Tversion.
pub const NOTAG: Tag = Tag(u16::MAX);

/// Maximum number of path elements in a single walk.
pub const MAXWELEM: usize = 16;

/// Client-chosen request identifier, echoed in the reply.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Tag(pub u16);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:#06x})", self.0)
    }
}

/// Client-chosen handle naming a file within a session.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FID(pub u32);

impl fmt::Display for FID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FID({:#010x})", self.0)
    }
}

/// Server-chosen identifier for a filesystem object.
///
/// Two objects are the same object iff their QIDs compare equal
/// component-wise.  `path` is stable across reopens of the same object.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct QID {
    pub kind: u8,
    pub version: u32,
    pub path: u64,
}

impl QID {
    /// Encoded size on the wire.
    pub const SIZE: usize = 13;
}

impl fmt::Display for QID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QID({:#04x}:{:08x}:{:016x})",
            self.kind, self.version, self.path
        )
    }
}

bitflags! {
    /// QID type bits.
    pub struct QidType: u8 {
        const QTDIR =     0x80;
        const QTAPPEND =  0x40;
        const QTEXCL =    0x20;
        const QTAUTH =    0x08;
        const QTSYMLINK = 0x02;
        const QTFILE =    0x00;
    }

    /// Dir.mode bits; the low nine bits are POSIX-style permissions.
    pub struct FileMode: u32 {
        const DMDIR =       0x80000000;
        const DMAPPEND =    0x40000000;
        const DMEXCL =      0x20000000;
        const DMMOUNT =     0x10000000;
        const DMAUTH =      0x08000000;
        const DMTMP =       0x04000000;
        const DMSYMLINK =   0x02000000;
        const DMDEVICE =    0x00800000;
        const DMNAMEDPIPE = 0x00200000;
        const DMSOCKET =    0x00100000;
        const DMSETUID =    0x00080000;
        const DMSETGID =    0x00040000;
        const DMACCMODE =   0o777;
    }

    /// The mode byte of Topen and Tcreate.
    pub struct OpenMode: u8 {
        const OREAD =    0x00;
        const OWRITE =   0x01;
        const ORDWR =    0x02;
        const OEXEC =    0x03;
        const OACCMODE = 0x03;
        const OTRUNC =   0x10;
        const ORCLOSE =  0x40;
    }
}

impl OpenMode {
    /// Translate to open(2) flags.  OEXEC carries no extra rights on a host
    /// filesystem and opens read-only; ORCLOSE is the caller's problem.
    pub fn to_unix(self) -> i32 {
        let mut flags = match self & Self::OACCMODE {
            Self::OWRITE => libc::O_WRONLY,
            Self::ORDWR => libc::O_RDWR,
            _ => libc::O_RDONLY,
        };
        if self.contains(Self::OTRUNC) {
            flags |= libc::O_TRUNC;
        }
        flags
    }
}

/// The wstat convention: a field whose value is all ones for its width (the
/// empty string, for strings) is left untouched by the request.
pub trait IsUnset {
    fn is_unset(&self) -> bool;
}

impl IsUnset for u16 {
    fn is_unset(&self) -> bool {
        *self == u16::MAX
    }
}

impl IsUnset for u32 {
    fn is_unset(&self) -> bool {
        *self == u32::MAX
    }
}

impl IsUnset for u64 {
    fn is_unset(&self) -> bool {
        *self == u64::MAX
    }
}

impl IsUnset for Vec<u8> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl IsUnset for QID {
    fn is_unset(&self) -> bool {
        self.kind == u8::MAX && self.version.is_unset() && self.path.is_unset()
    }
}

/// 9P2000 message type codes.  106 would be Terror, which is illegal.
#[derive(FromPrimitive, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MessageType {
    Tversion = 100,
    Rversion = 101,
    Tauth = 102,
    Rauth = 103,
    Tattach = 104,
    Rattach = 105,
    Rerror = 107,
    Tflush = 108,
    Rflush = 109,
    Twalk = 110,
    Rwalk = 111,
    Topen = 112,
    Ropen = 113,
    Tcreate = 114,
    Rcreate = 115,
    Tread = 116,
    Rread = 117,
    Twrite = 118,
    Rwrite = 119,
    Tclunk = 120,
    Rclunk = 121,
    Tremove = 122,
    Rremove = 123,
    Tstat = 124,
    Rstat = 125,
    Twstat = 126,
    Rwstat = 127,
}

/// Incremental little-endian reader over a message payload.
///
/// Every read is bounds-checked; running off the end of the payload is a
/// malformed frame, as is a string or count that claims more bytes than
/// remain.
pub struct Deserializer<'a> {
    data: &'a [u8],
    off: AtomicUsize,
}

impl<'a> Deserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            off: AtomicUsize::new(0),
        }
    }

    fn advance(&self, len: usize) -> Result<usize> {
        let off = self.off.fetch_add(len, Ordering::AcqRel);
        match off.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(off),
            _ => Err(Error::MalformedFrame),
        }
    }

    pub fn read_u8(&self) -> Result<u8> {
        let off = self.advance(1)?;
        Ok(self.data[off])
    }

    pub fn read_u16(&self) -> Result<u16> {
        let off = self.advance(2)?;
        Ok(u16::from_le_bytes(
            self.data[off..off + 2].try_into().unwrap(),
        ))
    }

    pub fn read_u32(&self) -> Result<u32> {
        let off = self.advance(4)?;
        Ok(u32::from_le_bytes(
            self.data[off..off + 4].try_into().unwrap(),
        ))
    }

    pub fn read_u64(&self) -> Result<u64> {
        let off = self.advance(8)?;
        Ok(u64::from_le_bytes(
            self.data[off..off + 8].try_into().unwrap(),
        ))
    }

    pub fn read_tag(&self) -> Result<Tag> {
        Ok(Tag(self.read_u16()?))
    }

    pub fn read_fid(&self) -> Result<FID> {
        Ok(FID(self.read_u32()?))
    }

    pub fn read_qid(&self) -> Result<QID> {
        Ok(QID {
            kind: self.read_u8()?,
            version: self.read_u32()?,
            path: self.read_u64()?,
        })
    }

    pub fn read_string(&self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        let off = self.advance(len)?;
        Ok(&self.data[off..off + len])
    }

    pub fn read_data(&self, len: usize) -> Result<&'a [u8]> {
        let off = self.advance(len)?;
        Ok(&self.data[off..off + len])
    }
}

/// Incremental little-endian writer producing a message payload.
pub struct Serializer {
    data: Vec<u8>,
}

impl Serializer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, data: u8) {
        self.data.push(data);
    }

    pub fn write_u16(&mut self, data: u16) {
        self.data.extend(&data.to_le_bytes());
    }

    pub fn write_u32(&mut self, data: u32) {
        self.data.extend(&data.to_le_bytes());
    }

    pub fn write_u64(&mut self, data: u64) {
        self.data.extend(&data.to_le_bytes());
    }

    pub fn write_tag(&mut self, tag: Tag) {
        self.write_u16(tag.0);
    }

    pub fn write_fid(&mut self, fid: FID) {
        self.write_u32(fid.0);
    }

    pub fn write_qid(&mut self, qid: QID) {
        self.write_u8(qid.kind);
        self.write_u32(qid.version);
        self.write_u64(qid.path);
    }

    pub fn write_string(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > u16::MAX as usize {
            return Err(Error::StringTooLong);
        }
        self.write_u16(data.len() as u16);
        self.data.extend(data.iter());
        Ok(())
    }

    pub fn write_data(&mut self, data: &[u8]) {
        self.data.extend(data);
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// The 9P2000 stat record.
///
/// Marshalled with a leading `u16` size that excludes itself.  The `kind`
/// and `dev` fields are for the use of the kernel driver on Plan 9 and are
/// zero here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dir {
    pub kind: u16,
    pub dev: u32,
    pub qid: QID,
    pub mode: u32,
    pub atime: u32,
    pub mtime: u32,
    pub length: u64,
    pub name: Vec<u8>,
    pub uid: Vec<u8>,
    pub gid: Vec<u8>,
    pub muid: Vec<u8>,
}

impl Dir {
    /// The size of all fixed quantities, including the size prefix and the
    /// four string length headers.
    pub const FIXED_SIZE: usize = 2 + 2 + 4 + QID::SIZE + 4 + 4 + 4 + 8 + 2 + 2 + 2 + 2;

    pub fn from_bytes(data: &[u8]) -> Result<Dir> {
        let d = Deserializer::new(data);
        // The size prefix is only used for framing.
        d.read_u16()?;
        Ok(Dir {
            kind: d.read_u16()?,
            dev: d.read_u32()?,
            qid: d.read_qid()?,
            mode: d.read_u32()?,
            atime: d.read_u32()?,
            mtime: d.read_u32()?,
            length: d.read_u64()?,
            name: d.read_string()?.to_vec(),
            uid: d.read_string()?.to_vec(),
            gid: d.read_string()?.to_vec(),
            muid: d.read_string()?.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let len = Self::FIXED_SIZE + self.name.len() + self.uid.len() + self.gid.len()
            + self.muid.len()
            - 2;
        let len: u16 = len.try_into().map_err(|_| Error::StringTooLong)?;
        let mut s = Serializer::new();
        s.write_u16(len);
        s.write_u16(self.kind);
        s.write_u32(self.dev);
        s.write_qid(self.qid);
        s.write_u32(self.mode);
        s.write_u32(self.atime);
        s.write_u32(self.mtime);
        s.write_u64(self.length);
        s.write_string(&self.name)?;
        s.write_string(&self.uid)?;
        s.write_string(&self.gid)?;
        s.write_string(&self.muid)?;
        Ok(s.into_inner())
    }

    /// A record with every field unset, as sent by a wstat that touches
    /// nothing.
    pub fn unset() -> Dir {
        Dir {
            kind: u16::MAX,
            dev: u32::MAX,
            qid: QID {
                kind: u8::MAX,
                version: u32::MAX,
                path: u64::MAX,
            },
            mode: u32::MAX,
            atime: u32::MAX,
            mtime: u32::MAX,
            length: u64::MAX,
            name: Vec::new(),
            uid: Vec::new(),
            gid: Vec::new(),
            muid: Vec::new(),
        }
    }
}

impl IsUnset for Dir {
    fn is_unset(&self) -> bool {
        self.kind.is_unset()
            && self.dev.is_unset()
            && self.qid.is_unset()
            && self.mode.is_unset()
            && self.atime.is_unset()
            && self.mtime.is_unset()
            && self.length.is_unset()
            && self.name.is_unset()
            && self.uid.is_unset()
            && self.gid.is_unset()
            && self.muid.is_unset()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tversion {
    pub msize: u32,
    pub version: Vec<u8>,
}

impl Tversion {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            msize: d.read_u32()?,
            version: d.read_string()?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_u32(self.msize);
        s.write_string(&self.version)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rversion {
    pub msize: u32,
    pub version: Vec<u8>,
}

impl Rversion {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            msize: d.read_u32()?,
            version: d.read_string()?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_u32(self.msize);
        s.write_string(&self.version)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tauth {
    pub afid: FID,
    pub uname: Vec<u8>,
    pub aname: Vec<u8>,
}

impl Tauth {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            afid: d.read_fid()?,
            uname: d.read_string()?.to_vec(),
            aname: d.read_string()?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.afid);
        s.write_string(&self.uname)?;
        s.write_string(&self.aname)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rauth {
    pub aqid: QID,
}

impl Rauth {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            aqid: d.read_qid()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_qid(self.aqid);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tattach {
    pub fid: FID,
    pub afid: FID,
    pub uname: Vec<u8>,
    pub aname: Vec<u8>,
}

impl Tattach {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
            afid: d.read_fid()?,
            uname: d.read_string()?.to_vec(),
            aname: d.read_string()?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        s.write_fid(self.afid);
        s.write_string(&self.uname)?;
        s.write_string(&self.aname)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rattach {
    pub qid: QID,
}

impl Rattach {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            qid: d.read_qid()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_qid(self.qid);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rerror {
    pub ename: Vec<u8>,
}

impl Rerror {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            ename: d.read_string()?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_string(&self.ename)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tflush {
    pub oldtag: Tag,
}

impl Tflush {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            oldtag: d.read_tag()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_tag(self.oldtag);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rflush;

impl Rflush {
    pub fn decode(_d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self)
    }

    pub fn encode(&self, _s: &mut Serializer) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Twalk {
    pub fid: FID,
    pub newfid: FID,
    pub wnames: Vec<Vec<u8>>,
}

impl Twalk {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        let fid = d.read_fid()?;
        let newfid = d.read_fid()?;
        let nwname = d.read_u16()?;
        let wnames = (0..nwname)
            .map(|_| d.read_string().map(|n| n.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fid,
            newfid,
            wnames,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        s.write_fid(self.newfid);
        s.write_u16(self.wnames.len() as u16);
        for name in &self.wnames {
            s.write_string(name)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rwalk {
    pub wqids: Vec<QID>,
}

impl Rwalk {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        let nwqid = d.read_u16()?;
        let wqids = (0..nwqid)
            .map(|_| d.read_qid())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { wqids })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_u16(self.wqids.len() as u16);
        for qid in &self.wqids {
            s.write_qid(*qid);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Topen {
    pub fid: FID,
    pub mode: u8,
}

impl Topen {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
            mode: d.read_u8()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        s.write_u8(self.mode);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ropen {
    pub qid: QID,
    pub iounit: u32,
}

impl Ropen {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            qid: d.read_qid()?,
            iounit: d.read_u32()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_qid(self.qid);
        s.write_u32(self.iounit);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tcreate {
    pub fid: FID,
    pub name: Vec<u8>,
    pub perm: u32,
    pub mode: u8,
}

impl Tcreate {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
            name: d.read_string()?.to_vec(),
            perm: d.read_u32()?,
            mode: d.read_u8()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        s.write_string(&self.name)?;
        s.write_u32(self.perm);
        s.write_u8(self.mode);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rcreate {
    pub qid: QID,
    pub iounit: u32,
}

impl Rcreate {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            qid: d.read_qid()?,
            iounit: d.read_u32()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_qid(self.qid);
        s.write_u32(self.iounit);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tread {
    pub fid: FID,
    pub offset: u64,
    pub count: u32,
}

impl Tread {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
            offset: d.read_u64()?,
            count: d.read_u32()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        s.write_u64(self.offset);
        s.write_u32(self.count);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rread {
    pub data: Vec<u8>,
}

impl Rread {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        let count = d.read_u32()?;
        Ok(Self {
            data: d.read_data(count as usize)?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_u32(self.data.len() as u32);
        s.write_data(&self.data);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Twrite {
    pub fid: FID,
    pub offset: u64,
    pub data: Vec<u8>,
}

impl Twrite {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        let fid = d.read_fid()?;
        let offset = d.read_u64()?;
        let count = d.read_u32()?;
        Ok(Self {
            fid,
            offset,
            data: d.read_data(count as usize)?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        s.write_u64(self.offset);
        s.write_u32(self.data.len() as u32);
        s.write_data(&self.data);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rwrite {
    pub count: u32,
}

impl Rwrite {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            count: d.read_u32()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_u32(self.count);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tclunk {
    pub fid: FID,
}

impl Tclunk {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rclunk;

impl Rclunk {
    pub fn decode(_d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self)
    }

    pub fn encode(&self, _s: &mut Serializer) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tremove {
    pub fid: FID,
}

impl Tremove {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rremove;

impl Rremove {
    pub fn decode(_d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self)
    }

    pub fn encode(&self, _s: &mut Serializer) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tstat {
    pub fid: FID,
}

impl Tstat {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self {
            fid: d.read_fid()?,
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        s.write_fid(self.fid);
        Ok(())
    }
}

/// Rstat carries a marshalled Dir behind a second length prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rstat {
    pub stat: Vec<u8>,
}

impl Rstat {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        let n = d.read_u16()?;
        Ok(Self {
            stat: d.read_data(n as usize)?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        if self.stat.len() > u16::MAX as usize {
            return Err(Error::StringTooLong);
        }
        s.write_u16(self.stat.len() as u16);
        s.write_data(&self.stat);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Twstat {
    pub fid: FID,
    pub stat: Vec<u8>,
}

impl Twstat {
    pub fn decode(d: &Deserializer<'_>) -> Result<Self> {
        let fid = d.read_fid()?;
        let n = d.read_u16()?;
        Ok(Self {
            fid,
            stat: d.read_data(n as usize)?.to_vec(),
        })
    }

    pub fn encode(&self, s: &mut Serializer) -> Result<()> {
        if self.stat.len() > u16::MAX as usize {
            return Err(Error::StringTooLong);
        }
        s.write_fid(self.fid);
        s.write_u16(self.stat.len() as u16);
        s.write_data(&self.stat);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rwstat;

impl Rwstat {
    pub fn decode(_d: &Deserializer<'_>) -> Result<Self> {
        Ok(Self)
    }

    pub fn encode(&self, _s: &mut Serializer) -> Result<()> {
        Ok(())
    }
}
