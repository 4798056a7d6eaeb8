use std::io;
use thiserror::Error;

/// An error to be reported to a 9P client.
///
/// Every variant renders to the string carried in an `Rerror` reply.  9P2000
/// has no numeric error codes, so clients recognize errors by substring; the
/// strings here are therefore part of the protocol surface and must stay
/// stable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad FID")]
    BadFid,
    #[error("FID in use")]
    FidInUse,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Enoent")]
    NotFound,
    #[error("malformed frame")]
    MalformedFrame,
    #[error("{0} not supported; only 9P2000")]
    UnsupportedVersion(String),
    #[error("{0} not allowed before Tversion")]
    NotVersioned(String),
    #[error("message type {0:#04x} not supported")]
    UnsupportedMessage(u8),
    #[error("authentication not supported")]
    AuthUnsupported,
    #[error("FID already open")]
    FidAlreadyOpen,
    #[error("FID not open")]
    FidNotOpen,
    #[error("string too long to marshal")]
    StringTooLong,
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        // The named variants keep the wire strings stable across platforms
        // for the errors clients commonly match on.
        match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound,
            io::ErrorKind::PermissionDenied => Error::PermissionDenied,
            _ => Error::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn wire_strings() {
        assert_eq!(format!("{}", Error::BadFid), "Bad FID");
        assert_eq!(format!("{}", Error::NotFound), "Enoent");
        assert_eq!(format!("{}", Error::FidInUse), "FID in use");
        assert_eq!(
            format!("{}", Error::UnsupportedVersion("9P1".into())),
            "9P1 not supported; only 9P2000"
        );
        assert_eq!(
            format!("{}", Error::NotVersioned("Twalk".into())),
            "Twalk not allowed before Tversion"
        );
    }

    #[test]
    fn io_error_folding() {
        let e: Error = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(matches!(e, Error::NotFound));
        let e: Error = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(e, Error::PermissionDenied));
        let e: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(e, Error::Io(_)));
    }
}
