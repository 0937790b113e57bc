//! # Pipe Endpoints
//!
//! Turns a pipe name into the OS object both sides open.
//!
//! ## Naming
//!
//! - **Windows**: a bare name `n` is the named pipe `\\.\pipe\n`; a name that
//!   already starts with `\\.\pipe\` is used as-is.
//! - **Unix**: the endpoint is a Unix-domain socket. A name containing `/` is a
//!   filesystem path; a bare name lives in the temporary directory.

use std::fmt;
use std::io;

use crate::error::{TransportError, TransportResult};

#[cfg(unix)]
pub use unix::{ClientStream, ServerStream};
#[cfg(windows)]
pub use win::{ClientStream, ServerStream};

/// Resolved pipe endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeEndpoint
{
    name: String,
    location: String,
}

impl PipeEndpoint
{
    /// Resolve `name` for the current platform.
    ///
    /// ## Errors
    ///
    /// - `InvalidEndpoint`: empty name or an embedded NUL byte
    pub fn new(name: &str) -> TransportResult<Self>
    {
        if name.is_empty() || name.contains('\0') {
            return Err(TransportError::InvalidEndpoint(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            location: resolve(name),
        })
    }

    /// Name as given by the caller.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Path or pipe name the OS sees.
    pub fn location(&self) -> &str
    {
        &self.location
    }

    /// Open a client connection.
    ///
    /// ## Errors
    ///
    /// Whatever the OS reports; nobody listening is the common case.
    pub async fn connect(&self) -> io::Result<ClientStream>
    {
        #[cfg(unix)]
        {
            unix::connect(&self.location).await
        }
        #[cfg(windows)]
        {
            win::connect(&self.location).await
        }
    }
}

impl fmt::Display for PipeEndpoint
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.location)
    }
}

#[cfg(unix)]
fn resolve(name: &str) -> String
{
    if name.contains('/') {
        name.to_string()
    } else {
        std::env::temp_dir().join(name).to_string_lossy().into_owned()
    }
}

#[cfg(windows)]
fn resolve(name: &str) -> String
{
    const PREFIX: &str = r"\\.\pipe\";
    if name.starts_with(PREFIX) {
        name.to_string()
    } else {
        format!("{PREFIX}{name}")
    }
}

#[cfg(unix)]
pub(crate) mod unix
{
    use std::io;
    use std::os::unix::fs::FileTypeExt;
    use std::path::Path;

    use tokio::net::{UnixListener, UnixStream};

    pub type ClientStream = UnixStream;
    pub type ServerStream = UnixStream;

    pub async fn connect(location: &str) -> io::Result<ClientStream>
    {
        UnixStream::connect(location).await
    }

    /// Bind a listener, replacing a stale socket file left by a crashed
    /// front-end. Anything at `location` that is not a socket is left alone.
    pub fn bind(location: &str) -> io::Result<UnixListener>
    {
        let path = Path::new(location);
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)?,
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{location} exists and is not a socket"),
                ))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        UnixListener::bind(path)
    }
}

#[cfg(windows)]
pub(crate) mod win
{
    use std::io;
    use std::time::Duration;

    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions};

    pub type ClientStream = NamedPipeClient;
    pub type ServerStream = NamedPipeServer;

    /// `ERROR_PIPE_BUSY`: every server instance is taken, retry shortly.
    const ERROR_PIPE_BUSY: i32 = 231;

    pub async fn connect(location: &str) -> io::Result<ClientStream>
    {
        loop {
            match ClientOptions::new().open(location) {
                Ok(client) => return Ok(client),
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub fn create(location: &str, first: bool) -> io::Result<NamedPipeServer>
    {
        ServerOptions::new().first_pipe_instance(first).create(location)
    }
}
