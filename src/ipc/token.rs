//! Shared-secret token for the control socket.
//!
//! The session mints a random token at startup and writes it to a file
//! only the session user can read. `prts-session-ctl` reads that file and
//! sends the token with every request; the server rejects requests
//! without it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{AppError, Result};

/// Fresh random token for one session.
#[must_use]
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Where the token for `ipc_name` lives: `$XDG_RUNTIME_DIR/prts-session/`,
/// falling back to the temp directory.
#[must_use]
pub fn token_path(ipc_name: &str) -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("prts-session")
        .join(format!("{ipc_name}.token"))
}

/// Write `token` to `path`, readable by the owner only.
///
/// # Errors
///
/// Returns `AppError::Io` if the directory or file cannot be written.
pub fn write_token_file(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    // An existing file keeps its old mode; tighten it.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(token.as_bytes())?;
    debug!(path = %path.display(), "ipc token written");
    Ok(())
}

/// Read a token written by [`write_token_file`].
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read and
/// `AppError::Ipc` if it is empty.
pub fn read_token_file(path: &Path) -> Result<String> {
    let token = fs::read_to_string(path)?.trim().to_owned();
    if token.is_empty() {
        return Err(AppError::Ipc(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token)
}

/// Delete the token file at exit. A missing file is fine.
pub fn remove_token_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "ipc token removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to remove ipc token"),
    }
}
