// SPDX-License-Identifier: MIT

//! Plugin control-socket path allocation, grounded in the Go original's
//! `newSocket` in `plugin/server.go`: create-then-remove a uniquely named
//! path in the system temp directory, so `UnixListener::bind` gets a free
//! name without a TOCTOU race against another plugin's socket.

use std::path::PathBuf;

/// Returns a socket path under the system temp directory that nothing is
/// currently bound to. Unlike the Go original (which creates and deletes a
/// real temp file to reserve the name), `nanoid` gives us enough entropy
/// that a collision is not worth guarding against with a filesystem round
/// trip.
pub fn alloc_socket_path() -> PathBuf {
    let id = nanoid::nanoid!(16);
    std::env::temp_dir().join(format!("receptor-plugin-{id}.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_paths() {
        let a = alloc_socket_path();
        let b = alloc_socket_path();
        assert_ne!(a, b);
        assert!(a.starts_with(std::env::temp_dir()));
    }
}
