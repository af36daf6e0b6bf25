//! TCP socket configuration utilities.
//!
//! Thin helpers over the OS socket handle that the endpoints apply to the
//! streams they open or accept, and to the listener on shutdown.
//!
//! # Safety
//!
//! This module uses unsafe code to borrow the raw file descriptor/socket for
//! configuration calls. The unsafe operations are encapsulated and safe to
//! use from the public API.

#![allow(unsafe_code)]

use std::io;
use std::net::Shutdown;

/// Enable TCP_NODELAY on a compio TcpStream for minimal latency.
///
/// This disables Nagle's algorithm, trading bandwidth efficiency for lower
/// latency on small request/response frames.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_nodelay(stream: &compio::net::TcpStream) -> io::Result<()> {
    with_socket(stream, |sock| sock.set_nodelay(true))
}

/// Shut down one or both directions of a compio TcpStream.
///
/// Shutting down the write side sends FIN while leaving the read side open,
/// which is the first step of a graceful disconnect: the peer observes EOF,
/// finishes its sends, and closes in turn.
///
/// # Errors
///
/// Returns an error if the OS rejects the shutdown (e.g. the socket is
/// already closed).
#[inline]
pub fn shutdown_stream(stream: &compio::net::TcpStream, how: Shutdown) -> io::Result<()> {
    with_socket(stream, |sock| sock.shutdown(how))
}

/// Shut down a compio TcpListener's socket.
///
/// Pending accept operations on the socket complete with an error instead of
/// blocking until a peer arrives, so a listener teardown never waits on the
/// shutdown flag alone to unblock its acceptors.
///
/// # Errors
///
/// Returns an error if the OS rejects the shutdown (e.g. the socket is
/// already closed).
#[inline]
pub fn shutdown_listener(listener: &compio::net::TcpListener, how: Shutdown) -> io::Result<()> {
    with_socket(listener, |sock| sock.shutdown(how))
}

#[cfg(unix)]
fn with_socket<S, F>(socket: &S, f: F) -> io::Result<()>
where
    S: std::os::unix::io::AsRawFd,
    F: FnOnce(&socket2::Socket) -> io::Result<()>,
{
    use std::os::unix::io::FromRawFd;
    let fd = socket.as_raw_fd();
    let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
    let result = f(&sock);
    std::mem::forget(sock); // Don't close the fd
    result
}

#[cfg(windows)]
fn with_socket<S, F>(socket: &S, f: F) -> io::Result<()>
where
    S: std::os::windows::io::AsRawSocket,
    F: FnOnce(&socket2::Socket) -> io::Result<()>,
{
    use std::os::windows::io::FromRawSocket;
    let raw = socket.as_raw_socket();
    let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
    let result = f(&sock);
    std::mem::forget(sock); // Don't close the socket
    result
}

#[cfg(not(any(unix, windows)))]
fn with_socket<S, F>(_socket: &S, _f: F) -> io::Result<()>
where
    F: FnOnce(&socket2::Socket) -> io::Result<()>,
{
    // Unsupported platform - continue without socket configuration
    Ok(())
}
