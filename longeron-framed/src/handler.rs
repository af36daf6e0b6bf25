//! Request handler contract.
//!
//! The handler is the reader's sole extension point: one synchronous
//! callback invoked per fully received frame.

use std::net::SocketAddr;

/// Per-request callback invoked by the framed reader.
///
/// `request` is the received payload; `response` is a scratch slice of
/// exactly `max_message_size` bytes. The handler fills a prefix of
/// `response` and returns `Some(prefix_len)` to send it back, or `None` for
/// a fire-and-forget exchange.
///
/// The handler runs on the completion worker that received the frame and
/// holds that worker until it returns, so it must not block indefinitely.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, peer: SocketAddr, request: &[u8], response: &mut [u8]) -> Option<usize>;
}

impl<F> RequestHandler for F
where
    F: Fn(SocketAddr, &[u8], &mut [u8]) -> Option<usize> + Send + Sync + 'static,
{
    fn handle(&self, peer: SocketAddr, request: &[u8], response: &mut [u8]) -> Option<usize> {
        self(peer, request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_handlers() {
        let echo = |_peer: SocketAddr, request: &[u8], response: &mut [u8]| {
            response[..request.len()].copy_from_slice(request);
            Some(request.len())
        };

        let mut response = [0u8; 16];
        let n = echo
            .handle("127.0.0.1:1".parse().unwrap(), b"ping", &mut response)
            .unwrap();
        assert_eq!(&response[..n], b"ping");
    }

    #[test]
    fn fire_and_forget_returns_none() {
        let sink = |_peer: SocketAddr, _request: &[u8], _response: &mut [u8]| None;
        let mut response = [0u8; 4];
        assert!(sink
            .handle("127.0.0.1:1".parse().unwrap(), b"x", &mut response)
            .is_none());
    }
}
