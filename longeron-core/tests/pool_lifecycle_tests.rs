//! Integration tests for the pooling layer: buffer pool and state-object
//! pool working together the way the framed endpoints drive them.

use std::sync::Arc;

use longeron_core::buffer::BufferPool;
use longeron_core::frame::{total_frame_size, HEADER_SIZE};
use longeron_core::pool::ObjectPool;
use longeron_core::state::{OperationState, StateRecycler, UserToken};

fn placeholder() -> std::net::SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn exchange_rental_roundtrip() {
    let buffers = BufferPool::new(total_frame_size(8192), 8).unwrap();
    let states = ObjectPool::new(Arc::new(StateRecycler::new(placeholder())), 4, 8);

    // One exchange: rent state, attach buffer, run counters, detach, return.
    let mut state = states.rent();
    state.token = UserToken::Write { total_written: 0 };
    state.remote = "127.0.0.1:12377".parse().unwrap();
    state.buffer = Some(buffers.rent(total_frame_size(4096)).unwrap());

    state.token.advance(HEADER_SIZE + 4096);
    let buf = state.take_buffer().unwrap();
    buffers.give_back(buf, false);
    states.give_back(state);

    assert_eq!(states.idle_objects(), 4);
    assert_eq!(buffers.idle_buffers(), 1);

    // The next rent observes a pristine object.
    let state = states.rent();
    assert_eq!(state.token, UserToken::Idle);
    assert!(state.buffer.is_none());
    assert_eq!(state.remote, placeholder());
}

#[test]
fn many_roundtrips_do_not_grow_the_pools() {
    let buffers = BufferPool::new(total_frame_size(8192), 4).unwrap();
    let states = ObjectPool::new(Arc::new(StateRecycler::new(placeholder())), 2, 4);

    for i in 0..1000 {
        let mut state = states.rent();
        state.token = UserToken::Read {
            expected: 1024,
            total_read: 0,
        };
        state.buffer = Some(buffers.rent(1024 + HEADER_SIZE).unwrap());
        state.token.advance(1024);

        let buf = state.take_buffer().unwrap();
        buffers.give_back(buf, i % 2 == 0);
        states.give_back(state);
    }

    assert!(states.idle_objects() <= 4);
    assert!(buffers.idle_buffers() <= 4);
    assert_eq!(buffers.stats().misses, 1);
}

#[test]
fn concurrent_rent_return_is_safe() {
    let buffers = Arc::new(BufferPool::new(total_frame_size(8192), 16).unwrap());
    let states = Arc::new(ObjectPool::new(
        Arc::new(StateRecycler::new(placeholder())),
        0,
        16,
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let buffers = buffers.clone();
        let states = states.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..500 {
                let mut state: OperationState = states.rent();
                state.buffer = Some(buffers.rent(2048).unwrap());
                let buf = state.take_buffer().unwrap();
                buffers.give_back(buf, false);
                states.give_back(state);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = buffers.stats();
    assert_eq!(stats.rents, 2000);
    assert!(stats.returns + stats.discards == 2000);
}
