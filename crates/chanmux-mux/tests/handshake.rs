#![cfg(unix)]

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chanmux_mux::{Channel, Mux, MuxConfig, MuxError};

fn connected_pair(config: MuxConfig) -> (Arc<Mux>, Arc<Mux>) {
    let (a, b) = UnixStream::pair().expect("socket pair should be creatable");
    let server = Mux::with_config(a, config).expect("server mux should start");
    let client = Mux::with_config(b, config).expect("client mux should start");
    (Arc::new(server), Arc::new(client))
}

/// Accept on `server` while `client` opens; returns (accepted, opened).
fn establish(server: &Arc<Mux>, client: &Mux) -> (Channel, Channel) {
    let acceptor = {
        let server = Arc::clone(server);
        thread::spawn(move || server.accept().expect("accept should succeed"))
    };
    let opened = client.open().expect("open should succeed");
    let accepted = acceptor.join().expect("acceptor should not panic");
    (accepted, opened)
}

#[test]
fn ping_reaches_the_accepting_side() {
    let (server, client) = connected_pair(MuxConfig::default());
    let (mut accepted, mut opened) = establish(&server, &client);

    opened.write_all(b"ping").expect("write should succeed");

    let mut buf = [0u8; 4];
    accepted.read_exact(&mut buf).expect("read should succeed");
    assert_eq!(&buf, b"ping");
}

#[test]
fn both_sides_agree_on_channel_ids() {
    let (server, client) = connected_pair(MuxConfig::default());
    for expected in 0..5u16 {
        let (accepted, opened) = establish(&server, &client);
        assert_eq!(accepted.id(), expected);
        assert_eq!(opened.id(), expected);
    }
}

#[test]
fn either_side_may_open() {
    let (left, right) = connected_pair(MuxConfig::default());
    let (mut from_left, mut to_right) = establish(&left, &right);
    let (mut from_right, mut to_left) = establish(&right, &left);

    to_right.write_all(b"->").expect("write should succeed");
    to_left.write_all(b"<-").expect("write should succeed");

    let mut buf = [0u8; 2];
    from_left.read_exact(&mut buf).expect("read should succeed");
    assert_eq!(&buf, b"->");
    from_right.read_exact(&mut buf).expect("read should succeed");
    assert_eq!(&buf, b"<-");
}

#[test]
fn concurrent_opens_get_distinct_matching_ids() {
    let (server, client) = connected_pair(MuxConfig::default());
    let count = 8;

    let acceptor = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            (0..count)
                .map(|_| server.accept().expect("accept should succeed"))
                .collect::<Vec<_>>()
        })
    };
    let openers: Vec<_> = (0..count)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || client.open().expect("open should succeed"))
        })
        .collect();

    let mut opened: Vec<Channel> = openers
        .into_iter()
        .map(|h| h.join().expect("opener should not panic"))
        .collect();
    let accepted = acceptor.join().expect("acceptor should not panic");

    let mut opened_ids: Vec<u16> = opened.iter().map(Channel::id).collect();
    opened_ids.sort_unstable();
    let accepted_ids: Vec<u16> = accepted.iter().map(Channel::id).collect();
    assert_eq!(accepted_ids, (0..count as u16).collect::<Vec<_>>());
    assert_eq!(opened_ids, accepted_ids);

    // Each opened channel talks to the accepted channel with the same id.
    for channel in &mut opened {
        let tag = [channel.id() as u8];
        channel.write_all(&tag).expect("write should succeed");
    }
    for mut channel in accepted {
        let mut buf = [0u8; 1];
        channel.read_exact(&mut buf).expect("read should succeed");
        assert_eq!(buf[0], channel.id() as u8);
    }
}

#[test]
fn bidirectional_traffic_stays_ordered() {
    let (server, client) = connected_pair(MuxConfig::default());
    let (accepted, opened) = establish(&server, &client);
    let opened = Arc::new(opened);
    let total = 20_000;

    let echo = thread::spawn(move || {
        let mut buf = [0u8; 512];
        let mut echoed = 0;
        while echoed < total {
            let n = (&accepted).read(&mut buf).expect("read should succeed");
            (&accepted)
                .write_all(&buf[..n])
                .expect("echo write should succeed");
            echoed += n;
        }
    });

    let data: Vec<u8> = (0..total as u32).map(|i| (i % 253) as u8).collect();
    let writer = {
        let opened = Arc::clone(&opened);
        let data = data.clone();
        thread::spawn(move || {
            for chunk in data.chunks(777) {
                (&*opened).write_all(chunk).expect("write should succeed");
            }
        })
    };

    let mut echoed = vec![0u8; data.len()];
    (&*opened)
        .read_exact(&mut echoed)
        .expect("echo read should succeed");
    writer.join().expect("writer should not panic");
    echo.join().expect("echo should not panic");
    assert_eq!(echoed, data);
}

#[test]
fn large_transfer_through_small_buffers() {
    let config = MuxConfig {
        send_buffer_size: 64,
        recv_buffer_size: 32,
        max_frame_size: 16,
    };
    let (server, client) = connected_pair(config);
    let (mut accepted, mut opened) = establish(&server, &client);

    let data: Vec<u8> = (0..100_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let writer = {
        let data = data.clone();
        thread::spawn(move || {
            opened.write_all(&data).expect("write should succeed");
            opened
        })
    };

    let mut received = vec![0u8; data.len()];
    accepted
        .read_exact(&mut received)
        .expect("read should succeed");
    writer.join().expect("writer should not panic");
    assert_eq!(received, data);
}

#[test]
fn independent_channels_do_not_mix() {
    let (server, client) = connected_pair(MuxConfig::default());
    let pairs: Vec<(Channel, Channel)> = (0..4).map(|_| establish(&server, &client)).collect();

    for (_, opened) in &pairs {
        let fill = vec![opened.id() as u8; 1500];
        (&*opened).write_all(&fill).expect("write should succeed");
    }
    for (accepted, _) in &pairs {
        let mut buf = vec![0u8; 1500];
        (&*accepted)
            .read_exact(&mut buf)
            .expect("read should succeed");
        assert!(buf.iter().all(|&b| b == accepted.id() as u8));
    }
}

#[test]
fn close_fails_pending_accept() {
    let (server, _client) = connected_pair(MuxConfig::default());
    let acceptor = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.accept())
    };
    thread::sleep(Duration::from_millis(20));
    server.close();
    let result = acceptor.join().expect("acceptor should not panic");
    assert!(matches!(result, Err(MuxError::Closed)));
}

#[test]
fn peer_going_away_fails_open_and_reads() {
    let (server, client) = connected_pair(MuxConfig::default());
    let (_accepted, opened) = establish(&server, &client);

    server.close();

    let mut buf = [0u8; 8];
    let err = (&opened).read(&mut buf).expect_err("read should fail");
    assert_eq!(err.kind(), ErrorKind::ConnectionAborted);
    assert!(matches!(client.open(), Err(MuxError::Closed)));
    assert!(client.is_closed());
}
