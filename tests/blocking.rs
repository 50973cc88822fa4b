//! End-to-end session through the blocking facade, against a scripted
//! server on a plain std TCP listener.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use stomp_mq::{blocking, ConnectConfig};

fn split_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Some(pos) = bytes.windows(2).position(|w| w == b"\x00\n") {
        frames.push(bytes[..pos].to_vec());
        bytes = &bytes[pos + 2..];
    }
    assert!(bytes.is_empty(), "trailing bytes: {bytes:?}");
    frames
}

#[test]
fn blocking_session_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        sock.write_all(
            b"CONNECTED\n\n\x00\n\
              RECEIPT\nreceipt-id: receipt-2\n\n\x00\n\
              MESSAGE\nmessage-id: m1\n\nping\x00\n",
        )
        .unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).unwrap();
        buf
    });

    let config = ConnectConfig::with_credentials(Some("u"), Some("p"));
    let mut conn = blocking::Connection::connect(addr.as_str(), config).unwrap();
    conn.send("q1", &[], b"hi", None).unwrap();
    let msg = conn.receive_msg().unwrap();
    assert_eq!(msg.id, "m1");
    assert_eq!(msg.body, b"ping");
    conn.disconnect().unwrap();
    assert!(conn.is_closed());

    let frames = split_frames(&server.join().unwrap());
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], b"CONNECT\nlogin: u\npasscode: p\n\n");
    assert_eq!(
        frames[1],
        b"SEND\nreceipt: receipt-2\ncontent-length: 2\ndestination: q1\npersistent: true\n\nhi"
    );
    assert_eq!(frames[2], b"DISCONNECT\n\n");
}

#[test]
fn blocking_transactions_track_state() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        sock.write_all(
            b"CONNECTED\n\n\x00\n\
              RECEIPT\nreceipt-id: receipt-2\n\n\x00\n\
              RECEIPT\nreceipt-id: receipt-3\n\n\x00\n",
        )
        .unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).unwrap();
        buf
    });

    let mut conn = blocking::Connection::connect(addr.as_str(), ConnectConfig::default()).unwrap();
    let tx = conn.transaction_begin().unwrap();
    assert_eq!(conn.transactions(), vec![tx.clone()]);
    conn.transaction_commit(&tx).unwrap();
    assert!(conn.transactions().is_empty());
    conn.disconnect().unwrap();
    server.join().unwrap();
}
