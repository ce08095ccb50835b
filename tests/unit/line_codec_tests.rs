//! Unit tests for the lossy newline codec used on agent stdout.
//!
//! Covers:
//! - complete, batched, and partial lines
//! - `\r` retained as line content
//! - invalid UTF-8 replaced instead of failing the stream
//! - trailing unterminated line yielded at EOF
//! - chunking never changes the decoded line sequence

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use agent_relay::process::codec::LineCodec;

/// Decode everything in `chunks`, feeding them one at a time, then signal EOF.
fn decode_chunks(chunks: &[&[u8]]) -> Vec<String> {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    let mut lines = Vec::new();

    for chunk in chunks {
        buf.extend_from_slice(chunk);
        while let Some(line) = codec.decode(&mut buf).expect("decode never fails") {
            lines.push(line);
        }
    }
    while let Some(line) = codec.decode_eof(&mut buf).expect("decode_eof never fails") {
        lines.push(line);
    }
    lines
}

#[test]
fn single_line_is_returned_without_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("{\"type\":\"system\"}\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("{\"type\":\"system\"}"));
    assert!(buf.is_empty(), "newline must be consumed with the line");
}

#[test]
fn batched_lines_are_decoded_one_by_one() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("one\ntwo\n");

    assert_eq!(codec.decode(&mut buf).expect("first").as_deref(), Some("one"));
    assert_eq!(codec.decode(&mut buf).expect("second").as_deref(), Some("two"));
    assert_eq!(codec.decode(&mut buf).expect("third"), None);
}

#[test]
fn partial_line_waits_for_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("{\"type\":");

    assert_eq!(codec.decode(&mut buf).expect("partial"), None);

    buf.extend_from_slice(b"\"result\"}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("complete").as_deref(),
        Some("{\"type\":\"result\"}")
    );
}

#[test]
fn carriage_return_is_kept() {
    assert_eq!(decode_chunks(&[b"a\r\nb\n"]), vec!["a\r", "b"]);
}

#[test]
fn empty_lines_are_preserved() {
    assert_eq!(decode_chunks(&[b"a\n\nb\n"]), vec!["a", "", "b"]);
}

#[test]
fn invalid_utf8_is_replaced() {
    let lines = decode_chunks(&[b"ok\xff\n"]);
    assert_eq!(lines, vec!["ok\u{fffd}"]);
}

#[test]
fn trailing_partial_line_is_yielded_at_eof() {
    assert_eq!(decode_chunks(&[b"first\nsecond"]), vec!["first", "second"]);
}

#[test]
fn eof_on_empty_buffer_yields_nothing() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    assert_eq!(codec.decode_eof(&mut buf).expect("decode_eof"), None);
    assert!(decode_chunks(&[]).is_empty());
}

#[test]
fn chunk_boundaries_do_not_change_the_lines() {
    let whole = decode_chunks(&[b"alpha\nbeta\ngamma"]);
    let split = decode_chunks(&[b"al", b"pha\nbe", b"", b"ta\ng", b"amma"]);
    let bytewise: Vec<&[u8]> = b"alpha\nbeta\ngamma".chunks(1).collect();

    assert_eq!(whole, vec!["alpha", "beta", "gamma"]);
    assert_eq!(split, whole);
    assert_eq!(decode_chunks(&bytewise), whole);
}
