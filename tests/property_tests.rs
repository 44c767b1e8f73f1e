#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Property-based coverage for the envelope and frame codec.

use bytes::BytesMut;
use proptest::prelude::*;
use remote_broker::protocol::{FrameCodec, FrameEvent, Message};
use tokio_util::codec::{Decoder, Encoder};

fn arb_kind() -> impl Strategy<Value = String> {
    "[a-z_]{1,16}"
}

fn arb_session_id() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[0-9a-f]{64}")
}

fn arb_data() -> impl Strategy<Value = serde_json::Map<String, serde_json::Value>> {
    proptest::collection::vec(("[a-z_]{1,10}", ".{0,40}"), 0..6).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::from(v)))
            .collect()
    })
}

fn arb_message() -> impl Strategy<Value = Message> {
    (arb_kind(), arb_session_id(), arb_data())
        .prop_map(|(kind, session_id, data)| Message::new(&kind, session_id, data))
}

proptest! {
    /// Any message survives encode/decode unchanged.
    #[test]
    fn prop_message_roundtrip(msg in arb_message()) {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();

        let event = codec.decode(&mut buf).unwrap();
        prop_assert_eq!(event, Some(FrameEvent::Message(msg)));
        prop_assert!(buf.is_empty());
    }

    /// A batch of messages decodes in order regardless of where the byte
    /// stream is split.
    #[test]
    fn prop_chunking_preserves_order(
        msgs in proptest::collection::vec(arb_message(), 1..5),
        chunk in 1usize..64,
    ) {
        let mut codec = FrameCodec::default();
        let mut wire = BytesMut::new();
        for msg in &msgs {
            codec.encode(msg.clone(), &mut wire).unwrap();
        }

        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(event) = codec.decode(&mut buf).unwrap() {
                match event {
                    FrameEvent::Message(m) => decoded.push(m),
                    other => prop_assert!(false, "unexpected event: {:?}", other),
                }
            }
        }
        prop_assert_eq!(decoded, msgs);
    }

    /// Decoding a strict prefix of a frame yields nothing and consumes
    /// nothing.
    #[test]
    fn prop_incomplete_prefix_consumes_nothing(msg in arb_message(), cut_seed in 0usize..1000) {
        let mut codec = FrameCodec::default();
        let mut wire = BytesMut::new();
        codec.encode(msg, &mut wire).unwrap();

        let cut = cut_seed % wire.len();
        let mut buf = BytesMut::from(&wire[..cut]);
        prop_assert_eq!(codec.decode(&mut buf).unwrap(), None);
        prop_assert_eq!(buf.len(), cut);
    }

    /// Well-framed non-JSON bodies surface as `Malformed` in lenient mode,
    /// never as errors, and never desynchronize the stream.
    #[test]
    fn prop_garbage_body_reported_not_fatal(body in proptest::collection::vec(any::<u8>(), 1..128)) {
        prop_assume!(serde_json::from_slice::<serde_json::Value>(&body).is_err());

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&u32::try_from(body.len()).unwrap().to_be_bytes());
        buf.extend_from_slice(&body);

        let event = codec.decode(&mut buf).unwrap();
        prop_assert_eq!(event, Some(FrameEvent::Malformed { len: body.len() }));
        prop_assert!(buf.is_empty());
    }
}
