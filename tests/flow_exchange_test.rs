//! End-to-end exercises of the envelope codec through the public API

mod support;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flow_bridge::flow::{FlowRequest, FlowResponse};
use flow_bridge::keys::load_private_key;
use flow_bridge::{encrypt_response, BridgeError, EncryptedEnvelope, FlowCodec};
use serde_json::{json, Value};
use support::{private_key, ClientSealer, OTHER_PKCS8_PEM, PING_ENVELOPE, PING_REPLY, PKCS1_PEM, PKCS8_PEM};

#[test]
fn test_round_trip_recovers_payload_and_session() {
    let key = private_key();
    let sealer = ClientSealer::for_key(&key);
    let codec = FlowCodec::new(key);

    let payload = json!({
        "version": "3.0",
        "action": "data_exchange",
        "screen": "DELIVERY",
        "data": {"area": "yaba", "notes": "gate 2 \u{1F6AA}"},
        "flow_token": "tok-1"
    });
    let (decrypted, session): (Value, _) = codec.decrypt_request(&sealer.seal_json(&payload)).unwrap();

    assert_eq!(decrypted, payload);
    assert_eq!(session.request_iv(), &sealer.iv);
    assert_eq!(session.key_len(), 16);
}

#[test]
fn test_reference_vector_decrypts_and_replies() {
    let codec = FlowCodec::new(private_key());
    let envelope: EncryptedEnvelope = serde_json::from_str(PING_ENVELOPE).unwrap();

    let (request, session): (FlowRequest, _) = codec.decrypt_request(&envelope).unwrap();
    assert_eq!(request.action.as_deref(), Some("ping"));
    assert_eq!(request.version.as_deref(), Some("3.0"));

    let reply = encrypt_response(&FlowResponse::active(), session).unwrap();
    assert_eq!(reply, PING_REPLY.trim());
}

#[test]
fn test_ping_reply_opens_with_inverted_iv() {
    let key = private_key();
    let sealer = ClientSealer::for_key(&key);
    let codec = FlowCodec::new(key);

    let (request, session): (FlowRequest, _) = codec
        .decrypt_request(&sealer.seal(br#"{"version":"3.0","action":"ping"}"#))
        .unwrap();
    assert_eq!(request.action.as_deref(), Some("ping"));

    let reply = encrypt_response(&FlowResponse::active(), session).unwrap();
    let opened = sealer.open_reply(&reply).expect("reply opens with flipped IV");
    assert_eq!(opened, br#"{"version":"3.0","data":{"status":"active"}}"#);

    // Not openable with the request IV
    assert!(sealer.open_with_iv(&reply, &sealer.iv).is_none());
}

#[test]
fn test_same_session_material_gives_same_reply() {
    let key = private_key();
    let sealer = ClientSealer::for_key(&key);
    let codec = FlowCodec::new(key);
    let envelope = sealer.seal(br#"{"action":"ping"}"#);

    let (_, first): (Value, _) = codec.decrypt_request(&envelope).unwrap();
    let (_, second): (Value, _) = codec.decrypt_request(&envelope).unwrap();
    assert_eq!(first.response_iv(), second.response_iv());

    let a = encrypt_response(&FlowResponse::active(), first).unwrap();
    let b = encrypt_response(&FlowResponse::active(), second).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_key_loading_is_idempotent_across_encodings() {
    let sealer = ClientSealer::for_key(&private_key());
    let envelope = sealer.seal(br#"{"action":"INIT"}"#);

    let results: Vec<Value> = [PKCS8_PEM, PKCS8_PEM, PKCS1_PEM]
        .iter()
        .map(|pem| {
            let codec = FlowCodec::new(load_private_key(pem).unwrap());
            codec.decrypt_request::<Value>(&envelope).unwrap().0
        })
        .collect();

    assert!(results.iter().all(|r| r == &json!({"action": "INIT"})));
}

#[test]
fn test_wrong_private_key_fails() {
    let sealer = ClientSealer::for_key(&private_key());
    let envelope = sealer.seal(br#"{"action":"ping"}"#);

    let other = FlowCodec::new(load_private_key(OTHER_PKCS8_PEM).unwrap());
    let result = other.decrypt_request::<Value>(&envelope);
    assert!(matches!(result, Err(BridgeError::DecryptionFailed(_))));
}

#[test]
fn test_bit_flips_in_flow_data_are_detected() {
    let key = private_key();
    let sealer = ClientSealer::for_key(&key);
    let codec = FlowCodec::new(key);
    let envelope = sealer.seal(br#"{"action":"ping"}"#);
    let sealed = BASE64.decode(&envelope.encrypted_flow_data).unwrap();

    // One bit per byte, walking across ciphertext and tag
    for byte in 0..sealed.len() {
        let bit = byte % 8;
        let mut tampered = sealed.clone();
        tampered[byte] ^= 1 << bit;
        let envelope = EncryptedEnvelope {
            encrypted_flow_data: BASE64.encode(&tampered),
            ..envelope.clone()
        };
        assert!(
            matches!(
                codec.decrypt_request::<Value>(&envelope),
                Err(BridgeError::DecryptionFailed(_))
            ),
            "flip of bit {} in byte {} went unnoticed",
            bit,
            byte
        );
    }
}

#[test]
fn test_tampered_wrapped_key_fails() {
    let key = private_key();
    let sealer = ClientSealer::for_key(&key);
    let codec = FlowCodec::new(key);
    let envelope = sealer.seal(br#"{"action":"ping"}"#);

    let mut wrapped = BASE64.decode(&envelope.encrypted_aes_key).unwrap();
    wrapped[10] ^= 0x40;
    let envelope = EncryptedEnvelope {
        encrypted_aes_key: BASE64.encode(&wrapped),
        ..envelope
    };
    assert!(matches!(
        codec.decrypt_request::<Value>(&envelope),
        Err(BridgeError::DecryptionFailed(_))
    ));
}

#[test]
fn test_response_field_names_preserved() {
    let key = private_key();
    let sealer = ClientSealer::for_key(&key);
    let codec = FlowCodec::new(key);
    let (_, session): (Value, _) = codec.decrypt_request(&sealer.seal(b"{}")).unwrap();

    let response = json!({"version": "3.0", "data": {"delivery_areas": [], "errorMessage": "x", "Mixed_Case": 1}});
    let reply = encrypt_response(&response, session).unwrap();
    let opened: Value = serde_json::from_slice(&sealer.open_reply(&reply).unwrap()).unwrap();
    assert_eq!(opened, response);
}
