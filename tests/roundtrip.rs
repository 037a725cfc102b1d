//! End-to-end marshal/unmarshal scenarios against whole messages.

use dbus_codec::signature::parse;
use dbus_codec::value::{Value, Variant};
use dbus_codec::wire::marshal::marshal_message;
use dbus_codec::wire::unmarshal::Unmarshaller;
use dbus_codec::{verify, MessageBuilder, MessageType};
use std::convert::TryInto;

fn tap(mut b: MessageBuilder, f: impl FnOnce(&mut MessageBuilder)) -> MessageBuilder {
    f(&mut b);
    b
}

#[test]
fn ping_method_call_round_trips() {
    let msg = tap(MessageBuilder::new(MessageType::MethodCall), |b| {
        b.destination = Some("org.freedesktop.DBus".into());
        b.path = Some("/org/freedesktop/DBus".into());
        b.interface = Some("org.freedesktop.DBus.Peer".into());
        b.member = Some("Ping".into());
        b.serial = 1;
    })
    .build()
    .unwrap();

    let bytes = marshal_message(&msg, false).unwrap();
    assert_eq!(&bytes[0..12], b"l\x01\x00\x01\x00\x00\x00\x00\x01\x00\x00\x00");
    assert_eq!(bytes.len() % 8, 0);

    let mut un = Unmarshaller::new();
    un.feed(&bytes);
    let decoded = un.try_next().unwrap().unwrap();
    assert_eq!(decoded.destination.as_deref(), Some("org.freedesktop.DBus"));
    assert_eq!(decoded.path.as_deref(), Some("/org/freedesktop/DBus"));
    assert_eq!(decoded.interface.as_deref(), Some("org.freedesktop.DBus.Peer"));
    assert_eq!(decoded.member.as_deref(), Some("Ping"));
    assert_eq!(decoded.serial, 1);
    assert!(decoded.body.is_empty());
}

#[test]
fn signal_with_one_string_round_trips() {
    let sig = parse("s").unwrap();
    let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
        b.path = Some("/test/path".into());
        b.interface = Some("test.interface".into());
        b.member = Some("SomeSignal".into());
        b.signature = sig;
        b.body = vec![Value::String("hello".into())];
        b.serial = 5;
    })
    .build()
    .unwrap();

    let bytes = marshal_message(&msg, false).unwrap();
    let body = dbus_codec::wire::marshal_body(&msg.signature, &msg.body).unwrap();
    assert_eq!(body.len(), 10); // uint32 5 + "hello" + NUL

    let mut un = Unmarshaller::new();
    un.feed(&bytes);
    let decoded = un.try_next().unwrap().unwrap();
    assert_eq!(decoded.body, vec![Value::String("hello".into())]);
}

#[test]
fn signal_with_two_strings_round_trips() {
    let sig = parse("ss").unwrap();
    let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
        b.path = Some("/test/path".into());
        b.interface = Some("test.interface".into());
        b.member = Some("SomeSignal".into());
        b.signature = sig;
        b.body = vec![Value::String("hello".into()), Value::String("world".into())];
        b.serial = 6;
    })
    .build()
    .unwrap();

    let bytes = marshal_message(&msg, false).unwrap();
    let mut un = Unmarshaller::new();
    un.feed(&bytes);
    let decoded = un.try_next().unwrap().unwrap();
    assert_eq!(
        decoded.body,
        vec![Value::String("hello".into()), Value::String("world".into())]
    );
}

#[test]
fn ten_thousand_byte_array_round_trips_without_per_element_padding() {
    let sig = parse("ay").unwrap();
    let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
        b.path = Some("/test/path".into());
        b.interface = Some("test.interface".into());
        b.member = Some("Blob".into());
        b.signature = sig;
        b.body = vec![Value::ByteArray(vec![0u8; 10_000])];
        b.serial = 7;
    })
    .build()
    .unwrap();

    let body = dbus_codec::wire::marshal_body(&msg.signature, &msg.body).unwrap();
    assert_eq!(u32::from_le_bytes(body[0..4].try_into().unwrap()), 10_000);
    assert_eq!(body.len(), 4 + 10_000);

    let bytes = marshal_message(&msg, false).unwrap();
    let mut un = Unmarshaller::new();
    un.feed(&bytes);
    let decoded = un.try_next().unwrap().unwrap();
    assert_eq!(decoded.body, vec![Value::ByteArray(vec![0u8; 10_000])]);
}

/// A PropertiesChanged-shaped signal (`sa{sv}as`, trimmed here to `a{sv}` for
/// the body under test), fed to the unmarshaller one byte at a time to
/// exercise resumability across a dict-of-variants body.
#[test]
fn properties_changed_like_frame_resolves_byte_by_byte() {
    let sig = parse("a{sv}").unwrap();
    let rssi = Value::Variant(Variant::new(parse("n").unwrap(), Value::Int16(-0x59)));
    let body = vec![Value::Dict(vec![(Value::String("RSSI".into()), rssi)])];
    verify::verify(&sig, &body).unwrap();

    let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
        b.path = Some("/org/bluez/hci0/dev_AA_BB".into());
        b.interface = Some("org.freedesktop.DBus.Properties".into());
        b.member = Some("PropertiesChanged".into());
        b.signature = sig;
        b.body = body;
        b.serial = 9;
    })
    .build()
    .unwrap();

    let bytes = marshal_message(&msg, false).unwrap();
    let mut un = Unmarshaller::new();
    let mut decoded = None;
    for byte in &bytes {
        assert!(decoded.is_none());
        un.feed(std::slice::from_ref(byte));
        decoded = un.try_next().unwrap();
    }
    let decoded = decoded.unwrap();
    assert_eq!(decoded.interface.as_deref(), Some("org.freedesktop.DBus.Properties"));
    assert_eq!(decoded.member.as_deref(), Some("PropertiesChanged"));
    match &decoded.body[0] {
        Value::Dict(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].0, Value::String("RSSI".into()));
            match &entries[0].1 {
                Value::Variant(v) => assert_eq!(*v.value, Value::Int16(-0x59)),
                other => panic!("expected a variant, got {other:?}"),
            }
        }
        other => panic!("expected a dict, got {other:?}"),
    }
}

#[test]
fn nested_variant_dict_rejects_an_unwrapped_value() {
    let sig = parse("a{sa{sv}}").unwrap();
    let inner = Value::Dict(vec![("hidden".into(), Value::Boolean(true))]);
    let outer = Value::Dict(vec![(Value::String("props".into()), inner)]);
    let err = verify::verify(&sig, std::slice::from_ref(&outer)).unwrap_err();
    assert!(err.path.contains("value"));
}
