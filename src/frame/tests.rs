use crate::{ExtendedId, Frame, Id, StandardId};

use super::Data;

#[test]
fn data_greater_remote() {
    let id = Id::Standard(StandardId::new(0).unwrap());

    let data_frame = Frame::new_data(id, Data::empty());
    let remote_frame = Frame::new_remote(id, 0).unwrap();
    assert!(data_frame.is_data_frame());
    assert!(remote_frame.is_remote_frame());

    assert!(data_frame.priority() > remote_frame.priority());
}

#[test]
fn lower_ids_win_arbitration() {
    let zero = Frame::new_data(StandardId::new(0).unwrap(), Data::empty());
    let one = Frame::new_data(StandardId::new(1).unwrap(), Data::empty());
    assert!(zero.is_standard());
    assert!(!zero.is_extended());
    assert!(one.is_standard());
    assert!(!one.is_extended());
    assert!(zero.priority() > one.priority());

    // Standard IDs have priority over Extended IDs if the Base ID matches.
    let ext_one = Frame::new_data(
        ExtendedId::new(0b00000000001_000000000000000000).unwrap(),
        Data::empty(),
    );
    assert!(!ext_one.is_standard());
    assert!(ext_one.is_extended());
    assert!(one.priority() > ext_one.priority());
    assert!(zero.priority() > ext_one.priority());

    // Ext. ID with Base ID 0 has priority over Standard ID 1.
    let ext_zero = Frame::new_data(
        ExtendedId::new(0b00000000000_100000000000000000).unwrap(),
        Data::empty(),
    );
    assert!(!ext_zero.is_standard());
    assert!(ext_zero.is_extended());
    assert!(one.priority() < ext_zero.priority());
    // ...but not over Standard ID 0.
    assert!(zero.priority() > ext_zero.priority());
}

#[test]
fn data_neq_remote() {
    let id = Id::Standard(StandardId::new(0).unwrap());

    let data_frame = Frame::new_data(id, Data::empty());
    let remote_frame = Frame::new_remote(id, 0).unwrap();

    assert_ne!(data_frame, remote_frame);
}

#[test]
fn equality_is_bit_exact() {
    let mut remote1 = Frame::new_remote(StandardId::MAX, 7).unwrap();
    let mut remote2 = Frame::new_remote(StandardId::MAX, 7).unwrap();
    assert_eq!(remote1, remote2);

    // All fields take part in the comparison, payload bytes included.
    remote1.data.bytes = [0xAA; 8];
    remote2.data.bytes = [0x55; 8];
    assert_ne!(remote1, remote2);

    let a = Frame::new_data(StandardId::new(5).unwrap(), [1, 2, 3]);
    let b = Frame::new_data(StandardId::new(5).unwrap(), [1, 2, 3]);
    let c = Frame::new_data(StandardId::new(5).unwrap(), [1, 2, 4]);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn dlc_is_bounded() {
    assert!(Frame::new_remote(StandardId::ZERO, 9).is_none());
    assert!(Data::new(&[0; 9]).is_none());
    assert_eq!(Data::new(&[0; 8]).unwrap().len, 8);
}

#[test]
fn payload_views_agree() {
    let data = Data::new(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]).unwrap();
    let words = data.as_u32x2();
    assert_eq!(
        data.as_u64(),
        u64::from(words[0]) | u64::from(words[1]) << 32
    );
    let halves = data.as_u16x4();
    assert_eq!(u32::from(halves[0]) | u32::from(halves[1]) << 16, words[0]);
    assert_eq!(&data[..], &data.as_u8x8()[..]);
}

#[test]
fn mailbox_words_round_trip() {
    let frame = Frame::new_data(
        ExtendedId::new(0x1234_5678).unwrap(),
        [0xDE, 0xAD, 0xBE, 0xEF],
    );
    let (low, high) = frame.payload_words();
    let rebuilt = Frame::from_mailbox_words(frame.id.bits(), u32::from(frame.dlc()), low, high);
    assert_eq!(frame, rebuilt);
}
