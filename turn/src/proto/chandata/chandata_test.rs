use super::*;

#[test]
fn test_encode_known_frame() {
    // channel 0x4001, 4-byte payload: the S4 wire image
    let mut frame = ChannelData::new(ChannelNumber(0x4001), vec![0xde, 0xad, 0xbe, 0xef]);
    frame.encode();
    assert_eq!(
        frame.raw,
        [0x40, 0x01, 0x00, 0x04, 0xde, 0xad, 0xbe, 0xef]
    );
}

#[test]
fn test_decode_known_frame() {
    let mut frame = ChannelData {
        raw: vec![0x40, 0x01, 0x00, 0x04, 0xde, 0xad, 0xbe, 0xef],
        ..Default::default()
    };
    frame.decode().unwrap();
    assert_eq!(frame.number, ChannelNumber(0x4001));
    assert_eq!(frame.data, vec![0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_encode_pads_to_four() {
    let mut frame = ChannelData::new(ChannelNumber(0x4abc), b"12345".to_vec());
    frame.encode();
    assert_eq!(frame.raw.len(), CHANNEL_DATA_HEADER_SIZE + 8);
    assert_eq!(&frame.raw[CHANNEL_DATA_HEADER_SIZE + 5..], &[0, 0, 0]);
    // declared length stays unpadded
    assert_eq!(u16::from_be_bytes([frame.raw[2], frame.raw[3]]), 5);
}

#[test]
fn test_decode_rejects_reserved_channel() {
    let mut frame = ChannelData {
        raw: vec![0x3f, 0xff, 0x00, 0x00],
        ..Default::default()
    };
    assert_eq!(frame.decode().unwrap_err(), Error::InvalidChannelNumber);
}

#[test]
fn test_decode_rejects_short_payload() {
    let mut frame = ChannelData {
        raw: vec![0x40, 0x01, 0x00, 0x09, 0x01, 0x02],
        ..Default::default()
    };
    assert_eq!(frame.decode().unwrap_err(), Error::BadChannelDataLength);
}

#[test]
fn test_is_channel_data() {
    assert!(is_channel_data(&[0x40, 0x00, 0x00, 0x00]));
    assert!(is_channel_data(&[0x7f, 0xff, 0x00, 0x00]));
    assert!(!is_channel_data(&[0x00, 0x01, 0x00, 0x00])); // STUN
    assert!(!is_channel_data(&[0x80, 0x01, 0x00, 0x00]));
    assert!(!is_channel_data(&[0x40, 0x01]));
}

#[test]
fn test_read_stream_insufficient_never_consumes() {
    let mut frame = ChannelData::new(ChannelNumber(0x4001), b"abcdef".to_vec());
    frame.encode();
    for cut in 1..frame.raw.len() {
        assert!(
            matches!(
                ChannelData::read_stream(&frame.raw[..cut]),
                ChanParse::Insufficient
            ),
            "cut at {cut}"
        );
    }
}

#[test]
fn test_read_stream_round_trip() {
    let mut frame = ChannelData::new(ChannelNumber(0x4e0f), b"stream me".to_vec());
    frame.encode();
    match ChannelData::read_stream(&frame.raw) {
        ChanParse::Frame {
            number,
            data,
            consumed,
        } => {
            assert_eq!(number, ChannelNumber(0x4e0f));
            assert_eq!(data, b"stream me");
            assert_eq!(consumed, frame.raw.len());
        }
        other => panic!("expected frame, got {other:?}"),
    }
}
