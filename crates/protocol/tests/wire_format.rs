//! Wire-format conformance tests
//!
//! Byte-exact checks of the stage-1 and stage-2 encodings against the
//! sizes and orderings the USBIP host driver expects.
//!
//! Run with: `cargo test -p protocol --test wire_format`

use protocol::stage1::{
    self, CMD_DEVICE_LIST, DEVICE_RECORD_LEN, DeviceRecord, INTERFACE_RECORD_LEN, InterfaceRecord,
    STAGE1_HEADER_LEN, Stage1Header,
};
use protocol::stage2::{
    self, CMD_SUBMIT, DIR_IN, DIR_OUT, SETUP_LEN, SubmitRequest, URB_HEADER_LEN, UrbBase,
    UrbHeader, UrbRequest,
};

fn test_device() -> DeviceRecord {
    DeviceRecord {
        path: "/sys/devices/pci0000:00/0000:00:01.2/usb1/1-1",
        busid: "1-1",
        busnum: 1,
        devnum: 1,
        speed: 3,
        id_vendor: 0xC251,
        id_product: 0xF00A,
        bcd_device: 0x0100,
        device_class: 0,
        device_subclass: 0,
        device_protocol: 0,
        configuration_value: 1,
        num_configurations: 1,
        num_interfaces: 1,
    }
}

#[test]
fn device_list_reply_section_sizes() {
    // The full devlist reply is: 8-byte header, 4-byte count, one 312-byte
    // device record, one 4-byte interface record, in that order.
    let header = Stage1Header::reply(CMD_DEVICE_LIST).encode();
    let count = stage1::encode_device_count(1);
    let device = test_device().encode();
    let iface = InterfaceRecord {
        class: 0xFF,
        subclass: 0,
        protocol: 0,
    }
    .encode();

    assert_eq!(header.len(), STAGE1_HEADER_LEN);
    assert_eq!(count, [0, 0, 0, 1]);
    assert_eq!(device.len(), DEVICE_RECORD_LEN);
    assert_eq!(iface.len(), INTERFACE_RECORD_LEN);

    // Header declares version 273 (0x0111), command 2, status 0.
    assert_eq!(&header, &[0x01, 0x11, 0x00, 0x02, 0, 0, 0, 0]);
}

#[test]
fn device_record_roundtrips_descriptor_fields() {
    let buf = test_device().encode();
    assert_eq!(u16::from_be_bytes([buf[300], buf[301]]), 0xC251);
    assert_eq!(u16::from_be_bytes([buf[302], buf[303]]), 0xF00A);
    assert_eq!(u16::from_be_bytes([buf[304], buf[305]]), 0x0100);
    assert_eq!(buf[306], 0); // class
    assert_eq!(u32::from_be_bytes([buf[296], buf[297], buf[298], buf[299]]), 3); // speed
}

#[test]
fn urb_header_roundtrip_every_field() {
    let header = UrbHeader {
        base: UrbBase {
            command: CMD_SUBMIT,
            seqnum: 0x0102_0304,
            devid: 0x0001_0002,
            direction: DIR_OUT,
            ep: 2,
        },
        request: UrbRequest::Submit(SubmitRequest {
            transfer_flags: 0x0000_0200,
            transfer_buffer_length: 512,
            start_frame: 5,
            number_of_packets: 6,
            interval: 7,
            setup: [1, 2, 3, 4, 5, 6, 7, 8],
        }),
    };
    let wire = header.encode();
    assert_eq!(wire.len(), URB_HEADER_LEN);
    let decoded = UrbHeader::decode(&wire).unwrap();
    assert_eq!(decoded, header);

    // Integer fields are swapped on the wire, the setup block is not.
    assert_eq!(&wire[4..8], &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(&wire[40..48], &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn submit_reply_reuses_request_context() {
    let base = UrbBase {
        command: CMD_SUBMIT,
        seqnum: 41,
        devid: 0x0001_0002,
        direction: DIR_IN,
        ep: 1,
    };
    let reply = stage2::encode_submit_reply(&base, 0, 17);
    let seq = u32::from_be_bytes([reply[4], reply[5], reply[6], reply[7]]);
    let dir = u32::from_be_bytes([reply[12], reply[13], reply[14], reply[15]]);
    assert_eq!(seq, 41);
    assert_eq!(dir, DIR_OUT);
}

#[test]
fn setup_block_is_never_swapped() {
    // Encode, decode, re-encode: the setup region must be stable under
    // both operations while surrounded by byte-swapped fields.
    let mut wire = [0u8; URB_HEADER_LEN];
    wire[0..4].copy_from_slice(&CMD_SUBMIT.to_be_bytes());
    for (i, b) in wire[40..48].iter_mut().enumerate() {
        *b = 0xA0 + i as u8;
    }
    let decoded = UrbHeader::decode(&wire).unwrap();
    let rewire = decoded.encode();
    assert_eq!(&rewire[40..48], &wire[40..48]);
    let UrbRequest::Submit(submit) = decoded.request else {
        panic!("expected submit");
    };
    assert_eq!(submit.setup.len(), SETUP_LEN);
    assert_eq!(submit.setup[0], 0xA0);
}
