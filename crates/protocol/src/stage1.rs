//! USBIP stage-1: device discovery and attach
//!
//! Stage-1 is the operational sub-protocol a USBIP host speaks before any
//! URB traffic: it lists exported devices and imports one of them. All
//! integer fields are big-endian. The server exports exactly one device
//! with one interface, so the response bodies here are fixed-shape.

use crate::error::{ProtocolError, Result};

/// USBIP protocol version carried in every stage-1 header (0x0111)
pub const USBIP_VERSION: u16 = 273;

/// Stage-1 header length: u16 version + u16 command + u32 status
pub const STAGE1_HEADER_LEN: usize = 8;

/// Request/reply command id: retrieve the exported device list
pub const CMD_DEVICE_LIST: u8 = 0x02;
/// Request/reply command id: import (attach) a device by bus id
pub const CMD_DEVICE_ATTACH: u8 = 0x03;

/// Fixed width of the sysfs path field in a device record
pub const PATH_LEN: usize = 256;
/// Fixed width of the bus id field in a device record and attach request
pub const BUSID_LEN: usize = 32;
/// Encoded size of one exported-device record
pub const DEVICE_RECORD_LEN: usize = 312;
/// Encoded size of one interface record
pub const INTERFACE_RECORD_LEN: usize = 4;

/// Stage-1 message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage1Header {
    pub version: u16,
    pub command: u16,
    pub status: u32,
}

impl Stage1Header {
    /// Build a success reply header for the given command
    pub fn reply(command: u8) -> Self {
        Self {
            version: USBIP_VERSION,
            command: u16::from(command),
            status: 0,
        }
    }

    pub fn encode(&self) -> [u8; STAGE1_HEADER_LEN] {
        let mut buf = [0u8; STAGE1_HEADER_LEN];
        buf[0..2].copy_from_slice(&self.version.to_be_bytes());
        buf[2..4].copy_from_slice(&self.command.to_be_bytes());
        buf[4..8].copy_from_slice(&self.status.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < STAGE1_HEADER_LEN {
            return Err(ProtocolError::HeaderTooShort {
                needed: STAGE1_HEADER_LEN,
                available: buf.len(),
            });
        }
        Ok(Self {
            version: u16::from_be_bytes([buf[0], buf[1]]),
            command: u16::from_be_bytes([buf[2], buf[3]]),
            status: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// Extract the stage-1 command id from a request buffer
///
/// Only the low 8 bits of the command field discriminate stage-1 requests;
/// the high bits carry the request/reply direction flag, which the server
/// does not need.
pub fn read_stage1_command(buf: &[u8]) -> Result<u8> {
    let header = Stage1Header::decode(buf)?;
    Ok((header.command & 0xFF) as u8)
}

/// Encode the device-list response count field (always 1 for this server)
pub fn encode_device_count(count: u32) -> [u8; 4] {
    count.to_be_bytes()
}

/// One exported-device record as seen by a stage-1 client
///
/// Mirrors the layout the USBIP host driver expects: fixed-width NUL-padded
/// path/busid strings followed by bus topology, descriptor ids and
/// configuration counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub path: &'static str,
    pub busid: &'static str,
    pub busnum: u32,
    pub devnum: u32,
    pub speed: u32,
    pub id_vendor: u16,
    pub id_product: u16,
    pub bcd_device: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub configuration_value: u8,
    pub num_configurations: u8,
    pub num_interfaces: u8,
}

impl DeviceRecord {
    pub fn encode(&self) -> [u8; DEVICE_RECORD_LEN] {
        let mut buf = [0u8; DEVICE_RECORD_LEN];
        write_padded(&mut buf[0..PATH_LEN], self.path);
        write_padded(&mut buf[PATH_LEN..PATH_LEN + BUSID_LEN], self.busid);
        buf[288..292].copy_from_slice(&self.busnum.to_be_bytes());
        buf[292..296].copy_from_slice(&self.devnum.to_be_bytes());
        buf[296..300].copy_from_slice(&self.speed.to_be_bytes());
        buf[300..302].copy_from_slice(&self.id_vendor.to_be_bytes());
        buf[302..304].copy_from_slice(&self.id_product.to_be_bytes());
        buf[304..306].copy_from_slice(&self.bcd_device.to_be_bytes());
        buf[306] = self.device_class;
        buf[307] = self.device_subclass;
        buf[308] = self.device_protocol;
        buf[309] = self.configuration_value;
        buf[310] = self.num_configurations;
        buf[311] = self.num_interfaces;
        buf
    }
}

/// One interface record trailing a device record in the device-list reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
}

impl InterfaceRecord {
    pub fn encode(&self) -> [u8; INTERFACE_RECORD_LEN] {
        // The fourth byte is alignment padding and must be zero.
        [self.class, self.subclass, self.protocol, 0]
    }
}

fn write_padded(dst: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
}
