//! Identity of the emulated debug-probe device
//!
//! The values a stage-1 client sees when it lists or imports the device.
//! They describe a single-configuration, single-interface vendor-class
//! probe and never change at runtime.

use protocol::stage1::{DeviceRecord, InterfaceRecord};

/// Vendor id of the emulated probe
pub const ID_VENDOR: u16 = 0xC251;
/// Product id of the emulated probe
pub const ID_PRODUCT: u16 = 0xF00A;
/// Device release number (bcdDevice)
pub const BCD_DEVICE: u16 = 0x0100;

/// Fixed sysfs path reported for the exported device
pub const DEVICE_PATH: &str = "/sys/devices/pci0000:00/0000:00:01.2/usb1/1-1";
/// Fixed bus id reported for the exported device
pub const BUS_ID: &str = "1-1";

/// Vendor-specific interface class triple (bulk command pipe)
pub const INTERFACE_CLASS: u8 = 0xFF;
pub const INTERFACE_SUBCLASS: u8 = 0x00;
pub const INTERFACE_PROTOCOL: u8 = 0x00;

/// The one device record this server ever exports
pub fn device_record() -> DeviceRecord {
    DeviceRecord {
        path: DEVICE_PATH,
        busid: BUS_ID,
        busnum: 1,
        devnum: 1,
        // usb_device_speed: 3 = high speed
        speed: 3,
        id_vendor: ID_VENDOR,
        id_product: ID_PRODUCT,
        bcd_device: BCD_DEVICE,
        device_class: 0x00,
        device_subclass: 0x00,
        device_protocol: 0x00,
        configuration_value: 1,
        num_configurations: 1,
        num_interfaces: 1,
    }
}

/// The interface record trailing the device record in devlist replies
pub fn interface_record() -> InterfaceRecord {
    InterfaceRecord {
        class: INTERFACE_CLASS,
        subclass: INTERFACE_SUBCLASS,
        protocol: INTERFACE_PROTOCOL,
    }
}
