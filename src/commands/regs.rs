//! Register map listing

use flashraid_core::regs::{ControlBits, ControlView, RegField, UNMAPPED_READ_VALUE};

/// Print every mapped management register, then decode `control` if given
pub fn print_register_map(control: Option<u8>) {
    println!("Addr  Register         Reset");
    println!("----  ---------------  -----");
    for addr in RegField::mapped_addresses() {
        if let Some(field) = RegField::decode(addr) {
            println!("0x{:02X}  {:<15}  0x00", addr, field.to_string());
        }
    }
    println!(
        "Unmapped addresses read 0x{:02X} and ignore writes",
        UNMAPPED_READ_VALUE
    );

    if let Some(value) = control {
        let view = ControlView::decode(ControlBits::from_bits_retain(value));
        println!();
        println!("CONTROL = 0x{:02X}", value);
        println!("  share mode:     {}", on_off(view.share_mode));
        for (index, enabled) in view.range_enable.iter().enumerate() {
            println!("  range {} enable: {}", index, on_off(*enabled));
        }
        println!("  active host:    {}", view.active_host);
        if view.reserved != 0 {
            println!("  reserved bits:  0x{:02X} (stored, ignored)", view.reserved);
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
