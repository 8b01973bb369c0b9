//! Process-portable analog/mixed-signal generators for a
//! ring-oscillator temperature sensor.
//!
//! The analog core (a NAND-gated inverter ring) is generated as
//! layout through [`ringosc`]; the digital wrapper is produced by
//! expanding Verilog templates through [`verilog`]. The two flows are
//! independent.
#![warn(missing_docs)]

use sky130pdk::Sky130Pdk;
use substrate::context::{Context, PdkContext};

pub mod ringosc;
pub mod tech;
pub mod verilog;

/// Returns a configured SKY130 context for the open-source PDK.
pub fn sky130_open_ctx() -> PdkContext<Sky130Pdk> {
    let pdk_root = std::env::var("SKY130_OPEN_PDK_ROOT")
        .expect("the SKY130_OPEN_PDK_ROOT environment variable must be set");
    Context::builder()
        .install(Sky130Pdk::open(pdk_root))
        .build()
        .with_pdk()
}
