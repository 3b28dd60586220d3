//! Speed bands
//!
//! The controller takes speed as a whole acceleration/velocity table rather
//! than a scalar. Only a few captured tables are known, so a requested speed
//! fraction is quantized onto one of them.

use tvmkit_core::ControllerError;

/// Length of a speed table datagram
pub const SPEED_TABLE_LEN: usize = 0x44;

const PCT40: [u8; SPEED_TABLE_LEN] = [
    0x07, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
    0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
    0x04, 0x00, 0x00, 0x00, 0xa0, 0x0f, 0x00, 0x00, 0xa0, 0x0f, 0x00, 0x00, 0xa0, 0x0f, 0x00, 0x00,
    0xa0, 0x0f, 0x00, 0x00, 0xd0, 0x07, 0x00, 0x00, 0xd0, 0x07, 0x00, 0x00, 0xa0, 0x0f, 0x00, 0x00,
    0xa0, 0x0f, 0x00, 0x00,
];

const PCT50: [u8; SPEED_TABLE_LEN] = [
    0x07, 0x00, 0x04, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
    0x04, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
    0x04, 0x00, 0x00, 0x00, 0x70, 0x17, 0x00, 0x00, 0x70, 0x17, 0x00, 0x00, 0x70, 0x17, 0x00, 0x00,
    0x70, 0x17, 0x00, 0x00, 0xb8, 0x0b, 0x00, 0x00, 0xb8, 0x0b, 0x00, 0x00, 0x10, 0x27, 0x00, 0x00,
    0x10, 0x27, 0x00, 0x00,
];

const PCT80: [u8; SPEED_TABLE_LEN] = [
    0x07, 0x00, 0x09, 0x00, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00,
    0x05, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00,
    0x07, 0x00, 0x00, 0x00, 0xe0, 0x2e, 0x00, 0x00, 0xe0, 0x2e, 0x00, 0x00, 0xe0, 0x2e, 0x00, 0x00,
    0xe0, 0x2e, 0x00, 0x00, 0xc8, 0x32, 0x00, 0x00, 0xc8, 0x32, 0x00, 0x00, 0x98, 0xb7, 0x00, 0x00,
    0xb0, 0xb3, 0x00, 0x00,
];

/// One of the known speed tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedBand {
    /// 40%, the band the stock software homes with. Also the safe band.
    Pct40,
    /// 50%, the power-on default
    Pct50,
    /// 80%, the fastest captured table
    Pct80,
}

impl SpeedBand {
    /// Band used before homing and for anything below 40%
    pub const SAFE: SpeedBand = SpeedBand::Pct40;

    /// Quantize a speed fraction in `[0.0, 1.0]`
    pub fn for_speed(speed: f64) -> Result<Self, ControllerError> {
        if !(0.0..=1.0).contains(&speed) {
            return Err(ControllerError::invalid_argument(format!(
                "speed {} outside 0.0..=1.0",
                speed
            )));
        }
        Ok(if speed >= 0.8 {
            SpeedBand::Pct80
        } else if speed >= 0.5 {
            SpeedBand::Pct50
        } else {
            SpeedBand::Pct40
        })
    }

    /// The speed table datagram
    pub fn table(self) -> &'static [u8; SPEED_TABLE_LEN] {
        match self {
            SpeedBand::Pct40 => &PCT40,
            SpeedBand::Pct50 => &PCT50,
            SpeedBand::Pct80 => &PCT80,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_quantization() {
        assert_eq!(SpeedBand::for_speed(0.0).unwrap(), SpeedBand::Pct40);
        assert_eq!(SpeedBand::for_speed(0.3).unwrap(), SpeedBand::Pct40);
        assert_eq!(SpeedBand::for_speed(0.45).unwrap(), SpeedBand::Pct40);
        assert_eq!(SpeedBand::for_speed(0.5).unwrap(), SpeedBand::Pct50);
        assert_eq!(SpeedBand::for_speed(0.79).unwrap(), SpeedBand::Pct50);
        assert_eq!(SpeedBand::for_speed(0.8).unwrap(), SpeedBand::Pct80);
        assert_eq!(SpeedBand::for_speed(1.0).unwrap(), SpeedBand::Pct80);
    }

    #[test]
    fn test_out_of_range_speed() {
        assert!(SpeedBand::for_speed(-0.1).is_err());
        assert!(SpeedBand::for_speed(1.01).is_err());
        assert!(SpeedBand::for_speed(f64::NAN).is_err());
    }

    #[test]
    fn test_tables_are_speed_loads() {
        for band in [SpeedBand::Pct40, SpeedBand::Pct50, SpeedBand::Pct80] {
            let table = band.table();
            assert_eq!(table.len(), 0x44);
            assert_eq!(table[0], 0x07);
        }
        assert_eq!(SpeedBand::Pct40.table()[2], 0x03);
        assert_eq!(SpeedBand::Pct80.table()[2], 0x09);
    }
}
