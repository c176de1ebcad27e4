//! CRC-16 used by the cartridge header and banner
//!
//! Reflected polynomial 0xA001 with an initial value of 0xFFFF
//! (CRC-16/MODBUS).

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC16_TABLE: [u16; 256] = build_table();

/// Compute the CRC-16 of `data`
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF_u16, |crc, &byte| {
        let idx = (crc ^ byte as u16) & 0xFF;
        (crc >> 8) ^ CRC16_TABLE[idx as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_table_matches_known_entries() {
        assert_eq!(CRC16_TABLE[0], 0x0000);
        assert_eq!(CRC16_TABLE[1], 0xC0C1);
        assert_eq!(CRC16_TABLE[0x80], 0xA001);
        assert_eq!(CRC16_TABLE[0xFF], 0x4040);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_single_byte_flip_changes_crc() {
        let mut data = vec![0x5Au8; 64];
        let before = crc16(&data);
        data[17] ^= 0x01;
        assert_ne!(before, crc16(&data));
    }
}
