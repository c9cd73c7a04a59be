pub struct Utils;

impl Utils {
    /// Big-endian 16-bit word at a byte offset.
    pub fn word_at(data: &[u8], pos: usize) -> u16 {
        ((data[pos] as u16) << 8) | data[pos + 1] as u16
    }

    /// Space-separated lowercase hex dump, as the inverter logs read.
    pub fn hex_string(bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return "<nodata>".to_string();
        }
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn round(value: f64, decimals: u32) -> f64 {
        let factor = 10f64.powi(decimals as i32);
        (value * factor).round() / factor
    }
}
