//! Hardware encoder options and selection.
//!
//! The native backend can run on a specific GPU. Options are the two
//! sentinel ids plus one entry per DXGI hardware adapter, identified by the
//! adapter's 64-bit LUID rendered as two 8-hex-digit fields.

use tracing::debug;

/// Let the media pipeline pick hardware when available.
pub const HW_OPTION_AUTO: &str = "auto";

/// Force software encoding.
pub const HW_OPTION_SOFTWARE: &str = "software";

/// One selectable acceleration mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareEncoderOption {
    /// Stable id stored in the settings.
    pub id: String,

    /// Display label.
    pub label: String,

    /// Adapter name for LUID entries.
    pub adapter_name: Option<String>,
}

/// Parsed hardware selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareSelection {
    /// Hardware when available, otherwise software.
    Auto,

    /// Software only.
    Software,

    /// A specific adapter by LUID.
    Adapter { luid_high: u32, luid_low: u32 },
}

impl HardwareSelection {
    /// Parse an option id. Total: anything unrecognized becomes `Auto`.
    pub fn parse(id: &str) -> Self {
        let trimmed = id.trim();
        if trimmed.eq_ignore_ascii_case(HW_OPTION_AUTO) || trimmed.is_empty() {
            return Self::Auto;
        }
        if trimmed.eq_ignore_ascii_case(HW_OPTION_SOFTWARE) {
            return Self::Software;
        }
        match parse_luid_id(trimmed) {
            Some((luid_high, luid_low)) => Self::Adapter {
                luid_high,
                luid_low,
            },
            None => Self::Auto,
        }
    }

    /// The canonical id for this selection.
    pub fn id(&self) -> String {
        match self {
            Self::Auto => HW_OPTION_AUTO.to_string(),
            Self::Software => HW_OPTION_SOFTWARE.to_string(),
            Self::Adapter {
                luid_high,
                luid_low,
            } => luid_id(*luid_high, *luid_low),
        }
    }
}

/// Render an adapter LUID as the composite option id.
pub fn luid_id(luid_high: u32, luid_low: u32) -> String {
    format!("{luid_high:08x}:{luid_low:08x}")
}

/// Parse a composite LUID id in colon-separated or concatenated form.
pub fn parse_luid_id(id: &str) -> Option<(u32, u32)> {
    if let Some((high, low)) = id.split_once(':') {
        if high.is_empty() || low.is_empty() || high.len() > 8 || low.len() > 8 {
            return None;
        }
        let high = u32::from_str_radix(high, 16).ok()?;
        let low = u32::from_str_radix(low, 16).ok()?;
        return Some((high, low));
    }

    if id.len() == 16 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        let high = u32::from_str_radix(&id[..8], 16).ok()?;
        let low = u32::from_str_radix(&id[8..], 16).ok()?;
        return Some((high, low));
    }

    None
}

/// Normalize a hardware option id.
///
/// Total: the sentinel ids and any syntactically valid LUID id pass through
/// verbatim (whether or not the adapter is currently present); everything
/// else falls back to `auto`.
pub fn normalize_hardware_option(id: &str) -> String {
    let trimmed = id.trim();
    if trimmed.eq_ignore_ascii_case(HW_OPTION_AUTO) {
        return HW_OPTION_AUTO.to_string();
    }
    if trimmed.eq_ignore_ascii_case(HW_OPTION_SOFTWARE) {
        return HW_OPTION_SOFTWARE.to_string();
    }
    if parse_luid_id(trimmed).is_some() {
        return trimmed.to_string();
    }
    HW_OPTION_AUTO.to_string()
}

/// Enumerate the selectable acceleration modes.
///
/// Always includes `auto` and `software`; hardware adapters follow when the
/// DXGI enumeration finds any. Enumeration failure is treated the same as
/// finding none.
pub fn hardware_options() -> Vec<HardwareEncoderOption> {
    let mut options = vec![
        HardwareEncoderOption {
            id: HW_OPTION_AUTO.to_string(),
            label: "Automatic".to_string(),
            adapter_name: None,
        },
        HardwareEncoderOption {
            id: HW_OPTION_SOFTWARE.to_string(),
            label: "Software".to_string(),
            adapter_name: None,
        },
    ];

    for adapter in enumerate_adapters() {
        let id = luid_id(adapter.luid_high, adapter.luid_low);
        options.push(HardwareEncoderOption {
            label: format!("Hardware: {}", adapter.name),
            adapter_name: Some(adapter.name),
            id,
        });
    }

    options
}

/// A discovered hardware adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub luid_high: u32,
    pub luid_low: u32,
}

#[cfg(windows)]
fn enumerate_adapters() -> Vec<AdapterInfo> {
    match enumerate_adapters_dxgi() {
        Ok(adapters) => adapters,
        Err(e) => {
            debug!("DXGI adapter enumeration failed: {e}");
            Vec::new()
        }
    }
}

#[cfg(not(windows))]
fn enumerate_adapters() -> Vec<AdapterInfo> {
    debug!("Adapter enumeration unsupported on this platform");
    Vec::new()
}

#[cfg(windows)]
fn enumerate_adapters_dxgi() -> crate::EncoderResult<Vec<AdapterInfo>> {
    use windows::Win32::Graphics::Dxgi::{
        CreateDXGIFactory1, IDXGIFactory1, DXGI_ADAPTER_FLAG_SOFTWARE,
    };

    let factory: IDXGIFactory1 = unsafe { CreateDXGIFactory1()? };
    let mut adapters = Vec::new();

    for index in 0.. {
        let adapter = match unsafe { factory.EnumAdapters1(index) } {
            Ok(adapter) => adapter,
            Err(_) => break,
        };

        let desc = unsafe { adapter.GetDesc1()? };
        if (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0 {
            continue;
        }

        let len = desc
            .Description
            .iter()
            .position(|c| *c == 0)
            .unwrap_or(desc.Description.len());
        let name = String::from_utf16_lossy(&desc.Description[..len]);

        adapters.push(AdapterInfo {
            name,
            luid_high: desc.AdapterLuid.HighPart as u32,
            luid_low: desc.AdapterLuid.LowPart,
        });
    }

    debug!(count = adapters.len(), "Enumerated hardware adapters");
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_always_include_sentinels() {
        let options = hardware_options();
        assert!(options.len() >= 2);
        assert_eq!(options[0].id, HW_OPTION_AUTO);
        assert_eq!(options[1].id, HW_OPTION_SOFTWARE);
    }

    #[test]
    fn test_normalize_round_trips_enumerated_ids() {
        for option in hardware_options() {
            assert_eq!(normalize_hardware_option(&option.id), option.id);
        }
    }

    #[test]
    fn test_normalize_accepts_unknown_luids_verbatim() {
        assert_eq!(
            normalize_hardware_option("0000abcd:12345678"),
            "0000abcd:12345678"
        );
        assert_eq!(
            normalize_hardware_option("0000ABCD12345678"),
            "0000ABCD12345678"
        );
    }

    #[test]
    fn test_normalize_falls_back_to_auto() {
        assert_eq!(normalize_hardware_option("fastest"), HW_OPTION_AUTO);
        assert_eq!(normalize_hardware_option("12:34:56"), HW_OPTION_AUTO);
        assert_eq!(normalize_hardware_option("xyz:123"), HW_OPTION_AUTO);
        assert_eq!(normalize_hardware_option(""), HW_OPTION_AUTO);
    }

    #[test]
    fn test_parse_luid_forms() {
        assert_eq!(parse_luid_id("0000abcd:12345678"), Some((0xabcd, 0x12345678)));
        assert_eq!(parse_luid_id("abcd:678"), Some((0xabcd, 0x678)));
        assert_eq!(parse_luid_id("0000abcd12345678"), Some((0xabcd, 0x12345678)));
        assert_eq!(parse_luid_id("abcd12345678"), None);
        assert_eq!(parse_luid_id("nothex!eadbeef0"), None);
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!(HardwareSelection::parse("AUTO"), HardwareSelection::Auto);
        assert_eq!(
            HardwareSelection::parse(" software "),
            HardwareSelection::Software
        );
        assert_eq!(
            HardwareSelection::parse("0000abcd:12345678"),
            HardwareSelection::Adapter {
                luid_high: 0xabcd,
                luid_low: 0x12345678
            }
        );
        assert_eq!(HardwareSelection::parse("???"), HardwareSelection::Auto);
    }

    #[test]
    fn test_selection_id_round_trip() {
        let selection = HardwareSelection::Adapter {
            luid_high: 0xabcd,
            luid_low: 0x12345678,
        };
        assert_eq!(HardwareSelection::parse(&selection.id()), selection);
    }
}
