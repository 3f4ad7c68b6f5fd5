//! Canonical names for performance-counter headers.
//!
//! Raw headers look like `\\HOST\Processor(_Total)\% Processor Time`; the
//! host prefix varies, so lookups match on a substring of the path.

use regex::Regex;

/// Fixed counters: raw path fragment -> canonical name. Order matters only
/// where one fragment could contain another.
const COUNTERS: &[(&str, &str)] = &[
    ("\\Processor(_Total)\\% Processor Time", "CPU(%)"),
    ("\\Processor(_Total)\\% Privileged Time", "CPUKernel(%)"),
    ("\\Processor(_Total)\\% User Time", "CPUUser(%)"),
    ("\\System\\Processor Queue Length", "CPUQueue"),
    ("\\Memory\\Available MBytes", "AvailableMem(MB)"),
    ("\\Memory\\% Committed Bytes In Use", "CommitUsage(%)"),
    ("\\Memory\\Committed Bytes", "Committed(Bytes)"),
    ("\\Memory\\Pages/sec", "Pages(/s)"),
    ("\\Paging File(_Total)\\% Usage", "SwapUsage(%)"),
];

/// Per-device disk counters: raw suffix -> (metric, unit).
const DISK_COUNTERS: &[(&str, &str, &str)] = &[
    ("% Disk Time", "DiskTime", "%"),
    ("Avg. Disk Queue Length", "DiskQueue", "Len"),
    ("Disk Read Bytes/sec", "DiskRead", "B/s"),
    ("Disk Write Bytes/sec", "DiskWrite", "B/s"),
];

/// Device token used by the collector for the all-devices aggregate.
const AGGREGATE_DEVICE: &str = "_Total";

pub struct HeaderMapper {
    disk: Regex,
}

impl HeaderMapper {
    pub fn new() -> Result<Self, regex::Error> {
        let suffixes: Vec<String> = DISK_COUNTERS
            .iter()
            .map(|(raw, _, _)| regex::escape(raw))
            .collect();
        // 1) device token inside the object parens
        // 2) counter suffix at the end of the path
        let disk = Regex::new(&format!(
            r"(?:LogicalDisk|PhysicalDisk)\(([^)]+)\)\\({})$",
            suffixes.join("|")
        ))?;
        Ok(Self { disk })
    }

    /// Canonical name for a trimmed raw header, or `None` if unrecognized.
    pub fn canonical(&self, header: &str) -> Option<String> {
        if let Some(caps) = self.disk.captures(header) {
            let device = caps.get(1)?.as_str();
            let suffix = caps.get(2)?.as_str();
            let (_, metric, unit) = DISK_COUNTERS.iter().find(|(raw, _, _)| *raw == suffix)?;
            return Some(disk_column_name(metric, device, unit));
        }

        COUNTERS
            .iter()
            .find(|(raw, _)| header.contains(raw))
            .map(|(_, name)| name.to_string())
    }
}

/// `<Metric>_<Device>(<Unit>)`, or `<Metric>(<Unit>)` for the aggregate.
pub fn disk_column_name(metric: &str, device: &str, unit: &str) -> String {
    let device = device.trim();
    if device == AGGREGATE_DEVICE {
        return format!("{}({})", metric, unit);
    }
    let token: String = device
        .split_whitespace()
        .map(|part| part.replace(':', ""))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if token.is_empty() {
        return format!("{}({})", metric, unit);
    }
    format!("{}_{}({})", metric, token, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapper() -> HeaderMapper {
        HeaderMapper::new().unwrap()
    }

    #[test]
    fn maps_fixed_counters_regardless_of_host_prefix() {
        let m = mapper();
        assert_eq!(
            m.canonical("\\\\WS-042\\Processor(_Total)\\% Processor Time").as_deref(),
            Some("CPU(%)")
        );
        assert_eq!(
            m.canonical("\\\\WS-042\\Memory\\Available MBytes").as_deref(),
            Some("AvailableMem(MB)")
        );
        assert_eq!(
            m.canonical("\\\\WS-042\\Memory\\% Committed Bytes In Use").as_deref(),
            Some("CommitUsage(%)")
        );
        assert_eq!(m.canonical("\\\\WS-042\\Foo\\Bar"), None);
    }

    #[test]
    fn synthesizes_per_device_disk_names() {
        let m = mapper();
        let cases = [
            ("\\\\H\\LogicalDisk(C:)\\% Disk Time", "DiskTime_C(%)"),
            ("\\\\H\\LogicalDisk(D:)\\Avg. Disk Queue Length", "DiskQueue_D(Len)"),
            ("\\\\H\\PhysicalDisk(0 C:)\\Disk Read Bytes/sec", "DiskRead_0_C(B/s)"),
            ("\\\\H\\LogicalDisk(E:)\\Disk Write Bytes/sec", "DiskWrite_E(B/s)"),
        ];
        let shape = Regex::new(r"^[A-Za-z]+_[A-Za-z0-9_]+\([^)]+\)$").unwrap();
        for (raw, want) in cases {
            let got = m.canonical(raw).unwrap();
            assert_eq!(got, want);
            assert!(shape.is_match(&got), "{} does not match the per-device shape", got);
        }
    }

    #[test]
    fn aggregate_device_uses_unsuffixed_name() {
        let m = mapper();
        assert_eq!(
            m.canonical("\\\\H\\PhysicalDisk(_Total)\\% Disk Time").as_deref(),
            Some("DiskTime(%)")
        );
        assert_eq!(
            m.canonical("\\\\H\\LogicalDisk(_Total)\\Disk Write Bytes/sec").as_deref(),
            Some("DiskWrite(B/s)")
        );
    }
}
