//! Best-effort resource quantity normalization
//!
//! Kubernetes reports quantities as strings with a mix of binary (`Ki`, `Mi`,
//! `Gi`, ...), decimal (`k`, `M`, `G`, ...) and fractional (`m`, `u`, `n`)
//! suffixes. Fleet statistics only need a single unit system, so everything is
//! folded into cores (cpu) or gigabytes (memory, storage).
//!
//! Parsing is lenient: anything that cannot be read yields `0.0`. These
//! functions feed aggregate statistics and must not be reused for values where
//! a silent zero would be wrong.

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Binary suffixes and their multiplier relative to one GiB
const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ki", 1.0 / (1024.0 * 1024.0)),
    ("Mi", 1.0 / 1024.0),
    ("Gi", 1.0),
    ("Ti", 1024.0),
    ("Pi", 1024.0 * 1024.0),
    ("Ei", 1024.0 * 1024.0 * 1024.0),
];

/// Decimal suffixes and their multiplier relative to one GB
const DECIMAL_SUFFIXES: [(&str, f64); 6] = [
    ("k", 1e-6),
    ("M", 1e-3),
    ("G", 1.0),
    ("T", 1e3),
    ("P", 1e6),
    ("E", 1e9),
];

/// Every suffix the parsers understand, two-character suffixes first so `Ei`
/// is not mistaken for `E`.
const KNOWN_SUFFIXES: [&str; 15] = [
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "k", "M", "G", "T", "P", "E", "m", "u", "n",
];

/// Split a quantity into its numeric prefix and unit suffix.
///
/// Returns `None` when the prefix is not a finite number.
fn split_quantity(quantity: &str) -> Option<(f64, &str)> {
    let quantity = quantity.trim();
    let (number, suffix) = KNOWN_SUFFIXES
        .iter()
        .find_map(|s| quantity.strip_suffix(s).map(|n| (n, *s)))
        .unwrap_or((quantity, ""));
    let value = number.parse::<f64>().ok()?;
    value.is_finite().then_some((value, suffix))
}

/// Look up a byte-style suffix multiplier (GB base).
fn byte_multiplier(suffix: &str) -> Option<f64> {
    BINARY_SUFFIXES
        .iter()
        .chain(DECIMAL_SUFFIXES.iter())
        .find(|(s, _)| *s == suffix)
        .map(|(_, m)| *m)
}

/// Normalize a quantity string into gigabytes or cores.
///
/// - `Ki`/`Mi`/`Gi`/`Ti` convert by powers of 1024 (`"1Gi"` is `1.0`)
/// - `k`/`M`/`G`/`T` convert by powers of 1000 (`"1G"` is `1.0`)
/// - `m` is millicores (`"500m"` is `0.5`)
/// - a bare number is returned unchanged
/// - empty or unparseable input yields `0.0`
pub fn normalize(quantity: &str) -> f64 {
    let Some((value, suffix)) = split_quantity(quantity) else {
        return 0.0;
    };
    match suffix {
        "" => value,
        "m" => value / 1000.0,
        other => byte_multiplier(other).map(|m| value * m).unwrap_or(0.0),
    }
}

/// Parse a cpu quantity into cores.
///
/// Bare numbers are cores; `m`, `u` and `n` are milli-, micro- and nanocores
/// (metrics-server reports usage in nanocores).
pub fn parse_cpu_cores(quantity: &str) -> f64 {
    let Some((value, suffix)) = split_quantity(quantity) else {
        return 0.0;
    };
    match suffix {
        "" => value,
        "m" => value / 1e3,
        "u" => value / 1e6,
        "n" => value / 1e9,
        "k" => value * 1e3,
        _ => 0.0,
    }
}

/// Parse a memory or storage quantity into gigabytes.
///
/// Bare numbers are bytes and are converted on a 1024^3 base so they line up
/// with `Gi` values. A `m` suffix (millibytes, which the API server does emit
/// for some computed values) is scaled accordingly.
pub fn parse_memory_gb(quantity: &str) -> f64 {
    let Some((value, suffix)) = split_quantity(quantity) else {
        return 0.0;
    };
    match suffix {
        "" => value / BYTES_PER_GIB,
        "m" => value / 1e3 / BYTES_PER_GIB,
        other => byte_multiplier(other).map(|m| value * m).unwrap_or(0.0),
    }
}

/// Parse a plain count (e.g. the `pods` capacity).
///
/// Negative or unparseable input yields `0`.
pub fn parse_count(quantity: &str) -> u32 {
    let cores = normalize(quantity);
    if cores <= 0.0 {
        0
    } else {
        cores.round().min(f64::from(u32::MAX)) as u32
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `part` over `total`, rounded to two decimals.
///
/// Returns `0.0` when `total` is zero or negative.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total <= 0.0 {
        0.0
    } else {
        round2(part / total * 100.0)
    }
}
