use std::path::Path;

use url::Url;

use crate::constants::GATEWAY_INVENTORY_PREFIX;
use crate::constants::NANOS_PER_SECOND;

pub fn nanos_to_seconds(nanos: i64) -> f64 {
    nanos as f64 / NANOS_PER_SECOND
}

/// Parse the generation marker out of `gateway_inventory_<N>.csv[.gz]`
pub fn parse_inventory_generation(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_prefix(GATEWAY_INVENTORY_PREFIX)?;
    let digits = stem.strip_suffix(".csv.gz").or_else(|| stem.strip_suffix(".csv"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Last path segment of a snapshot url, ignoring query string and fragment
pub fn snapshot_file_name(url: &Url) -> Option<&str> {
    url.path_segments()?.next_back().filter(|segment| !segment.is_empty())
}

pub fn path_file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("gateway_inventory_01234567.csv.gz", Some(1_234_567))]
    #[case("gateway_inventory_1180000.csv", Some(1_180_000))]
    #[case("gateway_inventory_latest.csv.gz", None)]
    #[case("gateway_inventory_.csv", None)]
    #[case("account_inventory_1180000.csv.gz", None)]
    #[case("gateway_inventory_1180000.json", None)]
    fn parses_generation_from_file_name(
        #[case] name: &str,
        #[case] expected: Option<u64>,
    ) {
        assert_eq!(parse_inventory_generation(name), expected);
    }

    #[test]
    fn snapshot_file_name_ignores_query() {
        let url = Url::parse("https://feed.example/data/gateway_inventory_42.csv.gz?sig=abc").unwrap();
        assert_eq!(snapshot_file_name(&url), Some("gateway_inventory_42.csv.gz"));
    }

    #[test]
    fn nanos_convert_to_fractional_seconds() {
        assert_eq!(nanos_to_seconds(1_500_000_000), 1.5);
        assert_eq!(nanos_to_seconds(-250_000_000), -0.25);
    }
}
