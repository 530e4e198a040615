//! Timestamp-token stripping and ordering for version groups (spec §4.3).

use std::sync::OnceLock;

use regex::Regex;

fn ts14_pattern() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(.*)[._](\d{14})$").expect("valid regex"))
}

fn ts8_pattern() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(.*)[._](\d{8})$").expect("valid regex"))
}

/// Split `name` into (stem, extension), where extension includes no dot and
/// may be empty. A leading dot (dotfile) is never treated as an extension.
fn split_ext(name: &str) -> (&str, &str) {
	match name.rfind('.') {
		Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
		_ => (name, ""),
	}
}

/// Remove exactly one trailing timestamp token from the stem, immediately
/// before the extension. 14-digit tokens are preferred over 8-digit ones so
/// that a 14-digit match isn't accidentally seen as an 8-digit prefix of
/// itself. `T`-separated, millisecond (17-digit), and non-abutting
/// timestamps are left untouched — those files are their own group.
pub fn strip_ts_basename(name: &str) -> String {
	let (stem, ext) = split_ext(name);

	let stripped_stem = if let Some(caps) = ts14_pattern().captures(stem) {
		Some(caps[1].to_string())
	} else {
		ts8_pattern().captures(stem).map(|caps| caps[1].to_string())
	};

	match stripped_stem {
		Some(base) if ext.is_empty() => base,
		Some(base) => format!("{base}.{ext}"),
		None => name.to_string(),
	}
}

/// Extract the embedded timestamp as an orderable integer (`YYYYMMDDHHMMSS`
/// or `YYYYMMDD00000000`), or `None` if the name carries no stripped token.
pub fn extract_ts(name: &str) -> Option<i64> {
	let (stem, _ext) = split_ext(name);

	if let Some(caps) = ts14_pattern().captures(stem) {
		return caps[2].parse().ok();
	}
	if let Some(caps) = ts8_pattern().captures(stem) {
		let digits: i64 = caps[2].parse().ok()?;
		return Some(digits * 1_000_000);
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_14_digit_underscore() {
		assert_eq!(strip_ts_basename("REPORT_20251105120450.xlsx"), "REPORT.xlsx");
	}

	#[test]
	fn strips_14_digit_dot() {
		assert_eq!(strip_ts_basename("REPORT.20251105120450.xlsx"), "REPORT.xlsx");
	}

	#[test]
	fn strips_8_digit_underscore() {
		assert_eq!(strip_ts_basename("REPORT_20251105.xlsx"), "REPORT.xlsx");
	}

	#[test]
	fn does_not_strip_t_separator() {
		assert_eq!(
			strip_ts_basename("REPORT_20251105T120450.xlsx"),
			"REPORT_20251105T120450.xlsx"
		);
	}

	#[test]
	fn does_not_strip_milliseconds() {
		assert_eq!(
			strip_ts_basename("REPORT_20251105120450123.xlsx"),
			"REPORT_20251105120450123.xlsx"
		);
	}

	#[test]
	fn does_not_strip_when_not_abutting_extension() {
		assert_eq!(
			strip_ts_basename("REPORT_20251105120450_extra.xlsx"),
			"REPORT_20251105120450_extra.xlsx"
		);
	}

	#[test]
	fn extracts_14_digit_timestamp() {
		assert_eq!(extract_ts("REPORT_20251105120450.xlsx"), Some(20251105120450));
	}

	#[test]
	fn extracts_8_digit_timestamp_as_midnight() {
		assert_eq!(extract_ts("REPORT_20251105.xlsx"), Some(20251105_000000));
	}

	#[test]
	fn no_timestamp_extracted_for_untouched_name() {
		assert_eq!(extract_ts("REPORT_20251105T120450.xlsx"), None);
		assert_eq!(extract_ts("plain.xlsx"), None);
	}

	#[test]
	fn ordering_uses_ts_then_chgtime_then_path() {
		let mut names = vec![
			("REPORT_20251105120450.xlsx", 0i64, "/r/b.xlsx"),
			("REPORT_20251104120450.xlsx", 0i64, "/r/a.xlsx"),
			("UNSTAMPED.xlsx", 10i64, "/r/c.xlsx"),
			("UNSTAMPED.xlsx", 5i64, "/r/d.xlsx"),
		];
		names.sort_by_key(|(name, chgtime, path)| {
			(extract_ts(name).unwrap_or(i64::MIN), *chgtime, path.to_string())
		});
		let order: Vec<_> = names.iter().map(|(n, _, p)| (*n, *p)).collect();
		assert_eq!(
			order,
			vec![
				("UNSTAMPED.xlsx", "/r/d.xlsx"),
				("UNSTAMPED.xlsx", "/r/c.xlsx"),
				("REPORT_20251104120450.xlsx", "/r/a.xlsx"),
				("REPORT_20251105120450.xlsx", "/r/b.xlsx"),
			]
		);
	}
}
