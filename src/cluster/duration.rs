//! Normalises human durations in `*.ms` topic configs to milliseconds.

const MS: f64 = 1.0;
const SECOND: f64 = 1_000.0;
const MINUTE: f64 = 60.0 * SECOND;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const WEEK: f64 = 7.0 * DAY;

fn unit_millis(unit: &str) -> Option<f64> {
    let millis = match unit.to_ascii_lowercase().as_str() {
        "ns" => MS / 1_000_000.0,
        "us" | "µs" => MS / 1_000.0,
        "ms" => MS,
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => WEEK,
        _ => return None,
    };
    Some(millis)
}

/// Converts `1h30m`, `1.5d`, `2 weeks`... to a millisecond count.
/// Plain integers and anything unparsable come back unchanged.
pub fn parse_time_to_millis(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.parse::<i64>().is_ok() {
        return input.to_string();
    }

    match sum_components(trimmed) {
        Some(total) => format!("{}", total.round() as i64),
        None => input.to_string(),
    }
}

fn sum_components(text: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut rest = text;
    let mut components = 0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = rest[number_len..].trim_start();

        let unit_len = rest.find(|c: char| !c.is_alphabetic()).unwrap_or(rest.len());
        if unit_len == 0 {
            return None;
        }
        total += value * unit_millis(&rest[..unit_len])?;
        rest = rest[unit_len..].trim_start();
        components += 1;
    }

    if components == 0 { None } else { Some(total) }
}
