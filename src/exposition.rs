//! Plain-text exposition of the relay's gauges for pull-based scrapers.

use crate::gauges::{CachedRemoteValue, GaugeSet};

pub const CONTENT_TYPE: &str = "text/plain";

const REMOTE_HELP: &str = "Last value fetched from the remote query service.";

/// Render every gauge in declaration order, followed by the cached remote value once a
/// fetch has succeeded. Each gauge becomes a HELP line, a TYPE line and a sample line.
pub fn render(gauges: &GaugeSet, remote: &CachedRemoteValue, remote_metric: &str) -> String {
    let mut out = String::with_capacity(128 * (gauges.len() + 1));
    for gauge in gauges.iter() {
        push_gauge(&mut out, &gauge.name, &gauge.help, gauge.value);
    }
    if remote.is_present() {
        push_gauge(&mut out, remote_metric, REMOTE_HELP, remote.value());
    }
    out
}

fn push_gauge(out: &mut String, name: &str, help: &str, value: f64) {
    out.push_str(&format!("# HELP {} {}\n", name, escape_help(help)));
    out.push_str(&format!("# TYPE {} gauge\n", name));
    out.push_str(&format!("{} {}\n", name, format_value(value)));
}

/// Fixed two-decimal rendering; non-finite values use the exposition spellings.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_decimal_precision() {
        assert_eq!(format_value(1.2), "1.20");
        assert_eq!(format_value(0.0), "0.00");
        assert_eq!(format_value(-3.14159), "-3.14");
        assert_eq!(format_value(2.005e3), "2005.00");
    }

    #[test]
    fn non_finite_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn default_gauges_without_remote_value() {
        let text = render(&GaugeSet::default(), &CachedRemoteValue::default(), "remote");
        let expected = concat!(
            "# HELP esp8266_current0 Current sensor reading.\n",
            "# TYPE esp8266_current0 gauge\n",
            "esp8266_current0 1.20\n",
            "# HELP esp8266_current1 Current sensor reading.\n",
            "# TYPE esp8266_current1 gauge\n",
            "esp8266_current1 2.50\n",
            "# HELP esp8266_connection Connection metric value.\n",
            "# TYPE esp8266_connection gauge\n",
            "esp8266_connection 1.00\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn remote_value_follows_gauges_once_present() {
        let mut remote = CachedRemoteValue::default();
        remote.update(3.14);
        let text = render(&GaugeSet::default(), &remote, "esp8266_remote_total_current");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(
            lines[9],
            "# HELP esp8266_remote_total_current Last value fetched from the remote query service."
        );
        assert_eq!(lines[10], "# TYPE esp8266_remote_total_current gauge");
        assert_eq!(lines[11], "esp8266_remote_total_current 3.14");
    }

    #[test]
    fn rendering_is_repeatable() {
        let gauges = GaugeSet::default();
        let remote = CachedRemoteValue::default();
        assert_eq!(
            render(&gauges, &remote, "r"),
            render(&gauges, &remote, "r")
        );
    }
}
