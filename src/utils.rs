/// Strip the IPv4-mapped-IPv6 prefix so `::ffff:10.0.0.1` and `10.0.0.1`
/// track as one client.
pub fn normalize_ip(ip: &str) -> &str {
    ip.strip_prefix("::ffff:").unwrap_or(ip)
}

pub fn format_window_key(prefix: &str, key: &str) -> String {
    format!("{}:{}", prefix, key)
}
