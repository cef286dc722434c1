/// Splits a `host:port` peer address and returns the host.
///
/// IPv6 hosts must be bracketed (`[::1]:443`). Addresses without a port, or with an ambiguous
/// number of colons, yield `None`.
pub fn split_host(address: &str) -> Option<&str> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;

        if port.contains([':', '[', ']']) {
            return None;
        }

        return Some(host);
    }

    let (host, _port) = address.rsplit_once(':')?;

    if host.contains([':', '[', ']']) {
        return None;
    }

    Some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_with_port() {
        assert_eq!(split_host("10.0.0.7:53122"), Some("10.0.0.7"));
    }

    #[test]
    fn bracketed_ipv6_with_port() {
        assert_eq!(split_host("[2001:db8::1]:443"), Some("2001:db8::1"));
        assert_eq!(split_host("[::1]:8080"), Some("::1"));
    }

    #[test]
    fn hostname_with_port() {
        assert_eq!(split_host("localhost:80"), Some("localhost"));
    }

    #[test]
    fn empty_port_is_accepted() {
        assert_eq!(split_host("10.0.0.7:"), Some("10.0.0.7"));
    }

    #[test]
    fn missing_port_is_rejected() {
        assert_eq!(split_host("10.0.0.7"), None);
        assert_eq!(split_host("[::1]"), None);
    }

    #[test]
    fn bare_ipv6_is_rejected() {
        assert_eq!(split_host("2001:db8::1"), None);
        assert_eq!(split_host("::1"), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(split_host(""), None);
        assert_eq!(split_host("[::1"), None);
        assert_eq!(split_host("[::1]:80:81"), None);
    }
}
