use sha2::{Digest, Sha256};
use url::Url;

/// Readable part of a target name
const TARGET_PREFIX_CHARS: usize = 80;

/// Hex digits of the URL digest appended to a target name
const TARGET_DIGEST_CHARS: usize = 12;

/// Derive the archive namespace for a start URL
///
/// A sanitized, truncated prefix keeps the name readable; the digest of the
/// full URL keeps distinct URLs apart. Only a trailing `/` is ignored.
pub fn target_id(url: &str) -> String {
    let url = url.trim_end_matches('/');
    let mut name = sanitize_filename(url)
        .chars()
        .take(TARGET_PREFIX_CHARS)
        .collect::<String>();
    if name.is_empty() {
        name = "untitled".to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}", name, &digest[..TARGET_DIGEST_CHARS])
}

/// Convert a string to a sanitized filename
pub fn sanitize_filename(url: &str) -> String {
    // Remove protocol and replace invalid filename characters
    let mut name = url.replace("http://", "").replace("https://", "");
    name = name.replace(['/', ':', '?', '&', '=', '#', '%', '\\', '.'], "_");

    // Limit filename length
    name.chars().take(100).collect()
}

/// Network location of a URL: optional credentials, host and explicit port
///
/// Empty for URLs without an authority such as `mailto:` links.
pub fn netloc(url: &Url) -> String {
    let Some(host) = url.host_str() else {
        return String::new();
    };

    let mut location = String::new();
    if !url.username().is_empty() {
        location.push_str(url.username());
        if let Some(password) = url.password() {
            location.push(':');
            location.push_str(password);
        }
        location.push('@');
    }
    location.push_str(host);
    if let Some(port) = url.port() {
        location.push_str(&format!(":{}", port));
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id() {
        let target = target_id("https://shop.example.com/");
        assert!(target.starts_with("shop_example_com_"));
        assert_eq!(target.len(), "shop_example_com_".len() + TARGET_DIGEST_CHARS);
        assert!(target_id("http://shop.example.com/sale?x=1").starts_with("shop_example_com_sale_x_1_"));
        assert!(target_id("").starts_with("untitled_"));
    }

    #[test]
    fn test_target_id_is_stable() {
        assert_eq!(
            target_id("https://shop.example.com/deals"),
            target_id("https://shop.example.com/deals")
        );
        assert_eq!(
            target_id("https://shop.example.com/deals/"),
            target_id("https://shop.example.com/deals")
        );
    }

    #[test]
    fn test_target_id_keeps_urls_apart() {
        assert_ne!(
            target_id("https://shop.example.com/a/b"),
            target_id("https://shop.example.com/a_b")
        );

        let base = format!("https://shop.example.com/{}", "catalog/".repeat(15));
        let first = target_id(&format!("{}item-1", base));
        let second = target_id(&format!("{}item-2", base));
        assert_ne!(first, second);
        assert!(first.chars().count() <= TARGET_PREFIX_CHARS + 1 + TARGET_DIGEST_CHARS);
    }

    #[test]
    fn test_sanitize_limits_length() {
        let long = format!("https://{}", "a".repeat(300));
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn test_netloc() {
        let url = Url::parse("https://shop.example.com/a").unwrap();
        assert_eq!(netloc(&url), "shop.example.com");

        let url = Url::parse("http://user:pw@shop.example.com:8080/").unwrap();
        assert_eq!(netloc(&url), "user:pw@shop.example.com:8080");

        let url = Url::parse("mailto:sales@shop.example.com").unwrap();
        assert_eq!(netloc(&url), "");
    }
}
