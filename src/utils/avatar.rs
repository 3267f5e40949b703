/// 未上传头像时使用的 Gravatar 地址 (identicon 兜底)
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{digest:x}?d=identicon")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravatar_url_normalizes_email() {
        assert_eq!(gravatar_url(" Player@Example.com"), gravatar_url("player@example.com"));
    }

    #[test]
    fn test_gravatar_url_format() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(
            gravatar_url(""),
            "https://www.gravatar.com/avatar/d41d8cd98f00b204e9800998ecf8427e?d=identicon"
        );
    }
}
