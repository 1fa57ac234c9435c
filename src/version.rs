//! Version information

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn format_version_info() -> String {
    format!("facefolio v{}", CURRENT_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_names_the_client() {
        let info = format_version_info();
        assert!(info.starts_with("facefolio v"));
        assert!(info.ends_with(CURRENT_VERSION));
    }
}
