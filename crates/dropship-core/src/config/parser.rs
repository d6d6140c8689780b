//! TOML parser with helpful error messages

use super::schema::GatewayConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse dropship.toml with detailed error messages
pub fn parse_config(path: &Path) -> Result<GatewayConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse dropship.toml content from string
pub fn parse_config_str(content: &str) -> Result<GatewayConfig> {
    let config: GatewayConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Point at the offending line when toml reports a span.
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();

    let line_num = error
        .span()
        .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1);

    match line_num {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            message
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", message),
    }
}

fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
upload_dir = "/srv/uploads"
public_key_dir = "/etc/dropship/keys"

[authorized_users]
alice = "alice"
bob = ["bob", "shared/docs"]

[deploy]
preserve = [".env", "data"]

[runtime.node]
package_manager = "pnpm"
deploy_script = "build"
"#;

        let config = parse_config_str(toml).unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.roots_for("alice"), ["alice".to_string()]);
        assert_eq!(config.roots_for("bob").len(), 2);
        assert_eq!(config.runtime.node.package_manager, "pnpm");
        assert_eq!(config.runtime.node.install_args, vec!["install".to_string()]);
        assert_eq!(config.deploy.preserve.len(), 2);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config_str("").unwrap();
        assert!(config.authorized_users.is_empty());
        assert_eq!(config.supervisor.timeout_secs, 30);
    }

    #[test]
    fn test_parse_invalid_toml_reports_line() {
        let toml = "upload_dir = \"/srv\"\n[authorized_users\nalice = \"alice\"\n";

        let err = parse_config_str(toml).unwrap_err().to_string();
        assert!(err.contains("line 2"), "unexpected error: {err}");
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let toml = r#"
[authorized_users]
"a/b" = "alice"
"#;
        let err = parse_config_str(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid identity"));
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "temp_dir = \"/tmp/staging\"").unwrap();

        let config = parse_config(file.path()).unwrap();
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/staging"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = parse_config(Path::new("/nonexistent/dropship.toml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("/nonexistent/dropship.toml"));
    }
}
