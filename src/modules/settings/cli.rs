//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use clap::{builder::ValueParser, Parser};
use std::{collections::HashSet, path::PathBuf, sync::LazyLock};

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(|| {
    let root_dir = std::env::var("ONEBOX_ROOT_DIR").unwrap_or_else(|_| "/tmp/onebox_test".into());
    std::fs::create_dir_all(&root_dir).ok();

    Settings {
        onebox_log_level: "info".to_string(),
        onebox_http_port: 15000,
        onebox_bind_ip: Some("127.0.0.1".to_string()),
        onebox_cors_origins: HashSet::new(),
        onebox_cors_max_age: 86400,
        onebox_ansi_logs: true,
        onebox_log_to_file: false,
        onebox_json_logs: false,
        onebox_max_server_log_files: 5,
        onebox_root_dir: root_dir,
        onebox_http_compression_enabled: true,
        onebox_accounts_file: None,
        onebox_backfill_days: 30,
        onebox_page_size: 100,
        onebox_classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
        onebox_classifier_token: None,
        onebox_classifier_timeout_secs: 20,
        onebox_slack_webhook_url: None,
        onebox_webhook_url: None,
        onebox_notify_timeout_secs: 10,
        onebox_openai_api_key: None,
        onebox_openai_base_url: "https://api.openai.com/v1".to_string(),
        onebox_chat_model: "gpt-4o-mini".to_string(),
        onebox_embedding_model: "text-embedding-3-small".to_string(),
        onebox_agenda_file: None,
        onebox_reconnect_base_delay_secs: 2,
        onebox_reconnect_max_delay_secs: 300,
        onebox_reconnect_max_attempts: 8,
    }
});

pub const DEFAULT_CLASSIFIER_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-mnli";

fn parse_http_url(s: &str) -> Result<String, String> {
    let url = url::Url::parse(s).map_err(|e| format!("Invalid URL {s:?}: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(s.to_string()),
        other => Err(format!("Unsupported URL scheme '{other}', expected http or https")),
    }
}

#[derive(Debug, Parser)]
#[clap(
    name = "onebox",
    about = "Multi-account IMAP ingestion, intent classification and search service",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// onebox log level (default: "info")
    #[clap(long, default_value = "info", env, help = "Set the log level for onebox")]
    pub onebox_log_level: String,

    /// onebox HTTP port (default: 5000)
    #[clap(long, default_value = "5000", env, help = "Set the HTTP port for onebox")]
    pub onebox_http_port: u16,

    /// The IP address that the HTTP server binds to, in IPv4 format.
    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "The IP address that the HTTP server binds to, in IPv4 format (e.g., 192.168.1.1).",
        value_parser = ValueParser::new(|s: &str| {
            if s.parse::<std::net::Ipv4Addr>().is_err() {
                return Err("The bind IP address must be a valid IPv4 address.".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub onebox_bind_ip: Option<String>,

    /// CORS allowed origins. An empty list allows every origin.
    #[clap(
        long,
        default_value = "",
        env,
        help = "Set the allowed CORS origins (comma-separated list, e.g., \"https://example.com, https://another.com\")",
        value_parser = ValueParser::new(|s: &str| -> Result<HashSet<String>, String> {
            let set: HashSet<String> = s.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
            Ok(set)
        })
    )]
    pub onebox_cors_origins: HashSet<String>,

    /// CORS max age in seconds (default: 86400)
    #[clap(long, default_value = "86400", env, help = "Set the CORS max age in seconds")]
    pub onebox_cors_max_age: i32,

    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub onebox_ansi_logs: bool,

    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub onebox_log_to_file: bool,

    #[clap(long, default_value = "false", env, help = "Enable JSON formatted logs")]
    pub onebox_json_logs: bool,

    #[clap(
        long,
        default_value = "5",
        env,
        help = "Set the maximum number of server log files"
    )]
    pub onebox_max_server_log_files: usize,

    #[clap(
        long,
        env,
        help = "Set the data directory for the onebox search index and log files",
        value_parser = ValueParser::new(|s: &str| {
            let path = PathBuf::from(s);
            if !path.is_absolute() {
                return Err("Path must be an absolute directory path".to_string());
            }
            if !path.exists() {
                return Err(format!("Path {:?} does not exist", path));
            }
            if !path.is_dir() {
                return Err(format!("Path {:?} is not a directory", path));
            }
            Ok(s.to_string())
        })
    )]
    pub onebox_root_dir: String,

    #[clap(
        long,
        default_value = "true",
        env,
        help = "Enable compression for the HTTP server"
    )]
    pub onebox_http_compression_enabled: bool,

    /// JSON file holding the list of mailbox accounts. When absent the
    /// numbered IMAP_USER{n}/IMAP_PASSWORD{n}/IMAP_HOST{n}/IMAP_PORT{n}
    /// environment variables are used instead.
    #[clap(long, env, help = "Path of the JSON file describing the IMAP accounts")]
    pub onebox_accounts_file: Option<String>,

    #[clap(
        long,
        default_value = "30",
        env,
        help = "Number of days searched during the initial backfill",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub onebox_backfill_days: u32,

    #[clap(
        long,
        default_value = "100",
        env,
        help = "Maximum number of emails returned by the list endpoint"
    )]
    pub onebox_page_size: usize,

    #[clap(
        long,
        default_value = DEFAULT_CLASSIFIER_URL,
        env,
        help = "Zero-shot classification endpoint",
        value_parser = ValueParser::new(parse_http_url)
    )]
    pub onebox_classifier_url: String,

    /// Bearer token for the zero-shot classification endpoint. Without it
    /// the local keyword classifier is used.
    #[clap(long, env, help = "Bearer token for the zero-shot classification endpoint")]
    pub onebox_classifier_token: Option<String>,

    #[clap(
        long,
        default_value = "20",
        env,
        help = "Timeout in seconds for a single classification call"
    )]
    pub onebox_classifier_timeout_secs: u64,

    #[clap(
        long,
        env,
        help = "Slack incoming webhook notified when an email becomes Interested",
        value_parser = ValueParser::new(parse_http_url)
    )]
    pub onebox_slack_webhook_url: Option<String>,

    #[clap(
        long,
        env,
        help = "Generic webhook notified when an email becomes Interested",
        value_parser = ValueParser::new(parse_http_url)
    )]
    pub onebox_webhook_url: Option<String>,

    #[clap(
        long,
        default_value = "10",
        env,
        help = "Timeout in seconds for a single notification delivery"
    )]
    pub onebox_notify_timeout_secs: u64,

    /// API key for the OpenAI-compatible reply backend. Without it replies
    /// are produced from a local template.
    #[clap(long, env, help = "API key for the OpenAI-compatible reply backend")]
    pub onebox_openai_api_key: Option<String>,

    #[clap(
        long,
        default_value = "https://api.openai.com/v1",
        env,
        help = "Base URL of the OpenAI-compatible API",
        value_parser = ValueParser::new(parse_http_url)
    )]
    pub onebox_openai_base_url: String,

    #[clap(long, default_value = "gpt-4o-mini", env, help = "Chat completion model")]
    pub onebox_chat_model: String,

    #[clap(
        long,
        default_value = "text-embedding-3-small",
        env,
        help = "Embedding model used to pick reply context"
    )]
    pub onebox_embedding_model: String,

    #[clap(
        long,
        env,
        help = "JSON file with an array of agenda snippets used as reply context"
    )]
    pub onebox_agenda_file: Option<String>,

    #[clap(
        long,
        default_value = "2",
        env,
        help = "Initial delay in seconds before reconnecting a failed mailbox"
    )]
    pub onebox_reconnect_base_delay_secs: u64,

    #[clap(
        long,
        default_value = "300",
        env,
        help = "Upper bound in seconds for the reconnect delay"
    )]
    pub onebox_reconnect_max_delay_secs: u64,

    #[clap(
        long,
        default_value = "8",
        env,
        help = "Consecutive failed connection attempts before a mailbox worker gives up",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub onebox_reconnect_max_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_webhook_urls() {
        assert!(parse_http_url("https://hooks.slack.com/services/x").is_ok());
        assert!(parse_http_url("ftp://example.com").is_err());
        assert!(parse_http_url("not a url").is_err());
    }

    #[test]
    fn parses_minimal_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let settings = Settings::try_parse_from([
            "onebox",
            "--onebox-root-dir",
            root.as_str(),
            "--onebox-cors-origins",
            "http://localhost:3000, ",
        ])
        .unwrap();
        assert_eq!(settings.onebox_http_port, 5000);
        assert_eq!(settings.onebox_backfill_days, 30);
        assert_eq!(settings.onebox_page_size, 100);
        assert_eq!(settings.onebox_cors_origins.len(), 1);
        assert!(settings.onebox_classifier_token.is_none());
    }
}
