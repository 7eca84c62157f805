// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `comptoir doctor` command implementation.
//!
//! Runs diagnostic checks against the Comptoir environment to identify
//! configuration issues, key material problems, and storage constraints
//! before `serve` trips over them.

use std::time::{Duration, Instant};

use comptoir_config::ComptoirConfig;
use comptoir_core::ComptoirError;
use comptoir_storage::Database;
use comptoir_vault::{Vault, mask_secret};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Check status.
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    /// Duration the check took.
    pub duration: Duration,
}

/// Run the `comptoir doctor` command.
///
/// Runs quick diagnostic checks. With `--deep`, runs additional intensive
/// checks (database integrity, network reachability).
pub async fn run_doctor(config: &ComptoirConfig, deep: bool) -> Result<(), ComptoirError> {
    let mut results = Vec::new();

    // Quick checks (always run)
    results.push(check_config().await);
    results.push(check_encryption_key(config.vault.encryption_key.as_deref()));
    results.push(check_database(&config.database.url).await);
    results.push(check_upload_dir(&config.uploads.dir));
    results.push(check_llm_key(config));

    // Deep checks (only with --deep)
    if deep {
        results.push(check_db_integrity(&config.database.url).await);
        results.push(check_llm_connectivity(config).await);
        results.push(check_webhook_endpoint(config).await);
    }

    println!();
    println!("  comptoir doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in &results {
        let duration_ms = result.duration.as_millis();
        let marker = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => {
                warn_count += 1;
                "[WARN]"
            }
            CheckStatus::Fail => {
                fail_count += 1;
                "[FAIL]"
            }
        };
        println!(
            "    {marker} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        );
    }

    println!();

    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }

    println!();

    Ok(())
}

/// Check configuration loads without errors.
async fn check_config() -> CheckResult {
    let start = Instant::now();
    match comptoir_config::load_and_validate() {
        Ok(_) => CheckResult {
            name: "Configuration".to_string(),
            status: CheckStatus::Pass,
            message: "valid".to_string(),
            duration: start.elapsed(),
        },
        Err(errors) => CheckResult {
            name: "Configuration".to_string(),
            status: CheckStatus::Fail,
            message: format!("{} error(s)", errors.len()),
            duration: start.elapsed(),
        },
    }
}

/// Check the vault key decodes to usable key material.
fn check_encryption_key(key: Option<&str>) -> CheckResult {
    let start = Instant::now();
    match key {
        None => CheckResult {
            name: "Encryption key".to_string(),
            status: CheckStatus::Warn,
            message: "not set (serve will refuse to start)".to_string(),
            duration: start.elapsed(),
        },
        Some(key) => match Vault::from_key_b64(key) {
            Ok(_) => CheckResult {
                name: "Encryption key".to_string(),
                status: CheckStatus::Pass,
                message: "usable".to_string(),
                duration: start.elapsed(),
            },
            Err(e) => CheckResult {
                name: "Encryption key".to_string(),
                status: CheckStatus::Fail,
                message: e.to_string(),
                duration: start.elapsed(),
            },
        },
    }
}

/// Check the database opens and migrations apply.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "Database".to_string(),
            status: CheckStatus::Warn,
            message: format!("not found: {db_path} (will be created on first run)"),
            duration: start.elapsed(),
        };
    }

    match Database::open(db_path).await {
        Ok(db) => {
            let result = CheckResult {
                name: "Database".to_string(),
                status: CheckStatus::Pass,
                message: "schema ready".to_string(),
                duration: start.elapsed(),
            };
            if let Err(e) = db.close().await {
                return CheckResult {
                    name: "Database".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("close failed: {e}"),
                    duration: start.elapsed(),
                };
            }
            result
        }
        Err(e) => CheckResult {
            name: "Database".to_string(),
            status: CheckStatus::Fail,
            message: format!("open failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Check the attachment root exists (or can be created) and is writable.
fn check_upload_dir(dir: &str) -> CheckResult {
    let start = Instant::now();

    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult {
            name: "Upload directory".to_string(),
            status: CheckStatus::Fail,
            message: format!("cannot create {dir}: {e}"),
            duration: start.elapsed(),
        };
    }

    let probe = std::path::Path::new(dir).join(".comptoir-doctor-probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult {
                name: "Upload directory".to_string(),
                status: CheckStatus::Pass,
                message: "writable".to_string(),
                duration: start.elapsed(),
            }
        }
        Err(e) => CheckResult {
            name: "Upload directory".to_string(),
            status: CheckStatus::Fail,
            message: format!("not writable: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Check whether an LLM key is configured.
fn check_llm_key(config: &ComptoirConfig) -> CheckResult {
    let start = Instant::now();
    match &config.llm.api_key {
        Some(key) => CheckResult {
            name: "LLM API key".to_string(),
            status: CheckStatus::Pass,
            message: format!("{} (model {})", mask_secret(key), config.llm.model),
            duration: start.elapsed(),
        },
        None => CheckResult {
            name: "LLM API key".to_string(),
            status: CheckStatus::Warn,
            message: "not set (folder classification disabled)".to_string(),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "DB integrity".to_string(),
            status: CheckStatus::Warn,
            message: "database not found (skipped)".to_string(),
            duration: start.elapsed(),
        };
    }

    let db = match Database::open(db_path).await {
        Ok(db) => db,
        Err(e) => {
            return CheckResult {
                name: "DB integrity".to_string(),
                status: CheckStatus::Fail,
                message: format!("open failed: {e}"),
                duration: start.elapsed(),
            };
        }
    };

    let result = db
        .connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
        .await;
    let _ = db.close().await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => CheckResult {
            name: "DB integrity".to_string(),
            status: CheckStatus::Pass,
            message: "ok".to_string(),
            duration: start.elapsed(),
        },
        Ok(rows) => CheckResult {
            name: "DB integrity".to_string(),
            status: CheckStatus::Fail,
            message: format!("{} issue(s) found", rows.len()),
            duration: start.elapsed(),
        },
        Err(e) => CheckResult {
            name: "DB integrity".to_string(),
            status: CheckStatus::Fail,
            message: format!("check failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: LLM API reachability via HEAD request.
async fn check_llm_connectivity(config: &ComptoirConfig) -> CheckResult {
    let start = Instant::now();

    if config.llm.api_key.is_none() {
        return CheckResult {
            name: "LLM connectivity".to_string(),
            status: CheckStatus::Warn,
            message: "no API key configured (skipped)".to_string(),
            duration: start.elapsed(),
        };
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult {
                name: "LLM connectivity".to_string(),
                status: CheckStatus::Fail,
                message: format!("HTTP client error: {e}"),
                duration: start.elapsed(),
            };
        }
    };

    let url = format!(
        "{}/chat/completions",
        config.llm.base_url.trim_end_matches('/')
    );
    match client.head(&url).send().await {
        Ok(_resp) => CheckResult {
            name: "LLM connectivity".to_string(),
            status: CheckStatus::Pass,
            message: "reachable".to_string(),
            duration: start.elapsed(),
        },
        Err(e) => {
            let msg = if e.is_timeout() {
                "timeout (5s)".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                format!("error: {e}")
            };
            CheckResult {
                name: "LLM connectivity".to_string(),
                status: CheckStatus::Fail,
                message: msg,
                duration: start.elapsed(),
            }
        }
    }
}

/// Deep check: webhook receiver health endpoint.
async fn check_webhook_endpoint(config: &ComptoirConfig) -> CheckResult {
    let start = Instant::now();
    let url = format!("http://{}/healthz", config.webhook.bind_address);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult {
                name: "Webhook endpoint".to_string(),
                status: CheckStatus::Fail,
                message: format!("HTTP client error: {e}"),
                duration: start.elapsed(),
            };
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => CheckResult {
            name: "Webhook endpoint".to_string(),
            status: CheckStatus::Pass,
            message: "reachable".to_string(),
            duration: start.elapsed(),
        },
        Ok(resp) => CheckResult {
            name: "Webhook endpoint".to_string(),
            status: CheckStatus::Warn,
            message: format!("status {}", resp.status()),
            duration: start.elapsed(),
        },
        Err(_) => CheckResult {
            name: "Webhook endpoint".to_string(),
            status: CheckStatus::Warn,
            message: format!("not reachable at {url} (receiver may not be running)"),
            duration: start.elapsed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;

    #[test]
    fn missing_encryption_key_warns() {
        let result = check_encryption_key(None);
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not set"));
    }

    #[test]
    fn garbage_encryption_key_fails() {
        let result = check_encryption_key(Some("not base64 at all!!!"));
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn proper_encryption_key_passes() {
        let key = BASE64.encode([7u8; 32]);
        let result = check_encryption_key(Some(&key));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.message, "usable");
    }

    #[tokio::test]
    async fn check_database_missing_warns() {
        let result = check_database("/tmp/nonexistent-comptoir-test-xyz.db").await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn check_database_opens_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctor.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();

        let result = check_database(path).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.message, "schema ready");
    }

    #[test]
    fn upload_dir_probe_passes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");

        let result = check_upload_dir(uploads.to_str().unwrap());
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(uploads.exists());
        assert!(!uploads.join(".comptoir-doctor-probe").exists());
    }

    #[test]
    fn upload_dir_behind_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").unwrap();

        let result = check_upload_dir(blocker.join("uploads").to_str().unwrap());
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn llm_key_absent_warns() {
        let config = comptoir_config::load_and_validate_str("").unwrap();
        let result = check_llm_key(&config);
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn llm_key_present_passes_without_leaking_it() {
        let config = comptoir_config::load_and_validate_str(
            "[llm]\napi_key = \"sk-live-abcdefghijklmnop\"\n",
        )
        .unwrap();
        let result = check_llm_key(&config);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(!result.message.contains("abcdefghijkl"));
        assert!(result.message.contains("sk-l...mnop"));
    }

    #[tokio::test]
    async fn check_db_integrity_missing_warns() {
        let result = check_db_integrity("/tmp/nonexistent-comptoir-test-xyz.db").await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn check_db_integrity_passes_on_a_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("integrity.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();

        let result = check_db_integrity(path).await;
        assert_eq!(result.status, CheckStatus::Pass);
    }
}
