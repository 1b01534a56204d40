#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use smabot::secrets::PassphraseSource;
use smabot::ProvisionError;
use zip::write::SimpleFileOptions;
use zip::{AesMode, ZipWriter};

pub const PASSWORD: &str = "correct horse battery staple";
pub const CONFIG_BODY: &str = "[binance]\napi_key = test-key\napi_secret = test-secret\n";

/// Write an AES-encrypted archive with one entry
pub fn write_archive(path: &Path, entry: &str, body: &str, password: &str) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, password);
    writer.start_file(entry, options).unwrap();
    writer.write_all(body.as_bytes()).unwrap();
    writer.finish().unwrap();
}

/// Overwrite the uncompressed size recorded in the local and central headers
/// of a single-entry archive
pub fn forge_declared_size(path: &Path, size: u32) {
    let mut bytes = std::fs::read(path).unwrap();

    let local = 0;
    assert_eq!(&bytes[local..local + 4], b"PK\x03\x04");
    bytes[local + 22..local + 26].copy_from_slice(&size.to_le_bytes());

    let eocd = bytes
        .windows(4)
        .rposition(|w| w == b"PK\x05\x06")
        .unwrap();
    let central = u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;
    assert_eq!(&bytes[central..central + 4], b"PK\x01\x02");
    bytes[central + 24..central + 28].copy_from_slice(&size.to_le_bytes());

    std::fs::write(path, bytes).unwrap();
}

/// Hands out pre-recorded passphrases, then reports an abandoned prompt
pub struct ScriptedPassphrase {
    answers: VecDeque<String>,
    pub prompts: usize,
}

impl ScriptedPassphrase {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: 0,
        }
    }
}

impl PassphraseSource for ScriptedPassphrase {
    fn read_passphrase(&mut self, _prompt: &str) -> Result<String, ProvisionError> {
        self.prompts += 1;
        self.answers
            .pop_front()
            .ok_or(ProvisionError::PromptAbandoned)
    }
}

/// Binance kline row for a closed daily candle starting `day` days after 2024-01-01
pub fn kline_row(day: i64, close: f64) -> serde_json::Value {
    let open_time = 1_704_067_200_000_i64 + day * 86_400_000;
    serde_json::json!([
        open_time,
        format!("{:.2}", close),
        format!("{:.2}", close),
        format!("{:.2}", close),
        format!("{:.2}", close),
        "12.5",
        open_time + 86_399_999,
        "0",
        10,
        "0",
        "0",
        "0"
    ])
}

pub fn klines_body(closes: &[f64]) -> String {
    let rows: Vec<serde_json::Value> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| kline_row(i as i64, close))
        .collect();
    serde_json::Value::Array(rows).to_string()
}

pub fn init_tracing() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
}

pub fn vars(pairs: &[(&str, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
